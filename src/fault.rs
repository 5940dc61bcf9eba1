//! The fault catalogue and the fault value type.
//!
//! Faults are how user-visible problems travel: closed catalogue of kinds,
//! each pinned to a severity and a message, raised against a statement, a
//! span, or an infix span. They are plain values: identity is irrelevant,
//! and two faults with the same kind, source, and range are the same fault,
//! which is what makes the add/remove delta stream cheap to compute.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::statement::{InfixRef, SpanRef, StatementId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FaultSeverity {
    Hint,
    Info,
    Warning,
    Error,
}

/// Every fault the front end can raise. The catalogue is closed: downstream
/// consumers match exhaustively on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FaultKind {
    TabsAndSpaces,
    StatementBeginsWithComma,
    StatementBeginsWithEllipsis,
    StatementBeginsWithEscapedSpace,
    StatementContainsOnlyEscapeCharacter,
    DuplicateDeclaration,
    ListIntrinsicExtendingList,
    PatternInvalid,
    PatternWithoutAnnotation,
    PatternCanMatchEmpty,
    PatternPartialWithCombinator,
    InfixHasDuplicateIdentifier,
    InfixHasSelfReferentialType,
    InfixUsingListOperator,
    PopulationInfixHasMultipleDeclarations,
    PortabilityInfixHasMultipleDefinitions,
    DuplicateReference,
    UnresolvedResource,
    InsecureResourceReference,
    CircularResourceReference,
}

impl FaultKind {
    pub fn code(&self) -> u32 {
        match self {
            FaultKind::TabsAndSpaces => 100,
            FaultKind::StatementBeginsWithComma => 101,
            FaultKind::StatementBeginsWithEllipsis => 102,
            FaultKind::StatementBeginsWithEscapedSpace => 103,
            FaultKind::StatementContainsOnlyEscapeCharacter => 104,
            FaultKind::DuplicateDeclaration => 200,
            FaultKind::ListIntrinsicExtendingList => 201,
            FaultKind::PatternInvalid => 300,
            FaultKind::PatternWithoutAnnotation => 301,
            FaultKind::PatternCanMatchEmpty => 302,
            FaultKind::PatternPartialWithCombinator => 303,
            FaultKind::InfixHasDuplicateIdentifier => 400,
            FaultKind::InfixHasSelfReferentialType => 401,
            FaultKind::InfixUsingListOperator => 402,
            FaultKind::PopulationInfixHasMultipleDeclarations => 403,
            FaultKind::PortabilityInfixHasMultipleDefinitions => 404,
            FaultKind::DuplicateReference => 500,
            FaultKind::UnresolvedResource => 501,
            FaultKind::InsecureResourceReference => 502,
            FaultKind::CircularResourceReference => 503,
        }
    }

    pub fn severity(&self) -> FaultSeverity {
        match self {
            FaultKind::TabsAndSpaces | FaultKind::PatternWithoutAnnotation => {
                FaultSeverity::Warning
            }
            _ => FaultSeverity::Error,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FaultKind::TabsAndSpaces => "Statement indent mixes tabs and spaces",
            FaultKind::StatementBeginsWithComma => "Statements cannot begin with a combinator",
            FaultKind::StatementBeginsWithEllipsis => "Statements cannot begin with an ellipsis",
            FaultKind::StatementBeginsWithEscapedSpace => {
                "Statements cannot begin with an escaped space"
            }
            FaultKind::StatementContainsOnlyEscapeCharacter => {
                "Statement contains only an escape character"
            }
            FaultKind::DuplicateDeclaration => "Duplicate declaration within one statement",
            FaultKind::ListIntrinsicExtendingList => "A list cannot be annotated with another list",
            FaultKind::PatternInvalid => "Pattern could not be parsed",
            FaultKind::PatternWithoutAnnotation => "Pattern declares no annotations",
            FaultKind::PatternCanMatchEmpty => "Pattern matches the empty string",
            FaultKind::PatternPartialWithCombinator => "Partial pattern matches the combinator",
            FaultKind::InfixHasDuplicateIdentifier => "Infix side repeats an identifier",
            FaultKind::InfixHasSelfReferentialType => {
                "Infix declares the same type on both sides"
            }
            FaultKind::InfixUsingListOperator => "Infix identifiers cannot use the list operator",
            FaultKind::PopulationInfixHasMultipleDeclarations => {
                "Population infix holds more than one declaration"
            }
            FaultKind::PortabilityInfixHasMultipleDefinitions => {
                "Portability infix duplicates a compatible definition"
            }
            FaultKind::DuplicateReference => "Duplicate reference to the same resource",
            FaultKind::UnresolvedResource => "Referenced resource could not be resolved",
            FaultKind::InsecureResourceReference => {
                "Remote document cannot reference a local resource"
            }
            FaultKind::CircularResourceReference => "Reference creates a resource cycle",
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == FaultSeverity::Error
    }
}

/// What a fault is raised against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FaultSource {
    Statement(StatementId),
    Span(SpanRef),
    Infix(InfixRef),
}

impl FaultSource {
    pub fn statement(&self) -> StatementId {
        match self {
            FaultSource::Statement(id) => *id,
            FaultSource::Span(span) => span.statement,
            FaultSource::Infix(infix) => infix.statement,
        }
    }
}

/// A single reported fault. The range is one-based column bounds within the
/// source line, derived from the source object at construction time.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Fault {
    pub kind: FaultKind,
    pub source: FaultSource,
    pub range: (u32, u32),
}

impl Fault {
    pub fn new(kind: FaultKind, source: FaultSource, range: (u32, u32)) -> Fault {
        Fault { kind, source, range }
    }

    pub fn severity(&self) -> FaultSeverity {
        self.kind.severity()
    }

    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.message())
    }
}
