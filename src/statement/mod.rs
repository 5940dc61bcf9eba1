//! One parsed source line.
//!
//! A [`Statement`] is immutable after construction apart from its disposed
//! mark: edits never mutate a statement, they replace it and dispose the old
//! one. Every line of a document becomes exactly one statement, including
//! unparsable ones. Unparsability is a [`StatementFlag::Cruft`] mark plus an
//! attached fault, never a missing statement.

pub mod parser;

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    fault::Fault,
    pattern::Pattern,
    subject::{ClarifierKey, Subject, Term},
    uri::KnownUri,
};
use std::sync::Arc;

/// Identity of a statement, stable across reordering within its document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StatementId(pub u32);

impl Display for StatementId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(EnumSetType, Debug)]
pub enum StatementFlag {
    Whitespace,
    Comment,
    Refresh,
    Vacuous,
    Cruft,
    Uri,
    Pattern,
    TotalPattern,
    PartialPattern,
}

/// Half-open byte range within a statement's source text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Boundary {
    pub start: usize,
    pub end: usize,
}

impl Boundary {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// One-based column range, the form faults carry.
    pub fn columns(&self) -> (u32, u32) {
        (self.start as u32 + 1, self.end as u32 + 1)
    }
}

/// A subject with its location in the source line.
#[derive(Debug, Clone)]
pub struct Span {
    pub boundary: Boundary,
    pub subject: Subject,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SpanSide {
    Declaration,
    Annotation,
}

/// Back-reference from a span to its statement. Spans are addressed by side
/// and position rather than pointer so that references stay valid in event
/// payloads after the statement is disposed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SpanRef {
    pub statement: StatementId,
    pub side: SpanSide,
    pub index: u16,
}

impl SpanRef {
    pub fn declaration(statement: StatementId, index: u16) -> SpanRef {
        SpanRef {
            statement,
            side: SpanSide::Declaration,
            index,
        }
    }

    pub fn annotation(statement: StatementId, index: u16) -> SpanRef {
        SpanRef {
            statement,
            side: SpanSide::Annotation,
            index,
        }
    }
}

/// Back-reference to an infix within a pattern declaration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct InfixRef {
    pub statement: StatementId,
    pub declaration: u16,
    pub infix: u16,
}

/// An object excluded from semantic analysis by an error-severity fault.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum CruftObject {
    Statement,
    Declaration(u16),
    Annotation(u16),
    Infix { declaration: u16, infix: u16 },
}

/// One parsed source line. See the module docs for the mutability contract.
#[derive(Debug)]
pub struct Statement {
    id: StatementId,
    source: String,
    indent: u32,
    joint_position: Option<usize>,
    sum: String,
    flags: EnumSet<StatementFlag>,
    declarations: Vec<Span>,
    annotations: Vec<Span>,
    faults: Vec<Fault>,
    cruft_objects: BTreeSet<CruftObject>,
    disposed: AtomicBool,
}

impl Statement {
    pub fn id(&self) -> StatementId {
        self.id
    }

    pub fn source_text(&self) -> &str {
        &self.source
    }

    /// Count of leading tab/space characters.
    pub fn indent(&self) -> u32 {
        self.indent
    }

    /// Byte offset of the joint operator, when one was reached.
    pub fn joint_position(&self) -> Option<usize> {
        self.joint_position
    }

    /// The trimmed annotation-side text; the input a total pattern is run
    /// against by the type analyzer.
    pub fn sum(&self) -> &str {
        &self.sum
    }

    pub fn flags(&self) -> EnumSet<StatementFlag> {
        self.flags
    }

    pub fn is_whitespace(&self) -> bool {
        self.flags.contains(StatementFlag::Whitespace)
    }

    pub fn is_comment(&self) -> bool {
        self.flags.contains(StatementFlag::Comment)
    }

    /// Comments and whitespace take no part in navigation or analysis.
    pub fn is_noop(&self) -> bool {
        self.is_comment() || self.is_whitespace()
    }

    pub fn is_refresh(&self) -> bool {
        self.flags.contains(StatementFlag::Refresh)
    }

    pub fn is_vacuous(&self) -> bool {
        self.flags.contains(StatementFlag::Vacuous)
    }

    pub fn is_cruft(&self) -> bool {
        self.flags.contains(StatementFlag::Cruft)
    }

    pub fn has_uri(&self) -> bool {
        self.flags.contains(StatementFlag::Uri)
    }

    pub fn has_pattern(&self) -> bool {
        self.flags.contains(StatementFlag::Pattern)
    }

    pub fn has_total_pattern(&self) -> bool {
        self.flags.contains(StatementFlag::TotalPattern)
    }

    pub fn has_partial_pattern(&self) -> bool {
        self.flags.contains(StatementFlag::PartialPattern)
    }

    pub fn declarations(&self) -> &[Span] {
        &self.declarations
    }

    pub fn annotations(&self) -> &[Span] {
        &self.annotations
    }

    /// The declared URI, when this is a URI statement.
    pub fn uri(&self) -> Option<&KnownUri> {
        self.declarations
            .iter()
            .find_map(|span| span.subject.as_uri())
    }

    /// The declared pattern, when this is a pattern statement.
    pub fn pattern(&self) -> Option<&Arc<Pattern>> {
        self.declarations
            .iter()
            .find_map(|span| span.subject.as_pattern())
    }

    /// The annotation terms, in declaration order; these clarify any phrase
    /// this statement's declarations produce.
    pub fn clarifiers(&self) -> Vec<Term> {
        self.annotations
            .iter()
            .filter_map(|span| span.subject.as_term().cloned())
            .collect()
    }

    pub fn clarifier_key(&self) -> ClarifierKey {
        ClarifierKey::of(&self.clarifiers())
    }

    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    pub fn cruft_objects(&self) -> &BTreeSet<CruftObject> {
        &self.cruft_objects
    }

    /// The comment body for comment statements: text after the comment token,
    /// trimmed.
    pub fn comment_text(&self) -> Option<&str> {
        if !self.is_comment() {
            return None;
        }
        let content = self.source.trim_start_matches([' ', '\t']);
        Some(content.trim_start_matches("//").trim())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Relaxed)
    }

    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::Relaxed);
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
