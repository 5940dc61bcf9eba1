//! The one-line statement parser.
//!
//! [`parse`] always succeeds in producing a [`Statement`], even for
//! unparsable input: the failure modes become cruft marks and faults on the
//! returned value. This keeps the one-statement-per-line invariant that the
//! document buffer and the edit engine rely on.

use enumset::EnumSet;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    fault::{Fault, FaultKind, FaultSource},
    pattern::{self, Infix, Pattern},
    scanner::{syntax, Scanner},
    statement::{
        Boundary, CruftObject, InfixRef, Span, SpanRef, Statement, StatementFlag, StatementId,
    },
    subject::{Subject, TermTable},
    uri::{KnownUri, UriProtocol},
};

/// Parse one source line into a statement. Never fails; see module docs.
pub(crate) fn parse(id: StatementId, source: &str, terms: &mut TermTable) -> Statement {
    Parser {
        id,
        source,
        scanner: Scanner::new(source),
        terms,
        flags: EnumSet::empty(),
        joint_position: None,
        sum: String::new(),
        declarations: Vec::new(),
        annotations: Vec::new(),
        faults: Vec::new(),
    }
    .run()
}

struct Parser<'a> {
    id: StatementId,
    source: &'a str,
    scanner: Scanner<'a>,
    terms: &'a mut TermTable,
    flags: EnumSet<StatementFlag>,
    joint_position: Option<usize>,
    sum: String,
    declarations: Vec<Span>,
    annotations: Vec<Span>,
    faults: Vec<Fault>,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Statement {
        let indent = self.read_indent();

        if !self.scanner.more() {
            self.flags |= StatementFlag::Whitespace;
            return self.finish(indent);
        }
        if self.try_comment() {
            self.flags |= StatementFlag::Comment;
            return self.finish(indent);
        }
        if let Some(kind) = self.unparsable_prefix() {
            self.statement_fault(kind, indent);
            return self.finish(indent);
        }
        if self.try_uri() {
            // URI statements carry no annotations; nothing further to read.
            return self.finish(indent);
        }

        let pattern_parse = self.try_pattern_units(indent);
        let pattern_parse = match pattern_parse {
            PatternProbe::Invalid => return self.finish(indent),
            other => other,
        };
        if matches!(pattern_parse, PatternProbe::Absent) {
            self.read_declarations();
        }
        self.read_joint();
        if self.joint_position.is_some() {
            self.read_annotations();
        }

        if let PatternProbe::Parsed {
            units,
            total,
            boundary,
        } = pattern_parse
        {
            self.assemble_pattern(units, total, boundary, indent);
        }

        self.finalize_flags();
        self.validate();
        self.finish(indent)
    }

    fn read_indent(&mut self) -> u32 {
        let indent_text = self.scanner.read_whitespace();
        let indent = indent_text.chars().count() as u32;
        if indent_text.contains(syntax::SPACE) && indent_text.contains(syntax::TAB) {
            self.faults.push(Fault::new(
                FaultKind::TabsAndSpaces,
                FaultSource::Statement(self.id),
                (1, indent + 1),
            ));
        }
        indent
    }

    fn try_comment(&mut self) -> bool {
        let save = self.scanner.position();
        if self.scanner.read(syntax::COMMENT)
            && (!self.scanner.more()
                || self.scanner.peek_char(syntax::SPACE)
                || self.scanner.peek_char(syntax::TAB))
        {
            return true;
        }
        self.scanner.set_position(save);
        false
    }

    fn unparsable_prefix(&mut self) -> Option<FaultKind> {
        if self.scanner.peek_char(syntax::COMBINATOR) {
            return Some(FaultKind::StatementBeginsWithComma);
        }
        if self.scanner.peek(syntax::ELLIPSIS) {
            return Some(FaultKind::StatementBeginsWithEllipsis);
        }
        if self.scanner.peek("\\ ") || self.scanner.peek("\\\t") {
            return Some(FaultKind::StatementBeginsWithEscapedSpace);
        }
        if self.scanner.rest() == "\\" {
            return Some(FaultKind::StatementContainsOnlyEscapeCharacter);
        }
        None
    }

    /// Attempt to read the whole remaining content as a URI statement. Only
    /// commits when the token consumes the line (up to trailing whitespace).
    fn try_uri(&mut self) -> bool {
        let prefixed = UriProtocol::ALL
            .iter()
            .any(|p| self.scanner.peek(&p.source_prefix()));
        if !prefixed {
            return false;
        }
        let save = self.scanner.position();
        let start = self.scanner.position();
        let token = self.scanner.read_until(&[" ", "\t"]);
        let mut probe = self.scanner.clone();
        probe.read_whitespace();
        if probe.more() {
            self.scanner.set_position(save);
            return false;
        }
        match KnownUri::parse(token) {
            Ok(uri) => {
                self.flags |= StatementFlag::Uri;
                self.declarations.push(Span {
                    boundary: Boundary {
                        start,
                        end: start + token.len(),
                    },
                    subject: Subject::Uri(uri),
                });
                true
            }
            Err(_) => {
                self.scanner.set_position(save);
                false
            }
        }
    }

    fn try_pattern_units(&mut self, indent: u32) -> PatternProbe {
        if !self.scanner.peek_char(syntax::PATTERN_DELIMITER) {
            return PatternProbe::Absent;
        }
        let start = self.scanner.position();
        self.scanner.read_char(syntax::PATTERN_DELIMITER);
        match pattern::parser::parse_body(&mut self.scanner, self.terms) {
            Ok(body) => PatternProbe::Parsed {
                units: body.units,
                total: body.total,
                boundary: Boundary {
                    start,
                    end: self.scanner.position(),
                },
            },
            Err(error) => {
                tracing::debug!("pattern rejected at offset {start}: {error}");
                self.statement_fault(FaultKind::PatternInvalid, indent);
                PatternProbe::Invalid
            }
        }
    }

    fn read_declarations(&mut self) {
        loop {
            self.scanner.read_whitespace();
            if !self.scanner.more() || self.joint_ahead() {
                return;
            }
            if self.scanner.read_char(syntax::COMBINATOR) {
                continue;
            }
            match self.read_identifier() {
                Some((spelling, list, boundary)) => {
                    let term = self.terms.intern(&spelling, list);
                    self.declarations.push(Span {
                        boundary,
                        subject: Subject::Term(term),
                    });
                }
                None => return,
            }
        }
    }

    fn read_joint(&mut self) {
        self.scanner.read_whitespace();
        if self.joint_ahead() {
            self.joint_position = Some(self.scanner.position());
            self.scanner.read_char(syntax::JOINT);
            self.scanner.read_whitespace();
        }
    }

    fn read_annotations(&mut self) {
        let Some(joint) = self.joint_position else {
            return;
        };
        self.sum = self.source[joint + 1..].trim().to_string();
        loop {
            self.scanner.read_whitespace();
            if !self.scanner.more() {
                return;
            }
            if self.scanner.read_char(syntax::COMBINATOR) {
                continue;
            }
            match self.read_identifier() {
                Some((spelling, list, boundary)) => {
                    let term = self.terms.intern(&spelling, list);
                    self.annotations.push(Span {
                        boundary,
                        subject: Subject::Term(term),
                    });
                }
                None => return,
            }
        }
    }

    /// Read one identifier up to an unescaped combinator, a joint operator,
    /// or the end of the line. Escapes decode into the spelling; a trailing
    /// run of three unescaped dots is the list marker.
    fn read_identifier(&mut self) -> Option<(String, bool, Boundary)> {
        let mut graphemes = Vec::new();
        let mut start = None;
        let mut end = self.scanner.position();
        loop {
            if !self.scanner.more()
                || self.scanner.peek_char(syntax::COMBINATOR)
                || self.joint_ahead()
            {
                break;
            }
            let before = self.scanner.position();
            let Some(grapheme) = self.scanner.read_grapheme() else {
                break;
            };
            if grapheme.is_whitespace() && graphemes.is_empty() {
                continue;
            }
            if start.is_none() {
                start = Some(before);
            }
            graphemes.push(grapheme);
            end = self.scanner.position();
        }
        // Trailing whitespace graphemes are unescaped, so their literal
        // length equals their source length and the boundary math holds.
        while graphemes.last().map(|g| g.is_whitespace()) == Some(true) {
            if let Some(g) = graphemes.pop() {
                end -= g.literal.len();
            }
        }
        let start = start?;
        if graphemes.is_empty() {
            return None;
        }
        let list = graphemes.len() > 3
            && graphemes[graphemes.len() - 3..]
                .iter()
                .all(|g| g.is_unescaped('.'));
        if list {
            graphemes.truncate(graphemes.len() - 3);
        }
        let spelling: String = graphemes.iter().map(|g| g.literal.as_str()).collect();
        Some((spelling, list, Boundary { start, end }))
    }

    fn joint_ahead(&self) -> bool {
        let mut probe = self.scanner.clone();
        if !probe.read_char(syntax::JOINT) {
            return false;
        }
        !probe.more() || probe.peek_char(syntax::SPACE) || probe.peek_char(syntax::TAB)
    }

    /// Build the pattern subject once annotations are known (they seed the
    /// identity digest), and run the pattern-specific validations.
    fn assemble_pattern(
        &mut self,
        units: Vec<pattern::RegexUnit>,
        total: bool,
        boundary: Boundary,
        indent: u32,
    ) {
        let annotation_texts: Vec<String> = self
            .annotations
            .iter()
            .map(|span| self.source[span.boundary.start..span.boundary.end].to_string())
            .collect();
        let text_refs: Vec<&str> = annotation_texts.iter().map(String::as_str).collect();
        let source_slice = &self.source[boundary.start..boundary.end];
        let pattern = match Pattern::new(source_slice, units, total, &text_refs) {
            Ok(pattern) => pattern,
            Err(error) => {
                tracing::debug!("pattern assembly failed: {error}");
                self.statement_fault(FaultKind::PatternInvalid, indent);
                return;
            }
        };

        self.flags |= StatementFlag::Pattern;
        self.flags |= if total {
            StatementFlag::TotalPattern
        } else {
            StatementFlag::PartialPattern
        };
        if self.annotations.is_empty() {
            self.statement_fault(FaultKind::PatternWithoutAnnotation, indent);
        }
        if pattern.can_match_empty() {
            self.statement_fault(FaultKind::PatternCanMatchEmpty, indent);
        }
        if !total && pattern.matches(&syntax::COMBINATOR.to_string()) {
            self.statement_fault(FaultKind::PatternPartialWithCombinator, indent);
        }
        self.validate_infixes(&pattern);

        // The pattern is the sole declaration of its statement.
        self.declarations.insert(
            0,
            Span {
                boundary,
                subject: Subject::Pattern(Arc::new(pattern)),
            },
        );
    }

    fn validate_infixes(&mut self, pattern: &Pattern) {
        let infixes: Vec<(u16, Infix)> = pattern
            .infixes()
            .cloned()
            .enumerate()
            .map(|(idx, infix)| (idx as u16, infix))
            .collect();
        let mut portability_seen: Vec<(u16, BTreeSet<crate::subject::TermId>)> = Vec::new();
        for (index, infix) in &infixes {
            let infix_ref = InfixRef {
                statement: self.id,
                declaration: 0,
                infix: *index,
            };
            for side in [&infix.declarations, &infix.annotations] {
                for (pos, entry) in side.iter().enumerate() {
                    if side[..pos].iter().any(|prior| prior.term == entry.term) {
                        self.faults.push(Fault::new(
                            FaultKind::InfixHasDuplicateIdentifier,
                            FaultSource::Infix(infix_ref),
                            entry.boundary.columns(),
                        ));
                    }
                    if entry.term.is_list() {
                        self.faults.push(Fault::new(
                            FaultKind::InfixUsingListOperator,
                            FaultSource::Infix(infix_ref),
                            entry.boundary.columns(),
                        ));
                    }
                }
            }
            for declared in &infix.declarations {
                if infix.annotations.iter().any(|a| a.term == declared.term) {
                    self.faults.push(Fault::new(
                        FaultKind::InfixHasSelfReferentialType,
                        FaultSource::Infix(infix_ref),
                        declared.boundary.columns(),
                    ));
                }
            }
            if infix.is_population() && infix.declarations.len() > 1 {
                self.faults.push(Fault::new(
                    FaultKind::PopulationInfixHasMultipleDeclarations,
                    FaultSource::Infix(infix_ref),
                    infix.boundary.columns(),
                ));
            }
            if infix.is_portability() {
                let types: BTreeSet<_> =
                    infix.annotations.iter().map(|a| a.term.id()).collect();
                let clashes = portability_seen
                    .iter()
                    .any(|(_, prior)| !prior.is_disjoint(&types));
                if clashes {
                    self.faults.push(Fault::new(
                        FaultKind::PortabilityInfixHasMultipleDefinitions,
                        FaultSource::Infix(infix_ref),
                        infix.boundary.columns(),
                    ));
                }
                portability_seen.push((*index, types));
            }
        }
    }

    fn finalize_flags(&mut self) {
        if self.joint_position.is_some()
            && self.declarations.is_empty()
            && self.annotations.is_empty()
        {
            let joint = self.joint_position.unwrap_or_default();
            self.declarations.push(Span {
                boundary: Boundary {
                    start: joint,
                    end: joint + 1,
                },
                subject: Subject::Void,
            });
            self.flags |= StatementFlag::Vacuous;
        } else if self.joint_position.is_some()
            && !self.declarations.is_empty()
            && self.annotations.is_empty()
        {
            self.flags |= StatementFlag::Refresh;
        }
    }

    fn validate(&mut self) {
        // Duplicate declaration subjects: every occurrence after the first.
        for index in 1..self.declarations.len() {
            let (earlier, rest) = self.declarations.split_at(index);
            let span = &rest[0];
            if earlier.iter().any(|e| e.subject == span.subject) {
                self.faults.push(Fault::new(
                    FaultKind::DuplicateDeclaration,
                    FaultSource::Span(SpanRef::declaration(self.id, index as u16)),
                    span.boundary.columns(),
                ));
            }
        }
        // A list declaration cannot be annotated by another list.
        let declares_list = self
            .declarations
            .iter()
            .any(|span| span.subject.as_term().map(|t| t.is_list()) == Some(true));
        if declares_list {
            for (index, span) in self.annotations.iter().enumerate() {
                if span.subject.as_term().map(|t| t.is_list()) == Some(true) {
                    self.faults.push(Fault::new(
                        FaultKind::ListIntrinsicExtendingList,
                        FaultSource::Span(SpanRef::annotation(self.id, index as u16)),
                        span.boundary.columns(),
                    ));
                }
            }
        }
    }

    fn statement_fault(&mut self, kind: FaultKind, indent: u32) {
        self.faults.push(Fault::new(
            kind,
            FaultSource::Statement(self.id),
            (indent + 1, self.source.len() as u32 + 1),
        ));
    }

    fn finish(self, indent: u32) -> Statement {
        let mut flags = self.flags;
        let mut cruft_objects = BTreeSet::new();
        for fault in &self.faults {
            if !fault.is_error() {
                continue;
            }
            let object = match fault.source {
                FaultSource::Statement(_) => CruftObject::Statement,
                FaultSource::Span(span) => match span.side {
                    super::SpanSide::Declaration => CruftObject::Declaration(span.index),
                    super::SpanSide::Annotation => CruftObject::Annotation(span.index),
                },
                FaultSource::Infix(infix) => CruftObject::Infix {
                    declaration: infix.declaration,
                    infix: infix.infix,
                },
            };
            if object == CruftObject::Statement {
                flags |= StatementFlag::Cruft;
            }
            cruft_objects.insert(object);
        }
        Statement {
            id: self.id,
            source: self.source.to_string(),
            indent,
            joint_position: self.joint_position,
            sum: self.sum,
            flags,
            declarations: self.declarations,
            annotations: self.annotations,
            faults: self.faults,
            cruft_objects,
            disposed: Default::default(),
        }
    }
}

enum PatternProbe {
    Absent,
    Invalid,
    Parsed {
        units: Vec<pattern::RegexUnit>,
        total: bool,
        boundary: Boundary,
    },
}
