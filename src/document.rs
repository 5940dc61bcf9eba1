//! The document model: an ordered statement buffer with an indentation tree
//! superimposed on it, plus the document's phrase trie and reference
//! bookkeeping.
//!
//! Statements keep their positional slot for no-op lines (comments and
//! whitespace), so a statement's line number is simply its current index.
//! All navigation helpers skip no-ops while scanning.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
    sync::{atomic::AtomicBool, Arc},
};
use uuid::Uuid;

use crate::{
    fault::Fault,
    phrase::{Phrase, PhraseKey, PhraseStep},
    statement::{parser, CruftObject, Span, SpanRef, Statement, StatementId},
    subject::{ClarifierKey, Subject, TermTable},
    uri::KnownUri,
};

/// Stable identity of a document within its program. Survives URI changes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub(crate) fn generate() -> DocumentId {
        DocumentId(Uuid::new_v4())
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed document: ordered statements, dependency links, and the phrase
/// trie rooted at a zero-length phrase.
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    uri: KnownUri,
    statements: Vec<Arc<Statement>>,
    /// Maintained wholesale by the reference resolver, not by the edit
    /// engine; see the resolver for the replacement discipline.
    pub(crate) uri_statements: Vec<StatementId>,
    pub(crate) dependencies: Vec<DocumentId>,
    pub(crate) dependents: Vec<DocumentId>,
    version: u64,
    pub(crate) in_edit: Arc<AtomicBool>,
    next_statement: u32,
    root: Phrase,
    root_memo: Mutex<Option<Vec<Subject>>>,
    terms: Arc<RwLock<TermTable>>,
}

impl Document {
    pub(crate) fn new(
        id: DocumentId,
        uri: KnownUri,
        text: &str,
        terms: Arc<RwLock<TermTable>>,
    ) -> Document {
        let mut doc = Document {
            id,
            uri,
            statements: Vec::new(),
            uri_statements: Vec::new(),
            dependencies: Vec::new(),
            dependents: Vec::new(),
            version: 0,
            in_edit: Arc::new(AtomicBool::new(false)),
            next_statement: 0,
            root: Phrase::root(),
            root_memo: Mutex::new(None),
            terms,
        };
        for line in text.split('\n') {
            let statement = doc.parse_line(line);
            doc.statements.push(Arc::new(statement));
        }
        for index in 0..doc.statements.len() {
            doc.inflate_statement(index);
        }
        tracing::debug!(
            "parsed document {} ({} statements, {} phrases)",
            doc.id,
            doc.statements.len(),
            doc.root.size()
        );
        doc
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn uri(&self) -> &KnownUri {
        &self.uri
    }

    pub(crate) fn set_uri(&mut self, uri: KnownUri) {
        self.uri = uri;
    }

    /// Monotonic stamp, bumped at the end of every mutating transaction.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn statements(&self) -> &[Arc<Statement>] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statement_at(&self, line: usize) -> Option<&Arc<Statement>> {
        self.statements.get(line)
    }

    /// The current line number of a statement; its index in the buffer.
    pub fn line_of(&self, id: StatementId) -> Option<usize> {
        self.statements.iter().position(|s| s.id() == id)
    }

    pub fn statement_by_id(&self, id: StatementId) -> Option<&Arc<Statement>> {
        self.statements.iter().find(|s| s.id() == id)
    }

    pub fn dependencies(&self) -> &[DocumentId] {
        &self.dependencies
    }

    pub fn dependents(&self) -> &[DocumentId] {
        &self.dependents
    }

    /// The document's URI statements in document order.
    pub fn uri_statement_ids(&self) -> &[StatementId] {
        &self.uri_statements
    }

    /// Union of every statement's parse faults. Resolution faults live at
    /// the program level.
    pub fn parse_faults(&self) -> Vec<Fault> {
        self.statements
            .iter()
            .flat_map(|s| s.faults().iter().cloned())
            .collect()
    }

    pub(crate) fn parse_line(&mut self, line: &str) -> Statement {
        let id = StatementId(self.next_statement);
        self.next_statement += 1;
        let mut terms = self.terms.write();
        parser::parse(id, line, &mut terms)
    }

    pub(crate) fn statements_mut(&mut self) -> &mut Vec<Arc<Statement>> {
        &mut self.statements
    }

    pub(crate) fn clear_root_memo(&mut self) {
        *self.root_memo.lock() = None;
    }

    /// The distinct first-level subjects of the phrase trie, memoized until
    /// the next transaction.
    pub fn root_subjects(&self) -> Vec<Subject> {
        let mut memo = self.root_memo.lock();
        if let Some(subjects) = memo.as_ref() {
            return subjects.clone();
        }
        let mut seen = BTreeSet::new();
        let mut subjects = Vec::new();
        for key in self.root.forwardings().keys() {
            if seen.insert(key.subject.clone()) {
                subjects.push(key.subject.clone());
            }
        }
        *memo = Some(subjects.clone());
        subjects
    }

    // ------------------------------------------------------------------
    // Indentation navigation
    // ------------------------------------------------------------------

    /// Ancestor chain of the statement at `line`, root-most first, exclusive
    /// of the statement itself. Strictly indent-monotonic.
    pub fn get_ancestry(&self, line: usize) -> Vec<Arc<Statement>> {
        let Some(statement) = self.statements.get(line) else {
            return Vec::new();
        };
        let mut threshold = statement.indent();
        let mut chain = Vec::new();
        for candidate in self.statements[..line].iter().rev() {
            if threshold == 0 {
                break;
            }
            if candidate.is_noop() {
                continue;
            }
            if candidate.indent() < threshold {
                threshold = candidate.indent();
                chain.push(candidate.clone());
            }
        }
        chain.reverse();
        chain
    }

    /// The first non-noop predecessor with strictly smaller indent; `None`
    /// means the document itself is the parent.
    pub fn get_parent(&self, line: usize) -> Option<Arc<Statement>> {
        self.parent_index(line).map(|i| self.statements[i].clone())
    }

    pub(crate) fn parent_index(&self, line: usize) -> Option<usize> {
        let statement = self.statements.get(line)?;
        self.parent_index_from_position(line, statement.indent())
    }

    /// The parent an imaginary statement would have if inserted at
    /// `virtual_line` with `virtual_indent`.
    pub fn get_parent_from_position(
        &self,
        virtual_line: usize,
        virtual_indent: u32,
    ) -> Option<Arc<Statement>> {
        self.parent_index_from_position(virtual_line, virtual_indent)
            .map(|i| self.statements[i].clone())
    }

    pub(crate) fn parent_index_from_position(
        &self,
        virtual_line: usize,
        virtual_indent: u32,
    ) -> Option<usize> {
        if virtual_indent == 0 {
            return None;
        }
        let stop = virtual_line.min(self.statements.len());
        self.statements[..stop]
            .iter()
            .rposition(|s| !s.is_noop() && s.indent() < virtual_indent)
    }

    /// End (exclusive) of the descendant region of `line`: the first
    /// subsequent non-noop at the same or lower indent.
    pub(crate) fn descendant_end(&self, line: usize) -> usize {
        let Some(statement) = self.statements.get(line) else {
            return line;
        };
        let indent = statement.indent();
        for (offset, candidate) in self.statements[line + 1..].iter().enumerate() {
            if !candidate.is_noop() && candidate.indent() <= indent {
                return line + 1 + offset;
            }
        }
        self.statements.len()
    }

    pub fn has_descendants(&self, line: usize) -> bool {
        let Some(statement) = self.statements.get(line) else {
            return false;
        };
        if statement.is_noop() {
            return false;
        }
        self.statements[line + 1..self.descendant_end(line)]
            .iter()
            .any(|s| !s.is_noop())
    }

    /// Indices of the statements in the descendant region, optionally
    /// including `line` itself. No-op lines inside the region are included;
    /// they keep their positional slot.
    pub fn descendant_indices(&self, line: usize, include_initial: bool) -> Vec<usize> {
        let mut indices = Vec::new();
        if include_initial {
            indices.push(line);
        }
        indices.extend(line + 1..self.descendant_end(line));
        indices
    }

    pub fn each_descendant(&self, line: usize, include_initial: bool) -> Vec<Arc<Statement>> {
        self.descendant_indices(line, include_initial)
            .into_iter()
            .map(|i| self.statements[i].clone())
            .collect()
    }

    /// Children of the statement at `line`, or of the document itself when
    /// `line` is `None`. The lowest indent encountered in the region is
    /// taken as the child indent, which tolerates irregular indentation.
    pub fn get_children(&self, line: Option<usize>) -> Vec<Arc<Statement>> {
        let (start, end, parent_indent) = match line {
            Some(line) => match self.statements.get(line) {
                Some(statement) if !statement.is_noop() => {
                    (line + 1, self.descendant_end(line), Some(statement.indent()))
                }
                _ => return Vec::new(),
            },
            None => (0, self.statements.len(), None),
        };
        let region = &self.statements[start..end];
        let child_indent = region
            .iter()
            .filter(|s| !s.is_noop())
            .filter(|s| parent_indent.map(|p| s.indent() > p).unwrap_or(true))
            .map(|s| s.indent())
            .min();
        let Some(child_indent) = child_indent else {
            return Vec::new();
        };
        region
            .iter()
            .filter(|s| !s.is_noop() && s.indent() == child_indent)
            .cloned()
            .collect()
    }

    /// Statements sharing this statement's parent, excluding the statement
    /// itself. Empty for no-ops.
    pub fn get_siblings(&self, line: usize) -> Vec<Arc<Statement>> {
        let Some(statement) = self.statements.get(line) else {
            return Vec::new();
        };
        if statement.is_noop() {
            return Vec::new();
        }
        let parent = self.parent_index(line);
        let (start, end) = match parent {
            Some(p) => (p + 1, self.descendant_end(p)),
            None => (0, self.statements.len()),
        };
        (start..end)
            .filter(|&i| i != line)
            .filter(|&i| !self.statements[i].is_noop())
            .filter(|&i| self.parent_index(i) == parent)
            .map(|i| self.statements[i].clone())
            .collect()
    }

    /// The comment block directly above a statement: walking backwards,
    /// whitespace lines are skipped and comments at the statement's indent
    /// are collected until an op statement is reached. Returned in document
    /// order.
    pub fn get_notes(&self, line: usize) -> Vec<String> {
        let Some(statement) = self.statements.get(line) else {
            return Vec::new();
        };
        let indent = statement.indent();
        let mut notes = Vec::new();
        for candidate in self.statements[..line].iter().rev() {
            if candidate.is_whitespace() {
                continue;
            }
            if candidate.is_comment() {
                if candidate.indent() == indent {
                    if let Some(text) = candidate.comment_text() {
                        notes.push(text.to_string());
                    }
                }
                continue;
            }
            break;
        }
        notes.reverse();
        notes
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Reconstruct the document text. With `keep_original` the result is
    /// byte-identical to the loaded text; otherwise statements are re-emitted
    /// from their parsed form.
    pub fn to_text(&self, keep_original: bool) -> String {
        if keep_original {
            return self
                .statements
                .iter()
                .map(|s| s.source_text())
                .collect::<Vec<_>>()
                .join("\n");
        }
        self.statements
            .iter()
            .map(|s| normalized_statement_text(s))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Canonical single-line rendering of a fault raised in this document.
    pub fn render_fault(&self, fault: &Fault) -> String {
        let line = self
            .line_of(fault.source.statement())
            .map(|l| l + 1)
            .unwrap_or(0);
        let location = if self.uri.protocol().is_unaddressable() {
            String::new()
        } else {
            format!("{} ", self.uri.store_string())
        };
        let (start, end) = fault.range;
        if start >= end {
            format!("{} ({}Line {})", fault.kind.message(), location, line)
        } else {
            format!(
                "{} ({}Line {}, Col {}-{})",
                fault.kind.message(),
                location,
                line,
                start,
                end
            )
        }
    }

    // ------------------------------------------------------------------
    // Phrase graph
    // ------------------------------------------------------------------

    pub fn root_phrase(&self) -> &Phrase {
        &self.root
    }

    /// Spines of one declaration span: every root-to-leaf subject path formed
    /// by crossing the declarations of ancestor statements. One phrase per
    /// spine.
    pub(crate) fn spines_for(&self, line: usize) -> Vec<(SpanRef, Vec<PhraseStep>)> {
        let Some(statement) = self.statements.get(line) else {
            return Vec::new();
        };
        if statement.is_noop() || statement.is_cruft() {
            return Vec::new();
        }
        let ancestry = self.get_ancestry(line);
        let mut prefixes: Vec<Vec<PhraseStep>> = vec![Vec::new()];
        for ancestor in &ancestry {
            let steps = declaration_steps(ancestor);
            if steps.is_empty() {
                continue;
            }
            let mut crossed = Vec::with_capacity(prefixes.len() * steps.len());
            for prefix in &prefixes {
                for step in &steps {
                    let mut extended = prefix.clone();
                    extended.push(step.clone());
                    crossed.push(extended);
                }
            }
            prefixes = crossed;
        }
        let mut spines = Vec::new();
        for (index, span) in statement.declarations().iter().enumerate() {
            if !declarable(statement, span, index) {
                continue;
            }
            let span_ref = SpanRef::declaration(statement.id(), index as u16);
            let leaf = PhraseStep {
                subject: span.subject.clone(),
                clarifiers: statement.clarifiers(),
            };
            for prefix in &prefixes {
                let mut steps = prefix.clone();
                steps.push(leaf.clone());
                spines.push((span_ref, steps));
            }
        }
        spines
    }

    /// Inflate every spine of the statement at `line`. Returns the leaf
    /// paths that were (re)attested.
    pub(crate) fn inflate_statement(&mut self, line: usize) -> Vec<Vec<PhraseKey>> {
        let spines = self.spines_for(line);
        let mut paths = Vec::with_capacity(spines.len());
        for (span, steps) in spines {
            paths.push(self.root.inflate(&steps, span));
        }
        paths
    }

    /// Remove every phrase attestation of `statement` from the trie.
    pub(crate) fn deflate_statement(&mut self, statement: &Statement) {
        for index in 0..statement.declarations().len() {
            let span = SpanRef::declaration(statement.id(), index as u16);
            self.root.deflate(&span);
        }
    }

    pub fn phrase(&self, path: &[PhraseKey]) -> Option<&Phrase> {
        self.root.get(path)
    }

    /// Resolve a path of term texts through the trie, optionally narrowing
    /// the first step by clarifier key.
    ///
    /// A step matching more than one phrase beyond the first is ambiguous
    /// (a homograph mid-path) and contributes nothing. A step matching no
    /// phrase continues through a transient hypothetical phrase, which is
    /// returned detached and never registered in the trie.
    pub fn from_path_components(
        &self,
        components: &[&str],
        clarifier: Option<&ClarifierKey>,
    ) -> Vec<Phrase> {
        let Some((first, rest)) = components.split_first() else {
            return Vec::new();
        };
        let terms = self.terms.read();
        let first_subject = find_subject(&terms, first);
        let mut results = Vec::new();
        let starts: Vec<&Phrase> = match &first_subject {
            Some(subject) => {
                let mut hits = self.root.peek(subject);
                if let Some(clarifier) = clarifier {
                    hits.retain(|p| p.clarifier_key() == clarifier);
                }
                hits
            }
            None => Vec::new(),
        };
        if starts.is_empty() {
            // Unattested from the first component: the whole path is
            // hypothetical.
            if let Some(phrase) = self.hypothetical_from(Vec::new(), components, &terms) {
                results.push(phrase);
            }
            return results;
        }
        'start: for start in starts {
            let mut cursor = start;
            for (depth, component) in rest.iter().enumerate() {
                let Some(subject) = find_subject(&terms, component) else {
                    if let Some(phrase) =
                        self.hypothetical_from(cursor.path().to_vec(), &rest[depth..], &terms)
                    {
                        results.push(phrase);
                    }
                    continue 'start;
                };
                let hits = cursor.peek(&subject);
                match hits.len() {
                    0 => {
                        if let Some(phrase) =
                            self.hypothetical_from(cursor.path().to_vec(), &rest[depth..], &terms)
                        {
                            results.push(phrase);
                        }
                        continue 'start;
                    }
                    1 => cursor = hits[0],
                    _ => {
                        // Homograph beyond the first path step: ambiguous.
                        tracing::debug!(
                            "ambiguous path step '{component}' in document {}",
                            self.id
                        );
                        continue 'start;
                    }
                }
            }
            results.push(cursor.detached());
        }
        results
    }

    /// Single-result form of [`Document::from_path_components`].
    pub fn from_path(
        &self,
        components: &[&str],
        clarifier: Option<&ClarifierKey>,
    ) -> Option<Phrase> {
        let mut results = self.from_path_components(components, clarifier);
        if results.len() == 1 {
            results.pop()
        } else {
            None
        }
    }

    fn hypothetical_from(
        &self,
        base: Vec<PhraseKey>,
        components: &[&str],
        terms: &TermTable,
    ) -> Option<Phrase> {
        let mut path = base;
        let mut terminal = Subject::Void;
        for component in components {
            let subject = find_subject(terms, component)?;
            path.push(PhraseKey {
                subject: subject.clone(),
                clarifier: ClarifierKey::empty(),
            });
            terminal = subject;
        }
        Some(Phrase::hypothetical(path, terminal, Vec::new()))
    }
}

/// Re-emit a statement from its parsed form: single-space joint, comma-space
/// combinators. No-ops and cruft keep their original spelling.
fn normalized_statement_text(statement: &Statement) -> String {
    if statement.is_noop() || statement.is_cruft() {
        return statement.source_text().to_string();
    }
    let indent: String = statement
        .source_text()
        .chars()
        .take(statement.indent() as usize)
        .collect();
    let declarations = statement
        .declarations()
        .iter()
        .filter(|span| !span.subject.is_void())
        .map(|span| span.subject.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let annotations = statement
        .annotations()
        .iter()
        .map(|span| span.subject.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    match (statement.joint_position(), annotations.is_empty()) {
        (Some(_), _) if declarations.is_empty() => format!("{indent}:"),
        (Some(_), false) => format!("{indent}{declarations} : {annotations}"),
        (Some(_), true) => format!("{indent}{declarations} :"),
        (None, _) => format!("{indent}{declarations}"),
    }
}

/// Whether a declaration span contributes to the phrase graph. URIs and the
/// void subject do not form subject paths, and cruft spans are excluded from
/// analysis entirely.
fn declarable(statement: &Statement, span: &Span, index: usize) -> bool {
    if span.subject.as_uri().is_some() || span.subject.is_void() {
        return false;
    }
    !statement
        .cruft_objects()
        .contains(&CruftObject::Declaration(index as u16))
}

fn declaration_steps(statement: &Arc<Statement>) -> Vec<PhraseStep> {
    statement
        .declarations()
        .iter()
        .enumerate()
        .filter(|(index, span)| declarable(statement, span, *index))
        .map(|(_, span)| PhraseStep {
            subject: span.subject.clone(),
            clarifiers: statement.clarifiers(),
        })
        .collect()
}

fn find_subject(terms: &TermTable, text: &str) -> Option<Subject> {
    terms.find_spelling(text).map(Subject::Term)
}
