//! The edit transaction engine.
//!
//! A transaction records `delete`/`insert`/`update` calls against a document
//! and applies them as one unit: classify the batch, take a fast path when
//! the shape allows it, otherwise compute the minimal set of invalidated
//! parent statements, and emit exactly one invalidate/revalidate pair when
//! any op statement is touched. Statements are never mutated: replaced ones
//! are disposed and deflated from the phrase trie, replacements are parsed
//! fresh and inflated.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::{
    document::Document,
    error::TruthError,
    event::Cause,
    phrase::PhraseKey,
    statement::{Statement, StatementId},
};

/// One recorded mutation. Positions are statement indices at the time the
/// call is applied; calls apply in recorded order.
#[derive(Debug, Clone)]
pub enum EditCall {
    Delete { at: usize, count: usize },
    Insert { at: usize, text: String },
    Update { at: usize, text: String },
}

/// Handed to the mutator closure of a transaction; records calls without
/// applying them.
#[derive(Debug, Default)]
pub struct EditRecorder {
    calls: Vec<EditCall>,
}

impl EditRecorder {
    pub fn delete(&mut self, at: usize, count: usize) {
        self.calls.push(EditCall::Delete { at, count });
    }

    pub fn insert(&mut self, text: impl Into<String>, at: usize) {
        self.calls.push(EditCall::Insert {
            at,
            text: text.into(),
        });
    }

    pub fn update(&mut self, text: impl Into<String>, at: usize) {
        self.calls.push(EditCall::Update {
            at,
            text: text.into(),
        });
    }

    pub(crate) fn into_calls(self) -> Vec<EditCall> {
        self.calls
    }
}

/// Editor-style range edit, converted to edit calls by
/// [`Program::edit_atomic`](crate::program::Program::edit_atomic). Columns
/// are byte offsets into the line.
#[derive(Debug, Clone)]
pub struct RangeEdit {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
    pub text: String,
}

/// What a transaction did, for the program to finalize: the causes to
/// publish, the URI-statement deltas for the resolver, and the phrase paths
/// to queue for verification.
#[derive(Debug, Default)]
pub(crate) struct TransactionOutcome {
    pub causes: Vec<Cause>,
    pub mutated: bool,
    pub added_uri: Vec<StatementId>,
    pub removed_uri: Vec<StatementId>,
    pub inflated: Vec<Vec<PhraseKey>>,
}

impl TransactionOutcome {
    fn track_removed(&mut self, statement: &Statement) {
        if statement.has_uri() {
            self.removed_uri.push(statement.id());
        }
    }

    fn track_added(&mut self, statement: &Statement) {
        if statement.has_uri() {
            self.added_uri.push(statement.id());
        }
    }
}

pub(crate) fn apply(
    doc: &mut Document,
    calls: Vec<EditCall>,
) -> Result<TransactionOutcome, TruthError> {
    if calls.is_empty() {
        return Ok(TransactionOutcome::default());
    }
    validate_positions(doc, &calls)?;

    let all = |pred: fn(&EditCall) -> bool| calls.iter().all(pred);
    if all(|c| matches!(c, EditCall::Update { .. })) {
        if let Some(outcome) = try_pure_updates(doc, &calls) {
            return Ok(outcome);
        }
    } else if all(|c| matches!(c, EditCall::Delete { .. })) {
        if let Some(outcome) = try_pure_leaf_deletes(doc, &calls) {
            return Ok(outcome);
        }
    } else if all(|c| matches!(c, EditCall::Insert { .. })) {
        if let Some(outcome) = try_pure_noop_inserts(doc, &calls) {
            return Ok(outcome);
        }
    }
    Ok(general_path(doc, calls))
}

/// Fail fast on positions that are out of range against the pre-transaction
/// buffer, before anything mutates.
fn validate_positions(doc: &Document, calls: &[EditCall]) -> Result<(), TruthError> {
    let length = doc.len();
    for call in calls {
        let bad = match call {
            EditCall::Delete { at, count } => match at.checked_add(*count) {
                Some(end) => end > length,
                None => true,
            },
            EditCall::Update { at, .. } => *at >= length,
            // Inserts clamp to the end of the buffer.
            EditCall::Insert { .. } => false,
        };
        if bad {
            let (EditCall::Delete { at, .. } | EditCall::Update { at, .. } | EditCall::Insert { at, .. }) =
                call;
            return Err(TruthError::PositionOutOfRange {
                document: doc.id(),
                position: *at,
                length,
            });
        }
    }
    Ok(())
}

/// Fast path 1: updates only, none of which changes the structure (same
/// indent, or no-op on both sides). Later updates to the same index override
/// earlier ones.
fn try_pure_updates(doc: &mut Document, calls: &[EditCall]) -> Option<TransactionOutcome> {
    let mut latest: BTreeMap<usize, &str> = BTreeMap::new();
    for call in calls {
        if let EditCall::Update { at, text } = call {
            latest.insert(*at, text.as_str());
        }
    }
    let mut replacements: Vec<(usize, Arc<Statement>)> = Vec::with_capacity(latest.len());
    for (&at, text) in &latest {
        let parsed = Arc::new(doc.parse_line(text));
        let old = doc.statement_at(at)?;
        let structural = old.indent() != parsed.indent() && !(old.is_noop() && parsed.is_noop());
        if structural {
            return None;
        }
        replacements.push((at, parsed));
    }

    let mut outcome = TransactionOutcome {
        mutated: true,
        ..Default::default()
    };
    let op_involved = replacements.iter().any(|(at, parsed)| {
        !parsed.is_noop() || !doc.statements()[*at].is_noop()
    });

    let old_statements: Vec<Arc<Statement>> = replacements
        .iter()
        .map(|(at, _)| doc.statements()[*at].clone())
        .collect();
    let indices: Vec<usize> = replacements.iter().map(|(at, _)| *at).collect();

    if op_involved {
        outcome.causes.push(Cause::Invalidate {
            document: doc.id(),
            statements: old_statements.clone(),
            indices: indices.clone(),
        });
    }
    for (old, (at, parsed)) in old_statements.iter().zip(&replacements) {
        doc.deflate_statement(old);
        old.dispose();
        outcome.track_removed(old);
        outcome.track_added(parsed);
        doc.statements_mut()[*at] = parsed.clone();
    }
    for &at in &indices {
        let inflated = doc.inflate_statement(at);
        outcome.inflated.extend(inflated);
    }
    if op_involved {
        outcome.causes.push(Cause::Revalidate {
            document: doc.id(),
            statements: replacements.iter().map(|(_, s)| s.clone()).collect(),
            indices,
        });
    }
    Some(outcome)
}

/// Fast path 2: deletes only, every deleted statement a leaf. Pure no-op
/// deletions apply without any broadcast.
fn try_pure_leaf_deletes(doc: &mut Document, calls: &[EditCall]) -> Option<TransactionOutcome> {
    let mut targets: BTreeSet<usize> = BTreeSet::new();
    for call in calls {
        if let EditCall::Delete { at, count } = call {
            targets.extend(*at..*at + *count);
        }
    }
    if targets.iter().any(|&at| doc.has_descendants(at)) {
        return None;
    }
    let mut outcome = TransactionOutcome {
        mutated: true,
        ..Default::default()
    };
    let indices: Vec<usize> = targets.iter().copied().collect();
    let old_statements: Vec<Arc<Statement>> =
        indices.iter().map(|&at| doc.statements()[at].clone()).collect();
    let op_involved = old_statements.iter().any(|s| !s.is_noop());

    if op_involved {
        outcome.causes.push(Cause::Invalidate {
            document: doc.id(),
            statements: old_statements.clone(),
            indices: indices.clone(),
        });
    }
    for (at, statement) in indices.iter().rev().zip(old_statements.iter().rev()) {
        doc.deflate_statement(statement);
        statement.dispose();
        outcome.track_removed(statement);
        doc.statements_mut().remove(*at);
    }
    if op_involved {
        outcome.causes.push(Cause::Revalidate {
            document: doc.id(),
            statements: Vec::new(),
            indices: Vec::new(),
        });
    }
    Some(outcome)
}

/// Fast path 3: inserts only, every inserted line a no-op. Applied without
/// any invalidate/revalidate broadcast.
fn try_pure_noop_inserts(doc: &mut Document, calls: &[EditCall]) -> Option<TransactionOutcome> {
    let mut parsed: Vec<(usize, Arc<Statement>)> = Vec::with_capacity(calls.len());
    for call in calls {
        if let EditCall::Insert { at, text } = call {
            let statement = Arc::new(doc.parse_line(text));
            if !statement.is_noop() {
                return None;
            }
            parsed.push((*at, statement));
        }
    }
    for (at, statement) in parsed {
        let at = at.min(doc.len());
        doc.statements_mut().insert(at, statement);
    }
    Some(TransactionOutcome {
        mutated: true,
        ..Default::default()
    })
}

/// The general path: compute the minimal invalidated-parent set, broadcast,
/// mutate, re-inflate survivors, broadcast again.
fn general_path(doc: &mut Document, calls: Vec<EditCall>) -> TransactionOutcome {
    let mut outcome = TransactionOutcome {
        mutated: true,
        ..Default::default()
    };

    // Parse replacement statements up front; classification needs their
    // indent and op-ness.
    let parsed: Vec<Option<Arc<Statement>>> = calls
        .iter()
        .map(|call| match call {
            EditCall::Insert { text, .. } | EditCall::Update { text, .. } => {
                Some(Arc::new(doc.parse_line(text)))
            }
            EditCall::Delete { .. } => None,
        })
        .collect();

    let mut whole_document = false;
    let mut parents: BTreeSet<usize> = BTreeSet::new();
    let invalidate =
        |parent: Option<usize>, whole_document: &mut bool, parents: &mut BTreeSet<usize>| {
            match parent {
                Some(index) => {
                    parents.insert(index);
                }
                None => *whole_document = true,
            }
        };
    for (call, replacement) in calls.iter().zip(&parsed) {
        match call {
            EditCall::Delete { at, count } => {
                for index in *at..*at + *count {
                    if !doc.statements()[index].is_noop() {
                        invalidate(doc.parent_index(index), &mut whole_document, &mut parents);
                    }
                }
            }
            EditCall::Insert { at, .. } => {
                let statement = replacement.as_ref().expect("inserts parse above");
                if !statement.is_noop() {
                    invalidate(
                        doc.parent_index_from_position(*at, statement.indent()),
                        &mut whole_document,
                        &mut parents,
                    );
                }
            }
            EditCall::Update { at, .. } => {
                let statement = replacement.as_ref().expect("updates parse above");
                let old = &doc.statements()[*at];
                if !statement.is_noop() {
                    invalidate(
                        doc.parent_index_from_position(*at, statement.indent()),
                        &mut whole_document,
                        &mut parents,
                    );
                }
                if !old.is_noop() {
                    invalidate(doc.parent_index(*at), &mut whole_document, &mut parents);
                }
            }
        }
    }

    // Keep only the highest ancestor of each invalidated chain.
    let pruned: Vec<usize> = parents
        .iter()
        .copied()
        .filter(|&index| {
            let mut cursor = doc.parent_index(index);
            while let Some(ancestor) = cursor {
                if parents.contains(&ancestor) {
                    return false;
                }
                cursor = doc.parent_index(ancestor);
            }
            true
        })
        .collect();

    if whole_document {
        tracing::debug!("whole-document invalidation of {}", doc.id());
        outcome.causes.push(Cause::Invalidate {
            document: doc.id(),
            statements: Vec::new(),
            indices: Vec::new(),
        });
        for statement in doc.statements().to_vec() {
            doc.deflate_statement(&statement);
        }
        apply_mutations(doc, &calls, &parsed, &mut outcome);
        for index in 0..doc.len() {
            let inflated = doc.inflate_statement(index);
            outcome.inflated.extend(inflated);
        }
        outcome.causes.push(Cause::Revalidate {
            document: doc.id(),
            statements: Vec::new(),
            indices: Vec::new(),
        });
        return outcome;
    }

    let parent_statements: Vec<Arc<Statement>> = pruned
        .iter()
        .map(|&index| doc.statements()[index].clone())
        .collect();
    outcome.causes.push(Cause::Invalidate {
        document: doc.id(),
        statements: parent_statements.clone(),
        indices: pruned.clone(),
    });

    for &index in &pruned {
        for region_index in doc.descendant_indices(index, true) {
            let statement = doc.statements()[region_index].clone();
            doc.deflate_statement(&statement);
        }
    }

    apply_mutations(doc, &calls, &parsed, &mut outcome);

    // Parents deleted by the transaction drop out of the revalidate set.
    let mut survivors: Vec<(usize, Arc<Statement>)> = Vec::new();
    for statement in &parent_statements {
        if statement.is_disposed() {
            continue;
        }
        if let Some(line) = doc.line_of(statement.id()) {
            survivors.push((line, statement.clone()));
        }
    }
    survivors.sort_by_key(|(line, _)| *line);

    let mut inflated_regions: BTreeSet<usize> = BTreeSet::new();
    for (line, _) in &survivors {
        inflated_regions.extend(doc.descendant_indices(*line, true));
    }
    for index in inflated_regions {
        let inflated = doc.inflate_statement(index);
        outcome.inflated.extend(inflated);
    }

    outcome.causes.push(Cause::Revalidate {
        document: doc.id(),
        statements: survivors.iter().map(|(_, s)| s.clone()).collect(),
        indices: survivors.iter().map(|(line, _)| *line).collect(),
    });
    outcome
}

/// Apply the recorded calls in order against the evolving buffer. Deleted
/// and replaced statements are disposed here; inflation is the caller's
/// responsibility.
fn apply_mutations(
    doc: &mut Document,
    calls: &[EditCall],
    parsed: &[Option<Arc<Statement>>],
    outcome: &mut TransactionOutcome,
) {
    for (call, replacement) in calls.iter().zip(parsed) {
        match call {
            EditCall::Delete { at, count } => {
                for _ in 0..*count {
                    if *at >= doc.len() {
                        break;
                    }
                    let statement = doc.statements_mut().remove(*at);
                    statement.dispose();
                    outcome.track_removed(&statement);
                }
            }
            EditCall::Insert { at, .. } => {
                let statement = replacement.clone().expect("inserts parse above");
                outcome.track_added(&statement);
                let at = (*at).min(doc.len());
                doc.statements_mut().insert(at, statement);
            }
            EditCall::Update { at, .. } => {
                let statement = replacement.clone().expect("updates parse above");
                if *at < doc.len() {
                    let old = doc.statements_mut()[*at].clone();
                    old.dispose();
                    outcome.track_removed(&old);
                    outcome.track_added(&statement);
                    doc.statements_mut()[*at] = statement;
                }
            }
        }
    }
}

/// Convert editor-style range edits into edit calls, simulating the evolving
/// line buffer so later ranges see earlier results. The common shapes map to
/// single calls; the fallback replaces the whole affected line range.
pub(crate) fn convert_range_edits(doc: &Document, edits: &[RangeEdit]) -> Vec<EditCall> {
    let mut lines: Vec<String> = doc
        .statements()
        .iter()
        .map(|s| s.source_text().to_string())
        .collect();
    let mut calls = Vec::new();
    for edit in edits {
        let start_line = edit.start_line.min(lines.len().saturating_sub(1));
        let end_line = edit.end_line.min(lines.len().saturating_sub(1));

        // Pure update within one line.
        if edit.start_line == edit.end_line
            && !edit.text.contains('\n')
            && start_line < lines.len()
        {
            let line = &lines[start_line];
            let start_col = edit.start_col.min(line.len());
            let end_col = edit.end_col.clamp(start_col, line.len());
            let new_line = format!("{}{}{}", &line[..start_col], edit.text, &line[end_col..]);
            calls.push(EditCall::Update {
                at: start_line,
                text: new_line.clone(),
            });
            lines[start_line] = new_line;
            continue;
        }

        // Pure deletion of whole lines.
        if edit.text.is_empty()
            && edit.start_col == 0
            && edit.end_col == 0
            && edit.end_line > edit.start_line
        {
            let count = edit.end_line - edit.start_line;
            calls.push(EditCall::Delete {
                at: edit.start_line,
                count,
            });
            lines.drain(edit.start_line..(edit.start_line + count).min(lines.len()));
            continue;
        }

        // Pure insertion of whole lines at a line boundary.
        if edit.start_line == edit.end_line
            && edit.start_col == 0
            && edit.end_col == 0
            && edit.text.ends_with('\n')
        {
            let mut at = edit.start_line;
            for inserted in edit.text[..edit.text.len() - 1].split('\n') {
                calls.push(EditCall::Insert {
                    at,
                    text: inserted.to_string(),
                });
                lines.insert(at.min(lines.len()), inserted.to_string());
                at += 1;
            }
            continue;
        }

        // Fallback: delete the affected lines and insert the spliced result.
        if lines.is_empty() {
            for (offset, inserted) in edit.text.split('\n').enumerate() {
                calls.push(EditCall::Insert {
                    at: offset,
                    text: inserted.to_string(),
                });
                lines.insert(offset.min(lines.len()), inserted.to_string());
            }
            continue;
        }
        let prefix = {
            let line = &lines[start_line];
            line[..edit.start_col.min(line.len())].to_string()
        };
        let suffix = {
            let line = &lines[end_line];
            line[edit.end_col.min(line.len())..].to_string()
        };
        let combined = format!("{prefix}{}{suffix}", edit.text);
        let affected = end_line - start_line + 1;
        calls.push(EditCall::Delete {
            at: start_line,
            count: affected,
        });
        lines.drain(start_line..(start_line + affected).min(lines.len()));
        for (offset, inserted) in combined.split('\n').enumerate() {
            calls.push(EditCall::Insert {
                at: start_line + offset,
                text: inserted.to_string(),
            });
            lines.insert((start_line + offset).min(lines.len()), inserted.to_string());
        }
    }
    calls
}
