//! Edit engine coverage: fast paths, the general invalidation path, and
//! range-edit conversion. Program-level event ordering is exercised in the
//! integration tests.

use test_log::test;

use crate::{
    edit::{self, EditCall, EditRecorder, RangeEdit},
    event::{Cause, CauseKind},
    tests::helpers::make_document,
};

fn calls(build: impl FnOnce(&mut EditRecorder)) -> Vec<EditCall> {
    let mut recorder = EditRecorder::default();
    build(&mut recorder);
    recorder.into_calls()
}

fn cause_kinds(causes: &[Cause]) -> Vec<CauseKind> {
    causes.iter().map(Cause::kind).collect()
}

#[test]
fn test_pure_update_fast_path() {
    let mut doc = make_document("A\n\tB\n\tC");
    let outcome = edit::apply(&mut doc, calls(|e| e.update("A", 0))).unwrap();
    assert!(outcome.mutated);
    assert_eq!(
        cause_kinds(&outcome.causes),
        [CauseKind::Invalidate, CauseKind::Revalidate]
    );
    match &outcome.causes[0] {
        Cause::Invalidate {
            statements,
            indices,
            ..
        } => {
            assert_eq!(indices, &[0]);
            assert_eq!(statements.len(), 1);
            assert!(statements[0].is_disposed());
        }
        other => panic!("expected invalidate, got {other}"),
    }
    assert_eq!(doc.statements()[0].source_text(), "A");
    assert!(!doc.statements()[0].is_disposed());
}

#[test]
fn test_pure_update_override_keeps_last() {
    let mut doc = make_document("A\nB");
    let outcome = edit::apply(
        &mut doc,
        calls(|e| {
            e.update("X", 0);
            e.update("Y", 0);
        }),
    )
    .unwrap();
    assert!(outcome.mutated);
    assert_eq!(doc.statements()[0].source_text(), "Y");
}

#[test]
fn test_noop_updates_emit_no_events() {
    let mut doc = make_document("\n   ");
    let outcome = edit::apply(&mut doc, calls(|e| e.update("  ", 0))).unwrap();
    assert!(outcome.mutated);
    assert!(outcome.causes.is_empty());
}

#[test]
fn test_indent_change_falls_to_general_path() {
    let mut doc = make_document("A\n\tB");
    let outcome = edit::apply(&mut doc, calls(|e| e.update("\t\tB", 1))).unwrap();
    // B's parent (A) is the invalidated region.
    assert_eq!(
        cause_kinds(&outcome.causes),
        [CauseKind::Invalidate, CauseKind::Revalidate]
    );
    match &outcome.causes[0] {
        Cause::Invalidate { indices, .. } => assert_eq!(indices, &[0]),
        other => panic!("expected invalidate, got {other}"),
    }
    assert_eq!(doc.statements()[1].indent(), 2);
}

#[test]
fn test_pure_leaf_delete_fast_path() {
    let mut doc = make_document("A\n\tB\n\tC");
    let before = doc.root_phrase().size();
    assert_eq!(before, 3);
    let outcome = edit::apply(&mut doc, calls(|e| e.delete(2, 1))).unwrap();
    assert_eq!(
        cause_kinds(&outcome.causes),
        [CauseKind::Invalidate, CauseKind::Revalidate]
    );
    match &outcome.causes[1] {
        Cause::Revalidate {
            statements,
            indices,
            ..
        } => {
            assert!(statements.is_empty());
            assert!(indices.is_empty());
        }
        other => panic!("expected revalidate, got {other}"),
    }
    assert_eq!(doc.len(), 2);
    assert_eq!(doc.root_phrase().size(), 2);
}

#[test]
fn test_noop_deletes_are_silent() {
    let mut doc = make_document("A\n\n\n");
    let outcome = edit::apply(&mut doc, calls(|e| e.delete(1, 2))).unwrap();
    assert!(outcome.causes.is_empty());
    assert_eq!(doc.len(), 2);
}

#[test]
fn test_delete_with_descendants_invalidates_whole_document() {
    let mut doc = make_document("A\n\tB");
    let outcome = edit::apply(&mut doc, calls(|e| e.delete(0, 1))).unwrap();
    // A is top level, so its parent is the document itself.
    match &outcome.causes[0] {
        Cause::Invalidate {
            statements,
            indices,
            ..
        } => {
            assert!(statements.is_empty());
            assert!(indices.is_empty());
        }
        other => panic!("expected invalidate, got {other}"),
    }
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.statements()[0].source_text(), "\tB");
}

#[test]
fn test_pure_noop_insert_fast_path() {
    let mut doc = make_document("A");
    let outcome = edit::apply(
        &mut doc,
        calls(|e| {
            e.insert("", 1);
            e.insert("// trailing", 2);
        }),
    )
    .unwrap();
    assert!(outcome.mutated);
    assert!(outcome.causes.is_empty());
    assert_eq!(doc.len(), 3);
    assert_eq!(doc.to_text(true), "A\n\n// trailing");
}

#[test]
fn test_general_insert_invalidates_parent() {
    let mut doc = make_document("A : T\n\tB : U");
    let outcome = edit::apply(&mut doc, calls(|e| e.insert("\tC : V", 2))).unwrap();
    match &outcome.causes[0] {
        Cause::Invalidate { indices, .. } => assert_eq!(indices, &[0]),
        other => panic!("expected invalidate, got {other}"),
    }
    match &outcome.causes[1] {
        Cause::Revalidate { indices, .. } => assert_eq!(indices, &[0]),
        other => panic!("expected revalidate, got {other}"),
    }
    assert_eq!(doc.len(), 3);
    // The new child was inflated under A.
    assert_eq!(doc.root_phrase().size(), 3);
    assert!(!outcome.inflated.is_empty());
}

#[test]
fn test_invalidated_parent_pruning() {
    let mut doc = make_document("A\n\tB\n\t\tC\nD");
    let outcome = edit::apply(
        &mut doc,
        calls(|e| {
            e.update("\t\tC2", 2);
            e.insert("\tE", 3);
        }),
    )
    .unwrap();
    // Both ops resolve under A's chain; only the highest ancestor (A at
    // index 0) survives the pruning pass.
    match &outcome.causes[0] {
        Cause::Invalidate { indices, .. } => assert_eq!(indices, &[0]),
        other => panic!("expected invalidate, got {other}"),
    }
}

#[test]
fn test_revalidate_indices_track_shifted_survivors() {
    let mut doc = make_document("// x\nA\n\tB");
    // Deleting the leading no-op shifts A down one slot; the revalidate
    // indices must reflect the post-mutation position.
    let outcome = edit::apply(
        &mut doc,
        calls(|e| {
            e.delete(0, 1);
            e.insert("\tC", 2);
        }),
    )
    .unwrap();
    match &outcome.causes[0] {
        Cause::Invalidate { indices, .. } => assert_eq!(indices, &[1]),
        other => panic!("expected invalidate, got {other}"),
    }
    match &outcome.causes[1] {
        Cause::Revalidate {
            statements,
            indices,
            ..
        } => {
            assert_eq!(statements.len(), 1);
            assert_eq!(statements[0].source_text(), "A");
            assert_eq!(indices, &[0]);
        }
        other => panic!("expected revalidate, got {other}"),
    }
    assert_eq!(doc.to_text(true), "A\n\tB\n\tC");
}

#[test]
fn test_position_out_of_range_fails_fast() {
    let mut doc = make_document("A");
    let before = doc.to_text(true);
    assert!(edit::apply(&mut doc, calls(|e| e.update("X", 5))).is_err());
    assert!(edit::apply(&mut doc, calls(|e| e.delete(0, 2))).is_err());
    assert_eq!(doc.to_text(true), before);
}

#[test]
fn test_uri_delta_tracking() {
    let mut doc = make_document("file//a.truth\nX");
    let outcome = edit::apply(
        &mut doc,
        calls(|e| {
            e.update("file//b.truth", 0);
            e.insert("file//c.truth", 2);
        }),
    )
    .unwrap();
    assert_eq!(outcome.removed_uri.len(), 1);
    assert_eq!(outcome.added_uri.len(), 2);
}

#[test]
fn test_range_edit_single_line_update() {
    let doc = make_document("Product : Entity");
    let converted = edit::convert_range_edits(
        &doc,
        &[RangeEdit {
            start_line: 0,
            start_col: 0,
            end_line: 0,
            end_col: 7,
            text: "Item".to_string(),
        }],
    );
    match &converted[..] {
        [EditCall::Update { at, text }] => {
            assert_eq!(*at, 0);
            assert_eq!(text, "Item : Entity");
        }
        other => panic!("expected single update, got {other:?}"),
    }
}

#[test]
fn test_range_edit_line_deletion() {
    let doc = make_document("A\nB\nC");
    let converted = edit::convert_range_edits(
        &doc,
        &[RangeEdit {
            start_line: 1,
            start_col: 0,
            end_line: 2,
            end_col: 0,
            text: String::new(),
        }],
    );
    match &converted[..] {
        [EditCall::Delete { at, count }] => {
            assert_eq!((*at, *count), (1, 1));
        }
        other => panic!("expected single delete, got {other:?}"),
    }
}

#[test]
fn test_range_edit_line_insertion() {
    let doc = make_document("A\nB");
    let converted = edit::convert_range_edits(
        &doc,
        &[RangeEdit {
            start_line: 1,
            start_col: 0,
            end_line: 1,
            end_col: 0,
            text: "X\nY\n".to_string(),
        }],
    );
    let inserts: Vec<(usize, &str)> = converted
        .iter()
        .map(|c| match c {
            EditCall::Insert { at, text } => (*at, text.as_str()),
            other => panic!("expected insert, got {other:?}"),
        })
        .collect();
    assert_eq!(inserts, [(1, "X"), (2, "Y")]);
}

#[test]
fn test_range_edit_multiline_fallback() {
    let doc = make_document("abc\ndef");
    let converted = edit::convert_range_edits(
        &doc,
        &[RangeEdit {
            start_line: 0,
            start_col: 1,
            end_line: 1,
            end_col: 1,
            text: "X\nY".to_string(),
        }],
    );
    // Fallback: delete both affected lines, insert the spliced result.
    match &converted[..] {
        [EditCall::Delete { at: 0, count: 2 }, EditCall::Insert { at: 0, text: first }, EditCall::Insert { at: 1, text: second }] =>
        {
            assert_eq!(first, "aX");
            assert_eq!(second, "Yef");
        }
        other => panic!("unexpected conversion {other:?}"),
    }
}
