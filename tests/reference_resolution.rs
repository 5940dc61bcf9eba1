//! Inter-document reference resolution: duplicates, cycles, unresolved and
//! insecure references, and dependency/dependent bookkeeping.

mod common;

use common::{program_with, CauseLog};
use truth_core::{
    event::CauseKind,
    fault::FaultKind,
    uri::KnownUri,
};

#[tokio::test(flavor = "current_thread")]
async fn test_duplicate_reference_faults_second_statement() {
    let (mut program, _reader) = program_with(&[("file//a", "A : B")]);
    let doc = program
        .add_document("file//a\nfile//a", None)
        .await
        .unwrap();

    let faults = program.faults(doc);
    let duplicates: Vec<_> = faults
        .iter()
        .filter(|f| f.kind == FaultKind::DuplicateReference)
        .collect();
    assert_eq!(duplicates.len(), 1);
    let document = program.document(doc).unwrap();
    let faulted_line = document
        .line_of(duplicates[0].source.statement())
        .expect("faulted statement present");
    assert_eq!(faulted_line, 1, "the second occurrence carries the fault");
    assert_eq!(document.dependencies().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn test_multi_duplicate_first_occurrence_wins() {
    let (mut program, _reader) = program_with(&[("file//a", "A : B")]);
    let doc = program
        .add_document("file//a\nfile//a\nfile//a", None)
        .await
        .unwrap();

    let document = program.document(doc).unwrap();
    let faulted_lines: Vec<usize> = program
        .faults(doc)
        .iter()
        .filter(|f| f.kind == FaultKind::DuplicateReference)
        .filter_map(|f| document.line_of(f.source.statement()))
        .collect();
    assert_eq!(faulted_lines, [1, 2]);
    assert_eq!(document.dependencies().len(), 1);
    // All three statements remain URI statements.
    assert_eq!(document.uri_statement_ids().len(), 3);
}

#[tokio::test(flavor = "current_thread")]
async fn test_circular_reference_faults_second_loader() {
    let (mut program, _reader) =
        program_with(&[("file//x", "file//y"), ("file//y", "file//x")]);
    let x_uri = KnownUri::parse("file//x").unwrap();
    let y_uri = KnownUri::parse("file//y").unwrap();

    let x = program.add_document_from_uri(x_uri.clone()).await.unwrap();
    let y = program.document_by_uri(&y_uri).expect("y loaded").id();

    // X committed its edge first; Y's back-reference closes the cycle.
    let x_doc = program.document(x).unwrap();
    assert_eq!(x_doc.dependencies(), [y]);
    assert!(x_doc.dependents().is_empty());

    let y_doc = program.document(y).unwrap();
    assert!(y_doc.dependencies().is_empty());
    assert_eq!(y_doc.dependents(), [x]);
    assert!(program
        .faults(y)
        .iter()
        .any(|f| f.kind == FaultKind::CircularResourceReference));
    assert!(program
        .faults(x)
        .iter()
        .all(|f| f.kind != FaultKind::CircularResourceReference));
}

#[tokio::test(flavor = "current_thread")]
async fn test_unresolved_resource_fault() {
    let (mut program, _reader) = program_with(&[]);
    let doc = program.add_document("file//missing", None).await.unwrap();
    assert!(program
        .faults(doc)
        .iter()
        .any(|f| f.kind == FaultKind::UnresolvedResource));
    assert!(program.document(doc).unwrap().dependencies().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn test_insecure_reference_from_remote_document() {
    let (mut program, _reader) = program_with(&[
        ("https://host/doc", "file//local"),
        ("file//local", "A"),
    ]);
    let doc = program
        .add_document_from_uri(KnownUri::parse("https://host/doc").unwrap())
        .await
        .unwrap();
    assert!(program
        .faults(doc)
        .iter()
        .any(|f| f.kind == FaultKind::InsecureResourceReference));
    assert!(program.document(doc).unwrap().dependencies().is_empty());
    // The insecure target was never loaded.
    assert!(program
        .document_by_uri(&KnownUri::parse("file//local").unwrap())
        .is_none());
}

#[tokio::test(flavor = "current_thread")]
async fn test_dependency_links_are_symmetric() {
    let (mut program, _reader) = program_with(&[
        ("file//lib", "Base : Any"),
        ("file//app", "file//lib\nUser : Base"),
    ]);
    let app = program
        .add_document_from_uri(KnownUri::parse("file//app").unwrap())
        .await
        .unwrap();
    let lib = program
        .document_by_uri(&KnownUri::parse("file//lib").unwrap())
        .unwrap()
        .id();
    assert_eq!(program.document(app).unwrap().dependencies(), [lib]);
    assert_eq!(program.document(lib).unwrap().dependents(), [app]);
}

#[tokio::test(flavor = "current_thread")]
async fn test_rewriting_same_uri_is_idempotent() {
    let (mut program, _reader) = program_with(&[("file//lib", "Base : Any")]);
    let app = program
        .add_document("file//lib\nUser : Base", None)
        .await
        .unwrap();
    let deps_before = program.document(app).unwrap().dependencies().to_vec();
    assert_eq!(deps_before.len(), 1);

    let log = CauseLog::attach(&mut program);
    program
        .edit(app, |edit| edit.update("file//lib", 0))
        .await
        .unwrap();

    let document = program.document(app).unwrap();
    assert_eq!(document.dependencies(), &deps_before[..]);
    assert_eq!(document.uri_statement_ids().len(), 1);
    assert!(
        !log.kinds().contains(&CauseKind::FaultChange),
        "re-asserting the same reference must not change faults"
    );
    let lib = deps_before[0];
    assert_eq!(program.document(lib).unwrap().dependents(), [app]);
}

#[tokio::test(flavor = "current_thread")]
async fn test_inserted_duplicate_keeps_existing_dependency() {
    let (mut program, _reader) = program_with(&[("file//lib", "Base : Any")]);
    let app = program.add_document("file//lib", None).await.unwrap();
    let deps_before = program.document(app).unwrap().dependencies().to_vec();

    program
        .edit(app, |edit| edit.insert("file//lib", 1))
        .await
        .unwrap();

    let document = program.document(app).unwrap();
    assert_eq!(document.dependencies(), &deps_before[..]);
    let faults = program.faults(app);
    let duplicated: Vec<usize> = faults
        .iter()
        .filter(|f| f.kind == FaultKind::DuplicateReference)
        .filter_map(|f| document.line_of(f.source.statement()))
        .collect();
    assert_eq!(duplicated, [1]);
}

#[tokio::test(flavor = "current_thread")]
async fn test_removing_last_reference_drops_dependency() {
    let (mut program, _reader) = program_with(&[("file//lib", "Base : Any")]);
    let app = program
        .add_document("file//lib\nUser : Base", None)
        .await
        .unwrap();
    let lib = program.document(app).unwrap().dependencies()[0];

    program.edit(app, |edit| edit.delete(0, 1)).await.unwrap();

    assert!(program.document(app).unwrap().dependencies().is_empty());
    assert!(program.document(lib).unwrap().dependents().is_empty());
    assert!(program.document(app).unwrap().uri_statement_ids().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn test_relative_reference_resolves_against_document() {
    let (mut program, _reader) = program_with(&[
        ("file//net/docs/sibling.truth", "S : Any"),
        ("file//net/docs/main.truth", "file//./sibling.truth"),
    ]);
    let main = program
        .add_document_from_uri(KnownUri::parse("file//net/docs/main.truth").unwrap())
        .await
        .unwrap();
    let sibling = program
        .document_by_uri(&KnownUri::parse("file//net/docs/sibling.truth").unwrap())
        .expect("sibling loaded by relative reference");
    assert_eq!(program.document(main).unwrap().dependencies(), [sibling.id()]);
}
