//! Performance benchmarks for document processing.
//!
//! These cover the hot paths of the incremental front end:
//! - Full-document parsing and phrase-trie construction
//! - The pure-update transaction fast path
//! - The general invalidation path
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use truth_core::program::Program;

fn outline(statements: usize) -> String {
    let mut text = String::new();
    for index in 0..statements / 4 {
        text.push_str(&format!(
            "Entity{index} : Base\n\tField{index}A : Number\n\tField{index}B : Number\n\n"
        ));
    }
    text
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("current-thread runtime")
}

fn bench_parse(c: &mut Criterion) {
    let rt = runtime();
    let text = outline(400);
    c.bench_function("parse_400_statements", |b| {
        b.iter_batched(
            Program::in_memory,
            |(mut program, _reader)| {
                rt.block_on(async {
                    program
                        .add_document(&text, None)
                        .await
                        .expect("benchmark document parses")
                })
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_pure_update(c: &mut Criterion) {
    let rt = runtime();
    let text = outline(400);
    let (mut program, _reader) = Program::in_memory();
    let doc = rt.block_on(async { program.add_document(&text, None).await.unwrap() });
    c.bench_function("pure_update_fast_path", |b| {
        b.iter(|| {
            rt.block_on(async {
                program
                    .edit(doc, |edit| edit.update("Entity0 : Base", 0))
                    .await
                    .unwrap();
            })
        });
    });
}

fn bench_subtree_insert(c: &mut Criterion) {
    let rt = runtime();
    let text = outline(400);
    let (mut program, _reader) = Program::in_memory();
    let doc = rt.block_on(async { program.add_document(&text, None).await.unwrap() });
    c.bench_function("general_path_insert_delete", |b| {
        b.iter(|| {
            rt.block_on(async {
                program
                    .edit(doc, |edit| edit.insert("\tFieldX : Number", 1))
                    .await
                    .unwrap();
                program.edit(doc, |edit| edit.delete(1, 1)).await.unwrap();
            })
        });
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_pure_update,
    bench_subtree_insert
);
criterion_main!(benches);
