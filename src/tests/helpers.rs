//! Shared test utilities.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::{
    document::{Document, DocumentId},
    statement::{parser, Statement, StatementId},
    subject::TermTable,
    uri::KnownUri,
};

/// Initialize logging for tests, respecting RUST_LOG.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Parse one line against a fresh term table.
pub fn parse_line(source: &str) -> Statement {
    let mut terms = TermTable::default();
    parser::parse(StatementId(0), source, &mut terms)
}

/// Parse one line against a shared term table.
pub fn parse_line_with(source: &str, terms: &mut TermTable) -> Statement {
    parser::parse(StatementId(0), source, terms)
}

/// Build a standalone document over an internal URI.
pub fn make_document(text: &str) -> Document {
    init_logging();
    Document::new(
        DocumentId::generate(),
        KnownUri::internal("test"),
        text,
        Arc::new(RwLock::new(TermTable::default())),
    )
}
