//! # truth-core
//!
//! The incremental front end of a Truth compiler.
//!
//! Truth is a declarative language whose documents consist of
//! indentation-structured statements of the form `declarations : annotations`.
//! This crate manages a set of such documents: each document parses its text
//! into an ordered statement buffer, statements are indexed into a phrase
//! trie keyed by subject paths and clarifier signatures, documents reference
//! each other through URI statements forming an acyclic dependency graph, and
//! text edits apply as transactional mutations that compute a minimal
//! invalidation region and broadcast paired invalidate/revalidate events for
//! downstream type analysis.
//!
//! ## Overview
//!
//! - [`program::Program`]: owns the documents, the cause bus, the fault
//!   table, and the verification queue. All mutation flows through it.
//! - [`document::Document`]: ordered statements with indentation-based
//!   ancestry navigation and a per-document phrase trie.
//! - [`statement`]: the one-line statement parser: escapes, graphemes,
//!   URIs, patterns, declarations and annotations around a joint operator.
//! - [`pattern`]: the regex-shaped pattern sub-grammar with embedded infix
//!   holes and the total/partial matcher distinction.
//! - [`phrase`]: the trie of `(subject, clarifier-key)` paths, maintained
//!   incrementally as declarations appear and disappear.
//! - [`fault`]: the closed catalogue of user-facing faults and the
//!   add/remove delta stream.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use truth_core::program::Program;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut program, _reader) = Program::in_memory();
//!     let doc = program.add_document("Product\n\tSku : Number", None).await?;
//!
//!     // Edits are transactional: record calls, then the engine classifies
//!     // the batch and broadcasts invalidate/revalidate causes.
//!     program.edit(doc, |edit| edit.update("Product", 0)).await?;
//!
//!     for subject in program.root_subjects(doc) {
//!         println!("root type: {subject}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## What this crate is not
//!
//! The semantic type analyzer consuming the phrase stream, URI input/output
//! beyond the pluggable [`program::UriReader`], and any code emission are
//! external collaborators with their own homes.

pub mod document;
pub mod edit;
pub mod error;
pub mod event;
pub mod fault;
pub mod pattern;
pub mod phrase;
pub mod program;
pub mod resolver;
pub mod scanner;
pub mod statement;
pub mod subject;
#[cfg(test)]
mod tests;
pub mod uri;

pub use error::*;
