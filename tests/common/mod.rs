//! Shared utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

use truth_core::{
    event::{Cause, CauseKind},
    program::{MapUriReader, Program},
    uri::KnownUri,
};

/// Initialize tracing for tests, respecting RUST_LOG.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A program over an in-memory reader pre-loaded with `(uri, text)` pairs.
#[allow(dead_code)]
pub fn program_with(texts: &[(&str, &str)]) -> (Program, Arc<MapUriReader>) {
    init_logging();
    let (program, reader) = Program::in_memory();
    for (uri, text) in texts {
        let uri = KnownUri::parse(uri).expect("test uri parses");
        reader.insert(&uri, *text);
    }
    (program, reader)
}

/// Observer that records every published cause for later assertions.
#[derive(Clone, Default)]
pub struct CauseLog {
    causes: Arc<Mutex<Vec<Cause>>>,
}

#[allow(dead_code)]
impl CauseLog {
    pub fn attach(program: &mut Program) -> CauseLog {
        let log = CauseLog::default();
        let causes = log.causes.clone();
        program.observe(move |cause| causes.lock().push(cause.clone()));
        log
    }

    pub fn kinds(&self) -> Vec<CauseKind> {
        self.causes.lock().iter().map(Cause::kind).collect()
    }

    pub fn causes(&self) -> Vec<Cause> {
        self.causes.lock().clone()
    }

    pub fn clear(&self) {
        self.causes.lock().clear();
    }
}
