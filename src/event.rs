//! The cause stream: events published by a [`Program`](crate::program::Program)
//! to registered observers.
//!
//! Causes fire synchronously, in publish order, on the thread driving the
//! program. The invalidate/revalidate pair carries the affected statements by
//! value (shared handles), so an observer never needs to race the buffer for
//! the pre-edit state.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::{
    document::DocumentId,
    fault::Fault,
    statement::Statement,
    uri::KnownUri,
};

#[derive(Debug, Clone)]
pub enum Cause {
    /// A document was fully parsed and saved into the program.
    DocumentCreate { document: DocumentId },
    /// Fired immediately before the document is removed from the program.
    DocumentDelete { document: DocumentId },
    DocumentUriChange {
        document: DocumentId,
        new_uri: KnownUri,
    },
    /// Statements (with their pre-edit indices) are about to lose validity.
    /// Empty statement and index lists signal whole-document invalidation.
    Invalidate {
        document: DocumentId,
        statements: Vec<Arc<Statement>>,
        indices: Vec<usize>,
    },
    /// The paired follow-up to an [`Cause::Invalidate`]: the statements now
    /// occupying the affected region, with post-edit indices.
    Revalidate {
        document: DocumentId,
        statements: Vec<Arc<Statement>>,
        indices: Vec<usize>,
    },
    /// Last event of every successful transaction.
    EditComplete { document: DocumentId },
    /// Symmetric difference of the observable fault set.
    FaultChange {
        added: Vec<Fault>,
        removed: Vec<Fault>,
    },
}

/// Discriminant used by observers that filter on event variety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CauseKind {
    DocumentCreate,
    DocumentDelete,
    DocumentUriChange,
    Invalidate,
    Revalidate,
    EditComplete,
    FaultChange,
}

impl Cause {
    pub fn kind(&self) -> CauseKind {
        match self {
            Cause::DocumentCreate { .. } => CauseKind::DocumentCreate,
            Cause::DocumentDelete { .. } => CauseKind::DocumentDelete,
            Cause::DocumentUriChange { .. } => CauseKind::DocumentUriChange,
            Cause::Invalidate { .. } => CauseKind::Invalidate,
            Cause::Revalidate { .. } => CauseKind::Revalidate,
            Cause::EditComplete { .. } => CauseKind::EditComplete,
            Cause::FaultChange { .. } => CauseKind::FaultChange,
        }
    }

    /// The document this cause concerns, when it concerns exactly one.
    pub fn document(&self) -> Option<DocumentId> {
        match self {
            Cause::DocumentCreate { document }
            | Cause::DocumentDelete { document }
            | Cause::DocumentUriChange { document, .. }
            | Cause::Invalidate { document, .. }
            | Cause::Revalidate { document, .. }
            | Cause::EditComplete { document } => Some(*document),
            Cause::FaultChange { .. } => None,
        }
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Cause::DocumentCreate { .. } => write!(f, "DocumentCreate"),
            Cause::DocumentDelete { .. } => write!(f, "DocumentDelete"),
            Cause::DocumentUriChange { .. } => write!(f, "DocumentUriChange"),
            Cause::Invalidate { .. } => write!(f, "Invalidate"),
            Cause::Revalidate { .. } => write!(f, "Revalidate"),
            Cause::EditComplete { .. } => write!(f, "EditComplete"),
            Cause::FaultChange { .. } => write!(f, "FaultChange"),
        }
    }
}

/// Synchronous observer callback. Registered through
/// [`Program::observe`](crate::program::Program::observe).
pub type CauseObserver = Box<dyn FnMut(&Cause) + Send>;
