use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::DocumentId;

/// Contract violations surfaced to the host as hard errors.
///
/// Everything a *user* can cause by typing source text is modeled as a
/// [`Fault`](crate::fault::Fault) value and never raised through this enum.
/// `TruthError` is reserved for programmer errors: misuse of the transaction
/// API, out-of-range positions, and identity collisions. None of these mutate
/// state before failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum TruthError {
    #[error("A transaction is already open on document {0}")]
    DoubleTransaction(DocumentId),
    #[error("Edit call issued outside of an open transaction")]
    EditOutsideTransaction,
    #[error(
        "Statement position {position} is out of range for document {document} (length {length})"
    )]
    PositionOutOfRange {
        document: DocumentId,
        position: usize,
        length: usize,
    },
    #[error("No document registered under id {0}")]
    UnknownDocument(DocumentId),
    #[error("The URI '{0}' is already assigned to another document")]
    UriInUse(String),
    #[error("'{0}' is not a recognized URI")]
    InvalidUri(String),
    #[error("URI load failed: {0}")]
    UriRead(String),
}
