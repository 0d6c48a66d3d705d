//! Error types for the editor bridge.

use quill_notes::NotesError;
use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while reconciling the document with the store.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// An event named a node the document does not contain.
    #[error("unknown document node: {0}")]
    UnknownNode(String),

    /// A split was requested on a node that is not editable.
    #[error("node is not editable: {0}")]
    NotEditable(String),

    /// Store mutation failed.
    #[error(transparent)]
    Notes(#[from] NotesError),
}
