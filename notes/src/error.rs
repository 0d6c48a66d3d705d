//! Error types for the note store.

use thiserror::Error;

use crate::model::{BlockId, NoteId};

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, NotesError>;

/// Errors that can occur when mutating the block store.
///
/// A failed mutation never leaves a partial write behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotesError {
    /// Note not found.
    #[error("note not found: {0}")]
    NoteNotFound(NoteId),

    /// Block not found.
    #[error("block not found: {0}")]
    BlockNotFound(BlockId),

    /// A reorder did not name exactly the note's blocks.
    #[error("invalid block order for {note}: {reason}")]
    InvalidOrder { note: NoteId, reason: String },

    /// Malformed external block identifier.
    #[error("invalid block id: {0}")]
    InvalidBlockId(String),
}
