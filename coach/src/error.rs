//! Error types for the coach session.

use quill_notes::BlockId;
use thiserror::Error;

/// Result type alias for coach operations.
pub type Result<T> = std::result::Result<T, CoachError>;

/// Errors returned to callers of the coach.
///
/// Provider failures are not in this list on purpose: they are recovered
/// inside the cycle.
#[derive(Error, Debug)]
pub enum CoachError {
    /// The block that should trigger the cycle does not exist.
    #[error("unknown block: {0}")]
    UnknownBlock(BlockId),

    /// Nothing to submit after trimming.
    #[error("submission is empty")]
    EmptySubmission,

    /// Block store error.
    #[error("store error: {0}")]
    Notes(#[from] quill_notes::NotesError),
}
