//! # Notes
//!
//! The canonical in-memory model of a writing session: notes made of ordered
//! blocks, the suggested links between blocks, and the append-only logs the
//! coach reads from.
//!
//! All state is process-local. Nothing here is persisted.
//!
//! ```text
//! BlockStore
//!   └── Note (current)
//!         ├── Block { id, User { content, prompt }, embedding }
//!         └── Block { id, Ai { content } }
//! ```

pub mod error;
pub mod model;
pub mod store;

pub use error::{NotesError, Result};
pub use model::{
    AiBlock, Block, BlockId, BlockKind, ChatMessage, Interaction, Link, Note, NoteId, Role, Sender,
    UserBlock,
};
pub use store::{BlockStore, SharedBlockStore};
