//! # Coach
//!
//! One submission cycle of the writing coach: embed the submitted block,
//! suggest links to related blocks, assemble a bounded context, ask the
//! completion provider for a follow-up question and write the reply back
//! into the note.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       CoachSession                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingIndex ──► LinkSuggester ──► ContextBuilder            │
//! │       │                                      │                  │
//! │       ▼                                      ▼                  │
//! │  EmbeddingProvider                  CompletionProvider          │
//! │                                              │                  │
//! │                                              ▼                  │
//! │                   BlockStore ◄── SessionLog (chat, links)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Provider failures never escape a cycle: a missing embedding narrows the
//! context to recent interactions and a failed completion is replaced by a
//! fixed fallback question.

pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod index;
pub mod journal;
pub mod links;
pub mod search;
pub mod session;

pub use completion::{CompletionProvider, OpenAIChatProvider};
pub use config::CoachConfig;
pub use context::{CoachContext, ContextBuilder};
pub use error::{CoachError, Result};
pub use index::EmbeddingIndex;
pub use journal::{ResolvedLink, SessionLog};
pub use links::LinkSuggester;
pub use search::NoteMatch;
pub use session::{CoachSession, Reservation, SessionPhase, SubmissionReport};

// Re-export from dependencies for convenience
pub use quill_embeddings::{EmbeddingProvider, ProviderError};
pub use quill_notes::{BlockId, BlockStore, ChatMessage, Link, NoteId, SharedBlockStore};
