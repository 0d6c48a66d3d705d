//! # Editor Bridge
//!
//! Keeps an externally owned editable document and a note in the block
//! store converged, and decides when the writer's text goes to the coach.
//!
//! ## Features
//!
//! - **Projection**: blocks become document nodes tagged with their block id
//! - **Extraction**: document edits, insertions, deletions and reorders are
//!   applied to the store by id
//! - **Echo suppression**: the bridge ignores the document reporting its own
//!   writes back
//! - **Debounced submission**: a block is submitted after a quiet period,
//!   or at once when the writer splits it
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        EditorBridge                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EditableDocument ──► DocumentEvent ──► Debouncer               │
//! │       ▲                    │                │                   │
//! │       │                    ▼                ▼                   │
//! │   project ◄──────── reconcile (diff) ── CoachSession            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod debounce;
pub mod document;
pub mod error;
pub mod event;
pub mod reconcile;

pub use bridge::{EditorBridge, SharedDocument, Submission};
pub use config::BridgeConfig;
pub use debounce::Debouncer;
pub use document::{DocumentNode, EditableDocument, InMemoryDocument, NodeKind, NodeProps};
pub use error::{BridgeError, Result};
pub use event::DocumentEvent;
pub use reconcile::{ChangeSet, IdMap};
