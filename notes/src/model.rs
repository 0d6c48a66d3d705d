//! Core note, block and log types.
//!
//! A block's identity is its [`BlockId`], never its position: ids are handed
//! out once by the store and survive edits, reorders and embedding updates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use quill_embeddings::Embedding;
use serde::{Deserialize, Serialize};

use crate::error::NotesError;

/// Stable identifier of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block-{}", self.0)
    }
}

impl FromStr for BlockId {
    type Err = NotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("block-")
            .and_then(|n| n.parse().ok())
            .map(BlockId)
            .ok_or_else(|| NotesError::InvalidBlockId(s.to_string()))
    }
}

/// Identifier of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub u64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note-{}", self.0)
    }
}

/// Who authored a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Ai,
}

/// Text written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBlock {
    pub content: String,

    /// The coach prompt that was showing when the block was started.
    pub prompt: Option<String>,
}

/// A coach reply rendered inline in the note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiBlock {
    pub content: String,
}

/// Role-specific block payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum BlockKind {
    User(UserBlock),
    Ai(AiBlock),
}

impl BlockKind {
    /// A user block with no prompt.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User(UserBlock {
            content: content.into(),
            prompt: None,
        })
    }

    /// A user block started under the given coach prompt.
    pub fn user_with_prompt(content: impl Into<String>, prompt: Option<String>) -> Self {
        Self::User(UserBlock {
            content: content.into(),
            prompt,
        })
    }

    /// An AI block.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai(AiBlock {
            content: content.into(),
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Self::User(_) => Role::User,
            Self::Ai(_) => Role::Ai,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User(b) => &b.content,
            Self::Ai(b) => &b.content,
        }
    }

    fn content_mut(&mut self) -> &mut String {
        match self {
            Self::User(b) => &mut b.content,
            Self::Ai(b) => &mut b.content,
        }
    }
}

/// Atomic unit of written content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    id: BlockId,
    kind: BlockKind,
    embedding: Option<Embedding>,
}

impl Block {
    pub(crate) fn new(id: BlockId, kind: BlockKind) -> Self {
        Self {
            id,
            kind,
            embedding: None,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    pub fn role(&self) -> Role {
        self.kind.role()
    }

    pub fn is_ai(&self) -> bool {
        self.role() == Role::Ai
    }

    pub fn content(&self) -> &str {
        self.kind.content()
    }

    /// The embedding of the current content, if one has been attached.
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    /// Replace the content. Returns `true` when the text actually changed, in
    /// which case the now-stale embedding is dropped.
    pub(crate) fn set_content(&mut self, content: String) -> bool {
        let slot = self.kind.content_mut();
        if *slot == content {
            return false;
        }
        *slot = content;
        self.embedding = None;
        true
    }

    pub(crate) fn set_embedding(&mut self, embedding: Embedding) {
        self.embedding = Some(embedding);
    }
}

/// Ordered container of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub(crate) blocks: Vec<Block>,
}

impl Note {
    /// Default title for notes started without text.
    pub const DEFAULT_TITLE: &'static str = "New Note";

    const TITLE_CHARS: usize = 20;

    /// Title for a note started from `text`: its first 20 characters and an
    /// ellipsis.
    pub fn title_from_text(text: &str) -> String {
        let head: String = text.trim().chars().take(Self::TITLE_CHARS).collect();
        if head.is_empty() {
            Self::DEFAULT_TITLE.to_string()
        } else {
            format!("{head}...")
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(Block::id).collect()
    }

    pub(crate) fn position(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }
}

/// Directed, weighted suggestion that two blocks are related.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub from_id: BlockId,
    pub to_id: BlockId,
    pub strength: f32,
}

/// One submitted piece of user text, kept for recency context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "AI")]
    Ai,
    User,
}

/// One entry of the coach transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Ai,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_block_id_round_trips_through_external_form() {
        let id = BlockId(42);
        assert_eq!(id.to_string(), "block-42");
        assert_eq!("block-42".parse::<BlockId>().unwrap(), id);
        assert!("paragraph-1".parse::<BlockId>().is_err());
        assert!("block-x".parse::<BlockId>().is_err());
    }

    #[test]
    fn test_title_from_text_truncates() {
        assert_eq!(
            Note::title_from_text("I walked along the river this morning"),
            "I walked along the r..."
        );
        assert_eq!(Note::title_from_text("   "), Note::DEFAULT_TITLE);
    }

    #[test]
    fn test_content_change_drops_embedding() {
        let mut block = Block::new(BlockId(1), BlockKind::user("fox"));
        block.set_embedding(vec![1.0, 0.0]);

        assert!(!block.set_content("fox".to_string()));
        assert!(block.embedding().is_some());

        assert!(block.set_content("wolf".to_string()));
        assert!(block.embedding().is_none());
        assert_eq!(block.role(), Role::User);
    }
}
