//! The canonical block store.
//!
//! Every other component reads and writes notes through [`BlockStore`].
//! Mutations are synchronous and all-or-nothing: each either applies fully
//! or returns an error with the store unchanged.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use quill_embeddings::Embedding;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{NotesError, Result};
use crate::model::{Block, BlockId, BlockKind, Note, NoteId};

/// Store handle shared between the coach session and the editor bridge.
pub type SharedBlockStore = Arc<RwLock<BlockStore>>;

/// In-memory model of every note in the session.
#[derive(Debug, Default)]
pub struct BlockStore {
    /// Notes in creation order.
    notes: Vec<Note>,

    /// Which note each block lives in.
    locations: HashMap<BlockId, NoteId>,

    current: Option<NoteId>,

    next_note: u64,

    /// Block ids are never reused, even after removal.
    next_block: u64,
}

impl BlockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a new store for sharing.
    pub fn shared() -> SharedBlockStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Create a note and make it current.
    pub fn create_note(&mut self, title: impl Into<String>) -> NoteId {
        self.next_note += 1;
        let id = NoteId(self.next_note);
        let title = title.into();

        info!("Created note {id}: {title}");
        self.notes.push(Note {
            id,
            title,
            blocks: Vec::new(),
        });
        self.current = Some(id);
        id
    }

    /// The note the writer is working in.
    pub fn current_note(&self) -> Option<&Note> {
        self.current.and_then(|id| self.note(id))
    }

    pub fn current_note_id(&self) -> Option<NoteId> {
        self.current
    }

    /// Switch the current note.
    pub fn set_current_note(&mut self, id: NoteId) -> Result<()> {
        if self.note(id).is_none() {
            return Err(NotesError::NoteNotFound(id));
        }
        self.current = Some(id);
        Ok(())
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    fn note_mut(&mut self, id: NoteId) -> Result<&mut Note> {
        self.notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(NotesError::NoteNotFound(id))
    }

    /// All notes in creation order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    fn allocate_block_id(&mut self) -> BlockId {
        self.next_block += 1;
        BlockId(self.next_block)
    }

    /// Append a block to the end of a note.
    pub fn append_block(&mut self, note: NoteId, kind: BlockKind) -> Result<BlockId> {
        // Validate before allocating so a failure leaves no trace.
        self.note_mut(note)?;
        let id = self.allocate_block_id();
        self.note_mut(note)?.blocks.push(Block::new(id, kind));
        self.locations.insert(id, note);

        debug!("Appended {id} to {note}");
        Ok(id)
    }

    /// Insert a block directly after `after`, in the same note.
    pub fn insert_block_after(&mut self, after: BlockId, kind: BlockKind) -> Result<BlockId> {
        let note = self.note_of(after).ok_or(NotesError::BlockNotFound(after))?;
        let position = self
            .note(note)
            .and_then(|n| n.position(after))
            .ok_or(NotesError::BlockNotFound(after))?;

        let id = self.allocate_block_id();
        self.note_mut(note)?
            .blocks
            .insert(position + 1, Block::new(id, kind));
        self.locations.insert(id, note);

        debug!("Inserted {id} after {after}");
        Ok(id)
    }

    /// Replace a block's text. Returns whether the content changed; a change
    /// clears the block's embedding.
    pub fn update_block_content(&mut self, id: BlockId, content: impl Into<String>) -> Result<bool> {
        let changed = self
            .block_mut(id)
            .ok_or(NotesError::BlockNotFound(id))?
            .set_content(content.into());
        if changed {
            debug!("Updated content of {id}");
        }
        Ok(changed)
    }

    /// Reorder a note's blocks. `new_order` must name every block of the note
    /// exactly once.
    pub fn reorder_blocks(&mut self, note: NoteId, new_order: &[BlockId]) -> Result<()> {
        let current = self.note(note).ok_or(NotesError::NoteNotFound(note))?;

        if new_order.len() != current.blocks.len() {
            return Err(NotesError::InvalidOrder {
                note,
                reason: format!(
                    "expected {} blocks, got {}",
                    current.blocks.len(),
                    new_order.len()
                ),
            });
        }

        let mut seen = HashSet::with_capacity(new_order.len());
        for id in new_order {
            if !seen.insert(*id) {
                return Err(NotesError::InvalidOrder {
                    note,
                    reason: format!("{id} listed twice"),
                });
            }
            if current.position(*id).is_none() {
                return Err(NotesError::InvalidOrder {
                    note,
                    reason: format!("{id} is not in this note"),
                });
            }
        }

        let target = self.note_mut(note)?;
        let mut by_id: HashMap<BlockId, Block> =
            target.blocks.drain(..).map(|b| (b.id(), b)).collect();
        target.blocks = new_order
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();

        debug!("Reordered {} blocks in {note}", new_order.len());
        Ok(())
    }

    /// Remove a block. Links that point at it are left dangling.
    pub fn remove_block(&mut self, id: BlockId) -> Result<Block> {
        let note = self.note_of(id).ok_or(NotesError::BlockNotFound(id))?;
        let target = self.note_mut(note)?;
        let position = target.position(id).ok_or(NotesError::BlockNotFound(id))?;
        let block = target.blocks.remove(position);
        self.locations.remove(&id);

        debug!("Removed {id} from {note}");
        Ok(block)
    }

    /// Attach an embedding computed from `snapshot`. Nothing is attached when
    /// the block has been edited since the snapshot was taken; returns
    /// whether the embedding was stored.
    pub fn attach_embedding(
        &mut self,
        id: BlockId,
        snapshot: &str,
        embedding: Embedding,
    ) -> Result<bool> {
        let block = self.block_mut(id).ok_or(NotesError::BlockNotFound(id))?;
        if block.content() != snapshot {
            debug!("Discarding stale embedding for {id}");
            return Ok(false);
        }
        block.set_embedding(embedding);
        Ok(true)
    }

    /// Look up a block anywhere in the store.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        let note = self.note_of(id)?;
        self.note(note)?.blocks.iter().find(|b| b.id() == id)
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        let note = self.note_of(id)?;
        self.notes
            .iter_mut()
            .find(|n| n.id == note)?
            .blocks
            .iter_mut()
            .find(|b| b.id() == id)
    }

    /// The note that holds a block.
    pub fn note_of(&self, id: BlockId) -> Option<NoteId> {
        self.locations.get(&id).copied()
    }

    /// Every block of every note, notes in creation order and blocks in
    /// document order. Call again to restart.
    pub fn all_blocks(&self) -> impl Iterator<Item = &Block> {
        self.notes.iter().flat_map(|n| n.blocks.iter())
    }

    /// Blocks that currently carry an embedding, in creation order.
    pub fn embedded_blocks(&self) -> Vec<&Block> {
        let mut blocks: Vec<&Block> = self
            .all_blocks()
            .filter(|b| b.embedding().is_some())
            .collect();
        blocks.sort_by_key(|b| b.id());
        blocks
    }
}
