//! Two-way mapping between a note and its document.
//!
//! Projection turns blocks into nodes tagged with the block's id; extraction
//! turns nodes back into block payloads; [`diff`] compares the two by id,
//! never by position, and [`apply`] writes the difference into the store.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use quill_notes::{Block, BlockId, BlockKind, BlockStore, Note, NoteId, NotesError};
use tracing::{debug, warn};

use crate::document::{DocumentNode, NodeKind};

/// Correspondence between document node ids and block ids.
///
/// Nodes projected from the store carry the block id itself (`block-N`).
/// Nodes the editor created on its own keep their editor-assigned id, bound
/// here to the block they turned into. The map also remembers which blocks
/// the document has been shown; only those can be deleted from it.
#[derive(Debug, Default, Clone)]
pub struct IdMap {
    to_block: HashMap<String, BlockId>,
    to_node: HashMap<BlockId, String>,
    known: HashSet<BlockId>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node id a block is rendered under.
    pub fn node_id(&self, block: BlockId) -> String {
        self.to_node
            .get(&block)
            .cloned()
            .unwrap_or_else(|| block.to_string())
    }

    /// Block a node stands for, if any.
    pub fn resolve(&self, node: &str) -> Option<BlockId> {
        self.to_block
            .get(node)
            .copied()
            .or_else(|| node.parse().ok())
    }

    pub fn bind(&mut self, node: impl Into<String>, block: BlockId) {
        let node = node.into();
        self.to_node.insert(block, node.clone());
        self.to_block.insert(node, block);
        self.known.insert(block);
    }

    pub fn forget(&mut self, block: BlockId) {
        if let Some(node) = self.to_node.remove(&block) {
            self.to_block.remove(&node);
        }
        self.known.remove(&block);
    }

    /// Mark blocks as present in the document.
    pub fn remember(&mut self, blocks: impl IntoIterator<Item = BlockId>) {
        self.known.extend(blocks);
    }

    /// Whether the document has been shown `block`.
    pub fn is_known(&self, block: BlockId) -> bool {
        self.known.contains(&block)
    }
}

/// Render one block as a document node.
pub fn project_block(block: &Block, ids: &IdMap) -> DocumentNode {
    let id = ids.node_id(block.id());
    match block.kind() {
        BlockKind::User(user) => {
            DocumentNode::paragraph(id, &user.content).with_prompt(user.prompt.clone())
        }
        BlockKind::Ai(ai) => DocumentNode::ai_response(id, &ai.content),
    }
}

/// Render a note as document nodes, in block order.
pub fn project(note: &Note, ids: &IdMap) -> Vec<DocumentNode> {
    note.blocks()
        .iter()
        .map(|block| project_block(block, ids))
        .collect()
}

/// A block payload read back from a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock {
    pub node: String,
    pub kind: BlockKind,
}

/// Read block payloads out of document nodes.
pub fn extract(nodes: &[DocumentNode]) -> Vec<ExtractedBlock> {
    nodes
        .iter()
        .map(|node| ExtractedBlock {
            node: node.id.clone(),
            kind: match node.kind {
                NodeKind::Paragraph => {
                    BlockKind::user_with_prompt(&node.text, node.props.prompt.clone())
                }
                NodeKind::AiResponse => BlockKind::ai(&node.text),
            },
        })
        .collect()
}

/// Content-derived key of a document state.
pub fn fingerprint(nodes: &[DocumentNode]) -> String {
    let mut hasher = DefaultHasher::new();
    for node in nodes {
        node.id.hash(&mut hasher);
        node.kind.hash(&mut hasher);
        node.text.hash(&mut hasher);
        node.props.prompt.hash(&mut hasher);
    }
    format!("{:x}", hasher.finish())
}

/// Differences between a note and a document, keyed by id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// User blocks whose text changed.
    pub edited: Vec<(BlockId, String)>,

    /// Nodes with no block yet, with the payload to create.
    pub inserted: Vec<(String, BlockKind)>,

    /// Blocks with no node anymore.
    pub removed: Vec<BlockId>,

    /// Node ids in document order, set when the order has to be rewritten.
    pub order: Option<Vec<String>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.edited.is_empty()
            && self.inserted.is_empty()
            && self.removed.is_empty()
            && self.order.is_none()
    }
}

/// Compare `note` with the document `nodes`.
///
/// Edits to AI nodes are ignored; they are read-only in the editor and the
/// store stays authoritative for them. Blocks the document was never shown
/// are not reported as removed.
pub fn diff(note: &Note, nodes: &[DocumentNode], ids: &IdMap) -> ChangeSet {
    let existing: HashMap<BlockId, &Block> = note.blocks().iter().map(|b| (b.id(), b)).collect();
    let mut seen = HashSet::new();
    let mut surviving = Vec::new();
    let mut doc_order = Vec::new();
    let mut changes = ChangeSet::default();

    for entry in extract(nodes) {
        let known = ids
            .resolve(&entry.node)
            .and_then(|id| existing.get(&id).map(|block| (id, *block)));

        match known {
            Some((id, block)) => {
                if !seen.insert(id) {
                    warn!("Duplicate node {} for {id} ignored", entry.node);
                    continue;
                }
                if block.content() != entry.kind.content() {
                    if block.is_ai() {
                        debug!("Ignoring edit of read-only {id}");
                    } else {
                        changes
                            .edited
                            .push((id, entry.kind.content().to_string()));
                    }
                }
                surviving.push(id);
                doc_order.push(entry.node);
            }
            None => {
                doc_order.push(entry.node.clone());
                changes.inserted.push((entry.node, entry.kind));
            }
        }
    }

    let kept: Vec<BlockId> = note
        .blocks()
        .iter()
        .map(Block::id)
        .filter(|id| seen.contains(id))
        .collect();
    changes.removed = note
        .blocks()
        .iter()
        .map(Block::id)
        .filter(|id| !seen.contains(id) && ids.is_known(*id))
        .collect();

    if !changes.inserted.is_empty() || kept != surviving {
        changes.order = Some(doc_order);
    }
    changes
}

/// Blocks touched by [`apply`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Applied {
    pub edited: Vec<BlockId>,
    pub inserted: Vec<BlockId>,
    pub removed: Vec<BlockId>,
}

/// Write `changes` into `note`, binding new nodes to their blocks.
///
/// Blocks missing from the document order (created in the store since the
/// last projection) stay right after the block that precedes them now.
pub fn apply(
    store: &mut BlockStore,
    note: NoteId,
    changes: &ChangeSet,
    ids: &mut IdMap,
) -> Result<Applied, NotesError> {
    let mut applied = Applied::default();

    for id in &changes.removed {
        store.remove_block(*id)?;
        ids.forget(*id);
        applied.removed.push(*id);
    }

    for (id, content) in &changes.edited {
        if store.update_block_content(*id, content.clone())? {
            applied.edited.push(*id);
        }
    }

    for (node, kind) in &changes.inserted {
        let id = store.append_block(note, kind.clone())?;
        ids.bind(node.clone(), id);
        applied.inserted.push(id);
    }

    if let Some(order) = &changes.order {
        let mut order: Vec<BlockId> = order.iter().filter_map(|n| ids.resolve(n)).collect();
        let current = store
            .note(note)
            .ok_or(NotesError::NoteNotFound(note))?
            .block_ids();
        for (index, id) in current.iter().enumerate() {
            if order.contains(id) {
                continue;
            }
            let at = match index.checked_sub(1).and_then(|prev| current.get(prev)) {
                Some(prev) => order.iter().position(|o| o == prev).map_or(0, |p| p + 1),
                None => 0,
            };
            order.insert(at, *id);
        }
        if order != current {
            store.reorder_blocks(note, &order)?;
        }
    }

    Ok(applied)
}
