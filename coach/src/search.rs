//! Semantic search over notes.

use quill_embeddings::cosine_similarity;
use quill_notes::{Block, BlockStore, NoteId};
use serde::{Deserialize, Serialize};

/// A note scored against a search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMatch {
    pub note: NoteId,
    pub title: String,

    /// Best similarity of any embedded block in the note, 0 when none.
    pub similarity: f32,
}

/// Score every note by its best-matching block and keep the top `limit`.
/// Notes with equal scores stay in creation order.
pub(crate) fn rank_notes(store: &BlockStore, query: &[f32], limit: usize) -> Vec<NoteMatch> {
    let mut matches: Vec<NoteMatch> = store
        .notes()
        .iter()
        .map(|note| {
            let similarity = note
                .blocks()
                .iter()
                .filter_map(Block::embedding)
                .filter_map(|e| cosine_similarity(e, query).ok())
                .fold(0.0_f32, f32::max);
            NoteMatch {
                note: note.id,
                title: note.title.clone(),
                similarity,
            }
        })
        .collect();

    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    matches.truncate(limit);
    matches
}
