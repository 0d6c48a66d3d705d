//! Context window assembly for the completion call.

use quill_embeddings::rank_top_k;
use quill_notes::{Block, BlockId, Interaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The assembled context: similar block content first, then recent
/// interactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachContext {
    /// Content of the most similar blocks, best match first.
    pub similar: Vec<String>,

    /// Most recent interactions, oldest first.
    pub recent: Vec<String>,
}

impl CoachContext {
    /// Newline-joined context, passed verbatim as the system prompt suffix.
    pub fn render(&self) -> String {
        self.similar
            .iter()
            .chain(self.recent.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.similar.is_empty() && self.recent.is_empty()
    }
}

/// Builds the bounded context for one submission.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    similar: usize,
    recent: usize,
}

impl ContextBuilder {
    pub fn new(similar: usize, recent: usize) -> Self {
        Self { similar, recent }
    }

    /// Build the context for the block `submitting`.
    ///
    /// Without an embedding the similarity half is empty. The submitting
    /// block is excluded from ranking by id; its own interaction is logged
    /// only after its context is built, so `interactions` never holds it.
    pub fn build<'a>(
        &self,
        submitting: BlockId,
        embedding: Option<&[f32]>,
        blocks: impl IntoIterator<Item = &'a Block>,
        interactions: &[Interaction],
    ) -> CoachContext {
        let similar = match embedding {
            Some(query) => {
                // Creation order, so equal scores fall back to insertion order.
                let mut candidates: Vec<&Block> = blocks
                    .into_iter()
                    .filter(|b| b.id() != submitting && b.embedding().is_some())
                    .collect();
                candidates.sort_by_key(|b| b.id());

                rank_top_k(
                    query,
                    candidates
                        .iter()
                        .filter_map(|b| b.embedding().map(|e| (*b, e))),
                    self.similar,
                )
                .into_iter()
                .map(|result| result.id.content().to_string())
                .collect()
            }
            None => Vec::new(),
        };

        let mut history: Vec<&Interaction> = interactions.iter().collect();
        history.sort_by_key(|i| i.timestamp);
        let skip = history.len().saturating_sub(self.recent);
        let recent: Vec<String> = history
            .into_iter()
            .skip(skip)
            .map(|i| i.content.clone())
            .collect();

        debug!(
            "Built context for {submitting}: {} similar, {} recent",
            similar.len(),
            recent.len()
        );

        CoachContext { similar, recent }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(3, 3)
    }
}
