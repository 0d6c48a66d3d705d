//! Similarity-based link suggestions.

use quill_embeddings::cosine_similarity;
use quill_notes::{Block, BlockId, Link};
use tracing::debug;

/// Compares a freshly embedded block against every other embedded block and
/// suggests a link for each one that is similar enough.
///
/// Links point from the new block to the existing one and are never
/// deduplicated: if a later pass suggests the mirror link, both are kept.
/// Cost is linear in the number of embedded blocks per submission, which is
/// fine for a single session's notes.
#[derive(Debug, Clone, Copy)]
pub struct LinkSuggester {
    threshold: f32,
}

impl LinkSuggester {
    /// Suggest links for similarities strictly above `threshold`.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Links from `from` (embedded as `vector`) to the qualifying `others`.
    pub fn suggest<'a>(
        &self,
        from: BlockId,
        vector: &[f32],
        others: impl IntoIterator<Item = &'a Block>,
    ) -> Vec<Link> {
        let links: Vec<Link> = others
            .into_iter()
            .filter(|block| block.id() != from)
            .filter_map(|block| {
                let other = block.embedding()?;
                match cosine_similarity(vector, other) {
                    Ok(strength) => Some(Link {
                        from_id: from,
                        to_id: block.id(),
                        strength,
                    }),
                    Err(e) => {
                        debug!("Not comparing {from} with {}: {e}", block.id());
                        None
                    }
                }
            })
            .filter(|link| link.strength > self.threshold)
            .collect();

        debug!("Suggested {} links for {from}", links.len());
        links
    }
}

impl Default for LinkSuggester {
    fn default() -> Self {
        Self::new(0.8)
    }
}
