//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors, or either vector has zero magnitude
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(ProviderError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// A similarity search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult<K> {
    /// ID of the matched item.
    pub id: K,

    /// Similarity score.
    pub score: f32,
}

impl<K> SimilarityResult<K> {
    /// Create a new similarity result.
    pub fn new(id: K, score: f32) -> Self {
        Self { id, score }
    }
}

/// Rank candidates by similarity to `query` and keep the best `k`.
///
/// The sort is stable: candidates with equal scores keep the order in which
/// they were supplied. Candidates whose dimension does not match the query
/// are skipped.
pub fn rank_top_k<'a, K, I>(query: &[f32], candidates: I, k: usize) -> Vec<SimilarityResult<K>>
where
    I: IntoIterator<Item = (K, &'a [f32])>,
{
    let mut scores: Vec<(OrderedFloat<f32>, K)> = Vec::new();

    for (id, embedding) in candidates {
        match cosine_similarity(query, embedding) {
            Ok(score) => scores.push((OrderedFloat(score), id)),
            Err(e) => debug!("Skipping candidate in ranking: {e}"),
        }
    }

    // Sort by score descending
    scores.sort_by(|a, b| b.0.cmp(&a.0));

    scores
        .into_iter()
        .take(k)
        .map(|(score, id)| SimilarityResult::new(id, score.0))
        .collect()
}
