//! # Embeddings
//!
//! Vector representations of note blocks and the similarity math built on
//! top of them.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert block text to dense vectors
//! - **Similarity**: Cosine similarity and stable top-k ranking
//! - **Caching**: Memoize embeddings by content snapshot
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► EmbeddingCache            │
//! │       │                    │                                    │
//! │       ▼                    ▼                                    │
//! │  OpenAIProvider      cosine_similarity / rank_top_k            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod provider;
pub mod similarity;

pub use cache::{CacheStats, EmbeddingCache};
pub use error::{ProviderError, Result};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider, check_status,
};
pub use similarity::{SimilarityResult, cosine_similarity, rank_top_k};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
