//! Configuration for the coach session.

use serde::{Deserialize, Serialize};

/// Reply used when the completion provider fails.
pub const FALLBACK_REPLY: &str = "What happened next?";

/// Opening question used when the completion provider fails.
pub const OPENING_FALLBACK: &str = "What caught your eye today?";

/// System prompt for the coach question; the context follows on new lines.
pub const COACH_PROMPT: &str = "You're a curious writing coach. Ask an engaging question based on this context, avoiding known details:";

/// System prompt for the opening question.
pub const OPENING_PROMPT: &str = "You're a curious writing coach. Generate an engaging opening question to start a conversation about the user's day or thoughts. Keep it casual and inviting.";

/// Tunables of a coach session. Defaults match the reference behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Links are suggested for similarities strictly above this value.
    pub link_threshold: f32,

    /// Number of similar blocks included in the context.
    pub similar_context: usize,

    /// Number of recent interactions included in the context.
    pub recent_context: usize,

    /// Reply used when the completion call fails.
    pub fallback_reply: String,

    /// Opening question used when the completion call fails.
    pub opening_fallback: String,

    /// System prompt; the assembled context is appended below it.
    pub coach_prompt: String,

    /// System prompt for the opening question.
    pub opening_prompt: String,

    /// Maximum number of notes returned by a search.
    pub search_limit: usize,
}

impl CoachConfig {
    /// Set the link threshold.
    pub fn with_link_threshold(mut self, threshold: f32) -> Self {
        self.link_threshold = threshold;
        self
    }

    /// Set how many similar and recent entries go into the context.
    pub fn with_context_sizes(mut self, similar: usize, recent: usize) -> Self {
        self.similar_context = similar;
        self.recent_context = recent;
        self
    }

    /// Set the fallback reply.
    pub fn with_fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = reply.into();
        self
    }

    /// Set the maximum number of search results.
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            link_threshold: 0.8,
            similar_context: 3,
            recent_context: 3,
            fallback_reply: FALLBACK_REPLY.to_string(),
            opening_fallback: OPENING_FALLBACK.to_string(),
            coach_prompt: COACH_PROMPT.to_string(),
            opening_prompt: OPENING_PROMPT.to_string(),
            search_limit: 5,
        }
    }
}
