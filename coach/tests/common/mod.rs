//! Deterministic providers for coach integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use quill_coach::{CoachConfig, CoachSession, CompletionProvider, SharedBlockStore};
use quill_embeddings::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, ProviderError, Result,
};
use quill_notes::BlockStore;
use tokio::sync::{mpsc, oneshot};

/// A unit vector whose cosine similarity with `[1.0, 0.0]` is `similarity`.
pub fn vector_at(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).sqrt()]
}

/// Embeds known texts to fixed vectors; anything else fails.
#[derive(Default)]
pub struct StaticEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl StaticEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Answer for `text` only after `delay`.
    pub fn delayed(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    /// Number of provider calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbeddings {
    fn name(&self) -> &str {
        "static"
    }

    fn default_model(&self) -> &str {
        "static-model"
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&request.text) {
            tokio::time::sleep(*delay).await;
        }
        let embedding = self
            .vectors
            .get(&request.text)
            .cloned()
            .ok_or_else(|| ProviderError::ApiRequest(format!("no vector for {:?}", request.text)))?;
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: "static-model".to_string(),
            tokens_used: None,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Replies with a fixed text, or always fails. Records every call.
pub struct ScriptedCompletion {
    reply: Option<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(system_prompt, user_text)` of every call, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_text.to_string()));
        self.reply
            .clone()
            .ok_or_else(|| ProviderError::ApiRequest("scripted failure".to_string()))
    }
}

/// Holds each completion until the test releases it. The user text of every
/// call is reported on the `started` channel once the call is waiting.
pub struct GatedCompletion {
    gates: Mutex<HashMap<String, oneshot::Receiver<String>>>,
    started: mpsc::UnboundedSender<String>,
}

impl GatedCompletion {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (started, started_rx) = mpsc::unbounded_channel();
        (
            Self {
                gates: Mutex::new(HashMap::new()),
                started,
            },
            started_rx,
        )
    }

    /// Register a gate for the call whose user text is `text`. Sending on
    /// the returned sender releases it with that reply; dropping it fails
    /// the call.
    pub fn gate(&self, text: &str) -> oneshot::Sender<String> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(text.to_string(), rx);
        tx
    }
}

#[async_trait]
impl CompletionProvider for GatedCompletion {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(&self, _system_prompt: &str, user_text: &str) -> Result<String> {
        let gate = self.gates.lock().unwrap().remove(user_text);
        let _ = self.started.send(user_text.to_string());
        match gate {
            Some(rx) => rx
                .await
                .map_err(|_| ProviderError::ApiRequest("gate dropped".to_string())),
            None => Err(ProviderError::ApiRequest(format!("no gate for {user_text:?}"))),
        }
    }
}

/// A session over a fresh store.
pub fn session_with(
    embeddings: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
) -> (CoachSession, SharedBlockStore) {
    session_with_config(embeddings, completion, CoachConfig::default())
}

pub fn session_with_config(
    embeddings: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
    config: CoachConfig,
) -> (CoachSession, SharedBlockStore) {
    let store = BlockStore::shared();
    let session = CoachSession::new(Arc::clone(&store), embeddings, completion, config);
    (session, store)
}
