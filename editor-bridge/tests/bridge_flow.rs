//! Document-driven flows through the bridge and a live coach session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use quill_coach::{ChatMessage, CoachConfig, CoachSession, CompletionProvider};
use quill_editor_bridge::{
    BridgeConfig, DocumentEvent, DocumentNode, EditableDocument, EditorBridge, InMemoryDocument,
    NodeKind, Submission,
};
use quill_embeddings::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, ProviderError, Result,
};
use quill_notes::{BlockId, BlockKind, BlockStore, NoteId, SharedBlockStore};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

struct NoEmbeddings;

#[async_trait]
impl EmbeddingProvider for NoEmbeddings {
    fn name(&self) -> &str {
        "none"
    }

    fn default_model(&self) -> &str {
        "none"
    }

    async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        Err(ProviderError::NotConfigured)
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct RecordingCompletion {
    submitted: Mutex<Vec<String>>,
    delays: HashMap<String, Duration>,
}

impl RecordingCompletion {
    /// Hold the reply to `text` back for `delay`.
    fn delaying(text: &str, delay: Duration) -> Self {
        let mut completion = Self::default();
        completion.delays.insert(text.to_string(), delay);
        completion
    }

    fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, _system_prompt: &str, user_text: &str) -> Result<String> {
        self.submitted.lock().unwrap().push(user_text.to_string());
        if let Some(delay) = self.delays.get(user_text) {
            sleep(*delay).await;
        }
        Ok("What then?".to_string())
    }
}

struct Fixture {
    store: SharedBlockStore,
    session: Arc<CoachSession>,
    completion: Arc<RecordingCompletion>,
    document: Arc<RwLock<InMemoryDocument>>,
    note: NoteId,
}

async fn fixture(blocks: Vec<BlockKind>) -> (Fixture, Vec<BlockId>) {
    fixture_with(blocks, RecordingCompletion::default()).await
}

async fn fixture_with(
    blocks: Vec<BlockKind>,
    completion: RecordingCompletion,
) -> (Fixture, Vec<BlockId>) {
    let store = BlockStore::shared();
    let (note, ids) = {
        let mut store = store.write().await;
        let note = store.create_note("Draft");
        let ids = blocks
            .into_iter()
            .map(|kind| store.append_block(note, kind).unwrap())
            .collect();
        (note, ids)
    };
    let completion = Arc::new(completion);
    let session = Arc::new(CoachSession::new(
        Arc::clone(&store),
        Arc::new(NoEmbeddings),
        completion.clone(),
        CoachConfig::default(),
    ));
    let fixture = Fixture {
        store,
        session,
        completion,
        document: Arc::new(RwLock::new(InMemoryDocument::new())),
        note,
    };
    (fixture, ids)
}

impl Fixture {
    fn bridge(&self) -> EditorBridge<InMemoryDocument> {
        EditorBridge::new(
            Arc::clone(&self.session),
            Arc::clone(&self.document),
            self.note,
            &BridgeConfig::default(),
        )
    }

    async fn store_contents(&self) -> Vec<String> {
        self.store
            .read()
            .await
            .note(self.note)
            .unwrap()
            .blocks()
            .iter()
            .map(|b| b.content().to_string())
            .collect()
    }
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_submit_once() {
    let (fx, blocks) = fixture(vec![BlockKind::user("")]).await;
    let events = fx.document.write().await.subscribe();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(fx.bridge().run(events, shutdown.clone()));
    sleep(Duration::from_millis(10)).await;

    let node = blocks[0].to_string();
    assert!(fx.document.read().await.node(&node).is_some());

    for text in ["I", "I saw", "I saw a", "I saw a fox"] {
        fx.document.write().await.type_text(&node, text);
        sleep(Duration::from_secs(1)).await;
    }
    sleep(Duration::from_secs(1)).await;
    assert!(fx.completion.submitted().is_empty());

    sleep(Duration::from_secs(2)).await;
    assert_eq!(fx.completion.submitted(), vec!["I saw a fox"]);
    assert_eq!(fx.store_contents().await, vec!["I saw a fox", "What then?"]);

    let nodes = fx.document.read().await.nodes();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[1].kind, NodeKind::AiResponse);
    assert_eq!(nodes[1].text, "What then?");

    // The document echoing the projected reply must not submit again.
    sleep(Duration::from_secs(10)).await;
    assert_eq!(fx.completion.submitted().len(), 1);

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_enter_submits_without_waiting() {
    let (fx, blocks) = fixture(vec![BlockKind::user("")]).await;
    let events = fx.document.write().await.subscribe();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(fx.bridge().run(events, shutdown.clone()));
    sleep(Duration::from_millis(10)).await;

    let node = blocks[0].to_string();
    {
        let mut document = fx.document.write().await;
        document.type_text(&node, "hello world");
        document.press_enter(&node, 5);
    }
    sleep(Duration::from_millis(10)).await;

    assert_eq!(fx.completion.submitted(), vec!["hello"]);
    assert_eq!(
        fx.store_contents().await,
        vec!["hello", "What then?", " world"]
    );

    let document = fx.document.read().await;
    let tail = document.nodes()[2].id.clone();
    assert_eq!(document.focus(), Some(tail));
    drop(document);

    // The split cancelled the pending debounce for the same block.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(fx.completion.submitted().len(), 1);

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_consecutive_enters_reply_in_order() {
    let completion = RecordingCompletion::delaying("alpha", Duration::from_millis(150));
    let (fx, blocks) = fixture_with(
        vec![BlockKind::user("alpha"), BlockKind::user("beta")],
        completion,
    )
    .await;
    let events = fx.document.write().await.subscribe();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(fx.bridge().run(events, shutdown.clone()));

    tokio::time::timeout(Duration::from_secs(5), async {
        while fx.document.read().await.nodes().len() < 2 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    {
        let mut document = fx.document.write().await;
        document.press_enter(&blocks[0].to_string(), 5);
        document.press_enter(&blocks[1].to_string(), 4);
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while fx.store_contents().await.len() < 6 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // The later Enter resolves first but its reply still lands second.
    assert_eq!(
        fx.session.chat().await,
        vec![
            ChatMessage::user("alpha"),
            ChatMessage::ai("What then?"),
            ChatMessage::user("beta"),
            ChatMessage::ai("What then?"),
        ]
    );
    assert_eq!(
        fx.store_contents().await,
        vec!["alpha", "What then?", "", "beta", "What then?", ""]
    );
    let interactions: Vec<String> = fx
        .session
        .interactions()
        .await
        .into_iter()
        .map(|i| i.content)
        .collect();
    assert_eq!(interactions, vec!["alpha", "beta"]);

    shutdown.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_round_trip_and_reorder() {
    let (fx, blocks) = fixture(vec![
        BlockKind::user("morning"),
        BlockKind::ai("How did it start?"),
        BlockKind::user("evening"),
    ])
    .await;
    fx.store
        .write()
        .await
        .attach_embedding(blocks[0], "morning", vec![1.0, 0.0])
        .unwrap();

    let mut bridge = fx.bridge();
    assert!(bridge.project(None).await.unwrap());
    assert!(!bridge.project(None).await.unwrap());

    let ids: Vec<String> = fx
        .document
        .read()
        .await
        .nodes()
        .into_iter()
        .map(|n| n.id)
        .collect();
    let expected: Vec<String> = blocks.iter().map(ToString::to_string).collect();
    assert_eq!(ids, expected);

    // Our own write is an echo.
    let echo = DocumentEvent::changed(Some(blocks[0].to_string()));
    assert_eq!(bridge.handle_event(echo).await.unwrap(), None);
    assert_eq!(bridge.pending_block(), None);

    fx.document
        .write()
        .await
        .move_node(&blocks[2].to_string(), 0);
    bridge
        .handle_event(DocumentEvent::changed(None::<String>))
        .await
        .unwrap();

    let store = fx.store.read().await;
    assert_eq!(
        store.note(fx.note).unwrap().block_ids(),
        vec![blocks[2], blocks[0], blocks[1]]
    );
    let morning = store.block(blocks[0]).unwrap();
    assert_eq!(morning.content(), "morning");
    assert_eq!(morning.embedding(), Some(&[1.0, 0.0][..]));
    assert_eq!(bridge.pending_block(), None);
}

#[tokio::test(start_paused = true)]
async fn test_submission_gates() {
    let (fx, blocks) = fixture(vec![
        BlockKind::user("draft"),
        BlockKind::ai("Tell me more?"),
    ])
    .await;
    let mut bridge = fx.bridge();
    bridge.project(None).await.unwrap();
    let quiet = BridgeConfig::default().quiescence + Duration::from_millis(1);

    // Editing the AI node schedules nothing.
    fx.document
        .write()
        .await
        .type_text(&blocks[1].to_string(), "tampered");
    bridge
        .handle_event(DocumentEvent::changed(Some(blocks[1].to_string())))
        .await
        .unwrap();
    assert_eq!(bridge.pending_block(), None);

    // Blank text is debounced but never submitted.
    fx.document
        .write()
        .await
        .type_text(&blocks[0].to_string(), "   ");
    bridge
        .handle_event(DocumentEvent::changed(Some(blocks[0].to_string())))
        .await
        .unwrap();
    assert_eq!(bridge.pending_block(), Some(blocks[0]));
    tokio::time::advance(quiet).await;
    assert_eq!(bridge.fire_due().await, None);

    // A paragraph the editor created gets a block and can be submitted.
    let draft = fx
        .document
        .write()
        .await
        .add_paragraph(Some(&blocks[1].to_string()));
    fx.document.write().await.type_text(&draft, "a new thought");
    bridge
        .handle_event(DocumentEvent::changed(Some(draft.clone())))
        .await
        .unwrap();
    let created = bridge.ids().resolve(&draft).unwrap();
    assert_eq!(bridge.pending_block(), Some(created));

    assert_eq!(bridge.fire_due().await, None);
    tokio::time::advance(quiet).await;
    assert_eq!(
        bridge.fire_due().await,
        Some(Submission {
            block: created,
            content: "a new thought".to_string(),
        })
    );
    assert_eq!(
        fx.document.read().await.node(&draft),
        Some(&DocumentNode::paragraph(&draft, "a new thought"))
    );
}
