//! The submission cycle.
//!
//! Each call to [`CoachSession::submit`] walks
//! `Idle → Embedding → Linking → ContextBuilding → Completing →
//! AppendingResult → Idle`. Provider calls of overlapping submissions may
//! run concurrently, but results are appended strictly in the order the
//! submissions were made for each note.
//!
//! In-flight provider calls are never cancelled and their results are never
//! dropped. If the triggering block is gone by the time a reply arrives, the
//! AI block goes to the end of the note instead.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, Utc};
use quill_embeddings::{Embedding, EmbeddingCache, EmbeddingProvider};
use quill_notes::{
    BlockId, BlockKind, ChatMessage, Interaction, Link, Note, NoteId, SharedBlockStore,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::completion::CompletionProvider;
use crate::config::CoachConfig;
use crate::context::{CoachContext, ContextBuilder};
use crate::error::{CoachError, Result};
use crate::index::EmbeddingIndex;
use crate::journal::{ResolvedLink, SessionLog};
use crate::links::LinkSuggester;
use crate::search::{NoteMatch, rank_notes};

/// Where a submission cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Embedding,
    Linking,
    ContextBuilding,
    Completing,
    AppendingResult,
}

/// Outcome of one submission cycle.
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    /// Block that triggered the cycle.
    pub trigger: BlockId,

    /// Note the trigger belonged to.
    pub note: NoteId,

    /// Position of this submission in its note's sequence.
    pub ticket: u64,

    /// Whether an embedding was available for the trigger.
    pub embedded: bool,

    /// Links suggested by this cycle.
    pub links: Vec<Link>,

    /// Context handed to the completion call.
    pub context: CoachContext,

    /// The coach reply that was appended.
    pub reply: String,

    /// Whether `reply` is the fallback text.
    pub used_fallback: bool,

    /// The inserted AI block.
    pub ai_block: Option<BlockId>,

    /// Phases visited, ending in `Idle`.
    pub phases: Vec<SessionPhase>,
}

#[derive(Debug, Default)]
struct TurnState {
    /// Ticket allowed to append next.
    next: u64,

    /// Tickets that finished (or were abandoned) ahead of their turn.
    finished: BTreeSet<u64>,
}

struct NoteSequencer {
    issued: u64,
    turn: Arc<watch::Sender<TurnState>>,
}

/// A place in a note's append queue. Dropping it releases the place, even
/// when the cycle is abandoned half way.
struct Ticket {
    number: u64,
    turn: Arc<watch::Sender<TurnState>>,
}

impl Ticket {
    async fn wait_turn(&self) {
        let mut rx = self.turn.subscribe();
        // Only fails once the sender is dropped, and we hold it.
        let _ = rx.wait_for(|state| state.next == self.number).await;
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let number = self.number;
        self.turn.send_modify(|state| {
            state.finished.insert(number);
            while state.finished.remove(&state.next) {
                state.next += 1;
            }
        });
    }
}

/// A submission's place in its note's order, taken before any provider call
/// is made. Replies, chat messages and the interaction log all follow the
/// order in which reservations were taken.
///
/// Dropping an unused reservation gives its place up.
pub struct Reservation {
    note: NoteId,
    interaction: u64,
    issued_at: DateTime<Utc>,
    ticket: Ticket,
}

impl Reservation {
    /// Position within the note's sequence, starting at 0.
    pub fn position(&self) -> u64 {
        self.ticket.number
    }
}

/// Tracks one running cycle; the session goes back to `Idle` when the last
/// one finishes.
struct ActiveCycle<'a> {
    session: &'a CoachSession,
    trigger: BlockId,
    phases: Vec<SessionPhase>,
}

impl<'a> ActiveCycle<'a> {
    fn start(session: &'a CoachSession, trigger: BlockId) -> Self {
        session.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            session,
            trigger,
            phases: Vec::new(),
        }
    }

    fn enter(&mut self, phase: SessionPhase) {
        debug!("{}: {phase:?}", self.trigger);
        self.session.phase.send_replace(phase);
        self.phases.push(phase);
    }

    fn finish(mut self) -> Vec<SessionPhase> {
        let mut phases = std::mem::take(&mut self.phases);
        phases.push(SessionPhase::Idle);
        phases
    }
}

impl Drop for ActiveCycle<'_> {
    fn drop(&mut self) {
        if self.session.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.session.phase.send_replace(SessionPhase::Idle);
        }
    }
}

/// Orchestrates submissions against a shared block store.
///
/// Providers are injected at construction; the session holds no global
/// state.
pub struct CoachSession {
    store: SharedBlockStore,
    embeddings: EmbeddingIndex,
    completion: Arc<dyn CompletionProvider>,
    links: LinkSuggester,
    context: ContextBuilder,
    config: CoachConfig,
    log: RwLock<SessionLog>,
    sequencers: Mutex<HashMap<NoteId, NoteSequencer>>,
    phase: watch::Sender<SessionPhase>,
    in_flight: AtomicUsize,
    next_interaction: AtomicU64,
}

impl CoachSession {
    /// Create a session over `store` using the given providers.
    pub fn new(
        store: SharedBlockStore,
        embeddings: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        config: CoachConfig,
    ) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        Self {
            store,
            embeddings: EmbeddingIndex::new(embeddings),
            completion,
            links: LinkSuggester::new(config.link_threshold),
            context: ContextBuilder::new(config.similar_context, config.recent_context),
            config,
            log: RwLock::new(SessionLog::new()),
            sequencers: Mutex::new(HashMap::new()),
            phase,
            in_flight: AtomicUsize::new(0),
            next_interaction: AtomicU64::new(1),
        }
    }

    /// Use a specific embedding cache.
    pub fn with_embedding_cache(mut self, cache: EmbeddingCache) -> Self {
        self.embeddings = self.embeddings.with_cache(cache);
        self
    }

    pub fn store(&self) -> &SharedBlockStore {
        &self.store
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    pub fn embeddings(&self) -> &EmbeddingIndex {
        &self.embeddings
    }

    /// Phase of the most recently advanced cycle, `Idle` when none runs.
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    pub async fn chat(&self) -> Vec<ChatMessage> {
        self.log.read().await.chat().to_vec()
    }

    pub async fn links(&self) -> Vec<Link> {
        self.log.read().await.links().to_vec()
    }

    pub async fn interactions(&self) -> Vec<Interaction> {
        self.log.read().await.interactions().to_vec()
    }

    /// The coach question currently on screen: the latest AI chat message.
    pub async fn current_prompt(&self) -> Option<String> {
        self.log.read().await.latest_prompt()
    }

    /// Suggested links whose blocks still exist.
    pub async fn resolved_links(&self) -> Vec<ResolvedLink> {
        let store = self.store.read().await;
        self.log.read().await.resolve_links(&store)
    }

    /// Ask the coach for a question to open the session with. The question
    /// is appended to the transcript.
    pub async fn opening_question(&self) -> String {
        let system_prompt = format!(
            "{}\nCurrent time: {}",
            self.config.opening_prompt,
            Local::now().format("%Y-%m-%d %H:%M")
        );

        let question = match self.completion.complete(&system_prompt, "").await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => self.config.opening_fallback.clone(),
            Err(e) => {
                warn!("Opening question failed, using fallback: {e}");
                self.config.opening_fallback.clone()
            }
        };

        self.log
            .write()
            .await
            .push_chat(ChatMessage::ai(question.clone()));
        question
    }

    /// Append `content` as a new user block to the current note (starting a
    /// note if there is none) and submit it.
    pub async fn submit_text(&self, content: &str) -> Result<SubmissionReport> {
        if content.trim().is_empty() {
            return Err(CoachError::EmptySubmission);
        }

        let prompt = self.current_prompt().await;
        let block = {
            let mut store = self.store.write().await;
            let note = match store.current_note_id() {
                Some(note) => note,
                None => store.create_note(Note::title_from_text(content)),
            };
            store.append_block(note, BlockKind::user_with_prompt(content, prompt))?
        };

        self.submit(block, content).await
    }

    /// Run one submission cycle for the block `trigger` holding `content`.
    ///
    /// Only an unknown trigger or empty content is an error. Provider
    /// failures degrade the cycle but never abort it.
    pub async fn submit(&self, trigger: BlockId, content: &str) -> Result<SubmissionReport> {
        if content.trim().is_empty() {
            return Err(CoachError::EmptySubmission);
        }
        let note = self
            .store
            .read()
            .await
            .note_of(trigger)
            .ok_or(CoachError::UnknownBlock(trigger))?;
        let reservation = self.reserve(note);
        self.submit_reserved(reservation, trigger, content).await
    }

    /// Take the next place in `note`'s submission order. Callers that start
    /// several cycles concurrently reserve up front, in the order the
    /// submissions were made, and run them with [`Self::submit_reserved`].
    pub fn reserve(&self, note: NoteId) -> Reservation {
        let mut sequencers = self
            .sequencers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sequencer = sequencers.entry(note).or_insert_with(|| NoteSequencer {
            issued: 0,
            turn: Arc::new(watch::channel(TurnState::default()).0),
        });
        let number = sequencer.issued;
        sequencer.issued += 1;
        Reservation {
            note,
            interaction: self.next_interaction.fetch_add(1, Ordering::SeqCst),
            issued_at: Utc::now(),
            ticket: Ticket {
                number,
                turn: Arc::clone(&sequencer.turn),
            },
        }
    }

    /// Run a submission cycle in the place taken by `reservation`. The
    /// trigger must belong to the reserved note.
    pub async fn submit_reserved(
        &self,
        reservation: Reservation,
        trigger: BlockId,
        content: &str,
    ) -> Result<SubmissionReport> {
        if content.trim().is_empty() {
            return Err(CoachError::EmptySubmission);
        }

        let Reservation {
            note,
            interaction,
            issued_at,
            ticket,
        } = reservation;
        let known_embedding = {
            let store = self.store.read().await;
            let block = store.block(trigger).ok_or(CoachError::UnknownBlock(trigger))?;
            if store.note_of(trigger) != Some(note) {
                return Err(CoachError::UnknownBlock(trigger));
            }
            block
                .embedding()
                .filter(|_| block.content() == content)
                .map(<[f32]>::to_vec)
        };

        let mut cycle = ActiveCycle::start(self, trigger);
        debug!("Submission {} for {trigger} in {note}", ticket.number);

        cycle.enter(SessionPhase::Embedding);
        let embedding = self.embed_trigger(trigger, content, known_embedding).await;

        let links = match &embedding {
            Some(vector) => {
                cycle.enter(SessionPhase::Linking);
                let links = {
                    let store = self.store.read().await;
                    self.links.suggest(trigger, vector, store.all_blocks())
                };
                self.log.write().await.record_links(links.iter().copied());
                links
            }
            None => Vec::new(),
        };

        cycle.enter(SessionPhase::ContextBuilding);
        let context = {
            let store = self.store.read().await;
            let log = self.log.read().await;
            self.context.build(
                trigger,
                embedding.as_deref(),
                store.all_blocks(),
                log.interactions(),
            )
        };
        self.log.write().await.record_interaction(Interaction {
            id: interaction,
            timestamp: issued_at,
            content: content.to_string(),
        });

        cycle.enter(SessionPhase::Completing);
        let system_prompt = format!("{}\n{}", self.config.coach_prompt, context.render());
        let (reply, used_fallback) = match self.completion.complete(&system_prompt, content).await
        {
            Ok(text) if !text.trim().is_empty() => (text, false),
            Ok(_) => {
                warn!("Empty completion for {trigger}, using fallback");
                (self.config.fallback_reply.clone(), true)
            }
            Err(e) => {
                warn!(
                    "Completion via {} failed for {trigger}, using fallback: {e}",
                    self.completion.name()
                );
                (self.config.fallback_reply.clone(), true)
            }
        };

        ticket.wait_turn().await;
        cycle.enter(SessionPhase::AppendingResult);
        {
            let mut log = self.log.write().await;
            log.push_chat(ChatMessage::user(content));
            log.push_chat(ChatMessage::ai(reply.clone()));
        }
        let ai_block = self.insert_reply(trigger, note, &reply).await;
        let ticket_number = ticket.number;
        drop(ticket);

        info!(
            "Submission for {trigger} done: {} links, fallback={used_fallback}",
            links.len()
        );

        Ok(SubmissionReport {
            trigger,
            note,
            ticket: ticket_number,
            embedded: embedding.is_some(),
            links,
            context,
            reply,
            used_fallback,
            ai_block,
            phases: cycle.finish(),
        })
    }

    /// Embed the semantic search query and rank notes against it. A failed
    /// embedding yields no results.
    pub async fn search_notes(&self, query: &str) -> Vec<NoteMatch> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let Some(vector) = self.embeddings.embed(query).await else {
            return Vec::new();
        };
        let store = self.store.read().await;
        rank_notes(&store, &vector, self.config.search_limit)
    }

    async fn embed_trigger(
        &self,
        trigger: BlockId,
        content: &str,
        known: Option<Embedding>,
    ) -> Option<Embedding> {
        if known.is_some() {
            debug!("Reusing embedding of unchanged {trigger}");
            return known;
        }

        let embedding = self.embeddings.embed(content).await?;
        let mut store = self.store.write().await;
        match store.attach_embedding(trigger, content, embedding.clone()) {
            Ok(true) => {}
            Ok(false) => debug!("{trigger} changed while embedding; not attached"),
            Err(e) => debug!("{trigger} vanished while embedding: {e}"),
        }
        Some(embedding)
    }

    async fn insert_reply(&self, trigger: BlockId, note: NoteId, reply: &str) -> Option<BlockId> {
        let mut store = self.store.write().await;
        let inserted = if store.block(trigger).is_some() {
            store.insert_block_after(trigger, BlockKind::ai(reply))
        } else {
            debug!("{trigger} is gone; appending reply to {note}");
            store.append_block(note, BlockKind::ai(reply))
        };
        match inserted {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Could not insert reply for {trigger}: {e}");
                None
            }
        }
    }
}
