//! The editor bridge: keeps one note and one document converged and decides
//! when a block is submitted to the coach.

use std::sync::Arc;

use quill_coach::{CoachSession, SubmissionReport};
use quill_notes::{BlockId, BlockKind, Note, NoteId, NotesError};
use tokio::sync::{RwLock, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::debounce::Debouncer;
use crate::document::EditableDocument;
use crate::error::{BridgeError, Result};
use crate::event::DocumentEvent;
use crate::reconcile::{self, Applied, IdMap};

/// A document shared between the editor and the bridge.
pub type SharedDocument<D> = Arc<RwLock<D>>;

/// A block the bridge decided to submit, with the content to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub block: BlockId,
    pub content: String,
}

type InFlight = JoinSet<quill_coach::Result<SubmissionReport>>;

/// Reconciles a document with one note of the session's store.
///
/// Store-originated writes are fingerprinted; a document state matching the
/// latest fingerprint is an echo of that write and is ignored. Document
/// changes are applied to the store and never written back.
pub struct EditorBridge<D> {
    session: Arc<CoachSession>,
    document: SharedDocument<D>,
    note: NoteId,
    ids: IdMap,
    debouncer: Debouncer,
    last_written: Option<String>,
}

impl<D: EditableDocument> EditorBridge<D> {
    pub fn new(
        session: Arc<CoachSession>,
        document: SharedDocument<D>,
        note: NoteId,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            session,
            document,
            note,
            ids: IdMap::new(),
            debouncer: Debouncer::new(config.quiescence),
            last_written: None,
        }
    }

    pub fn note(&self) -> NoteId {
        self.note
    }

    pub fn ids(&self) -> &IdMap {
        &self.ids
    }

    /// Block waiting for its quiet period to end.
    pub fn pending_block(&self) -> Option<BlockId> {
        self.debouncer.pending_block()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Write the note into the document, moving the cursor to `focus` if
    /// given. Returns whether the document was written.
    pub async fn project(&mut self, focus: Option<BlockId>) -> Result<bool> {
        let (nodes, blocks) = {
            let store = self.session.store().read().await;
            let note = store
                .note(self.note)
                .ok_or(NotesError::NoteNotFound(self.note))?;
            (reconcile::project(note, &self.ids), note.block_ids())
        };
        self.ids.remember(blocks);

        let fingerprint = reconcile::fingerprint(&nodes);
        let focus = focus.map(|block| self.ids.node_id(block));
        let mut document = self.document.write().await;
        if focus.is_none() && reconcile::fingerprint(&document.nodes()) == fingerprint {
            self.last_written = Some(fingerprint);
            return Ok(false);
        }

        debug!("Projecting {} nodes into the document", nodes.len());
        self.last_written = Some(fingerprint);
        document.replace_nodes(nodes, focus.as_deref());
        Ok(true)
    }

    /// Handle one document notification. Returns a submission to fire right
    /// away when the writer split a block.
    pub async fn handle_event(&mut self, event: DocumentEvent) -> Result<Option<Submission>> {
        match event {
            DocumentEvent::Changed { focus } => {
                self.on_change(focus).await?;
                Ok(None)
            }
            DocumentEvent::Split { node, cursor } => self.on_split(&node, cursor).await,
        }
    }

    /// Take the debounced submission once its quiet period is over and it
    /// passes the submission gates.
    pub async fn fire_due(&mut self) -> Option<Submission> {
        let block = self.debouncer.take_due(Instant::now())?;
        self.gate(block).await
    }

    /// Pull the document into the store. `None` means the document only
    /// echoed our own latest write.
    async fn sync_from_document(&mut self) -> Result<Option<Applied>> {
        let nodes = self.document.read().await.nodes();
        let fingerprint = reconcile::fingerprint(&nodes);
        if self.last_written.as_deref() == Some(fingerprint.as_str()) {
            debug!("Ignoring echo of store write {fingerprint}");
            return Ok(None);
        }
        self.last_written = None;

        let mut store = self.session.store().write().await;
        let note = store
            .note(self.note)
            .ok_or(NotesError::NoteNotFound(self.note))?;
        let changes = reconcile::diff(note, &nodes, &self.ids);
        if changes.is_empty() {
            return Ok(Some(Applied::default()));
        }

        let applied = reconcile::apply(&mut store, self.note, &changes, &mut self.ids)?;
        debug!(
            "Synced document: {} edited, {} inserted, {} removed",
            applied.edited.len(),
            applied.inserted.len(),
            applied.removed.len()
        );
        Ok(Some(applied))
    }

    async fn on_change(&mut self, focus: Option<String>) -> Result<()> {
        let Some(applied) = self.sync_from_document().await? else {
            return Ok(());
        };

        let touched: Vec<BlockId> = applied
            .edited
            .iter()
            .chain(applied.inserted.iter())
            .copied()
            .collect();
        let focused = focus.and_then(|node| self.ids.resolve(&node));
        let Some(block) = focused
            .filter(|b| touched.contains(b))
            .or_else(|| touched.last().copied())
        else {
            return Ok(());
        };

        let is_user = self
            .session
            .store()
            .read()
            .await
            .block(block)
            .is_some_and(|b| !b.is_ai());
        if is_user {
            debug!("Edit in {block}; submission debounced");
            self.debouncer.record(block);
        } else {
            debug!("Edit in AI block {block}; nothing to submit");
        }
        Ok(())
    }

    async fn on_split(&mut self, node: &str, cursor: usize) -> Result<Option<Submission>> {
        self.sync_from_document().await?;
        let block = self
            .ids
            .resolve(node)
            .ok_or_else(|| BridgeError::UnknownNode(node.to_string()))?;
        let prompt = self.session.current_prompt().await;

        let tail = {
            let mut store = self.session.store().write().await;
            if store.note_of(block) != Some(self.note) {
                return Err(BridgeError::UnknownNode(node.to_string()));
            }
            let current = store
                .block(block)
                .ok_or_else(|| BridgeError::UnknownNode(node.to_string()))?;
            if current.is_ai() {
                return Err(BridgeError::NotEditable(node.to_string()));
            }

            let content = current.content();
            let at = content
                .char_indices()
                .nth(cursor)
                .map_or(content.len(), |(i, _)| i);
            let (head, tail) = (content[..at].to_string(), content[at..].to_string());

            store.update_block_content(block, head)?;
            store.insert_block_after(block, BlockKind::user_with_prompt(tail, prompt))?
        };
        info!("Split {block} at {cursor}; new block {tail}");

        self.debouncer.cancel_for(block);
        self.project(Some(tail)).await?;
        Ok(self.gate(block).await)
    }

    /// Submission gates that apply at fire time: the block still exists, is
    /// not an AI block, has non-blank content, and the note is not just a
    /// reply followed by a blank block.
    async fn gate(&self, block: BlockId) -> Option<Submission> {
        let store = self.session.store().read().await;
        let Some(candidate) = store.block(block) else {
            debug!("{block} is gone; nothing to submit");
            return None;
        };
        if candidate.is_ai() {
            return None;
        }
        if store.note(self.note).is_some_and(only_reply_and_blank) {
            debug!("Note holds only a reply and a blank block; not submitting");
            return None;
        }
        if candidate.content().trim().is_empty() {
            debug!("{block} is blank; not submitting");
            return None;
        }
        Some(Submission {
            block,
            content: candidate.content().to_string(),
        })
    }

    /// Drive the bridge until `shutdown` fires or the document goes away.
    ///
    /// Cancelling drops a pending debounced submission. Submissions already
    /// handed to the session run to completion and are projected before
    /// this returns.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<DocumentEvent>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!("Editor bridge started for {}", self.note);
        self.project(None).await?;
        let mut in_flight = InFlight::new();

        loop {
            let deadline = self.debouncer.deadline();

            tokio::select! {
                () = shutdown.cancelled() => {
                    if let Some(block) = self.debouncer.cancel() {
                        debug!("Dropped pending submission of {block}");
                    }
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    match self.handle_event(event).await {
                        Ok(Some(submission)) => self.spawn(&mut in_flight, submission),
                        Ok(None) => {}
                        Err(e) => warn!("Failed to handle document event: {e}"),
                    }
                }
                () = async {
                    if let Some(deadline) = deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if deadline.is_some() => {
                    if let Some(submission) = self.fire_due().await {
                        self.spawn(&mut in_flight, submission);
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    self.finish(joined).await;
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            self.finish(joined).await;
        }
        info!("Editor bridge stopped for {}", self.note);
        Ok(())
    }

    /// Start a submission. Its place in the note's order is taken here, in
    /// the order the bridge decided to submit, not when the task first runs.
    fn spawn(&self, in_flight: &mut InFlight, submission: Submission) {
        let reservation = self.session.reserve(self.note);
        info!(
            "Submitting {} as #{}",
            submission.block,
            reservation.position()
        );
        let session = Arc::clone(&self.session);
        in_flight.spawn(async move {
            session
                .submit_reserved(reservation, submission.block, &submission.content)
                .await
        });
    }

    async fn finish(
        &mut self,
        joined: std::result::Result<quill_coach::Result<SubmissionReport>, JoinError>,
    ) {
        match joined {
            Ok(Ok(report)) => {
                debug!(
                    "Reply for {} ready after {} phases",
                    report.trigger,
                    report.phases.len()
                );
                // Pick up edits made while the reply was pending first.
                if let Err(e) = self.sync_from_document().await {
                    warn!("Failed to sync document before projecting: {e}");
                }
                if let Err(e) = self.project(None).await {
                    warn!("Failed to project reply: {e}");
                }
            }
            Ok(Err(e)) => warn!("Submission rejected: {e}"),
            Err(e) => warn!("Submission task failed: {e}"),
        }
    }
}

fn only_reply_and_blank(note: &Note) -> bool {
    matches!(
        note.blocks(),
        [reply, blank] if reply.is_ai() && !blank.is_ai() && blank.content().trim().is_empty()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_notes::BlockStore;

    #[test]
    fn test_reply_with_blank_tail_is_not_submittable() {
        let mut store = BlockStore::new();
        let note = store.create_note("Gate");
        store.append_block(note, BlockKind::ai("What now?")).unwrap();
        let blank = store.append_block(note, BlockKind::user("  ")).unwrap();
        assert!(only_reply_and_blank(store.note(note).unwrap()));

        store.update_block_content(blank, "something").unwrap();
        assert!(!only_reply_and_blank(store.note(note).unwrap()));

        store.append_block(note, BlockKind::user("")).unwrap();
        assert!(!only_reply_and_blank(store.note(note).unwrap()));
    }
}
