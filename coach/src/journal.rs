//! Append-only session logs: suggested links, interactions and the chat
//! transcript.

use quill_notes::{BlockStore, ChatMessage, Interaction, Link, Sender};
use serde::{Deserialize, Serialize};

/// Everything a session appends but never rewrites.
#[derive(Debug, Default)]
pub struct SessionLog {
    links: Vec<Link>,
    interactions: Vec<Interaction>,
    chat: Vec<ChatMessage>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_links(&mut self, links: impl IntoIterator<Item = Link>) {
        self.links.extend(links);
    }

    /// Log a submitted text. Interactions stay ordered by id, which is
    /// handed out when a submission takes its place in line, so a slow
    /// cycle still lands before a later one that finished first.
    pub fn record_interaction(&mut self, interaction: Interaction) {
        let at = self
            .interactions
            .partition_point(|existing| existing.id < interaction.id);
        self.interactions.insert(at, interaction);
    }

    pub fn push_chat(&mut self, message: ChatMessage) {
        self.chat.push(message);
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    /// Text of the latest coach message, used as the prompt of new blocks.
    pub fn latest_prompt(&self) -> Option<String> {
        self.chat
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Ai)
            .map(|m| m.text.clone())
    }

    /// Links whose endpoints both still exist, with their notes' titles.
    /// Dangling links are filtered out.
    pub fn resolve_links(&self, store: &BlockStore) -> Vec<ResolvedLink> {
        self.links
            .iter()
            .filter_map(|link| {
                let from_note = store.note(store.note_of(link.from_id)?)?;
                let to_note = store.note(store.note_of(link.to_id)?)?;
                Some(ResolvedLink {
                    link: *link,
                    from_title: from_note.title.clone(),
                    to_title: to_note.title.clone(),
                })
            })
            .collect()
    }
}

/// A link whose endpoints resolve, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub link: Link,
    pub from_title: String,
    pub to_title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use quill_notes::BlockKind;

    fn interaction(id: u64, content: &str) -> Interaction {
        Interaction {
            id,
            timestamp: Utc::now(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_interactions_keep_id_order() {
        let mut log = SessionLog::new();
        log.record_interaction(interaction(2, "two"));
        log.record_interaction(interaction(3, "three"));
        log.record_interaction(interaction(1, "one"));

        let contents: Vec<&str> = log
            .interactions()
            .iter()
            .map(|i| i.content.as_str())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_latest_prompt_skips_user_messages() {
        let mut log = SessionLog::new();
        assert_eq!(log.latest_prompt(), None);
        log.push_chat(ChatMessage::ai("What caught your eye today?"));
        log.push_chat(ChatMessage::user("a fox"));
        assert_eq!(
            log.latest_prompt().as_deref(),
            Some("What caught your eye today?")
        );
    }

    #[test]
    fn test_dangling_links_are_filtered() {
        let mut store = BlockStore::new();
        let note = store.create_note("walks");
        let a = store.append_block(note, BlockKind::user("fox")).unwrap();
        let b = store.append_block(note, BlockKind::user("wolf")).unwrap();
        let c = store.append_block(note, BlockKind::user("owl")).unwrap();

        let mut log = SessionLog::new();
        log.record_links([
            Link { from_id: b, to_id: a, strength: 0.9 },
            Link { from_id: c, to_id: a, strength: 0.85 },
        ]);
        store.remove_block(c).unwrap();

        let resolved = log.resolve_links(&store);
        assert_eq!(log.links().len(), 2);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].link.from_id, b);
        assert_eq!(resolved[0].from_title, "walks");
    }
}
