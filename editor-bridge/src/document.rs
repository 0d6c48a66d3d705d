//! The editable-document surface.
//!
//! An editable document is an ordered list of nodes with stable external
//! ids. The bridge reads it, replaces it wholesale when the store changes,
//! and listens to its change notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::event::DocumentEvent;

/// Node type as the editor knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Editable text written by the user.
    Paragraph,

    /// Read-only coach reply.
    AiResponse,
}

/// Per-node props.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProps {
    /// Coach question shown above a paragraph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// One node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    /// External identifier, stable across edits.
    pub id: String,
    pub kind: NodeKind,
    pub text: String,
    pub editable: bool,
    pub props: NodeProps,
}

impl DocumentNode {
    /// An editable paragraph.
    pub fn paragraph(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Paragraph,
            text: text.into(),
            editable: true,
            props: NodeProps::default(),
        }
    }

    /// A read-only coach reply.
    pub fn ai_response(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::AiResponse,
            text: text.into(),
            editable: false,
            props: NodeProps::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.props.prompt = prompt;
        self
    }
}

/// An externally owned document the bridge keeps in sync with a note.
pub trait EditableDocument: Send + Sync {
    /// Current nodes, in order.
    fn nodes(&self) -> Vec<DocumentNode>;

    /// Id of the node under the cursor.
    fn focus(&self) -> Option<String>;

    /// Replace the whole tree. `focus` moves the cursor; `None` keeps it
    /// where it was if that node survives.
    fn replace_nodes(&mut self, nodes: Vec<DocumentNode>, focus: Option<&str>);

    /// Register for change notifications.
    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DocumentEvent>;
}

/// A document held in memory. Its mutators play the part of the writer:
/// each one emits the notification a real editor would.
#[derive(Debug, Default)]
pub struct InMemoryDocument {
    nodes: Vec<DocumentNode>,
    focus: Option<String>,
    listeners: Vec<mpsc::UnboundedSender<DocumentEvent>>,
    next_draft: u64,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the text of `node` and put the cursor there.
    pub fn type_text(&mut self, node: &str, text: impl Into<String>) -> bool {
        let Some(target) = self.nodes.iter_mut().find(|n| n.id == node) else {
            return false;
        };
        target.text = text.into();
        self.focus = Some(node.to_string());
        self.notify(DocumentEvent::changed(self.focus.clone()));
        true
    }

    /// Add an empty paragraph after `after` (or at the end) and focus it.
    /// Returns the editor-assigned id.
    pub fn add_paragraph(&mut self, after: Option<&str>) -> String {
        self.next_draft += 1;
        let id = format!("draft-{}", self.next_draft);
        let index = after
            .and_then(|a| self.position(a))
            .map_or(self.nodes.len(), |i| i + 1);
        self.nodes.insert(index, DocumentNode::paragraph(&id, ""));
        self.focus = Some(id.clone());
        self.notify(DocumentEvent::changed(self.focus.clone()));
        id
    }

    /// Drag `node` to `index`.
    pub fn move_node(&mut self, node: &str, index: usize) -> bool {
        let Some(from) = self.position(node) else {
            return false;
        };
        let moved = self.nodes.remove(from);
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, moved);
        self.notify(DocumentEvent::changed(self.focus.clone()));
        true
    }

    pub fn remove_node(&mut self, node: &str) -> bool {
        let Some(index) = self.position(node) else {
            return false;
        };
        self.nodes.remove(index);
        if self.focus.as_deref() == Some(node) {
            self.focus = None;
        }
        self.notify(DocumentEvent::changed(self.focus.clone()));
        true
    }

    /// Press the new-block key at `cursor` inside `node`.
    pub fn press_enter(&mut self, node: &str, cursor: usize) -> bool {
        if self.position(node).is_none() {
            return false;
        }
        self.focus = Some(node.to_string());
        self.notify(DocumentEvent::split(node, cursor));
        true
    }

    pub fn node(&self, id: &str) -> Option<&DocumentNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    fn notify(&mut self, event: DocumentEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl EditableDocument for InMemoryDocument {
    fn nodes(&self) -> Vec<DocumentNode> {
        self.nodes.clone()
    }

    fn focus(&self) -> Option<String> {
        self.focus.clone()
    }

    fn replace_nodes(&mut self, nodes: Vec<DocumentNode>, focus: Option<&str>) {
        self.nodes = nodes;
        if let Some(focus) = focus {
            self.focus = Some(focus.to_string());
        } else if self
            .focus
            .as_deref()
            .is_some_and(|current| self.position(current).is_none())
        {
            self.focus = None;
        }
        // Editors report programmatic writes like any other change.
        self.notify(DocumentEvent::changed(self.focus.clone()));
    }

    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DocumentEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }
}
