//! Change notifications emitted by an editable document.

use serde::{Deserialize, Serialize};

/// A document change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentEvent {
    /// The node tree changed. Carries the node under the cursor, if any.
    Changed { focus: Option<String> },

    /// The writer pressed the new-block key inside `node` at character
    /// offset `cursor`. The document leaves the split to the bridge.
    Split { node: String, cursor: usize },
}

impl DocumentEvent {
    pub fn changed(focus: Option<impl Into<String>>) -> Self {
        Self::Changed {
            focus: focus.map(Into::into),
        }
    }

    pub fn split(node: impl Into<String>, cursor: usize) -> Self {
        Self::Split {
            node: node.into(),
            cursor,
        }
    }
}
