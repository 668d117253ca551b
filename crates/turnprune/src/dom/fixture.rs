//! Conversation fixtures: JSON transcripts loaded into a [`MemoryDocument`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::MemoryDocument;

/// One turn of a fixture transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureTurn {
    pub role: String,
    pub text: String,
}

/// A conversation transcript, e.g.
///
/// ```json
/// { "turns": [ { "role": "user", "text": "How do lifetimes work?" } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationFixture {
    pub turns: Vec<FixtureTurn>,
    /// Whether the page has a message composer form.
    #[serde(default = "default_true")]
    pub composer: bool,
}

fn default_true() -> bool {
    true
}

impl ConversationFixture {
    /// Parse a fixture from JSON text.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("invalid conversation fixture: {e}"))
    }

    /// Read and parse a fixture file.
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        Self::from_json(&text)
    }

    /// Build an in-memory page holding this transcript.
    pub fn into_document(self) -> MemoryDocument {
        let mut doc = MemoryDocument::new();
        for turn in &self.turns {
            doc.append_turn(&turn.role, &turn.text);
        }
        if self.composer {
            doc.add_composer();
        }
        doc
    }
}
