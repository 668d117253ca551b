//! Request/response messages exchanged with the popup through the relay.
//!
//! [`Command`] is a closed set, tagged on `type`; unknown types decode to
//! [`Command::Other`] and are acknowledged. Every command resolves to a
//! [`Response`]; failures travel in an `error` field, never as a transport
//! error.

use serde::{Deserialize, Serialize};

use crate::search::{RoleFilter, SearchAction, SearchError, SearchOutcome};

/// Retryable error reported when no engine is attached to the page yet.
pub const NOT_READY_ERROR: &str = "Content script not ready. Please refresh the page.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    Ping,
    /// Reload settings from the store and prune again.
    ApplySettings,
    GetStats,
    #[serde(rename_all = "camelCase")]
    SearchArchive {
        query: String,
        #[serde(default)]
        action: SearchAction,
        #[serde(default)]
        use_regex: bool,
        #[serde(default)]
        filter: RoleFilter,
    },
    SearchNext,
    SearchPrev,
    ClearSearch,
    GetAllMessagesForExport,
    RefreshPrompt,
    /// Manual budget change from the popup.
    #[serde(rename_all = "camelCase")]
    SetBudget { keep_n: usize },
    #[serde(other)]
    Other,
}

/// Exchange counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub visible: usize,
    pub archived: usize,
    pub total: usize,
}

/// Search result as the popup reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReply {
    pub matches: usize,
    pub current_index: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<SearchOutcome> for SearchReply {
    fn from(o: SearchOutcome) -> Self {
        Self {
            matches: o.matches,
            current_index: o.current_index,
            total: o.total,
            error: None,
        }
    }
}

impl From<SearchError> for SearchReply {
    fn from(e: SearchError) -> Self {
        Self {
            error: Some(e.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Search(SearchReply),
    Stats(Stats),
    Messages { messages: Vec<String> },
    Ack { ok: bool },
    Error { error: String },
}

impl Response {
    pub fn ok() -> Self {
        Self::Ack { ok: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// The error carried by this response, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error } => Some(error),
            Self::Search(reply) => reply.error.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_decode_from_popup_messages() {
        let c: Command = serde_json::from_value(json!({"type": "getStats"})).unwrap();
        assert_eq!(c, Command::GetStats);

        let c: Command = serde_json::from_value(json!({
            "type": "searchArchive",
            "query": "token",
            "useRegex": true,
            "filter": "user"
        }))
        .unwrap();
        assert_eq!(
            c,
            Command::SearchArchive {
                query: "token".into(),
                action: SearchAction::Search,
                use_regex: true,
                filter: RoleFilter::User,
            }
        );

        let c: Command = serde_json::from_value(json!({"type": "setBudget", "keepN": 8})).unwrap();
        assert_eq!(c, Command::SetBudget { keep_n: 8 });
    }

    #[test]
    fn unknown_types_are_other() {
        let c: Command = serde_json::from_value(json!({"type": "importArchive", "archive": {}}))
            .unwrap();
        assert_eq!(c, Command::Other);
    }

    #[test]
    fn responses_encode_flat() {
        assert_eq!(serde_json::to_value(Response::ok()).unwrap(), json!({"ok": true}));
        let stats = Response::Stats(Stats {
            visible: 5,
            archived: 1,
            total: 6,
        });
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            json!({"visible": 5, "archived": 1, "total": 6})
        );
        let err = Response::Search(SearchError::InvalidPattern("x".into()).into());
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["matches"], 0);
        assert_eq!(v["error"], "Invalid regex: x");
    }

    #[test]
    fn responses_decode_to_the_right_shape() {
        let r: Response = serde_json::from_value(json!({"visible": 1, "archived": 0, "total": 1}))
            .unwrap();
        assert!(matches!(r, Response::Stats(_)));
        let r: Response = serde_json::from_value(json!({"error": NOT_READY_ERROR})).unwrap();
        assert_eq!(r.error_message(), Some(NOT_READY_ERROR));
    }
}
