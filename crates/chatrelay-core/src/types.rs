use serde::{Deserialize, Serialize};

use crate::history::ConversationHistory;

/// One user turn to relay upstream.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub message: String,
    pub history: ConversationHistory,
    /// Groups logged turns; a fresh id is generated when absent.
    pub session_id: Option<String>,
}

impl RelayRequest {
    pub fn new(message: impl Into<String>, history: ConversationHistory) -> Self {
        Self {
            message: message.into(),
            history,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Normalized reply.  `text` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usage: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
}

impl RelayResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            model: None,
        }
    }
}
