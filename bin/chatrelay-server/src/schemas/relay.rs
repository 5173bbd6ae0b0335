//! Wire types for the `/relay` routes.

use chatrelay_core::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Request body for `POST /relay`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RelayBody {
    /// The user's new message.  Must contain non-whitespace text.
    pub message: String,
    /// Prior turns, oldest first.  Each item is `{"role": "user" | "assistant",
    /// "content": "..."}`; `"model"` is accepted as an alias for `"assistant"`.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<ChatMessage>,
    /// Groups logged turns; generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Successful reply from `POST /relay`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RelayReply {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub usage: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl From<chatrelay_core::RelayResponse> for RelayReply {
    fn from(r: chatrelay_core::RelayResponse) -> Self {
        Self {
            text: r.text,
            usage: r.usage,
            model: r.model,
        }
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}
