use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Author of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    /// Gemini and older browser clients call this role `model`.
    #[serde(alias = "model")]
    #[strum(to_string = "assistant", serialize = "model")]
    Assistant,
}

/// One chronological turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn model_role_is_read_as_assistant() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"model","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!("model".parse::<Role>().unwrap(), Role::Assistant);
    }

    #[test]
    fn assistant_role_is_written_as_assistant() {
        let json = serde_json::to_value(ChatMessage::assistant("hello")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result = serde_json::from_str::<ChatMessage>(r#"{"role":"system","content":"x"}"#);
        assert!(result.is_err());
    }
}
