//! Bounded conversation history.

use std::collections::VecDeque;

use serde::{Serialize, Serializer};

use crate::error::RelayError;
use crate::message::ChatMessage;

/// Maximum number of turns kept in a conversation by default.
pub const DEFAULT_HISTORY_CAP: usize = 16;

/// Chronological list of turns that never grows past its cap.
///
/// [`push`](Self::push) evicts the oldest turns first once the cap is
/// reached.  [`from_messages`](Self::from_messages) refuses an input that is
/// already over the cap instead of silently dropping turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: VecDeque<ChatMessage>,
    cap: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::with_cap(DEFAULT_HISTORY_CAP)
    }
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Build a history from an inbound list, rejecting lists longer than `cap`.
    pub fn from_messages(messages: Vec<ChatMessage>, cap: usize) -> Result<Self, RelayError> {
        if messages.len() > cap {
            return Err(RelayError::InvalidRequest(format!(
                "history has {} messages; maximum is {cap}",
                messages.len()
            )));
        }
        Ok(Self {
            messages: messages.into(),
            cap,
        })
    }

    /// Append a turn, evicting from the front while over the cap.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.cap {
            self.messages.pop_front();
        }
    }

    /// Append a user message and the assistant reply that answered it.
    pub fn push_turn(&mut self, user: impl Into<String>, reply: impl Into<String>) {
        self.push(ChatMessage::user(user));
        self.push(ChatMessage::assistant(reply));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ChatMessage> + '_ {
        self.messages.iter()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a ChatMessage;
    type IntoIter = std::collections::vec_deque::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

impl Serialize for ConversationHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.messages)
    }
}
