//! Best-effort chat log.
//!
//! Entries are written from a detached task; the outcome is never observed by
//! the relay caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::SinkError;

/// One completed turn.
#[derive(Debug, Clone)]
pub struct ChatLogEntry {
    pub session_id: String,
    pub message: String,
    pub reply: String,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ChatLogSink: Send + Sync {
    async fn record(&self, entry: ChatLogEntry) -> Result<(), SinkError>;
}

/// Discards every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl ChatLogSink for NoopSink {
    async fn record(&self, _entry: ChatLogEntry) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Emits one structured log line per turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl ChatLogSink for TracingSink {
    async fn record(&self, entry: ChatLogEntry) -> Result<(), SinkError> {
        info!(
            target: "chatrelay::chat_log",
            session_id = %entry.session_id,
            model = entry.model.as_deref().unwrap_or("unknown"),
            message = %entry.message,
            reply = %entry.reply,
            "chat turn"
        );
        Ok(())
    }
}

/// Hand `entry` to `sink` on a detached task and forget about it.
pub(crate) fn spawn_record(sink: Arc<dyn ChatLogSink>, entry: ChatLogEntry) {
    // Dropping the JoinHandle detaches the task; a panic inside it stays there.
    drop(tokio::spawn(async move {
        if let Err(e) = sink.record(entry).await {
            debug!(error = %e, "chat log write failed");
        }
    }));
}
