//! Chat log persistence.
//!
//! [`sqlite::SqliteChatLog`] implements [`chatrelay_core::ChatLogSink`], so
//! the relay hands it entries on a detached task and never waits for the
//! write.  Each turn becomes two rows in `chat_messages`: the user's message
//! and the assistant's reply.

pub mod sqlite;
