//! chatrelay-core – the chat relay service.
//!
//! A [`RelayService`] takes one user message plus a short
//! [`ConversationHistory`], forwards it to an [`Upstream`] generative-language
//! API and returns a normalized [`RelayResponse`].  Attempts run through an
//! ordered list of [`AttemptStrategy`] values (with-auth, then no-auth by
//! default) and every failure is mapped onto the small [`RelayError`]
//! taxonomy before it reaches the caller.

pub mod auth;
mod classify;
pub mod error;
pub mod history;
pub mod message;
pub mod ratelimit;
pub mod relay;
pub mod sink;
pub mod strategy;
pub mod types;
pub mod upstream;

pub use auth::{AuthContext, AuthProvider, NoAuth, APP_CHECK_HEADER};
pub use error::{AuthError, RelayError, SinkError, UpstreamError};
pub use history::{ConversationHistory, DEFAULT_HISTORY_CAP};
pub use message::{ChatMessage, Role};
pub use ratelimit::SlidingWindowLimiter;
pub use relay::{ConnectionTest, RelayService, RelayStatus};
pub use sink::{ChatLogEntry, ChatLogSink, NoopSink, TracingSink};
pub use strategy::{AttemptStrategy, RelayPolicy, DEFAULT_ATTEMPT_TIMEOUT};
pub use types::{RelayRequest, RelayResponse};
pub use upstream::{
    gemini::GeminiUpstream, passthrough::PassthroughUpstream, Upstream, UpstreamInfo, UpstreamKind,
};
