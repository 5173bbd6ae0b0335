//! Upstream generative-language APIs.
//!
//! An [`Upstream`] performs exactly one HTTP round trip per call.  Deadlines,
//! retries and error classification belong to [`crate::RelayService`].

pub mod gemini;
pub mod passthrough;

use async_trait::async_trait;
use http::HeaderMap;
use serde::Serialize;
use strum::{Display, EnumString};

use crate::error::UpstreamError;
use crate::types::{RelayRequest, RelayResponse};

/// Which wire format the upstream speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UpstreamKind {
    /// Google `generateContent`.
    Gemini,
    /// Another relay speaking `{message, history}` → `{text, usage, model}`.
    Passthrough,
}

/// Static description reported by `GET /relay/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamInfo {
    pub kind: UpstreamKind,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send one completion request with the given extra headers.
    async fn complete(
        &self,
        request: &RelayRequest,
        headers: HeaderMap,
    ) -> Result<RelayResponse, UpstreamError>;

    fn describe(&self) -> UpstreamInfo;
}

/// Turn a non-2xx response into [`UpstreamError::Status`].
pub(crate) async fn status_error(response: reqwest::Response) -> UpstreamError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    UpstreamError::Status {
        status: status.as_u16(),
        message: error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_owned()),
    }
}

/// Pull the error text out of the JSON error shapes seen in the wild:
/// `{"error": {"message": ..}}`, `{"error": ".."}` and `{"message": ".."}`.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let text = match value.get("error") {
        Some(serde_json::Value::String(s)) => Some(s.as_str()),
        Some(err) => err
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| err.get("status").and_then(|s| s.as_str())),
        None => None,
    }
    .or_else(|| value.get("message").and_then(|m| m.as_str()))?;
    Some(text.to_owned())
}

pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("chatrelay/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to build HTTP client; using defaults");
            reqwest::Client::new()
        })
}
