//! Google `generateContent` adapter.

use std::iter;

use async_trait::async_trait;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{build_client, status_error, Upstream, UpstreamInfo, UpstreamKind};
use crate::error::UpstreamError;
use crate::message::Role;
use crate::types::{RelayRequest, RelayResponse};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Finish reasons that mean the candidate was withheld by a safety filter.
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<WireContent<'a>>,
}

#[derive(Serialize)]
struct WireContent<'a> {
    role: &'static str,
    parts: [WirePart<'a>; 1],
}

#[derive(Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<serde_json::Value>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

// ── Adapter ──────────────────────────────────────────────────────────────────

pub struct GeminiUpstream {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiUpstream {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn build_body(request: &RelayRequest) -> GenerateContentRequest<'_> {
    let history = request.history.iter().map(|m| WireContent {
        role: wire_role(m.role),
        parts: [WirePart { text: &m.content }],
    });
    let current = WireContent {
        role: wire_role(Role::User),
        parts: [WirePart {
            text: &request.message,
        }],
    };
    GenerateContentRequest {
        contents: history.chain(iter::once(current)).collect(),
    }
}

fn parse_response(body: &str, fallback_model: &str) -> Result<RelayResponse, UpstreamError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Malformed(format!("invalid JSON: {e}")))?;

    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(UpstreamError::ContentRejected(reason));
    }

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::Malformed("response has no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(match candidate.finish_reason {
            Some(reason) if BLOCKED_FINISH_REASONS.contains(&reason.as_str()) => {
                UpstreamError::ContentRejected(reason)
            }
            _ => UpstreamError::Malformed("candidate has no text".into()),
        });
    }

    Ok(RelayResponse {
        text,
        usage: parsed.usage_metadata,
        model: Some(parsed.model_version.unwrap_or_else(|| fallback_model.to_owned())),
    })
}

#[async_trait]
impl Upstream for GeminiUpstream {
    async fn complete(
        &self,
        request: &RelayRequest,
        headers: HeaderMap,
    ) -> Result<RelayResponse, UpstreamError> {
        let body = build_body(request);
        debug!(model = %self.model, turns = body.contents.len(), "sending generateContent");

        let mut builder = self.client.post(self.endpoint()).headers(headers).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let text = response.text().await?;
        parse_response(&text, &self.model)
    }

    fn describe(&self) -> UpstreamInfo {
        UpstreamInfo {
            kind: UpstreamKind::Gemini,
            endpoint: self.endpoint(),
            model: Some(self.model.clone()),
        }
    }
}
