//! Adapter for an upstream that already speaks the relay's own JSON contract.

use async_trait::async_trait;
use http::HeaderMap;
use serde::Serialize;
use serde_json::Value;

use super::{build_client, status_error, Upstream, UpstreamInfo, UpstreamKind};
use crate::error::UpstreamError;
use crate::history::ConversationHistory;
use crate::types::{RelayRequest, RelayResponse};

#[derive(Serialize)]
struct PassthroughBody<'a> {
    message: &'a str,
    history: &'a ConversationHistory,
}

pub struct PassthroughUpstream {
    client: reqwest::Client,
    endpoint: String,
}

impl PassthroughUpstream {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

/// Validate `{text: string, usage?: any, model?: string}`.
fn parse_response(body: &str) -> Result<RelayResponse, UpstreamError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Malformed(format!("invalid JSON: {e}")))?;

    let text = match value.get("text") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) => return Err(UpstreamError::Malformed("`text` is empty".into())),
        Some(_) => return Err(UpstreamError::Malformed("`text` is not a string".into())),
        None => return Err(UpstreamError::Malformed("`text` is missing".into())),
    };

    Ok(RelayResponse {
        text,
        usage: value.get("usage").filter(|u| !u.is_null()).cloned(),
        model: value.get("model").and_then(Value::as_str).map(str::to_owned),
    })
}

#[async_trait]
impl Upstream for PassthroughUpstream {
    async fn complete(
        &self,
        request: &RelayRequest,
        headers: HeaderMap,
    ) -> Result<RelayResponse, UpstreamError> {
        let body = PassthroughBody {
            message: &request.message,
            history: &request.history,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let text = response.text().await?;
        parse_response(&text)
    }

    fn describe(&self) -> UpstreamInfo {
        UpstreamInfo {
            kind: UpstreamKind::Passthrough,
            endpoint: self.endpoint.clone(),
            model: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_accepts_minimal_and_full_shapes() {
        let resp = parse_response(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(resp, RelayResponse::text("hi"));

        let resp = parse_response(r#"{"text":"hi","usage":{"tokens":3},"model":"m1"}"#).unwrap();
        assert_eq!(resp.model.as_deref(), Some("m1"));
        assert_eq!(resp.usage.unwrap()["tokens"], 3);
    }

    #[test]
    fn parse_rejects_missing_or_non_string_text() {
        for body in [r#"{"reply":"hi"}"#, r#"{"text":42}"#, r#"{"text":"  "}"#, "[]"] {
            assert!(
                matches!(parse_response(body), Err(UpstreamError::Malformed(_))),
                "body {body} should be malformed"
            );
        }
    }

    #[test]
    fn null_usage_is_dropped() {
        let resp = parse_response(r#"{"text":"hi","usage":null}"#).unwrap();
        assert!(resp.usage.is_none());
    }
}
