//! The relay: one user turn in, one normalized reply (or a typed error) out.
//!
//! Per request the service walks its [`RelayPolicy`] strategies in order:
//!
//! ```text
//! Start → WithAuth ─ok──────────────────────────→ Success
//!            └─retryable─→ NoAuth ─ok───────────→ Success
//!            │                └─any failure─────→ Failure
//!            └─non-retryable───────────────────→ Failure
//! ```
//!
//! Each attempt runs under its own deadline.  Dropping a timed-out attempt
//! cancels its HTTP call but not the relay itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http::HeaderMap;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthProvider;
use crate::classify::classify;
use crate::error::{RelayError, UpstreamError};
use crate::history::ConversationHistory;
use crate::sink::{spawn_record, ChatLogEntry, ChatLogSink, NoopSink};
use crate::strategy::{AttemptStrategy, RelayPolicy};
use crate::types::{RelayRequest, RelayResponse};
use crate::upstream::{Upstream, UpstreamInfo};

/// Message sent by [`RelayService::test_connection`].
const PING_MESSAGE: &str = "Hello";

/// Outcome of [`RelayService::test_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Configuration snapshot reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayStatus {
    pub upstream: UpstreamInfo,
    pub strategies: Vec<AttemptStrategy>,
    pub attempt_timeout_ms: u64,
}

pub struct RelayService {
    upstream: Arc<dyn Upstream>,
    sink: Arc<dyn ChatLogSink>,
    policy: RelayPolicy,
}

impl RelayService {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self {
            upstream,
            sink: Arc::new(NoopSink),
            policy: RelayPolicy::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ChatLogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_policy(mut self, policy: RelayPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RelayPolicy {
        &self.policy
    }

    /// Relay `request` upstream.
    ///
    /// An empty message fails with [`RelayError::InvalidRequest`] before any
    /// upstream call.  The history is sent as given; trimming it to the cap
    /// is the caller's job.
    pub async fn relay(
        &self,
        request: &RelayRequest,
        auth: &dyn AuthProvider,
    ) -> Result<RelayResponse, RelayError> {
        if request.message.trim().is_empty() {
            return Err(RelayError::InvalidRequest("message is required".into()));
        }

        let mut last_error = None;
        for (index, strategy) in self.policy.strategies.iter().copied().enumerate() {
            let attempt = index + 1;
            let headers = self.headers_for(strategy, auth).await;

            match self.attempt(request, headers).await {
                Ok(response) => {
                    info!(
                        attempt,
                        %strategy,
                        model = response.model.as_deref().unwrap_or("unknown"),
                        reply_len = response.text.len(),
                        "relay succeeded"
                    );
                    self.log_turn(request, &response);
                    return Ok(response);
                }
                Err(e) => {
                    let classified = classify(&e);
                    warn!(
                        attempt,
                        budget = self.policy.budget(),
                        %strategy,
                        kind = classified.error.code(),
                        retryable = classified.retryable,
                        error = %e,
                        "relay attempt failed"
                    );
                    last_error = Some(classified.error);
                    if !classified.retryable {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(RelayError::UpstreamServerError))
    }

    /// Relay a fixed greeting to check the upstream is reachable.
    pub async fn test_connection(&self, auth: &dyn AuthProvider) -> ConnectionTest {
        let request = RelayRequest::new(PING_MESSAGE, ConversationHistory::new());
        match self.relay(&request, auth).await {
            Ok(response) => ConnectionTest {
                success: true,
                response: Some(response.text),
                error: None,
            },
            Err(e) => ConnectionTest {
                success: false,
                response: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            upstream: self.upstream.describe(),
            strategies: self.policy.strategies.clone(),
            attempt_timeout_ms: duration_ms(self.policy.attempt_timeout),
        }
    }

    async fn headers_for(&self, strategy: AttemptStrategy, auth: &dyn AuthProvider) -> HeaderMap {
        if !strategy.uses_auth() {
            return HeaderMap::new();
        }
        match auth.auth_context().await.and_then(|ctx| ctx.to_headers()) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(error = %e, "auth headers unavailable; proceeding without auth");
                HeaderMap::new()
            }
        }
    }

    async fn attempt(
        &self,
        request: &RelayRequest,
        headers: HeaderMap,
    ) -> Result<RelayResponse, UpstreamError> {
        let response = tokio::time::timeout(
            self.policy.attempt_timeout,
            self.upstream.complete(request, headers),
        )
        .await
        .map_err(|_| UpstreamError::Timeout)??;

        if response.text.trim().is_empty() {
            return Err(UpstreamError::Malformed("reply text is empty".into()));
        }
        Ok(response)
    }

    fn log_turn(&self, request: &RelayRequest, response: &RelayResponse) {
        let entry = ChatLogEntry {
            session_id: request
                .session_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            message: request.message.clone(),
            reply: response.text.clone(),
            model: response.model.clone(),
            created_at: Utc::now(),
        };
        spawn_record(Arc::clone(&self.sink), entry);
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use http::header::AUTHORIZATION;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    use super::*;
    use crate::auth::{AuthContext, NoAuth};
    use crate::error::{AuthError, SinkError};
    use crate::message::ChatMessage;
    use crate::upstream::UpstreamKind;

    enum Step {
        Reply(Result<RelayResponse, UpstreamError>),
        Hang,
    }

    /// Upstream that plays back a fixed script and records every call.
    struct ScriptedUpstream {
        script: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        seen_headers: Mutex<Vec<HeaderMap>>,
    }

    impl ScriptedUpstream {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
                seen_headers: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Upstream for ScriptedUpstream {
        async fn complete(
            &self,
            _request: &RelayRequest,
            headers: HeaderMap,
        ) -> Result<RelayResponse, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_headers.lock().unwrap().push(headers);
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(result)) => result,
                Some(Step::Hang) => std::future::pending().await,
                None => panic!("upstream called more times than scripted"),
            }
        }

        fn describe(&self) -> UpstreamInfo {
            UpstreamInfo {
                kind: UpstreamKind::Passthrough,
                endpoint: "scripted://".into(),
                model: None,
            }
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ChatLogSink for FailingSink {
        async fn record(&self, _entry: ChatLogEntry) -> Result<(), SinkError> {
            Err(SinkError::Write("disk full".into()))
        }
    }

    struct PanickingSink;

    #[async_trait]
    impl ChatLogSink for PanickingSink {
        async fn record(&self, _entry: ChatLogEntry) -> Result<(), SinkError> {
            panic!("sink exploded");
        }
    }

    struct ChannelSink(mpsc::UnboundedSender<ChatLogEntry>);

    #[async_trait]
    impl ChatLogSink for ChannelSink {
        async fn record(&self, entry: ChatLogEntry) -> Result<(), SinkError> {
            self.0.send(entry).map_err(|e| SinkError::Write(e.to_string()))
        }
    }

    struct BrokenAuth;

    #[async_trait]
    impl AuthProvider for BrokenAuth {
        async fn auth_context(&self) -> Result<AuthContext, AuthError> {
            Err(AuthError::Unavailable("not signed in".into()))
        }
    }

    fn ok(text: &str) -> Step {
        Step::Reply(Ok(RelayResponse::text(text)))
    }

    fn http(status: u16, message: &str) -> Step {
        Step::Reply(Err(UpstreamError::Status {
            status,
            message: message.into(),
        }))
    }

    fn request(message: &str) -> RelayRequest {
        RelayRequest::new(message, ConversationHistory::new())
    }

    fn signed_in() -> AuthContext {
        AuthContext::new(Some("id-token".into()), Some("attest".into()))
    }

    #[tokio::test]
    async fn empty_message_never_reaches_upstream() {
        let upstream = ScriptedUpstream::new(vec![]);
        let service = RelayService::new(upstream.clone());

        for message in ["", "   "] {
            let err = service.relay(&request(message), &NoAuth).await.unwrap_err();
            assert!(matches!(err, RelayError::InvalidRequest(_)));
        }
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn first_success_returns_after_one_call() {
        let upstream = ScriptedUpstream::new(vec![ok("hi there")]);
        let service = RelayService::new(upstream.clone());

        let resp = service.relay(&request("hello"), &signed_in()).await.unwrap();
        assert_eq!(resp.text, "hi there");
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn auth_rejection_falls_back_to_no_auth() {
        let upstream = ScriptedUpstream::new(vec![http(401, "Unauthorized"), ok("anonymous reply")]);
        let service = RelayService::new(upstream.clone());

        let resp = service.relay(&request("hello"), &signed_in()).await.unwrap();
        assert_eq!(resp.text, "anonymous reply");
        assert_eq!(upstream.calls(), 2);

        let seen = upstream.seen_headers.lock().unwrap();
        assert_eq!(seen[0][AUTHORIZATION], "Bearer id-token");
        assert!(seen[1].is_empty(), "no-auth attempt must not carry credentials");
        assert!(logs_contain("relay attempt failed"));
    }

    #[tokio::test]
    async fn auth_rejected_twice_is_auth_failure() {
        let upstream = ScriptedUpstream::new(vec![http(401, "Unauthorized"), http(401, "Unauthorized")]);
        let service = RelayService::new(upstream.clone());

        let err = service.relay(&request("hello"), &signed_in()).await.unwrap_err();
        assert_eq!(err, RelayError::AuthFailure);
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        let upstream = ScriptedUpstream::new(vec![http(400, "Bad Request")]);
        let service = RelayService::new(upstream.clone());

        let err = service.relay(&request("hello"), &signed_in()).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn server_errors_exhaust_budget() {
        let upstream = ScriptedUpstream::new(vec![http(500, "boom"), http(503, "overloaded")]);
        let service = RelayService::new(upstream.clone());

        let err = service.relay(&request("hello"), &NoAuth).await.unwrap_err();
        assert_eq!(err, RelayError::UpstreamServerError);
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test]
    async fn surfaced_error_never_contains_upstream_detail() {
        let upstream = ScriptedUpstream::new(vec![
            Step::Reply(Err(UpstreamError::Network("dns error: secret.internal".into()))),
            Step::Reply(Err(UpstreamError::Network("dns error: secret.internal".into()))),
        ]);
        let service = RelayService::new(upstream);

        let err = service.relay(&request("hello"), &NoAuth).await.unwrap_err();
        assert_eq!(err, RelayError::NetworkError);
        assert!(!err.to_string().contains("secret.internal"));
    }

    #[tokio::test]
    async fn rate_limited_on_last_attempt() {
        let upstream = ScriptedUpstream::new(vec![http(503, "unavailable"), http(429, "Too Many Requests")]);
        let service = RelayService::new(upstream);

        let err = service.relay(&request("hello"), &NoAuth).await.unwrap_err();
        assert_eq!(err, RelayError::RateLimited);
    }

    #[tokio::test]
    async fn missing_text_is_malformed() {
        let upstream = ScriptedUpstream::new(vec![
            Step::Reply(Err(UpstreamError::Malformed("`text` is missing".into()))),
            Step::Reply(Ok(RelayResponse::text(""))),
        ]);
        let service = RelayService::new(upstream.clone());

        let err = service.relay(&request("hello"), &NoAuth).await.unwrap_err();
        assert_eq!(err, RelayError::MalformedResponse);
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempt_is_retried() {
        let upstream = ScriptedUpstream::new(vec![Step::Hang, ok("second try")]);
        let service = RelayService::new(upstream.clone());

        let started = tokio::time::Instant::now();
        let resp = service.relay(&request("hello"), &NoAuth).await.unwrap();
        assert_eq!(resp.text, "second try");
        assert_eq!(upstream.calls(), 2);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn timing_out_twice_is_timeout() {
        let upstream = ScriptedUpstream::new(vec![Step::Hang, Step::Hang]);
        let service = RelayService::new(upstream)
            .with_policy(RelayPolicy::default().with_attempt_timeout(Duration::from_secs(5)));

        let err = service.relay(&request("hello"), &NoAuth).await.unwrap_err();
        assert_eq!(err, RelayError::Timeout);
    }

    #[tokio::test]
    async fn unavailable_auth_still_attempts() {
        let upstream = ScriptedUpstream::new(vec![ok("fine")]);
        let service = RelayService::new(upstream.clone());

        let resp = service.relay(&request("hello"), &BrokenAuth).await.unwrap();
        assert_eq!(resp.text, "fine");
        assert!(upstream.seen_headers.lock().unwrap()[0].is_empty());
    }

    #[tokio::test]
    async fn third_strategy_is_a_data_change() {
        let upstream = ScriptedUpstream::new(vec![http(500, "a"), http(500, "b"), ok("third")]);
        let policy = RelayPolicy::default().with_strategies(vec![
            AttemptStrategy::WithAuth,
            AttemptStrategy::NoAuth,
            AttemptStrategy::NoAuth,
        ]);
        let service = RelayService::new(upstream.clone()).with_policy(policy);

        let resp = service.relay(&request("hello"), &NoAuth).await.unwrap();
        assert_eq!(resp.text, "third");
        assert_eq!(upstream.calls(), 3);
    }

    #[tokio::test]
    async fn failing_sink_does_not_change_outcome() {
        for sink in [
            Arc::new(NoopSink) as Arc<dyn ChatLogSink>,
            Arc::new(FailingSink),
            Arc::new(PanickingSink),
        ] {
            let ok_service =
                RelayService::new(ScriptedUpstream::new(vec![ok("reply")])).with_sink(sink.clone());
            let resp = ok_service.relay(&request("hello"), &NoAuth).await;
            assert_eq!(resp, Ok(RelayResponse::text("reply")));

            let err_service = RelayService::new(ScriptedUpstream::new(vec![http(400, "bad request")]))
                .with_sink(sink);
            let err = err_service.relay(&request("hello"), &NoAuth).await;
            assert!(matches!(err, Err(RelayError::InvalidRequest(_))));

            // Let the detached log task run to completion (or panic) before
            // the next iteration.
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn successful_turn_is_logged_with_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let upstream = ScriptedUpstream::new(vec![ok("pong")]);
        let service = RelayService::new(upstream).with_sink(Arc::new(ChannelSink(tx)));

        let mut history = ConversationHistory::new();
        history.push(ChatMessage::user("earlier"));
        let req = RelayRequest::new("ping", history).with_session("session-1");
        service.relay(&req, &NoAuth).await.unwrap();

        let entry = rx.recv().await.expect("log entry");
        assert_eq!(entry.session_id, "session-1");
        assert_eq!(entry.message, "ping");
        assert_eq!(entry.reply, "pong");
    }

    #[tokio::test]
    async fn test_connection_reports_both_outcomes() {
        let service = RelayService::new(ScriptedUpstream::new(vec![ok("hi!")]));
        let report = service.test_connection(&NoAuth).await;
        assert!(report.success);
        assert_eq!(report.response.as_deref(), Some("hi!"));

        let service = RelayService::new(ScriptedUpstream::new(vec![http(404, "not found")]));
        let report = service.test_connection(&NoAuth).await;
        assert!(!report.success);
        assert!(report.error.is_some());
    }

    #[test]
    fn status_reports_policy() {
        let service = RelayService::new(ScriptedUpstream::new(vec![]));
        let status = service.status();
        assert_eq!(status.strategies, vec![AttemptStrategy::WithAuth, AttemptStrategy::NoAuth]);
        assert_eq!(status.attempt_timeout_ms, 30_000);
        assert_eq!(status.upstream.endpoint, "scripted://");
    }
}
