//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use anyhow::Context;
use chatrelay_core::upstream::gemini::DEFAULT_BASE_URL;
use chatrelay_core::{
    AuthContext, ChatLogSink, GeminiUpstream, NoopSink, PassthroughUpstream, RelayPolicy,
    RelayService, SlidingWindowLimiter, TracingSink, Upstream, UpstreamKind,
};
use tracing::info;

use crate::config::{ChatLogMode, Config};
use crate::db::sqlite::SqliteChatLog;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub relay: Arc<RelayService>,
    /// Per-client quota; `None` when `CHATRELAY_RATE_LIMIT_PER_MINUTE=0`.
    pub limiter: Option<Arc<SlidingWindowLimiter>>,
    /// Credentials for with-auth attempts when the caller sends none.
    pub default_auth: AuthContext,
}

impl AppState {
    /// Build the upstream client and chat log sink described by `config`.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let upstream = build_upstream(&config)?;
        let sink = build_sink(&config).await?;
        Ok(Self::new(config, upstream, sink))
    }

    pub fn new(config: Config, upstream: Arc<dyn Upstream>, sink: Arc<dyn ChatLogSink>) -> Self {
        let policy = RelayPolicy::default().with_attempt_timeout(config.attempt_timeout());
        let relay = RelayService::new(upstream).with_sink(sink).with_policy(policy);
        let limiter = (config.rate_limit_per_minute > 0)
            .then(|| Arc::new(SlidingWindowLimiter::per_minute(config.rate_limit_per_minute)));

        Self {
            default_auth: config.default_auth(),
            config: Arc::new(config),
            relay: Arc::new(relay),
            limiter,
        }
    }
}

fn build_upstream(config: &Config) -> anyhow::Result<Arc<dyn Upstream>> {
    let upstream: Arc<dyn Upstream> = match config.upstream_kind {
        UpstreamKind::Gemini => {
            let base_url = config.upstream_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
            Arc::new(
                GeminiUpstream::new(base_url, config.model.as_str())
                    .with_api_key(config.api_key.clone()),
            )
        }
        UpstreamKind::Passthrough => {
            let endpoint = config
                .upstream_url
                .as_deref()
                .context("CHATRELAY_UPSTREAM_URL is required when CHATRELAY_UPSTREAM=passthrough")?;
            Arc::new(PassthroughUpstream::new(endpoint))
        }
    };

    let info = upstream.describe();
    info!(kind = %info.kind, endpoint = %info.endpoint, "upstream configured");
    Ok(upstream)
}

async fn build_sink(config: &Config) -> anyhow::Result<Arc<dyn ChatLogSink>> {
    let sink: Arc<dyn ChatLogSink> = match config.chat_log {
        ChatLogMode::None => Arc::new(NoopSink),
        ChatLogMode::Tracing => Arc::new(TracingSink),
        ChatLogMode::Sqlite => {
            let log = SqliteChatLog::connect(&config.database_url)
                .await
                .with_context(|| format!("opening chat log at {}", config.database_url))?;
            info!(database_url = %config.database_url, "chat log database ready");
            Arc::new(log)
        }
    };
    Ok(sink)
}
