//! Server configuration, loaded from environment variables at startup.

use std::fmt;
use std::time::Duration;

use chatrelay_core::{AuthContext, UpstreamKind, DEFAULT_HISTORY_CAP};
use strum::{Display, EnumString};

/// Where completed chat turns are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChatLogMode {
    None,
    Tracing,
    Sqlite,
}

/// Runtime configuration for chatrelay-server.
///
/// Every field has a default so the server starts without any environment
/// variables set (it will talk to Gemini without an API key, which the
/// upstream rejects until `CHATRELAY_API_KEY` is provided).
#[derive(Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8080"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Wire format of the upstream (default: `gemini`).
    pub upstream_kind: UpstreamKind,

    /// Base URL (Gemini) or full endpoint (passthrough).  `None` uses the
    /// public Gemini endpoint.
    pub upstream_url: Option<String>,

    /// Gemini model name.
    pub model: String,

    /// Upstream API key, sent as `x-goog-api-key`.
    pub api_key: Option<String>,

    /// Tokens used for with-auth attempts when the caller presents none.
    pub bearer_token: Option<String>,
    pub app_check_token: Option<String>,

    /// Deadline for each upstream attempt.
    pub attempt_timeout_secs: u64,

    /// Longest history accepted on `POST /relay`.
    pub history_cap: usize,

    /// Relay calls allowed per client per minute; `0` disables the limiter.
    pub rate_limit_per_minute: usize,

    pub chat_log: ChatLogMode,

    /// sqlx SQLite URL used when `chat_log` is `sqlite`.
    pub database_url: String,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .field("upstream_kind", &self.upstream_kind)
            .field("upstream_url", &self.upstream_url)
            .field("model", &self.model)
            .field("api_key", &redacted(&self.api_key))
            .field("bearer_token", &redacted(&self.bearer_token))
            .field("app_check_token", &redacted(&self.app_check_token))
            .field("attempt_timeout_secs", &self.attempt_timeout_secs)
            .field("history_cap", &self.history_cap)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("chat_log", &self.chat_log)
            .field("database_url", &self.database_url)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("enable_swagger", &self.enable_swagger)
            .finish()
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("CHATRELAY_BIND", "0.0.0.0:8080"),
            log_level: env_or("CHATRELAY_LOG", "info"),
            log_json: env_flag("CHATRELAY_LOG_JSON", false),
            upstream_kind: parse_env("CHATRELAY_UPSTREAM", UpstreamKind::Gemini),
            upstream_url: env_opt("CHATRELAY_UPSTREAM_URL"),
            model: env_or("CHATRELAY_MODEL", chatrelay_core::upstream::gemini::DEFAULT_MODEL),
            api_key: env_opt("CHATRELAY_API_KEY"),
            bearer_token: env_opt("CHATRELAY_BEARER_TOKEN"),
            app_check_token: env_opt("CHATRELAY_APPCHECK_TOKEN"),
            attempt_timeout_secs: parse_env("CHATRELAY_ATTEMPT_TIMEOUT_SECS", 30),
            history_cap: parse_env("CHATRELAY_HISTORY_CAP", DEFAULT_HISTORY_CAP),
            rate_limit_per_minute: parse_env("CHATRELAY_RATE_LIMIT_PER_MINUTE", 10),
            chat_log: parse_env("CHATRELAY_CHAT_LOG", ChatLogMode::Tracing),
            database_url: env_or("CHATRELAY_DATABASE_URL", "sqlite://chatrelay.db?mode=rwc"),
            cors_allowed_origins: env_opt("CHATRELAY_CORS_ORIGINS"),
            enable_swagger: env_flag("CHATRELAY_ENABLE_SWAGGER", true),
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs.max(1))
    }

    /// Configured fallback credentials for with-auth attempts.
    pub fn default_auth(&self) -> AuthContext {
        AuthContext::new(self.bearer_token.clone(), self.app_check_token.clone())
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

#[cfg(test)]
impl Config {
    /// Defaults without reading the process environment.
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1:0".into(),
            log_level: "debug".into(),
            log_json: false,
            upstream_kind: UpstreamKind::Passthrough,
            upstream_url: Some("http://127.0.0.1:9/relay".into()),
            model: "test-model".into(),
            api_key: Some("secret-key".into()),
            bearer_token: None,
            app_check_token: None,
            attempt_timeout_secs: 30,
            history_cap: DEFAULT_HISTORY_CAP,
            rate_limit_per_minute: 10,
            chat_log: ChatLogMode::None,
            database_url: "sqlite::memory:".into(),
            cors_allowed_origins: None,
            enable_swagger: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chat_log_mode_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<ChatLogMode>().unwrap(), ChatLogMode::Sqlite);
        assert_eq!("none".parse::<ChatLogMode>().unwrap(), ChatLogMode::None);
        assert!("firestore".parse::<ChatLogMode>().is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut cfg = Config::for_tests();
        cfg.bearer_token = Some("bearer-secret".into());
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(!rendered.contains("bearer-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let mut cfg = Config::for_tests();
        cfg.attempt_timeout_secs = 0;
        assert_eq!(cfg.attempt_timeout(), Duration::from_secs(1));
    }
}
