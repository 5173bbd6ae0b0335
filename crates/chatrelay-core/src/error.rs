use thiserror::Error;

/// Errors surfaced to relay callers.
///
/// The display strings are user-safe: they never contain upstream bodies,
/// URLs or transport details.  Full diagnostics are logged where the
/// underlying [`UpstreamError`] is classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The caller sent an empty or otherwise unusable request, or the
    /// upstream rejected the content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connecting to the upstream failed.
    #[error("network connection problem, please check your connection and try again")]
    NetworkError,

    /// An attempt exceeded its deadline.
    #[error("request timed out, the server might be busy, please try again")]
    Timeout,

    /// The upstream rejected the request on authorization grounds.
    #[error("authentication failed, please refresh the page and try again")]
    AuthFailure,

    /// The upstream signalled throttling.
    #[error("too many requests, please wait a moment and try again")]
    RateLimited,

    /// The upstream failed and the retry budget is spent.
    #[error("the assistant service is experiencing issues, please try again in a few minutes")]
    UpstreamServerError,

    /// The upstream answered 200 but the payload did not have the expected shape.
    #[error("the assistant returned an unexpected response")]
    MalformedResponse,
}

impl RelayError {
    /// Stable machine-readable name of the error category.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidRequest(_) => "invalid_request",
            RelayError::NetworkError => "network_error",
            RelayError::Timeout => "timeout",
            RelayError::AuthFailure => "auth_failure",
            RelayError::RateLimited => "rate_limited",
            RelayError::UpstreamServerError => "upstream_server_error",
            RelayError::MalformedResponse => "malformed_response",
        }
    }
}

/// Low-level failure of a single upstream attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The attempt hit its deadline.
    #[error("upstream timed out")]
    Timeout,

    /// Non-2xx response; `message` is the best-effort error text from the body.
    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The upstream refused to answer for content-policy reasons.
    #[error("content rejected by upstream policy: {0}")]
    ContentRejected(String),

    /// 2xx response whose body failed shape validation.
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_decode() {
            UpstreamError::Malformed(e.to_string())
        } else {
            UpstreamError::Network(e.to_string())
        }
    }
}

/// Failure to produce authentication headers.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("auth provider unavailable: {0}")]
    Unavailable(String),

    #[error("token is not a valid header value for {header}")]
    InvalidHeader { header: &'static str },
}

/// Failure to persist a chat log entry.  Never shown to callers.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("chat log write failed: {0}")]
    Write(String),
}
