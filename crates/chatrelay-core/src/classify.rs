//! Maps a low-level [`UpstreamError`] onto the caller-facing taxonomy and
//! decides whether the next attempt strategy may run.

use crate::error::{RelayError, UpstreamError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Classified {
    pub error: RelayError,
    /// `false` stops the attempt loop immediately.
    pub retryable: bool,
}

impl Classified {
    fn retry(error: RelayError) -> Self {
        Self { error, retryable: true }
    }

    fn stop(error: RelayError) -> Self {
        Self { error, retryable: false }
    }
}

const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "too many requests", "resource_exhausted"];
const API_KEY_PATTERNS: &[&str] = &["invalid api key", "api key not valid", "api_key_invalid"];
const AUTH_PATTERNS: &[&str] = &["unauthorized", "unauthenticated", "forbidden", "permission_denied"];
const POLICY_PATTERNS: &[&str] = &["content policy", "safety"];
const INVALID_PATTERNS: &[&str] = &["invalid request", "bad request", "invalid_argument"];
const NOT_FOUND_PATTERNS: &[&str] = &["not found", "not_found"];

fn mentions(message: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| message.contains(p))
}

pub(crate) fn classify(err: &UpstreamError) -> Classified {
    match err {
        UpstreamError::Network(_) => Classified::retry(RelayError::NetworkError),
        UpstreamError::Timeout => Classified::retry(RelayError::Timeout),
        UpstreamError::Malformed(_) => Classified::retry(RelayError::MalformedResponse),
        UpstreamError::ContentRejected(_) => Classified::stop(content_rejected()),
        UpstreamError::Status { status, message } => classify_status(*status, &message.to_lowercase()),
    }
}

fn classify_status(status: u16, message: &str) -> Classified {
    if status == 429 || mentions(message, RATE_LIMIT_PATTERNS) {
        return Classified::retry(RelayError::RateLimited);
    }
    // A bad server-side key is not fixed by dropping the caller's credentials.
    if mentions(message, API_KEY_PATTERNS) {
        return Classified::stop(RelayError::AuthFailure);
    }
    // Auth rejection moves on to the next strategy, which may drop auth.
    if status == 401 || status == 403 || mentions(message, AUTH_PATTERNS) {
        return Classified::retry(RelayError::AuthFailure);
    }
    if mentions(message, POLICY_PATTERNS) {
        return Classified::stop(content_rejected());
    }
    if status == 400 || mentions(message, INVALID_PATTERNS) {
        return Classified::stop(RelayError::InvalidRequest(
            "the assistant could not process this message".into(),
        ));
    }
    if status == 404 || mentions(message, NOT_FOUND_PATTERNS) {
        return Classified::stop(RelayError::UpstreamServerError);
    }
    Classified::retry(RelayError::UpstreamServerError)
}

fn content_rejected() -> RelayError {
    RelayError::InvalidRequest("the message was rejected by the content policy".into())
}

#[cfg(test)]
mod test {
    use super::*;

    fn status(code: u16, message: &str) -> UpstreamError {
        UpstreamError::Status {
            status: code,
            message: message.into(),
        }
    }

    #[test]
    fn transport_failures_are_retryable() {
        assert_eq!(
            classify(&UpstreamError::Network("connection refused".into())),
            Classified::retry(RelayError::NetworkError)
        );
        assert_eq!(
            classify(&UpstreamError::Timeout),
            Classified::retry(RelayError::Timeout)
        );
        assert_eq!(
            classify(&status(503, "Service Unavailable")),
            Classified::retry(RelayError::UpstreamServerError)
        );
    }

    #[test]
    fn unauthorized_moves_to_next_strategy() {
        let c = classify(&status(401, "Unauthorized"));
        assert_eq!(c.error, RelayError::AuthFailure);
        assert!(c.retryable);
        assert!(classify(&status(403, "Forbidden")).retryable);
    }

    #[test]
    fn bad_request_fails_fast() {
        let c = classify(&status(400, "Request contains an invalid argument."));
        assert!(matches!(c.error, RelayError::InvalidRequest(_)));
        assert!(!c.retryable);
    }

    #[test]
    fn invalid_api_key_fails_fast_as_auth_failure() {
        let c = classify(&status(400, "API key not valid. Please pass a valid API key."));
        assert_eq!(c, Classified::stop(RelayError::AuthFailure));
    }

    #[test]
    fn not_found_fails_fast() {
        let c = classify(&status(404, "models/unknown is not found"));
        assert_eq!(c, Classified::stop(RelayError::UpstreamServerError));
    }

    #[test]
    fn rate_limit_is_detected_from_status_or_text() {
        assert_eq!(classify(&status(429, "")).error, RelayError::RateLimited);
        assert_eq!(
            classify(&status(500, "Rate limit exceeded")).error,
            RelayError::RateLimited
        );
    }

    #[test]
    fn content_policy_fails_fast() {
        let c = classify(&UpstreamError::ContentRejected("SAFETY".into()));
        assert!(!c.retryable);
        assert!(matches!(c.error, RelayError::InvalidRequest(_)));
        assert!(!classify(&status(500, "Content policy violation")).retryable);
    }
}
