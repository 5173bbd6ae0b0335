//! Authentication context attached to with-auth attempts.
//!
//! The relay never caches an [`AuthContext`]: the [`AuthProvider`] is asked
//! for a fresh one on every with-auth attempt.

use std::fmt;

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::error::AuthError;

/// Header carrying the app-attestation token.
pub const APP_CHECK_HEADER: &str = "x-firebase-appcheck";

/// Short-lived credentials for one upstream call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub bearer_token: Option<String>,
    pub app_check_token: Option<String>,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("app_check_token", &self.app_check_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthContext {
    pub fn new(bearer_token: Option<String>, app_check_token: Option<String>) -> Self {
        Self {
            bearer_token: bearer_token.filter(|t| !t.trim().is_empty()),
            app_check_token: app_check_token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bearer_token.is_none() && self.app_check_token.is_none()
    }

    /// Pick up the credentials an inbound caller presented.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_owned());
        let app_check = headers
            .get(APP_CHECK_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|t| t.trim().to_owned());
        Self::new(bearer, app_check)
    }

    /// Fill any missing token from `fallback`.
    pub fn or(self, fallback: &AuthContext) -> Self {
        Self {
            bearer_token: self.bearer_token.or_else(|| fallback.bearer_token.clone()),
            app_check_token: self
                .app_check_token
                .or_else(|| fallback.app_check_token.clone()),
        }
    }

    pub fn to_headers(&self) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| AuthError::InvalidHeader { header: "authorization" })?;
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(token) = &self.app_check_token {
            let value = HeaderValue::from_str(token)
                .map_err(|_| AuthError::InvalidHeader { header: APP_CHECK_HEADER })?;
            headers.insert(APP_CHECK_HEADER, value);
        }
        Ok(headers)
    }
}

/// Source of credentials for with-auth attempts.
///
/// Returning an empty context (or an error) is fine: the attempt goes out
/// without auth headers and the no-auth strategy still runs.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn auth_context(&self) -> Result<AuthContext, AuthError>;
}

/// Provider for deployments without any credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl AuthProvider for NoAuth {
    async fn auth_context(&self) -> Result<AuthContext, AuthError> {
        Ok(AuthContext::default())
    }
}

/// A fixed context, e.g. tokens forwarded from the inbound request.
#[async_trait]
impl AuthProvider for AuthContext {
    async fn auth_context(&self) -> Result<AuthContext, AuthError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn headers_round_trip_through_context() {
        let ctx = AuthContext::new(Some("id-token".into()), Some("attest".into()));
        let headers = ctx.to_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer id-token");
        assert_eq!(headers[APP_CHECK_HEADER], "attest");
        assert_eq!(AuthContext::from_headers(&headers), ctx);
    }

    #[test]
    fn blank_tokens_are_dropped() {
        let ctx = AuthContext::new(Some("  ".into()), None);
        assert!(ctx.is_empty());
        assert!(ctx.to_headers().unwrap().is_empty());
    }

    #[test]
    fn or_only_fills_missing_tokens() {
        let inbound = AuthContext::new(Some("caller".into()), None);
        let configured = AuthContext::new(Some("server".into()), Some("attest".into()));
        let merged = inbound.or(&configured);
        assert_eq!(merged.bearer_token.as_deref(), Some("caller"));
        assert_eq!(merged.app_check_token.as_deref(), Some("attest"));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let ctx = AuthContext::new(Some("secret".into()), None);
        assert!(!format!("{ctx:?}").contains("secret"));
    }

    #[test]
    fn invalid_header_value_is_reported() {
        let ctx = AuthContext::new(Some("bad\ntoken".into()), None);
        assert!(matches!(
            ctx.to_headers(),
            Err(AuthError::InvalidHeader { header: "authorization" })
        ));
    }
}
