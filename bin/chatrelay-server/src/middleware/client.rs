//! Identity used to key the per-client rate limiter.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Header a front end may set to identify its user.
pub static X_CLIENT_ID: &str = "x-client-id";

/// The `x-client-id` header when present, otherwise the peer IP address.
///
/// Routers served without connect info (as in tests) fall back to a shared
/// `"unknown"` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(X_CLIENT_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| format!("client:{v}"));

        let key = from_header
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
            })
            .unwrap_or_else(|| "unknown".to_owned());

        Ok(ClientKey(key))
    }
}
