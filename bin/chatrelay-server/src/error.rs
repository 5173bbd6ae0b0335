//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a `{"error": ...}` JSON
//! body with a status code that identifies the category.
//!
//! Relay errors already carry user-safe text.  Internal errors are logged in
//! full and replaced with a generic message.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatrelay_core::RelayError;
use thiserror::Error;
use tracing::error;

use crate::schemas::relay::ErrorBody;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Mapped failure from the relay service.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// The client exceeded its per-minute quota.
    #[error("too many requests, please wait before sending another message")]
    RateLimited { retry_after: Duration },

    /// The caller sent a body that could not be decoded.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Relay(e) => relay_status(e),
            ServerError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP status for each relay error category.
pub fn relay_status(e: &RelayError) -> StatusCode {
    match e {
        RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        RelayError::AuthFailure => StatusCode::UNAUTHORIZED,
        RelayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        RelayError::MalformedResponse | RelayError::UpstreamServerError => StatusCode::BAD_GATEWAY,
        RelayError::NetworkError => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let client_message = match &self {
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                "internal server error".to_owned()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(ErrorBody { error: client_message })).into_response();
        if let ServerError::RateLimited { retry_after } = &self {
            let secs = (retry_after.as_secs_f64().ceil() as u64).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}
