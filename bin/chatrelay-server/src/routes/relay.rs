//! Relay routes.
//!
//! `POST /relay` forwards one user turn upstream.  Auth for the with-auth
//! attempt comes from the caller's `Authorization` / `X-Firebase-AppCheck`
//! headers, falling back to the tokens configured on the server.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chatrelay_core::{AuthContext, ConnectionTest, ConversationHistory, RelayRequest, RelayStatus};
use serde_json::Value;
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::ClientKey;
use crate::schemas::relay::{ErrorBody, RelayBody, RelayReply};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(relay, relay_status, relay_ping),
    components(schemas(RelayBody, RelayReply, ErrorBody))
)]
pub struct RelayApi;

/// Register relay routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/relay", post(relay))
        .route("/relay/status", get(relay_status))
        .route("/relay/ping", post(relay_ping))
}

/// Relay one chat turn (`POST /relay`).
#[utoipa::path(
    post,
    path = "/relay",
    tag = "relay",
    request_body = RelayBody,
    responses(
        (status = 200, description = "Reply generated", body = RelayReply),
        (status = 400, description = "Empty message, malformed body or history too long", body = ErrorBody),
        (status = 401, description = "Upstream rejected the credentials", body = ErrorBody),
        (status = 429, description = "Client or upstream rate limit hit", body = ErrorBody),
        (status = 502, description = "Upstream failed or answered nonsense", body = ErrorBody),
        (status = 503, description = "Upstream unreachable", body = ErrorBody),
        (status = 504, description = "Upstream timed out", body = ErrorBody),
    )
)]
pub async fn relay(
    State(state): State<Arc<AppState>>,
    client: ClientKey,
    headers: HeaderMap,
    body: Result<Json<RelayBody>, JsonRejection>,
) -> Result<Json<RelayReply>, ServerError> {
    check_quota(&state, &client)?;
    let Json(body) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let history = ConversationHistory::from_messages(body.history, state.config.history_cap)?;
    debug!(
        message_len = body.message.len(),
        history_len = history.len(),
        session_id = ?body.session_id,
        "relay request"
    );

    let mut request = RelayRequest::new(body.message, history);
    if let Some(session_id) = body.session_id {
        request = request.with_session(session_id);
    }

    let auth = AuthContext::from_headers(&headers).or(&state.default_auth);
    let response = state.relay.relay(&request, &auth).await?;
    Ok(Json(response.into()))
}

/// Describe the configured upstream and retry policy (`GET /relay/status`).
#[utoipa::path(
    get,
    path = "/relay/status",
    tag = "relay",
    responses((status = 200, description = "Relay configuration", body = Value))
)]
pub async fn relay_status(State(state): State<Arc<AppState>>) -> Json<RelayStatus> {
    Json(state.relay.status())
}

/// Relay a fixed greeting and report whether it worked (`POST /relay/ping`).
///
/// Always answers 200; the outcome is in the `success` field.
#[utoipa::path(
    post,
    path = "/relay/ping",
    tag = "relay",
    responses(
        (status = 200, description = "Connection test result", body = Value),
        (status = 429, description = "Client rate limit hit", body = ErrorBody),
    )
)]
pub async fn relay_ping(
    State(state): State<Arc<AppState>>,
    client: ClientKey,
    headers: HeaderMap,
) -> Result<Json<ConnectionTest>, ServerError> {
    check_quota(&state, &client)?;
    let auth = AuthContext::from_headers(&headers).or(&state.default_auth);
    Ok(Json(state.relay.test_connection(&auth).await))
}

fn check_quota(state: &AppState, ClientKey(key): &ClientKey) -> Result<(), ServerError> {
    match &state.limiter {
        Some(limiter) => limiter
            .try_acquire(key)
            .map_err(|retry_after| ServerError::RateLimited { retry_after }),
        None => Ok(()),
    }
}
