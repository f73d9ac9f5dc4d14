use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    application::state::SharedState,
    domain::error::DomainError,
    interfaces::{actor_from_headers, client_ip},
    protocol::ApiError,
    security::auth::require_principal,
};

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Self-service account creation. New accounts are plain principals; the
/// admin identity only ever comes from the configured admin token.
pub async fn signup_handler(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<SignupBody>,
) -> Result<impl IntoResponse, ApiError> {
    let key = client_ip(&headers, Some(peer)).unwrap_or_else(|| "unknown".to_owned());
    let decision = state.signup_rate_limiter().try_acquire(&key).await;
    if !decision.allowed {
        return Err(DomainError::Forbidden(format!(
            "too many signup attempts; retry after {}s",
            decision.retry_after_ms.div_ceil(1_000)
        ))
        .into());
    }

    let username = body.username.trim();
    if username.is_empty() {
        return Err(DomainError::BadRequest("username must not be empty".to_owned()).into());
    }

    let (principal, token) = state
        .create_principal_with_token(username, body.email.trim())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "principal": principal,
            "token": token,
        })),
    ))
}

pub async fn me_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;
    Ok(Json(principal.clone()))
}
