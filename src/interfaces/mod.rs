pub mod activity;
pub mod auth;
pub mod http;
pub mod infra;
pub mod resources;
pub mod schedule;
pub(crate) mod terminal;
pub mod webhooks;
pub(crate) mod ws;

use axum::http::HeaderMap;

use crate::{application::state::SharedState, domain::models::Actor, security::auth as security_auth};

pub(crate) async fn actor_from_headers(state: &SharedState, headers: &HeaderMap) -> Actor {
    let token = security_auth::bearer_token(headers);
    state.resolve_actor(token.as_deref()).await
}

/// Client address as the original platform recorded it: the first
/// `X-Forwarded-For` hop when present, else the peer address.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<std::net::SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    forwarded
        .map(str::to_owned)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
