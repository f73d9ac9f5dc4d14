use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    application::state::SharedState,
    domain::{error::DomainError, models::ActivityLog},
    interfaces::{actor_from_headers, client_ip},
    protocol::ApiError,
};

#[derive(Debug, Deserialize)]
struct ActivityEntry {
    event_type: String,
    event_name: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Accepts a single event or an array of events. The server owns
/// `ip_address`, `user_agent`, `created_at`, and principal attribution;
/// client-supplied values for those fields are ignored.
pub async fn create_handler(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let ip_address = client_ip(&headers, Some(peer));
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let items = match body {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut created = Vec::with_capacity(items.len());
    for item in items {
        let entry = serde_json::from_value::<ActivityEntry>(item)
            .map_err(|error| DomainError::BadRequest(format!("invalid activity entry: {error}")))?;

        let log = ActivityLog {
            id: format!("act-{}", uuid::Uuid::new_v4()),
            user_id: actor.principal_id().map(str::to_owned),
            event_type: entry.event_type,
            event_name: entry.event_name,
            payload: entry.payload,
            ip_address: ip_address.clone(),
            user_agent: user_agent.clone(),
            latitude: entry.latitude,
            longitude: entry.longitude,
            created_at: Utc::now(),
        };
        state.store().insert_activity_log(&log).await?;
        created.push(log);
    }

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_handler(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.config().activity_page_size)
        .min(state.config().activity_page_size);
    let logs = state.store().list_activity_logs(Some(limit)).await?;
    Ok(Json(json!({
        "count": logs.len(),
        "results": logs,
    })))
}
