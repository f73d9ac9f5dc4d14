use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    application::state::SharedState,
    domain::{error::DomainError, models::WebhookSubscription},
    interfaces::actor_from_headers,
    protocol::ApiError,
    security::{auth::require_principal, secrets::SecretRef},
};

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionBody {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub secret_ref: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

pub async fn create_subscription_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<CreateSubscriptionBody>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    if state.config().webhook_require_https && !body.url.starts_with("https://") {
        return Err(
            DomainError::BadRequest("subscription url must use the https scheme".to_owned()).into(),
        );
    }
    // The reference grammar never fails outright (unknown shapes are
    // literals), but an env reference with an empty name is always a mistake.
    if let SecretRef::Env(name) = SecretRef::parse(&body.secret_ref)
        && name.trim().is_empty()
    {
        return Err(DomainError::BadRequest("secret_ref names an empty variable".to_owned()).into());
    }

    let subscription = WebhookSubscription {
        id: format!("sub-{}", uuid::Uuid::new_v4()),
        owner_id: principal.id.clone(),
        name: body.name.trim().to_owned(),
        url: body.url,
        active: body.active,
        secret_ref: body.secret_ref,
        created_at: Utc::now(),
    };
    state.store().insert_webhook_subscription(&subscription).await?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn list_subscriptions_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    let owner = if principal.is_admin {
        None
    } else {
        Some(principal.id.as_str())
    };
    let subscriptions = state.store().list_webhook_subscriptions(owner).await?;
    Ok(Json(subscriptions))
}

pub async fn delete_subscription_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(subscription_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    let Some(subscription) = state.store().get_webhook_subscription(&subscription_id).await? else {
        return Err(
            DomainError::NotFound(format!("subscription not found: {subscription_id}")).into(),
        );
    };
    if subscription.owner_id != principal.id && !principal.is_admin {
        return Err(
            DomainError::Forbidden("only the owner may delete a subscription".to_owned()).into(),
        );
    }

    state.store().remove_webhook_subscription(&subscription_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list_events_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;

    let events = state
        .store()
        .list_webhook_events(query.subscription_id.as_deref(), query.limit.or(Some(100)))
        .await?;
    Ok(Json(events))
}

#[derive(Debug, Deserialize)]
pub struct TriggerBody {
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

/// Fan an event out to every active subscription and report the
/// per-subscription outcomes. Failed endpoints are reflected in the result
/// list, never as an HTTP error.
pub async fn trigger_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<TriggerBody>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;

    if body.event_type.trim().is_empty() {
        return Err(DomainError::BadRequest("event_type must not be empty".to_owned()).into());
    }

    let sent = state
        .dispatcher()
        .trigger(state.store(), body.event_type.trim(), &body.payload)
        .await;

    Ok(Json(json!({ "sent": sent })))
}
