use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    application::state::SharedState,
    domain::{
        error::DomainError,
        models::{Principal, ScheduleItem, ScheduleStatus},
    },
    interfaces::actor_from_headers,
    protocol::ApiError,
    security::auth::require_principal,
};

#[derive(Debug, Deserialize)]
pub struct CreateItemBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
    #[serde(default)]
    pub reminder_at: Option<DateTime<Utc>>,
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, with = "double_option")]
    pub end: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
    #[serde(default, with = "double_option")]
    pub reminder_at: Option<Option<DateTime<Utc>>>,
}

/// Distinguishes an absent field from an explicit null so PATCH can clear
/// `end` and `reminder_at`.
mod double_option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<DateTime<Utc>>::deserialize(deserializer).map(Some)
    }
}

pub async fn create_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<CreateItemBody>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    if body.title.trim().is_empty() {
        return Err(DomainError::BadRequest("title must not be empty".to_owned()).into());
    }
    if let Some(end) = body.end
        && end < body.start
    {
        return Err(DomainError::BadRequest("end must not precede start".to_owned()).into());
    }

    let now = Utc::now();
    let item = ScheduleItem {
        id: format!("sched-{}", uuid::Uuid::new_v4()),
        owner_id: principal.id.clone(),
        title: body.title.trim().to_owned(),
        description: body.description,
        start: body.start,
        end: body.end,
        all_day: body.all_day,
        timezone: body.timezone,
        status: body.status.unwrap_or(ScheduleStatus::Pending),
        reminder_at: body.reminder_at,
        reminder_sent: false,
        created_at: now,
        updated_at: now,
    };
    state.store().insert_schedule_item(&item).await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Non-admin principals see only their own items; admins see all.
pub async fn list_handler(
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
    let items = state.store().list_schedule_items(owner).await?;
    Ok(Json(items))
}

pub async fn get_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;

    let item = load_item(&state, &item_id).await?;
    Ok(Json(item))
}

pub async fn update_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
    Json(body): Json<UpdateItemBody>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    let mut item = load_item(&state, &item_id).await?;
    require_owner(&item, principal)?;

    if let Some(title) = body.title {
        if title.trim().is_empty() {
            return Err(DomainError::BadRequest("title must not be empty".to_owned()).into());
        }
        item.title = title.trim().to_owned();
    }
    if let Some(description) = body.description {
        item.description = description;
    }
    if let Some(start) = body.start {
        item.start = start;
    }
    if let Some(end) = body.end {
        item.end = end;
    }
    if let Some(all_day) = body.all_day {
        item.all_day = all_day;
    }
    if let Some(timezone) = body.timezone {
        item.timezone = timezone;
    }
    if let Some(status) = body.status {
        item.status = status;
    }
    if let Some(reminder_at) = body.reminder_at {
        item.reminder_at = reminder_at;
    }

    if let Some(end) = item.end
        && end < item.start
    {
        return Err(DomainError::BadRequest("end must not precede start".to_owned()).into());
    }

    item.updated_at = Utc::now();
    state.store().update_schedule_item(&item).await?;
    Ok(Json(item))
}

pub async fn delete_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    let item = load_item(&state, &item_id).await?;
    require_owner(&item, principal)?;

    state.store().remove_schedule_item(&item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Idempotent: flipping an already-sent reminder reports success without a
/// second transition.
pub async fn mark_reminder_sent_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    let item = load_item(&state, &item_id).await?;
    require_owner(&item, principal)?;

    let flipped = state.store().mark_reminder_sent(&item_id, Utc::now()).await?;
    Ok(Json(json!({
        "id": item_id,
        "reminder_sent": true,
        "changed": flipped,
    })))
}

async fn load_item(state: &SharedState, item_id: &str) -> Result<ScheduleItem, DomainError> {
    state
        .store()
        .get_schedule_item(item_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("schedule item not found: {item_id}")))
}

fn require_owner(item: &ScheduleItem, principal: &Principal) -> Result<(), DomainError> {
    if item.owner_id == principal.id || principal.is_admin {
        Ok(())
    } else {
        Err(DomainError::Forbidden(
            "only the owner may modify a schedule item".to_owned(),
        ))
    }
}
