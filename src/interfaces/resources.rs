use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    application::state::SharedState,
    domain::{
        error::DomainError,
        models::{Environment, ResourceAttrs, ResourceStatus, is_known_resource_type},
    },
    interfaces::actor_from_headers,
    protocol::ApiError,
    security::auth::require_principal,
    storage::{ResourceFilter, ResourceIdentity},
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

pub async fn list_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;

    let filter = ResourceFilter {
        environment: query.environment,
        resource_type: query.resource_type,
        status: query.status,
        search: query.search,
    };
    let resources = state.store().list_platform_resources(&filter).await?;
    Ok(Json(resources))
}

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    #[serde(default)]
    pub resources: Vec<SyncRow>,
}

#[derive(Debug, Deserialize)]
pub struct SyncRow {
    pub resource_type: String,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub attrs: ResourceAttrs,
}

/// Upsert explicit rows, or — with an empty body — refresh provider-backed
/// entries so a fresh install has a populated control center.
pub async fn sync_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<SyncBody>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;

    let started = std::time::Instant::now();
    let mut synced = 0_usize;
    let mut errors = 0_usize;

    if body.resources.is_empty() {
        synced = seed_provider_resources(&state).await?;
    } else {
        for row in body.resources {
            match sync_row(&state, row).await {
                Ok(()) => synced += 1,
                Err(error) => {
                    tracing::warn!("resource sync row failed: {error}");
                    errors += 1;
                }
            }
        }
    }

    Ok(Json(json!({
        "synced": synced,
        "errors": errors,
        "duration_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "message": "Resources synced successfully.",
    })))
}

async fn sync_row(state: &SharedState, row: SyncRow) -> Result<(), DomainError> {
    if !is_known_resource_type(&row.resource_type) {
        return Err(DomainError::BadRequest(format!(
            "unknown resource_type: {}",
            row.resource_type
        )));
    }

    let mut attrs = row.attrs;
    let identity = if row.external_id.is_empty() {
        let Some(name) = row.name.clone().filter(|name| !name.is_empty()) else {
            return Err(DomainError::BadRequest(
                "resource without external_id requires a name".to_owned(),
            ));
        };
        ResourceIdentity::Named {
            resource_type: row.resource_type,
            name,
            environment: attrs.environment.unwrap_or(Environment::Unknown),
            owner_id: attrs.owner_id.clone(),
        }
    } else {
        attrs.name = row.name.or(attrs.name);
        ResourceIdentity::External {
            resource_type: row.resource_type,
            external_id: row.external_id,
        }
    };

    state
        .store()
        .sync_platform_resource(identity, attrs, Utc::now())
        .await?;
    Ok(())
}

/// Catalog entries derived from the provider facade. Health scores come off
/// the synthetic metrics so repeated seeds are stable.
async fn seed_provider_resources(state: &SharedState) -> Result<usize, ApiError> {
    let seeds: [(&str, &str, &str); 3] = [
        ("load_balancer", "edge-router", "Networking"),
        ("cdn_distribution", "static-assets", "Networking"),
        ("compute_instance", "batch-worker", "Compute"),
    ];

    let mut synced = 0_usize;
    for (resource_type, name, subsystem) in seeds {
        let metrics = match resource_type {
            "load_balancer" => state.providers().load_balancer_metrics(name),
            "cdn_distribution" => state.providers().cdn_distribution_metrics(name),
            _ => state.providers().compute_instance_metrics(name),
        };
        let health_score = health_from_metrics(&metrics);

        state
            .store()
            .sync_platform_resource(
                ResourceIdentity::Named {
                    resource_type: resource_type.to_owned(),
                    name: name.to_owned(),
                    environment: Environment::Prod,
                    owner_id: None,
                },
                ResourceAttrs {
                    subsystem: Some(subsystem.to_owned()),
                    status: Some(ResourceStatus::Running),
                    health_score: Some(health_score),
                    metadata: Some(metrics),
                    ..ResourceAttrs::default()
                },
                Utc::now(),
            )
            .await?;
        synced += 1;
    }

    Ok(synced)
}

fn health_from_metrics(metrics: &Value) -> i64 {
    let error_rate = metrics
        .get("error_rate_percent")
        .or_else(|| metrics.get("5xx_rate_percent"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    (100.0 - error_rate * 10.0).clamp(0.0, 100.0) as i64
}

#[derive(Debug, Deserialize)]
pub struct ActionBody {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

/// Contextual action on a single resource. Unknown actions are rejected;
/// actions incompatible with the current status are a conflict. Transitions
/// are optimistic so the control center stays responsive.
pub async fn action_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(resource_id): Path<String>,
    Json(body): Json<ActionBody>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;

    let Some(resource) = state.store().get_platform_resource(&resource_id).await? else {
        return Err(DomainError::NotFound(format!("resource not found: {resource_id}")).into());
    };

    let Some(allowed_from) = allowed_statuses(&body.action) else {
        return Err(DomainError::BadRequest(format!("unknown action '{}'", body.action)).into());
    };
    if !allowed_from.contains(&resource.status) {
        return Err(DomainError::Conflict(format!(
            "action '{}' is not valid for status '{}'",
            body.action,
            resource.status.as_str()
        ))
        .into());
    }

    let status = transition_for(&body.action).unwrap_or(resource.status);
    if status != resource.status {
        state
            .store()
            .update_resource_status(&resource_id, status, Utc::now())
            .await?;
    }

    Ok(Json(json!({
        "ok": true,
        "message": format!("Action '{}' on '{}' was queued successfully.", body.action, resource.name),
        "status": status,
    })))
}

fn allowed_statuses(action: &str) -> Option<&'static [ResourceStatus]> {
    use ResourceStatus::{Degraded, Failed, Pending, Running, Stopped};

    Some(match action {
        "restart" => &[Running, Failed, Degraded, Stopped],
        "stop" => &[Running, Degraded],
        "start" => &[Stopped, Pending],
        "rerun" => &[Failed],
        "scale" => &[Running, Degraded],
        "lock" | "unlock" | "pause" => &[Running],
        "resume" => &[Stopped, Pending],
        _ => return None,
    })
}

fn transition_for(action: &str) -> Option<ResourceStatus> {
    match action {
        "restart" | "start" | "rerun" | "resume" => Some(ResourceStatus::Pending),
        "stop" | "pause" => Some(ResourceStatus::Stopped),
        _ => None,
    }
}
