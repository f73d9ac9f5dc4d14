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
    domain::{
        error::DomainError,
        models::{Environment, ResourceAttrs, ResourceStatus},
    },
    interfaces::actor_from_headers,
    protocol::ApiError,
    providers::{CdnSpec, ComputeSpec, LoadBalancerSpec},
    security::auth::require_principal,
    storage::ResourceIdentity,
};

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub name: String,
}

/// Request-time provisioning goes through the facade and lands in the
/// catalog, so the control center reflects what was just created.
pub async fn provision_load_balancer_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(spec): Json<LoadBalancerSpec>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    if spec.name.trim().is_empty() {
        return Err(DomainError::BadRequest("name must not be empty".to_owned()).into());
    }

    let result = state.providers().provision_load_balancer(&spec).await;
    let external_id = result
        .openstack_id
        .clone()
        .unwrap_or_else(|| result.dns_name.clone());

    catalog_upsert(
        &state,
        "load_balancer",
        &external_id,
        &spec.name,
        "Networking",
        Some(principal.id.clone()),
        json!({
            "provider": result.provider,
            "dns_name": result.dns_name,
            "vip_address": result.vip_address,
        }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn delete_load_balancer_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(external_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;

    let result = state
        .providers()
        .delete_load_balancer(Some(external_id.as_str()))
        .await;
    Ok(Json(result))
}

pub async fn load_balancer_metrics_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;
    Ok(Json(state.providers().load_balancer_metrics(&query.name)))
}

pub async fn provision_cdn_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(spec): Json<CdnSpec>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    if spec.name.trim().is_empty() || spec.origin_domain.trim().is_empty() {
        return Err(
            DomainError::BadRequest("name and origin_domain must not be empty".to_owned()).into(),
        );
    }

    let result = state.providers().provision_cdn_distribution(&spec).await;

    catalog_upsert(
        &state,
        "cdn_distribution",
        &result.distribution_id,
        &spec.name,
        "Networking",
        Some(principal.id.clone()),
        json!({
            "provider": result.provider,
            "edge_domain": result.edge_domain,
            "origin": result.origin,
            "active_custom_domains": result.active_custom_domains,
        }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn delete_cdn_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(distribution_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;

    let result = state.providers().delete_cdn_distribution(&distribution_id);
    Ok(Json(result))
}

pub async fn cdn_metrics_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;
    Ok(Json(state.providers().cdn_distribution_metrics(&query.name)))
}

pub async fn provision_compute_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(spec): Json<ComputeSpec>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let principal = require_principal(&actor)?;

    if spec.name.trim().is_empty() {
        return Err(DomainError::BadRequest("name must not be empty".to_owned()).into());
    }

    let result = state.providers().provision_compute_instance(&spec).await;

    catalog_upsert(
        &state,
        "compute_instance",
        &result.instance_id,
        &spec.name,
        "Compute",
        Some(principal.id.clone()),
        json!({
            "provider": result.provider,
            "hostname": result.hostname,
            "flavor": result.flavor,
            "openstack_id": result.openstack_id,
        }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn delete_compute_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(external_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;

    let result = state
        .providers()
        .delete_compute_instance(Some(external_id.as_str()))
        .await;
    Ok(Json(result))
}

pub async fn compute_metrics_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&state, &headers).await;
    let _ = require_principal(&actor)?;
    Ok(Json(state.providers().compute_instance_metrics(&query.name)))
}

async fn catalog_upsert(
    state: &SharedState,
    resource_type: &str,
    external_id: &str,
    name: &str,
    subsystem: &str,
    owner_id: Option<String>,
    metadata: Value,
) -> Result<(), DomainError> {
    state
        .store()
        .sync_platform_resource(
            ResourceIdentity::External {
                resource_type: resource_type.to_owned(),
                external_id: external_id.to_owned(),
            },
            ResourceAttrs {
                name: Some(name.to_owned()),
                subsystem: Some(subsystem.to_owned()),
                environment: Some(Environment::Prod),
                status: Some(ResourceStatus::Running),
                health_score: Some(100),
                metadata: Some(metadata),
                owner_id,
            },
            Utc::now(),
        )
        .await?;
    Ok(())
}
