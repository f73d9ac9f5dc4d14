use std::{future::Future, net::SocketAddr};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    application::state::SharedState,
    domain::error::DomainError,
    interfaces::{activity, auth, infra, resources, schedule, terminal, webhooks, ws},
};

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/info", get(info_handler))
        .route("/auth/signup/", post(auth::signup_handler))
        .route("/auth/me/", get(auth::me_handler))
        .route(
            "/chat/rooms/",
            get(ws::list_rooms_handler).post(ws::create_room_handler),
        )
        .route("/chat/rooms/{room_id}/", delete(ws::delete_room_handler))
        .route("/chat/rooms/{room_id}/messages/", get(ws::list_messages_handler))
        .route("/ws/chat/{room_id}/", get(ws::chat_ws_handler))
        .route("/ws/docs/{doc_id}/", get(ws::docs_ws_handler))
        .route(
            "/ws/workspace/{workspace_id}/terminal/",
            get(terminal::terminal_ws_handler),
        )
        .route(
            "/webhooks/subscriptions/",
            get(webhooks::list_subscriptions_handler).post(webhooks::create_subscription_handler),
        )
        .route(
            "/webhooks/subscriptions/{subscription_id}/",
            delete(webhooks::delete_subscription_handler),
        )
        .route("/webhooks/events/", get(webhooks::list_events_handler))
        .route("/webhooks/events/trigger/", post(webhooks::trigger_handler))
        .route(
            "/schedule/",
            get(schedule::list_handler).post(schedule::create_handler),
        )
        .route(
            "/schedule/{item_id}/",
            get(schedule::get_handler)
                .patch(schedule::update_handler)
                .delete(schedule::delete_handler),
        )
        .route(
            "/schedule/{item_id}/mark_reminder_sent/",
            post(schedule::mark_reminder_sent_handler),
        )
        .route("/activity/logs/", get(activity::list_handler).post(activity::create_handler))
        .route("/resources/", get(resources::list_handler))
        .route("/resources/sync/", post(resources::sync_handler))
        .route("/resources/{resource_id}/action/", post(resources::action_handler))
        .route("/infra/load-balancers/", post(infra::provision_load_balancer_handler))
        .route(
            "/infra/load-balancers/{external_id}/",
            delete(infra::delete_load_balancer_handler),
        )
        .route(
            "/infra/load-balancers/metrics/",
            get(infra::load_balancer_metrics_handler),
        )
        .route("/infra/cdn/", post(infra::provision_cdn_handler))
        .route("/infra/cdn/{distribution_id}/", delete(infra::delete_cdn_handler))
        .route("/infra/cdn/metrics/", get(infra::cdn_metrics_handler))
        .route("/infra/compute/", post(infra::provision_compute_handler))
        .route("/infra/compute/{external_id}/", delete(infra::delete_compute_handler))
        .route("/infra/compute/metrics/", get(infra::compute_metrics_handler))
        .with_state(state)
}

pub async fn serve(
    listener: TcpListener,
    state: SharedState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DomainError> {
    let local_addr = listener.local_addr().map_err(|error| {
        DomainError::Upstream(format!("failed to read listener address: {error}"))
    })?;

    info!(
        "atrium-core listening on http://{}:{}",
        local_addr.ip(),
        local_addr.port(),
    );

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|error| DomainError::Upstream(format!("server runtime error: {error}")))
}

async fn healthz_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match state.health_payload().await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "ok": false,
                "error": error.to_string(),
            })),
        )
            .into_response(),
    }
}

async fn readyz_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let payload = state.ready_payload().await;
    (StatusCode::OK, Json(payload))
}

async fn info_handler(State(state): State<SharedState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.info_payload()))
}
