use std::future::Future;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    application::{
        config::{Args, RuntimeConfig},
        state::SharedState,
    },
    domain::error::DomainError,
    interfaces::http,
    scheduler,
};

pub async fn run(args: Args) -> Result<(), DomainError> {
    let config = RuntimeConfig::from_args(args)
        .map_err(|error| DomainError::BadRequest(format!("configuration error: {error}")))?;

    init_logging(&config.log_filter, config.json_logs)?;
    let listener = TcpListener::bind(config.bind_addr())
        .await
        .map_err(|error| DomainError::Upstream(format!("failed to bind listener: {error}")))?;

    let signal = shutdown_signal();
    run_with_listener(listener, config, signal).await
}

pub async fn run_with_listener(
    listener: TcpListener,
    config: RuntimeConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DomainError> {
    info!(
        "starting atrium-core host={} port={} sweep_enabled={}",
        config.host, config.port, config.sweep_enabled
    );

    let state = SharedState::new(config).await?;
    run_with_state(listener, state, shutdown).await
}

pub async fn run_with_state(
    listener: TcpListener,
    state: SharedState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DomainError> {
    let sweeper_token = CancellationToken::new();
    let sweeper_task = spawn_reminder_sweeper(state.clone(), sweeper_token.clone());

    let serve_result = http::serve(listener, state, shutdown).await;

    sweeper_token.cancel();
    if let Some(task) = sweeper_task {
        let _ = task.await;
    }

    serve_result
}

fn init_logging(filter: &str, json_logs: bool) -> Result<(), DomainError> {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(env_filter).with_target(false);

    if json_logs {
        builder.json().try_init().map_err(|error| {
            DomainError::Internal(format!("failed to initialize logger: {error}"))
        })?;
    } else {
        builder.compact().try_init().map_err(|error| {
            DomainError::Internal(format!("failed to initialize logger: {error}"))
        })?;
    }

    Ok(())
}

fn spawn_reminder_sweeper(
    state: SharedState,
    shutdown: CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
    if !state.config().sweep_enabled {
        info!("reminder sweeper disabled by runtime config");
        return None;
    }

    Some(tokio::spawn(scheduler::run_sweeper(state, shutdown)))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
