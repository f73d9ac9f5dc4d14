use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{application::state::SharedState, domain::error::DomainError};

/// Periodic reminder sweep. Runs until the token is cancelled; a failing
/// sweep is logged and retried on the next tick.
pub async fn run_sweeper(state: SharedState, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(state.config().sweep_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(error) = sweep_once(&state).await {
                    error!("reminder sweep failed: {error}");
                }
            }
        }
    }
}

/// One pass over due reminders. The `reminder_sent` flip is a compare-and-set
/// and the sink fires only for the sweep that won it, so overlapping sweeps
/// emit at most one notification per item.
pub async fn sweep_once(state: &SharedState) -> Result<usize, DomainError> {
    let now = Utc::now();
    let due = state.store().list_due_reminders(now).await?;

    let mut fired = 0_usize;
    for item in due {
        match state.store().mark_reminder_sent(&item.id, now).await {
            Ok(true) => {
                state.notification_sink().notify(&item);
                fired += 1;
            }
            Ok(false) => {}
            Err(error) => {
                warn!("reminder flip failed item={}: {error}", item.id);
            }
        }
    }

    state.record_sweep(now).await;
    Ok(fired)
}
