//! Background reaper for expired sessions.
//!
//! Periodically drops sessions that are not ACTIVE and are older than the
//! configured retention period.
//!
//! # Graceful Shutdown
//!
//! The task watches a cancellation token. Each sweep runs to completion under
//! the store lock, so cancelling between ticks never leaves a partial sweep
//! behind; whatever was missed is picked up on the next run.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::coordinator::SessionCoordinator;

/// Spawn the reaper on its own task using the coordinator's configured period.
pub fn spawn_reaper(coordinator: SessionCoordinator, cancel_token: CancellationToken) -> JoinHandle<()> {
    let interval = coordinator.config().reap_interval();
    tokio::spawn(run_reaper(coordinator, interval, cancel_token))
}

/// Run the reaper loop until `cancel_token` is cancelled.
///
/// The first sweep runs immediately, then once every `period`.
#[instrument(skip_all, name = "rollcall.reaper")]
pub async fn run_reaper(
    coordinator: SessionCoordinator,
    period: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        period_secs = period.as_secs(),
        retention_secs = coordinator.config().retention_secs,
        "Starting session reaper"
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                coordinator.collect_expired_sessions().await;
            }
            _ = cancel_token.cancelled() => {
                info!("Session reaper received shutdown signal, exiting");
                break;
            }
        }
    }

    info!("Session reaper stopped");
}
