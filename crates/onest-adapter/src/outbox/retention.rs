use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::TaskOutbox;
use crate::clock::Clock;

/// Every `every`, drop completed tasks older than `retention` until `shutdown` flips.
pub fn spawn_retention_sweeper(
    outbox: Arc<dyn TaskOutbox>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let retention =
        ChronoDuration::from_std(retention).unwrap_or_else(|_| ChronoDuration::hours(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match outbox.purge_completed(clock.now() - retention) {
                        Ok(0) => {}
                        Ok(purged) => debug!(purged, "completed tasks purged"),
                        Err(err) => warn!(error = %err, "completed task purge failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
