//! Transaction-scoped snapshots bridging `init` and `confirm`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::applications::ApplicantSnapshot;

/// Applicant state captured by `init`, keyed by transaction id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedApplication {
    pub transaction_id: String,
    pub offering_id: String,
    pub applicant: ApplicantSnapshot,
    pub staged_at: DateTime<Utc>,
}

impl StagedApplication {
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now >= self.staged_at + ttl
    }
}

/// Stage storage. Implementations enforce the TTL themselves: an expired entry is never
/// returned even if it has not been purged yet.
pub trait StageStore: Send + Sync {
    /// Insert or overwrite the snapshot for its transaction.
    fn put(&self, staged: StagedApplication) -> Result<(), StageError>;
    fn get(&self, transaction_id: &str) -> Result<Option<StagedApplication>, StageError>;
    /// Delete and return the snapshot in one step; a second caller sees `None`.
    fn take(&self, transaction_id: &str) -> Result<Option<StagedApplication>, StageError>;
    fn delete(&self, transaction_id: &str) -> Result<bool, StageError>;
    /// Drop every expired entry, returning how many were removed.
    fn purge_expired(&self) -> Result<usize, StageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("stage store unavailable: {0}")]
    Unavailable(String),
}

/// Periodically purge expired stages until `shutdown` flips to true.
pub fn spawn_sweeper(
    store: Arc<dyn StageStore>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.purge_expired() {
                        Ok(0) => {}
                        Ok(purged) => debug!(purged, "expired stages purged"),
                        Err(err) => warn!(error = %err, "stage purge failed"),
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
