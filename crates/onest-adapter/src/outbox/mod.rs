//! Durable record of accepted actions and the workers that execute them.
//!
//! Phase 1 enqueues a [`ProtocolTask`] before acknowledging. A [`TaskRunner`] claims due
//! tasks, runs the Phase-2 mutation through a [`TaskProcessor`], commits the resulting
//! callback into the record, and then delivers it. Transient failures are retried with
//! backoff; rejected tasks and tasks out of attempts are dead-lettered.

mod policy;
mod retention;
mod runner;
mod task;
mod worker;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};

use crate::dispatch::Callback;

pub use policy::RetryPolicy;
pub use retention::spawn_retention_sweeper;
pub use runner::{ProcessingError, TaskProcessor, TaskRunner};
pub use task::{ProtocolTask, TaskId, TaskPhase, TaskRecord, TaskStatus};
pub use worker::WorkerPool;

/// Task storage. Every method is a single atomic step against the backing store.
pub trait TaskOutbox: Send + Sync {
    fn enqueue(&self, task: ProtocolTask, at: DateTime<Utc>) -> Result<TaskId, OutboxError>;
    /// Mark the oldest due task in flight, bump its attempt count, and return it.
    fn claim_due(&self, now: DateTime<Utc>) -> Result<Option<TaskRecord>, OutboxError>;
    /// Persist the callback produced by a committed Phase-2 mutation.
    fn stage_callback(
        &self,
        id: &TaskId,
        callback: Callback,
        at: DateTime<Utc>,
    ) -> Result<(), OutboxError>;
    fn complete(&self, id: &TaskId, at: DateTime<Utc>) -> Result<(), OutboxError>;
    fn reschedule(
        &self,
        id: &TaskId,
        next_attempt_at: DateTime<Utc>,
        error: String,
    ) -> Result<(), OutboxError>;
    fn dead_letter(&self, id: &TaskId, reason: String, at: DateTime<Utc>)
        -> Result<(), OutboxError>;
    fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, OutboxError>;
    fn dead_letters(&self) -> Result<Vec<TaskRecord>, OutboxError>;
    /// Requeue tasks left in flight by a previous process, returning how many moved.
    fn recover_in_flight(&self, at: DateTime<Utc>) -> Result<usize, OutboxError>;
    /// Drop completed tasks last touched before `before`. Dead letters are kept.
    fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize, OutboxError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutboxError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("outbox unavailable: {0}")]
    Unavailable(String),
}
