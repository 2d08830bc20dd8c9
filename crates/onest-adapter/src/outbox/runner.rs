use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tracing::{debug, error, info, warn};

use super::policy::RetryPolicy;
use super::task::{ProtocolTask, TaskPhase, TaskRecord};
use super::{OutboxError, TaskOutbox};
use crate::clock::Clock;
use crate::dispatch::{Callback, CallbackDispatcher, DeliveryOutcome};

/// Runs the Phase-2 mutation for a task and builds its callback.
pub trait TaskProcessor: Send + Sync {
    fn process(&self, task: &ProtocolTask) -> Result<Callback, ProcessingError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    /// Retrying cannot help (no vacancy, unknown order, invalid transition).
    #[error("rejected: {0}")]
    Rejected(String),
    /// A store was unavailable; the task may succeed later.
    #[error("transient failure: {0}")]
    Transient(String),
}

/// Claims due tasks and drives them through processing and delivery.
pub struct TaskRunner {
    outbox: Arc<dyn TaskOutbox>,
    processor: Arc<dyn TaskProcessor>,
    dispatcher: Arc<dyn CallbackDispatcher>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl TaskRunner {
    pub fn new(
        outbox: Arc<dyn TaskOutbox>,
        processor: Arc<dyn TaskProcessor>,
        dispatcher: Arc<dyn CallbackDispatcher>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            outbox,
            processor,
            dispatcher,
            policy,
            clock,
        }
    }

    /// Run one due task. Returns `false` when nothing was due.
    pub async fn run_next(&self) -> Result<bool, OutboxError> {
        let Some(record) = self.outbox.claim_due(self.clock.now())? else {
            return Ok(false);
        };
        self.run(record).await?;
        Ok(true)
    }

    /// Keep running until no task is due, returning how many were run.
    pub async fn run_until_idle(&self) -> Result<usize, OutboxError> {
        let mut ran = 0;
        while self.run_next().await? {
            ran += 1;
        }
        Ok(ran)
    }

    async fn run(&self, record: TaskRecord) -> Result<(), OutboxError> {
        let kind = record.task.kind();
        let transaction_id = record.task.context().transaction_id.clone();

        let callback = match &record.phase {
            TaskPhase::Deliver(callback) => callback.clone(),
            TaskPhase::Process => match self.processor.process(&record.task) {
                Ok(callback) => {
                    self.outbox
                        .stage_callback(&record.id, callback.clone(), self.clock.now())?;
                    callback
                }
                Err(ProcessingError::Rejected(reason)) => {
                    warn!(
                        task_id = %record.id,
                        action = %kind,
                        %transaction_id,
                        %reason,
                        "task rejected"
                    );
                    return self
                        .outbox
                        .dead_letter(&record.id, reason, self.clock.now());
                }
                Err(ProcessingError::Transient(reason)) => {
                    return self.retry_or_bury(&record, reason);
                }
            },
        };

        match self.dispatcher.deliver(&callback).await {
            Ok(DeliveryOutcome::Acknowledged) => {
                debug!(
                    task_id = %record.id,
                    callback = kind.callback(),
                    %transaction_id,
                    "callback acknowledged"
                );
            }
            Ok(DeliveryOutcome::Rejected(nack)) => {
                warn!(
                    task_id = %record.id,
                    callback = kind.callback(),
                    %transaction_id,
                    code = %nack.code,
                    message = %nack.message,
                    "counterparty rejected callback"
                );
            }
            Err(err) => return self.retry_or_bury(&record, err.to_string()),
        }

        self.outbox.complete(&record.id, self.clock.now())
    }

    fn retry_or_bury(&self, record: &TaskRecord, reason: String) -> Result<(), OutboxError> {
        let kind = record.task.kind();
        if self.policy.exhausted(record.attempts) {
            error!(
                task_id = %record.id,
                action = %kind,
                attempts = record.attempts,
                %reason,
                "task dead-lettered"
            );
            return self
                .outbox
                .dead_letter(&record.id, reason, self.clock.now());
        }

        let delay = self.policy.delay_after(record.attempts);
        let next_attempt_at = self.clock.now()
            + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(1));
        info!(
            task_id = %record.id,
            action = %kind,
            attempts = record.attempts,
            delay_ms = delay.as_millis() as u64,
            %reason,
            "task scheduled for retry"
        );
        self.outbox.reschedule(&record.id, next_attempt_at, reason)
    }
}
