//! Provider-side protocol gateway.
//!
//! Each inbound action is decoded, checked synchronously, and written to the outbox as a
//! [`ProtocolTask`] before the ACK goes out. Anything that fails those checks is answered
//! with a NACK and leaves no trace. The [`ActionProcessor`] runs the deferred work.

mod applicant;
mod process;
mod responses;
mod router;
mod validate;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::applications::ApplicationRepository;
use crate::clock::Clock;
use crate::ledger::ResourceLedger;
use crate::network::{Action, ActionKind, Nack};
use crate::offerings::OfferingRepository;
use crate::outbox::{ProtocolTask, TaskId, TaskOutbox};
use crate::staging::StageStore;

pub use process::ActionProcessor;
pub use router::protocol_router;

/// The stores both protocol phases work against.
#[derive(Clone)]
pub struct Backends {
    pub offerings: Arc<dyn OfferingRepository>,
    pub ledger: ResourceLedger,
    pub stages: Arc<dyn StageStore>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub outbox: Arc<dyn TaskOutbox>,
    pub clock: Arc<dyn Clock>,
}

/// Phase 1: validate, enqueue, acknowledge.
pub struct ProtocolGateway {
    backends: Backends,
    notify: Arc<Notify>,
}

impl ProtocolGateway {
    /// `notify` is signalled after every enqueue so idle workers pick the task up.
    pub fn new(backends: Backends, notify: Arc<Notify>) -> Self {
        Self { backends, notify }
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Decode and admit an inbound action. `Ok` means the caller may ACK.
    pub fn acknowledge(&self, kind: ActionKind, body: &[u8]) -> Result<TaskId, Nack> {
        let outcome = Action::decode(kind, body).and_then(|action| {
            let task = validate::admit(&self.backends, action)?;
            self.enqueue(task)
        });

        match &outcome {
            Ok(task_id) => debug!(action = %kind, %task_id, "action acknowledged"),
            Err(nack) => warn!(
                action = %kind,
                code = %nack.code,
                path = nack.path.as_deref().unwrap_or(""),
                message = %nack.message,
                "action rejected"
            ),
        }
        outcome
    }

    fn enqueue(&self, task: ProtocolTask) -> Result<TaskId, Nack> {
        let transaction_id = task.context().transaction_id.clone();
        let restore = match &task {
            ProtocolTask::Confirm { staged, .. } => Some(staged.clone()),
            _ => None,
        };

        match self.backends.outbox.enqueue(task, self.backends.clock.now()) {
            Ok(task_id) => {
                self.notify.notify_one();
                Ok(task_id)
            }
            Err(err) => {
                error!(%transaction_id, error = %err, "outbox enqueue failed");
                // the confirm never happened, so its staged application goes back
                if let Some(staged) = restore {
                    if let Err(err) = self.backends.stages.put(staged) {
                        error!(
                            %transaction_id,
                            error = %err,
                            "could not restore staged application"
                        );
                    }
                }
                Err(Nack::internal("could not accept the request, retry later"))
            }
        }
    }
}
