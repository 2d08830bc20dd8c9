use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::runner::TaskRunner;

/// Fixed set of tokio tasks draining the outbox.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Start `count` workers. Idle workers wake on `notify` or every `poll_interval`.
    pub fn spawn(
        runner: Arc<TaskRunner>,
        notify: Arc<Notify>,
        count: usize,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown, receiver) = watch::channel(false);
        let handles = (0..count.max(1))
            .map(|worker| {
                tokio::spawn(work(
                    worker,
                    runner.clone(),
                    notify.clone(),
                    poll_interval,
                    receiver.clone(),
                ))
            })
            .collect();

        Self { handles, shutdown }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Signal every worker to stop and wait for in-flight tasks to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "worker task ended abnormally");
            }
        }
    }
}

async fn work(
    worker: usize,
    runner: Arc<TaskRunner>,
    notify: Arc<Notify>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker, "outbox worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }

        match runner.run_next().await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => error!(worker, error = %err, "outbox unavailable"),
        }

        tokio::select! {
            _ = notify.notified() => {}
            _ = tokio::time::sleep(poll_interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!(worker, "outbox worker stopped");
}
