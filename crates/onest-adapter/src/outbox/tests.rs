use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use super::*;
use crate::clock::{Clock, ManualClock};
use crate::dispatch::{CallbackDispatcher, DeliveryOutcome, DispatchError};
use crate::network::{ActionKind, NackError, Request};
use crate::storage::InMemoryTaskOutbox;

/// Processor that replays a script of results, then succeeds.
#[derive(Default)]
struct ScriptedProcessor {
    script: Mutex<VecDeque<ProcessingError>>,
    calls: Mutex<u32>,
}

impl ScriptedProcessor {
    fn failing_with(errors: impl IntoIterator<Item = ProcessingError>) -> Self {
        Self {
            script: Mutex::new(errors.into_iter().collect()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().expect("calls lock")
    }
}

impl TaskProcessor for ScriptedProcessor {
    fn process(&self, task: &ProtocolTask) -> Result<Callback, ProcessingError> {
        *self.calls.lock().expect("calls lock") += 1;
        if let Some(err) = self.script.lock().expect("script lock").pop_front() {
            return Err(err);
        }
        Ok(Callback {
            url: Callback::target("http://seeker.test", task.kind()),
            action: task.kind(),
            body: Request::default(),
        })
    }
}

enum Delivery {
    Ack,
    Nack,
    Down,
}

/// Dispatcher answering from a script; once the script runs out every delivery is ACKed.
#[derive(Default)]
struct ScriptedDispatcher {
    script: Mutex<VecDeque<Delivery>>,
    delivered: Mutex<Vec<Callback>>,
}

impl ScriptedDispatcher {
    fn answering(script: impl IntoIterator<Item = Delivery>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    fn delivered(&self) -> Vec<Callback> {
        self.delivered.lock().expect("delivered lock").clone()
    }
}

#[async_trait]
impl CallbackDispatcher for ScriptedDispatcher {
    async fn deliver(&self, callback: &Callback) -> Result<DeliveryOutcome, DispatchError> {
        self.delivered
            .lock()
            .expect("delivered lock")
            .push(callback.clone());
        let next = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(Delivery::Ack);
        match next {
            Delivery::Ack => Ok(DeliveryOutcome::Acknowledged),
            Delivery::Nack => Ok(DeliveryOutcome::Rejected(NackError {
                code: "30004".to_string(),
                paths: ".context.transaction_id".to_string(),
                message: "unknown transaction".to_string(),
            })),
            Delivery::Down => Err(DispatchError::Status {
                status: 503,
                body: "unavailable".to_string(),
            }),
        }
    }
}

struct Rig {
    clock: Arc<ManualClock>,
    outbox: InMemoryTaskOutbox,
    processor: Arc<ScriptedProcessor>,
    dispatcher: Arc<ScriptedDispatcher>,
    runner: TaskRunner,
}

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(60),
    }
}

fn rig(processor: ScriptedProcessor, dispatcher: ScriptedDispatcher) -> Rig {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).single().expect("valid"),
    ));
    let outbox = InMemoryTaskOutbox::default();
    let processor = Arc::new(processor);
    let dispatcher = Arc::new(dispatcher);
    let runner = TaskRunner::new(
        Arc::new(outbox.clone()),
        processor.clone(),
        dispatcher.clone(),
        policy(),
        clock.clone(),
    );
    Rig {
        clock,
        outbox,
        processor,
        dispatcher,
        runner,
    }
}

fn search_task() -> ProtocolTask {
    ProtocolTask::Search {
        request: Request::default(),
    }
}

impl Rig {
    fn enqueue(&self) -> TaskId {
        self.outbox
            .enqueue(search_task(), self.clock.now())
            .expect("enqueue succeeds")
    }

    fn record(&self, id: &TaskId) -> TaskRecord {
        self.outbox
            .get(id)
            .expect("outbox readable")
            .expect("task exists")
    }
}

#[tokio::test]
async fn successful_task_is_delivered_and_completed() {
    let rig = rig(ScriptedProcessor::default(), ScriptedDispatcher::default());
    let id = rig.enqueue();

    assert_eq!(rig.runner.run_until_idle().await.expect("runs"), 1);

    let record = rig.record(&id);
    assert_eq!(record.status, TaskStatus::Completed);
    assert!(matches!(record.phase, TaskPhase::Deliver(_)));
    let delivered = rig.dispatcher.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].action, ActionKind::Search);
    assert_eq!(delivered[0].url, "http://seeker.test/on_search");
}

#[tokio::test]
async fn transient_failure_is_retried_with_backoff() {
    let rig = rig(
        ScriptedProcessor::failing_with([ProcessingError::Transient("store busy".into())]),
        ScriptedDispatcher::default(),
    );
    let id = rig.enqueue();
    let started = rig.clock.now();

    rig.runner.run_until_idle().await.expect("runs");
    let record = rig.record(&id);
    assert_eq!(record.status, TaskStatus::Queued);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.next_attempt_at, started + chrono::Duration::seconds(2));
    assert_eq!(record.last_error.as_deref(), Some("store busy"));

    // not due yet
    assert_eq!(rig.runner.run_until_idle().await.expect("runs"), 0);

    rig.clock.advance(chrono::Duration::seconds(2));
    assert_eq!(rig.runner.run_until_idle().await.expect("runs"), 1);
    assert_eq!(rig.record(&id).status, TaskStatus::Completed);
    assert_eq!(rig.processor.calls(), 2);
}

#[tokio::test]
async fn rejected_task_goes_straight_to_dead_letter() {
    let rig = rig(
        ScriptedProcessor::failing_with([ProcessingError::Rejected("no vacancy".into())]),
        ScriptedDispatcher::default(),
    );
    let id = rig.enqueue();

    rig.runner.run_until_idle().await.expect("runs");

    let record = rig.record(&id);
    assert_eq!(record.status, TaskStatus::DeadLettered);
    assert_eq!(record.attempts, 1);
    assert!(rig.dispatcher.delivered().is_empty());
    assert_eq!(rig.outbox.dead_letters().expect("readable").len(), 1);
}

#[tokio::test]
async fn failed_delivery_resends_the_committed_callback() {
    let rig = rig(
        ScriptedProcessor::default(),
        ScriptedDispatcher::answering([Delivery::Down]),
    );
    let id = rig.enqueue();

    rig.runner.run_until_idle().await.expect("runs");
    assert_eq!(rig.record(&id).status, TaskStatus::Queued);

    rig.clock.advance(chrono::Duration::seconds(2));
    rig.runner.run_until_idle().await.expect("runs");

    assert_eq!(rig.record(&id).status, TaskStatus::Completed);
    assert_eq!(rig.processor.calls(), 1, "mutation must run exactly once");
    let delivered = rig.dispatcher.delivered();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0], delivered[1]);
}

#[tokio::test]
async fn delivery_is_abandoned_after_max_attempts() {
    let rig = rig(
        ScriptedProcessor::default(),
        ScriptedDispatcher::answering([Delivery::Down, Delivery::Down, Delivery::Down]),
    );
    let id = rig.enqueue();

    for _ in 0..3 {
        rig.runner.run_until_idle().await.expect("runs");
        rig.clock.advance(chrono::Duration::seconds(60));
    }

    let record = rig.record(&id);
    assert_eq!(record.status, TaskStatus::DeadLettered);
    assert_eq!(record.attempts, 3);
    assert_eq!(rig.dispatcher.delivered().len(), 3);
}

#[tokio::test]
async fn counterparty_nack_still_completes_the_task() {
    let rig = rig(
        ScriptedProcessor::default(),
        ScriptedDispatcher::answering([Delivery::Nack]),
    );
    let id = rig.enqueue();

    rig.runner.run_until_idle().await.expect("runs");

    assert_eq!(rig.record(&id).status, TaskStatus::Completed);
    assert_eq!(rig.dispatcher.delivered().len(), 1);
}

#[tokio::test]
async fn worker_pool_drains_notified_tasks() {
    let clock: Arc<dyn Clock> = Arc::new(crate::clock::SystemClock);
    let outbox = InMemoryTaskOutbox::default();
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let runner = Arc::new(TaskRunner::new(
        Arc::new(outbox.clone()),
        Arc::new(ScriptedProcessor::default()),
        dispatcher.clone(),
        policy(),
        clock.clone(),
    ));
    let notify = Arc::new(Notify::new());
    let pool = WorkerPool::spawn(runner, notify.clone(), 2, Duration::from_millis(50));
    assert_eq!(pool.size(), 2);

    let id = outbox.enqueue(search_task(), clock.now()).expect("enqueue");
    notify.notify_one();

    let mut status = TaskStatus::Queued;
    for _ in 0..100 {
        status = outbox.get(&id).expect("readable").expect("exists").status;
        if status == TaskStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pool.shutdown().await;

    assert_eq!(status, TaskStatus::Completed);
    assert_eq!(dispatcher.delivered().len(), 1);
}

#[tokio::test]
async fn retention_sweeper_drops_completed_tasks_once_they_age_out() {
    let rig = rig(ScriptedProcessor::default(), ScriptedDispatcher::default());
    let done = rig.enqueue();
    rig.runner.run_until_idle().await.expect("runs");
    assert_eq!(rig.record(&done).status, TaskStatus::Completed);

    rig.clock.advance(chrono::Duration::minutes(61));
    let (stop, stopped) = tokio::sync::watch::channel(false);
    let sweeper = spawn_retention_sweeper(
        Arc::new(rig.outbox.clone()),
        rig.clock.clone(),
        Duration::from_secs(3600),
        Duration::from_millis(10),
        stopped,
    );

    let mut remaining = rig.outbox.records().len();
    for _ in 0..100 {
        remaining = rig.outbox.records().len();
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    stop.send(true).expect("sweeper listening");
    sweeper.await.expect("sweeper stops");

    assert_eq!(remaining, 0);
}
