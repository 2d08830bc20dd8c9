//! Mutex-guarded in-memory stores. Each trait method takes its lock once, so every
//! operation is atomic with respect to the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::applications::{
    ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus, RepositoryError,
    StatusChange,
};
use crate::clock::Clock;
use crate::dispatch::Callback;
use crate::ledger::{Decrement, LedgerError, VacancyStore};
use crate::offerings::{Offering, OfferingError, OfferingRepository};
use crate::outbox::{
    OutboxError, ProtocolTask, TaskId, TaskOutbox, TaskPhase, TaskRecord, TaskStatus,
};
use crate::seeker::{CallbackInbox, InboxError, ReceivedCallback};
use crate::staging::{StageError, StageStore, StagedApplication};

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, String> {
    mutex
        .lock()
        .map_err(|_| format!("{name} lock poisoned"))
}

/// Offerings keyed by id; also serves as the vacancy counter store.
#[derive(Default, Clone)]
pub struct InMemoryOfferingStore {
    offerings: Arc<Mutex<HashMap<String, Offering>>>,
}

impl InMemoryOfferingStore {
    pub fn with_offerings(offerings: impl IntoIterator<Item = Offering>) -> Self {
        let store = Self::default();
        if let Ok(mut guard) = store.offerings.lock() {
            guard.extend(offerings.into_iter().map(|offering| (offering.id.clone(), offering)));
        }
        store
    }
}

impl OfferingRepository for InMemoryOfferingStore {
    fn insert(&self, offering: Offering) -> Result<Offering, OfferingError> {
        let mut guard = lock(&self.offerings, "offering").map_err(OfferingError::Unavailable)?;
        if guard.contains_key(&offering.id) {
            return Err(OfferingError::Duplicate(offering.id));
        }
        guard.insert(offering.id.clone(), offering.clone());
        Ok(offering)
    }

    fn get(&self, id: &str) -> Result<Option<Offering>, OfferingError> {
        let guard = lock(&self.offerings, "offering").map_err(OfferingError::Unavailable)?;
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Offering>, OfferingError> {
        let guard = lock(&self.offerings, "offering").map_err(OfferingError::Unavailable)?;
        let mut offerings: Vec<Offering> = guard.values().cloned().collect();
        offerings.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(offerings)
    }
}

impl VacancyStore for InMemoryOfferingStore {
    fn decrement_if_positive(&self, offering_id: &str) -> Result<Decrement, LedgerError> {
        let mut guard = lock(&self.offerings, "offering").map_err(LedgerError::Unavailable)?;
        let offering = guard
            .get_mut(offering_id)
            .ok_or_else(|| LedgerError::UnknownOffering(offering_id.to_string()))?;
        if offering.vacancies == 0 {
            return Ok(Decrement::AlreadyZero);
        }
        offering.vacancies -= 1;
        Ok(Decrement::Reserved {
            remaining: offering.vacancies,
        })
    }

    fn increment(&self, offering_id: &str) -> Result<u32, LedgerError> {
        let mut guard = lock(&self.offerings, "offering").map_err(LedgerError::Unavailable)?;
        let offering = guard
            .get_mut(offering_id)
            .ok_or_else(|| LedgerError::UnknownOffering(offering_id.to_string()))?;
        offering.vacancies = offering.vacancies.saturating_add(1);
        Ok(offering.vacancies)
    }

    fn available(&self, offering_id: &str) -> Result<u32, LedgerError> {
        let guard = lock(&self.offerings, "offering").map_err(LedgerError::Unavailable)?;
        guard
            .get(offering_id)
            .map(|offering| offering.vacancies)
            .ok_or_else(|| LedgerError::UnknownOffering(offering_id.to_string()))
    }
}

/// Stage store with read-time TTL enforcement plus an explicit purge.
#[derive(Clone)]
pub struct InMemoryStageStore {
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    entries: Arc<Mutex<HashMap<String, StagedApplication>>>,
}

impl InMemoryStageStore {
    pub fn new(ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1)),
            clock,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Entries still held in memory, expired or not.
    pub fn raw_len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or_default()
    }
}

impl StageStore for InMemoryStageStore {
    fn put(&self, staged: StagedApplication) -> Result<(), StageError> {
        let mut guard = lock(&self.entries, "stage").map_err(StageError::Unavailable)?;
        guard.insert(staged.transaction_id.clone(), staged);
        Ok(())
    }

    fn get(&self, transaction_id: &str) -> Result<Option<StagedApplication>, StageError> {
        let now = self.clock.now();
        let guard = lock(&self.entries, "stage").map_err(StageError::Unavailable)?;
        Ok(guard
            .get(transaction_id)
            .filter(|staged| !staged.is_expired(self.ttl, now))
            .cloned())
    }

    fn take(&self, transaction_id: &str) -> Result<Option<StagedApplication>, StageError> {
        let now = self.clock.now();
        let mut guard = lock(&self.entries, "stage").map_err(StageError::Unavailable)?;
        Ok(guard
            .remove(transaction_id)
            .filter(|staged| !staged.is_expired(self.ttl, now)))
    }

    fn delete(&self, transaction_id: &str) -> Result<bool, StageError> {
        let mut guard = lock(&self.entries, "stage").map_err(StageError::Unavailable)?;
        Ok(guard.remove(transaction_id).is_some())
    }

    fn purge_expired(&self) -> Result<usize, StageError> {
        let now = self.clock.now();
        let mut guard = lock(&self.entries, "stage").map_err(StageError::Unavailable)?;
        let before = guard.len();
        guard.retain(|_, staged| !staged.is_expired(self.ttl, now));
        Ok(before - guard.len())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = lock(&self.records, "application").map_err(RepositoryError::Unavailable)?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = lock(&self.records, "application").map_err(RepositoryError::Unavailable)?;
        Ok(guard.get(id).cloned())
    }

    fn transition(
        &self,
        id: &ApplicationId,
        next: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusChange, RepositoryError> {
        let mut guard = lock(&self.records, "application").map_err(RepositoryError::Unavailable)?;
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let previous = record.status;
        if !previous.can_transition_to(next) {
            return Err(RepositoryError::InvalidTransition {
                from: previous,
                to: next,
            });
        }
        record.status = next;
        record.updated_at = at;
        Ok(StatusChange {
            previous,
            record: record.clone(),
        })
    }
}

#[derive(Default, Clone)]
pub struct InMemoryTaskOutbox {
    records: Arc<Mutex<HashMap<TaskId, TaskRecord>>>,
}

impl InMemoryTaskOutbox {
    pub fn records(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self
            .records
            .lock()
            .map(|guard| guard.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|record| record.created_at);
        records
    }

    fn update<F>(&self, id: &TaskId, apply: F) -> Result<(), OutboxError>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut guard = lock(&self.records, "outbox").map_err(OutboxError::Unavailable)?;
        let record = guard.get_mut(id).ok_or(OutboxError::NotFound(*id))?;
        apply(record);
        Ok(())
    }
}

impl TaskOutbox for InMemoryTaskOutbox {
    fn enqueue(&self, task: ProtocolTask, at: DateTime<Utc>) -> Result<TaskId, OutboxError> {
        let record = TaskRecord::new(task, at);
        let id = record.id;
        let mut guard = lock(&self.records, "outbox").map_err(OutboxError::Unavailable)?;
        guard.insert(id, record);
        Ok(id)
    }

    fn claim_due(&self, now: DateTime<Utc>) -> Result<Option<TaskRecord>, OutboxError> {
        let mut guard = lock(&self.records, "outbox").map_err(OutboxError::Unavailable)?;
        let next = guard
            .values_mut()
            .filter(|record| record.is_due(now))
            .min_by_key(|record| (record.next_attempt_at, record.created_at));

        Ok(next.map(|record| {
            record.status = TaskStatus::InFlight;
            record.attempts += 1;
            record.updated_at = now;
            record.clone()
        }))
    }

    fn stage_callback(
        &self,
        id: &TaskId,
        callback: Callback,
        at: DateTime<Utc>,
    ) -> Result<(), OutboxError> {
        self.update(id, |record| {
            record.phase = TaskPhase::Deliver(callback);
            record.updated_at = at;
        })
    }

    fn complete(&self, id: &TaskId, at: DateTime<Utc>) -> Result<(), OutboxError> {
        self.update(id, |record| {
            record.status = TaskStatus::Completed;
            record.updated_at = at;
        })
    }

    fn reschedule(
        &self,
        id: &TaskId,
        next_attempt_at: DateTime<Utc>,
        error: String,
    ) -> Result<(), OutboxError> {
        self.update(id, |record| {
            record.status = TaskStatus::Queued;
            record.next_attempt_at = next_attempt_at;
            record.last_error = Some(error);
        })
    }

    fn dead_letter(
        &self,
        id: &TaskId,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<(), OutboxError> {
        self.update(id, |record| {
            record.status = TaskStatus::DeadLettered;
            record.last_error = Some(reason);
            record.updated_at = at;
        })
    }

    fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, OutboxError> {
        let guard = lock(&self.records, "outbox").map_err(OutboxError::Unavailable)?;
        Ok(guard.get(id).cloned())
    }

    fn dead_letters(&self) -> Result<Vec<TaskRecord>, OutboxError> {
        let guard = lock(&self.records, "outbox").map_err(OutboxError::Unavailable)?;
        let mut buried: Vec<TaskRecord> = guard
            .values()
            .filter(|record| record.status == TaskStatus::DeadLettered)
            .cloned()
            .collect();
        buried.sort_by_key(|record| record.updated_at);
        Ok(buried)
    }

    fn recover_in_flight(&self, at: DateTime<Utc>) -> Result<usize, OutboxError> {
        let mut guard = lock(&self.records, "outbox").map_err(OutboxError::Unavailable)?;
        let mut recovered = 0;
        for record in guard
            .values_mut()
            .filter(|record| record.status == TaskStatus::InFlight)
        {
            record.status = TaskStatus::Queued;
            record.next_attempt_at = at;
            record.updated_at = at;
            recovered += 1;
        }
        Ok(recovered)
    }

    fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize, OutboxError> {
        let mut guard = lock(&self.records, "outbox").map_err(OutboxError::Unavailable)?;
        let held = guard.len();
        guard.retain(|_, record| {
            record.status != TaskStatus::Completed || record.updated_at >= before
        });
        Ok(held - guard.len())
    }
}

/// Callbacks received by the seeker, grouped by transaction in arrival order.
#[derive(Default, Clone)]
pub struct InMemoryCallbackInbox {
    received: Arc<Mutex<HashMap<String, Vec<ReceivedCallback>>>>,
}

impl CallbackInbox for InMemoryCallbackInbox {
    fn record(&self, callback: ReceivedCallback) -> Result<(), InboxError> {
        let mut guard = lock(&self.received, "inbox").map_err(InboxError::Unavailable)?;
        guard
            .entry(callback.envelope.context.transaction_id.clone())
            .or_default()
            .push(callback);
        Ok(())
    }

    fn for_transaction(&self, transaction_id: &str) -> Result<Vec<ReceivedCallback>, InboxError> {
        let guard = lock(&self.received, "inbox").map_err(InboxError::Unavailable)?;
        Ok(guard.get(transaction_id).cloned().unwrap_or_default())
    }
}
