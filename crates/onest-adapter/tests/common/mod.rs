#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use onest_adapter::clock::ManualClock;
use onest_adapter::config::NetworkConfig;
use onest_adapter::dispatch::{Callback, CallbackDispatcher, DeliveryOutcome, DispatchError};
use onest_adapter::eligibility::EligibilityCriteria;
use onest_adapter::gateway::{ActionProcessor, Backends, ProtocolGateway};
use onest_adapter::ledger::{ResourceLedger, VacancyStore};
use onest_adapter::network::{ActionKind, Nack};
use onest_adapter::offerings::{Offering, OfferingKind, OfferingLocation, ProviderInfo};
use onest_adapter::outbox::{RetryPolicy, TaskRunner};
use onest_adapter::storage::{
    InMemoryApplicationRepository, InMemoryOfferingStore, InMemoryStageStore, InMemoryTaskOutbox,
};
use serde_json::{json, Value};
use tokio::sync::Notify;

pub const BAP_URI: &str = "http://seeker.example/bap";

/// Dispatcher that records every callback and fails the first `failures` deliveries.
#[derive(Default)]
pub struct RecordingDispatcher {
    failures: Mutex<VecDeque<u16>>,
    delivered: Mutex<Vec<Callback>>,
}

impl RecordingDispatcher {
    pub fn failing(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            failures: Mutex::new(statuses.into_iter().collect()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Make the next deliveries fail with the given statuses.
    pub fn fail_next(&self, statuses: impl IntoIterator<Item = u16>) {
        self.failures
            .lock()
            .expect("failures lock")
            .extend(statuses);
    }

    pub fn delivered(&self) -> Vec<Callback> {
        self.delivered.lock().expect("delivered lock").clone()
    }

    pub fn last(&self, action: ActionKind) -> Option<Callback> {
        self.delivered()
            .into_iter()
            .rev()
            .find(|callback| callback.action == action)
    }
}

#[async_trait]
impl CallbackDispatcher for RecordingDispatcher {
    async fn deliver(&self, callback: &Callback) -> Result<DeliveryOutcome, DispatchError> {
        self.delivered
            .lock()
            .expect("delivered lock")
            .push(callback.clone());
        match self.failures.lock().expect("failures lock").pop_front() {
            Some(status) => Err(DispatchError::Status {
                status,
                body: "callback endpoint down".to_string(),
            }),
            None => Ok(DeliveryOutcome::Acknowledged),
        }
    }
}

pub fn offering(id: &str, vacancies: u32, eligibility: Value) -> Offering {
    let criteria = match eligibility {
        Value::Object(map) => EligibilityCriteria(map),
        _ => EligibilityCriteria::default(),
    };
    Offering {
        id: id.to_string(),
        kind: OfferingKind::Job,
        name: format!("Role {id}"),
        description: "Field operations".to_string(),
        provider: ProviderInfo {
            id: "P1".to_string(),
            name: "Harbor Works".to_string(),
            industry: Some("construction".to_string()),
        },
        location: OfferingLocation {
            city: "Chennai".to_string(),
            state: "TN".to_string(),
        },
        job_type: Some("contract".to_string()),
        salary: None,
        vacancies,
        eligibility: criteria,
    }
}

/// Provider wired entirely in memory, driven by `TaskRunner::run_until_idle`.
pub struct Provider {
    pub clock: Arc<ManualClock>,
    pub offerings: InMemoryOfferingStore,
    pub stages: InMemoryStageStore,
    pub applications: InMemoryApplicationRepository,
    pub outbox: InMemoryTaskOutbox,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub gateway: ProtocolGateway,
    pub runner: TaskRunner,
}

impl Provider {
    pub fn new(offerings: Vec<Offering>) -> Self {
        Self::with_dispatcher(offerings, RecordingDispatcher::default())
    }

    pub fn with_dispatcher(offerings: Vec<Offering>, dispatcher: RecordingDispatcher) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).single().expect("valid start"),
        ));
        let offerings = InMemoryOfferingStore::with_offerings(offerings);
        let stages = InMemoryStageStore::new(Duration::from_secs(3600), clock.clone());
        let applications = InMemoryApplicationRepository::default();
        let outbox = InMemoryTaskOutbox::default();
        let dispatcher = Arc::new(dispatcher);

        let backends = Backends {
            offerings: Arc::new(offerings.clone()),
            ledger: ResourceLedger::new(Arc::new(offerings.clone())),
            stages: Arc::new(stages.clone()),
            applications: Arc::new(applications.clone()),
            outbox: Arc::new(outbox.clone()),
            clock: clock.clone(),
        };
        let network = NetworkConfig {
            bpp_id: "bpp.example".to_string(),
            bpp_uri: "http://provider.example".to_string(),
            ..NetworkConfig::default()
        };
        let runner = TaskRunner::new(
            Arc::new(outbox.clone()),
            Arc::new(ActionProcessor::new(backends.clone(), network)),
            dispatcher.clone(),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
            },
            clock.clone(),
        );

        Self {
            clock,
            offerings,
            stages,
            applications,
            outbox,
            dispatcher,
            gateway: ProtocolGateway::new(backends, Arc::new(Notify::new())),
            runner,
        }
    }

    pub fn send(&self, kind: ActionKind, transaction_id: &str, message: Value) -> Result<(), Nack> {
        self.gateway
            .acknowledge(kind, &envelope(kind, transaction_id, message))
            .map(|_| ())
    }

    /// Send and then drain the outbox.
    pub async fn exchange(
        &self,
        kind: ActionKind,
        transaction_id: &str,
        message: Value,
    ) -> Result<Callback, Nack> {
        self.send(kind, transaction_id, message)?;
        self.runner.run_until_idle().await.expect("outbox available");
        Ok(self.dispatcher.last(kind).expect("callback delivered"))
    }

    pub fn vacancies(&self, offering_id: &str) -> u32 {
        self.offerings.available(offering_id).expect("known offering")
    }
}

pub fn envelope(kind: ActionKind, transaction_id: &str, message: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "context": {
            "domain": "onest:work-opportunities",
            "action": kind.as_str(),
            "version": "2.0.0",
            "transaction_id": transaction_id,
            "message_id": format!("{transaction_id}-{}", kind.as_str()),
            "bap_id": "bap.example",
            "bap_uri": BAP_URI,
            "timestamp": "2026-06-01T08:00:00.000Z"
        },
        "message": message
    }))
    .expect("serialisable envelope")
}

pub fn applicant(age: u32) -> Value {
    json!({
        "person": {
            "name": "Meena Iyer",
            "gender": "female",
            "age": age.to_string(),
            "skills": [{ "name": "welding" }],
            "creds": [{ "descriptor": { "name": "ID card" }, "type": "id_proof" }]
        },
        "contact": { "phone": "+91-9811111111" }
    })
}

pub fn order(item: &str, customer: Option<Value>) -> Value {
    let mut fulfillment = json!({ "id": "F1", "type": "lead & recruitment" });
    if let Some(customer) = customer {
        fulfillment["customer"] = customer;
    }
    json!({ "order": { "items": [{ "id": item }], "fulfillments": [fulfillment] } })
}
