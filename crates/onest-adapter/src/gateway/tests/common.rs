use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::clock::ManualClock;
use crate::config::NetworkConfig;
use crate::dispatch::Callback;
use crate::eligibility::EligibilityCriteria;
use crate::gateway::{ActionProcessor, Backends, ProtocolGateway};
use crate::ledger::ResourceLedger;
use crate::offerings::{Offering, OfferingKind, OfferingLocation, ProviderInfo};
use crate::outbox::{ProtocolTask, TaskOutbox, TaskProcessor, TaskRecord};
use crate::storage::{
    InMemoryApplicationRepository, InMemoryOfferingStore, InMemoryStageStore, InMemoryTaskOutbox,
};

pub(super) const TXN: &str = "txn-1";
pub(super) const BAP_URI: &str = "http://seeker.test/bap";

pub(super) fn offering(id: &str, vacancies: u32, eligibility: Value) -> Offering {
    let criteria = match eligibility {
        Value::Object(map) => EligibilityCriteria(map),
        _ => EligibilityCriteria::default(),
    };
    Offering {
        id: id.to_string(),
        kind: OfferingKind::Job,
        name: format!("{id} delivery partner"),
        description: String::new(),
        provider: ProviderInfo {
            id: "prov-1".to_string(),
            name: "Swift Logistics".to_string(),
            industry: Some("logistics".to_string()),
        },
        location: OfferingLocation {
            city: "Bengaluru".to_string(),
            state: "KA".to_string(),
        },
        job_type: Some("full_time".to_string()),
        salary: None,
        vacancies,
        eligibility: criteria,
    }
}

/// In-memory wiring shared by the gateway tests; store handles alias the gateway's.
pub(super) struct Harness {
    pub clock: Arc<ManualClock>,
    pub offerings: InMemoryOfferingStore,
    pub stages: InMemoryStageStore,
    pub applications: InMemoryApplicationRepository,
    pub outbox: InMemoryTaskOutbox,
    pub gateway: ProtocolGateway,
    pub processor: ActionProcessor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_offerings(vec![
            offering("job-1", 2, json!({ "age": { "$gte": 18 } })),
            offering("job-full", 0, json!({})),
        ])
    }

    pub fn with_offerings(offerings: Vec<Offering>) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("valid start"),
        ));
        let offerings = InMemoryOfferingStore::with_offerings(offerings);
        let stages = InMemoryStageStore::new(Duration::from_secs(3600), clock.clone());
        let applications = InMemoryApplicationRepository::default();
        let outbox = InMemoryTaskOutbox::default();

        let backends = Backends {
            offerings: Arc::new(offerings.clone()),
            ledger: ResourceLedger::new(Arc::new(offerings.clone())),
            stages: Arc::new(stages.clone()),
            applications: Arc::new(applications.clone()),
            outbox: Arc::new(outbox.clone()),
            clock: clock.clone(),
        };
        let network = NetworkConfig {
            bpp_id: "bpp.test".to_string(),
            bpp_uri: "http://provider.test".to_string(),
            ..NetworkConfig::default()
        };

        Self {
            clock,
            offerings,
            stages,
            applications,
            outbox,
            gateway: ProtocolGateway::new(backends.clone(), Arc::new(Notify::new())),
            processor: ActionProcessor::new(backends, network),
        }
    }

    pub fn acknowledge(
        &self,
        action: &str,
        message: Value,
    ) -> Result<TaskRecord, crate::network::Nack> {
        let kind = crate::network::ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == action)
            .expect("known action");
        let id = self.gateway.acknowledge(kind, &body(action, message))?;
        Ok(self
            .outbox
            .get(&id)
            .expect("outbox readable")
            .expect("task recorded"))
    }

    /// Acknowledge and immediately process, returning the callback.
    pub fn run(&self, action: &str, message: Value) -> Callback {
        let record = self.acknowledge(action, message).expect("action acknowledged");
        self.processor.process(&record.task).expect("task processed")
    }

    pub fn process(&self, task: &ProtocolTask) -> Result<Callback, crate::outbox::ProcessingError> {
        self.processor.process(task)
    }

    pub fn vacancies(&self, offering_id: &str) -> u32 {
        use crate::ledger::VacancyStore;
        self.offerings.available(offering_id).expect("known offering")
    }
}

pub(super) fn body(action: &str, message: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "context": {
            "domain": "onest:work-opportunities",
            "action": action,
            "version": "1.1.0",
            "transaction_id": TXN,
            "message_id": format!("msg-{action}"),
            "bap_id": "bap.test",
            "bap_uri": BAP_URI,
            "timestamp": "2026-03-02T09:00:00.000Z"
        },
        "message": message
    }))
    .expect("serialisable body")
}

pub(super) fn customer(age: u32) -> Value {
    json!({
        "person": {
            "name": "Asha Rao",
            "gender": "F",
            "age": age.to_string(),
            "tags": [{
                "descriptor": { "code": "WORK_EXPERIENCE" },
                "list": [{ "descriptor": { "code": "YEARS" }, "value": "P3Y" }]
            }]
        },
        "contact": { "phone": "+91-9000000000", "email": "asha@example.com" }
    })
}

pub(super) fn order(item: &str, customer: Option<Value>) -> Value {
    let mut fulfillment = json!({ "id": "F1", "type": "lead & recruitment" });
    if let Some(customer) = customer {
        fulfillment["customer"] = customer;
    }
    json!({ "order": { "items": [{ "id": item }], "fulfillments": [fulfillment] } })
}

/// Run init and confirm for `job-1`, returning the confirmed order id.
pub(super) fn confirm_application(harness: &Harness) -> String {
    harness.run("init", order("job-1", Some(customer(24))));
    let callback = harness.run("confirm", order("job-1", Some(customer(24))));
    callback.body.message["order"]["id"]
        .as_str()
        .expect("order id in on_confirm")
        .to_string()
}
