//! Phase 2: the out-of-band work behind each acknowledged action.

use tracing::{info, warn};

use super::applicant::snapshot_from;
use super::responses;
use super::Backends;
use crate::applications::{
    ApplicationId, ApplicationRecord, ApplicationService, ApplicationServiceError,
    ApplicationStatus, RepositoryError,
};
use crate::config::NetworkConfig;
use crate::dispatch::Callback;
use crate::eligibility::evaluate;
use crate::ledger::LedgerError;
use crate::network::{
    tag_value, ActionKind, CancelMessage, Context, OrderMessage, Request, SearchMessage,
    StatusMessage,
};
use crate::offerings::{Offering, OfferingCatalog, OfferingError, SearchFilter};
use crate::outbox::{ProcessingError, ProtocolTask, TaskProcessor};
use crate::staging::{StageError, StagedApplication};

/// Executes queued protocol tasks against the stores and builds their callbacks.
pub struct ActionProcessor {
    backends: Backends,
    catalog: OfferingCatalog,
    applications: ApplicationService,
    network: NetworkConfig,
}

impl ActionProcessor {
    pub fn new(backends: Backends, network: NetworkConfig) -> Self {
        let catalog = OfferingCatalog::new(backends.offerings.clone());
        let applications = ApplicationService::new(
            backends.applications.clone(),
            backends.ledger.clone(),
            backends.clock.clone(),
        );
        Self {
            backends,
            catalog,
            applications,
            network,
        }
    }

    fn respond<M: serde::Serialize>(
        &self,
        context: &Context,
        kind: ActionKind,
        message: &M,
    ) -> Result<Callback, ProcessingError> {
        responses::callback(
            context,
            kind,
            &self.network,
            self.backends.clock.now(),
            message,
        )
    }

    fn offering(&self, id: &str) -> Result<Offering, ProcessingError> {
        self.catalog
            .get(id)
            .map_err(offering_failure)?
            .ok_or_else(|| ProcessingError::Rejected(format!("offering {id} no longer exists")))
    }

    fn search(&self, request: &Request<SearchMessage>) -> Result<Callback, ProcessingError> {
        let filter = search_filter(&request.message);
        let offerings = self.catalog.search(&filter).map_err(offering_failure)?;
        info!(
            transaction_id = %request.context.transaction_id,
            matches = offerings.len(),
            "search matched offerings"
        );
        let message = responses::catalog(&offerings, &self.network);
        self.respond(&request.context, ActionKind::Search, &message)
    }

    fn select(&self, request: &Request<OrderMessage>) -> Result<Callback, ProcessingError> {
        let offering_id = first_item(&request.message)?;
        let offering = self.offering(offering_id)?;
        let available = self
            .backends
            .ledger
            .available(offering_id)
            .map_err(ledger_failure)?;
        if available == 0 {
            return Err(ProcessingError::Rejected(format!(
                "no vacancies left for offering {offering_id}"
            )));
        }

        let message = responses::quote(&offering, available);
        self.respond(&request.context, ActionKind::Select, &message)
    }

    fn init(&self, request: &Request<OrderMessage>) -> Result<Callback, ProcessingError> {
        let offering_id = first_item(&request.message)?;
        let offering = self.offering(offering_id)?;
        let customer = request
            .message
            .order
            .fulfillments
            .first()
            .and_then(|fulfillment| fulfillment.customer.as_ref());

        let applicant = customer.map(snapshot_from).unwrap_or_default();
        let report = evaluate(&offering.eligibility, &applicant.credentials());

        if report.eligible {
            self.backends
                .stages
                .put(StagedApplication {
                    transaction_id: request.context.transaction_id.clone(),
                    offering_id: offering.id.clone(),
                    applicant,
                    staged_at: self.backends.clock.now(),
                })
                .map_err(stage_failure)?;
            info!(
                transaction_id = %request.context.transaction_id,
                offering_id = %offering.id,
                "application staged"
            );
        } else {
            let failed: Vec<&str> = report.failures().map(|(key, _)| key.as_str()).collect();
            info!(
                transaction_id = %request.context.transaction_id,
                offering_id = %offering.id,
                failed = ?failed,
                "applicant not eligible; nothing staged"
            );
        }

        let message = responses::init_result(&offering, customer, &report);
        self.respond(&request.context, ActionKind::Init, &message)
    }

    fn confirm(
        &self,
        request: &Request<OrderMessage>,
        staged: &StagedApplication,
    ) -> Result<Callback, ProcessingError> {
        let order_id = request
            .message
            .order
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ProcessingError::Rejected("confirm task carries no order id".into()))?;
        let offering_id = staged.offering_id.as_str();

        self.backends
            .ledger
            .reserve(offering_id)
            .map_err(ledger_failure)?;

        let now = self.backends.clock.now();
        let record = ApplicationRecord {
            id: ApplicationId(order_id),
            offering_id: offering_id.to_string(),
            transaction_id: staged.transaction_id.clone(),
            applicant: staged.applicant.clone(),
            status: ApplicationStatus::ApplicationAccepted,
            created_at: now,
            updated_at: now,
        };

        let record = match self.backends.applications.insert(record.clone()) {
            Ok(record) => {
                info!(
                    transaction_id = %record.transaction_id,
                    application_id = %record.id,
                    offering_id = %record.offering_id,
                    "application confirmed"
                );
                record
            }
            Err(err) => {
                // the reservation above must not outlive a record that was never written
                self.release_after_failed_confirm(offering_id, &record.id);
                self.recover_duplicate(err, &record)?
            }
        };

        let offering = self.catalog.get(offering_id).ok().flatten();
        let message =
            responses::application_order(&record, responses::provider_of(offering.as_ref()));
        self.respond(&request.context, ActionKind::Confirm, &message)
    }

    fn release_after_failed_confirm(&self, offering_id: &str, id: &ApplicationId) {
        if let Err(err) = self.backends.ledger.release(offering_id) {
            warn!(
                application_id = %id,
                offering_id,
                error = %err,
                "could not release reservation after failed confirm"
            );
        }
    }

    /// A retried confirm whose earlier attempt already wrote the record answers with it.
    fn recover_duplicate(
        &self,
        err: RepositoryError,
        attempted: &ApplicationRecord,
    ) -> Result<ApplicationRecord, ProcessingError> {
        match err {
            RepositoryError::Conflict => {
                let existing = self
                    .backends
                    .applications
                    .fetch(&attempted.id)
                    .map_err(repository_failure)?
                    .filter(|existing| existing.transaction_id == attempted.transaction_id)
                    .ok_or_else(|| {
                        ProcessingError::Rejected(format!(
                            "order {} already belongs to another transaction",
                            attempted.id
                        ))
                    })?;
                info!(
                    transaction_id = %existing.transaction_id,
                    application_id = %existing.id,
                    "confirm already applied; answering with stored application"
                );
                Ok(existing)
            }
            other => Err(repository_failure(other)),
        }
    }

    fn status(&self, request: &Request<StatusMessage>) -> Result<Callback, ProcessingError> {
        let order_id = request
            .message
            .order_id()
            .ok_or_else(|| ProcessingError::Rejected("status task carries no order id".into()))?;
        let record = self
            .applications
            .get(&ApplicationId(order_id.to_string()))
            .map_err(application_failure)?;

        let offering = self.catalog.get(&record.offering_id).ok().flatten();
        let message =
            responses::application_order(&record, responses::provider_of(offering.as_ref()));
        self.respond(&request.context, ActionKind::Status, &message)
    }

    fn cancel(&self, request: &Request<CancelMessage>) -> Result<Callback, ProcessingError> {
        let order_id = request
            .message
            .order_id()
            .ok_or_else(|| ProcessingError::Rejected("cancel task carries no order id".into()))?;
        let id = ApplicationId(order_id.to_string());

        let record = match self.applications.cancel(&id) {
            Ok(update) => {
                info!(
                    application_id = %id,
                    previous = %update.previous,
                    vacancy_released = update.vacancy_released,
                    "application cancelled"
                );
                update.record
            }
            // a retry after the transition committed: answer with the cancelled record
            Err(ApplicationServiceError::Repository(RepositoryError::InvalidTransition {
                from: ApplicationStatus::Cancelled,
                ..
            })) => self.applications.get(&id).map_err(application_failure)?,
            Err(err) => return Err(application_failure(err)),
        };

        let message = responses::cancellation(&record);
        self.respond(&request.context, ActionKind::Cancel, &message)
    }
}

impl TaskProcessor for ActionProcessor {
    fn process(&self, task: &ProtocolTask) -> Result<Callback, ProcessingError> {
        match task {
            ProtocolTask::Search { request } => self.search(request),
            ProtocolTask::Select { request } => self.select(request),
            ProtocolTask::Init { request } => self.init(request),
            ProtocolTask::Confirm { request, staged } => self.confirm(request, staged),
            ProtocolTask::Status { request } => self.status(request),
            ProtocolTask::Cancel { request } => self.cancel(request),
        }
    }
}

/// Translate a search intent into a catalog filter.
pub(crate) fn search_filter(message: &SearchMessage) -> SearchFilter {
    let intent = &message.intent;
    let keyword = intent
        .item
        .as_ref()
        .and_then(|item| item.descriptor.as_ref())
        .and_then(|descriptor| descriptor.name.clone());
    let provider = intent
        .provider
        .as_ref()
        .and_then(|provider| provider.descriptor.as_ref())
        .and_then(|descriptor| descriptor.name.clone());
    let city = intent
        .provider
        .as_ref()
        .and_then(|provider| provider.locations.first())
        .and_then(|location| location.city.as_ref())
        .and_then(|city| city.code.clone());

    let item_tags = intent
        .item
        .as_ref()
        .map(|item| item.tags.as_slice())
        .unwrap_or_default();
    let tag = |code: &str| {
        tag_value(item_tags, "JOB_DETAILS", code)
            .or_else(|| tag_value(&intent.tags, "JOB_DETAILS", code))
            .map(str::to_string)
    };

    let clean = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    SearchFilter {
        keyword: clean(keyword),
        provider: clean(provider),
        city: clean(city),
        industry: clean(tag("INDUSTRY_TYPE")),
        job_type: clean(tag("JOB_TYPE")),
    }
}

fn first_item(message: &OrderMessage) -> Result<&str, ProcessingError> {
    message
        .order
        .items
        .first()
        .map(|item| item.id.as_str())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProcessingError::Rejected("order carries no item".to_string()))
}

fn offering_failure(err: OfferingError) -> ProcessingError {
    match err {
        OfferingError::Unavailable(_) => ProcessingError::Transient(err.to_string()),
        other => ProcessingError::Rejected(other.to_string()),
    }
}

fn ledger_failure(err: LedgerError) -> ProcessingError {
    match err {
        LedgerError::Unavailable(_) => ProcessingError::Transient(err.to_string()),
        other => ProcessingError::Rejected(other.to_string()),
    }
}

fn stage_failure(err: StageError) -> ProcessingError {
    ProcessingError::Transient(err.to_string())
}

fn repository_failure(err: RepositoryError) -> ProcessingError {
    match err {
        RepositoryError::Unavailable(_) => ProcessingError::Transient(err.to_string()),
        other => ProcessingError::Rejected(other.to_string()),
    }
}

fn application_failure(err: ApplicationServiceError) -> ProcessingError {
    match err {
        ApplicationServiceError::Repository(err) => repository_failure(err),
        ApplicationServiceError::Ledger(err) => ledger_failure(err),
    }
}
