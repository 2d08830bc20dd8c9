//! Synchronous admission checks run before an action is acknowledged.

use uuid::Uuid;

use super::Backends;
use crate::applications::{ApplicationId, ApplicationStatus};
use crate::network::{
    Action, CancelMessage, Nack, OrderMessage, Request, StatusMessage,
};
use crate::outbox::ProtocolTask;
use crate::staging::StagedApplication;

/// Check `action` against the stores and turn it into the task to enqueue.
///
/// Confirm is the one action with a side effect here: its staged application is taken
/// atomically, so a second confirm for the same transaction cannot be admitted.
pub(crate) fn admit(backends: &Backends, action: Action) -> Result<ProtocolTask, Nack> {
    if action.context().bap_uri.trim().is_empty() {
        return Err(Nack::missing(".context.bap_uri", "bap_uri is required"));
    }

    match action {
        Action::Search(request) => Ok(ProtocolTask::Search { request }),
        Action::Select(request) => {
            select(backends, &request)?;
            Ok(ProtocolTask::Select { request })
        }
        Action::Init(request) => {
            init(backends, &request)?;
            Ok(ProtocolTask::Init { request })
        }
        Action::Confirm(request) => confirm(backends, request),
        Action::Status(request) => {
            status(backends, &request)?;
            Ok(ProtocolTask::Status { request })
        }
        Action::Cancel(request) => {
            cancel(backends, &request)?;
            Ok(ProtocolTask::Cancel { request })
        }
    }
}

fn select(backends: &Backends, request: &Request<OrderMessage>) -> Result<(), Nack> {
    let offering_id = item_id(&request.message)?;
    known_offering(backends, offering_id)?;
    ensure_vacancy(backends, offering_id)
}

fn init(backends: &Backends, request: &Request<OrderMessage>) -> Result<(), Nack> {
    require_fulfillments(&request.message)?;
    let offering_id = item_id(&request.message)?;
    require_transaction(request)?;
    known_offering(backends, offering_id)
}

fn confirm(backends: &Backends, mut request: Request<OrderMessage>) -> Result<ProtocolTask, Nack> {
    require_fulfillments(&request.message)?;
    let offering_id = item_id(&request.message)?.to_string();
    require_transaction(&request)?;

    let order_id = match request.message.order.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => {
            let existing = backends
                .applications
                .fetch(&ApplicationId(id.to_string()))
                .map_err(|err| Nack::internal(err.to_string()))?;
            if existing.is_some() {
                return Err(Nack::missing(
                    ".message.order.id",
                    format!("order {id} has already been confirmed"),
                ));
            }
            id.to_string()
        }
        _ => Uuid::new_v4().to_string(),
    };
    request.message.order.id = Some(order_id);

    let transaction_id = request.context.transaction_id.as_str();
    let staged = backends
        .stages
        .take(transaction_id)
        .map_err(|err| Nack::internal(err.to_string()))?
        .ok_or_else(|| {
            Nack::missing(
                ".context.transaction_id",
                format!("no staged application for transaction {transaction_id}"),
            )
        })?;

    if let Err(nack) = staged_matches(backends, &staged, &offering_id) {
        restore(backends, staged);
        return Err(nack);
    }

    Ok(ProtocolTask::Confirm { request, staged })
}

fn staged_matches(
    backends: &Backends,
    staged: &StagedApplication,
    offering_id: &str,
) -> Result<(), Nack> {
    if staged.offering_id != offering_id {
        return Err(Nack::missing(
            ".message.order.items[0].id",
            format!(
                "transaction was initialised for offering {}, not {offering_id}",
                staged.offering_id
            ),
        ));
    }
    ensure_vacancy(backends, offering_id)
}

fn restore(backends: &Backends, staged: StagedApplication) {
    let transaction_id = staged.transaction_id.clone();
    if let Err(err) = backends.stages.put(staged) {
        tracing::error!(%transaction_id, error = %err, "could not restore staged application");
    }
}

fn status(backends: &Backends, request: &Request<StatusMessage>) -> Result<(), Nack> {
    let order_id = request
        .message
        .order_id()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Nack::missing(".message.order_id", "order_id is required"))?;
    existing_status(backends, order_id, ".message.order_id").map(|_| ())
}

fn cancel(backends: &Backends, request: &Request<CancelMessage>) -> Result<(), Nack> {
    let order_id = request
        .message
        .order_id()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Nack::missing(".message.order_id", "order_id is required"))?;
    match existing_status(backends, order_id, ".message.order_id")? {
        ApplicationStatus::Cancelled => Err(Nack::missing(
            ".message.order_id",
            format!("order {order_id} is already cancelled"),
        )),
        _ => Ok(()),
    }
}

fn existing_status(
    backends: &Backends,
    order_id: &str,
    path: &str,
) -> Result<ApplicationStatus, Nack> {
    backends
        .applications
        .fetch(&ApplicationId(order_id.to_string()))
        .map_err(|err| Nack::internal(err.to_string()))?
        .map(|record| record.status)
        .ok_or_else(|| Nack::missing(path, format!("order {order_id} not found")))
}

fn require_fulfillments(message: &OrderMessage) -> Result<(), Nack> {
    if message.order.fulfillments.is_empty() {
        return Err(Nack::missing(
            ".message.order.fulfillments",
            "at least one fulfillment is required",
        ));
    }
    Ok(())
}

fn require_transaction<M>(request: &Request<M>) -> Result<(), Nack> {
    if request.context.transaction_id.trim().is_empty() {
        return Err(Nack::missing(
            ".context.transaction_id",
            "transaction_id is required",
        ));
    }
    Ok(())
}

fn item_id(message: &OrderMessage) -> Result<&str, Nack> {
    let item = message
        .order
        .items
        .first()
        .ok_or_else(|| Nack::missing(".message.order.items", "at least one item is required"))?;
    if item.id.trim().is_empty() {
        return Err(Nack::missing(".message.order.items[0].id", "item id is required"));
    }
    Ok(item.id.as_str())
}

fn known_offering(backends: &Backends, offering_id: &str) -> Result<(), Nack> {
    match backends.offerings.get(offering_id) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(Nack::missing(
            ".message.order.items[0].id",
            format!("offering {offering_id} not found"),
        )),
        Err(err) => Err(Nack::internal(err.to_string())),
    }
}

fn ensure_vacancy(backends: &Backends, offering_id: &str) -> Result<(), Nack> {
    let available = backends
        .ledger
        .available(offering_id)
        .map_err(|err| Nack::internal(err.to_string()))?;
    if available == 0 {
        return Err(Nack::exhausted(
            ".message.order.items[0].id",
            format!("no vacancies left for offering {offering_id}"),
        ));
    }
    Ok(())
}
