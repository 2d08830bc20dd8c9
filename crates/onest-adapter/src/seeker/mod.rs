//! Seeker-side (BAP) half: posts actions to a provider and records its callbacks.

mod client;

pub use client::{seeker_client_router, OutboundAction, SeekerClient, SeekerError, SentAction};

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::network::{AckResponse, ActionKind, Nack, Request};

/// A callback as it arrived from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedCallback {
    pub action: ActionKind,
    pub received_at: DateTime<Utc>,
    pub envelope: Request<Value>,
}

pub trait CallbackInbox: Send + Sync {
    fn record(&self, callback: ReceivedCallback) -> Result<(), InboxError>;
    fn for_transaction(&self, transaction_id: &str) -> Result<Vec<ReceivedCallback>, InboxError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InboxError {
    #[error("callback inbox unavailable: {0}")]
    Unavailable(String),
}

/// Validates and records inbound `on_*` callbacks.
#[derive(Clone)]
pub struct SeekerInbox {
    inbox: Arc<dyn CallbackInbox>,
    clock: Arc<dyn Clock>,
}

impl SeekerInbox {
    pub fn new(inbox: Arc<dyn CallbackInbox>, clock: Arc<dyn Clock>) -> Self {
        Self { inbox, clock }
    }

    pub fn receive(&self, action: ActionKind, body: &[u8]) -> Result<(), Nack> {
        let envelope: Request<Value> = serde_json::from_slice(body).map_err(|err| {
            Nack::parse(format!("invalid {} callback: {err}", action.callback()))
        })?;

        if envelope.context.transaction_id.trim().is_empty() {
            return Err(Nack::missing(
                ".context.transaction_id",
                "transaction_id is required",
            ));
        }

        let transaction_id = envelope.context.transaction_id.clone();
        self.inbox
            .record(ReceivedCallback {
                action,
                received_at: self.clock.now(),
                envelope,
            })
            .map_err(|err| Nack::internal(err.to_string()))?;
        info!(callback = action.callback(), %transaction_id, "callback received");
        Ok(())
    }

    pub fn history(&self, transaction_id: &str) -> Result<Vec<ReceivedCallback>, InboxError> {
        self.inbox.for_transaction(transaction_id)
    }
}

/// Mounts `POST /on_<action>` for every action plus a history lookup.
pub fn seeker_router(inbox: Arc<SeekerInbox>) -> Router {
    let mut router = Router::new();
    for kind in ActionKind::ALL {
        let path = format!("/{}", kind.callback());
        router = router.route(
            &path,
            post(move |state: State<Arc<SeekerInbox>>, body: Bytes| {
                receive_handler(state, kind, body)
            }),
        );
    }

    router
        .route(
            "/api/v1/transactions/{transaction_id}/callbacks",
            get(history_handler),
        )
        .with_state(inbox)
}

async fn receive_handler(
    State(inbox): State<Arc<SeekerInbox>>,
    kind: ActionKind,
    body: Bytes,
) -> Response {
    match inbox.receive(kind, &body) {
        Ok(()) => AckResponse::ack().into_response(),
        Err(nack) => {
            warn!(
                callback = kind.callback(),
                code = %nack.code,
                message = %nack.message,
                "callback rejected"
            );
            nack.into_response()
        }
    }
}

async fn history_handler(
    State(inbox): State<Arc<SeekerInbox>>,
    Path(transaction_id): Path<String>,
) -> Response {
    match inbox.history(&transaction_id) {
        Ok(callbacks) => (
            StatusCode::OK,
            Json(json!({ "transaction_id": transaction_id, "callbacks": callbacks })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
