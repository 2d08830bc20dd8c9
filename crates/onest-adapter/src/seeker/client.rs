//! Seeker-side (BAP) sender for the six protocol actions.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::NetworkConfig;
use crate::network::{AckResponse, ActionKind, Context, Request};

const REQUEST_TTL: &str = "PT30S";

/// What a caller asks the seeker to send.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutboundAction {
    /// Continue an existing negotiation; a fresh id is minted when absent.
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub bpp_id: Option<String>,
    #[serde(default)]
    pub bpp_uri: Option<String>,
    #[serde(default)]
    pub message: Value,
}

/// The synchronous half of an exchange. The `on_*` callback arrives in the inbox later.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentAction {
    pub transaction_id: String,
    pub message_id: String,
    pub url: String,
    pub response: AckResponse,
}

#[derive(Debug, thiserror::Error)]
pub enum SeekerError {
    #[error("provider transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider reply was not an ACK envelope: {0}")]
    MalformedReply(String),
}

/// Builds request envelopes stamped with the seeker identity and posts them to a provider.
#[derive(Clone)]
pub struct SeekerClient {
    client: reqwest::Client,
    network: NetworkConfig,
    clock: Arc<dyn Clock>,
}

impl SeekerClient {
    pub fn new(
        network: NetworkConfig,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SeekerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;
        Ok(Self::with_client(client, network, clock))
    }

    pub fn with_client(
        client: reqwest::Client,
        network: NetworkConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            network,
            clock,
        }
    }

    /// Envelope for `kind`. Search is a broadcast, so it names no provider unless asked to.
    pub fn envelope(&self, kind: ActionKind, outbound: &OutboundAction) -> Request<Value> {
        let transaction_id = outbound
            .transaction_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (bpp_id, bpp_uri) = match (kind, &outbound.bpp_id, &outbound.bpp_uri) {
            (ActionKind::Search, None, None) => (String::new(), String::new()),
            (_, id, uri) => (
                id.clone().unwrap_or_else(|| self.network.bpp_id.clone()),
                uri.clone().unwrap_or_else(|| self.network.bpp_uri.clone()),
            ),
        };

        Request {
            context: Context {
                domain: self.network.domain.clone(),
                action: kind.as_str().to_string(),
                version: self.network.version.clone(),
                transaction_id,
                message_id: Uuid::new_v4().to_string(),
                bap_id: self.network.bap_id.clone(),
                bap_uri: self.network.bap_uri.clone(),
                bpp_id,
                bpp_uri,
                location: None,
                timestamp: self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
                ttl: REQUEST_TTL.to_string(),
            },
            message: outbound.message.clone(),
        }
    }

    pub async fn send(
        &self,
        kind: ActionKind,
        outbound: OutboundAction,
    ) -> Result<SentAction, SeekerError> {
        let envelope = self.envelope(kind, &outbound);
        let base = outbound.bpp_uri.as_deref().unwrap_or(&self.network.bpp_uri);
        let url = format!("{}/{}", base.trim_end_matches('/'), kind.as_str());

        let response = self.client.post(&url).json(&envelope).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%url, status = status.as_u16(), "action posted");

        let reply = match serde_json::from_str::<AckResponse>(&body) {
            Ok(reply) => reply,
            Err(_) if status.is_success() => {
                return Err(SeekerError::MalformedReply(body.chars().take(512).collect()))
            }
            Err(_) => {
                return Err(SeekerError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(512).collect(),
                })
            }
        };

        let transaction_id = envelope.context.transaction_id;
        if let Some(error) = reply.error.as_ref().filter(|_| !reply.is_ack()) {
            warn!(action = %kind, %transaction_id, code = %error.code, "provider refused action");
        } else {
            info!(action = %kind, %transaction_id, "provider acknowledged action");
        }

        Ok(SentAction {
            transaction_id,
            message_id: envelope.context.message_id,
            url,
            response: reply,
        })
    }
}

/// Mounts `POST /api/v1/seeker/{action}` for sending actions to a provider.
pub fn seeker_client_router(client: Arc<SeekerClient>) -> Router {
    Router::new()
        .route("/api/v1/seeker/{action}", post(send_handler))
        .with_state(client)
}

async fn send_handler(
    State(client): State<Arc<SeekerClient>>,
    Path(action): Path<String>,
    Json(outbound): Json<OutboundAction>,
) -> Response {
    let Some(kind) = ActionKind::from_name(&action) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown action {action}") })),
        )
            .into_response();
    };

    match client.send(kind, outbound).await {
        Ok(sent) => (StatusCode::OK, Json(sent)).into_response(),
        Err(err) => {
            warn!(action = %kind, error = %err, "could not reach provider");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
