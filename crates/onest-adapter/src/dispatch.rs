//! Outbound delivery of `on_*` callbacks to the counterparty.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::network::{ActionKind, AckResponse, NackError, Request};

/// A fully built callback, ready to post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callback {
    pub url: String,
    pub action: ActionKind,
    pub body: Request<Value>,
}

impl Callback {
    /// Target `{base}/on_<action>`, tolerating a trailing slash on `base`.
    pub fn target(base: &str, action: ActionKind) -> String {
        format!("{}/{}", base.trim_end_matches('/'), action.callback())
    }
}

/// How the counterparty answered a delivered callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acknowledged,
    Rejected(NackError),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("callback transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("callback endpoint answered {status}: {body}")]
    Status { status: u16, body: String },
}

/// Posts callbacks. Implementations must not retry; the task runner owns retries.
#[async_trait]
pub trait CallbackDispatcher: Send + Sync {
    async fn deliver(&self, callback: &Callback) -> Result<DeliveryOutcome, DispatchError>;
}

/// reqwest-backed dispatcher with a bounded request timeout.
#[derive(Clone)]
pub struct HttpCallbackDispatcher {
    client: reqwest::Client,
}

impl HttpCallbackDispatcher {
    pub fn new(timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CallbackDispatcher for HttpCallbackDispatcher {
    async fn deliver(&self, callback: &Callback) -> Result<DeliveryOutcome, DispatchError> {
        let response = self
            .client
            .post(&callback.url)
            .json(&callback.body)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(url = %callback.url, status = status.as_u16(), "callback delivered");

        interpret(status.as_u16(), status.is_success(), &body)
    }
}

// A parseable ACK/NACK envelope wins over the status line; counterparties NACK with 4xx.
fn interpret(status: u16, success: bool, body: &str) -> Result<DeliveryOutcome, DispatchError> {
    if let Ok(reply) = serde_json::from_str::<AckResponse>(body) {
        if reply.is_ack() {
            return Ok(DeliveryOutcome::Acknowledged);
        }
        let error = reply.error.unwrap_or(NackError {
            code: String::new(),
            paths: String::new(),
            message: "NACK without error block".to_string(),
        });
        return Ok(DeliveryOutcome::Rejected(error));
    }

    if success {
        return Ok(DeliveryOutcome::Acknowledged);
    }

    Err(DispatchError::Status {
        status,
        body: body.chars().take(512).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_joins_without_double_slash() {
        assert_eq!(
            Callback::target("http://bap.example/protocol/", ActionKind::Cancel),
            "http://bap.example/protocol/on_cancel"
        );
    }

    #[test]
    fn nack_body_is_a_rejection_even_with_error_status() {
        let body = r#"{"message":{"ack":{"status":"NACK"}},"error":{"code":"30004","paths":"","message":"unknown transaction"}}"#;
        let outcome = interpret(400, false, body).expect("interpreted");
        assert!(matches!(outcome, DeliveryOutcome::Rejected(ref err) if err.code == "30004"));
    }

    #[test]
    fn bare_success_counts_as_acknowledged() {
        assert!(matches!(
            interpret(204, true, ""),
            Ok(DeliveryOutcome::Acknowledged)
        ));
    }

    #[test]
    fn server_error_without_envelope_is_retryable() {
        let err = interpret(503, false, "upstream down").expect_err("fails");
        assert!(matches!(err, DispatchError::Status { status: 503, .. }));
    }
}
