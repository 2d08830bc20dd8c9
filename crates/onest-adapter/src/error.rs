use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::offerings::{OfferingError, OfferingImportError};
use crate::outbox::OutboxError;
use crate::seeker::SeekerError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Import(OfferingImportError),
    Catalog(OfferingError),
    Dispatch(DispatchError),
    Outbox(OutboxError),
    Seeker(SeekerError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Import(err) => write!(f, "offering import error: {}", err),
            AppError::Catalog(err) => write!(f, "offering catalog error: {}", err),
            AppError::Dispatch(err) => write!(f, "callback dispatcher error: {}", err),
            AppError::Outbox(err) => write!(f, "outbox error: {}", err),
            AppError::Seeker(err) => write!(f, "seeker client error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Dispatch(err) => Some(err),
            AppError::Outbox(err) => Some(err),
            AppError::Seeker(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Import(_) => StatusCode::BAD_REQUEST,
            AppError::Catalog(OfferingError::Duplicate(_)) => StatusCode::CONFLICT,
            AppError::Catalog(OfferingError::InvalidCriteria(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Catalog(_)
            | AppError::Dispatch(_)
            | AppError::Outbox(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Seeker(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<OfferingImportError> for AppError {
    fn from(value: OfferingImportError) -> Self {
        Self::Import(value)
    }
}

impl From<OfferingError> for AppError {
    fn from(value: OfferingError) -> Self {
        Self::Catalog(value)
    }
}

impl From<DispatchError> for AppError {
    fn from(value: DispatchError) -> Self {
        Self::Dispatch(value)
    }
}

impl From<OutboxError> for AppError {
    fn from(value: OutboxError) -> Self {
        Self::Outbox(value)
    }
}

impl From<SeekerError> for AppError {
    fn from(value: SeekerError) -> Self {
        Self::Seeker(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn renders_json_error_with_matching_status() {
        let response = AppError::from(OfferingError::Duplicate("job-1".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert!(body["error"]
            .as_str()
            .is_some_and(|message| message.starts_with("offering catalog error")));
    }

    #[test]
    fn exposes_the_underlying_source() {
        use std::error::Error;
        let err = AppError::from(ConfigError::InvalidPort);
        assert!(err.source().is_some());
    }
}
