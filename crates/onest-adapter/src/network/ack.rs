use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AckStatus {
    Ack,
    Nack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    pub ack: Ack,
}

/// Error triple carried by a NACK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NackError {
    pub code: String,
    #[serde(default)]
    pub paths: String,
    #[serde(default)]
    pub message: String,
}

/// Synchronous reply to an inbound action or callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub message: AckMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NackError>,
}

impl AckResponse {
    pub fn ack() -> Self {
        Self {
            message: AckMessage {
                ack: Ack {
                    status: AckStatus::Ack,
                },
            },
            error: None,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.message.ack.status == AckStatus::Ack
    }
}

/// NACK codes used on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NackCode {
    /// Body is not valid JSON or does not fit the action schema.
    ParseError,
    /// A required field is missing or refers to something that does not exist.
    MissingField,
    /// The task could not be recorded for processing.
    Internal,
    /// No vacancies left.
    ResourceExhausted,
}

impl NackCode {
    pub fn as_str(self) -> &'static str {
        match self {
            NackCode::ParseError => "10000",
            NackCode::MissingField => "30004",
            NackCode::Internal => "31001",
            NackCode::ResourceExhausted => "40002",
        }
    }
}

impl fmt::Display for NackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected action, produced during synchronous validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} {message}")]
pub struct Nack {
    pub code: NackCode,
    pub path: Option<String>,
    pub message: String,
}

impl Nack {
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            code: NackCode::ParseError,
            path: None,
            message: message.into(),
        }
    }

    pub fn missing(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: NackCode::MissingField,
            path: Some(path.into()),
            message: message.into(),
        }
    }

    pub fn exhausted(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: NackCode::ResourceExhausted,
            path: Some(path.into()),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: NackCode::Internal,
            path: None,
            message: message.into(),
        }
    }

    pub fn into_ack_response(self) -> AckResponse {
        AckResponse {
            message: AckMessage {
                ack: Ack {
                    status: AckStatus::Nack,
                },
            },
            error: Some(NackError {
                code: self.code.as_str().to_string(),
                paths: self.path.unwrap_or_default(),
                message: self.message,
            }),
        }
    }
}

/// `500` for internal failures, `400` for everything the caller got wrong.
impl IntoResponse for Nack {
    fn into_response(self) -> Response {
        let status = match self.code {
            NackCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(self.into_ack_response())).into_response()
    }
}

impl IntoResponse for AckResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
