use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ApplicationId, ApplicationStatus};
use super::repository::RepositoryError;
use super::service::{ApplicationService, ApplicationServiceError};

/// Body accepted by the status update route.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ApplicationStatus,
}

/// Provider admin endpoints for confirmed applications.
pub fn application_router(service: Arc<ApplicationService>) -> Router {
    Router::new()
        .route("/api/v1/applications/{application_id}", get(fetch_handler))
        .route(
            "/api/v1/applications/{application_id}/status",
            put(update_status_handler),
        )
        .with_state(service)
}

pub(crate) async fn fetch_handler(
    State(service): State<Arc<ApplicationService>>,
    Path(application_id): Path<String>,
) -> Response {
    match service.get(&ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_status_handler(
    State(service): State<Arc<ApplicationService>>,
    Path(application_id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Response {
    match service.update_status(&ApplicationId(application_id), request.status) {
        Ok(update) => {
            let payload = json!({
                "application": update.record.view(),
                "previous_status": update.previous,
                "vacancy_released": update.vacancy_released,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn error_response(err: ApplicationServiceError) -> Response {
    let status = match &err {
        ApplicationServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ApplicationServiceError::Repository(RepositoryError::InvalidTransition { .. }) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
