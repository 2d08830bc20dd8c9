use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::domain::Offering;
use super::repository::OfferingError;
use super::OfferingCatalog;

/// Admin endpoints for publishing and reading offerings.
pub fn offering_router(catalog: Arc<OfferingCatalog>) -> Router {
    Router::new()
        .route("/api/v1/offerings", post(register_handler))
        .route("/api/v1/offerings/{offering_id}", get(fetch_handler))
        .with_state(catalog)
}

pub(crate) async fn register_handler(
    State(catalog): State<Arc<OfferingCatalog>>,
    Json(offering): Json<Offering>,
) -> Response {
    match catalog.register(offering) {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(err) => {
            let status = match err {
                OfferingError::InvalidCriteria(_) => StatusCode::UNPROCESSABLE_ENTITY,
                OfferingError::Duplicate(_) => StatusCode::CONFLICT,
                OfferingError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

pub(crate) async fn fetch_handler(
    State(catalog): State<Arc<OfferingCatalog>>,
    Path(offering_id): Path<String>,
) -> Response {
    match catalog.get(&offering_id) {
        Ok(Some(offering)) => (StatusCode::OK, Json(offering)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("offering {offering_id} not found") })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
