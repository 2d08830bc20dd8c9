use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use onest_adapter::error::AppError;
use onest_adapter::outbox::TaskRecord;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub(crate) struct DeadLetterView {
    pub(crate) task_id: String,
    pub(crate) action: String,
    pub(crate) transaction_id: String,
    pub(crate) attempts: u32,
    pub(crate) last_error: Option<String>,
    pub(crate) updated_at: chrono::DateTime<Utc>,
}

impl From<&TaskRecord> for DeadLetterView {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id.to_string(),
            action: record.task.kind().to_string(),
            transaction_id: record.task.context().transaction_id.clone(),
            attempts: record.attempts,
            last_error: record.last_error.clone(),
            updated_at: record.updated_at,
        }
    }
}

/// Health, readiness, metrics, and outbox inspection on top of the protocol routes.
pub(crate) fn with_operational_routes(router: Router) -> Router {
    router
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/outbox/dead-letters", get(dead_letters_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn dead_letters_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Response, AppError> {
    let Some(outbox) = state.outbox else {
        let body = Json(json!({ "error": "this process runs no outbox" }));
        return Ok((StatusCode::NOT_FOUND, body).into_response());
    };

    let records = outbox.dead_letters()?;
    let views: Vec<DeadLetterView> = records.iter().map(DeadLetterView::from).collect();
    Ok(Json(json!({
        "as_of": Utc::now(),
        "count": views.len(),
        "dead_letters": views,
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use onest_adapter::network::{Request as ProtocolRequest, SearchMessage};
    use onest_adapter::outbox::{ProtocolTask, TaskOutbox};
    use onest_adapter::storage::InMemoryTaskOutbox;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state(outbox: Option<Arc<dyn TaskOutbox>>) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(recorder.handle()),
            outbox,
        }
    }

    async fn get_json(app: Router, path: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get(path).body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let state = state(None);
        let app = with_operational_routes(Router::new()).layer(Extension(state.clone()));

        let (status, body) = get_json(app.clone(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "initializing");

        state.readiness.store(true, Ordering::Release);
        let (status, _) = get_json(app, "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let app = with_operational_routes(Router::new()).layer(Extension(state(None)));
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn dead_letters_list_buried_tasks() {
        let outbox = InMemoryTaskOutbox::default();
        let mut request: ProtocolRequest<SearchMessage> = ProtocolRequest::default();
        request.context.transaction_id = "txn-dead".to_string();
        let id = outbox
            .enqueue(ProtocolTask::Search { request }, Utc::now())
            .expect("enqueue");
        outbox
            .dead_letter(&id, "callback endpoint answered 503".to_string(), Utc::now())
            .expect("bury");

        let app = with_operational_routes(Router::new())
            .layer(Extension(state(Some(Arc::new(outbox)))));
        let (status, body) = get_json(app, "/api/v1/outbox/dead-letters").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["dead_letters"][0]["action"], "search");
        assert_eq!(body["dead_letters"][0]["transaction_id"], "txn-dead");
    }

    #[tokio::test]
    async fn seeker_role_has_no_dead_letters_route_data() {
        let app = with_operational_routes(Router::new()).layer(Extension(state(None)));
        let (status, _) = get_json(app, "/api/v1/outbox/dead-letters").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
