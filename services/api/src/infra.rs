use axum::http::{HeaderValue, Method};
use metrics_exporter_prometheus::PrometheusHandle;
use onest_adapter::error::AppError;
use onest_adapter::offerings::{parse_offerings, Offering};
use onest_adapter::outbox::TaskOutbox;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Absent in the seeker role, which runs no outbox.
    pub(crate) outbox: Option<Arc<dyn TaskOutbox>>,
}

pub(crate) fn load_offerings(path: &Path) -> Result<Vec<Offering>, AppError> {
    let file = File::open(path)?;
    Ok(parse_offerings(file)?)
}

/// `None` when no origins are configured, so the service sends no CORS headers at all.
pub(crate) fn cors_layer(allowed_origins: &[String]) -> Option<CorsLayer> {
    if allowed_origins.is_empty() {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);
    if allowed_origins.iter().any(|origin| origin == "*") {
        return Some(layer.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    Some(layer.allow_origin(origins))
}
