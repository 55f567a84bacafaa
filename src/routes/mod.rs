pub mod error;
pub mod health;
pub mod process;
pub mod work;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

const API_TXT: &str = include_str!("../../static/api.txt");

/// Build the full HTTP surface. `/metrics` is mounted only when a Prometheus
/// recorder has been installed.
pub fn router(state: AppState, prometheus: Option<Arc<PrometheusHandle>>) -> Router {
    let body_limit = state.config.max_body_bytes;

    let mut app = Router::new()
        .route("/api.txt", get(|| async { API_TXT }))
        .route("/health", get(health::health_check))
        // Submission
        .route("/process-urls", post(process::process_urls))
        .route("/process-upload", post(process::process_upload))
        .route("/process-bytes", post(process::process_bytes))
        // Polling and results
        .route("/work/{id}/done", get(work::poll))
        .route("/work/{id}/error", get(work::poll))
        .route("/work/{id}/status", get(work::status))
        .route("/work/{id}/filenames", get(work::filenames))
        .route("/work/{id}/results/{filename}", get(work::result_image))
        .route("/work/{id}/results/box/{filename}", get(work::result_box))
        .with_state(state);

    if let Some(handle) = prometheus {
        app = app.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(body_limit))
}
