use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use weld_inspect::app_state::AppState;
use weld_inspect::config::AppConfig;
use weld_inspect::routes;
use weld_inspect::services::detector::HttpDetector;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing weld-inspect server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("jobs_submitted_total", "Total jobs accepted");
    metrics::describe_counter!("jobs_completed_total", "Total jobs that reached done");
    metrics::describe_counter!("jobs_failed_total", "Total jobs that reached error");
    metrics::describe_counter!(
        "jobs_rejected_total",
        "Submissions refused because the job queue was full"
    );
    metrics::describe_histogram!(
        "job_processing_seconds",
        "Time from run slot acquisition to terminal marker"
    );
    metrics::describe_gauge!("jobs_in_flight", "Jobs currently executing the pipeline");

    tracing::info!(
        url = %config.detector_url,
        concurrency = config.detector_concurrency,
        "Initializing detector client"
    );
    let detector = HttpDetector::new(
        &config.detector_url,
        config.detector_token.as_deref(),
        config.detector_timeout(),
    )
    .expect("Failed to initialize detector client");

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, Arc::new(detector)).expect("Failed to initialize job controller");

    // Shared root of all job workspaces; an existing directory is reused.
    tracing::info!(work_dir = %state.workspaces().path().display(), "Preparing work directory");
    state
        .workspaces()
        .init()
        .await
        .expect("Failed to create work directory");

    let app = routes::router(state, Some(prometheus_handle));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
