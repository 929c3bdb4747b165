use std::sync::Arc;

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use repo_analyzer::app_state::AppState;
use repo_analyzer::config::AppConfig;
use repo_analyzer::routes::{self, metrics::MetricsState};
use repo_analyzer::services::runner::CommandRunner;

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

    tracing::info!("Initializing repo-analyzer server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    metrics::describe_counter!("analysis_jobs_total", "Total analysis jobs submitted");
    metrics::describe_counter!("analysis_jobs_completed", "Total analysis jobs completed");
    metrics::describe_counter!("analysis_jobs_failed", "Total analysis jobs that failed");
    metrics::describe_histogram!(
        "analysis_job_seconds",
        "Time from job start to its terminal state"
    );
    metrics::describe_gauge!("analysis_jobs_tracked", "Jobs held in memory");

    tracing::info!(base_dir = %config.base_dir.display(), "Preparing output directory");
    tokio::fs::create_dir_all(&config.base_dir)
        .await
        .expect("Failed to create base output directory");

    let runner = CommandRunner::new(config.analyzer_program.clone(), config.analyzer_args.clone());
    tracing::info!(
        program = %runner.program(),
        args = ?config.analyzer_args,
        "Using analysis command"
    );

    let state = AppState::new(Arc::new(runner), config.base_dir.clone());
    let metrics_state = MetricsState {
        handle: Arc::new(prometheus_handle),
        jobs: state.jobs.clone(),
    };

    let app = routes::router(state, config.max_body_bytes).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(metrics_state),
    );

    let addr = config.listen_addr();
    tracing::info!("Starting repo-analyzer on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.expect("Server error");
}
