use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::services::orchestrator::JobOrchestrator;

/// State of the scrape endpoint, kept apart from the job API state.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: Arc<PrometheusHandle>,
    pub jobs: JobOrchestrator,
}

/// GET /metrics — Prometheus text exposition format.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    metrics::gauge!("analysis_jobs_tracked").set(state.jobs.store().len() as f64);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.handle.render(),
    )
}
