use std::sync::Arc;

use crate::services::orchestrator::JobOrchestrator;
use crate::services::runner::AnalysisRunner;
use crate::services::store::JobStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobOrchestrator,
}

impl AppState {
    pub fn new(runner: Arc<dyn AnalysisRunner>, base_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            jobs: JobOrchestrator::new(Arc::new(JobStore::new()), runner, base_dir),
        }
    }
}
