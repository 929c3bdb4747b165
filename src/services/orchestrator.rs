use std::ffi::OsStr;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use uuid::Uuid;

use crate::models::job::{Job, JobStatus, JobView, PROGRESS_ANALYZED};
use crate::services::archiver::{ArchiveError, Archiver};
use crate::services::runner::{AnalysisRunner, RunnerError};
use crate::services::store::{JobStore, StoreError};

/// Creates analysis jobs, runs each one on its own background task and serves
/// their status and archives.
#[derive(Clone)]
pub struct JobOrchestrator {
    store: Arc<JobStore>,
    runner: Arc<dyn AnalysisRunner>,
    archiver: Archiver,
    base_dir: Arc<Path>,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<JobStore>,
        runner: Arc<dyn AnalysisRunner>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        let base_dir: PathBuf = base_dir.into();
        Self {
            store,
            runner,
            archiver: Archiver::new(),
            base_dir: Arc::from(base_dir),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Register a job for `reference` and start it in the background.
    ///
    /// Returns as soon as the job is recorded; must be called from within a
    /// tokio runtime.
    pub fn request_new_job(&self, reference: &str) -> Result<Uuid, JobError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(JobError::InvalidRequest("No repository reference provided".into()));
        }

        let id = Uuid::new_v4();
        let job = Job::new(id, reference).map_err(|e| JobError::InvalidRequest(e.to_string()))?;
        self.store.create(job)?;

        metrics::counter!("analysis_jobs_total").increment(1);
        metrics::gauge!("analysis_jobs_tracked").set(self.store.len() as f64);
        tracing::info!(job_id = %id, reference = %reference, "Analysis job accepted");

        let worker = self.clone();
        let reference = reference.to_string();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(worker.clone().execute(id, reference))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                worker.record_panic(id);
            }
        });

        Ok(id)
    }

    /// Sanitized view of one job.
    pub fn query_status(&self, job_id: Uuid) -> Result<JobView, JobError> {
        self.store
            .get(job_id)
            .map(|job| job.view())
            .ok_or_else(|| JobError::NotFound(format!("Job {job_id} not found")))
    }

    /// Archive bytes for a finished job.
    pub async fn fetch_artifact(&self, job_id: Uuid) -> Result<Vec<u8>, JobError> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(format!("Job {job_id} not found")))?;
        let output_dir = job
            .output_location()
            .cloned()
            .ok_or_else(|| JobError::NotFound(format!("Job {job_id} has no output yet")))?;

        self.read_archive(output_dir).await
    }

    /// Archive bytes for the output directory named by a download handle.
    ///
    /// Directories of jobs that are still in flight are not served, so a
    /// partial snapshot never lands on the archive path.
    pub async fn fetch_archive(&self, dir_name: &str) -> Result<Vec<u8>, JobError> {
        if !is_plain_name(dir_name) {
            return Err(JobError::InvalidRequest(format!(
                "Invalid download handle: {dir_name:?}"
            )));
        }

        if let Some(job) = Uuid::parse_str(dir_name).ok().and_then(|id| self.store.get(id)) {
            if job.status() != JobStatus::Done {
                return Err(JobError::NotFound(format!(
                    "Job {} is {}, no archive yet",
                    job.id(),
                    job.status()
                )));
            }
        }

        self.read_archive(self.base_dir.join(dir_name)).await
    }

    async fn read_archive(&self, output_dir: PathBuf) -> Result<Vec<u8>, JobError> {
        let archiver = self.archiver;
        let archive_path = tokio::task::spawn_blocking(move || {
            if !output_dir.is_dir() {
                return Err(JobError::NotFound(format!(
                    "Output directory {} not found",
                    output_dir.file_name().unwrap_or_default().to_string_lossy()
                )));
            }
            archiver.ensure(&output_dir).map_err(JobError::from)
        })
        .await
        .map_err(|e| JobError::Internal(format!("Archive task failed: {e}")))??;

        tokio::fs::read(&archive_path)
            .await
            .map_err(|e| JobError::IoFailure(format!("{}: {e}", archive_path.display())))
    }

    /// Body of the background task for one job. Every path ends with the job
    /// in a terminal state.
    async fn execute(self, id: Uuid, reference: String) {
        let start = Instant::now();

        if let Err(e) = self.store.update(id, |job| job.start()) {
            tracing::error!(job_id = %id, error = %e, "Failed to start job");
            return;
        }

        match self.process(id, &reference).await {
            Ok(()) => {
                metrics::counter!("analysis_jobs_completed").increment(1);
                tracing::info!(
                    job_id = %id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Analysis job completed"
                );
            }
            Err(e) => {
                metrics::counter!("analysis_jobs_failed").increment(1);
                tracing::warn!(job_id = %id, error = %e, "Analysis job failed");

                if let Err(store_err) = self.store.update(id, |job| job.fail(e.detail())) {
                    tracing::error!(
                        job_id = %id,
                        error = %store_err,
                        "Failed to record job failure"
                    );
                }
            }
        }

        metrics::histogram!("analysis_job_seconds").record(start.elapsed().as_secs_f64());
    }

    /// Terminal state for a job whose task panicked.
    fn record_panic(&self, id: Uuid) {
        metrics::counter!("analysis_jobs_failed").increment(1);
        tracing::error!(job_id = %id, "Analysis task panicked");

        if let Err(e) = self
            .store
            .update(id, |job| job.fail("analysis task panicked"))
        {
            tracing::error!(job_id = %id, error = %e, "Failed to record job failure");
        }
    }

    async fn process(&self, id: Uuid, reference: &str) -> Result<(), JobError> {
        let output_dir = self.base_dir.join(id.to_string());
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| JobError::IoFailure(format!("{}: {e}", output_dir.display())))?;

        self.runner.run(reference, &output_dir).await?;

        self.store
            .update(id, |job| job.record_progress(PROGRESS_ANALYZED))?;
        tracing::debug!(job_id = %id, "Analysis finished, packaging output");

        let archiver = self.archiver;
        let dir = output_dir.clone();
        tokio::task::spawn_blocking(move || archiver.archive(&dir))
            .await
            .map_err(|e| JobError::Internal(format!("Archive task failed: {e}")))??;

        let handle = download_url(&output_dir)?;
        self.store.update(id, |job| job.complete(output_dir, handle))?;
        Ok(())
    }
}

/// A single directory name: no separators, no `.`/`..`, nothing that
/// `Path` would normalize away.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
        && Path::new(name).file_name() == Some(OsStr::new(name))
}

/// `/download?dir=<name>` for an output directory.
pub fn download_url(output_dir: &Path) -> Result<String, JobError> {
    let name = output_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            JobError::Internal(format!("Output directory {} has no name", output_dir.display()))
        })?;
    Ok(format!("/download?dir={name}"))
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Analysis failed: {0}")]
    ExecutionFailure(String),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Text stored on a failed job. Tool diagnostics are kept verbatim.
    pub fn detail(&self) -> String {
        match self {
            JobError::ExecutionFailure(diagnostic) => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

impl From<RunnerError> for JobError {
    fn from(e: RunnerError) -> Self {
        JobError::ExecutionFailure(e.diagnostic())
    }
}

impl From<ArchiveError> for JobError {
    fn from(e: ArchiveError) -> Self {
        if e.is_not_found() {
            JobError::NotFound(e.to_string())
        } else {
            JobError::IoFailure(e.to_string())
        }
    }
}

impl From<StoreError> for JobError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => JobError::NotFound(format!("Job {id} not found")),
            other => JobError::Internal(other.to_string()),
        }
    }
}
