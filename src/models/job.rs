use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Progress value recorded when a job starts running.
pub const PROGRESS_STARTED: i32 = 0;
/// Progress checkpoint once the analysis finished and packaging is pending.
pub const PROGRESS_ANALYZED: i32 = 50;
/// Progress value of a finished job.
pub const PROGRESS_DONE: i32 = 100;
/// Sentinel progress of a failed job.
pub const PROGRESS_FAILED: i32 = -1;

/// Status of a repository analysis job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    /// `done` and `error` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// A rejected state change on a [`Job`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Job is already {0}")]
    Terminal(JobStatus),

    #[error("Job has not started running")]
    NotRunning,

    #[error("Progress cannot move from {from} back to {to}")]
    ProgressRegression { from: i32, to: i32 },

    #[error("Progress {0} is outside 0..=100")]
    ProgressOutOfRange(i32),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// A repository analysis job.
///
/// Fields are private so every change goes through the transition methods,
/// which keep the status, progress, output and error consistent.
#[derive(Debug, Clone)]
pub struct Job {
    id: Uuid,
    reference: String,
    status: JobStatus,
    progress: i32,
    output_location: Option<PathBuf>,
    download_url: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Job {
    /// A freshly submitted job: `pending` with progress 0.
    pub fn new(id: Uuid, reference: impl Into<String>) -> Result<Self, TransitionError> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(TransitionError::Empty("reference"));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            reference,
            status: JobStatus::Pending,
            progress: PROGRESS_STARTED,
            output_location: None,
            download_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn output_location(&self) -> Option<&PathBuf> {
        self.output_location.as_ref()
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn ensure_open(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal(self.status));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// `pending -> running`, progress reset to the start checkpoint.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.ensure_open()?;
        self.status = JobStatus::Running;
        self.progress = self.progress.max(PROGRESS_STARTED);
        self.touch();
        Ok(())
    }

    /// Record progress of a running job. Progress never goes backwards.
    pub fn record_progress(&mut self, progress: i32) -> Result<(), TransitionError> {
        self.ensure_open()?;
        if self.status != JobStatus::Running {
            return Err(TransitionError::NotRunning);
        }
        if !(PROGRESS_STARTED..=PROGRESS_DONE).contains(&progress) {
            return Err(TransitionError::ProgressOutOfRange(progress));
        }
        if progress < self.progress {
            return Err(TransitionError::ProgressRegression {
                from: self.progress,
                to: progress,
            });
        }
        self.progress = progress;
        self.touch();
        Ok(())
    }

    /// `running -> done` with the packaged output and its download handle.
    pub fn complete(
        &mut self,
        output_location: PathBuf,
        download_url: String,
    ) -> Result<(), TransitionError> {
        self.ensure_open()?;
        if self.status != JobStatus::Running {
            return Err(TransitionError::NotRunning);
        }
        if output_location.as_os_str().is_empty() {
            return Err(TransitionError::Empty("output location"));
        }
        if download_url.is_empty() {
            return Err(TransitionError::Empty("download url"));
        }
        self.status = JobStatus::Done;
        self.progress = PROGRESS_DONE;
        self.output_location = Some(output_location);
        self.download_url = Some(download_url);
        self.touch();
        Ok(())
    }

    /// Any non-terminal state `-> error`. The diagnostic must carry text.
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_open()?;
        let detail = detail.into();
        if detail.trim().is_empty() {
            return Err(TransitionError::Empty("error detail"));
        }
        self.status = JobStatus::Error;
        self.progress = PROGRESS_FAILED;
        self.error = Some(detail);
        self.touch();
        Ok(())
    }

    /// Sanitized snapshot for callers; never carries the output location.
    pub fn view(&self) -> JobView {
        JobView {
            job_id: self.id,
            status: self.status,
            progress: self.progress,
            error: self.error.clone(),
            download_url: self.download_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// What `GET /status` reports about a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: i32,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_job() -> Job {
        let mut job = Job::new(Uuid::new_v4(), "https://github.com/rust-lang/log").unwrap();
        job.start().unwrap();
        job
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new(Uuid::new_v4(), "https://github.com/tokio-rs/tokio").unwrap();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.progress(), 0);
        assert!(job.output_location().is_none());
        assert!(job.error().is_none());
    }

    #[test]
    fn test_new_job_rejects_blank_reference() {
        assert_eq!(
            Job::new(Uuid::new_v4(), "   ").unwrap_err(),
            TransitionError::Empty("reference")
        );
    }

    #[test]
    fn test_complete_sets_output_and_progress() {
        let mut job = running_job();
        job.record_progress(PROGRESS_ANALYZED).unwrap();
        job.complete(PathBuf::from("/tmp/docs/abc"), "/download?dir=abc".into())
            .unwrap();

        assert_eq!(job.status(), JobStatus::Done);
        assert_eq!(job.progress(), PROGRESS_DONE);
        assert_eq!(job.download_url(), Some("/download?dir=abc"));
        assert!(job.error().is_none());
    }

    #[test]
    fn test_fail_sets_sentinel() {
        let mut job = running_job();
        job.fail("fatal: repository not found").unwrap();

        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(job.progress(), PROGRESS_FAILED);
        assert_eq!(job.error(), Some("fatal: repository not found"));
        assert!(job.output_location().is_none());
    }

    #[test]
    fn test_fail_requires_detail() {
        let mut job = running_job();
        assert_eq!(job.fail(""), Err(TransitionError::Empty("error detail")));
        assert_eq!(job.status(), JobStatus::Running);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut done = running_job();
        done.complete(PathBuf::from("/tmp/x"), "/download?dir=x".into())
            .unwrap();
        assert_eq!(done.fail("late"), Err(TransitionError::Terminal(JobStatus::Done)));
        assert_eq!(done.start(), Err(TransitionError::Terminal(JobStatus::Done)));

        let mut failed = running_job();
        failed.fail("boom").unwrap();
        assert_eq!(
            failed.complete(PathBuf::from("/tmp/x"), "/download?dir=x".into()),
            Err(TransitionError::Terminal(JobStatus::Error))
        );
        assert_eq!(failed.progress(), PROGRESS_FAILED);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = running_job();
        job.record_progress(PROGRESS_ANALYZED).unwrap();
        assert_eq!(
            job.record_progress(10),
            Err(TransitionError::ProgressRegression { from: 50, to: 10 })
        );
        assert_eq!(
            job.record_progress(101),
            Err(TransitionError::ProgressOutOfRange(101))
        );
        assert_eq!(job.progress(), PROGRESS_ANALYZED);
    }

    #[test]
    fn test_pending_job_cannot_complete() {
        let mut job = Job::new(Uuid::new_v4(), "repo").unwrap();
        assert_eq!(
            job.complete(PathBuf::from("/tmp/x"), "/download?dir=x".into()),
            Err(TransitionError::NotRunning)
        );
    }

    #[test]
    fn test_view_hides_output_location() {
        let mut job = running_job();
        job.complete(PathBuf::from("/srv/docs/secret"), "/download?dir=secret".into())
            .unwrap();

        let json = serde_json::to_string(&job.view()).unwrap();
        assert!(!json.contains("/srv/docs"));
        assert!(json.contains("\"status\":\"done\""));
        assert!(json.contains("\"download_url\":\"/download?dir=secret\""));
    }

    #[test]
    fn test_status_string_forms() {
        assert_eq!(JobStatus::Running.to_string(), "running");
        assert_eq!("error".parse::<JobStatus>().unwrap(), JobStatus::Error);
    }
}
