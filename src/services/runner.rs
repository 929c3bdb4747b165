use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

/// Runs the repository analysis for one job.
///
/// Implementations block the calling task until the analysis is over and
/// leave the produced artifacts in `output_dir`.
#[async_trait]
pub trait AnalysisRunner: Send + Sync {
    async fn run(&self, reference: &str, output_dir: &Path) -> Result<(), RunnerError>;
}

/// Invokes the external analysis tool as
/// `<program> [args...] --repo <reference> -o <output_dir>`.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, reference: &str, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--repo")
            .arg(reference)
            .arg("-o")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AnalysisRunner for CommandRunner {
    async fn run(&self, reference: &str, output_dir: &Path) -> Result<(), RunnerError> {
        let start = Instant::now();
        tracing::info!(
            program = %self.program,
            reference = %reference,
            output_dir = %output_dir.display(),
            "Starting analysis command"
        );

        let output = self
            .command(reference, output_dir)
            .output()
            .await
            .map_err(|source| RunnerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(stdout = %stdout.trim_end(), "Analysis command output");
        }

        if output.status.success() {
            tracing::info!(
                duration_ms = start.elapsed().as_millis() as u64,
                "Analysis command finished"
            );
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostic = if stderr.trim().is_empty() {
            format!("analysis command exited with {}", output.status)
        } else {
            stderr.trim().to_string()
        };

        tracing::warn!(
            status = %output.status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis command failed"
        );

        Err(RunnerError::Failed {
            code: output.status.code(),
            diagnostic,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{diagnostic}")]
    Failed { code: Option<i32>, diagnostic: String },
}

impl RunnerError {
    /// Text recorded on the failed job.
    pub fn diagnostic(&self) -> String {
        match self {
            RunnerError::Failed { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn script(body: &str) -> CommandRunner {
        // `sh -c <body> analyzer --repo <ref> -o <dir>` puts the repo in $2
        // and the output directory in $4.
        CommandRunner::new("sh", vec!["-c".into(), body.into(), "analyzer".into()])
    }

    #[tokio::test]
    async fn test_success_populates_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("job");
        let runner = script(r#"mkdir -p "$4" && printf '%s' "$2" > "$4/REPO.md""#);

        tokio_test::assert_ok!(runner.run("https://github.com/tokio-rs/axum", &out).await);

        let written = std::fs::read_to_string(out.join("REPO.md")).unwrap();
        assert_eq!(written, "https://github.com/tokio-rs/axum");
    }

    #[tokio::test]
    async fn test_nonzero_exit_captures_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = script("echo 'fatal: repository not found' >&2; exit 3");

        let err = runner.run("bad", tmp.path()).await.unwrap_err();
        match &err {
            RunnerError::Failed { code, diagnostic } => {
                assert_eq!(*code, Some(3));
                assert_eq!(diagnostic, "fatal: repository not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.diagnostic(), "fatal: repository not found");
    }

    #[tokio::test]
    async fn test_silent_failure_still_has_diagnostic() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = script("exit 1");

        let err = runner.run("repo", tmp.path()).await.unwrap_err();
        assert!(err.diagnostic().contains("exited with"));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new("definitely-not-an-analyzer-binary", vec![]);

        let err = runner.run("repo", tmp.path()).await.unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
        assert!(!err.diagnostic().is_empty());
    }
}
