//! Shared helpers for the HTTP-level tests

#![allow(dead_code)]

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use flate2::read::GzDecoder;
use tower::ServiceExt;

use repo_analyzer::app_state::AppState;
use repo_analyzer::routes;
use repo_analyzer::services::runner::{AnalysisRunner, RunnerError};

/// Stand-in for the analysis tool.
///
/// References containing `fail` exit with a diagnostic; everything else writes
/// a small documentation tree into the output directory.
pub struct FakeAnalyzer {
    pub delay: Duration,
}

#[async_trait]
impl AnalysisRunner for FakeAnalyzer {
    async fn run(&self, reference: &str, output_dir: &Path) -> Result<(), RunnerError> {
        tokio::time::sleep(self.delay).await;
        if reference.contains("fail") {
            return Err(RunnerError::Failed {
                code: Some(2),
                diagnostic: format!("error: could not clone {reference}"),
            });
        }
        let io = |e: std::io::Error| RunnerError::Failed {
            code: None,
            diagnostic: e.to_string(),
        };
        tokio::fs::create_dir_all(output_dir.join("modules"))
            .await
            .map_err(io)?;
        tokio::fs::write(output_dir.join("README.md"), format!("# {reference}\n"))
            .await
            .map_err(io)?;
        tokio::fs::write(output_dir.join("modules/index.md"), "modules\n")
            .await
            .map_err(io)?;
        Ok(())
    }
}

pub fn app_with_runner(base_dir: &Path, runner: Arc<dyn AnalysisRunner>) -> Router {
    routes::router(AppState::new(runner, base_dir), 1024 * 1024)
}

pub fn test_app(base_dir: &Path) -> Router {
    app_with_runner(
        base_dir,
        Arc::new(FakeAnalyzer {
            delay: Duration::from_millis(30),
        }),
    )
}

/// Send one request and return status plus raw body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

/// Poll `/status` until the job is `done` or `error`, collecting every status
/// observed along the way.
pub async fn poll_until_terminal(app: &Router, job_id: &str) -> (serde_json::Value, Vec<String>) {
    let mut seen = Vec::new();
    for _ in 0..500 {
        let (status, body) = get_json(app, &format!("/status?job_id={job_id}")).await;
        assert_eq!(status, StatusCode::OK, "status query failed: {body}");

        let current = body["status"].as_str().unwrap().to_string();
        if seen.last() != Some(&current) {
            seen.push(current.clone());
        }
        if current == "done" || current == "error" {
            return (body, seen);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}

/// File names inside a `.tar.gz` archive, with their contents.
pub fn archive_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (name, data)
        })
        .collect()
}
