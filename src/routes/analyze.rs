use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use garde::Validate;

use super::ApiError;
use crate::app_state::AppState;
use crate::models::analysis::{AnalyzeRequest, AnalyzeResponse, ACCEPTED_STATUS};

/// POST /analyze — start analyzing a repository in the background.
pub async fn submit_analysis(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let reference = request
        .github_url
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("No GitHub URL provided"))?;

    let job_id = state.jobs.request_new_job(reference)?;

    Ok(Json(AnalyzeResponse {
        job_id,
        status: ACCEPTED_STATUS.to_string(),
    }))
}
