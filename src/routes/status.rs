use axum::extract::{Query, State};
use axum::Json;
use uuid::Uuid;

use super::ApiError;
use crate::app_state::AppState;
use crate::models::analysis::StatusQuery;
use crate::models::job::JobView;

const INVALID_JOB_ID: &str = "Invalid or missing job_id";

/// GET /status?job_id=<id> — current state of a job.
///
/// Unknown ids are a client error rather than a 404, same as a malformed one.
pub async fn get_job_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<JobView>, ApiError> {
    let job_id = query
        .job_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| ApiError::bad_request(INVALID_JOB_ID))?;

    state
        .jobs
        .query_status(job_id)
        .map(Json)
        .map_err(|_| ApiError::bad_request(INVALID_JOB_ID))
}
