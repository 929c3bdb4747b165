use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;

use super::ApiError;
use crate::app_state::AppState;
use crate::models::analysis::DownloadQuery;
use crate::services::archiver::ARCHIVE_EXTENSION;

/// GET /download?dir=<name> — archive of a job's output directory.
pub async fn download_archive(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let dir = query
        .dir
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing dir"))?;

    let bytes = state.jobs.fetch_archive(&dir).await?;
    tracing::info!(dir = %dir, bytes = bytes.len(), "Serving archive");

    Ok((
        [
            (header::CONTENT_TYPE, "application/gzip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{dir}.{ARCHIVE_EXTENSION}\""),
            ),
        ],
        bytes,
    ))
}
