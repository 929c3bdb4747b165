use garde::Validate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Status reported by `POST /analyze` for a freshly accepted job.
pub const ACCEPTED_STATUS: &str = "in_progress";

/// Body of `POST /analyze`.
#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    /// Repository locator handed to the analysis tool.
    #[serde(alias = "reference", default, deserialize_with = "trimmed")]
    #[garde(length(min = 1, max = 2048))]
    pub github_url: Option<String>,
}

// Length limits apply to the reference without surrounding whitespace.
fn trimmed<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(|s| s.trim().to_string()))
}

/// Response after a job was accepted.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// Query string of `GET /status`.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub job_id: Option<String>,
}

/// Query string of `GET /download`.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub dir: Option<String>,
}
