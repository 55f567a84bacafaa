use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::JobRecord;

/// Body of `POST /process-urls`.
#[derive(Debug, Deserialize, Validate)]
pub struct ProcessUrlsRequest {
    #[garde(length(min = 1), inner(url))]
    pub urls: Vec<String>,
}

/// Error body returned when a submission is refused.
#[derive(Debug, Serialize)]
pub struct SubmitErrorResponse {
    pub error: String,
    pub message: String,
}

/// Response of `GET /work/{id}/status`.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub terminal: bool,
    #[serde(flatten)]
    pub record: JobRecord,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            terminal: record.state.is_terminal(),
            record,
        }
    }
}
