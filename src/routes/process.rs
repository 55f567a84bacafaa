use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::submission::ProcessUrlsRequest;
use crate::routes::error::ApiError;
use crate::services::ingest::{JobSource, UploadBuilder};

/// POST /process-urls: fetch each URL in the background and inspect it.
pub async fn process_urls(
    State(state): State<AppState>,
    request: Result<Json<ProcessUrlsRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if request.urls.len() > state.config.max_urls_per_job {
        return Err(ApiError::BadRequest(format!(
            "at most {} urls per job",
            state.config.max_urls_per_job
        )));
    }

    let id = state.jobs.submit(JobSource::Urls(request.urls)).await?;
    Ok(id.to_string())
}

/// POST /process-upload: one multipart part per image.
///
/// Files are named after their form field; the client file name is only
/// used for unnamed parts.
pub async fn process_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<String, ApiError> {
    let mut upload = UploadBuilder::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field
            .name()
            .filter(|name| !name.is_empty())
            .or(field.file_name())
            .unwrap_or_default()
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        upload
            .push(&name, data.to_vec())
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }

    if upload.is_empty() {
        return Err(ApiError::BadRequest("no files in upload".to_string()));
    }

    let id = state.jobs.submit(JobSource::Upload(upload.finish())).await?;
    Ok(id.to_string())
}

/// POST /process-bytes: the whole body is one image.
pub async fn process_bytes(State(state): State<AppState>, body: Bytes) -> Result<String, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty body".to_string()));
    }

    let id = state.jobs.submit(JobSource::Bytes(body.to_vec())).await?;
    Ok(id.to_string())
}
