//! Read-only job endpoints.
//!
//! Every handler validates the id before touching the filesystem; artifact
//! handlers additionally require the filename to be listed in the manifest.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::app_state::AppState;
use crate::models::job::JobId;
use crate::models::submission::JobStatusResponse;
use crate::routes::error::ApiError;
use crate::services::status::{wait_for_terminal, PollOutcome};
use crate::services::workspace::JobWorkspace;

async fn open_job(state: &AppState, raw_id: &str) -> Result<JobWorkspace, ApiError> {
    let id: JobId = raw_id.parse().map_err(|_| ApiError::MalformedId)?;
    state
        .workspaces()
        .open(&id)
        .await?
        .ok_or(ApiError::UnknownJob)
}

async fn open_listed(
    state: &AppState,
    raw_id: &str,
    filename: &str,
) -> Result<JobWorkspace, ApiError> {
    let workspace = open_job(state, raw_id).await?;
    if !workspace.manifest_contains(filename).await? {
        return Err(ApiError::NotListed);
    }
    Ok(workspace)
}

/// GET /work/{id}/done and /work/{id}/error: wait for the job to finish.
///
/// Answers `done` or `error` as soon as a marker exists, or `pending`
/// (202) when the poll ceiling is reached first.
pub async fn poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace = open_job(&state, &id).await?;
    let outcome = wait_for_terminal(
        &workspace,
        state.config.poll_interval(),
        state.config.poll_max_attempts,
    )
    .await?;

    let status = match outcome {
        PollOutcome::Terminal(_) => StatusCode::OK,
        PollOutcome::TimedOut => StatusCode::ACCEPTED,
    };
    Ok((status, outcome.as_str()))
}

/// GET /work/{id}/status: current job record, without waiting.
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let workspace = open_job(&state, &id).await?;
    let record = workspace.read_record().await?;
    Ok(Json(record.into()))
}

/// GET /work/{id}/filenames: manifest in processing order.
pub async fn filenames(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let workspace = open_job(&state, &id).await?;
    Ok(Json(workspace.read_manifest().await?))
}

/// GET /work/{id}/results/{filename}: annotated PNG.
pub async fn result_image(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace = open_listed(&state, &id, &filename).await?;
    let png = workspace.read_result_image(&filename).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// GET /work/{id}/results/box/{filename}: `[boxes, labels, verdict]`.
pub async fn result_box(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace = open_listed(&state, &id, &filename).await?;
    let json = workspace.read_sidecar(&filename).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}
