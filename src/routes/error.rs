use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::submission::SubmitErrorResponse;
use crate::services::jobs::SubmitError;
use crate::services::workspace::WorkspaceError;

/// Opaque body of every denial, kept for existing clients.
pub const DENIED: &str = "denied";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("malformed job id")]
    MalformedId,

    #[error("unknown job")]
    UnknownJob,

    #[error("filename not in job manifest")]
    NotListed,

    #[error("invalid submission: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl ApiError {
    fn submit_body(status: StatusCode, code: &str, message: String) -> Response {
        (
            status,
            Json(SubmitErrorResponse {
                error: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MalformedId | ApiError::NotListed => {
                (StatusCode::FORBIDDEN, DENIED).into_response()
            }
            ApiError::UnknownJob => (StatusCode::NOT_FOUND, DENIED).into_response(),
            ApiError::BadRequest(message) => {
                Self::submit_body(StatusCode::BAD_REQUEST, "invalid_request", message)
            }
            ApiError::Submit(SubmitError::QueueFull) => Self::submit_body(
                StatusCode::SERVICE_UNAVAILABLE,
                "queue_full",
                SubmitError::QueueFull.to_string(),
            ),
            ApiError::Submit(SubmitError::Workspace(e)) | ApiError::Workspace(e) => {
                tracing::error!(error = %e, "Workspace failure while serving request");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
