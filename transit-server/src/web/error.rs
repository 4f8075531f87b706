//! Mapping of domain errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::archive::ArchiveError;
use crate::reconcile::ReconcileError;
use crate::schedule::ScheduleError;

use super::dto::ErrorResponse;
use super::export::ExportError;

/// Application error type.
///
/// `Internal` carries the detail for the log; callers only see `message`.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String, detail: String },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>, detail: impl ToString) -> Self {
        AppError::Internal {
            message: message.into(),
            detail: detail.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::ServiceNotFound(_) => AppError::not_found("service id not found"),
        }
    }
}

impl From<ArchiveError> for AppError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::NotFound { .. } => AppError::not_found(e.to_string()),
            _ => AppError::internal("error fetching entry", e),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::Validation(message) => AppError::BadRequest { message },
            _ => AppError::internal("error fetching entry", e),
        }
    }
}

impl From<ExportError> for AppError {
    fn from(e: ExportError) -> Self {
        let message = match e {
            ExportError::StartDate { .. } => "error parsing trip start date",
            ExportError::StartTime { .. } => "error parsing trip start time",
            ExportError::Csv(_) | ExportError::Flush(_) => "error writing csv",
        };
        AppError::internal(message, e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::BadRequest { message } | AppError::NotFound { message } => {
                warn!(status = %status, error = %message, "Request rejected");
                message
            }
            AppError::Internal { message, detail } => {
                error!(status = %status, error = %detail, "Request failed");
                message
            }
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
