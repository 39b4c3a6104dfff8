use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bulk_processing_domain::intake::CsvIntakeError;
use bulk_processing_domain::services::ServiceError;
use thiserror::Error;
use tracing::error;

use crate::entities::ErrorResponse;

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Upload rejected before any processing
    #[error("{0}")]
    BadRequest(String),

    /// Row or header problems found in an upload
    #[error("CSV validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0}")]
    NotFound(String),

    /// Request body is missing a required part
    #[error("{0}")]
    Unprocessable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::InvalidFileType => ApiError::BadRequest(error.to_string()),
            ServiceError::Intake(CsvIntakeError::Validation(errors)) => ApiError::Validation(errors),
            ServiceError::Intake(intake) => ApiError::BadRequest(intake.to_string()),
            ServiceError::NotFound(message) => ApiError::NotFound(message),
            ServiceError::Store(store) => ApiError::Internal(store.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, ErrorResponse::message(message.as_str())),
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, ErrorResponse::validation_errors(errors)),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, ErrorResponse::message(message.as_str())),
            ApiError::Unprocessable(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorResponse::message(message.as_str()))
            }
            ApiError::Internal(_) => {
                error!(error = %self, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::message(self.to_string()))
            }
        };

        (status, Json(body)).into_response()
    }
}
