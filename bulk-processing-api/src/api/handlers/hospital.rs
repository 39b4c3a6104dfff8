use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bulk_processing_domain::services::RetryPlan;
use tracing::{error, info, instrument};

use crate::api::{ApiError, AppState};
use crate::entities::{BulkCreateResponse, RetryRequest, RetryResponse};

/// Upload a CSV of hospitals and create them in the background
///
/// Answers 202 as soon as the upload is validated and stored; progress is
/// available through the status WebSocket.
#[utoipa::path(
    post,
    path = "/api/v1/hospital/bulk",
    request_body(content = crate::entities::BulkUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Batch accepted", body = BulkCreateResponse),
        (status = 400, description = "File rejected", body = crate::entities::ErrorResponse),
        (status = 422, description = "No file in the request", body = crate::entities::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::entities::ErrorResponse)
    ),
    tag = "hospital"
)]
#[instrument(skip(state, multipart))]
pub async fn bulk_create_hospitals(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BulkCreateResponse>), ApiError> {
    let (file_name, content) = read_upload(&mut multipart).await?;
    info!(file_name = %file_name, bytes = content.len(), "Bulk upload received");

    let submission = state.service.submit_batch(&file_name, &content).await?;
    let response = BulkCreateResponse::from(&submission);
    state.service.spawn_processing(submission.batch_id, submission.rows);

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// File name and bytes of the `file` part
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content = field.bytes().await.map_err(read_error)?;
        return Ok((file_name, content.to_vec()));
    }

    Err(ApiError::Unprocessable("Field required: file".to_string()))
}

fn read_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    error!(error = %e, "Error reading file");
    ApiError::BadRequest(format!("Error reading file: {}", e))
}

/// Retry the failed and unprocessed hospitals of a batch
#[utoipa::path(
    post,
    path = "/api/v1/hospital/retry",
    request_body = RetryRequest,
    responses(
        (status = 202, description = "Retry started, already running or not needed", body = RetryResponse),
        (status = 404, description = "Batch data expired or unknown", body = crate::entities::ErrorResponse),
        (status = 422, description = "Malformed request body"),
        (status = 500, description = "Internal server error", body = crate::entities::ErrorResponse)
    ),
    tag = "hospital"
)]
#[instrument(skip(state))]
pub async fn retry_batch(
    State(state): State<AppState>,
    Json(request): Json<RetryRequest>,
) -> Result<(StatusCode, Json<RetryResponse>), ApiError> {
    let batch_id = request.batch_id;

    let response = match state.service.plan_retry(batch_id).await? {
        RetryPlan::InProgress => RetryResponse::in_progress(batch_id),
        RetryPlan::NothingToRetry => RetryResponse::nothing_to_retry(batch_id),
        RetryPlan::Retry(rows) => {
            let count = rows.len();
            state.service.start_retry(batch_id, rows).await?;
            RetryResponse::retrying(batch_id, count)
        }
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}
