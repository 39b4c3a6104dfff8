use bulk_processing_data::HospitalRow;
use bulk_processing_domain::services::BatchSubmission;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Multipart body of a bulk upload
#[derive(Debug, ToSchema)]
pub struct BulkUploadForm {
    /// CSV file with `name`, `address` and optional `phone` columns
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Row dropped from an upload because an earlier row had the same name and address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DuplicateHospital {
    pub row: u32,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

impl From<&HospitalRow> for DuplicateHospital {
    fn from(row: &HospitalRow) -> Self {
        Self {
            row: row.row_number,
            name: row.name.clone(),
            address: row.address.clone(),
            phone: row.phone.clone(),
        }
    }
}

/// Answer to an accepted bulk upload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkCreateResponse {
    pub batch_id: Uuid,
    /// Always `processing`
    pub status: String,
    pub duplicates_removed: usize,
    /// Unique rows that will be created
    pub total_hospitals: usize,
    pub message: String,
    pub duplicate_hospitals: Vec<DuplicateHospital>,
}

impl From<&BatchSubmission> for BulkCreateResponse {
    fn from(submission: &BatchSubmission) -> Self {
        Self {
            batch_id: submission.batch_id,
            status: "processing".to_string(),
            duplicates_removed: submission.duplicates_removed(),
            total_hospitals: submission.total_hospitals(),
            message: "Batch processing started".to_string(),
            duplicate_hospitals: submission.duplicates.iter().map(DuplicateHospital::from).collect(),
        }
    }
}

/// Body of a retry request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RetryRequest {
    pub batch_id: Uuid,
}

/// Answer to a retry request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RetryResponse {
    pub batch_id: Uuid,
    /// `retry_in_progress`, `completed` or `retrying`
    pub status: String,
    pub rows_to_retry: Option<usize>,
    pub message: String,
}

impl RetryResponse {
    pub fn in_progress(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            status: "retry_in_progress".to_string(),
            rows_to_retry: None,
            message: "Retry already in progress for this batch".to_string(),
        }
    }

    pub fn nothing_to_retry(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            status: "completed".to_string(),
            rows_to_retry: Some(0),
            message: "All hospitals already successful, no retry needed".to_string(),
        }
    }

    pub fn retrying(batch_id: Uuid, rows: usize) -> Self {
        Self {
            batch_id,
            status: "retrying".to_string(),
            rows_to_retry: Some(rows),
            message: "Retry processing started".to_string(),
        }
    }
}

/// Error body: `detail` is a message, or `{"validation_errors": [...]}` for rejected CSV rows
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(value_type = Object)]
    pub detail: serde_json::Value,
}

impl ErrorResponse {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            detail: serde_json::Value::String(message.into()),
        }
    }

    pub fn validation_errors(errors: &[String]) -> Self {
        Self {
            detail: serde_json::json!({ "validation_errors": errors }),
        }
    }
}
