pub mod bulk_processing;
pub mod retry;

// Domain services
// Batch submission, background processing and retries of failed rows.

pub use bulk_processing::{BatchSubmission, BulkProcessingService, ProcessingSettings, ServiceError};
pub use retry::{select_rows_to_retry, RetryPlan};
