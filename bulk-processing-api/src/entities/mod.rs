// Public entities of the bulk processing API
// Request and response bodies that cross the HTTP boundary

// Bulk upload, retry and error bodies
pub mod hospital;

pub use hospital::{BulkCreateResponse, BulkUploadForm, DuplicateHospital, ErrorResponse, RetryRequest, RetryResponse};
