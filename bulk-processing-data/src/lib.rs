// Bulk Processing Data
// This crate holds the batch models and the storage backing them

// Batch and hospital models
pub mod models;

// Batch storage (Redis and in-memory)
pub mod store;

// Re-export commonly used types
pub use models::{BatchState, BatchStatus, HospitalResult, HospitalRow, ResultStatus};
pub use store::{BatchStore, InMemoryBatchStore, RedisBatchStore, StoreError};
