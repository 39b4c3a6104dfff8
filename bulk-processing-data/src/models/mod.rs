// Data models shared by the storage layer and the services above it
pub mod batch;
pub mod hospital;

pub use batch::{BatchState, BatchStatus};
pub use hospital::{HospitalResult, HospitalRow, ResultStatus};
