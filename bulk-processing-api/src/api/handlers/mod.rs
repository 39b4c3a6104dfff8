pub mod health;
pub mod hospital;
pub mod status;

// Tests module
#[cfg(test)]
mod tests;

// Re-export handlers for easier imports
pub use health::{health_check, liveness};
pub use hospital::{bulk_create_hospitals, retry_batch};
pub use status::{get_batch_status, status_stream};
