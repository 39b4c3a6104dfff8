use std::sync::PoisonError;
use thiserror::Error;

/// Error type for batch store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Redis command or connection error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Connecting took longer than allowed
    #[error("Connection to Redis timed out after {0} seconds")]
    ConnectTimeout(u64),

    /// Stored document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Lock error
    #[error("Lock error: {0}")]
    Lock(String),
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(error: PoisonError<T>) -> Self {
        StoreError::Lock(error.to_string())
    }
}
