// Batch store: raw uploads, parsed rows, progress documents and retry locks
pub mod errors;
mod in_memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{BatchStatus, HospitalRow};

pub use errors::StoreError;
pub use in_memory::InMemoryBatchStore;
pub use redis_store::{RedisBatchStore, DEFAULT_KEY_PREFIX};

/// Storage operations needed to run and retry a batch
///
/// Every value is written with a time-to-live; reads of expired entries
/// behave like reads of missing ones.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Round-trip to the backing store
    async fn ping(&self) -> Result<(), StoreError>;

    /// Keep the raw uploaded file
    async fn store_csv(&self, batch_id: Uuid, content: &[u8], ttl: Duration) -> Result<(), StoreError>;

    async fn get_csv(&self, batch_id: Uuid) -> Result<Option<Vec<u8>>, StoreError>;

    /// Keep the de-duplicated rows of a batch
    async fn store_rows(&self, batch_id: Uuid, rows: &[HospitalRow], ttl: Duration) -> Result<(), StoreError>;

    async fn get_rows(&self, batch_id: Uuid) -> Result<Option<Vec<HospitalRow>>, StoreError>;

    /// Overwrite the progress document of a batch
    async fn store_status(&self, batch_id: Uuid, status: &BatchStatus, ttl: Duration) -> Result<(), StoreError>;

    async fn get_status(&self, batch_id: Uuid) -> Result<Option<BatchStatus>, StoreError>;

    /// Take the retry lock if nobody holds it. Returns true when the caller now owns it.
    async fn set_retry_lock(&self, batch_id: Uuid, ttl: Duration) -> Result<bool, StoreError>;

    async fn check_retry_lock(&self, batch_id: Uuid) -> Result<bool, StoreError>;

    async fn delete_retry_lock(&self, batch_id: Uuid) -> Result<(), StoreError>;
}
