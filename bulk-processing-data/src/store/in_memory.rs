use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use super::{BatchStore, StoreError};
use crate::models::{BatchStatus, HospitalRow};

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn live(&self) -> Option<T> {
        (Instant::now() < self.expires_at).then(|| self.value.clone())
    }
}

#[derive(Debug, Default)]
struct Tables {
    csv: HashMap<Uuid, Expiring<Vec<u8>>>,
    rows: HashMap<Uuid, Expiring<Vec<HospitalRow>>>,
    status: HashMap<Uuid, Expiring<BatchStatus>>,
    retry_locks: HashMap<Uuid, Expiring<()>>,
}

/// In-memory batch store honouring time-to-live
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBatchStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryBatchStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry of a batch, as if all its keys had expired
    pub fn expire_batch(&self, batch_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock()?;
        tables.csv.remove(&batch_id);
        tables.rows.remove(&batch_id);
        tables.status.remove(&batch_id);
        tables.retry_locks.remove(&batch_id);
        Ok(())
    }
}

#[async_trait]
impl BatchStore for InMemoryBatchStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let _tables = self.tables.lock()?;
        Ok(())
    }

    async fn store_csv(&self, batch_id: Uuid, content: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let mut tables = self.tables.lock()?;
        tables.csv.insert(batch_id, Expiring::new(content.to_vec(), ttl));
        Ok(())
    }

    async fn get_csv(&self, batch_id: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        let tables = self.tables.lock()?;
        Ok(tables.csv.get(&batch_id).and_then(Expiring::live))
    }

    async fn store_rows(&self, batch_id: Uuid, rows: &[HospitalRow], ttl: Duration) -> Result<(), StoreError> {
        let mut tables = self.tables.lock()?;
        tables.rows.insert(batch_id, Expiring::new(rows.to_vec(), ttl));
        Ok(())
    }

    async fn get_rows(&self, batch_id: Uuid) -> Result<Option<Vec<HospitalRow>>, StoreError> {
        let tables = self.tables.lock()?;
        Ok(tables.rows.get(&batch_id).and_then(Expiring::live))
    }

    async fn store_status(&self, batch_id: Uuid, status: &BatchStatus, ttl: Duration) -> Result<(), StoreError> {
        let mut tables = self.tables.lock()?;
        tables.status.insert(batch_id, Expiring::new(status.clone(), ttl));
        Ok(())
    }

    async fn get_status(&self, batch_id: Uuid) -> Result<Option<BatchStatus>, StoreError> {
        let tables = self.tables.lock()?;
        Ok(tables.status.get(&batch_id).and_then(Expiring::live))
    }

    async fn set_retry_lock(&self, batch_id: Uuid, ttl: Duration) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock()?;
        let held = tables
            .retry_locks
            .get(&batch_id)
            .and_then(Expiring::live)
            .is_some();
        if held {
            return Ok(false);
        }
        tables.retry_locks.insert(batch_id, Expiring::new((), ttl));
        Ok(true)
    }

    async fn check_retry_lock(&self, batch_id: Uuid) -> Result<bool, StoreError> {
        let tables = self.tables.lock()?;
        Ok(tables
            .retry_locks
            .get(&batch_id)
            .and_then(Expiring::live)
            .is_some())
    }

    async fn delete_retry_lock(&self, batch_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.lock()?;
        tables.retry_locks.remove(&batch_id);
        Ok(())
    }
}
