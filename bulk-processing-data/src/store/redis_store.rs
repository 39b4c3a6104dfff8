use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BatchStore, StoreError};
use crate::models::{BatchStatus, HospitalRow};

/// Key prefix used when none is configured
pub const DEFAULT_KEY_PREFIX: &str = "bulk-processing:";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_VALUE: &str = "locked";

/// Redis-backed batch store
///
/// Clones share one multiplexed connection.
#[derive(Clone)]
pub struct RedisBatchStore {
    connection: ConnectionManager,
    prefix: String,
}

impl std::fmt::Debug for RedisBatchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBatchStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisBatchStore {
    /// Connect to Redis at `url`, giving up after ten seconds
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::ConnectTimeout(CONNECT_TIMEOUT.as_secs()))??;

        info!("*****Connection to Redis established.*****");
        Ok(Self {
            connection,
            prefix: prefix.into(),
        })
    }

    fn key(&self, kind: &str, batch_id: Uuid) -> String {
        format!("{}{}:{}", self.prefix, kind, batch_id)
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }
}

/// Redis rejects `EX 0`
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl BatchStore for RedisBatchStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn store_csv(&self, batch_id: Uuid, content: &[u8], ttl: Duration) -> Result<(), StoreError> {
        self.set_with_ttl(&self.key("csv", batch_id), content, ttl).await?;
        info!(%batch_id, bytes = content.len(), "Stored CSV");
        Ok(())
    }

    async fn get_csv(&self, batch_id: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        self.get_bytes(&self.key("csv", batch_id)).await
    }

    async fn store_rows(&self, batch_id: Uuid, rows: &[HospitalRow], ttl: Duration) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(rows)?;
        self.set_with_ttl(&self.key("rows", batch_id), &encoded, ttl).await?;
        info!(%batch_id, rows = rows.len(), "Stored rows");
        Ok(())
    }

    async fn get_rows(&self, batch_id: Uuid) -> Result<Option<Vec<HospitalRow>>, StoreError> {
        match self.get_bytes(&self.key("rows", batch_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    async fn store_status(&self, batch_id: Uuid, status: &BatchStatus, ttl: Duration) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(status)?;
        self.set_with_ttl(&self.key("status", batch_id), &encoded, ttl).await?;
        debug!(%batch_id, "Stored status");
        Ok(())
    }

    async fn get_status(&self, batch_id: Uuid) -> Result<Option<BatchStatus>, StoreError> {
        match self.get_bytes(&self.key("status", batch_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_retry_lock(&self, batch_id: Uuid, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key("retry", batch_id))
            .arg(LOCK_VALUE)
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        let acquired = reply.is_some();
        if acquired {
            info!(%batch_id, "Set retry lock");
        } else {
            warn!(%batch_id, "Retry lock already exists");
        }
        Ok(acquired)
    }

    async fn check_retry_lock(&self, batch_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let count: i64 = redis::cmd("EXISTS")
            .arg(self.key("retry", batch_id))
            .query_async(&mut conn)
            .await?;
        Ok(count > 0)
    }

    async fn delete_retry_lock(&self, batch_id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(self.key("retry", batch_id))
            .query_async(&mut conn)
            .await?;
        info!(%batch_id, "Deleted retry lock");
        Ok(())
    }
}
