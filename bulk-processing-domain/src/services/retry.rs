use std::collections::HashSet;

use bulk_processing_data::{BatchState, BatchStatus, HospitalRow};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::bulk_processing::{BulkProcessingService, ServiceError};
use crate::directory::DirectoryHospital;
use crate::intake::{hospital_key, HospitalKey};

/// What a retry request turned into
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPlan {
    /// The first run or another retry of the same batch holds the lock
    InProgress,
    /// Every row already succeeded; the lock was released
    NothingToRetry,
    /// The lock is held and these rows should be created again
    Retry(Vec<HospitalRow>),
}

/// Rows that need another creation attempt
///
/// A row is retried when its recorded result failed, or when it has no
/// result and the directory does not hold a hospital with the same key.
pub fn select_rows_to_retry(
    rows: &[HospitalRow],
    status: &BatchStatus,
    existing: &[DirectoryHospital],
) -> Vec<HospitalRow> {
    let existing: HashSet<HospitalKey> = existing
        .iter()
        .map(|hospital| hospital_key(&hospital.name, &hospital.address))
        .collect();

    rows.iter()
        .filter(|row| match status.result_for(row.row_number) {
            Some(result) => !result.is_success(),
            None => !existing.contains(&HospitalKey::from(*row)),
        })
        .cloned()
        .collect()
}

impl BulkProcessingService {
    /// Take the retry lock and work out which rows to send again
    ///
    /// A batch whose first run or an earlier retry still holds the lock
    /// answers [`RetryPlan::InProgress`]. The lock stays held only for
    /// [`RetryPlan::Retry`].
    pub async fn plan_retry(&self, batch_id: Uuid) -> Result<RetryPlan, ServiceError> {
        if self.store.check_retry_lock(batch_id).await? {
            info!(%batch_id, "Retry already in progress");
            return Ok(RetryPlan::InProgress);
        }
        if !self.store.set_retry_lock(batch_id, self.settings.retry_lock_ttl).await? {
            info!(%batch_id, "Lost the race for the retry lock");
            return Ok(RetryPlan::InProgress);
        }

        match self.collect_retry_rows(batch_id).await {
            Ok(rows) if rows.is_empty() => {
                info!(%batch_id, "No hospitals need retry");
                self.release_retry_lock(batch_id).await;
                Ok(RetryPlan::NothingToRetry)
            }
            Ok(rows) => {
                info!(%batch_id, "Found {} hospitals to retry", rows.len());
                Ok(RetryPlan::Retry(rows))
            }
            Err(e) => {
                self.release_retry_lock(batch_id).await;
                Err(e)
            }
        }
    }

    async fn collect_retry_rows(&self, batch_id: Uuid) -> Result<Vec<HospitalRow>, ServiceError> {
        if self.store.get_csv(batch_id).await?.is_none() {
            return Err(ServiceError::NotFound(
                "CSV file not found or expired. Cannot retry.".to_string(),
            ));
        }

        let existing = match self.directory.get_batch_hospitals(batch_id).await {
            Ok(hospitals) => hospitals,
            Err(e) => {
                warn!(%batch_id, error = %e, "Could not list batch hospitals, assuming none exist");
                Vec::new()
            }
        };

        let rows = self
            .store
            .get_rows(batch_id)
            .await?
            .filter(|rows| !rows.is_empty())
            .ok_or_else(|| ServiceError::NotFound("Rows data not found. Cannot retry.".to_string()))?;
        let status = self
            .store
            .get_status(batch_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Batch status not found. Cannot retry.".to_string()))?;

        Ok(select_rows_to_retry(&rows, &status, &existing))
    }

    /// Put the batch back into `processing` and retry `rows` in the background
    ///
    /// Expects the retry lock to be held, as left by [`Self::plan_retry`].
    /// The lock is released when the background task ends, or right away
    /// if the batch cannot be reopened.
    pub async fn start_retry(&self, batch_id: Uuid, rows: Vec<HospitalRow>) -> Result<JoinHandle<()>, ServiceError> {
        match self.set_state(batch_id, BatchState::Processing).await {
            Ok(true) => {}
            Ok(false) => {
                self.release_retry_lock(batch_id).await;
                return Err(ServiceError::NotFound(
                    "Batch status not found. Cannot retry.".to_string(),
                ));
            }
            Err(e) => {
                self.release_retry_lock(batch_id).await;
                return Err(e);
            }
        }

        let service = self.clone();
        Ok(tokio::spawn(async move { service.retry_rows(batch_id, rows).await }))
    }

    /// Create `rows` again, re-run activation and release the retry lock
    pub async fn retry_rows(&self, batch_id: Uuid, rows: Vec<HospitalRow>) {
        info!(%batch_id, hospitals = rows.len(), "Starting retry");

        let outcome = match self.process_rows_in_chunks(batch_id, &rows, "retry").await {
            Ok(_) => self.activate_batch_if_complete(batch_id).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(_) => info!(%batch_id, "Completed retry"),
            Err(e) => {
                error!(%batch_id, error = %e, "Retry aborted");
                self.mark_failed(batch_id).await;
            }
        }

        self.release_retry_lock(batch_id).await;
    }

    pub(super) async fn release_retry_lock(&self, batch_id: Uuid) {
        if let Err(e) = self.store.delete_retry_lock(batch_id).await {
            error!(%batch_id, error = %e, "Failed to release retry lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::services::ProcessingSettings;
    use crate::testing::{sample_csv, MockHospitalDirectory};
    use bulk_processing_data::{BatchStore, HospitalResult, InMemoryBatchStore};

    fn row(number: u32, name: &str, address: &str) -> HospitalRow {
        HospitalRow {
            row_number: number,
            name: name.to_string(),
            address: address.to_string(),
            phone: None,
        }
    }

    fn directory_hospital(id: i64, name: &str, address: &str) -> DirectoryHospital {
        DirectoryHospital {
            id,
            name: name.to_string(),
            address: address.to_string(),
            phone: None,
            creation_batch_id: None,
            active: Some(false),
        }
    }

    fn service_with(directory: MockHospitalDirectory) -> (BulkProcessingService, InMemoryBatchStore, Arc<MockHospitalDirectory>) {
        let store = InMemoryBatchStore::new();
        let directory = Arc::new(directory);
        let service = BulkProcessingService::new(
            Arc::new(store.clone()),
            directory.clone(),
            ProcessingSettings::default(),
        );
        (service, store, directory)
    }

    #[test]
    fn test_select_failed_and_unprocessed_rows() {
        let rows = vec![
            row(1, "A", "1 St"),
            row(2, "B", "2 St"),
            row(3, "C", "3 St"),
            row(4, "D", "4 St"),
        ];
        let mut status = BatchStatus::new(Uuid::new_v4(), rows.len());
        status.record(HospitalResult::success(&rows[0], 10));
        status.record(HospitalResult::failed(&rows[1], "HTTP 500: boom"));
        // Row 3 was created before a crash but never recorded.
        let existing = vec![directory_hospital(12, "c", " 3 st")];

        let selected = select_rows_to_retry(&rows, &status, &existing);
        let numbers: Vec<u32> = selected.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![2, 4]);
    }

    #[test]
    fn test_select_nothing_when_all_succeeded() {
        let rows = vec![row(1, "A", "1 St")];
        let mut status = BatchStatus::new(Uuid::new_v4(), 1);
        status.record(HospitalResult::success(&rows[0], 1));

        assert!(select_rows_to_retry(&rows, &status, &[]).is_empty());
    }

    #[tokio::test]
    async fn test_retry_recovers_failed_row_and_activates() {
        let (service, store, directory) =
            service_with(MockHospitalDirectory::new().fail_creation_for("City Medical Center"));
        let submission = service.submit_batch("hospitals.csv", sample_csv().as_bytes()).await.unwrap();
        let batch_id = submission.batch_id;
        service.process_batch(batch_id, submission.rows).await;
        assert_eq!(store.get_status(batch_id).await.unwrap().unwrap().failed_hospitals, 1);

        directory.clear_failures();
        let rows = match service.plan_retry(batch_id).await.unwrap() {
            RetryPlan::Retry(rows) => rows,
            other => panic!("expected rows to retry, got {:?}", other),
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "City Medical Center");
        assert!(store.check_retry_lock(batch_id).await.unwrap());

        service.start_retry(batch_id, rows).await.unwrap().await.unwrap();

        let status = store.get_status(batch_id).await.unwrap().unwrap();
        assert_eq!(status.status, BatchState::Completed);
        assert!(status.batch_activated);
        assert_eq!(status.processed_hospitals, 11);
        assert_eq!(status.successful_hospitals, 11);
        assert_eq!(status.failed_hospitals, 0);
        assert!(!store.check_retry_lock(batch_id).await.unwrap());
        assert_eq!(directory.activations(), vec![batch_id]);
    }

    #[tokio::test]
    async fn test_retry_in_progress_when_lock_held() {
        let (service, store, _) = service_with(MockHospitalDirectory::new());
        let batch_id = Uuid::new_v4();
        assert!(store.set_retry_lock(batch_id, Duration::from_secs(60)).await.unwrap());

        assert_eq!(service.plan_retry(batch_id).await.unwrap(), RetryPlan::InProgress);
        // The other holder keeps its lock.
        assert!(store.check_retry_lock(batch_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_nothing_to_retry_releases_lock() {
        let (service, store, _) = service_with(MockHospitalDirectory::new());
        let submission = service.submit_batch("hospitals.csv", sample_csv().as_bytes()).await.unwrap();
        let batch_id = submission.batch_id;
        service.process_batch(batch_id, submission.rows).await;

        assert_eq!(service.plan_retry(batch_id).await.unwrap(), RetryPlan::NothingToRetry);
        assert!(!store.check_retry_lock(batch_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_upload_cannot_be_retried() {
        let (service, store, _) = service_with(MockHospitalDirectory::new());
        let submission = service.submit_batch("hospitals.csv", sample_csv().as_bytes()).await.unwrap();
        let batch_id = submission.batch_id;
        store.expire_batch(batch_id).unwrap();

        match service.plan_retry(batch_id).await {
            Err(ServiceError::NotFound(message)) => {
                assert_eq!(message, "CSV file not found or expired. Cannot retry.")
            }
            other => panic!("expected not found, got {:?}", other),
        }
        assert!(!store.check_retry_lock(batch_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_batch_cannot_be_retried() {
        let (service, store, _) = service_with(MockHospitalDirectory::new());
        let batch_id = Uuid::new_v4();

        let err = service.plan_retry(batch_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(!store.check_retry_lock(batch_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_failure_retries_unprocessed_rows() {
        let (service, store, _) = service_with(MockHospitalDirectory::new().fail_listing());
        let submission = service.submit_batch("hospitals.csv", sample_csv().as_bytes()).await.unwrap();
        let batch_id = submission.batch_id;
        // The first run died before processing anything and its lock expired.
        store.delete_retry_lock(batch_id).await.unwrap();

        // Nothing was processed, so every row is retried.
        match service.plan_retry(batch_id).await.unwrap() {
            RetryPlan::Retry(rows) => assert_eq!(rows.len(), 11),
            other => panic!("expected rows to retry, got {:?}", other),
        }
        assert!(store.check_retry_lock(batch_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_hospitals_are_skipped() {
        let directory = MockHospitalDirectory::new()
            .with_existing(vec![directory_hospital(1, "General Hospital", "123 Main St")]);
        let (service, store, _) = service_with(directory);
        let submission = service.submit_batch("hospitals.csv", sample_csv().as_bytes()).await.unwrap();
        store.delete_retry_lock(submission.batch_id).await.unwrap();

        match service.plan_retry(submission.batch_id).await.unwrap() {
            RetryPlan::Retry(rows) => {
                assert_eq!(rows.len(), 10);
                assert!(rows.iter().all(|r| r.name != "General Hospital"));
            }
            other => panic!("expected rows to retry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retry_refused_while_first_run_is_running() {
        let (service, store, directory) =
            service_with(MockHospitalDirectory::new().with_delay(Duration::from_millis(50)));
        let submission = service.submit_batch("hospitals.csv", sample_csv().as_bytes()).await.unwrap();
        let batch_id = submission.batch_id;
        let handle = service.spawn_processing(batch_id, submission.rows);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(service.plan_retry(batch_id).await.unwrap(), RetryPlan::InProgress);

        handle.await.unwrap();
        // Every row was created exactly once.
        assert_eq!(directory.created_count(), 11);
        assert_eq!(directory.activations(), vec![batch_id]);
        assert!(!store.check_retry_lock(batch_id).await.unwrap());
        assert_eq!(service.plan_retry(batch_id).await.unwrap(), RetryPlan::NothingToRetry);
    }

    #[tokio::test]
    async fn test_empty_rows_cannot_be_retried() {
        let (service, store, _) = service_with(MockHospitalDirectory::new());
        let batch_id = Uuid::new_v4();
        let ttl = Duration::from_secs(60);
        store.store_csv(batch_id, sample_csv().as_bytes(), ttl).await.unwrap();
        store.store_rows(batch_id, &[], ttl).await.unwrap();
        store.store_status(batch_id, &BatchStatus::new(batch_id, 0), ttl).await.unwrap();

        match service.plan_retry(batch_id).await {
            Err(ServiceError::NotFound(message)) => {
                assert_eq!(message, "Rows data not found. Cannot retry.")
            }
            other => panic!("expected not found, got {:?}", other),
        }
        assert!(!store.check_retry_lock(batch_id).await.unwrap());
    }
}
