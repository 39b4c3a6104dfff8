use std::sync::Arc;
use std::time::Duration;

use bulk_processing_data::{BatchState, BatchStatus, BatchStore, HospitalResult, HospitalRow, StoreError};
use futures::future::join_all;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::directory::HospitalDirectory;
use crate::intake::{parse_csv_file, remove_duplicates, validate_csv_data, validate_csv_file, CsvIntakeError};

/// Bulk processing service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Uploaded file name does not end in `.csv`
    #[error("File must be a CSV file")]
    InvalidFileType,

    /// Upload content was rejected
    #[error(transparent)]
    Intake(#[from] CsvIntakeError),

    /// Something a retry depends on is gone
    #[error("{0}")]
    NotFound(String),

    /// Batch store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Tuning knobs of batch processing
#[derive(Debug, Clone)]
pub struct ProcessingSettings {
    /// Creations in flight per chunk
    pub max_concurrent_workers: usize,
    /// Lifetime of the raw upload and parsed rows
    pub csv_ttl: Duration,
    /// Lifetime of the progress document
    pub status_ttl: Duration,
    /// Lifetime of a retry lock left behind by a crashed process
    pub retry_lock_ttl: Duration,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            max_concurrent_workers: 4,
            csv_ttl: Duration::from_secs(86_400),
            status_ttl: Duration::from_secs(86_400),
            retry_lock_ttl: Duration::from_secs(3_600),
        }
    }
}

/// Accepted upload, ready for background processing
#[derive(Debug, Clone)]
pub struct BatchSubmission {
    pub batch_id: Uuid,
    /// Unique rows that will be sent to the directory
    pub rows: Vec<HospitalRow>,
    /// Rows dropped as repeats of an earlier row
    pub duplicates: Vec<HospitalRow>,
}

impl BatchSubmission {
    pub fn total_hospitals(&self) -> usize {
        self.rows.len()
    }

    pub fn duplicates_removed(&self) -> usize {
        self.duplicates.len()
    }
}

/// Runs batches of hospital creations against the directory
///
/// Cloning is cheap; clones share the store and the directory client.
#[derive(Clone)]
pub struct BulkProcessingService {
    pub(super) store: Arc<dyn BatchStore>,
    pub(super) directory: Arc<dyn HospitalDirectory>,
    pub(super) settings: ProcessingSettings,
}

impl BulkProcessingService {
    /// Create a new bulk processing service
    pub fn new(
        store: Arc<dyn BatchStore>,
        directory: Arc<dyn HospitalDirectory>,
        settings: ProcessingSettings,
    ) -> Self {
        Self {
            store,
            directory,
            settings,
        }
    }

    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }

    /// Validate an upload, persist it and create its initial status
    ///
    /// Nothing is sent to the directory here; see [`Self::spawn_processing`].
    /// The batch lock is taken here and held until [`Self::process_batch`]
    /// ends, so no retry can start while the first run is still going.
    pub async fn submit_batch(&self, file_name: &str, content: &[u8]) -> Result<BatchSubmission, ServiceError> {
        if !file_name.ends_with(".csv") {
            return Err(ServiceError::InvalidFileType);
        }
        if !validate_csv_file(content) {
            return Err(CsvIntakeError::InvalidFormat.into());
        }

        let (rows, headers) = parse_csv_file(content)?;
        validate_csv_data(&rows, &headers)?;
        let deduplicated = remove_duplicates(rows);

        let batch_id = Uuid::new_v4();
        // The first run owns the batch until process_batch releases the lock.
        if !self.store.set_retry_lock(batch_id, self.settings.retry_lock_ttl).await? {
            warn!(%batch_id, "Batch lock already held for a new batch");
        }
        self.store.store_csv(batch_id, content, self.settings.csv_ttl).await?;
        self.store
            .store_rows(batch_id, &deduplicated.unique, self.settings.csv_ttl)
            .await?;

        let status = BatchStatus::new(batch_id, deduplicated.unique.len());
        self.store.store_status(batch_id, &status, self.settings.status_ttl).await?;
        info!(
            %batch_id,
            total = deduplicated.unique.len(),
            duplicates = deduplicated.duplicate_count(),
            "Initialized batch status"
        );

        Ok(BatchSubmission {
            batch_id,
            rows: deduplicated.unique,
            duplicates: deduplicated.duplicates,
        })
    }

    /// Process a submitted batch on a background task
    pub fn spawn_processing(&self, batch_id: Uuid, rows: Vec<HospitalRow>) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move { service.process_batch(batch_id, rows).await })
    }

    /// Create every row, activate the batch if all of them succeeded, then release the batch lock
    pub async fn process_batch(&self, batch_id: Uuid, rows: Vec<HospitalRow>) {
        info!(%batch_id, hospitals = rows.len(), "Starting batch processing");

        let outcome = match self.process_rows_in_chunks(batch_id, &rows, "processing").await {
            Ok(_) => self.activate_batch_if_complete(batch_id).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(_) => info!(%batch_id, "Completed batch processing"),
            Err(e) => {
                error!(%batch_id, error = %e, "Batch processing aborted");
                self.mark_failed(batch_id).await;
            }
        }

        self.release_retry_lock(batch_id).await;
    }

    /// Create rows in consecutive chunks of `max_concurrent_workers`
    ///
    /// A chunk starts only after the previous one finished, and the status
    /// document is updated after every chunk. Creation failures become
    /// failed results; they never abort the batch.
    pub async fn process_rows_in_chunks(
        &self,
        batch_id: Uuid,
        rows: &[HospitalRow],
        context: &str,
    ) -> Result<Vec<HospitalResult>, ServiceError> {
        let workers = self.settings.max_concurrent_workers.max(1);
        let mut results = Vec::with_capacity(rows.len());

        for (index, chunk) in rows.chunks(workers).enumerate() {
            info!(%batch_id, "Processing {} chunk {} with {} hospitals", context, index + 1, chunk.len());

            let handles: Vec<_> = chunk
                .iter()
                .cloned()
                .map(|row| tokio::spawn(process_hospital_row(self.directory.clone(), row, batch_id)))
                .collect();

            let chunk_results: Vec<HospitalResult> = chunk
                .iter()
                .zip(join_all(handles).await)
                .map(|(row, outcome)| {
                    outcome.unwrap_or_else(|e| {
                        error!(%batch_id, row = row.row_number, error = %e, "Exception in {} worker", context);
                        HospitalResult::failed(row, format!("Worker task failed: {}", e))
                    })
                })
                .collect();

            self.record_results(batch_id, &chunk_results).await?;
            results.extend(chunk_results);
        }

        Ok(results)
    }

    /// Activate the batch when every hospital was created, then mark it completed
    ///
    /// Returns whether the batch is now active. A failed activation still
    /// completes the batch, with `batch_activated` left false.
    pub async fn activate_batch_if_complete(&self, batch_id: Uuid) -> Result<bool, ServiceError> {
        let Some(mut status) = self.store.get_status(batch_id).await? else {
            warn!(%batch_id, "Status not found for batch");
            return Ok(false);
        };

        let activated = if status.all_successful() {
            info!(%batch_id, "All {} hospitals successful. Activating batch", status.total_hospitals);
            match self.directory.activate_batch(batch_id).await {
                Ok(()) => {
                    info!(%batch_id, "Successfully activated batch");
                    true
                }
                Err(e) => {
                    error!(%batch_id, error = %e, "Failed to activate batch");
                    false
                }
            }
        } else {
            false
        };

        status.complete(activated);
        self.store.store_status(batch_id, &status, self.settings.status_ttl).await?;
        Ok(activated)
    }

    /// Current progress document of a batch
    pub async fn get_batch_status(&self, batch_id: Uuid) -> Result<Option<BatchStatus>, ServiceError> {
        Ok(self.store.get_status(batch_id).await?)
    }

    /// Fold results into the stored status
    async fn record_results(&self, batch_id: Uuid, results: &[HospitalResult]) -> Result<(), ServiceError> {
        let Some(mut status) = self.store.get_status(batch_id).await? else {
            warn!(%batch_id, "Status not found for batch, dropping {} results", results.len());
            return Ok(());
        };

        for result in results {
            status.record(result.clone());
        }
        self.store.store_status(batch_id, &status, self.settings.status_ttl).await?;
        Ok(())
    }

    /// Move the batch to `state`, returning false when it has no status
    pub(super) async fn set_state(&self, batch_id: Uuid, state: BatchState) -> Result<bool, ServiceError> {
        let Some(mut status) = self.store.get_status(batch_id).await? else {
            return Ok(false);
        };
        status.set_state(state);
        self.store.store_status(batch_id, &status, self.settings.status_ttl).await?;
        Ok(true)
    }

    /// Best effort: clients polling the status should see the batch stop
    pub(super) async fn mark_failed(&self, batch_id: Uuid) {
        if let Err(e) = self.set_state(batch_id, BatchState::Failed).await {
            error!(%batch_id, error = %e, "Could not mark batch as failed");
        }
    }
}

/// Create one row in the directory and describe the outcome
async fn process_hospital_row(
    directory: Arc<dyn HospitalDirectory>,
    row: HospitalRow,
    batch_id: Uuid,
) -> HospitalResult {
    match directory.create_hospital(&row, batch_id).await {
        Ok(hospital) => {
            info!(%batch_id, row = row.row_number, hospital_id = hospital.id, "Successfully created hospital");
            HospitalResult::success(&row, hospital.id)
        }
        Err(e) => {
            error!(%batch_id, row = row.row_number, error = %e, "Failed to create hospital");
            HospitalResult::failed(&row, e.to_string())
        }
    }
}
