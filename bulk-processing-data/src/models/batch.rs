use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use super::hospital::{HospitalResult, ResultStatus};

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    /// Rows are being pushed to the directory
    Processing,
    /// Every row has a result; see `batch_activated`
    Completed,
    /// Processing stopped on an unexpected error
    Failed,
}

impl BatchState {
    /// Whether no further updates are expected for the batch
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Completed | BatchState::Failed)
    }
}

/// Progress document of a batch, stored as JSON and streamed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct BatchStatus {
    pub batch_id: Uuid,
    pub status: BatchState,

    /// Number of unique rows in the batch
    pub total_hospitals: usize,
    pub processed_hospitals: usize,
    pub successful_hospitals: usize,
    pub failed_hospitals: usize,

    /// Set once the directory accepted the activation of the whole batch
    pub batch_activated: bool,

    /// Latest result per row
    pub hospitals: Vec<HospitalResult>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchStatus {
    /// Fresh status for a batch about to be processed
    pub fn new(batch_id: Uuid, total_hospitals: usize) -> Self {
        let now = Utc::now();
        Self {
            batch_id,
            status: BatchState::Processing,
            total_hospitals,
            processed_hospitals: 0,
            successful_hospitals: 0,
            failed_hospitals: 0,
            batch_activated: false,
            hospitals: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a result, replacing any earlier result for the same row
    pub fn record(&mut self, result: HospitalResult) {
        match self.hospitals.iter_mut().find(|h| h.row == result.row) {
            Some(existing) => *existing = result,
            None => self.hospitals.push(result),
        }
        self.recount();
    }

    /// Latest result recorded for `row`
    pub fn result_for(&self, row: u32) -> Option<&HospitalResult> {
        self.hospitals.iter().find(|h| h.row == row)
    }

    pub fn set_state(&mut self, state: BatchState) {
        self.status = state;
        self.touch();
    }

    /// Mark the batch completed
    pub fn complete(&mut self, batch_activated: bool) {
        self.batch_activated = batch_activated;
        self.set_state(BatchState::Completed);
    }

    /// Whether every hospital of a non-empty batch was created
    pub fn all_successful(&self) -> bool {
        self.total_hospitals > 0 && self.successful_hospitals == self.total_hospitals
    }

    fn recount(&mut self) {
        self.processed_hospitals = self.hospitals.len();
        self.successful_hospitals = self
            .hospitals
            .iter()
            .filter(|h| h.status == ResultStatus::Success)
            .count();
        self.failed_hospitals = self.processed_hospitals - self.successful_hospitals;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
