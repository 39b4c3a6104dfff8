//! External hospital directory API.
//!
//! The directory stores hospitals and groups them by the batch that created
//! them. A batch stays inactive until it is explicitly activated.

mod client;

use async_trait::async_trait;
use bulk_processing_data::HospitalRow;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use client::HospitalApiClient;

/// Hospital as returned by the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryHospital {
    pub id: i64,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub creation_batch_id: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Body of a hospital creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateHospitalPayload {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub creation_batch_id: Uuid,
}

impl CreateHospitalPayload {
    pub fn new(row: &HospitalRow, batch_id: Uuid) -> Self {
        Self {
            name: row.name.clone(),
            address: row.address.clone(),
            phone: row.phone.clone(),
            creation_batch_id: batch_id,
        }
    }
}

/// Errors talking to the directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory answered with something other than 200
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Transport(String),

    /// A 200 response carried an unexpected body
    #[error("Invalid response body: {0}")]
    Decode(String),
}

/// Operations the batch processor needs from the directory
#[async_trait]
pub trait HospitalDirectory: Send + Sync {
    /// Create one hospital tagged with the batch it belongs to
    async fn create_hospital(&self, row: &HospitalRow, batch_id: Uuid) -> Result<DirectoryHospital, DirectoryError>;

    /// Activate every hospital created by the batch
    async fn activate_batch(&self, batch_id: Uuid) -> Result<(), DirectoryError>;

    /// Hospitals the directory already holds for the batch
    async fn get_batch_hospitals(&self, batch_id: Uuid) -> Result<Vec<DirectoryHospital>, DirectoryError>;
}
