use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// One data row of an uploaded hospital CSV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HospitalRow {
    /// Position of the row in the file, starting at 1 for the first data row
    pub row_number: u32,

    /// Hospital name, trimmed
    pub name: String,

    /// Hospital address, trimmed
    pub address: String,

    /// Phone number, `None` when the cell was empty
    pub phone: Option<String>,
}

/// Outcome of a single hospital creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failed,
}

/// Result of pushing one row to the hospital directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HospitalResult {
    /// Row number this result belongs to
    pub row: u32,

    /// Identifier assigned by the directory, when creation succeeded
    pub hospital_id: Option<i64>,

    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub status: ResultStatus,

    /// Error text of a failed creation
    pub error: Option<String>,
}

impl HospitalResult {
    /// Successful creation of `row` as directory hospital `hospital_id`
    pub fn success(row: &HospitalRow, hospital_id: i64) -> Self {
        Self {
            row: row.row_number,
            hospital_id: Some(hospital_id),
            name: row.name.clone(),
            address: row.address.clone(),
            phone: row.phone.clone(),
            status: ResultStatus::Success,
            error: None,
        }
    }

    /// Failed creation of `row`
    pub fn failed(row: &HospitalRow, error: impl Into<String>) -> Self {
        Self {
            row: row.row_number,
            hospital_id: None,
            name: row.name.clone(),
            address: row.address.clone(),
            phone: row.phone.clone(),
            status: ResultStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}
