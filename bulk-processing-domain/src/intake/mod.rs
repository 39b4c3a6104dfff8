// CSV intake: turns an uploaded file into validated, de-duplicated hospital rows
pub mod csv_file;
pub mod dedup;

use thiserror::Error;

pub use csv_file::{parse_csv_file, validate_csv_data, validate_csv_file};
pub use dedup::{hospital_key, remove_duplicates, Deduplicated, HospitalKey};

/// Most data rows accepted in a single upload
pub const MAX_HOSPITALS: usize = 20;

/// Columns every upload must carry
pub const REQUIRED_HEADERS: [&str; 2] = ["name", "address"];

/// Errors raised while reading an upload
#[derive(Debug, Error, PartialEq)]
pub enum CsvIntakeError {
    /// The bytes do not look like a CSV document
    #[error("Invalid CSV file format")]
    InvalidFormat,

    /// The CSV reader gave up on the document
    #[error("Error parsing CSV: {0}")]
    Parse(String),

    /// Upload has more rows than allowed
    #[error("Maximum {max} hospitals allowed, found {found}")]
    TooManyHospitals { max: usize, found: usize },

    /// Header or row level problems, one message each
    #[error("CSV validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}
