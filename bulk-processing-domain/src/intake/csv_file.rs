use bulk_processing_data::HospitalRow;
use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, error};

use super::{CsvIntakeError, MAX_HOSPITALS, REQUIRED_HEADERS};

/// Cheap check that an upload is a CSV document worth parsing
///
/// The content must be UTF-8, not blank, and have a header line with at
/// least two comma separated columns.
pub fn validate_csv_file(content: &[u8]) -> bool {
    let text = match std::str::from_utf8(content) {
        Ok(text) => text,
        Err(_) => return false,
    };
    if text.trim().is_empty() {
        return false;
    }

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    match reader.headers() {
        Ok(headers) => headers.len() >= 2,
        Err(_) => false,
    }
}

/// Parse an upload into rows and its header names
///
/// Rows are numbered from 1. Only the `name`, `address` and `phone` columns
/// are read; missing cells read as empty and an empty phone becomes `None`.
pub fn parse_csv_file(content: &[u8]) -> Result<(Vec<HospitalRow>, Vec<String>), CsvIntakeError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvIntakeError::Parse(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let name_idx = column("name");
    let address_idx = column("address");
    let phone_idx = column("phone");

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| CsvIntakeError::Parse(e.to_string()))?;
        let phone = cell(&record, phone_idx);

        rows.push(HospitalRow {
            row_number: index as u32 + 1,
            name: cell(&record, name_idx),
            address: cell(&record, address_idx),
            phone: (!phone.is_empty()).then_some(phone),
        });
    }

    debug!(rows = rows.len(), headers = ?headers, "Parsed CSV upload");
    Ok((rows, headers))
}

fn cell(record: &StringRecord, index: Option<usize>) -> String {
    index
        .and_then(|i| record.get(i))
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

/// Check headers, row count and required cells
///
/// An oversized upload is rejected before anything else is looked at.
pub fn validate_csv_data(rows: &[HospitalRow], headers: &[String]) -> Result<(), CsvIntakeError> {
    if rows.len() > MAX_HOSPITALS {
        error!("Maximum {} hospitals allowed, found {}", MAX_HOSPITALS, rows.len());
        return Err(CsvIntakeError::TooManyHospitals {
            max: MAX_HOSPITALS,
            found: rows.len(),
        });
    }

    let mut errors = Vec::new();
    for required in REQUIRED_HEADERS {
        if !headers.iter().any(|h| h == required) {
            errors.push(format!("Missing required header: {}", required));
        }
    }

    for row in rows {
        if row.name.is_empty() {
            errors.push(format!("Row {}: name is required and must be non-empty", row.row_number));
        }
        if row.address.is_empty() {
            errors.push(format!("Row {}: address is required and must be non-empty", row.row_number));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CsvIntakeError::Validation(errors))
    }
}
