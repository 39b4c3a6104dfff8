use std::collections::HashSet;

use bulk_processing_data::HospitalRow;

/// Case-insensitive identity of a hospital: trimmed, lowercased name and address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HospitalKey {
    name: String,
    address: String,
}

pub fn hospital_key(name: &str, address: &str) -> HospitalKey {
    HospitalKey {
        name: name.trim().to_lowercase(),
        address: address.trim().to_lowercase(),
    }
}

impl From<&HospitalRow> for HospitalKey {
    fn from(row: &HospitalRow) -> Self {
        hospital_key(&row.name, &row.address)
    }
}

/// Rows split into first occurrences and later repeats, both in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deduplicated {
    pub unique: Vec<HospitalRow>,
    pub duplicates: Vec<HospitalRow>,
}

impl Deduplicated {
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }
}

/// Keep the first row for every hospital key
pub fn remove_duplicates(rows: Vec<HospitalRow>) -> Deduplicated {
    let mut seen = HashSet::new();
    let mut result = Deduplicated::default();

    for row in rows {
        if seen.insert(HospitalKey::from(&row)) {
            result.unique.push(row);
        } else {
            result.duplicates.push(row);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::parse_csv_file;

    // Sample upload used by the manual end-to-end script
    const SAMPLE_CSV: &str = "name,address,phone
General Hospital,123 Main St,555-1234
City Medical Center,456 Oak Ave,555-5678
Community Hospital,789 Pine Rd,555-9012
Regional Health,321 Elm St,555-3456
Memorial Hospital,654 Maple Dr,555-7890
Regional Health,322 Elm St,555-3456
Memorial Hospital,653 Maple Dr,
Community Hospital,789 Pine Rd,555-9012
Regional Health,323 Elm St,555-3456
Memorial Hospital,655 Maple Dr,555-7890
Regional Health,324 Elm St,555-3456
Memorial Hospital,656 Maple Dr,";

    #[test]
    fn test_key_ignores_case_and_surrounding_space() {
        assert_eq!(
            hospital_key("  General Hospital", "123 MAIN ST "),
            hospital_key("general hospital", "123 main st")
        );
        assert_ne!(
            hospital_key("General Hospital", "123 Main St"),
            hospital_key("General Hospital", "124 Main St")
        );
    }

    #[test]
    fn test_sample_upload_has_one_duplicate() {
        let (rows, _) = parse_csv_file(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 12);

        let result = remove_duplicates(rows);
        assert_eq!(result.unique.len(), 11);
        assert_eq!(result.duplicate_count(), 1);
        assert_eq!(result.duplicates[0].row_number, 8);
        assert_eq!(result.duplicates[0].name, "Community Hospital");
    }

    #[test]
    fn test_first_occurrence_wins_and_order_is_kept() {
        let rows = vec![
            HospitalRow {
                row_number: 1,
                name: "A".to_string(),
                address: "1 St".to_string(),
                phone: Some("111".to_string()),
            },
            HospitalRow {
                row_number: 2,
                name: "B".to_string(),
                address: "2 St".to_string(),
                phone: None,
            },
            HospitalRow {
                row_number: 3,
                name: "a".to_string(),
                address: "1 st".to_string(),
                phone: Some("222".to_string()),
            },
        ];

        let result = remove_duplicates(rows);
        let numbers: Vec<u32> = result.unique.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(result.unique[0].phone.as_deref(), Some("111"));
        assert_eq!(result.duplicates[0].row_number, 3);
    }
}
