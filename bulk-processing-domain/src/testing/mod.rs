// Testing utilities and mock implementations for the domain layer
// This module is only available in tests or when the "mock" feature is enabled

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bulk_processing_data::HospitalRow;
use uuid::Uuid;

use crate::directory::{DirectoryError, DirectoryHospital, HospitalDirectory};

/// Upload used by the end-to-end checks: 12 rows, row 8 repeats row 3
pub fn sample_csv() -> &'static str {
    "name,address,phone
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
Memorial Hospital,656 Maple Dr,
"
}

/// In-process hospital directory with scripted failures
///
/// Creations succeed with increasing ids unless the hospital name was
/// registered with [`MockHospitalDirectory::fail_creation_for`].
#[derive(Debug, Default)]
pub struct MockHospitalDirectory {
    failing_names: Mutex<HashSet<String>>,
    fail_activation: bool,
    fail_listing: bool,
    delay: Option<Duration>,
    existing: Vec<DirectoryHospital>,
    created: Mutex<Vec<DirectoryHospital>>,
    activations: Mutex<Vec<Uuid>>,
    next_id: AtomicI64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockHospitalDirectory {
    /// Create a directory where every call succeeds
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    /// Answer 500 to creations of hospitals called `name`
    pub fn fail_creation_for(self, name: &str) -> Self {
        self.failing_names
            .lock()
            .unwrap()
            .insert(name.to_string());
        self
    }

    /// Answer 500 to batch activation
    pub fn fail_activation(mut self) -> Self {
        self.fail_activation = true;
        self
    }

    /// Answer 503 to batch listings
    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Hold every creation for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hospitals the directory already holds for any batch
    pub fn with_existing(mut self, hospitals: Vec<DirectoryHospital>) -> Self {
        self.existing = hospitals;
        self
    }

    /// Let previously failing creations succeed
    pub fn clear_failures(&self) {
        self.failing_names.lock().unwrap().clear();
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// Batches activated so far, in call order
    pub fn activations(&self) -> Vec<Uuid> {
        self.activations.lock().unwrap().clone()
    }

    /// Highest number of creations that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HospitalDirectory for MockHospitalDirectory {
    async fn create_hospital(&self, row: &HospitalRow, batch_id: Uuid) -> Result<DirectoryHospital, DirectoryError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_names.lock().unwrap().contains(&row.name) {
            return Err(DirectoryError::Http {
                status: 500,
                body: "Internal Server Error".to_string(),
            });
        }

        let hospital = DirectoryHospital {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: row.name.clone(),
            address: row.address.clone(),
            phone: row.phone.clone(),
            creation_batch_id: Some(batch_id.to_string()),
            active: Some(false),
        };
        self.created.lock().unwrap().push(hospital.clone());
        Ok(hospital)
    }

    async fn activate_batch(&self, batch_id: Uuid) -> Result<(), DirectoryError> {
        if self.fail_activation {
            return Err(DirectoryError::Http {
                status: 500,
                body: "activation failed".to_string(),
            });
        }
        self.activations.lock().unwrap().push(batch_id);
        Ok(())
    }

    async fn get_batch_hospitals(&self, batch_id: Uuid) -> Result<Vec<DirectoryHospital>, DirectoryError> {
        if self.fail_listing {
            return Err(DirectoryError::Http {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }
        let batch = batch_id.to_string();
        let created = self.created.lock().unwrap();
        Ok(self
            .existing
            .iter()
            .chain(created.iter().filter(|h| h.creation_batch_id.as_deref() == Some(batch.as_str())))
            .cloned()
            .collect())
    }
}
