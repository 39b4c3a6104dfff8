// Handler tests: the router is driven with `tower::ServiceExt::oneshot`
// against the in-memory batch store and the mock hospital directory.

mod hospital_test;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use bulk_processing_data::{BatchStatus, BatchStore, InMemoryBatchStore};
use bulk_processing_domain::health::HealthService;
use bulk_processing_domain::services::{BulkProcessingService, ProcessingSettings};
use bulk_processing_domain::testing::MockHospitalDirectory;
use serde_json::Value;
use uuid::Uuid;

use crate::api::{create_app, AppState};

const BOUNDARY: &str = "bulk-processing-test-boundary";

pub(super) struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: InMemoryBatchStore,
    pub directory: Arc<MockHospitalDirectory>,
}

pub(super) fn test_app(directory: MockHospitalDirectory) -> TestApp {
    let store = InMemoryBatchStore::new();
    let directory = Arc::new(directory);
    let service = BulkProcessingService::new(
        Arc::new(store.clone()),
        directory.clone(),
        ProcessingSettings::default(),
    );
    let health = HealthService::new(Arc::new(store.clone()));
    let state = AppState::new(service, health).with_poll_interval(Duration::from_millis(10));

    TestApp {
        router: create_app(state.clone(), None),
        state,
        store,
        directory,
    }
}

/// Multipart request carrying `content` as the `file` part
pub(super) fn upload_request(file_name: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n--{boundary}--\r\n",
        boundary = BOUNDARY,
        file_name = file_name,
        content = content,
    );

    Request::builder()
        .method("POST")
        .uri("/api/v1/hospital/bulk")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

pub(super) fn retry_request(batch_id: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/hospital/retry")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(format!(r#"{{"batch_id": "{}"}}"#, batch_id)))
        .unwrap()
}

pub(super) async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Wait for the background task of a batch to finish
pub(super) async fn wait_until_terminal(store: &InMemoryBatchStore, batch_id: Uuid) -> BatchStatus {
    for _ in 0..200 {
        if let Some(status) = store.get_status(batch_id).await.unwrap() {
            if status.status.is_terminal() && !store.check_retry_lock(batch_id).await.unwrap() {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("batch {} did not finish", batch_id);
}
