use std::time::Duration;

use axum::http::StatusCode;
use bulk_processing_data::{BatchState, BatchStore};
use bulk_processing_domain::testing::{sample_csv, MockHospitalDirectory};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use super::{body_json, retry_request, test_app, upload_request, wait_until_terminal};

fn csv_with_rows(count: usize) -> String {
    let mut csv = String::from("name,address,phone\n");
    for i in 1..=count {
        csv.push_str(&format!("Hospital {},{} Main St,555-{:04}\n", i, i, i));
    }
    csv
}

#[tokio::test]
async fn test_bulk_upload_accepts_sample_and_activates() {
    let app = test_app(MockHospitalDirectory::new());

    let response = app
        .router
        .oneshot(upload_request("hospitals.csv", sample_csv()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "processing");
    assert_eq!(body["message"], "Batch processing started");
    assert_eq!(body["total_hospitals"], 11);
    assert_eq!(body["duplicates_removed"], 1);
    assert_eq!(
        body["duplicate_hospitals"],
        json!([{"row": 8, "name": "Community Hospital", "address": "789 Pine Rd", "phone": "555-9012"}])
    );

    let batch_id: Uuid = body["batch_id"].as_str().unwrap().parse().unwrap();
    let status = wait_until_terminal(&app.store, batch_id).await;
    assert_eq!(status.status, BatchState::Completed);
    assert!(status.batch_activated);
    assert_eq!(status.total_hospitals, 11);
    assert_eq!(status.processed_hospitals, 11);
    assert_eq!(status.successful_hospitals, 11);
    assert_eq!(app.directory.created_count(), 11);
}

#[tokio::test]
async fn test_bulk_upload_rejects_non_csv_name() {
    let app = test_app(MockHospitalDirectory::new());

    let response = app
        .router
        .oneshot(upload_request("hospitals.xlsx", sample_csv()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({"detail": "File must be a CSV file"}));
}

#[tokio::test]
async fn test_bulk_upload_rejects_single_column_file() {
    let app = test_app(MockHospitalDirectory::new());

    let response = app
        .router
        .oneshot(upload_request("hospitals.csv", "name\nGeneral Hospital\n"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({"detail": "Invalid CSV file format"}));
}

#[tokio::test]
async fn test_bulk_upload_limits_row_count() {
    let app = test_app(MockHospitalDirectory::new());

    let response = app
        .router
        .oneshot(upload_request("hospitals.csv", &csv_with_rows(21)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"detail": "Maximum 20 hospitals allowed, found 21"})
    );
}

#[tokio::test]
async fn test_bulk_upload_accepts_exactly_twenty_rows() {
    let app = test_app(MockHospitalDirectory::new());

    let response = app
        .router
        .oneshot(upload_request("hospitals.csv", &csv_with_rows(20)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["total_hospitals"], 20);
}

#[tokio::test]
async fn test_bulk_upload_reports_validation_errors() {
    let app = test_app(MockHospitalDirectory::new());

    let response = app
        .router
        .oneshot(upload_request("hospitals.csv", "name,phone\nGeneral Hospital,555-1234\n"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let errors = body["detail"]["validation_errors"].as_array().unwrap();
    assert!(errors.contains(&json!("Missing required header: address")));
    assert!(app.directory.created_count() == 0);
}

#[tokio::test]
async fn test_bulk_upload_without_file_part() {
    let app = test_app(MockHospitalDirectory::new());

    let body = "--other\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nno file here\r\n--other--\r\n";
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/hospital/bulk")
        .header("content-type", "multipart/form-data; boundary=other")
        .body(axum::body::Body::from(body))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_retry_recreates_failed_row() {
    let app = test_app(MockHospitalDirectory::new().fail_creation_for("City Medical Center"));

    let response = app
        .router
        .clone()
        .oneshot(upload_request("hospitals.csv", sample_csv()))
        .await
        .unwrap();
    let batch_id: Uuid = body_json(response).await["batch_id"].as_str().unwrap().parse().unwrap();

    let status = wait_until_terminal(&app.store, batch_id).await;
    assert_eq!(status.status, BatchState::Completed);
    assert!(!status.batch_activated);
    assert_eq!(status.failed_hospitals, 1);

    app.directory.clear_failures();
    let response = app
        .router
        .clone()
        .oneshot(retry_request(&batch_id.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "retrying");
    assert_eq!(body["rows_to_retry"], 1);
    assert_eq!(body["message"], "Retry processing started");

    let status = wait_until_terminal(&app.store, batch_id).await;
    assert!(status.batch_activated);
    assert_eq!(status.successful_hospitals, 11);
    assert_eq!(status.failed_hospitals, 0);
    assert_eq!(app.directory.activations(), vec![batch_id]);
}

#[tokio::test]
async fn test_retry_when_everything_succeeded() {
    let app = test_app(MockHospitalDirectory::new());

    let response = app
        .router
        .clone()
        .oneshot(upload_request("hospitals.csv", sample_csv()))
        .await
        .unwrap();
    let batch_id: Uuid = body_json(response).await["batch_id"].as_str().unwrap().parse().unwrap();
    wait_until_terminal(&app.store, batch_id).await;

    let response = app.router.oneshot(retry_request(&batch_id.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        body_json(response).await,
        json!({
            "batch_id": batch_id,
            "status": "completed",
            "rows_to_retry": 0,
            "message": "All hospitals already successful, no retry needed"
        })
    );
}

#[tokio::test]
async fn test_retry_while_another_retry_runs() {
    let app = test_app(MockHospitalDirectory::new());
    let batch_id = Uuid::new_v4();
    app.store.set_retry_lock(batch_id, Duration::from_secs(60)).await.unwrap();

    let response = app.router.oneshot(retry_request(&batch_id.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "retry_in_progress");
    assert_eq!(body["rows_to_retry"], serde_json::Value::Null);
    assert_eq!(body["message"], "Retry already in progress for this batch");
}

#[tokio::test]
async fn test_retry_while_first_run_is_processing() {
    let app = test_app(MockHospitalDirectory::new().with_delay(Duration::from_millis(50)));

    let response = app
        .router
        .clone()
        .oneshot(upload_request("hospitals.csv", sample_csv()))
        .await
        .unwrap();
    let batch_id: Uuid = body_json(response).await["batch_id"].as_str().unwrap().parse().unwrap();

    let response = app.router.oneshot(retry_request(&batch_id.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["status"], "retry_in_progress");

    let status = wait_until_terminal(&app.store, batch_id).await;
    assert!(status.batch_activated);
    assert_eq!(app.directory.created_count(), 11);
}

#[tokio::test]
async fn test_retry_unknown_batch_is_not_found() {
    let app = test_app(MockHospitalDirectory::new());
    let batch_id = Uuid::new_v4();

    let response = app
        .router
        .oneshot(retry_request(&batch_id.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"detail": "CSV file not found or expired. Cannot retry."})
    );
    assert!(!app.store.check_retry_lock(batch_id).await.unwrap());
}

#[tokio::test]
async fn test_retry_rejects_malformed_batch_id() {
    let app = test_app(MockHospitalDirectory::new());

    let response = app.router.oneshot(retry_request("not-a-uuid")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
