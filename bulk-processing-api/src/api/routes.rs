use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use bulk_processing_domain::health::HealthService;
use bulk_processing_domain::services::BulkProcessingService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::api::handlers::{health, hospital, status};
use crate::openapi::configure_swagger_routes;

/// Interval between two status reads of the WebSocket stream
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BulkProcessingService>,
    pub health: Arc<HealthService>,
    pub poll_interval: Duration,
}

impl AppState {
    pub fn new(service: BulkProcessingService, health: HealthService) -> Self {
        Self {
            service: Arc::new(service),
            health: Arc::new(health),
            poll_interval: STATUS_POLL_INTERVAL,
        }
    }

    /// Poll the batch status more or less often than once per second
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Create the application router
///
/// `docs_title` exposes the OpenAPI document and Swagger UI under that
/// title; `None` leaves them out.
pub fn create_app(state: AppState, docs_title: Option<&str>) -> Router {
    debug!("Creating application router");

    let hospital_routes = Router::new()
        .route("/bulk", post(hospital::bulk_create_hospitals))
        .route("/retry", post(hospital::retry_batch))
        .route("/status", get(status::status_stream))
        .route("/batch/:batch_id/status", get(status::get_batch_status));

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/liveness", get(health::liveness))
        .nest("/api/v1/hospital", hospital_routes)
        .with_state(state);

    debug!("API routes configured");

    let app = match docs_title {
        Some(title) => {
            debug!("Swagger UI merged");
            app.merge(configure_swagger_routes(title))
        }
        None => app,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(cors).layer(TraceLayer::new_for_http())
}
