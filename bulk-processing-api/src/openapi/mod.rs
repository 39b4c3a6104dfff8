use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes(title: &str) -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc(title))
}

/// OpenAPI document titled after the running service
pub fn api_doc(title: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = title.to_string();
    doc
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,
        crate::api::handlers::health::liveness,

        // Hospital endpoints
        crate::api::handlers::hospital::bulk_create_hospitals,
        crate::api::handlers::hospital::retry_batch,
        crate::api::handlers::status::get_batch_status,
        crate::api::handlers::status::status_stream
    ),
    components(
        schemas(
            // Entities
            crate::entities::BulkCreateResponse,
            crate::entities::BulkUploadForm,
            crate::entities::DuplicateHospital,
            crate::entities::RetryRequest,
            crate::entities::RetryResponse,
            crate::entities::ErrorResponse,

            // Batch documents
            bulk_processing_data::BatchStatus,
            bulk_processing_data::BatchState,
            bulk_processing_data::HospitalResult,
            bulk_processing_data::ResultStatus
        )
    ),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "hospital", description = "Bulk hospital creation, status and retry")
    ),
    info(
        title = "Bulk Processing API",
        version = "0.1.0",
        description = "Creates hospitals in bulk from CSV uploads",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
struct ApiDoc;
