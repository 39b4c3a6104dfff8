// bulk-processing-api lib.rs
//
// Public surface of the bulk processing service: the axum router,
// request/response entities and the OpenAPI document.

// Public modules
pub mod api;
pub mod entities;
pub mod openapi;
