// Bulk Processing Domain
// This crate contains the business logic of the bulk hospital processing service

// Environment configuration
pub mod config;

// CSV upload parsing, validation and de-duplication
pub mod intake;

// Client for the external hospital directory API
pub mod directory;

// Batch processing and retry services
pub mod services;

// Liveness and readiness checks
pub mod health;

// Re-export the data layer for convenience
pub use bulk_processing_data as data;

// Testing utilities - only available in tests or with the mock feature
#[cfg(any(test, feature = "mock"))]
pub mod testing;
