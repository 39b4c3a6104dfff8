use std::sync::Arc;

use anyhow::Context;
use bulk_processing_api::api::{create_app, AppState};
use bulk_processing_data::RedisBatchStore;
use bulk_processing_domain::config::AppConfig;
use bulk_processing_domain::directory::HospitalApiClient;
use bulk_processing_domain::health::HealthService;
use bulk_processing_domain::services::{BulkProcessingService, ProcessingSettings};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// The main entry point for the bulk processing API server
///
/// This function:
/// 1. Initializes environment variables from .env file
/// 2. Sets up tracing for logging
/// 3. Loads the configuration
/// 4. Connects to Redis and checks it answers
/// 5. Creates and starts the Axum web application
/// 6. Handles graceful shutdown
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    if dotenv().is_err() {
        eprintln!("Warning: .env file not found or couldn't be read. Using environment variables.");
    }

    // RUST_LOG wins over LOG_LEVEL
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    tracing_subscriber::registry()
        .with(fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(false)
            .with_ansi(true)
            .with_timer(fmt::time::uptime())
            .with_writer(std::io::stdout))
        .with(env_filter)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(service = %config.service_name, env = %config.app_env, "Starting bulk processing API server");

    let store = RedisBatchStore::connect(&config.redis_url(), config.redis_key_prefix.clone())
        .await
        .context("Failed to connect to Redis")?;
    info!(host = %config.redis_host, port = config.redis_port, "*****Connected to Redis*****");

    let store = Arc::new(store);
    let health = HealthService::new(store.clone());
    if !health.liveness().await {
        anyhow::bail!("Redis did not answer PING at startup");
    }

    let directory = HospitalApiClient::new(
        config.hospital_api_base_url.clone(),
        config.hospital_api_request_timeout,
    )
    .context("Failed to build the hospital API client")?;

    let service = BulkProcessingService::new(store, Arc::new(directory), ProcessingSettings::default());
    let state = AppState::new(service, health);

    let docs_title = (!config.is_production()).then_some(config.service_name.as_str());
    let app = create_app(state, docs_title);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    // Serve the application with graceful shutdown support
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
}
