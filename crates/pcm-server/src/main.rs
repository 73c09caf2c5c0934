//! Entry point for the pcm-server binary.

use pcm_server::{AppState, ServerConfig, StoreBackendKind, app};
use pcm_store::{MemoryStore, MongoStore, StoreBackend, StoreConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    tracing::info!("Starting pcm-server");
    tracing::info!(
        port = config.port,
        log_level = %config.log_level,
        environment = %config.environment,
        "Configuration loaded"
    );

    // Connect to the document store
    let store = match config.store_backend {
        StoreBackendKind::Mongo => {
            let store_config = StoreConfig::from_env()?;
            StoreBackend::from(MongoStore::connect(store_config).await?)
        }
        StoreBackendKind::Memory => {
            tracing::warn!("Using the in-memory store; it starts empty");
            StoreBackend::from(MemoryStore::new())
        }
    };
    tracing::info!(backend = store.name(), "Store ready");

    // Build application state
    let state = AppState::new(store, config.clone());

    // Build router with middleware
    let cors = build_cors_layer(&config.cors_allowed_origins)?;
    let router = app(state).layer(cors);

    // Create listener
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber.
fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build CORS layer from configuration.
fn build_cors_layer(allowed_origins: &str) -> Result<CorsLayer, http::header::InvalidHeaderValue> {
    let origin = if allowed_origins == "*" {
        AllowOrigin::any()
    } else {
        // Parse comma-separated origins
        let origins = allowed_origins
            .split(',')
            .map(|s| s.trim().parse())
            .collect::<Result<Vec<http::HeaderValue>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
