use axum::http::HeaderName;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{error, info};

use posts_api::{
    auth::AccessGate,
    config::{Config, StorageBackend},
    middleware::init_tracing,
    routes::create_router,
    state::AppState,
    store::{ApiKeyStore, MemoryStore, PgStore, PostStore},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                "Configuration loaded successfully (backend: {:?}, production: {})",
                config.storage,
                config.environment.is_production()
            );
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let state = match build_state(&config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize storage: {:#}", e);
            std::process::exit(1);
        }
    };

    let app = create_router(state, config.request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Start the server with graceful shutdown handling
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Select the storage backend and wire the access gate to it
async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let (posts, keys): (Arc<dyn PostStore>, Arc<dyn ApiKeyStore>) = match config.storage {
        StorageBackend::Memory => {
            let store = Arc::new(MemoryStore::new().with_api_keys(config.auth.seed_keys.clone()));
            info!("Using in-memory storage; posts reset on restart");
            (store.clone() as Arc<dyn PostStore>, store as Arc<dyn ApiKeyStore>)
        }
        StorageBackend::Postgres => {
            let database = config
                .database
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Database credentials are missing"))?;

            let store = Arc::new(PgStore::new(database).await?);
            info!("Database connection established");

            store.migrate().await?;
            (store.clone() as Arc<dyn PostStore>, store as Arc<dyn ApiKeyStore>)
        }
    };

    let gate = if config.auth.enabled {
        let header = HeaderName::from_bytes(config.auth.header_name.as_bytes())?;
        info!(
            "API key metering enabled on header {} with quota {}",
            header, config.auth.quota
        );
        AccessGate::metered(keys, header, config.auth.quota)
    } else {
        info!("API key metering disabled");
        AccessGate::Open
    };

    Ok(AppState::new(posts, gate))
}

/// Graceful shutdown signal handler
/// Listens for SIGTERM and SIGINT signals
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, initiating graceful shutdown");
        },
    }
}
