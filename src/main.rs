//! Template Payments Server
//!
//! Receives signed payment webhooks and updates marketplace orders and
//! subscriptions.

use std::error::Error;
use std::sync::Arc;

use template_payments::adapters::http::{payment_router, WebhookAppState};
use template_payments::adapters::{InMemoryDocumentStore, PostgresDocumentStore};
use template_payments::config::{AppConfig, ServerConfig};
use template_payments::ports::DocumentStore;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config.server);

    tracing::info!("Starting template-payments v{}", env!("CARGO_PKG_VERSION"));

    config.validate().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;

    // Select the document store
    let store: Arc<dyn DocumentStore> = match &config.database {
        Some(database) => {
            tracing::info!("Connecting to database...");
            let store = PostgresDocumentStore::connect(database).await.map_err(|e| {
                tracing::error!("Failed to connect to database: {}", e);
                e
            })?;
            tracing::info!("Database connection established");
            Arc::new(store)
        }
        None => {
            tracing::warn!("No database configured, using in-memory document store");
            Arc::new(InMemoryDocumentStore::new())
        }
    };

    let state = WebhookAppState::new(
        config.payment.verifier(),
        store,
        config.persistence.collections(),
    );
    let router = payment_router(state);

    // Run the server
    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter; production logs are JSON.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if server.is_production() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Completes when SIGINT (Ctrl+C) or, on Unix, SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
