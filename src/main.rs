//! vanwatt - Power telemetry server.

use vanwatt::auth::AuthPolicy;
use vanwatt::config::ServerConfig;
use vanwatt::db::Store;
use vanwatt::retention::RetentionManager;
use vanwatt::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vanwatt=info".parse()?),
        )
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting vanwatt on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    if AuthPolicy::from_pin(cfg.dashboard_pin.clone()).is_enabled() {
        tracing::info!("Dashboard pin gate enabled");
    } else {
        tracing::warn!("No dashboard pin configured; the API is open");
    }

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Prune old readings only when a retention bound is configured
    if let Some(days) = cfg.retention_days {
        tracing::info!("Pruning readings older than {} days", days);
        RetentionManager::new(store.clone(), days).start();
    }

    // Start web server
    let server = Server::new(cfg, store);
    server.start().await?;

    Ok(())
}
