//! vanwatt-watch - Headless dashboard client.
//!
//! Runs the sync coordinator against a vanwatt server and logs each
//! cycle's view, the same loop a dashboard frontend would drive.

use vanwatt::sync::{ApiClient, SyncCoordinator, DEFAULT_SYNC_INTERVAL, DEFAULT_WINDOW_HOURS};

use std::env;
use std::time::Duration;
use tokio::{signal, sync::broadcast};
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

    let base_url =
        env::var("VANWATT_API_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
    let pin = env::var("VANWATT_PIN").ok().filter(|p| !p.is_empty());
    let interval = env::var("VANWATT_SYNC_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SYNC_INTERVAL);
    let window_hours = env::var("VANWATT_WINDOW_HOURS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_WINDOW_HOURS);

    let client = ApiClient::new(base_url.clone())?;

    // Surface the gate state up front so a missing pin is obvious.
    match client.fetch_health().await {
        Ok(health) => {
            if health.auth_enabled && pin.is_none() {
                tracing::warn!("Server requires a pin and VANWATT_PIN is not set");
            }
        }
        Err(e) => tracing::warn!("Health check against {} failed: {}", base_url, e),
    }

    tracing::info!(
        "Watching {} every {}s over a {}h window",
        base_url,
        interval.as_secs(),
        window_hours
    );

    let coordinator = SyncCoordinator::new(client, interval, window_hours, pin);

    let (stop_tx, stop_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(());
    });

    coordinator.run(stop_rx).await;
    tracing::info!("Shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
