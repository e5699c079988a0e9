//! Web server module.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::*;

use crate::auth::AuthPolicy;
use crate::config::ServerConfig;
use crate::db::Store;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub auth: AuthPolicy,
}

/// Web server for vanwatt.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>) -> Self {
        let auth = AuthPolicy::from_pin(config.dashboard_pin.clone());
        Self {
            config,
            state: AppState { store, auth },
        }
    }

    /// Build the router with all routes.
    ///
    /// `/health` stays outside the pin gate; every reading route sits
    /// behind it.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let gated = Router::new()
            .route("/readings", post(handlers::handle_add_reading))
            .route("/readings/latest", get(handlers::handle_latest_reading))
            .route("/readings/window", get(handlers::handle_reading_window))
            .route("/readings/stats", get(handlers::handle_window_stats))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                handlers::require_pin,
            ));

        Router::new()
            .route("/health", get(handlers::handle_health))
            .merge(gated)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
