use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, AppState};
use crate::relay::Relay;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
    pub log_capacity: usize,
    pub scan_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_send_queue: 256,
            log_capacity: 1000,
            scan_capacity: 100,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/data", post(handlers::ingest))
        .route("/api/esp32/commands", get(handlers::device_stream))
        .route("/api/esp32/status", get(handlers::device_status))
        .route("/api/stream", get(handlers::dashboard_stream))
        .route(
            "/api/device-scans",
            get(handlers::list_scans).delete(handlers::clear_scans),
        )
        .route("/api/device-scans/latest", get(handlers::latest_scan))
        .route("/api/device-scan/{id}", get(handlers::get_scan))
        .route("/api/check-now", post(handlers::check_now))
        .route(
            "/api/logs",
            get(handlers::list_logs).delete(handlers::clear_logs),
        )
        .route("/api/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let relay = Arc::new(Relay::new(
        config.log_capacity,
        config.scan_capacity,
        config.max_send_queue,
    ));

    let router = build_router(AppState {
        relay: Arc::clone(&relay),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Pulse relay listening");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        relay,
        _server: server,
    })
}

/// Handle returned by `start()` — keeps the serve task alive.
pub struct ServerHandle {
    pub port: u16,
    pub relay: Arc<Relay>,
    _server: tokio::task::JoinHandle<()>,
}
