//! Router assembly and server lifecycle.

use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::auth;
use crate::handlers;
use crate::state::ServerState;

/// Service banner, mirroring what field technicians expect at the root.
/// GET /
async fn service_info_handler() -> Json<Value> {
    Json(json!({
        "name": "AGRO BOOST API",
        "version": crate::VERSION,
        "endpoints": {
            "auth": "/api/auth",
            "kits": "/api/kits",
            "pumps": "/api/pumps",
            "schedules": "/api/schedules",
            "sensors": "/api/sensors",
            "notifications": "/api/notifications",
        },
    }))
}

/// Build the full application router.
pub fn create_router(state: ServerState) -> Router {
    let api = Router::new()
        .merge(auth::auth_router())
        .merge(handlers::kits::kits_router())
        .merge(handlers::sensors::sensors_router())
        .merge(handlers::pumps::pumps_router())
        .merge(handlers::notifications::notifications_router())
        .merge(handlers::schedules::schedules_router());

    Router::new()
        .route("/", get(service_info_handler))
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the API until a shutdown signal arrives.
pub async fn run(state: ServerState, bind: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
