//! HTTP API for the AGRO BOOST backend.
//!
//! Thin axum handlers over the shared services: the direct telemetry
//! ingestion endpoint, sensor queries, manual pump control, notifications,
//! kit listing, schedule records, and the auth endpoints. All domain logic
//! lives in `agroboost-devices`; handlers only translate HTTP to service
//! calls and the error taxonomy to status codes.

pub mod auth;
pub mod handlers;
pub mod models;
pub mod server;
pub mod state;

pub use auth::{AuthUser, TokenKeys};
pub use models::{ok, ErrorResponse, HandlerResult};
pub use server::{create_router, run};
pub use state::ServerState;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
