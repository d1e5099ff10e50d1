//! Kit listing handlers.
//!
//! GET /api/kits          - List the caller's kits
//! GET /api/kits/:kit_id  - Get one kit

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{ok, ErrorResponse, HandlerResult};
use crate::state::ServerState;

/// List all kits owned by the caller.
/// GET /api/kits
pub async fn list_kits_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
) -> HandlerResult<Value> {
    let kits = state.kits.list_for_owner(owner)?;
    ok(json!({ "kits": kits }))
}

/// Get one kit by id.
/// GET /api/kits/:kit_id
pub async fn get_kit_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
    Path(kit_id): Path<Uuid>,
) -> HandlerResult<Value> {
    let kit = state
        .kits
        .get_for_owner(owner, kit_id)?
        .ok_or_else(|| ErrorResponse::not_found("kit not found"))?;
    ok(json!(kit))
}

/// Router for kit endpoints.
pub fn kits_router() -> Router<ServerState> {
    Router::new()
        .route("/kits", get(list_kits_handler))
        .route("/kits/:kit_id", get(get_kit_handler))
}
