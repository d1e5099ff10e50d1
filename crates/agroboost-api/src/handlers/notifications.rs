//! Notification handlers.
//!
//! GET   /api/notifications          - List the caller's notifications
//! PATCH /api/notifications/:id/read - Mark one notification read

use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::Router;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{ok, HandlerResult};
use crate::state::ServerState;

/// List all notifications for the caller, newest-first.
/// GET /api/notifications
pub async fn list_notifications_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
) -> HandlerResult<Value> {
    let notifications = state.notifications.list_for_owner(owner)?;
    ok(json!({ "notifications": notifications }))
}

/// Mark one notification read. Idempotent; scoped to the caller's own
/// notifications.
/// PATCH /api/notifications/:id/read
pub async fn mark_read_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
) -> HandlerResult<Value> {
    let notification = state.notifications.mark_read(owner, id)?;
    ok(json!(notification))
}

/// Router for notification endpoints.
pub fn notifications_router() -> Router<ServerState> {
    Router::new()
        .route("/notifications", get(list_notifications_handler))
        .route("/notifications/:id/read", patch(mark_read_handler))
}
