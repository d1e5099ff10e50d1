//! Manual pump control handler.
//!
//! POST /api/pumps/:kit_id/control - Switch a kit's pump on or off

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{ok, HandlerResult};
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct ControlPumpRequest {
    pub status: bool,
}

/// Switch the pump. A pump-ON request is admitted only when the persisted
/// battery and water levels clear the safety thresholds; the rejection
/// itself is recorded as an alert notification. The device command is
/// published fire-and-forget after the response is decided.
/// POST /api/pumps/:kit_id/control
pub async fn control_pump_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
    Path(kit_id): Path<Uuid>,
    Json(req): Json<ControlPumpRequest>,
) -> HandlerResult<Value> {
    let kit = state.pumps.control(owner, kit_id, req.status)?;
    ok(json!(kit))
}

/// Router for pump endpoints.
pub fn pumps_router() -> Router<ServerState> {
    Router::new().route("/pumps/:kit_id/control", post(control_pump_handler))
}
