//! Irrigation schedule record handlers.
//!
//! Schedules are inert records on the kit document; no execution engine
//! consumes them. These endpoints only manage the records.
//!
//! POST   /api/schedules/:kit_id        - Add a schedule
//! PUT    /api/schedules/:kit_id/:index - Update a schedule
//! DELETE /api/schedules/:kit_id/:index - Remove a schedule

use axum::extract::{Path, State};
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use agroboost_storage::{IrrigationSchedule, Kit};

use crate::auth::AuthUser;
use crate::models::{ok, ErrorResponse, HandlerResult};
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub threshold_humidity: Option<f64>,
    #[serde(default)]
    pub days_of_week: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScheduleRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub threshold_humidity: Option<f64>,
    pub days_of_week: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

fn owned_kit(state: &ServerState, owner: Uuid, kit_id: Uuid) -> Result<Kit, ErrorResponse> {
    state
        .kits
        .get_for_owner(owner, kit_id)?
        .ok_or_else(|| ErrorResponse::not_found("kit not found"))
}

/// Add a schedule record to a kit.
/// POST /api/schedules/:kit_id
pub async fn create_schedule_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
    Path(kit_id): Path<Uuid>,
    Json(req): Json<CreateScheduleRequest>,
) -> HandlerResult<Value> {
    if req.duration_minutes < 1 {
        return Err(ErrorResponse::bad_request("invalid schedule definition"));
    }
    let mut kit = owned_kit(&state, owner, kit_id)?;

    kit.irrigation_schedules.push(IrrigationSchedule {
        start_time: req.start_time,
        duration_minutes: req.duration_minutes,
        days_of_week: req.days_of_week.unwrap_or_default(),
        threshold_humidity: req.threshold_humidity,
        is_active: true,
        created_at: Utc::now(),
    });
    kit.updated_at = Utc::now();
    state.kits.update(&kit)?;

    ok(json!(kit))
}

/// Update a schedule record by index.
/// PUT /api/schedules/:kit_id/:index
pub async fn update_schedule_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
    Path((kit_id, index)): Path<(Uuid, usize)>,
    Json(req): Json<UpdateScheduleRequest>,
) -> HandlerResult<Value> {
    let mut kit = owned_kit(&state, owner, kit_id)?;

    let schedule = kit
        .irrigation_schedules
        .get_mut(index)
        .ok_or_else(|| ErrorResponse::not_found("schedule not found"))?;

    if let Some(start_time) = req.start_time {
        schedule.start_time = start_time;
    }
    if let Some(duration) = req.duration_minutes {
        if duration < 1 {
            return Err(ErrorResponse::bad_request("invalid schedule definition"));
        }
        schedule.duration_minutes = duration;
    }
    if let Some(threshold) = req.threshold_humidity {
        schedule.threshold_humidity = Some(threshold);
    }
    if let Some(days) = req.days_of_week {
        schedule.days_of_week = days;
    }
    if let Some(active) = req.is_active {
        schedule.is_active = active;
    }

    kit.updated_at = Utc::now();
    state.kits.update(&kit)?;

    ok(json!(kit))
}

/// Remove a schedule record by index.
/// DELETE /api/schedules/:kit_id/:index
pub async fn delete_schedule_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
    Path((kit_id, index)): Path<(Uuid, usize)>,
) -> HandlerResult<Value> {
    let mut kit = owned_kit(&state, owner, kit_id)?;

    if index >= kit.irrigation_schedules.len() {
        return Err(ErrorResponse::not_found("schedule not found"));
    }
    kit.irrigation_schedules.remove(index);
    kit.updated_at = Utc::now();
    state.kits.update(&kit)?;

    ok(json!(kit))
}

/// Router for schedule endpoints.
pub fn schedules_router() -> Router<ServerState> {
    Router::new()
        .route("/schedules/:kit_id", post(create_schedule_handler))
        .route("/schedules/:kit_id/:index", put(update_schedule_handler))
        .route("/schedules/:kit_id/:index", delete(delete_schedule_handler))
}
