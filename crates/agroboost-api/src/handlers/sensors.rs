//! Sensor data handlers.
//!
//! POST /api/sensors/log            - Direct (HTTP) telemetry ingestion
//! GET  /api/sensors/:kit_id        - Readings in a window, newest-first
//! GET  /api/sensors/:kit_id/latest - Latest reading per kind
//! GET  /api/sensors/:kit_id/type   - Readings of one kind in a window

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use agroboost_devices::TelemetryEvent;
use agroboost_storage::{Kit, ReadingKind, ReadingWindow};

use crate::auth::AuthUser;
use crate::models::{ok, ErrorResponse, HandlerResult};
use crate::state::ServerState;

/// Kinds the dashboard's "latest" card displays.
const LATEST_KINDS: &[ReadingKind] = &[
    ReadingKind::Humidity,
    ReadingKind::Temp,
    ReadingKind::Voltage,
    ReadingKind::Current,
];

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TypedPeriodQuery {
    #[serde(rename = "type")]
    pub kind: String,
    pub period: Option<String>,
}

fn parse_window(period: Option<&str>) -> Result<ReadingWindow, ErrorResponse> {
    ReadingWindow::from_param(period.unwrap_or("24h"))
        .ok_or_else(|| ErrorResponse::bad_request("invalid period parameter"))
}

fn owned_kit(state: &ServerState, owner: Uuid, kit_id: Uuid) -> Result<Kit, ErrorResponse> {
    state
        .kits
        .get_for_owner(owner, kit_id)?
        .ok_or_else(|| ErrorResponse::not_found("kit not found"))
}

/// Ingest one telemetry report over HTTP. Unauthenticated: devices in the
/// field hold no credentials. The payload goes through the exact same
/// normalizer and ingestion use case as the MQTT path.
/// POST /api/sensors/log
pub async fn log_sensor_data_handler(
    State(state): State<ServerState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ErrorResponse> {
    let event = TelemetryEvent::from_slice(&body)?;
    let report = state.ingestion.ingest(&event)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "sensor data recorded",
            "count": report.count,
            "timestamp": report.timestamp,
        })),
    ))
}

/// All readings for a kit within a fixed window, newest-first.
/// GET /api/sensors/:kit_id?period=24h|7d|30d
pub async fn get_sensor_data_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
    Path(kit_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> HandlerResult<Value> {
    let window = parse_window(query.period.as_deref())?;
    let kit = owned_kit(&state, owner, kit_id)?;

    let data = state.readings.query(&kit.device_id, None, window)?;
    ok(json!({ "data": data }))
}

/// The most recent reading per displayed kind. Kinds are resolved
/// independently; only when every kind is absent is this a 404.
/// GET /api/sensors/:kit_id/latest
pub async fn get_latest_sensor_data_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
    Path(kit_id): Path<Uuid>,
) -> HandlerResult<Value> {
    let kit = owned_kit(&state, owner, kit_id)?;

    let data = state.readings.latest(&kit.device_id, LATEST_KINDS)?;
    ok(json!({ "data": data }))
}

/// Readings of one kind within a fixed window, newest-first.
/// GET /api/sensors/:kit_id/type?type=humidity&period=24h
pub async fn get_sensor_data_by_type_handler(
    State(state): State<ServerState>,
    AuthUser(owner): AuthUser,
    Path(kit_id): Path<Uuid>,
    Query(query): Query<TypedPeriodQuery>,
) -> HandlerResult<Value> {
    let kind = ReadingKind::from_string(&query.kind)
        .ok_or_else(|| ErrorResponse::bad_request("invalid type or period"))?;
    let window = parse_window(query.period.as_deref())
        .map_err(|_| ErrorResponse::bad_request("invalid type or period"))?;
    let kit = owned_kit(&state, owner, kit_id)?;

    let data = state.readings.query(&kit.device_id, Some(kind), window)?;
    ok(json!({ "data": data }))
}

/// Router for sensor endpoints.
pub fn sensors_router() -> Router<ServerState> {
    Router::new()
        .route("/sensors/log", post(log_sensor_data_handler))
        .route("/sensors/:kit_id", get(get_sensor_data_handler))
        .route("/sensors/:kit_id/latest", get(get_latest_sensor_data_handler))
        .route("/sensors/:kit_id/type", get(get_sensor_data_by_type_handler))
}
