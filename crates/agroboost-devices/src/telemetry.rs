//! Telemetry normalization.
//!
//! Field devices report over two wire shapes:
//!
//! 1. Plain sensor JSON, e.g.
//!    `{"deviceId":"AGRO-001","battery":76,"waterLevel":40}`
//! 2. A LoRaWAN gateway uplink envelope, e.g.
//!    `{"end_device_ids":{"device_id":"AGRO-001"},
//!      "uplink_message":{"decoded_payload":{"battery":76}}}`
//!
//! The envelope is flattened into the plain shape and then parsed by the
//! identical path, so envelope handling can never grow semantics of its
//! own. Field presence, not value range, decides what gets recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use agroboost_core::{Error, Result};
use agroboost_storage::{KitPatch, Reading, ReadingKind};

/// Raw wire payload in the plain sensor shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    battery: Option<f64>,
    #[serde(default)]
    water_level: Option<f64>,
    #[serde(default)]
    voltage: Option<f64>,
    #[serde(default)]
    current: Option<f64>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_pump_status")]
    pump_status: Option<bool>,
}

/// `pumpStatus` arrives as a bool from newer firmware and as the string
/// `"ON"`/`"OFF"` from older revisions. `true` and `"ON"` switch the pump
/// on; any other present value switches it off.
fn deserialize_pump_status<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    // Only called when the field is present; absence falls back to the
    // `default` attribute.
    let value = Value::deserialize(deserializer)?;
    Ok(Some(value == Value::Bool(true) || value.as_str() == Some("ON")))
}

/// One normalized ingestion event: the reporting device plus whichever
/// measurement fields were present on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub device_id: String,
    pub battery: Option<f64>,
    pub water_level: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pump_status: Option<bool>,
}

impl TelemetryEvent {
    /// Decode raw payload bytes in either wire shape.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::Validation(format!("malformed telemetry payload: {}", e)))?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON value in either wire shape.
    pub fn from_value(value: Value) -> Result<Self> {
        let flat = unwrap_uplink_envelope(value);
        let raw: RawPayload = serde_json::from_value(flat)
            .map_err(|e| Error::Validation(format!("invalid telemetry payload: {}", e)))?;

        let device_id = raw
            .device_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Validation("deviceId is required".to_string()))?;

        Ok(Self {
            device_id,
            battery: raw.battery,
            water_level: raw.water_level,
            voltage: raw.voltage,
            current: raw.current,
            temperature: raw.temperature,
            humidity: raw.humidity,
            pump_status: raw.pump_status,
        })
    }

    /// The kit state patch this event carries. Temperature and humidity
    /// become readings only and never patch the kit aggregate.
    pub fn patch(&self) -> KitPatch {
        KitPatch {
            battery_level: self.battery,
            water_level: self.water_level,
            voltage: self.voltage,
            current: self.current,
            pump_status: self.pump_status,
        }
    }

    /// One reading per field present, all sharing the event timestamp.
    pub fn readings(&self, kit_id: Uuid, timestamp: DateTime<Utc>) -> Vec<Reading> {
        let mut entries = Vec::new();
        let mut push = |kind: ReadingKind, value: Option<f64>| {
            if let Some(value) = value {
                entries.push(Reading::new(kit_id, &self.device_id, timestamp, kind, value));
            }
        };

        push(ReadingKind::Battery, self.battery);
        push(ReadingKind::WaterLevel, self.water_level);
        push(ReadingKind::Voltage, self.voltage);
        push(ReadingKind::Current, self.current);
        push(ReadingKind::Temp, self.temperature);
        push(ReadingKind::Humidity, self.humidity);
        entries
    }
}

/// Flatten a gateway uplink envelope into the plain sensor shape. Anything
/// that is not an envelope passes through untouched.
fn unwrap_uplink_envelope(value: Value) -> Value {
    let is_envelope = value
        .as_object()
        .map(|obj| obj.contains_key("end_device_ids") && obj.contains_key("uplink_message"))
        .unwrap_or(false);
    if !is_envelope {
        return value;
    }

    let mut flat = match value.pointer("/uplink_message/decoded_payload") {
        Some(Value::Object(fields)) => fields.clone(),
        _ => serde_json::Map::new(),
    };
    if let Some(device_id) = value.pointer("/end_device_ids/device_id") {
        flat.insert("deviceId".to_string(), device_id.clone());
    }
    Value::Object(flat)
}
