//! Safety threshold checks.
//!
//! Two fixed bounds guard the pump: battery below 20 % and water below
//! 10 %. The same checks back two different call sites:
//!
//! - [`evaluate_event`] inspects the fields present in one ingestion event
//!   (edge-triggered: a field absent from the event is never re-checked for
//!   that event, and a persisting breach re-fires an identical alert on
//!   every event that re-reports the field; no suppression, no hysteresis).
//! - [`admission_check`] gates a manual pump-ON request against the
//!   currently persisted kit state.

use agroboost_storage::Kit;

use crate::telemetry::TelemetryEvent;

/// Minimum battery level (percent) required to run the pump.
pub const BATTERY_MIN_THRESHOLD: f64 = 20.0;

/// Minimum water level (percent) required to run the pump.
pub const WATER_MIN_THRESHOLD: f64 = 10.0;

/// An alert to be recorded as a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub title: &'static str,
    pub message: String,
}

/// Evaluate threshold checks against the fields present in one ingestion
/// event. Returns one alert draft per breached field.
pub fn evaluate_event(event: &TelemetryEvent) -> Vec<AlertDraft> {
    let mut alerts = Vec::new();

    if let Some(battery) = event.battery {
        if battery < BATTERY_MIN_THRESHOLD {
            alerts.push(AlertDraft {
                title: "Low battery",
                message: format!("Battery of kit {} at {}%", event.device_id, battery),
            });
        }
    }

    if let Some(water) = event.water_level {
        if water < WATER_MIN_THRESHOLD {
            alerts.push(AlertDraft {
                title: "Critical water level",
                message: format!(
                    "Do not run the pump dry: water level of kit {} at {}%",
                    event.device_id, water
                ),
            });
        }
    }

    alerts
}

/// A refused manual pump-ON request: the reason returned to the caller and
/// the alert recorded so the refused attempt is itself observable.
#[derive(Debug, Clone)]
pub struct PumpRejection {
    pub reason: String,
    pub alert: AlertDraft,
}

/// Admission gate for a manual pump-ON request, evaluated against the
/// persisted kit state. Battery is checked before water.
pub fn admission_check(kit: &Kit) -> Option<PumpRejection> {
    if kit.battery_level < BATTERY_MIN_THRESHOLD {
        return Some(PumpRejection {
            reason: format!(
                "cannot start the pump: battery at {}% (minimum {}%)",
                kit.battery_level, BATTERY_MIN_THRESHOLD
            ),
            alert: AlertDraft {
                title: "Low battery",
                message: format!(
                    "Cannot start the pump: battery at {}% (minimum {}%)",
                    kit.battery_level, BATTERY_MIN_THRESHOLD
                ),
            },
        });
    }

    if kit.water_level < WATER_MIN_THRESHOLD {
        return Some(PumpRejection {
            reason: format!(
                "do not run the pump dry: water level at {}% (minimum {}%)",
                kit.water_level, WATER_MIN_THRESHOLD
            ),
            alert: AlertDraft {
                title: "Critical water level",
                message: format!(
                    "Do not run the pump dry: water level at {}% (minimum {}%)",
                    kit.water_level, WATER_MIN_THRESHOLD
                ),
            },
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn event(fields: serde_json::Value) -> TelemetryEvent {
        let mut obj = fields;
        obj["deviceId"] = json!("AGRO-001");
        TelemetryEvent::from_value(obj).unwrap()
    }

    #[test]
    fn test_battery_threshold_is_strict() {
        assert!(evaluate_event(&event(json!({ "battery": 20.0 }))).is_empty());
        let alerts = evaluate_event(&event(json!({ "battery": 19.9 })));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Low battery");
        assert!(alerts[0].message.contains("19.9%"));
    }

    #[test]
    fn test_water_threshold_is_strict() {
        assert!(evaluate_event(&event(json!({ "waterLevel": 10.0 }))).is_empty());
        let alerts = evaluate_event(&event(json!({ "waterLevel": 9.0 })));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Critical water level");
        assert!(alerts[0].message.contains("Do not run the pump dry"));
    }

    #[test]
    fn test_absent_fields_are_never_checked() {
        // An event with no battery field raises no battery alert, no matter
        // what the stored kit state looks like.
        assert!(evaluate_event(&event(json!({ "temperature": 35.0 }))).is_empty());
    }

    #[test]
    fn test_both_breaches_fire_both_alerts() {
        let alerts = evaluate_event(&event(json!({ "battery": 5.0, "waterLevel": 2.0 })));
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn test_admission_checks_battery_before_water() {
        let mut kit = Kit::new("AGRO-001", Uuid::new_v4());
        kit.battery_level = 15.0;
        kit.water_level = 5.0;

        let rejection = admission_check(&kit).expect("should reject");
        assert_eq!(rejection.alert.title, "Low battery");
        assert!(rejection.reason.contains("battery at 15%"));
    }

    #[test]
    fn test_admission_passes_at_healthy_levels() {
        let kit = Kit::new("AGRO-001", Uuid::new_v4());
        assert!(admission_check(&kit).is_none());
    }
}
