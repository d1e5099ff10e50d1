//! The ingestion use case.
//!
//! Both ingress transports (the MQTT telemetry listener and the direct
//! HTTP endpoint) hand their normalized events to this one service, so an
//! event produces identical kit state, readings, and notifications no
//! matter which way it arrived.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use agroboost_core::{Error, Result};
use agroboost_storage::{KitStore, Notification, NotificationCategory, NotificationStore, ReadingStore};

use crate::telemetry::TelemetryEvent;
use crate::thresholds;

/// Outcome of one ingestion event.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// The reporting device.
    pub device_id: String,
    /// Number of readings recorded.
    pub count: usize,
    /// The single timestamp shared by every reading of this event.
    pub timestamp: DateTime<Utc>,
}

/// Ingestion service shared by all transports.
pub struct IngestionService {
    kits: Arc<KitStore>,
    readings: Arc<ReadingStore>,
    notifications: Arc<NotificationStore>,
}

impl IngestionService {
    pub fn new(
        kits: Arc<KitStore>,
        readings: Arc<ReadingStore>,
        notifications: Arc<NotificationStore>,
    ) -> Self {
        Self {
            kits,
            readings,
            notifications,
        }
    }

    /// Ingest one normalized telemetry event:
    ///
    /// 1. Resolve the kit by device id; unknown devices abort before any
    ///    store mutation.
    /// 2. Apply the state patch and stamp `updated_at`; fields absent from
    ///    the event retain their prior values.
    /// 3. Append one reading per present field, all sharing one timestamp.
    /// 4. Run the threshold checks over the fields of *this* event and
    ///    record an alert notification per breach.
    pub fn ingest(&self, event: &TelemetryEvent) -> Result<IngestReport> {
        let timestamp = Utc::now();

        let kit = self
            .kits
            .apply_patch(&event.device_id, &event.patch(), timestamp)
            .map_err(agroboost_core::Error::from)?
            .ok_or_else(|| {
                Error::NotFound(format!("no kit registered for device {}", event.device_id))
            })?;

        let entries = event.readings(kit.id, timestamp);
        if !entries.is_empty() {
            self.readings
                .append_batch(&entries)
                .map_err(agroboost_core::Error::from)?;
        }

        for draft in thresholds::evaluate_event(event) {
            let notification = Notification::new(
                kit.owner_id,
                kit.id,
                draft.title,
                draft.message,
                NotificationCategory::Alert,
            );
            self.notifications
                .append(&notification)
                .map_err(agroboost_core::Error::from)?;
            tracing::warn!(
                device_id = %event.device_id,
                title = %notification.title,
                "threshold alert raised"
            );
        }

        tracing::debug!(
            device_id = %event.device_id,
            count = entries.len(),
            "telemetry ingested"
        );

        Ok(IngestReport {
            device_id: event.device_id.clone(),
            count: entries.len(),
            timestamp,
        })
    }
}
