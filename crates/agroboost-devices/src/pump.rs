//! Manual pump control.
//!
//! A control request is validated against the persisted kit state, then
//! persisted, then published to the device, in that order. The publish is
//! fire-and-forget: it runs on a detached task, its outcome reaches only
//! the log, and it never rolls back the already-committed kit state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agroboost_core::{Error, Result};
use agroboost_storage::{Kit, KitStore, Notification, NotificationCategory, NotificationStore};

use crate::thresholds;

/// Command message published to a device's control topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpCommand {
    /// `"ON"` or `"OFF"`.
    pub command: String,
    /// When the command was issued.
    pub timestamp: DateTime<Utc>,
}

impl PumpCommand {
    pub fn new(status: bool) -> Self {
        Self {
            command: if status { "ON" } else { "OFF" }.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Outbound channel for pump commands. The MQTT gateway implements this;
/// tests substitute a recorder.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Deliver one command to one device, at most once.
    async fn publish(&self, device_id: &str, command: &PumpCommand) -> Result<()>;
}

/// Sink used when the MQTT side is disabled: commands are logged and
/// dropped.
pub struct NoopCommandSink;

#[async_trait]
impl CommandSink for NoopCommandSink {
    async fn publish(&self, device_id: &str, command: &PumpCommand) -> Result<()> {
        tracing::warn!(
            device_id = %device_id,
            command = %command.command,
            "MQTT disabled, pump command dropped"
        );
        Ok(())
    }
}

/// Pump command dispatcher.
pub struct PumpService {
    kits: Arc<KitStore>,
    notifications: Arc<NotificationStore>,
    sink: Arc<dyn CommandSink>,
}

impl PumpService {
    pub fn new(
        kits: Arc<KitStore>,
        notifications: Arc<NotificationStore>,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        Self {
            kits,
            notifications,
            sink,
        }
    }

    /// Switch a kit's pump on or off on behalf of its owner.
    ///
    /// A pump-ON request is admitted only when the persisted battery and
    /// water levels clear the safety thresholds; a refusal records the
    /// corresponding alert notification and changes nothing else. On
    /// success the new state is persisted, a success notification is
    /// recorded, and the command is published to the device on a detached
    /// task.
    pub fn control(&self, owner_id: Uuid, kit_id: Uuid, status: bool) -> Result<Kit> {
        let mut kit = self
            .kits
            .get_for_owner(owner_id, kit_id)
            .map_err(agroboost_core::Error::from)?
            .ok_or_else(|| Error::NotFound(format!("kit {}", kit_id)))?;

        if status {
            if let Some(rejection) = thresholds::admission_check(&kit) {
                let notification = Notification::new(
                    owner_id,
                    kit.id,
                    rejection.alert.title,
                    rejection.alert.message,
                    NotificationCategory::Alert,
                );
                self.notifications
                    .append(&notification)
                    .map_err(agroboost_core::Error::from)?;
                tracing::warn!(
                    device_id = %kit.device_id,
                    reason = %rejection.reason,
                    "pump-ON request rejected"
                );
                return Err(Error::ThresholdRejection(rejection.reason));
            }
        }

        kit.pump_status = status;
        kit.updated_at = Utc::now();
        self.kits.update(&kit).map_err(agroboost_core::Error::from)?;

        let notification = Notification::new(
            owner_id,
            kit.id,
            if status { "Pump started" } else { "Pump stopped" },
            format!(
                "The pump was manually switched {}",
                if status { "on" } else { "off" }
            ),
            NotificationCategory::Success,
        );
        self.notifications
            .append(&notification)
            .map_err(agroboost_core::Error::from)?;

        self.dispatch(kit.device_id.clone(), status);

        Ok(kit)
    }

    /// Publish the command on a detached task. The outcome is logged and
    /// goes nowhere else.
    fn dispatch(&self, device_id: String, status: bool) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let command = PumpCommand::new(status);
            match sink.publish(&device_id, &command).await {
                Ok(()) => {
                    tracing::info!(
                        device_id = %device_id,
                        command = %command.command,
                        "pump command published"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        device_id = %device_id,
                        error = %e,
                        "failed to publish pump command"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Records every publish attempt on a channel.
    struct RecordingSink {
        tx: mpsc::UnboundedSender<(String, String)>,
        fail: bool,
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn publish(&self, device_id: &str, command: &PumpCommand) -> Result<()> {
            self.tx
                .send((device_id.to_string(), command.command.clone()))
                .ok();
            if self.fail {
                Err(Error::Transport("broker unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn setup(
        fail_publish: bool,
    ) -> (
        PumpService,
        Arc<KitStore>,
        Arc<NotificationStore>,
        mpsc::UnboundedReceiver<(String, String)>,
    ) {
        let kits = Arc::new(KitStore::memory().unwrap());
        let notifications = Arc::new(NotificationStore::memory().unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(RecordingSink {
            tx,
            fail: fail_publish,
        });
        let service = PumpService::new(kits.clone(), notifications.clone(), sink);
        (service, kits, notifications, rx)
    }

    fn provision(kits: &KitStore, battery: f64, water: f64) -> Kit {
        let mut kit = Kit::new("AGRO-001", Uuid::new_v4());
        kit.battery_level = battery;
        kit.water_level = water;
        kits.insert(&kit).unwrap();
        kit
    }

    #[tokio::test]
    async fn test_pump_on_rejected_at_low_battery() {
        let (service, kits, notifications, mut rx) = setup(false);
        let kit = provision(&kits, 15.0, 50.0);

        let err = service.control(kit.owner_id, kit.id, true).unwrap_err();
        assert!(matches!(err, Error::ThresholdRejection(_)));

        // State unchanged, one alert recorded, nothing published.
        let stored = kits.get(kit.id).unwrap().unwrap();
        assert!(!stored.pump_status);
        let notes = notifications.list_for_owner(kit.owner_id).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Low battery");
        assert_eq!(notes[0].category, NotificationCategory::Alert);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pump_on_succeeds_at_healthy_levels() {
        let (service, kits, notifications, mut rx) = setup(false);
        let kit = provision(&kits, 50.0, 50.0);

        let updated = service.control(kit.owner_id, kit.id, true).unwrap();
        assert!(updated.pump_status);
        assert!(kits.get(kit.id).unwrap().unwrap().pump_status);

        let notes = notifications.list_for_owner(kit.owner_id).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Pump started");
        assert_eq!(notes[0].category, NotificationCategory::Success);

        // Exactly one publish attempt.
        let (device_id, command) = rx.recv().await.expect("publish expected");
        assert_eq!(device_id, "AGRO-001");
        assert_eq!(command, "ON");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_affect_result() {
        let (service, kits, _notifications, mut rx) = setup(true);
        let kit = provision(&kits, 50.0, 50.0);

        let updated = service.control(kit.owner_id, kit.id, true).unwrap();
        assert!(updated.pump_status);

        // The attempt was made; its failure stayed in the logs.
        assert!(rx.recv().await.is_some());
        assert!(kits.get(kit.id).unwrap().unwrap().pump_status);
    }

    #[tokio::test]
    async fn test_pump_off_skips_admission_gate() {
        let (service, kits, _notifications, mut rx) = setup(false);
        let mut kit = provision(&kits, 5.0, 5.0);
        kit.pump_status = true;
        kits.update(&kit).unwrap();

        // Switching OFF is always admitted, even with breached levels.
        let updated = service.control(kit.owner_id, kit.id, false).unwrap();
        assert!(!updated.pump_status);

        let (_, command) = rx.recv().await.unwrap();
        assert_eq!(command, "OFF");
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_kit_is_not_found() {
        let (service, kits, _notifications, _rx) = setup(false);
        let kit = provision(&kits, 50.0, 50.0);

        let err = service.control(Uuid::new_v4(), kit.id, true).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = service
            .control(kit.owner_id, Uuid::new_v4(), true)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
