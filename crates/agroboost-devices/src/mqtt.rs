//! MQTT gateway, telemetry listener, and command sink.
//!
//! ## Topics
//!
//! | Direction | Topic | Payload |
//! |-----------|-------|---------|
//! | in | `agroboost/sensors/{deviceId}` | plain sensor JSON |
//! | in | `agroboost/lorawan/{deviceId}` | gateway uplink envelope |
//! | out | `agroboost/pump/{deviceId}/control` | `{"command","timestamp"}` |
//!
//! One [`MqttGateway`] (a single `rumqttc::AsyncClient`) is constructed at
//! startup and passed by `Arc` into both the listener and the pump command
//! sink; there is deliberately no hidden process-wide connection object.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use uuid::Uuid;

use agroboost_core::{Error, Result};

use crate::ingest::IngestionService;
use crate::pump::{CommandSink, PumpCommand};
use crate::telemetry::TelemetryEvent;

/// Subscription filter for plain sensor telemetry.
pub const SENSOR_TOPIC_FILTER: &str = "agroboost/sensors/+";

/// Subscription filter for gateway uplink envelopes.
pub const UPLINK_TOPIC_FILTER: &str = "agroboost/lorawan/+";

const SENSOR_TOPIC_PREFIX: &str = "agroboost/sensors/";
const UPLINK_TOPIC_PREFIX: &str = "agroboost/lorawan/";

/// Control topic for one device's pump.
pub fn pump_command_topic(device_id: &str) -> String {
    format!("agroboost/pump/{}/control", device_id)
}

/// Shared MQTT client handle.
pub struct MqttGateway {
    client: AsyncClient,
}

impl MqttGateway {
    /// Build the client and its event loop. The event loop must be handed
    /// to [`TelemetryListener::run`] (or polled by the caller) for the
    /// connection to make progress.
    pub fn connect(host: &str, port: u16) -> (Arc<Self>, EventLoop) {
        let client_id = format!("agroboost-gateway-{}", Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(60));

        let (client, eventloop) = AsyncClient::new(options, 64);
        (Arc::new(Self { client }), eventloop)
    }

    /// Subscribe to both telemetry topic namespaces.
    pub async fn subscribe_telemetry(&self) -> Result<()> {
        for filter in [SENSOR_TOPIC_FILTER, UPLINK_TOPIC_FILTER] {
            self.client
                .subscribe(filter, QoS::AtLeastOnce)
                .await
                .map_err(|e| Error::Transport(format!("subscribe {} failed: {}", filter, e)))?;
        }
        Ok(())
    }

    /// Publish a JSON payload, at-least-once, not retained.
    pub async fn publish_json<T: Serialize>(&self, topic: &str, payload: &T) -> Result<()> {
        let bytes =
            serde_json::to_vec(payload).map_err(|e| Error::Transport(e.to_string()))?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, bytes)
            .await
            .map_err(|e| Error::Transport(format!("publish to {} failed: {}", topic, e)))
    }
}

/// Consumes telemetry publishes off the broker and feeds them to the
/// ingestion use case.
pub struct TelemetryListener {
    gateway: Arc<MqttGateway>,
    ingestion: Arc<IngestionService>,
}

impl TelemetryListener {
    pub fn new(gateway: Arc<MqttGateway>, ingestion: Arc<IngestionService>) -> Self {
        Self { gateway, ingestion }
    }

    /// Drive the MQTT event loop forever. Subscriptions are (re-)issued on
    /// every connection acknowledgement, so they survive reconnects. A bad
    /// event never stops the loop: errors are confined to the event that
    /// caused them.
    pub async fn run(self, mut eventloop: EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("connected to MQTT broker");
                    if let Err(e) = self.gateway.subscribe_telemetry().await {
                        tracing::error!(error = %e, "failed to subscribe to telemetry topics");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.handle_publish(&publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn handle_publish(&self, topic: &str, payload: &[u8]) {
        if !topic.starts_with(SENSOR_TOPIC_PREFIX) && !topic.starts_with(UPLINK_TOPIC_PREFIX) {
            return;
        }

        match TelemetryEvent::from_slice(payload)
            .and_then(|event| self.ingestion.ingest(&event))
        {
            Ok(report) => {
                tracing::info!(
                    device_id = %report.device_id,
                    count = report.count,
                    topic = %topic,
                    "telemetry message ingested"
                );
            }
            Err(e) => {
                // Per-event isolation: log and move on.
                tracing::error!(topic = %topic, error = %e, "failed to process telemetry message");
            }
        }
    }
}

/// Publishes pump commands through the gateway.
pub struct MqttCommandSink {
    gateway: Arc<MqttGateway>,
}

impl MqttCommandSink {
    pub fn new(gateway: Arc<MqttGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl CommandSink for MqttCommandSink {
    async fn publish(&self, device_id: &str, command: &PumpCommand) -> Result<()> {
        self.gateway
            .publish_json(&pump_command_topic(device_id), command)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pump_command_topic() {
        assert_eq!(
            pump_command_topic("AGRO-001"),
            "agroboost/pump/AGRO-001/control"
        );
    }

    #[test]
    fn test_topic_filters_cover_prefixes() {
        assert!(SENSOR_TOPIC_FILTER.starts_with(SENSOR_TOPIC_PREFIX));
        assert!(UPLINK_TOPIC_FILTER.starts_with(UPLINK_TOPIC_PREFIX));
    }
}
