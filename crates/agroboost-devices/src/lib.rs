//! Device-facing side of the AGRO BOOST backend.
//!
//! This crate holds everything between the wire and the stores:
//!
//! - **Telemetry normalizer** ([`TelemetryEvent`]): decodes the two accepted
//!   wire shapes (plain sensor JSON and the LoRaWAN gateway uplink envelope)
//!   into one canonical event.
//! - **Threshold engine** ([`thresholds`]): the safety checks over battery
//!   and water levels, shared by ingestion alerting and the manual pump
//!   admission gate.
//! - **Ingestion use case** ([`IngestionService`]): the single entry point
//!   both transports call, so the MQTT path and the HTTP path can never
//!   drift apart.
//! - **Pump dispatcher** ([`PumpService`]): validates, persists, and
//!   fire-and-forget publishes pump commands through a [`CommandSink`].
//! - **Embedded broker / MQTT gateway** (feature-gated): the in-process
//!   rumqttd broker and the rumqttc client that subscribes to telemetry
//!   topics and publishes pump commands.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `mqtt` | ✅ | MQTT gateway, telemetry listener, command sink |
//! | `embedded-broker` | ❌ | Embedded MQTT broker (rumqttd) |
//! | `all` | ❌ | All features |

pub mod ingest;
pub mod pump;
pub mod telemetry;
pub mod thresholds;

#[cfg(feature = "embedded-broker")]
pub mod broker;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use ingest::{IngestReport, IngestionService};
pub use pump::{CommandSink, NoopCommandSink, PumpCommand, PumpService};
pub use telemetry::TelemetryEvent;
pub use thresholds::{AlertDraft, PumpRejection, BATTERY_MIN_THRESHOLD, WATER_MIN_THRESHOLD};

#[cfg(feature = "embedded-broker")]
pub use broker::{BrokerConfig, EmbeddedBroker};

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttCommandSink, MqttGateway, TelemetryListener};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
