//! Embedded MQTT broker.
//!
//! The broker runs in-process via rumqttd, so a field deployment needs no
//! external MQTT installation. Devices publish telemetry to
//! `agroboost/sensors/{deviceId}` (plain JSON) or
//! `agroboost/lorawan/{deviceId}` (gateway uplink envelopes), and receive
//! pump commands on `agroboost/pump/{deviceId}/control`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Embedded broker error type
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Configuration for the embedded broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Listening address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum payload size in bytes
    #[serde(default = "default_max_payload")]
    pub max_payload_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_ms: u16,
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_max_connections() -> usize {
    500
}

fn default_max_payload() -> usize {
    1048576 // 1 MB; telemetry payloads are tiny
}

fn default_connection_timeout() -> u16 {
    60000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            max_connections: default_max_connections(),
            max_payload_size: default_max_payload(),
            connection_timeout_ms: default_connection_timeout(),
        }
    }
}

impl BrokerConfig {
    /// Create a new broker config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listening address
    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }

    /// Set the listening port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set max connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Get the full socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, BrokerError> {
        format!("{}:{}", self.listen, self.port)
            .parse()
            .map_err(|e| BrokerError::Config(format!("invalid address: {}", e)))
    }
}

/// Embedded MQTT broker handle
pub struct EmbeddedBroker {
    config: BrokerConfig,
    running: Arc<std::sync::atomic::AtomicBool>,
}

impl EmbeddedBroker {
    /// Create a new embedded broker with the given configuration
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            running: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Create with default configuration
    pub fn with_default() -> Self {
        Self::new(BrokerConfig::default())
    }

    /// Check if the broker is running
    pub fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Start the embedded broker on a dedicated thread.
    ///
    /// rumqttd drives its own runtime; the thread lives until the process
    /// exits or the broker fails.
    pub fn start(&self) -> Result<(), BrokerError> {
        if self.is_running() {
            tracing::warn!("embedded broker is already running");
            return Ok(());
        }

        // A previous instance may still hold the port.
        if !is_port_available(self.config.port) {
            tracing::info!(
                port = self.config.port,
                "broker port already in use, assuming broker is running"
            );
            self.running
                .store(true, std::sync::atomic::Ordering::Relaxed);
            return Ok(());
        }

        let addr = self.config.socket_addr()?;
        let running = self.running.clone();
        let max_connections = self.config.max_connections;
        let max_payload = self.config.max_payload_size;
        let connection_timeout = self.config.connection_timeout_ms;

        running.store(true, std::sync::atomic::Ordering::Relaxed);

        let _handle = thread::Builder::new()
            .name("agroboost-broker".to_string())
            .spawn(move || {
                tracing::info!(%addr, "starting embedded MQTT broker");

                let mut broker_config = rumqttd::Config {
                    id: 0,
                    router: rumqttd::RouterConfig {
                        max_connections,
                        max_outgoing_packet_count: 200,
                        max_segment_size: 1048576,
                        max_segment_count: 10,
                        custom_segment: None,
                        initialized_filters: None,
                        ..Default::default()
                    },
                    v4: None,
                    v5: None,
                    ws: None,
                    cluster: None,
                    console: None,
                    bridge: None,
                    prometheus: None,
                    metrics: None,
                };

                let mut v4_config = HashMap::new();
                v4_config.insert(
                    "main".to_string(),
                    rumqttd::ServerSettings {
                        name: "agroboost-broker".to_string(),
                        listen: addr,
                        tls: None,
                        next_connection_delay_ms: 1,
                        connections: rumqttd::ConnectionSettings {
                            connection_timeout_ms: connection_timeout,
                            max_payload_size: max_payload,
                            max_inflight_count: 200,
                            auth: None,
                            external_auth: None,
                            dynamic_filters: true,
                        },
                    },
                );
                broker_config.v4 = Some(v4_config);

                let mut broker = rumqttd::Broker::new(broker_config);

                // start() blocks until the broker stops.
                match broker.start() {
                    Ok(_) => tracing::info!("embedded MQTT broker stopped"),
                    Err(e) => tracing::error!("embedded MQTT broker error: {}", e),
                }

                running.store(false, std::sync::atomic::Ordering::Relaxed);
            })?;

        // Give the broker a moment to bind before anyone connects.
        std::thread::sleep(std::time::Duration::from_millis(500));

        if is_port_available(self.config.port) {
            return Err(BrokerError::Broker(
                "broker failed to start or port not available".to_string(),
            ));
        }

        tracing::info!(port = self.config.port, "embedded MQTT broker started");
        Ok(())
    }

    /// Get the broker configuration
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

/// Check whether a local port is free.
pub fn is_port_available(port: u16) -> bool {
    use std::net::{IpAddr, Ipv4Addr, TcpListener};

    TcpListener::bind((IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)).is_ok()
}
