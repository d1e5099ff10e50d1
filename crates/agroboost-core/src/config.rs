//! Runtime configuration.
//!
//! Configuration is read from `AGROBOOST_*` environment variables with
//! sensible defaults, matching the deployment contract of the original
//! field installations (HTTP on 3000, MQTT broker on 1883).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_mqtt_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_enabled() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP bind address.
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTP bind port.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Whether to start the embedded MQTT broker and telemetry listener.
    #[serde(default = "default_mqtt_enabled")]
    pub mqtt_enabled: bool,

    /// MQTT broker listen address.
    #[serde(default = "default_mqtt_listen")]
    pub mqtt_listen: String,

    /// MQTT broker listen port.
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    /// Directory holding the redb store files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_host: default_http_host(),
            http_port: default_http_port(),
            mqtt_enabled: default_mqtt_enabled(),
            mqtt_listen: default_mqtt_listen(),
            mqtt_port: default_mqtt_port(),
            data_dir: default_data_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `AGROBOOST_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("AGROBOOST_HOST") {
            config.http_host = host;
        }
        if let Some(port) = env_parse("AGROBOOST_PORT") {
            config.http_port = port;
        }
        if let Ok(enabled) = std::env::var("AGROBOOST_MQTT_ENABLED") {
            config.mqtt_enabled = enabled != "false";
        }
        if let Ok(listen) = std::env::var("AGROBOOST_MQTT_LISTEN") {
            config.mqtt_listen = listen;
        }
        if let Some(port) = env_parse("AGROBOOST_MQTT_PORT") {
            config.mqtt_port = port;
        }
        if let Ok(dir) = std::env::var("AGROBOOST_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }

    /// Set the HTTP bind address.
    pub fn with_http_host(mut self, host: impl Into<String>) -> Self {
        self.http_host = host.into();
        self
    }

    /// Set the HTTP bind port.
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Set the MQTT broker port.
    pub fn with_mqtt_port(mut self, port: u16) -> Self {
        self.mqtt_port = port;
        self
    }

    /// Enable or disable the MQTT side entirely.
    pub fn with_mqtt_enabled(mut self, enabled: bool) -> Self {
        self.mqtt_enabled = enabled;
        self
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
