// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Loaded from a TOML file. Every tunable has a default; only the endpoint
//! list is required:
//!
//! ```toml
//! token = "..."
//!
//! [[endpoints]]
//! name = "primary"
//! transport_url = "wss://im.example.com/ws"
//! api_url = "https://im.example.com/api/v1"
//! is_primary = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the config file under the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name used under the platform config and data directories.
pub const APP_DIR_NAME: &str = "lx";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One candidate server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    /// WebSocket URL (`ws://` or `wss://`).
    pub transport_url: String,
    /// Base URL of the HTTP API on the same server.
    pub api_url: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Candidate servers in failover order.
    pub endpoints: Vec<Endpoint>,
    /// Bearer token for both the socket and the HTTP API.
    #[serde(default)]
    pub token: String,
    /// Ping interval while connected (default: 30000).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Max time to wait for a pong (default: 5000).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Missed pongs before the connection is declared dead (default: 3).
    #[serde(default = "default_poor_connection_threshold")]
    pub poor_connection_threshold: u32,
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Consecutive failed attempts before giving up. Unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_max_attempts: Option<u32>,
    /// Consecutive failures against one endpoint before failing over (default: 2).
    #[serde(default = "default_failover_threshold")]
    pub failover_threshold: u32,
    /// Minimum time between endpoint switches (default: 10000).
    #[serde(default = "default_switch_cooldown_ms")]
    pub switch_cooldown_ms: u64,
    /// Delay before reconnecting after a `server_switch` signal (default: 2000).
    #[serde(default = "default_server_switch_delay_ms")]
    pub server_switch_delay_ms: u64,
    /// Delivery attempts per outgoing message (default: 3).
    #[serde(default = "default_outbox_max_attempts")]
    pub outbox_max_attempts: u32,
    /// Time to wait for a send acknowledgement (default: 10000).
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_memory_cache_capacity")]
    pub memory_cache_capacity: usize,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    #[serde(default = "default_dedup_horizon_secs")]
    pub dedup_horizon_secs: u64,
    /// Age after which stored messages are evicted (default: 7).
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Period of the background eviction task (default: 3600). 0 = disabled.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
    /// Events buffered per subscriber before it starts lagging (default: 256).
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Directory for the message database and endpoint selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    5_000
}

fn default_poor_connection_threshold() -> u32 {
    3
}

fn default_reconnect_initial_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_failover_threshold() -> u32 {
    2
}

fn default_switch_cooldown_ms() -> u64 {
    10_000
}

fn default_server_switch_delay_ms() -> u64 {
    2_000
}

fn default_outbox_max_attempts() -> u32 {
    3
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_memory_cache_capacity() -> usize {
    100
}

fn default_dedup_capacity() -> usize {
    1_024
}

fn default_dedup_horizon_secs() -> u64 {
    600
}

fn default_retention_days() -> u32 {
    7
}

fn default_maintenance_interval_secs() -> u64 {
    3_600
}

fn default_event_buffer() -> usize {
    256
}

impl ClientConfig {
    /// Creates a config with the given endpoints and all defaults.
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        ClientConfig {
            endpoints,
            token: String::new(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            poor_connection_threshold: default_poor_connection_threshold(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_max_attempts: None,
            failover_threshold: default_failover_threshold(),
            switch_cooldown_ms: default_switch_cooldown_ms(),
            server_switch_delay_ms: default_server_switch_delay_ms(),
            outbox_max_attempts: default_outbox_max_attempts(),
            send_timeout_ms: default_send_timeout_ms(),
            memory_cache_capacity: default_memory_cache_capacity(),
            dedup_capacity: default_dedup_capacity(),
            dedup_horizon_secs: default_dedup_horizon_secs(),
            retention_days: default_retention_days(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            event_buffer: default_event_buffer(),
            state_dir: None,
        }
    }

    /// Parses a config from TOML text and validates it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Serializes the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one endpoint is required".to_string(),
            ));
        }
        for endpoint in &self.endpoints {
            let url = &endpoint.transport_url;
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ConfigError::Invalid(format!(
                    "endpoint '{}': transport_url '{}' must start with ws:// or wss://",
                    endpoint.name, url
                )));
            }
            let api = &endpoint.api_url;
            if !(api.starts_with("http://") || api.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "endpoint '{}': api_url '{}' must start with http:// or https://",
                    endpoint.name, api
                )));
            }
        }
        if self.memory_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "memory_cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.dedup_capacity == 0 {
            return Err(ConfigError::Invalid(
                "dedup_capacity must be greater than zero".to_string(),
            ));
        }
        if self.outbox_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "outbox_max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.failover_threshold == 0 {
            return Err(ConfigError::Invalid(
                "failover_threshold must be greater than zero".to_string(),
            ));
        }
        if self.reconnect_initial_delay_ms > self.reconnect_max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "reconnect_initial_delay_ms ({}) exceeds reconnect_max_delay_ms ({})",
                self.reconnect_initial_delay_ms, self.reconnect_max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn server_switch_delay(&self) -> Duration {
        Duration::from_millis(self.server_switch_delay_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn dedup_horizon(&self) -> Duration {
        Duration::from_secs(self.dedup_horizon_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Resolved state directory, falling back to the platform data dir.
    pub fn state_dir(&self) -> Option<PathBuf> {
        self.state_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR_NAME)))
    }
}

/// Default config file location (`<config dir>/lx/config.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
