//! Runtime configuration.
//!
//! Values come from the environment (`main` seeds it from `.env` first).
//! Every field has a default, so an empty environment yields a working server.

use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::{invalid, AppResult};

/// Process configuration, one field per environment variable.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for any path the router does not match.
    pub static_dir: Option<String>,

    /// Per-session outbound queue size.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Size of the hub's shared broadcast intake.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Largest inbound WebSocket message accepted, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,

    /// Extra write attempts after the first one fails.
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,

    #[serde(default = "default_write_retry_delay_ms")]
    pub write_retry_delay_ms: u64,

    /// Tries at handing the playback state to a freshly registered session.
    #[serde(default = "default_initial_state_attempts")]
    pub initial_state_attempts: u32,

    #[serde(default = "default_initial_state_retry_ms")]
    pub initial_state_retry_ms: u64,
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> AppResult<Self> {
        let config = envy::from_env::<Config>()?;
        config.validate()?;
        info!(addr = %config.server_address(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.mailbox_capacity == 0 || self.broadcast_capacity == 0 {
            return Err(invalid("queue capacities must be non-zero"));
        }
        if self.initial_state_attempts == 0 {
            return Err(invalid("INITIAL_STATE_ATTEMPTS must be at least 1"));
        }
        if self.write_timeout_secs == 0 {
            return Err(invalid("WRITE_TIMEOUT_SECS must be non-zero"));
        }
        if self.ping_interval_secs == 0 || self.ping_interval_secs >= self.idle_timeout_secs {
            return Err(invalid(format!(
                "ping interval ({}s) must be non-zero and shorter than the idle timeout ({}s)",
                self.ping_interval_secs, self.idle_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn hub_settings(&self) -> HubSettings {
        HubSettings {
            broadcast_capacity: self.broadcast_capacity,
            initial_state_attempts: self.initial_state_attempts,
            initial_state_retry: Duration::from_millis(self.initial_state_retry_ms),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            mailbox_capacity: self.mailbox_capacity,
            max_message_size: self.max_message_size,
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            write_retries: self.write_retries,
            write_retry_delay: Duration::from_millis(self.write_retry_delay_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            mailbox_capacity: default_mailbox_capacity(),
            broadcast_capacity: default_broadcast_capacity(),
            max_message_size: default_max_message_size(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            write_retries: default_write_retries(),
            write_retry_delay_ms: default_write_retry_delay_ms(),
            initial_state_attempts: default_initial_state_attempts(),
            initial_state_retry_ms: default_initial_state_retry_ms(),
        }
    }
}

/// What the hub event loop needs.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub broadcast_capacity: usize,
    pub initial_state_attempts: u32,
    pub initial_state_retry: Duration,
}

impl Default for HubSettings {
    fn default() -> Self {
        Config::default().hub_settings()
    }
}

/// Per-connection limits and timings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub mailbox_capacity: usize,
    pub max_message_size: usize,
    pub handshake_timeout: Duration,
    pub idle_timeout: Duration,
    pub ping_interval: Duration,
    pub write_timeout: Duration,
    pub write_retries: u32,
    pub write_retry_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Config::default().session_settings()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_mailbox_capacity() -> usize {
    2048
}

fn default_broadcast_capacity() -> usize {
    256
}

fn default_max_message_size() -> usize {
    512
}

fn default_handshake_timeout_secs() -> u64 {
    12
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_ping_interval_secs() -> u64 {
    54
}

fn default_write_timeout_secs() -> u64 {
    10
}

fn default_write_retries() -> u32 {
    3
}

fn default_write_retry_delay_ms() -> u64 {
    100
}

fn default_initial_state_attempts() -> u32 {
    3
}

fn default_initial_state_retry_ms() -> u64 {
    500
}
