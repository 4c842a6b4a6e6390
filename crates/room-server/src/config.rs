//! Configuration for the room server.
//!
//! Built in layers, later ones winning:
//!
//! 1. defaults,
//! 2. an optional TOML file,
//! 3. environment variables:
//!    - `ROOM_BIND_ADDR`        (default: "0.0.0.0")
//!    - `ROOM_PORT`             (default: "8080")
//!    - `ROOM_AI_BASE_URL`      (default: "http://localhost:11434")
//!    - `ROOM_AI_MODEL`         (default: "llama3")
//!    - `ROOM_AI_TIMEOUT_SECS`  (default: "30")
//!    - `ROOM_LOG_LEVEL`        (default: "info")
//!    - `ROOM_LOG_FILE`         (default: unset, stdout only)
//! 4. command line flags (see `main.rs`).

use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {key}: {message}")]
    Env { key: &'static str, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// AI backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL of the generation service; `/api/generate` is appended.
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    /// Upper bound on one round trip, including the room's wait for it.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            system_prompt: "Pretend you are human".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on. `0` picks a free port.
    pub port: u16,

    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,

    /// Frames buffered per client before it is dropped as too slow.
    pub outbound_capacity: usize,

    /// Messages buffered per room ahead of its dispatch task.
    pub inbound_capacity: usize,

    pub heartbeat_interval_secs: u64,

    /// Silence after which a client is considered gone.
    pub client_timeout_secs: u64,

    /// How long an empty room survives before eviction.
    pub room_idle_secs: u64,

    pub room_sweep_interval_secs: u64,

    pub log_level: String,
    pub log_format: LogFormat,

    /// Also append logs to this file.
    pub log_file: Option<PathBuf>,

    pub ai: AiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec![
                "http://localhost:5500".to_string(),
                "http://localhost:8000".to_string(),
            ],
            outbound_capacity: 256,
            inbound_capacity: 1024,
            heartbeat_interval_secs: 30,
            client_timeout_secs: 90,
            room_idle_secs: 300,
            room_sweep_interval_secs: 60,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_file: None,
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then `path` (if any), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&raw)?
            }
            None => Config::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        override_from_env("ROOM_BIND_ADDR", &mut self.bind_addr)?;
        override_from_env("ROOM_PORT", &mut self.port)?;
        override_from_env("ROOM_AI_BASE_URL", &mut self.ai.base_url)?;
        override_from_env("ROOM_AI_MODEL", &mut self.ai.model)?;
        override_from_env("ROOM_AI_TIMEOUT_SECS", &mut self.ai.timeout_secs)?;
        override_from_env("ROOM_LOG_LEVEL", &mut self.log_level)?;
        if let Ok(path) = env::var("ROOM_LOG_FILE") {
            self.log_file = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Reject values the runtime cannot work with (zero-sized queues,
    /// zero-length timer periods).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("outbound_capacity", self.outbound_capacity as u64),
            ("inbound_capacity", self.inbound_capacity as u64),
            ("heartbeat_interval_secs", self.heartbeat_interval_secs),
            ("client_timeout_secs", self.client_timeout_secs),
            ("room_sweep_interval_secs", self.room_sweep_interval_secs),
            ("ai.timeout_secs", self.ai.timeout_secs),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.client_timeout_secs <= self.heartbeat_interval_secs {
            return Err(ConfigError::Invalid(
                "client_timeout_secs must exceed heartbeat_interval_secs".to_string(),
            ));
        }
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn room_idle(&self) -> Duration {
        Duration::from_secs(self.room_idle_secs)
    }

    pub fn room_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.room_sweep_interval_secs)
    }
}

fn override_from_env<T>(key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(val) = env::var(key) {
        *slot = val.parse::<T>().map_err(|e| ConfigError::Env {
            key,
            message: e.to_string(),
        })?;
    }
    Ok(())
}
