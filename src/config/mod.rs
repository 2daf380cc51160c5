//! Relay configuration.
//!
//! Loaded from, in increasing precedence:
//! 1. built-in defaults
//! 2. a TOML file (`labrelay.toml` unless another path is given)
//! 3. environment variables prefixed with `LABRELAY_`, nested with `__`
//!
//! ```text
//! LABRELAY_BIND=0.0.0.0:5000
//! LABRELAY_SERIAL__PORT=/dev/ttyUSB0
//! LABRELAY_SERIAL__BAUD=115200
//! LABRELAY_LOG__PATH=/var/log/voltage.log
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::client::mirror::MirrorCommands;
use crate::client::RetryPolicy;
use crate::serial::SerialSettings;

pub const DEFAULT_CONFIG_FILE: &str = "labrelay.toml";
pub const DEFAULT_PORT: u16 = 5000;
pub const ENV_PREFIX: &str = "LABRELAY_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration load error: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Configuration file not found: {0}")]
    Missing(PathBuf),

    #[error("Configuration validation error: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Instrument served on `/commander`.
    #[serde(default)]
    pub serial: Option<SerialSettings>,
    /// Log served on `/getvoltage`.
    #[serde(default)]
    pub log: Option<LogConfig>,
    /// Upstream relay driven by `/flipmirror/state`.
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Base URL of the relay that owns the mirror's serial link.
    pub upstream: String,
    #[serde(default)]
    pub commands: MirrorCommands,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            serial: None,
            log: None,
            mirror: None,
        }
    }
}

impl RelayConfig {
    /// Load from `path`, or from `labrelay.toml` if it exists when no path is given.
    ///
    /// An explicitly requested file that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::Missing(p.to_path_buf())),
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        Figment::new()
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Reject configurations the relay cannot serve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.is_none() && self.log.is_none() && self.mirror.is_none() {
            return Err(ConfigError::Invalid(
                "nothing to relay: configure at least one of [serial], [log], [mirror]".into(),
            ));
        }

        if let Some(serial) = &self.serial {
            if serial.port.trim().is_empty() {
                return Err(ConfigError::Invalid("serial.port must not be empty".into()));
            }
            if serial.terminator.len() != 2 {
                return Err(ConfigError::Invalid(format!(
                    "serial.terminator must be exactly two bytes, got {:?}",
                    serial.terminator
                )));
            }
            if serial.max_response_bytes == 0 {
                return Err(ConfigError::Invalid("serial.max_response_bytes must be >= 1".into()));
            }
        }

        if let Some(mirror) = &self.mirror {
            if mirror.upstream.trim().is_empty() {
                return Err(ConfigError::Invalid("mirror.upstream must not be empty".into()));
            }
            if mirror.commands.up.trim().is_empty() {
                return Err(ConfigError::Invalid("mirror.commands.up must not be empty".into()));
            }
            if mirror.commands.down.trim().is_empty() {
                return Err(ConfigError::Invalid("mirror.commands.down must not be empty".into()));
            }
            if mirror.retry.max_attempts == 0 {
                return Err(ConfigError::Invalid("mirror.retry.max_attempts must be >= 1".into()));
            }
        }

        Ok(())
    }
}
