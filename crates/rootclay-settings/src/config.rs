//! Configuration structures
//!
//! Settings are read from a `.toml` or `.json` file. Every field has a
//! default, so a file only needs the keys it changes:
//!
//! ```toml
//! [connection]
//! port = "/dev/ttyUSB0"
//! baud_rate = 250000
//!
//! [streaming]
//! ack_timeout_ms = 120000
//! fault_policy = "halt"
//! ```

use crate::error::{Result, SettingsError};
use rootclay_communication::{
    AckMatch, ConnectionParams, ControllerConfig, FaultPolicy, SerialParity, StreamConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the directory under the platform config directory
pub const APP_DIR: &str = "rootclay";
/// Name of the default config file
pub const CONFIG_FILE: &str = "config.toml";

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Port used when none is given on the command line
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits
    pub data_bits: u8,
    /// Stop bits
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Assert DTR on open
    pub dtr: bool,
    /// Assert RTS on open
    pub rts: bool,
    /// Reader poll timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Delay before the wake-up newline; 0 disables it
    pub wake_delay_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        let params = ConnectionParams::default();
        Self {
            port: None,
            baud_rate: params.baud_rate,
            data_bits: params.data_bits,
            stop_bits: params.stop_bits,
            parity: params.parity,
            dtr: params.dtr,
            rts: params.rts,
            read_timeout_ms: params.timeout_ms,
            wake_delay_ms: 1000,
        }
    }
}

/// Streaming behavior settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Acknowledgment timeout in milliseconds; 0 disables it
    pub ack_timeout_ms: u64,
    /// Line advances between progress reports
    pub progress_interval: usize,
    /// Reaction to device faults
    pub fault_policy: FaultPolicy,
    /// How acknowledgments are recognized
    pub ack_match: AckMatch,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        let stream = StreamConfig::default();
        Self {
            ack_timeout_ms: stream.ack_timeout.map_or(0, |t| t.as_millis() as u64),
            progress_interval: stream.progress_interval,
            fault_policy: stream.fault_policy,
            ack_match: stream.ack_match,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Streaming settings
    pub streaming: StreamingSettings,
}

impl Config {
    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(SettingsError::UnsupportedFormat(
                    other.unwrap_or_default().to_string(),
                ))
            }
        };

        config.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Load the file at [`default_config_path`] if it exists, else defaults
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let connection = &self.connection;
        if connection.baud_rate == 0 {
            return Err(SettingsError::invalid(
                "connection.baud_rate",
                "must be > 0",
            ));
        }
        if !(5..=8).contains(&connection.data_bits) {
            return Err(SettingsError::invalid(
                "connection.data_bits",
                "must be between 5 and 8",
            ));
        }
        if !(1..=2).contains(&connection.stop_bits) {
            return Err(SettingsError::invalid(
                "connection.stop_bits",
                "must be 1 or 2",
            ));
        }
        if connection.read_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.read_timeout_ms",
                "must be > 0",
            ));
        }
        if connection.port.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(SettingsError::invalid(
                "connection.port",
                "must not be empty",
            ));
        }

        if self.streaming.progress_interval == 0 {
            return Err(SettingsError::invalid(
                "streaming.progress_interval",
                "must be > 0",
            ));
        }
        Ok(())
    }

    /// Connection parameters for `port`
    pub fn connection_params(&self, port: impl Into<String>) -> ConnectionParams {
        let c = &self.connection;
        ConnectionParams {
            port: port.into(),
            baud_rate: c.baud_rate,
            data_bits: c.data_bits,
            stop_bits: c.stop_bits,
            parity: c.parity,
            flow_control: false,
            dtr: c.dtr,
            rts: c.rts,
            timeout_ms: c.read_timeout_ms,
        }
    }

    /// Streaming engine configuration
    pub fn stream_config(&self) -> StreamConfig {
        let s = &self.streaming;
        StreamConfig {
            ack_match: s.ack_match,
            fault_policy: s.fault_policy,
            ack_timeout: (s.ack_timeout_ms > 0).then(|| Duration::from_millis(s.ack_timeout_ms)),
            progress_interval: s.progress_interval,
        }
    }

    /// Controller configuration; the connection template carries no port
    pub fn controller_config(&self) -> ControllerConfig {
        let wake_delay_ms = self.connection.wake_delay_ms;
        ControllerConfig {
            stream: self.stream_config(),
            connection: self.connection_params(String::new()),
            wake_delay: (wake_delay_ms > 0).then(|| Duration::from_millis(wake_delay_ms)),
            ..Default::default()
        }
    }
}

/// Platform config file location, e.g. `~/.config/rootclay/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}
