//! Relay configuration
//!
//! Loaded from YAML. Every field has a default matching the deployed
//! installation, so an empty file (or no file) yields a working setup:
//!
//! ```yaml
//! enabled: true
//! tcp_port: 12346
//! check_interval_ms: 100
//! summary_every: 2000
//! serial:
//!   port_name: COM1
//!   baud_rate: 9600
//!   data_bits: 8
//!   stop_bits: 1
//!   parity: none
//!   timeout_ms: 50
//!   read_buffer: 512
//! journal:
//!   enabled: false
//!   path: sent_packets_log.txt
//! logging:
//!   level: info
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::protocol::MIN_FRAME_LENGTH;
use crate::{RelayError, Result};

pub const DEFAULT_TCP_PORT: u16 = 12346;
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_SUMMARY_EVERY: u64 = 2000;

/// Top-level relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Location reporting on/off. When off the relay loop idles.
    pub enabled: bool,
    pub tcp_port: u16,
    pub check_interval_ms: u64,
    /// Cycles between debug summaries of the sent fields; 0 disables them.
    pub summary_every: u64,
    pub serial: SerialConfig,
    pub journal: JournalConfig,
    pub logging: LoggingConfig,
}

/// RS-422 serial line parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: ParitySetting,
    /// Hardware timeout for a single read.
    pub timeout_ms: u64,
    /// Bytes requested per read.
    pub read_buffer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParitySetting {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tcp_port: DEFAULT_TCP_PORT,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            summary_every: DEFAULT_SUMMARY_EVERY,
            serial: SerialConfig::default(),
            journal: JournalConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: "COM1".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: ParitySetting::None,
            timeout_ms: 50,
            read_buffer: 512,
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { enabled: false, path: PathBuf::from("sent_packets_log.txt") }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl RelayConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| RelayError::ConfigFile {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        let config: RelayConfig = serde_yaml_ng::from_str(&contents).map_err(|e| {
            RelayError::ConfigFile { path: path.to_path_buf(), source: Box::new(e) }
        })?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded relay configuration");
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RelayConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| RelayError::config(format!("YAML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| RelayError::config(format!("YAML serialize error: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval_ms == 0 {
            return Err(RelayError::config("check_interval_ms must be greater than 0"));
        }
        if self.serial.read_buffer < MIN_FRAME_LENGTH {
            return Err(RelayError::config(format!(
                "serial.read_buffer must hold one frame ({} bytes), got {}",
                MIN_FRAME_LENGTH, self.serial.read_buffer
            )));
        }
        if !(5..=8).contains(&self.serial.data_bits) {
            return Err(RelayError::config(format!(
                "serial.data_bits must be 5-8, got {}",
                self.serial.data_bits
            )));
        }
        if !(1..=2).contains(&self.serial.stop_bits) {
            return Err(RelayError::config(format!(
                "serial.stop_bits must be 1 or 2, got {}",
                self.serial.stop_bits
            )));
        }
        if self.serial.baud_rate == 0 {
            return Err(RelayError::config("serial.baud_rate must be greater than 0"));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Listener address: all interfaces on `tcp_port`.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.tcp_port))
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
