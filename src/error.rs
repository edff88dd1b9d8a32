//! Error types for the telemetry relay.
//!
//! All errors implement `std::error::Error` and carry enough context to tell
//! a malformed frame apart from a broken serial link or a failed listener.
//!
//! ## Error Categories
//!
//! - **Frame Errors**: a GYK frame was missing, truncated or malformed.
//!   These are expected on a noisy serial line and are absorbed by the
//!   continuity policy; they never reach a client.
//! - **Serial Errors**: the RS-422 port could not be opened or read.
//! - **Bind Errors**: the broadcast listener could not be started. This is the
//!   only failure that stops the relay.
//! - **Config Errors**: invalid or unreadable configuration.
//! - **Journal Errors**: the packet journal could not be opened. The relay
//!   keeps running without it.
//!
//! ```rust
//! use trackside_relay::RelayError;
//!
//! let error = RelayError::frame("start marker missing");
//! assert!(error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Main error type for relay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Invalid GYK frame: {reason}")]
    Frame { reason: String },

    #[error("Serial port error on {port}")]
    Serial {
        port: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to bind broadcast listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Configuration file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to open packet journal {path}")]
    Journal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid outbound packet: {details}")]
    Packet { details: String },
}

impl RelayError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Frame { .. } => true,
            RelayError::Serial { .. } => true,
            RelayError::Io(_) => true,
            RelayError::Bind { .. } => false,
            RelayError::Config { .. } => false,
            RelayError::ConfigFile { .. } => false,
            RelayError::Journal { .. } => false,
            RelayError::Packet { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RelayError::Frame { .. } => vec![
                "Check the RS-422 wiring and termination",
                "Verify the baud rate matches the onboard device",
                "Capture a raw serial dump and inspect the frame markers",
            ],
            RelayError::Serial { .. } => vec![
                "Check the serial port name in the configuration",
                "Ensure no other process holds the port open",
                "Verify the USB/RS-422 adapter is connected",
            ],
            RelayError::Bind { .. } => vec![
                "Choose a different TCP port",
                "Check whether another relay instance is running",
                "Verify firewall and permission settings",
            ],
            RelayError::Io(_) => {
                vec!["Check system resources", "Retry the operation"]
            }
            RelayError::Config { .. } | RelayError::ConfigFile { .. } => vec![
                "Check the configuration file syntax",
                "Compare against the documented defaults",
            ],
            RelayError::Journal { .. } => vec![
                "Check that the journal directory exists",
                "Check write permissions on the journal file",
            ],
            RelayError::Packet { .. } => vec![
                "Verify the sender uses the 56-byte packet layout",
                "Resynchronize on the 0xAA header and 0xFF footer",
            ],
        }
    }

    /// Helper constructor for frame errors.
    pub fn frame(reason: impl Into<String>) -> Self {
        RelayError::Frame { reason: reason.into() }
    }

    /// Helper constructor for serial port errors.
    pub fn serial(
        port: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        RelayError::Serial { port: port.into(), source: source.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        RelayError::Config { details: details.into() }
    }

    /// Helper constructor for outbound packet errors.
    pub fn packet(details: impl Into<String>) -> Self {
        RelayError::Packet { details: details.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            details in ".*",
            port in "[A-Za-z0-9/]+",
          ) {
            let frame_msg = RelayError::frame(reason.clone()).to_string();
            prop_assert!(frame_msg.contains(&reason));

            let config_msg = RelayError::config(details.clone()).to_string();
            prop_assert!(config_msg.contains(&details));

            let serial_err = RelayError::serial(port.clone(), "no such device");
            prop_assert!(serial_err.to_string().contains(&port));
          }

          #[test]
          fn serial_errors_preserve_their_source(message in ".+") {
            let err = RelayError::serial(
                "/dev/ttyUSB0",
                std::io::Error::other(message.clone()),
            );
            let source = std::error::Error::source(&err).map(|s| s.to_string());
            prop_assert_eq!(source, Some(message));
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<RelayError>();

        let error = RelayError::frame("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn only_listener_and_config_failures_are_fatal() {
        let bind = RelayError::Bind {
            addr: "127.0.0.1:12346".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(!bind.is_retryable());
        assert!(!RelayError::config("bad").is_retryable());

        assert!(RelayError::frame("short").is_retryable());
        assert!(RelayError::serial("COM1", "busy").is_retryable());
    }

    #[test]
    fn recovery_suggestions_are_descriptive() {
        let errors = [
            RelayError::frame("x"),
            RelayError::serial("COM1", "busy"),
            RelayError::config("x"),
            RelayError::packet("x"),
        ];
        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
        }
    }

    #[test]
    fn io_errors_convert() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: RelayError = io_err.into();
        assert!(matches!(err, RelayError::Io(_)));
    }
}
