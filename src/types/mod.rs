//! Core types shared across the relay pipeline.
//!
//! ## Architecture
//!
//! - [`ParsedTelemetry`] is the decoded record produced from one GYK frame
//! - [`PackedDateTime`] handles the device's 32-bit date/time bitfield
//! - [`DetectionFlags`] are the lock-free flags the vision subsystem raises
//! - [`DetectionFlagSet`] is the per-cycle snapshot taken from those flags
//! - [`TelemetrySource`] names the continuity tier that produced a cycle's data
//!
//! ## Usage Example
//!
//! ```rust
//! use trackside_relay::types::{DetectionChannel, DetectionFlags, PackedDateTime};
//!
//! let packed = PackedDateTime::from_le_bytes([0x54, 0x02, 0x27, 0x66]);
//! assert_eq!(packed.unpack().to_string(), "2025-08-19 16:09:20");
//!
//! let flags = DetectionFlags::new();
//! flags.raise(DetectionChannel::Camera1Thermal);
//! assert_eq!(flags.take().to_bytes(), [0, 1, 0, 0]);
//! assert_eq!(flags.take().to_bytes(), [0, 0, 0, 0]);
//! ```

mod datetime;
mod flags;
mod telemetry;

pub use datetime::{CivilDateTime, PackedDateTime, YEAR_BASE};
pub use flags::{DetectionChannel, DetectionFlagSet, DetectionFlags};
pub use telemetry::{ParsedTelemetry, TelemetrySource};
