//! Decoded vehicle telemetry record

use serde::{Deserialize, Serialize};
use std::fmt;

/// Telemetry decoded from one GYK frame.
///
/// Only successfully decoded frames produce this type; a frame that fails to
/// decode is an `Err` from [`decode_frame`](crate::protocol::decode_frame) and
/// can never be forwarded as live data.
///
/// Fields the frame was too short to contain keep their default value
/// (empty string or zero).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedTelemetry {
    /// `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    /// Actual speed in km/h.
    pub speed_kmh: f64,
    /// Signed kilometer post in km.
    pub kilometer_post_km: f64,
    /// Five-digit train number rendered as decimal digits.
    pub train_number: String,
    /// Locomotive number rendered as decimal digits.
    pub locomotive_number: String,
}

/// Which tier of the continuity policy produced a cycle's telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TelemetrySource {
    /// Decoded from a frame read this cycle.
    Live,
    /// Re-sent from the last successfully decoded frame.
    Cached,
    /// Decoded from the built-in reference frame; no live frame was ever seen.
    Simulated,
}

impl TelemetrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetrySource::Live => "live",
            TelemetrySource::Cached => "cached",
            TelemetrySource::Simulated => "simulated",
        }
    }
}

impl fmt::Display for TelemetrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
