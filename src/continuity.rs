//! Choosing what telemetry to send each cycle
//!
//! Downstream consumers expect one packet every cycle, so the relay never
//! skips a cycle for lack of data. Telemetry is chosen in three tiers:
//!
//! 1. **Live**: a frame was found this cycle and decoded.
//! 2. **Cached**: the last successfully decoded telemetry, re-sent unchanged.
//! 3. **Simulated**: the built-in reference frame, used only until the first
//!    live frame is ever decoded.
//!
//! Once a live frame has been decoded the policy never returns to simulated
//! data; cached telemetry does not expire.

use tracing::{debug, warn};

use crate::protocol::{REFERENCE_FRAME, decode_frame};
use crate::types::{ParsedTelemetry, TelemetrySource};

/// Telemetry picked for one cycle, tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub telemetry: ParsedTelemetry,
    pub source: TelemetrySource,
}

/// Three-tier fallback over live, cached and simulated telemetry.
#[derive(Debug, Default)]
pub struct ContinuityPolicy {
    last_valid: Option<ParsedTelemetry>,
    simulated: Option<ParsedTelemetry>,
}

impl ContinuityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve this cycle's telemetry from the frame found in the latest read,
    /// if any.
    ///
    /// A frame that fails to decode is treated like no frame at all.
    pub fn resolve(&mut self, frame: Option<&[u8]>) -> Resolved {
        self.resolve_candidates(frame)
    }

    /// Resolve from every candidate frame of this cycle, oldest first.
    ///
    /// The first candidate that decodes is used as live telemetry. Candidates
    /// that fail to decode are skipped.
    pub fn resolve_candidates<'a, I>(&mut self, frames: I) -> Resolved
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        for frame in frames {
            match decode_frame(frame) {
                Ok(telemetry) => {
                    if self.last_valid.is_none() {
                        debug!("First live GYK frame decoded, leaving simulated mode");
                    }
                    self.last_valid = Some(telemetry.clone());
                    return Resolved { telemetry, source: TelemetrySource::Live };
                }
                Err(e) => debug!(error = %e, "Discarding undecodable frame"),
            }
        }

        if let Some(cached) = &self.last_valid {
            return Resolved { telemetry: cached.clone(), source: TelemetrySource::Cached };
        }

        Resolved { telemetry: self.simulated().clone(), source: TelemetrySource::Simulated }
    }

    /// Last successfully decoded live telemetry.
    pub fn last_valid(&self) -> Option<&ParsedTelemetry> {
        self.last_valid.as_ref()
    }

    /// Whether a live frame has ever been decoded.
    pub fn has_live_history(&self) -> bool {
        self.last_valid.is_some()
    }

    /// Decoded reference frame, computed once.
    fn simulated(&mut self) -> &ParsedTelemetry {
        self.simulated.get_or_insert_with(|| {
            decode_frame(&REFERENCE_FRAME).unwrap_or_else(|e| {
                warn!(error = %e, "Reference frame failed to decode, simulating zeroed telemetry");
                ParsedTelemetry::default()
            })
        })
    }
}
