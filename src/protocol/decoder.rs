//! Telemetry decoding from a located GYK frame

use tracing::trace;

use super::{
    KILOMETER_POST_OFFSET, KM_MAGNITUDE_MASK, KM_SIGN_BIT, LOCOMOTIVE_NUMBER_OFFSET,
    MIN_FRAME_LENGTH, SPEED_MASK, SPEED_OFFSET, START_MARKER, TIMESTAMP_OFFSET,
    TRAIN_NUMBER_OFFSET,
};
use crate::types::{CivilDateTime, PackedDateTime, ParsedTelemetry};
use crate::{RelayError, Result};

/// Decode a frame located by [`find_frame`](super::find_frame).
///
/// The frame must be at least [`MIN_FRAME_LENGTH`] bytes and begin with the
/// start marker. Each field is read only when the frame is long enough to hold
/// it; a missing field keeps its default and does not invalidate the record.
pub fn decode_frame(frame: &[u8]) -> Result<ParsedTelemetry> {
    if frame.len() < MIN_FRAME_LENGTH {
        return Err(RelayError::frame(format!(
            "frame is {} bytes, need at least {}",
            frame.len(),
            MIN_FRAME_LENGTH
        )));
    }

    if frame[..2] != START_MARKER {
        return Err(RelayError::frame(format!(
            "bad start marker {:02X} {:02X}",
            frame[0], frame[1]
        )));
    }

    let mut telemetry = ParsedTelemetry::default();

    if let Some(bytes) = field::<4>(frame, TIMESTAMP_OFFSET) {
        telemetry.timestamp = decode_timestamp(bytes).to_string();
    }
    if let Some(bytes) = field::<3>(frame, SPEED_OFFSET) {
        telemetry.speed_kmh = decode_speed(bytes);
    }
    if let Some(bytes) = field::<3>(frame, KILOMETER_POST_OFFSET) {
        telemetry.kilometer_post_km = decode_kilometer_post(bytes);
    }
    if let Some(bytes) = field::<2>(frame, TRAIN_NUMBER_OFFSET) {
        telemetry.train_number = decode_number(bytes);
    }
    if let Some(bytes) = field::<2>(frame, LOCOMOTIVE_NUMBER_OFFSET) {
        telemetry.locomotive_number = decode_number(bytes);
    }

    trace!(
        timestamp = %telemetry.timestamp,
        speed_kmh = telemetry.speed_kmh,
        kilometer_post_km = telemetry.kilometer_post_km,
        train = %telemetry.train_number,
        locomotive = %telemetry.locomotive_number,
        "Decoded GYK frame"
    );

    Ok(telemetry)
}

fn field<const N: usize>(frame: &[u8], offset: usize) -> Option<[u8; N]> {
    frame.get(offset..offset + N)?.try_into().ok()
}

fn u24_le(bytes: [u8; 3]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
}

/// Unpack the little-endian 32-bit date/time bitfield.
pub fn decode_timestamp(bytes: [u8; 4]) -> CivilDateTime {
    PackedDateTime::from_le_bytes(bytes).unpack()
}

/// Speed in km/h from the low 10 bits of the 24-bit field.
pub fn decode_speed(bytes: [u8; 3]) -> f64 {
    f64::from(u24_le(bytes) & SPEED_MASK)
}

/// Signed kilometer post in km.
///
/// Bit 23 carries the sign, bit 22 the trend (ignored here) and bits 0-21 the
/// distance in meters.
pub fn decode_kilometer_post(bytes: [u8; 3]) -> f64 {
    let raw = u24_le(bytes);
    let km = f64::from(raw & KM_MAGNITUDE_MASK) / 1000.0;
    if raw & KM_SIGN_BIT != 0 { -km } else { km }
}

/// Little-endian u16 rendered as decimal digits.
pub fn decode_number(bytes: [u8; 2]) -> String {
    u16::from_le_bytes(bytes).to_string()
}
