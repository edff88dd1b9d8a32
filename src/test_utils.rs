//! Test utilities for building GYK frames and talking to a running relay
//!
//! This module provides builders and helpers shared by unit tests, the
//! integration tests under `tests/` and the benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use crate::protocol::{
    END_MARKER, FRAME_OVERHEAD, KILOMETER_POST_OFFSET, KM_MAGNITUDE_MASK, KM_SIGN_BIT,
    LOCOMOTIVE_NUMBER_OFFSET, MIN_FRAME_LENGTH, SPEED_OFFSET, START_MARKER, TIMESTAMP_OFFSET,
    TRAIN_NUMBER_OFFSET,
};
use crate::types::{CivilDateTime, PackedDateTime};

/// Builder for synthetic GYK frames.
///
/// Starts from an all-zero 86-byte frame with valid markers and length field.
#[derive(Debug, Clone)]
pub struct GykFrameBuilder {
    info_length: u16,
    timestamp: u32,
    speed: u32,
    kilometer_post: u32,
    train_number: u16,
    locomotive_number: u16,
}

impl Default for GykFrameBuilder {
    fn default() -> Self {
        Self {
            info_length: (MIN_FRAME_LENGTH - FRAME_OVERHEAD) as u16,
            timestamp: 0,
            speed: 0,
            kilometer_post: 0,
            train_number: 0,
            locomotive_number: 0,
        }
    }
}

impl GykFrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panics when the fields fall outside the bitfield's ranges.
    pub fn timestamp(mut self, dt: CivilDateTime) -> Self {
        self.timestamp = PackedDateTime::pack(dt).expect("timestamp fields in range").value();
        self
    }

    pub fn speed(mut self, kmh: u16) -> Self {
        self.speed = u32::from(kmh);
        self
    }

    pub fn kilometer_post_meters(mut self, meters: u32, negative: bool) -> Self {
        self.kilometer_post = (meters & KM_MAGNITUDE_MASK) | if negative { KM_SIGN_BIT } else { 0 };
        self
    }

    pub fn train_number(mut self, number: u16) -> Self {
        self.train_number = number;
        self
    }

    pub fn locomotive_number(mut self, number: u16) -> Self {
        self.locomotive_number = number;
        self
    }

    /// Override the info length; values below 80 produce frames too short to decode.
    pub fn info_length(mut self, len: u16) -> Self {
        self.info_length = len;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let total = usize::from(self.info_length) + FRAME_OVERHEAD;
        let mut frame = vec![0u8; total.max(4)];
        frame[..2].copy_from_slice(&START_MARKER);
        frame[2..4].copy_from_slice(&self.info_length.to_be_bytes());

        put(&mut frame, TIMESTAMP_OFFSET, &self.timestamp.to_le_bytes());
        put(&mut frame, SPEED_OFFSET, &self.speed.to_le_bytes()[..3]);
        put(&mut frame, KILOMETER_POST_OFFSET, &self.kilometer_post.to_le_bytes()[..3]);
        put(&mut frame, TRAIN_NUMBER_OFFSET, &self.train_number.to_le_bytes());
        put(&mut frame, LOCOMOTIVE_NUMBER_OFFSET, &self.locomotive_number.to_le_bytes());

        if total >= 4 + END_MARKER.len() {
            frame[total - 2..].copy_from_slice(&END_MARKER);
        }
        frame
    }
}

fn put(frame: &mut [u8], offset: usize, bytes: &[u8]) {
    if let Some(slot) = frame.get_mut(offset..offset + bytes.len()) {
        slot.copy_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_has_minimum_length_and_markers() {
        let frame = GykFrameBuilder::new().build();
        assert_eq!(frame.len(), MIN_FRAME_LENGTH);
        assert_eq!(frame[..2], START_MARKER);
        assert_eq!(frame[MIN_FRAME_LENGTH - 2..], END_MARKER);
    }

    #[test]
    fn fields_land_at_protocol_offsets() {
        let frame = GykFrameBuilder::new().speed(0x0123).train_number(0xBEEF).build();
        assert_eq!(frame[SPEED_OFFSET..SPEED_OFFSET + 3], [0x23, 0x01, 0x00]);
        assert_eq!(frame[TRAIN_NUMBER_OFFSET..TRAIN_NUMBER_OFFSET + 2], [0xEF, 0xBE]);
    }
}
