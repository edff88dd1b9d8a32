//! GYK serial protocol: frame location and telemetry decoding
//!
//! The onboard safety device emits frames on an RS-422 line:
//!
//! ```text
//! 0      2            4                                  len+4   len+6
//! +------+------------+----------------------------------+-------+
//! | 10 02| info length |           info payload           | 10 03 |
//! +------+------------+----------------------------------+-------+
//!          big-endian u16
//! ```
//!
//! Telemetry fields sit at fixed offsets from the frame start. Multi-byte
//! fields inside the payload are little-endian, unlike the length field.

mod decoder;
mod scanner;

pub use decoder::{
    decode_frame, decode_kilometer_post, decode_number, decode_speed, decode_timestamp,
};
pub use scanner::{FrameAccumulator, FrameSpan, find_frame};

/// Frame start marker (DLE STX).
pub const START_MARKER: [u8; 2] = [0x10, 0x02];
/// Frame end marker (DLE ETX).
pub const END_MARKER: [u8; 2] = [0x10, 0x03];
/// Start marker + length field + end marker.
pub const FRAME_OVERHEAD: usize = 6;
/// Shortest frame that carries every telemetry field.
pub const MIN_FRAME_LENGTH: usize = 86;

pub const TIMESTAMP_OFFSET: usize = 45;
pub const SPEED_OFFSET: usize = 49;
pub const KILOMETER_POST_OFFSET: usize = 57;
pub const TRAIN_NUMBER_OFFSET: usize = 66;
pub const LOCOMOTIVE_NUMBER_OFFSET: usize = 74;

/// Speed occupies the low 10 bits of its 24-bit field.
pub const SPEED_MASK: u32 = 0x3FF;
/// Kilometer-post sign bit (set = negative).
pub const KM_SIGN_BIT: u32 = 1 << 23;
/// Kilometer-post trend bit (set = increasing).
pub const KM_TREND_BIT: u32 = 1 << 22;
/// Kilometer-post magnitude in meters.
pub const KM_MAGNITUDE_MASK: u32 = 0x3F_FFFF;

/// Frame captured from a running device; decoded whenever no live frame has
/// ever been received.
///
/// Decodes to `2025-08-19 16:09:20`, 45 km/h, km 2.364, train 55172,
/// locomotive 1.
pub const REFERENCE_FRAME: [u8; MIN_FRAME_LENGTH] = [
    0x10, 0x02, 0x00, 0x50, 0x11, 0x00, 0x01, 0x00, 0x05, 0x00, 0x38, 0x00, 0x67, 0x01, 0x00,
    0x01, 0x20, 0x20, 0x20, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x84, 0xD7, 0x00, 0x74, 0x39, 0xC0, 0x05,
    0x54, 0x02, 0x27, 0x66, 0x2D, 0x00, 0x00, 0x06, 0x02, 0xFF, 0xFF, 0x02, 0x3C, 0x09, 0x00,
    0x20, 0x03, 0x2D, 0x00, 0x03, 0x08, 0x84, 0xD7, 0x00, 0x91, 0x9F, 0x12, 0x25, 0x15, 0x01,
    0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 0x1F, 0xCF, 0x1E, 0x10, 0x03,
];
