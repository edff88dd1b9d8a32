//! Downstream packet encoding
//!
//! Every relay cycle produces one 56-byte packet:
//!
//! ```text
//! [0xAA][flags x4][payload x48][crc16 lo][crc16 hi][0xFF]
//! ```
//!
//! The CRC covers bytes 0..53 (header, flags and payload). There is no length
//! prefix; consumers resynchronize on the fixed header, footer and length.
//!
//! Payload layout (offsets within the 48-byte block):
//!
//! | bytes | content |
//! |---|---|
//! | 0-5 | year-2000, month, day, hour, minute, second |
//! | 6-9 | train number, big-endian u32 |
//! | 10 | locomotive field length, always 3 |
//! | 11-13 | first three locomotive-number characters, `CRH` when absent |
//! | 14-17 | kilometer post meters with the trend bit set, big-endian u32 |
//! | 18-19 | speed km/h, big-endian u16 |
//! | 20-39 | fixed operational fields |
//! | 40-47 | zero |

mod crc;
mod summary;

pub use crc::{CRC16_INIT, CRC16_POLY_REFLECTED, crc16};
pub use summary::PacketSummary;

use chrono::{Datelike, Local, Timelike};
use std::fmt;

use crate::protocol::KM_MAGNITUDE_MASK;
use crate::types::{CivilDateTime, DetectionFlagSet, ParsedTelemetry, YEAR_BASE};

pub const PACKET_HEADER: u8 = 0xAA;
pub const PACKET_FOOTER: u8 = 0xFF;
pub const PACKET_LEN: usize = 56;
pub const PAYLOAD_LEN: usize = 48;

pub(crate) const FLAGS_OFFSET: usize = 1;
pub(crate) const PAYLOAD_OFFSET: usize = 5;
pub(crate) const CRC_OFFSET: usize = PAYLOAD_OFFSET + PAYLOAD_LEN;

/// Train number sent when the decoded one is not numeric.
pub const DEFAULT_TRAIN_NUMBER: u32 = 1001;
/// Locomotive characters sent when the decoded number is empty.
pub const DEFAULT_LOCOMOTIVE: [u8; 3] = *b"CRH";
/// Locomotive field length indicator.
pub const LOCOMOTIVE_FIELD_LEN: u8 = 3;
/// Kilometer-post trend bit in the downstream encoding; always set (increasing).
pub const TREND_INCREASING: u32 = 1 << 23;

/// Operational fields with no upstream source: station 0x0105, line 0x0201,
/// speed limit 120.0 km/h, up-line main track, route 1, green signal, driver
/// id 12 34 56 78 9A BC, curve radius 1000 m, gradient 10 per mille.
const OPERATIONAL_FIELDS: [u8; 20] = [
    0x01, 0x05, 0x02, 0x01, 0x04, 0xB0, 0x05, 0x01, 0x01, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC,
    0x00, 0x03, 0xE8, 0x00, 0x0A,
];

/// Encode telemetry into the 48-byte downstream payload.
///
/// A malformed timestamp is replaced by the local wall-clock time; an empty
/// one leaves the date/time bytes zero.
pub fn encode_payload(telemetry: &ParsedTelemetry) -> [u8; PAYLOAD_LEN] {
    encode_payload_with_clock(telemetry, local_now)
}

pub(crate) fn encode_payload_with_clock(
    telemetry: &ParsedTelemetry,
    clock: impl FnOnce() -> CivilDateTime,
) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];

    if !telemetry.timestamp.is_empty() {
        let dt = CivilDateTime::parse(&telemetry.timestamp).unwrap_or_else(clock);
        payload[0] = dt.year.wrapping_sub(YEAR_BASE) as u8;
        payload[1] = dt.month;
        payload[2] = dt.day;
        payload[3] = dt.hour;
        payload[4] = dt.minute;
        payload[5] = dt.second;
    }

    if !telemetry.train_number.is_empty() {
        let train = telemetry.train_number.parse::<u32>().unwrap_or(DEFAULT_TRAIN_NUMBER);
        payload[6..10].copy_from_slice(&train.to_be_bytes());
    }

    payload[10] = LOCOMOTIVE_FIELD_LEN;
    if telemetry.locomotive_number.is_empty() {
        payload[11..14].copy_from_slice(&DEFAULT_LOCOMOTIVE);
    } else {
        for (slot, byte) in payload[11..14].iter_mut().zip(telemetry.locomotive_number.bytes()) {
            *slot = byte;
        }
    }

    let kilometer_post = kilometer_post_meters(telemetry.kilometer_post_km) | TREND_INCREASING;
    payload[14..18].copy_from_slice(&kilometer_post.to_be_bytes());

    let speed = telemetry.speed_kmh as u16;
    payload[18..20].copy_from_slice(&speed.to_be_bytes());

    payload[20..40].copy_from_slice(&OPERATIONAL_FIELDS);

    payload
}

/// Kilometer post magnitude in whole meters, limited to the 22-bit field.
fn kilometer_post_meters(km: f64) -> u32 {
    ((km.abs() * 1000.0).round() as u32) & KM_MAGNITUDE_MASK
}

fn local_now() -> CivilDateTime {
    let now = Local::now();
    CivilDateTime {
        year: now.year().clamp(0, i32::from(u16::MAX)) as u16,
        month: now.month() as u8,
        day: now.day() as u8,
        hour: now.hour() as u8,
        minute: now.minute() as u8,
        second: now.second() as u8,
    }
}

/// One immutable 56-byte downstream packet.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct OutboundPacket([u8; PACKET_LEN]);

impl OutboundPacket {
    /// Encode telemetry and this cycle's detection flags into a framed packet.
    pub fn assemble(telemetry: &ParsedTelemetry, flags: DetectionFlagSet) -> Self {
        Self::from_payload(&encode_payload(telemetry), flags)
    }

    /// Frame an already encoded payload.
    pub fn from_payload(payload: &[u8; PAYLOAD_LEN], flags: DetectionFlagSet) -> Self {
        let mut bytes = [0u8; PACKET_LEN];
        bytes[0] = PACKET_HEADER;
        bytes[FLAGS_OFFSET..PAYLOAD_OFFSET].copy_from_slice(&flags.to_bytes());
        bytes[PAYLOAD_OFFSET..CRC_OFFSET].copy_from_slice(payload);

        let crc = crc16(&bytes[..CRC_OFFSET]);
        bytes[CRC_OFFSET..CRC_OFFSET + 2].copy_from_slice(&crc.to_le_bytes());
        bytes[PACKET_LEN - 1] = PACKET_FOOTER;

        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    pub fn flags(&self) -> DetectionFlagSet {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.0[FLAGS_OFFSET..PAYLOAD_OFFSET]);
        DetectionFlagSet::from_bytes(raw)
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[PAYLOAD_OFFSET..CRC_OFFSET]
    }

    pub fn crc(&self) -> u16 {
        u16::from_le_bytes([self.0[CRC_OFFSET], self.0[CRC_OFFSET + 1]])
    }

    /// Uppercase hex, bytes separated by spaces.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
    }
}

impl AsRef<[u8]> for OutboundPacket {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for OutboundPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OutboundPacket").field(&self.to_hex()).finish()
    }
}
