//! Receiver-side view of a downstream packet
//!
//! Used by the periodic debug log and by consumers that want to check what
//! the relay actually sent.

use serde::Serialize;
use std::fmt;

use super::{
    CRC_OFFSET, FLAGS_OFFSET, PACKET_FOOTER, PACKET_HEADER, PACKET_LEN, PAYLOAD_OFFSET, crc16,
};
use crate::protocol::KM_MAGNITUDE_MASK;
use crate::types::{CivilDateTime, DetectionFlagSet, YEAR_BASE};
use crate::{RelayError, Result};

/// Fields recovered from a 56-byte downstream packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketSummary {
    pub flags: DetectionFlagSet,
    pub date_time: CivilDateTime,
    pub train_number: u32,
    /// Locomotive characters with trailing NULs removed.
    pub locomotive: String,
    pub kilometer_post_km: f64,
    pub trend_increasing: bool,
    pub speed_kmh: u16,
    pub crc: u16,
}

impl PacketSummary {
    /// Validate framing and CRC, then pull the payload fields back out.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PACKET_LEN {
            return Err(RelayError::packet(format!(
                "expected {} bytes, got {}",
                PACKET_LEN,
                bytes.len()
            )));
        }
        if bytes[0] != PACKET_HEADER || bytes[PACKET_LEN - 1] != PACKET_FOOTER {
            return Err(RelayError::packet(format!(
                "bad framing {:02X}..{:02X}",
                bytes[0],
                bytes[PACKET_LEN - 1]
            )));
        }

        let crc = u16::from_le_bytes([bytes[CRC_OFFSET], bytes[CRC_OFFSET + 1]]);
        let expected = crc16(&bytes[..CRC_OFFSET]);
        if crc != expected {
            return Err(RelayError::packet(format!(
                "CRC mismatch: carried {:04X}, computed {:04X}",
                crc, expected
            )));
        }

        let mut flag_bytes = [0u8; 4];
        flag_bytes.copy_from_slice(&bytes[FLAGS_OFFSET..PAYLOAD_OFFSET]);

        let p = &bytes[PAYLOAD_OFFSET..CRC_OFFSET];
        let kilometer_post = u32::from_be_bytes([p[14], p[15], p[16], p[17]]);
        let locomotive = p[11..14]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| char::from(b))
            .collect();

        Ok(Self {
            flags: DetectionFlagSet::from_bytes(flag_bytes),
            date_time: CivilDateTime {
                year: YEAR_BASE + u16::from(p[0]),
                month: p[1],
                day: p[2],
                hour: p[3],
                minute: p[4],
                second: p[5],
            },
            train_number: u32::from_be_bytes([p[6], p[7], p[8], p[9]]),
            locomotive,
            kilometer_post_km: f64::from(kilometer_post & KM_MAGNITUDE_MASK) / 1000.0,
            trend_increasing: kilometer_post & super::TREND_INCREASING != 0,
            speed_kmh: u16::from_be_bytes([p[18], p[19]]),
            crc,
        })
    }
}

impl fmt::Display for PacketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} train {} loco {} km {:.3} speed {} km/h crc {:04X}",
            self.date_time,
            self.train_number,
            self.locomotive,
            self.kilometer_post_km,
            self.speed_kmh,
            self.crc
        )
    }
}
