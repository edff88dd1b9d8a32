//! Packed GYK date/time bitfield and its civil representation

use serde::{Deserialize, Serialize};
use std::fmt;

const SECOND_MASK: u32 = 0x3F;
const MINUTE_SHIFT: u32 = 6;
const MINUTE_MASK: u32 = 0x3F;
const HOUR_SHIFT: u32 = 12;
const HOUR_MASK: u32 = 0x1F;
const DAY_SHIFT: u32 = 17;
const DAY_MASK: u32 = 0x1F;
const MONTH_SHIFT: u32 = 22;
const MONTH_MASK: u32 = 0x0F;
const YEAR_SHIFT: u32 = 26;
const YEAR_MASK: u32 = 0x3F;

/// Base year of the 6-bit year offset.
pub const YEAR_BASE: u16 = 2000;

/// 32-bit date/time bitfield as transmitted by the onboard safety device.
///
/// Layout, least significant bit first: second (6), minute (6), hour (5),
/// day (5), month (4), year offset from 2000 (6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedDateTime(pub u32);

impl PackedDateTime {
    /// Build from the four little-endian bytes of the timestamp field.
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// Pack civil date/time fields. Returns `None` when any field is out of range.
    pub fn pack(dt: CivilDateTime) -> Option<Self> {
        if !dt.is_in_range() || dt.year < YEAR_BASE || dt.year > YEAR_BASE + YEAR_MASK as u16 {
            return None;
        }

        let year = u32::from(dt.year - YEAR_BASE);
        Some(Self(
            u32::from(dt.second)
                | (u32::from(dt.minute) << MINUTE_SHIFT)
                | (u32::from(dt.hour) << HOUR_SHIFT)
                | (u32::from(dt.day) << DAY_SHIFT)
                | (u32::from(dt.month) << MONTH_SHIFT)
                | (year << YEAR_SHIFT),
        ))
    }

    pub fn second(&self) -> u8 {
        (self.0 & SECOND_MASK) as u8
    }

    pub fn minute(&self) -> u8 {
        ((self.0 >> MINUTE_SHIFT) & MINUTE_MASK) as u8
    }

    pub fn hour(&self) -> u8 {
        ((self.0 >> HOUR_SHIFT) & HOUR_MASK) as u8
    }

    pub fn day(&self) -> u8 {
        ((self.0 >> DAY_SHIFT) & DAY_MASK) as u8
    }

    pub fn month(&self) -> u8 {
        ((self.0 >> MONTH_SHIFT) & MONTH_MASK) as u8
    }

    pub fn year(&self) -> u16 {
        YEAR_BASE + ((self.0 >> YEAR_SHIFT) & YEAR_MASK) as u16
    }

    /// Unpack into civil fields.
    ///
    /// No calendar validation is applied: the device's bits are reported as-is.
    pub fn unpack(&self) -> CivilDateTime {
        CivilDateTime {
            year: self.year(),
            month: self.month(),
            day: self.day(),
            hour: self.hour(),
            minute: self.minute(),
            second: self.second(),
        }
    }

    /// Get the raw u32 value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Civil date/time broken into the six fields the downstream payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivilDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilDateTime {
    /// Parse the `YYYY-MM-DD HH:MM:SS` rendering produced by the decoder.
    ///
    /// Any deviation from that exact shape yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        if bytes.len() != 19
            || bytes[4] != b'-'
            || bytes[7] != b'-'
            || bytes[10] != b' '
            || bytes[13] != b':'
            || bytes[16] != b':'
        {
            return None;
        }

        let field = |start: usize, len: usize| -> Option<u16> {
            let digits = text.get(start..start + len)?;
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()
        };

        Some(Self {
            year: field(0, 4)?,
            month: u8::try_from(field(5, 2)?).ok()?,
            day: u8::try_from(field(8, 2)?).ok()?,
            hour: u8::try_from(field(11, 2)?).ok()?,
            minute: u8::try_from(field(14, 2)?).ok()?,
            second: u8::try_from(field(17, 2)?).ok()?,
        })
    }

    /// Whether every field lies in its calendar range (day 1-31, month 1-12, ...).
    pub fn is_in_range(&self) -> bool {
        (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
    }
}

impl fmt::Display for CivilDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
