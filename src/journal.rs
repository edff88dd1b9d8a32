//! Append-only text journal of sent packets
//!
//! Records every cycle that reached a client or carried a detection. Each
//! entry is a block of `key: value` lines followed by a blank line, e.g.
//!
//! ```text
//! Time: 2025-08-19 16:09:20.417
//! Detection Flags: camera1_visible=0, camera1_thermal=1, camera2_visible=0, camera2_thermal=0
//! Send Result: SUCCESS
//! Packet Size: 56 bytes
//! Client Count: 2
//! Packet Data (HEX): AA 00 01 00 00 19 08 ...
//! Packet Structure Analysis:
//!   Header: 0xAA
//!   Detection Flags: [0, 1, 0, 0]
//!   Payload (48 bytes): 19 08 13 ...
//!   CRC16: 0x1234
//!   Footer: 0xFF
//! ```

use chrono::Local;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::packet::{OutboundPacket, PACKET_LEN};
use crate::types::{DetectionChannel, DetectionFlagSet};
use crate::{RelayError, Result};

pub struct Journal {
    file: File,
    path: PathBuf,
}

impl Journal {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| RelayError::Journal { path: path.clone(), source })?;
        info!(path = %path.display(), "Packet journal enabled");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a cycle is worth journaling.
    pub fn should_record(recipients: usize, flags: DetectionFlagSet) -> bool {
        recipients > 0 || flags.any()
    }

    /// Append one entry stamped with the local time.
    pub fn record(
        &mut self,
        packet: &OutboundPacket,
        flags: DetectionFlagSet,
        recipients: usize,
    ) -> Result<()> {
        let time = Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        let entry = format_entry(&time, packet, flags, recipients);
        self.file.write_all(entry.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

/// Render one journal block.
pub fn format_entry(
    time: &str,
    packet: &OutboundPacket,
    flags: DetectionFlagSet,
    recipients: usize,
) -> String {
    let bytes = packet.as_bytes();
    let mut out = String::with_capacity(512);

    let flag_list = DetectionChannel::ALL
        .iter()
        .map(|&c| format!("{}={}", c.as_str(), u8::from(flags.get(c))))
        .collect::<Vec<_>>()
        .join(", ");

    // Writing into a String cannot fail.
    let _ = writeln!(out, "Time: {}", time);
    let _ = writeln!(out, "Detection Flags: {}", flag_list);
    let _ = writeln!(out, "Send Result: {}", if recipients > 0 { "SUCCESS" } else { "NO CLIENTS" });
    let _ = writeln!(out, "Packet Size: {} bytes", PACKET_LEN);
    let _ = writeln!(out, "Client Count: {}", recipients);
    let _ = writeln!(out, "Packet Data (HEX): {}", packet.to_hex());
    let _ = writeln!(out, "Packet Structure Analysis:");
    let _ = writeln!(out, "  Header: 0x{:02X}", bytes[0]);
    let _ = writeln!(
        out,
        "  Detection Flags: [{}, {}, {}, {}]",
        bytes[1], bytes[2], bytes[3], bytes[4]
    );
    let _ = writeln!(out, "  Payload (48 bytes): {}", hex(packet.payload()));
    let _ = writeln!(out, "  CRC16: 0x{:04X}", packet.crc());
    let _ = writeln!(out, "  Footer: 0x{:02X}", bytes[PACKET_LEN - 1]);
    out.push('\n');
    out
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ")
}
