//! Trackside telemetry relay.
//!
//! Reads GYK frames from the onboard safety device over RS-422, decodes
//! vehicle telemetry (time, speed, kilometer post, train and locomotive
//! numbers), merges in object-detection flags from the vision subsystem and
//! broadcasts a fixed 56-byte packet to every connected TCP client on a fixed
//! interval.
//!
//! # Features
//!
//! - **Never silent**: one packet per cycle, falling back from live to cached
//!   to simulated telemetry
//! - **Cross-read framing**: frames split across serial reads still decode
//! - **Isolated clients**: a slow or dead client never affects the others
//!
//! # Pipeline
//!
//! ```text
//! ByteSource -> FrameAccumulator -> decode_frame -> ContinuityPolicy
//!            -> OutboundPacket::assemble (+ DetectionFlags) -> BroadcastServer
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trackside_relay::{BroadcastServer, DetectionFlags, RelayConfig, RelayLoop, sources};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::default();
//!     let server = BroadcastServer::start(config.listen_addr()).await?;
//!     let source = sources::open_serial_or_disconnected(&config.serial);
//!     let flags = Arc::new(DetectionFlags::new());
//!
//!     let handle = RelayLoop::new(config, source, flags, server).spawn();
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! Decoding and encoding are usable on their own:
//!
//! ```rust
//! use trackside_relay::protocol::{REFERENCE_FRAME, decode_frame};
//! use trackside_relay::{DetectionFlagSet, OutboundPacket};
//!
//! let telemetry = decode_frame(&REFERENCE_FRAME).unwrap();
//! assert_eq!(telemetry.train_number, "55172");
//!
//! let packet = OutboundPacket::assemble(&telemetry, DetectionFlagSet::default());
//! assert_eq!(packet.as_bytes()[0], 0xAA);
//! assert_eq!(packet.as_bytes()[55], 0xFF);
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire formats
pub mod packet;
pub mod protocol;

// Relay pipeline
pub mod broadcast;
pub mod continuity;
pub mod journal;
pub mod relay;
pub mod source;
pub mod sources;

// Core exports
pub use error::*;
pub use types::*;

pub use broadcast::BroadcastServer;
pub use config::RelayConfig;
pub use continuity::{ContinuityPolicy, Resolved};
pub use packet::{OutboundPacket, PacketSummary};
pub use relay::{CycleReport, RelayHandle, RelayLoop};
pub use source::ByteSource;
