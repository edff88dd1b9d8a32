//! One-shot detection flags shared with the vision subsystem

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// The four camera channels that can raise a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionChannel {
    Camera1Visible,
    Camera1Thermal,
    Camera2Visible,
    Camera2Thermal,
}

impl DetectionChannel {
    /// All channels in wire order.
    pub const ALL: [DetectionChannel; 4] = [
        DetectionChannel::Camera1Visible,
        DetectionChannel::Camera1Thermal,
        DetectionChannel::Camera2Visible,
        DetectionChannel::Camera2Thermal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionChannel::Camera1Visible => "camera1_visible",
            DetectionChannel::Camera1Thermal => "camera1_thermal",
            DetectionChannel::Camera2Visible => "camera2_visible",
            DetectionChannel::Camera2Thermal => "camera2_thermal",
        }
    }
}

/// Lock-free "event occurred since last check" flags.
///
/// Producers call [`raise`](Self::raise) from any thread; the relay calls
/// [`take`](Self::take) once per cycle, which reads and clears all four flags.
/// Several raises between two takes coalesce into a single `true`.
#[derive(Debug, Default)]
pub struct DetectionFlags {
    camera1_visible: AtomicBool,
    camera1_thermal: AtomicBool,
    camera2_visible: AtomicBool,
    camera2_thermal: AtomicBool,
}

impl DetectionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, channel: DetectionChannel) -> &AtomicBool {
        match channel {
            DetectionChannel::Camera1Visible => &self.camera1_visible,
            DetectionChannel::Camera1Thermal => &self.camera1_thermal,
            DetectionChannel::Camera2Visible => &self.camera2_visible,
            DetectionChannel::Camera2Thermal => &self.camera2_thermal,
        }
    }

    /// Record a detection on `channel`.
    pub fn raise(&self, channel: DetectionChannel) {
        self.slot(channel).store(true, Ordering::Release);
    }

    /// Atomically read and clear all four flags.
    pub fn take(&self) -> DetectionFlagSet {
        DetectionFlagSet {
            camera1_visible: self.camera1_visible.swap(false, Ordering::AcqRel),
            camera1_thermal: self.camera1_thermal.swap(false, Ordering::AcqRel),
            camera2_visible: self.camera2_visible.swap(false, Ordering::AcqRel),
            camera2_thermal: self.camera2_thermal.swap(false, Ordering::AcqRel),
        }
    }

    /// Read the flags without clearing them.
    pub fn peek(&self) -> DetectionFlagSet {
        DetectionFlagSet {
            camera1_visible: self.camera1_visible.load(Ordering::Acquire),
            camera1_thermal: self.camera1_thermal.load(Ordering::Acquire),
            camera2_visible: self.camera2_visible.load(Ordering::Acquire),
            camera2_thermal: self.camera2_thermal.load(Ordering::Acquire),
        }
    }
}

/// Snapshot of the four flags taken for one relay cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectionFlagSet {
    pub camera1_visible: bool,
    pub camera1_thermal: bool,
    pub camera2_visible: bool,
    pub camera2_thermal: bool,
}

impl DetectionFlagSet {
    /// Set with only `channel` raised.
    pub fn only(channel: DetectionChannel) -> Self {
        let mut set = Self::default();
        set.set(channel, true);
        set
    }

    pub fn get(&self, channel: DetectionChannel) -> bool {
        match channel {
            DetectionChannel::Camera1Visible => self.camera1_visible,
            DetectionChannel::Camera1Thermal => self.camera1_thermal,
            DetectionChannel::Camera2Visible => self.camera2_visible,
            DetectionChannel::Camera2Thermal => self.camera2_thermal,
        }
    }

    pub fn set(&mut self, channel: DetectionChannel, value: bool) {
        match channel {
            DetectionChannel::Camera1Visible => self.camera1_visible = value,
            DetectionChannel::Camera1Thermal => self.camera1_thermal = value,
            DetectionChannel::Camera2Visible => self.camera2_visible = value,
            DetectionChannel::Camera2Thermal => self.camera2_thermal = value,
        }
    }

    /// Whether any channel reported a detection.
    pub fn any(&self) -> bool {
        DetectionChannel::ALL.iter().any(|&c| self.get(c))
    }

    /// Wire representation: one `0x00`/`0x01` byte per channel in wire order.
    pub fn to_bytes(&self) -> [u8; 4] {
        DetectionChannel::ALL.map(|c| u8::from(self.get(c)))
    }

    /// Inverse of [`to_bytes`](Self::to_bytes); any non-zero byte counts as raised.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        let mut set = Self::default();
        for (channel, byte) in DetectionChannel::ALL.into_iter().zip(bytes) {
            set.set(channel, byte != 0);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn take_clears_flags() {
        let flags = DetectionFlags::new();
        flags.raise(DetectionChannel::Camera2Thermal);

        let first = flags.take();
        assert_eq!(first, DetectionFlagSet::only(DetectionChannel::Camera2Thermal));
        assert_eq!(flags.take(), DetectionFlagSet::default());
    }

    #[test]
    fn repeated_raises_coalesce() {
        let flags = DetectionFlags::new();
        for _ in 0..5 {
            flags.raise(DetectionChannel::Camera1Visible);
        }
        let set = flags.take();
        assert!(set.camera1_visible);
        assert_eq!(set.to_bytes(), [1, 0, 0, 0]);
        assert!(!flags.take().any());
    }

    #[test]
    fn peek_does_not_clear() {
        let flags = DetectionFlags::new();
        flags.raise(DetectionChannel::Camera1Thermal);
        assert!(flags.peek().camera1_thermal);
        assert!(flags.take().camera1_thermal);
    }

    #[test]
    fn no_event_is_lost_across_threads() {
        let flags = Arc::new(DetectionFlags::new());
        let producers: Vec<_> = DetectionChannel::ALL
            .into_iter()
            .map(|channel| {
                let flags = Arc::clone(&flags);
                std::thread::spawn(move || flags.raise(channel))
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let set = flags.take();
        assert_eq!(set.to_bytes(), [1, 1, 1, 1]);
    }

    #[test]
    fn bytes_follow_wire_order() {
        let set = DetectionFlagSet::only(DetectionChannel::Camera2Visible);
        assert_eq!(set.to_bytes(), [0, 0, 1, 0]);
        assert_eq!(DetectionFlagSet::from_bytes([0, 0, 7, 0]), set);
    }
}
