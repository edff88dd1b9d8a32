//! Frame location in raw serial bytes

use std::ops::Range;
use tracing::trace;

use super::{FRAME_OVERHEAD, MIN_FRAME_LENGTH, START_MARKER};

/// Default bound on bytes held between reads.
pub const DEFAULT_ACCUMULATOR_CAPACITY: usize = 4096;

/// Location of a candidate frame inside a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    pub start: usize,
    pub len: usize,
}

impl FrameSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Find the first candidate frame in `buf`.
///
/// Candidate starts are the offsets `0..=buf.len() - MIN_FRAME_LENGTH` holding
/// the start marker. The big-endian length field that follows gives the info
/// length; the frame spans `info_length + 6` bytes and must fit in `buf`.
/// Returns `None` when no candidate fits, which is the normal outcome for a
/// quiet or partial read.
pub fn find_frame(buf: &[u8]) -> Option<FrameSpan> {
    if buf.len() < MIN_FRAME_LENGTH {
        return None;
    }

    (0..=buf.len() - MIN_FRAME_LENGTH).find_map(|start| {
        if buf[start..start + 2] != START_MARKER {
            return None;
        }
        let info_len = u16::from_be_bytes([buf[start + 2], buf[start + 3]]) as usize;
        let span = FrameSpan { start, len: info_len + FRAME_OVERHEAD };
        (span.end() <= buf.len()).then_some(span)
    })
}

/// Holds serial bytes between reads so a frame split across two reads still
/// decodes.
///
/// Bytes before an extracted frame, and bytes that can never begin a frame,
/// are discarded. The buffer never grows past its capacity; the oldest bytes
/// go first.
#[derive(Debug)]
pub struct FrameAccumulator {
    pending: Vec<u8>,
    capacity: usize,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ACCUMULATOR_CAPACITY)
    }
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity is raised to at least one minimum-length frame.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_FRAME_LENGTH);
        Self { pending: Vec::with_capacity(capacity), capacity }
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > self.capacity {
            let overflow = self.pending.len() - self.capacity;
            trace!(overflow, "Frame accumulator full, dropping oldest bytes");
            self.pending.drain(..overflow);
        }
    }

    /// Extract the first complete frame, consuming everything up to its end.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        match find_frame(&self.pending) {
            Some(span) => {
                let frame = self.pending[span.range()].to_vec();
                self.pending.drain(..span.end());
                Some(frame)
            }
            None => {
                self.discard_unusable();
                None
            }
        }
    }

    /// Extract every complete candidate frame, oldest first.
    ///
    /// Candidates are not validated; a spurious marker inside line noise can
    /// yield one that later fails to decode.
    pub fn drain_frames(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Bytes currently held.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Drop the prefix that cannot be the start of a frame.
    fn discard_unusable(&mut self) {
        let keep_from = self
            .pending
            .iter()
            .enumerate()
            .position(|(i, &b)| {
                b == START_MARKER[0]
                    && self.pending.get(i + 1).is_none_or(|&next| next == START_MARKER[1])
            })
            .unwrap_or(self.pending.len());

        if keep_from > 0 {
            self.pending.drain(..keep_from);
        }
    }
}
