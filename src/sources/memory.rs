//! Scripted in-memory source for testing and captured serial dumps

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::source::ByteSource;
use crate::{RelayError, Result};

#[derive(Debug)]
enum Chunk {
    Data(Vec<u8>),
    Error(String),
}

/// Feeds pre-scripted chunks, one per read.
///
/// Clones share the same queue, so a test can keep a handle and push more
/// data while the relay owns the source. An empty chunk simulates a quiet
/// cycle; an exhausted queue reads as quiet too.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    chunks: Arc<Mutex<VecDeque<Chunk>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        let source = Self::new();
        for chunk in chunks {
            source.push(chunk);
        }
        source
    }

    /// Queue bytes for a future read.
    pub fn push(&self, bytes: impl Into<Vec<u8>>) {
        self.queue().push_back(Chunk::Data(bytes.into()));
    }

    /// Queue a read failure.
    pub fn push_error(&self, reason: impl Into<String>) {
        self.queue().push_back(Chunk::Error(reason.into()));
    }

    /// Chunks not yet read.
    pub fn remaining(&self) -> usize {
        self.queue().len()
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Chunk>> {
        self.chunks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl ByteSource for MemorySource {
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut queue = self.queue();
        match queue.pop_front() {
            None => Ok(0),
            Some(Chunk::Error(reason)) => Err(RelayError::serial("memory", reason)),
            Some(Chunk::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    queue.push_front(Chunk::Data(data.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
