//! Frame type shared between the demuxer and viewers

use std::time::{Duration, Instant};

use bytes::Bytes;

/// One still image (a complete JPEG)
///
/// Cheap to clone: the payload is reference counted, so every viewer shares
/// the allocation the demuxer produced.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded image bytes
    pub data: Bytes,
    /// When the demuxer finished reading this frame
    pub received_at: Instant,
}

impl Frame {
    /// Wrap freshly demuxed bytes
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            received_at: Instant::now(),
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time since the frame was demuxed
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }
}

impl From<Bytes> for Frame {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for Frame {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}
