//! Single-slot relay
//!
//! The hand-off between the demuxer and one streaming viewer. The slot holds
//! at most one undelivered frame: offering a frame never waits, and a frame
//! still sitting in the slot when a newer one arrives is discarded rather than
//! queued behind it. A viewer that falls behind therefore skips frames and
//! always resumes at the newest one.

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::frame::Frame;

/// Capacity-1, never-blocking hand-off slot
#[derive(Debug, Default)]
pub struct RelaySlot {
    pending: Mutex<Option<Frame>>,
    ready: Notify,
}

impl RelaySlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a frame in the slot without waiting
    ///
    /// Returns `true` if an undelivered frame was discarded to make room.
    pub fn offer(&self, frame: Frame) -> bool {
        let displaced = self.pending.lock().replace(frame).is_some();
        self.ready.notify_one();
        displaced
    }

    /// Take the pending frame, if any
    pub fn try_take(&self) -> Option<Frame> {
        self.pending.lock().take()
    }

    /// Wait until a frame is available and take it
    ///
    /// Cancel safe: a frame is only removed from the slot when this returns.
    pub async fn recv(&self) -> Frame {
        loop {
            if let Some(frame) = self.try_take() {
                return frame;
            }
            // notify_one leaves a permit behind if nobody is waiting yet, so
            // an offer racing with this check is never missed.
            self.ready.notified().await;
        }
    }
}
