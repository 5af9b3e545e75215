//! Streaming viewer session
//!
//! The response body pulls parts straight from the viewer's relay slot, so
//! the slot is the only buffer between the demuxer and the client. A frame is
//! taken from the slot only when the server asks the body for its next chunk;
//! anything published while the client is still busy with the previous part
//! replaces what is waiting in the slot.
//!
//! The session ends when the server drops the body. That happens while the
//! body waits for a frame when the client disconnects, and right after a part
//! was handed out when writing that part failed.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::Stream;

use crate::media::multipart::{encode_part, JPEG_CONTENT_TYPE};
use crate::registry::{BroadcastHub, ViewerRegistration};

use super::state::{SessionSummary, ViewerPhase};

/// One streaming viewer
///
/// Registered with the hub from construction until the session is dropped.
#[derive(Debug)]
pub struct StreamSession {
    viewer: ViewerRegistration,
    boundary: String,
    frames_sent: u64,
    bytes_sent: u64,
    started_at: Instant,
    /// Set while waiting on the relay slot
    waiting: bool,
}

impl StreamSession {
    /// Register a new viewer on `hub`
    pub fn new(hub: &Arc<BroadcastHub>, boundary: impl Into<String>) -> Self {
        let session = Self {
            viewer: hub.register_viewer(),
            boundary: boundary.into(),
            frames_sent: 0,
            bytes_sent: 0,
            started_at: Instant::now(),
            waiting: false,
        };

        tracing::info!(
            channel = %hub.channel(),
            viewer = session.viewer.id(),
            viewers = hub.viewer_count(),
            "Viewer connected"
        );

        session
    }

    /// Wait for the next relayed frame and encode it as one multipart part
    ///
    /// Cancel safe: dropping the future while it waits leaves the slot
    /// untouched.
    pub async fn next_part(&mut self) -> Bytes {
        self.waiting = true;
        let frame = self.viewer.recv().await;
        self.waiting = false;

        let part = encode_part(&self.boundary, JPEG_CONTENT_TYPE, &frame.data);
        self.frames_sent += 1;
        self.bytes_sent += part.len() as u64;

        tracing::trace!(
            channel = %self.viewer.hub().channel(),
            viewer = self.viewer.id(),
            bytes = frame.len(),
            age_ms = frame.age().as_millis() as u64,
            "Sending frame"
        );

        part
    }

    /// Turn the session into a response body stream
    ///
    /// Each part is its own chunk, so it is flushed to the client as soon as
    /// the server picks it up. The stream never ends on its own.
    pub fn into_body(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures::stream::unfold(self, |mut session| async move {
            let part = session.next_part().await;
            Some((Ok(part), session))
        })
    }

    /// How the session would end if it were dropped now
    pub fn exit_phase(&self) -> ViewerPhase {
        if self.waiting || self.frames_sent == 0 {
            ViewerPhase::Disconnected
        } else {
            ViewerPhase::Failed
        }
    }

    /// Snapshot of the session so far, still `Active`
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            viewer_id: self.viewer.id(),
            phase: ViewerPhase::Active,
            frames_sent: self.frames_sent,
            bytes_sent: self.bytes_sent,
            duration: self.started_at.elapsed(),
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        let summary = SessionSummary {
            phase: self.exit_phase(),
            ..self.summary()
        };
        let channel = self.viewer.hub().channel();

        match summary.phase {
            ViewerPhase::Failed => tracing::info!(
                channel = %channel,
                viewer = summary.viewer_id,
                frames = summary.frames_sent,
                bytes = summary.bytes_sent,
                "Failed to write frame, viewer dropped"
            ),
            _ => tracing::info!(
                channel = %channel,
                viewer = summary.viewer_id,
                frames = summary.frames_sent,
                bytes = summary.bytes_sent,
                duration_secs = summary.duration.as_secs(),
                "Viewer disconnected"
            ),
        }
    }
}
