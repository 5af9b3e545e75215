//! Viewer session state

use std::time::Duration;

/// Streaming viewer lifecycle phase
///
/// `Active` until the session ends; `Disconnected` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    /// Registered and forwarding frames
    Active,
    /// Client went away while the session was waiting for a frame
    Disconnected,
    /// Writing a frame to the client failed
    Failed,
}

/// Summary of a streaming session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Viewer ID within the channel's hub
    pub viewer_id: u64,
    /// `Active` while running, terminal once the session has ended
    pub phase: ViewerPhase,
    /// Parts written to the client
    pub frames_sent: u64,
    /// Bytes written to the client (including part headers)
    pub bytes_sent: u64,
    /// How long the viewer was connected
    pub duration: Duration,
}
