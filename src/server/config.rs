//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::media::multipart::{DEFAULT_BOUNDARY, DEFAULT_MAX_FRAME_SIZE};
use crate::source::ffmpeg::DEFAULT_FFMPEG;
use crate::source::supervisor::{SupervisorConfig, DEFAULT_RESTART_INTERVAL};
use crate::stats::DEFAULT_REPORT_INTERVAL;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// ffmpeg binary used for every channel
    pub ffmpeg_path: String,

    /// Multipart boundary token, shared by ffmpeg output and viewer streams
    pub boundary: String,

    /// Delay before a channel's source is relaunched
    pub restart_interval: Duration,

    /// Largest frame accepted from a source
    pub max_frame_size: usize,

    /// Stream rate report window (None disables reports)
    pub report_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            ffmpeg_path: DEFAULT_FFMPEG.to_string(),
            boundary: DEFAULT_BOUNDARY.to_string(),
            restart_interval: DEFAULT_RESTART_INTERVAL,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            report_interval: None,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the ffmpeg binary
    pub fn ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Set the multipart boundary token
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Set the restart delay
    pub fn restart_interval(mut self, interval: Duration) -> Self {
        self.restart_interval = interval;
        self
    }

    /// Set the maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Enable stream rate reports every [`DEFAULT_REPORT_INTERVAL`]
    pub fn report_rates(mut self) -> Self {
        self.report_interval = Some(DEFAULT_REPORT_INTERVAL);
        self
    }

    /// Supervisor settings derived from this config
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            restart_interval: self.restart_interval,
            boundary: self.boundary.clone(),
            max_frame_size: self.max_frame_size,
            report_interval: self.report_interval,
        }
    }
}
