//! Config file loading
//!
//! The config file is YAML. Everything except `streams` is optional:
//!
//! ```yaml
//! verbosity: 1
//! port: 8080
//! streams:
//!   - name: front
//!     source: rtsp://camera/front
//!     resolution: 1280x720
//!     quality: 80
//!     framerate: 10
//! ```

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::channel::{Channel, ChannelConfig};
use crate::error::ConfigError;
use crate::server::config::{ServerConfig, DEFAULT_PORT};

/// Longest boundary allowed by RFC 2046
const MAX_BOUNDARY_LENGTH: usize = 70;

/// On-disk configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// 0 = info, 1 = debug plus rate reports, 2 = trace
    #[serde(default)]
    pub verbosity: u8,

    /// Listen address, without the port
    #[serde(default = "default_addr")]
    pub addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// ffmpeg binary
    #[serde(default)]
    pub ffmpeg: Option<String>,

    /// Multipart boundary used between ffmpeg and viewers
    #[serde(default)]
    pub boundary: Option<String>,

    /// Seconds to wait before relaunching a failed source
    #[serde(default)]
    pub restart_interval_secs: Option<u64>,

    pub streams: Vec<ChannelConfig>,
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl FileConfig {
    /// Read and parse a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse config text
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Socket address built from `addr` and `port`
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .addr
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(self.addr.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Validate into server settings and the channel list
    ///
    /// Channels keep their file order. Any invalid entry rejects the whole
    /// config so nothing starts half-configured.
    pub fn into_parts(self) -> Result<(ServerConfig, Vec<Channel>), ConfigError> {
        if self.streams.is_empty() {
            return Err(ConfigError::NoStreams);
        }

        let mut config = ServerConfig::with_addr(self.bind_addr()?);

        if let Some(ffmpeg) = self.ffmpeg.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            config = config.ffmpeg_path(ffmpeg);
        }
        if let Some(boundary) = &self.boundary {
            validate_boundary(boundary)?;
            config = config.boundary(boundary.as_str());
        }
        match self.restart_interval_secs {
            Some(0) => return Err(ConfigError::ZeroRestartInterval),
            Some(secs) => config = config.restart_interval(Duration::from_secs(secs)),
            None => {}
        }
        if self.verbosity >= 1 {
            config = config.report_rates();
        }

        let mut seen = HashSet::new();
        let mut channels = Vec::with_capacity(self.streams.len());
        for (index, entry) in self.streams.iter().enumerate() {
            let channel = Channel::from_config(index, entry)?;
            if !seen.insert(channel.name().to_string()) {
                return Err(ConfigError::DuplicateName(channel.name().to_string()));
            }
            channels.push(channel);
        }

        Ok((config, channels))
    }
}

/// Check that a boundary is a plain token
pub fn validate_boundary(boundary: &str) -> Result<(), ConfigError> {
    let valid = !boundary.is_empty()
        && boundary.len() <= MAX_BOUNDARY_LENGTH
        && boundary
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"'()+_,-./:=?".contains(&b));

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidBoundary(boundary.to_string()))
    }
}
