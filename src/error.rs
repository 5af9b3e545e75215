//! Error types
//!
//! Crate-level error plus the per-layer errors it wraps.

use crate::media::multipart::DemuxError;
use crate::registry::RegistryError;

/// Errors that can occur while configuring or running the hub
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O error (socket bind, process spawn, pipe read)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration, detected before any channel starts
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The frame source produced output that violates the multipart contract
    #[error("demux error: {0}")]
    Demux(#[from] DemuxError),

    /// Channel lookup failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The frame source could not be started
    #[error("source error: {0}")]
    Source(String),
}

/// Configuration errors
///
/// Every channel-level variant names the offending channel so the startup
/// diagnostic points at the right entry.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for the expected schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A channel has an empty name
    #[error("stream #{index} has an empty name")]
    EmptyName { index: usize },

    /// Two channels share a name
    #[error("duplicate stream name: {0}")]
    DuplicateName(String),

    /// A channel has no source locator
    #[error("stream {channel}: source is empty")]
    EmptySource { channel: String },

    /// Framerate must be strictly positive
    #[error("stream {channel}: framerate must be > 0 (got {framerate})")]
    InvalidFramerate { channel: String, framerate: i64 },

    /// Resolution must look like `WIDTHxHEIGHT`
    #[error("stream {channel}: invalid resolution {resolution:?} (expected WIDTHxHEIGHT)")]
    InvalidResolution { channel: String, resolution: String },

    /// Restart delay must be at least one second
    #[error("restart_interval_secs must be > 0")]
    ZeroRestartInterval,

    /// Listen address could not be parsed
    #[error("invalid listen address {0:?}")]
    InvalidAddr(String),

    /// Multipart boundary cannot be used in a header
    #[error("invalid multipart boundary {0:?}")]
    InvalidBoundary(String),

    /// No channels configured
    #[error("no streams configured")]
    NoStreams,
}

/// Convenience alias for `Result<T, Error>`
pub type Result<T> = std::result::Result<T, Error>;
