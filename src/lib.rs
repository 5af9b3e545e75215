//! mjpeg-hub: supervised ffmpeg MJPEG relay
//!
//! This library provides:
//! - One supervised ffmpeg process per configured channel, restarted on exit
//! - A multipart demuxer that splits ffmpeg's `mpjpeg` output into JPEG frames
//! - Per-channel broadcast hubs with a latest-frame cache and per-viewer relay slots
//! - HTTP endpoints for live `multipart/x-mixed-replace` streams and single images
//!
//! # Example
//!
//! ```no_run
//! use mjpeg_hub::{FileConfig, HubServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (config, channels) = FileConfig::load("mjpeg-hub.yaml")?.into_parts()?;
//!     let server = HubServer::new(config, channels)?;
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod media;
pub mod registry;
pub mod server;
pub mod session;
pub mod source;
pub mod stats;

// Re-export main types for convenience
pub use channel::{Channel, ChannelConfig, Resolution};
pub use config::FileConfig;
pub use error::{ConfigError, Error, Result};
pub use registry::{BroadcastHub, ChannelRegistry, Frame};
pub use server::{HubServer, ServerConfig};
pub use source::{FfmpegSource, FrameSource, Supervisor, SupervisorConfig};
