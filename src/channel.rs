//! Channel definitions
//!
//! A channel is one named video feed. The raw [`ChannelConfig`] comes straight
//! from the config file; [`Channel`] is the validated, immutable form the rest
//! of the crate works with.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Lowest quality percentage accepted from configuration
pub const MIN_QUALITY: i64 = 1;

/// Highest quality percentage accepted from configuration
pub const MAX_QUALITY: i64 = 100;

/// Default quality when a stream entry omits it
pub const DEFAULT_QUALITY: i64 = 80;

/// Raw per-stream entry as it appears in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Channel name, used as the first URL path segment
    pub name: String,
    /// Source locator passed to ffmpeg (`-i`)
    pub source: String,
    /// Target resolution, `WIDTHxHEIGHT`
    pub resolution: String,
    /// Quality percentage (clamped to 1..=100)
    #[serde(default = "default_quality")]
    pub quality: i64,
    /// Target framerate (must be > 0)
    pub framerate: i64,
}

fn default_quality() -> i64 {
    DEFAULT_QUALITY
}

/// Target output resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Parse `WIDTHxHEIGHT` (e.g. `1280x720`)
    pub fn parse(s: &str) -> Option<Self> {
        let (w, h) = s.trim().split_once(['x', 'X'])?;
        let width = w.trim().parse().ok().filter(|&v| v > 0)?;
        let height = h.trim().parse().ok().filter(|&v| v > 0)?;
        Some(Self { width, height })
    }

    /// Argument for ffmpeg's `scale` filter
    pub fn scale_filter(&self) -> String {
        format!("scale={}:{}", self.width, self.height)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A validated channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    name: String,
    source: String,
    resolution: Resolution,
    quality: u8,
    framerate: u32,
}

impl Channel {
    /// Validate a raw config entry
    ///
    /// `index` is the entry's position in the file, used only to identify
    /// entries that have no usable name.
    pub fn from_config(index: usize, config: &ChannelConfig) -> Result<Self, ConfigError> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyName { index });
        }

        if config.source.trim().is_empty() {
            return Err(ConfigError::EmptySource {
                channel: name.to_string(),
            });
        }

        let framerate = u32::try_from(config.framerate)
            .ok()
            .filter(|&f| f > 0)
            .ok_or_else(|| ConfigError::InvalidFramerate {
                channel: name.to_string(),
                framerate: config.framerate,
            })?;

        let resolution =
            Resolution::parse(&config.resolution).ok_or_else(|| ConfigError::InvalidResolution {
                channel: name.to_string(),
                resolution: config.resolution.clone(),
            })?;

        Ok(Self {
            name: name.to_string(),
            source: config.source.trim().to_string(),
            resolution,
            quality: clamp_quality(config.quality),
            framerate,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Quality percentage, already clamped to 1..=100
    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn framerate(&self) -> u32 {
        self.framerate
    }

    /// Minimum spacing between single-image responses
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.framerate
    }
}

/// Clamp a configured quality into 1..=100
pub fn clamp_quality(quality: i64) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, framerate: i64) -> ChannelConfig {
        ChannelConfig {
            name: name.into(),
            source: "rtsp://camera/live".into(),
            resolution: "640x480".into(),
            quality: 80,
            framerate,
        }
    }

    #[test]
    fn test_resolution_parse() {
        let res = Resolution::parse("1280x720").unwrap();
        assert_eq!(res.width, 1280);
        assert_eq!(res.height, 720);
        assert_eq!(res.scale_filter(), "scale=1280:720");
        assert_eq!(res.to_string(), "1280x720");

        assert!(Resolution::parse("1280").is_none());
        assert!(Resolution::parse("0x720").is_none());
        assert!(Resolution::parse("widexhigh").is_none());
    }

    #[test]
    fn test_valid_channel() {
        let channel = Channel::from_config(0, &entry("front", 10)).unwrap();
        assert_eq!(channel.name(), "front");
        assert_eq!(channel.framerate(), 10);
        assert_eq!(channel.frame_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_framerate_rejected() {
        let err = Channel::from_config(0, &entry("front", 0)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidFramerate { ref channel, framerate: 0 } if channel == "front"
        ));
    }

    #[test]
    fn test_negative_framerate_rejected() {
        let err = Channel::from_config(0, &entry("back", -5)).unwrap_err();
        assert!(err.to_string().contains("back"));
    }

    #[test]
    fn test_empty_name_and_source_rejected() {
        assert!(matches!(
            Channel::from_config(3, &entry("  ", 10)),
            Err(ConfigError::EmptyName { index: 3 })
        ));

        let mut cfg = entry("side", 10);
        cfg.source = String::new();
        assert!(matches!(
            Channel::from_config(0, &cfg),
            Err(ConfigError::EmptySource { .. })
        ));
    }

    #[test]
    fn test_quality_clamped() {
        let mut cfg = entry("front", 10);
        cfg.quality = 0;
        assert_eq!(Channel::from_config(0, &cfg).unwrap().quality(), 1);
        cfg.quality = 200;
        assert_eq!(Channel::from_config(0, &cfg).unwrap().quality(), 100);
    }
}
