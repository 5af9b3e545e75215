//! ffmpeg frame source
//!
//! Runs ffmpeg against the channel's source and has it write an `mpjpeg`
//! stream (JPEG parts separated by a boundary) to stdout.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::channel::{clamp_quality, Channel};
use crate::error::{Error, Result};

use super::{FrameSource, RunningSource};

/// Best (lowest) ffmpeg `-q:v` value
pub const QSCALE_MIN: u8 = 1;

/// Worst (highest) ffmpeg `-q:v` value
pub const QSCALE_MAX: u8 = 31;

/// Default ffmpeg binary
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Map a 1–100 quality percentage onto ffmpeg's 1–31 `-q:v` scale
///
/// Out-of-range input is clamped first, so 0 behaves like 1 and 200 like 100.
/// Higher quality never yields a higher (worse) scale value.
pub fn quality_to_qscale(quality: i64) -> u8 {
    let quality = f64::from(clamp_quality(quality));
    let compression = (100.0 - quality * (100.0 / 31.0)).round();
    compression.clamp(f64::from(QSCALE_MIN), f64::from(QSCALE_MAX)) as u8
}

/// ffmpeg invocation for one channel
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    channel: String,
    program: String,
    args: Vec<String>,
}

impl FfmpegSource {
    /// Prepare the invocation for `channel`, emitting parts delimited by `boundary`
    pub fn new(channel: &Channel, program: impl Into<String>, boundary: &str) -> Self {
        Self {
            channel: channel.name().to_string(),
            program: program.into(),
            args: build_args(channel, boundary),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Build the ffmpeg argument list
pub fn build_args(channel: &Channel, boundary: &str) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];

    let source = channel.source();
    if source.starts_with("rtsp://") || source.starts_with("rtsps://") {
        args.push("-rtsp_transport".to_string());
        args.push("tcp".to_string());
    }

    let qscale = quality_to_qscale(i64::from(channel.quality()));
    let output: [&str; 16] = [
        "-i",
        source,
        "-an",
        "-c:v",
        "mjpeg",
        "-q:v",
        &qscale.to_string(),
        "-vf",
        &channel.resolution().scale_filter(),
        "-r",
        &channel.framerate().to_string(),
        "-f",
        "mpjpeg",
        "-boundary_tag",
        boundary,
        "-",
    ];
    args.extend(output.iter().map(|s| s.to_string()));

    args
}

impl FrameSource for FfmpegSource {
    async fn start(&self) -> Result<RunningSource> {
        tracing::debug!(
            channel = %self.channel,
            command = %format!("{} {}", self.program, self.args.join(" ")),
            "Spawning ffmpeg"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Source(format!("failed to spawn {}: {}", self.program, e)))?;

        // Forward ffmpeg's own diagnostics into the log
        if let Some(stderr) = child.stderr.take() {
            let channel = self.channel.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(channel = %channel, "ffmpeg: {}", line);
                }
            });
        }

        RunningSource::from_child(child)
    }
}

#[cfg(test)]
mod tests {
    use crate::channel::ChannelConfig;

    use super::*;

    fn channel(source: &str, quality: i64) -> Channel {
        let config = ChannelConfig {
            name: "front".into(),
            source: source.into(),
            resolution: "1280x720".into(),
            quality,
            framerate: 15,
        };
        Channel::from_config(0, &config).unwrap()
    }

    #[test]
    fn test_qscale_in_range() {
        for quality in 1..=100 {
            let q = quality_to_qscale(quality);
            assert!((QSCALE_MIN..=QSCALE_MAX).contains(&q), "quality {} -> {}", quality, q);
        }
    }

    #[test]
    fn test_qscale_monotonic() {
        let mut previous = quality_to_qscale(1);
        for quality in 2..=100 {
            let q = quality_to_qscale(quality);
            assert!(q <= previous, "quality {} -> {} > {}", quality, q, previous);
            previous = q;
        }
    }

    #[test]
    fn test_qscale_clamps_input() {
        assert_eq!(quality_to_qscale(0), quality_to_qscale(1));
        assert_eq!(quality_to_qscale(-40), quality_to_qscale(1));
        assert_eq!(quality_to_qscale(200), quality_to_qscale(100));
    }

    #[test]
    fn test_qscale_known_values() {
        assert_eq!(quality_to_qscale(1), QSCALE_MAX);
        // 100 - 22 * 100/31 = 29.03
        assert_eq!(quality_to_qscale(22), 29);
        // 100 - 25 * 100/31 = 19.35
        assert_eq!(quality_to_qscale(25), 19);
        assert_eq!(quality_to_qscale(100), QSCALE_MIN);
    }

    #[test]
    fn test_args_for_rtsp_source() {
        let source = FfmpegSource::new(&channel("rtsp://cam/live", 25), "ffmpeg", "ffmpeg");
        let args = source.args().join(" ");

        assert_eq!(source.program(), "ffmpeg");
        assert!(args.contains("-rtsp_transport tcp -i rtsp://cam/live"));
        assert!(args.contains("-q:v 19"));
        assert!(args.contains("-vf scale=1280:720"));
        assert!(args.contains("-r 15"));
        assert!(args.contains("-f mpjpeg -boundary_tag ffmpeg -"));
        assert_eq!(source.args().last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_args_for_file_source() {
        let source = FfmpegSource::new(&channel("/videos/loop.mp4", 80), "/usr/bin/ffmpeg", "cam");
        let args = source.args().join(" ");

        assert!(!args.contains("-rtsp_transport"));
        assert!(args.contains("-i /videos/loop.mp4"));
        assert!(args.contains("-boundary_tag cam"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let source = FfmpegSource::new(
            &channel("rtsp://cam/live", 50),
            "/nonexistent/ffmpeg-binary",
            "ffmpeg",
        );

        let err = source.start().await.unwrap_err();
        assert!(matches!(err, Error::Source(_)));
    }
}
