//! Throughput and supervision counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default window for throughput reports
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Bytes-per-window meter
///
/// The demuxer records every frame; a reporter periodically takes the rate,
/// which also resets the window.
#[derive(Debug)]
pub struct ThroughputMeter {
    bytes: AtomicU64,
    frames: AtomicU64,
    window_start: Mutex<Instant>,
}

/// One closed measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSample {
    /// Bytes seen in the window
    pub bytes: u64,
    /// Frames seen in the window
    pub frames: u64,
    /// Window length
    pub elapsed: Duration,
}

impl ThroughputSample {
    /// Rate in KiB per second
    pub fn kib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs / 1024.0
        } else {
            0.0
        }
    }

    /// Frames per second
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self {
            bytes: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            window_start: Mutex::new(Instant::now()),
        }
    }

    /// Record one frame of `bytes` bytes
    pub fn record(&self, bytes: usize) {
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Close the current window and start a new one
    pub fn take_sample(&self) -> ThroughputSample {
        let mut start = self.window_start.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(*start);
        *start = now;

        ThroughputSample {
            bytes: self.bytes.swap(0, Ordering::Relaxed),
            frames: self.frames.swap(0, Ordering::Relaxed),
            elapsed,
        }
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Supervisor lifetime counters
#[derive(Debug, Default)]
pub struct SupervisorCounters {
    starts: AtomicU64,
    failed_starts: AtomicU64,
    restarts: AtomicU64,
    frames: AtomicU64,
}

/// Snapshot of [`SupervisorCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Source launch attempts
    pub starts: u64,
    /// Launch attempts that failed before producing output
    pub failed_starts: u64,
    /// Restart delays entered
    pub restarts: u64,
    /// Frames demuxed across all runs
    pub frames: u64,
}

impl SupervisorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(&self) {
        self.starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_failed_start(&self) {
        self.failed_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SupervisorStats {
        SupervisorStats {
            starts: self.starts.load(Ordering::Relaxed),
            failed_starts: self.failed_starts.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
        }
    }
}
