//! Source supervision
//!
//! One supervisor per channel. It cycles through an explicit restart state
//! machine forever:
//!
//! ```text
//!   Starting ──► Running ──► Exited ──► Restarting ──┐
//!      ▲                                             │
//!      └───────────── after restart_interval ────────┘
//! ```
//!
//! A launch failure skips straight from Starting to Exited. Nothing is ever
//! fatal to the loop: every failure ends the current run and the source is
//! relaunched after the same fixed delay.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::media::multipart::{
    DemuxError, MultipartDemuxer, DEFAULT_BOUNDARY, DEFAULT_MAX_FRAME_SIZE,
};
use crate::registry::{BroadcastHub, Frame};
use crate::stats::{SupervisorCounters, SupervisorStats, ThroughputMeter};

use super::FrameSource;

/// Default delay between a source exiting and its relaunch
pub const DEFAULT_RESTART_INTERVAL: Duration = Duration::from_secs(10);

/// Supervisor lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    /// Launching the source
    Starting,
    /// Source running, frames being demuxed
    Running,
    /// Source gone (or never came up)
    Exited,
    /// Waiting out the restart interval
    Restarting,
}

/// Supervisor settings
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Fixed delay before each relaunch
    pub restart_interval: Duration,
    /// Multipart boundary token the source emits
    pub boundary: String,
    /// Largest accepted frame
    pub max_frame_size: usize,
    /// Throughput report window (None disables reporting)
    pub report_interval: Option<Duration>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_interval: DEFAULT_RESTART_INTERVAL,
            boundary: DEFAULT_BOUNDARY.to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            report_interval: None,
        }
    }
}

/// Why a run ended
#[derive(Debug)]
pub enum SourceExit {
    /// The source could not be launched
    StartFailed(Error),
    /// Output ended cleanly
    EndOfStream,
    /// Output was unreadable or violated the framing contract
    StreamError(DemuxError),
}

/// Result of one Starting → Exited pass
#[derive(Debug)]
pub struct RunOutcome {
    pub exit: SourceExit,
    /// Frames demuxed during this run
    pub frames: u64,
    /// Process exit status, when there was a process and it could be reaped
    pub status: Option<ExitStatus>,
}

/// Keeps one source alive for one channel
pub struct Supervisor<S> {
    source: S,
    hub: Arc<BroadcastHub>,
    config: SupervisorConfig,
    phase: watch::Sender<SupervisorPhase>,
    counters: SupervisorCounters,
    meter: Arc<ThroughputMeter>,
}

impl<S: FrameSource> Supervisor<S> {
    /// Create a supervisor that feeds `hub` from `source`
    pub fn new(source: S, hub: Arc<BroadcastHub>, config: SupervisorConfig) -> Self {
        let (phase, _) = watch::channel(SupervisorPhase::Starting);

        Self {
            source,
            hub,
            config,
            phase,
            counters: SupervisorCounters::new(),
            meter: Arc::new(ThroughputMeter::new()),
        }
    }

    /// Channel name
    pub fn channel(&self) -> &str {
        self.hub.channel()
    }

    /// Current phase
    pub fn phase(&self) -> SupervisorPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<SupervisorPhase> {
        self.phase.subscribe()
    }

    /// Lifetime counters
    pub fn stats(&self) -> SupervisorStats {
        self.counters.snapshot()
    }

    fn set_phase(&self, phase: SupervisorPhase) {
        self.phase.send_replace(phase);
    }

    /// Supervise forever
    ///
    /// Only returns if the surrounding task is aborted.
    pub async fn run(&self) {
        loop {
            let outcome = self.run_once().await;

            match &outcome.exit {
                SourceExit::StartFailed(e) => {
                    tracing::error!(
                        channel = %self.channel(),
                        error = %e,
                        "Failed to start source"
                    );
                }
                SourceExit::EndOfStream => {
                    tracing::info!(
                        channel = %self.channel(),
                        frames = outcome.frames,
                        status = ?outcome.status,
                        "Source ended, stopping stream"
                    );
                }
                SourceExit::StreamError(e) => {
                    tracing::warn!(
                        channel = %self.channel(),
                        frames = outcome.frames,
                        status = ?outcome.status,
                        error = %e,
                        "Source stream failed, stopping stream"
                    );
                }
            }

            self.set_phase(SupervisorPhase::Restarting);
            self.counters.on_restart();
            tracing::info!(
                channel = %self.channel(),
                delay_secs = self.config.restart_interval.as_secs_f64(),
                "Restarting stream after delay"
            );
            tokio::time::sleep(self.config.restart_interval).await;
        }
    }

    /// Launch the source once and demux until it exits
    ///
    /// Ends in [`SupervisorPhase::Exited`]. The process, if any, has been
    /// reaped by the time this returns, so the next launch never overlaps it.
    pub async fn run_once(&self) -> RunOutcome {
        self.set_phase(SupervisorPhase::Starting);
        self.counters.on_start();

        let running = match self.source.start().await {
            Ok(running) => running,
            Err(e) => {
                self.counters.on_failed_start();
                self.set_phase(SupervisorPhase::Exited);
                return RunOutcome {
                    exit: SourceExit::StartFailed(e),
                    frames: 0,
                    status: None,
                };
            }
        };

        let (output, child) = running.into_parts();
        self.set_phase(SupervisorPhase::Running);
        tracing::info!(
            channel = %self.channel(),
            pid = ?child.as_ref().and_then(|c| c.id()),
            "Started stream"
        );

        let _reporter = self.spawn_reporter();
        let mut demuxer = MultipartDemuxer::new(output, &self.config.boundary)
            .max_frame_size(self.config.max_frame_size);

        let exit = loop {
            match demuxer.next_frame().await {
                Ok(Some(data)) => {
                    self.meter.record(data.len());
                    self.counters.on_frame();
                    let outcome = self.hub.publish(Frame::new(data)).await;
                    tracing::trace!(
                        channel = %self.channel(),
                        relayed = outcome.relayed,
                        "Frame published"
                    );
                }
                Ok(None) => break SourceExit::EndOfStream,
                Err(e) => break SourceExit::StreamError(e),
            }
        };

        let frames = demuxer.parts_read();
        tracing::debug!(
            channel = %self.channel(),
            frames,
            bytes = demuxer.bytes_read(),
            "Source output closed"
        );
        drop(demuxer);

        let status = match child {
            Some(mut child) => {
                if matches!(exit, SourceExit::StreamError(_)) {
                    // Output is unusable; don't wait for the process to notice
                    let _ = child.start_kill();
                }
                match child.wait().await {
                    Ok(status) => Some(status),
                    Err(e) => {
                        tracing::warn!(
                            channel = %self.channel(),
                            error = %e,
                            "Failed to reap source process"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        self.set_phase(SupervisorPhase::Exited);

        RunOutcome {
            exit,
            frames,
            status,
        }
    }

    fn spawn_reporter(&self) -> Option<ReporterGuard> {
        let interval = self.config.report_interval?;
        let meter = Arc::clone(&self.meter);
        let channel = self.channel().to_string();

        // Discard whatever accumulated while the source was down
        meter.take_sample();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let sample = meter.take_sample();
                tracing::info!(
                    channel = %channel,
                    kib_per_sec = format_args!("{:.2}", sample.kib_per_sec()),
                    fps = format_args!("{:.1}", sample.fps()),
                    "Stream rate"
                );
            }
        });

        Some(ReporterGuard(handle))
    }
}

impl<S: FrameSource> Supervisor<S> {
    /// Spawn [`Supervisor::run`] as a background task
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Stops the throughput reporter when a run ends
struct ReporterGuard(JoinHandle<()>);

impl Drop for ReporterGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}
