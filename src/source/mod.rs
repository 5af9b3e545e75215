//! Frame sources and their supervision
//!
//! A [`FrameSource`] launches one instance of an external producer whose
//! output is a multipart stream of JPEG frames. [`Supervisor`] keeps one
//! instance per channel alive forever, restarting it at a fixed interval
//! whenever it exits.

pub mod ffmpeg;
pub mod supervisor;

use std::future::Future;

use tokio::io::AsyncRead;
use tokio::process::Child;

use crate::error::{Error, Result};

pub use ffmpeg::{quality_to_qscale, FfmpegSource};
pub use supervisor::{RunOutcome, SourceExit, Supervisor, SupervisorConfig, SupervisorPhase};

/// Something that can be launched to produce a multipart frame stream
pub trait FrameSource: Send + Sync + 'static {
    /// Launch one instance
    ///
    /// The returned output is read until it ends; the process (if any) is
    /// then reaped before the next launch.
    fn start(&self) -> impl Future<Output = Result<RunningSource>> + Send;
}

/// A launched source: its output stream plus the process behind it
pub struct RunningSource {
    output: Box<dyn AsyncRead + Send + Unpin>,
    child: Option<Child>,
}

impl RunningSource {
    /// Take over a spawned process whose stdout is piped
    pub fn from_child(mut child: Child) -> Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Source("process stdout is not piped".into()))?;

        Ok(Self {
            output: Box::new(stdout),
            child: Some(child),
        })
    }

    /// A source with no process behind it
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            output: Box::new(reader),
            child: None,
        }
    }

    /// Split into the output stream and the process handle
    pub fn into_parts(self) -> (Box<dyn AsyncRead + Send + Unpin>, Option<Child>) {
        (self.output, self.child)
    }
}

impl std::fmt::Debug for RunningSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningSource")
            .field("pid", &self.child.as_ref().and_then(|c| c.id()))
            .finish()
    }
}
