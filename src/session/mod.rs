//! Viewer sessions
//!
//! Two ways to watch a channel:
//! - streaming: [`StreamSession`] sends the newest frame each time the client
//!   is ready for another part, over one long-lived response
//! - single image: [`ImageReply`] serves the most recent frame, rate limited
//!   to the channel's framerate

pub mod image;
pub mod state;
pub mod stream;

pub use image::ImageReply;
pub use state::{SessionSummary, ViewerPhase};
pub use stream::StreamSession;
