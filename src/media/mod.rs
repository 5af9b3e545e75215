//! Media framing
//!
//! Only one container is handled: `multipart/x-mixed-replace` carrying JPEG
//! parts, both as read from ffmpeg and as written to viewers.

pub mod multipart;

pub use multipart::{encode_part, stream_content_type, DemuxError, MultipartDemuxer};
