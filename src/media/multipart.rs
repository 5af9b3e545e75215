//! Multipart (`multipart/x-mixed-replace`) framing
//!
//! ffmpeg's `mpjpeg` muxer writes one JPEG per part:
//!
//! ```text
//! --ffmpeg\r\n
//! Content-type: image/jpeg\r\n
//! Content-length: 31337\r\n
//! \r\n
//! <31337 bytes of JPEG>\r\n
//! --ffmpeg\r\n
//! ...
//! ```
//!
//! [`MultipartDemuxer`] turns such a byte stream back into whole frames, and
//! [`encode_part`] produces the same framing for viewers.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default boundary token (ffmpeg's `mpjpeg` default)
pub const DEFAULT_BOUNDARY: &str = "ffmpeg";

/// Content type of every part the hub emits
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Longest accepted delimiter or header line
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Default upper bound on a single frame
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 64 * 1024;

/// Framing errors
#[derive(Debug, thiserror::Error)]
pub enum DemuxError {
    /// Reading the underlying stream failed
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stream ended in the middle of a part
    #[error("unexpected end of stream inside a part")]
    UnexpectedEof,

    /// Expected a delimiter line, found something else
    #[error("expected boundary {expected:?}, found {found:?}")]
    MalformedBoundary { expected: String, found: String },

    /// A part header line had no `:` separator
    #[error("malformed part header: {0:?}")]
    MalformedHeader(String),

    /// A part carried no Content-Type header
    #[error("part is missing a Content-Type header")]
    MissingContentType,

    /// A delimiter or header line exceeded [`MAX_LINE_LENGTH`]
    #[error("line exceeds {} bytes", MAX_LINE_LENGTH)]
    LineTooLong,

    /// A part body exceeded the configured maximum frame size
    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
}

/// Headers of a single part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeaders {
    pub content_type: Option<String>,
    pub content_length: Option<usize>,
}

/// Incremental demuxer over an async byte stream
pub struct MultipartDemuxer<R> {
    reader: R,
    buf: BytesMut,
    delimiter: String,
    close_delimiter: String,
    body_delimiter: Vec<u8>,
    max_frame_size: usize,
    parts_read: u64,
    bytes_read: u64,
    finished: bool,
}

impl<R: AsyncRead + Unpin> MultipartDemuxer<R> {
    /// Create a demuxer for parts separated by `--{boundary}`
    pub fn new(reader: R, boundary: &str) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
            delimiter: format!("--{}", boundary),
            close_delimiter: format!("--{}--", boundary),
            body_delimiter: format!("\r\n--{}", boundary).into_bytes(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            parts_read: 0,
            bytes_read: 0,
            finished: false,
        }
    }

    /// Set the maximum accepted frame size
    pub fn max_frame_size(mut self, limit: usize) -> Self {
        self.max_frame_size = limit;
        self
    }

    /// Number of complete parts yielded so far
    pub fn parts_read(&self) -> u64 {
        self.parts_read
    }

    /// Total bytes pulled from the underlying reader
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Read the next whole frame
    ///
    /// Returns `Ok(None)` on a clean end of stream: the closing delimiter, or
    /// EOF that falls exactly between parts. Once `None` or an error has been
    /// returned, further calls return `Ok(None)`.
    ///
    /// Not cancel safe: dropping the future mid-part loses that part.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, DemuxError> {
        if self.finished {
            return Ok(None);
        }

        match self.read_part().await {
            Ok(Some(frame)) => {
                self.parts_read += 1;
                Ok(Some(frame))
            }
            other => {
                self.finished = true;
                other
            }
        }
    }

    async fn read_part(&mut self) -> Result<Option<Bytes>, DemuxError> {
        if !self.seek_delimiter().await? {
            return Ok(None);
        }

        let headers = self.read_headers().await?;
        if headers.content_type.is_none() {
            return Err(DemuxError::MissingContentType);
        }

        let body = match headers.content_length {
            Some(len) => {
                if len > self.max_frame_size {
                    return Err(DemuxError::FrameTooLarge {
                        limit: self.max_frame_size,
                    });
                }
                self.read_exact(len).await?
            }
            None => self.read_until_delimiter().await?,
        };

        Ok(Some(body))
    }

    /// Consume lines up to and including the next delimiter
    ///
    /// Returns false on a clean end of stream.
    async fn seek_delimiter(&mut self) -> Result<bool, DemuxError> {
        loop {
            let line = match self.read_line().await? {
                Some(line) => line,
                None => return Ok(false),
            };
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end();

            if line == self.delimiter {
                return Ok(true);
            }
            if line == self.close_delimiter {
                return Ok(false);
            }
            // Blank lines separate parts; anything else is only tolerated as
            // preamble before the first part.
            if line.is_empty() || self.parts_read == 0 {
                continue;
            }

            return Err(DemuxError::MalformedBoundary {
                expected: self.delimiter.clone(),
                found: line.to_string(),
            });
        }
    }

    async fn read_headers(&mut self) -> Result<PartHeaders, DemuxError> {
        let mut headers = PartHeaders::default();

        loop {
            let line = self.read_line().await?.ok_or(DemuxError::UnexpectedEof)?;
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end();

            if line.is_empty() {
                return Ok(headers);
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| DemuxError::MalformedHeader(line.to_string()))?;
            let value = value.trim();

            if name.trim().eq_ignore_ascii_case("content-type") {
                headers.content_type = Some(value.to_string());
            } else if name.trim().eq_ignore_ascii_case("content-length") {
                // An unparseable length falls back to delimiter scanning
                headers.content_length = value.parse().ok();
            }
        }
    }

    /// Read one `\n`-terminated line, without the terminator
    ///
    /// `Ok(None)` means EOF with nothing buffered.
    async fn read_line(&mut self) -> Result<Option<Bytes>, DemuxError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buf[scanned..].iter().position(|&b| b == b'\n') {
                let mut line = self.buf.split_to(scanned + pos + 1);
                line.truncate(line.len() - 1);
                return Ok(Some(line.freeze()));
            }
            scanned = self.buf.len();

            if self.buf.len() > MAX_LINE_LENGTH {
                return Err(DemuxError::LineTooLong);
            }

            if self.fill().await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // Trailing data without a newline: only a bare closing
                // delimiter is acceptable here.
                return Ok(Some(self.buf.split().freeze()));
            }
        }
    }

    async fn read_exact(&mut self, len: usize) -> Result<Bytes, DemuxError> {
        while self.buf.len() < len {
            if self.fill().await? == 0 {
                return Err(DemuxError::UnexpectedEof);
            }
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Read a body that has no Content-Length
    ///
    /// The body ends right before `\r\n--boundary`; the delimiter itself is
    /// left in the buffer (minus the CRLF) for [`Self::seek_delimiter`].
    async fn read_until_delimiter(&mut self) -> Result<Bytes, DemuxError> {
        let needle_len = self.body_delimiter.len();
        let mut scanned = 0;

        loop {
            if let Some(pos) = find(&self.buf[scanned..], &self.body_delimiter) {
                let body = self.buf.split_to(scanned + pos).freeze();
                self.buf.advance(2);
                return Ok(body);
            }
            // Keep enough tail to match a delimiter split across reads
            scanned = self.buf.len().saturating_sub(needle_len - 1);

            if self.buf.len() > self.max_frame_size {
                return Err(DemuxError::FrameTooLarge {
                    limit: self.max_frame_size,
                });
            }

            if self.fill().await? == 0 {
                return Err(DemuxError::UnexpectedEof);
            }
        }
    }

    async fn fill(&mut self) -> std::io::Result<usize> {
        self.buf.reserve(READ_CHUNK);
        let n = self.reader.read_buf(&mut self.buf).await?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Encode one frame as a self-contained multipart part
///
/// Each part opens with its own delimiter and ends with CRLF, so a viewer can
/// be handed parts one at a time and render each as soon as it arrives.
pub fn encode_part(boundary: &str, content_type: &str, data: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        boundary,
        content_type,
        data.len()
    );

    let mut part = BytesMut::with_capacity(header.len() + data.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(data);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// `Content-Type` value for a stream of parts using `boundary`
pub fn stream_content_type(boundary: &str) -> String {
    format!("multipart/x-mixed-replace; boundary={}", boundary)
}
