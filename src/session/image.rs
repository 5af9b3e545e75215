//! Single-image requests
//!
//! Stateless: a request that finds a frame is held for one frame interval
//! before completing, so a client polling in a loop cannot exceed the
//! channel's framerate. The frame is read again after the hold, so the client
//! gets whatever is newest when the response goes out. A request that finds
//! no frame completes immediately.

use std::time::Duration;

use crate::registry::{BroadcastHub, Frame};

/// Outcome of one single-image request
#[derive(Debug, Clone)]
pub enum ImageReply {
    /// No frame has been produced yet, or the last one was empty
    Unavailable,
    /// The most recent frame
    Frame {
        frame: Frame,
        /// Rate-limit hold for this request
        hold: Duration,
    },
}

impl ImageReply {
    /// Read the hub's most recent frame
    pub async fn latest(hub: &BroadcastHub, frame_interval: Duration) -> Self {
        match hub.last_frame().await {
            Some(frame) if !frame.is_empty() => ImageReply::Frame {
                frame,
                hold: frame_interval,
            },
            _ => ImageReply::Unavailable,
        }
    }

    /// Serve one single-image request: hold, then take the newest frame
    pub async fn fetch(hub: &BroadcastHub, frame_interval: Duration) -> Self {
        let reply = Self::latest(hub, frame_interval).await;
        if !reply.is_available() {
            return reply;
        }

        reply.rate_limit().await;
        Self::latest(hub, frame_interval).await
    }

    /// Wait out the rate-limit hold (no-op when unavailable)
    pub async fn rate_limit(&self) {
        if let ImageReply::Frame { hold, .. } = self {
            tokio::time::sleep(*hold).await;
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ImageReply::Frame { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::*;

    #[tokio::test]
    async fn test_unavailable_before_first_frame() {
        let hub = BroadcastHub::new("cam");
        let reply = ImageReply::latest(&hub, Duration::from_millis(100)).await;
        assert!(!reply.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_is_not_rate_limited() {
        let hub = BroadcastHub::new("cam");
        let start = Instant::now();

        let reply = ImageReply::latest(&hub, Duration::from_secs(1)).await;
        reply.rate_limit().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_returns_latest_frame() {
        let hub = Arc::new(BroadcastHub::new("cam"));
        hub.publish(Frame::from(&b"old"[..])).await;
        hub.publish(Frame::from(&b"new"[..])).await;

        match ImageReply::latest(&hub, Duration::from_millis(100)).await {
            ImageReply::Frame { frame, hold } => {
                assert_eq!(frame.data, "new");
                assert_eq!(hold, Duration::from_millis(100));
            }
            ImageReply::Unavailable => panic!("expected a frame"),
        }
    }

    #[tokio::test]
    async fn test_empty_frame_is_unavailable() {
        let hub = BroadcastHub::new("cam");
        hub.publish(Frame::from(&b""[..])).await;

        let reply = ImageReply::latest(&hub, Duration::from_millis(100)).await;
        assert!(!reply.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_serves_frame_published_during_hold() {
        let hub = Arc::new(BroadcastHub::new("cam"));
        hub.publish(Frame::from(&b"old"[..])).await;

        let request = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { ImageReply::fetch(&hub, Duration::from_millis(100)).await })
        };
        tokio::task::yield_now().await;
        hub.publish(Frame::from(&b"new"[..])).await;

        match request.await.unwrap() {
            ImageReply::Frame { frame, .. } => assert_eq!(frame.data, "new"),
            ImageReply::Unavailable => panic!("expected a frame"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_successive_requests_spaced_by_interval() {
        let hub = BroadcastHub::new("cam");
        hub.publish(Frame::from(&b"jpeg"[..])).await;
        let interval = Duration::from_millis(200);

        let start = Instant::now();
        for _ in 0..2 {
            assert!(ImageReply::fetch(&hub, interval).await.is_available());
        }

        assert!(start.elapsed() >= interval * 2);
    }
}
