//! Per-channel broadcast hub
//!
//! The shared state between one producer (the channel's demuxer) and any
//! number of viewers. Two independent regions:
//!
//! - `last_frame`, behind an async `RwLock`: many image requests read it,
//!   the producer overwrites it.
//! - the viewer set, behind its own mutex: one [`RelaySlot`] per streaming
//!   viewer. Its size is the live viewer count.
//!
//! Neither lock is held while the other is taken, so a slow image reader
//! never holds up relaying and vice versa.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::RwLock;

use super::frame::Frame;
use super::relay::RelaySlot;

/// Broadcast state for one channel
#[derive(Debug)]
pub struct BroadcastHub {
    /// Channel name, for logging
    channel: String,

    /// Most recent frame, `None` until the first one arrives
    last_frame: RwLock<Option<Frame>>,

    /// Relay slot per registered streaming viewer
    viewers: Mutex<HashMap<u64, Arc<RelaySlot>>>,

    next_viewer_id: AtomicU64,

    frames_published: AtomicU64,
    frames_relayed: AtomicU64,
    frames_superseded: AtomicU64,
    bytes_published: AtomicU64,
}

/// What happened to one published frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Viewer slots the frame was placed in
    pub relayed: usize,
    /// Undelivered older frames discarded to make room
    pub superseded: usize,
}

/// Snapshot of hub counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Streaming viewers currently registered
    pub viewer_count: usize,
    /// Frames received from the demuxer
    pub frames_published: u64,
    /// Frame deliveries into viewer slots
    pub frames_relayed: u64,
    /// Undelivered frames discarded because a newer one arrived
    pub frames_superseded: u64,
    /// Payload bytes received from the demuxer
    pub bytes_published: u64,
    /// Whether a frame is available for single-image requests
    pub has_frame: bool,
}

impl BroadcastHub {
    /// Create an empty hub
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            last_frame: RwLock::new(None),
            viewers: Mutex::new(HashMap::new()),
            next_viewer_id: AtomicU64::new(1),
            frames_published: AtomicU64::new(0),
            frames_relayed: AtomicU64::new(0),
            frames_superseded: AtomicU64::new(0),
            bytes_published: AtomicU64::new(0),
        }
    }

    /// Channel this hub belongs to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish a freshly demuxed frame
    ///
    /// Replaces the cached last frame, then offers the frame to every
    /// registered viewer. Never waits on a viewer. With no viewers the relay
    /// path is skipped entirely.
    pub async fn publish(&self, frame: Frame) -> PublishOutcome {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published
            .fetch_add(frame.len() as u64, Ordering::Relaxed);

        *self.last_frame.write().await = Some(frame.clone());

        let slots: Vec<Arc<RelaySlot>> = {
            let viewers = self.viewers.lock();
            if viewers.is_empty() {
                return PublishOutcome::default();
            }
            viewers.values().cloned().collect()
        };

        let mut outcome = PublishOutcome::default();
        for slot in slots {
            outcome.relayed += 1;
            if slot.offer(frame.clone()) {
                outcome.superseded += 1;
            }
        }

        self.frames_relayed
            .fetch_add(outcome.relayed as u64, Ordering::Relaxed);
        if outcome.superseded > 0 {
            self.frames_superseded
                .fetch_add(outcome.superseded as u64, Ordering::Relaxed);
            tracing::trace!(
                channel = %self.channel,
                superseded = outcome.superseded,
                "Dropped undelivered frames for slow viewers"
            );
        }

        outcome
    }

    /// Most recent frame, if any has been produced
    pub async fn last_frame(&self) -> Option<Frame> {
        self.last_frame.read().await.clone()
    }

    /// Register a streaming viewer
    ///
    /// The viewer stays counted until the returned registration is dropped,
    /// whichever way the session ends.
    pub fn register_viewer(self: &Arc<Self>) -> ViewerRegistration {
        let id = self.next_viewer_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(RelaySlot::new());

        let count = {
            let mut viewers = self.viewers.lock();
            viewers.insert(id, Arc::clone(&slot));
            viewers.len()
        };

        tracing::debug!(channel = %self.channel, viewer = id, viewers = count, "Viewer registered");

        ViewerRegistration {
            hub: Arc::clone(self),
            id,
            slot,
        }
    }

    fn deregister_viewer(&self, id: u64) {
        let count = {
            let mut viewers = self.viewers.lock();
            viewers.remove(&id);
            viewers.len()
        };

        tracing::debug!(
            channel = %self.channel,
            viewer = id,
            viewers = count,
            "Viewer deregistered"
        );
    }

    /// Number of registered streaming viewers
    pub fn viewer_count(&self) -> usize {
        self.viewers.lock().len()
    }

    /// Counter snapshot
    pub async fn stats(&self) -> HubStats {
        HubStats {
            viewer_count: self.viewer_count(),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_relayed: self.frames_relayed.load(Ordering::Relaxed),
            frames_superseded: self.frames_superseded.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
            has_frame: self.last_frame.read().await.is_some(),
        }
    }
}

/// A streaming viewer's membership in a hub
///
/// Dropping it removes the viewer and its relay slot.
#[derive(Debug)]
pub struct ViewerRegistration {
    hub: Arc<BroadcastHub>,
    id: u64,
    slot: Arc<RelaySlot>,
}

impl ViewerRegistration {
    /// Viewer ID, unique within the hub
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Hub this viewer is registered with
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Wait for the next relayed frame (cancel safe)
    pub async fn recv(&self) -> Frame {
        self.slot.recv().await
    }

    /// Take a relayed frame without waiting
    pub fn try_recv(&self) -> Option<Frame> {
        self.slot.try_take()
    }
}

impl Drop for ViewerRegistration {
    fn drop(&mut self) {
        self.hub.deregister_viewer(self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    fn frame(n: u32) -> Frame {
        Frame::new(Bytes::from(format!("frame-{}", n)))
    }

    #[tokio::test]
    async fn test_empty_hub() {
        let hub = BroadcastHub::new("cam");
        assert!(hub.last_frame().await.is_none());
        assert_eq!(hub.viewer_count(), 0);
        assert!(!hub.stats().await.has_frame);
    }

    #[tokio::test]
    async fn test_publish_without_viewers_skips_relay() {
        let hub = Arc::new(BroadcastHub::new("cam"));

        for n in 1..=5 {
            let outcome = hub.publish(frame(n)).await;
            assert_eq!(outcome, PublishOutcome::default());
        }

        assert_eq!(hub.last_frame().await.unwrap().data, "frame-5");

        let stats = hub.stats().await;
        assert_eq!(stats.frames_published, 5);
        assert_eq!(stats.frames_relayed, 0);

        // A viewer joining afterwards finds nothing left over in its slot
        let viewer = hub.register_viewer();
        assert!(viewer.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_single_viewer_receives_frames() {
        let hub = Arc::new(BroadcastHub::new("cam"));
        let viewer = hub.register_viewer();

        for n in 1..=3 {
            let outcome = hub.publish(frame(n)).await;
            assert_eq!(outcome.relayed, 1);
            assert_eq!(outcome.superseded, 0);

            let received = tokio::time::timeout(Duration::from_secs(1), viewer.recv())
                .await
                .unwrap();
            assert_eq!(received.data, format!("frame-{}", n));
        }
    }

    #[tokio::test]
    async fn test_slow_viewer_gets_newest_frame() {
        let hub = Arc::new(BroadcastHub::new("cam"));
        let viewer = hub.register_viewer();

        hub.publish(frame(1)).await;
        let outcome = hub.publish(frame(2)).await;
        assert_eq!(outcome.superseded, 1);

        assert_eq!(viewer.recv().await.data, "frame-2");
        assert!(viewer.try_recv().is_none());
        assert_eq!(hub.stats().await.frames_superseded, 1);
    }

    #[tokio::test]
    async fn test_every_viewer_gets_each_frame() {
        let hub = Arc::new(BroadcastHub::new("cam"));
        let a = hub.register_viewer();
        let b = hub.register_viewer();

        let outcome = hub.publish(frame(7)).await;
        assert_eq!(outcome.relayed, 2);

        assert_eq!(a.recv().await.data, "frame-7");
        assert_eq!(b.recv().await.data, "frame-7");
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let hub = Arc::new(BroadcastHub::new("cam"));
        let a = hub.register_viewer();
        let b = hub.register_viewer();
        assert_ne!(a.id(), b.id());
        assert_eq!(hub.viewer_count(), 2);

        drop(a);
        assert_eq!(hub.viewer_count(), 1);
        drop(b);
        assert_eq!(hub.viewer_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration() {
        let hub = Arc::new(BroadcastHub::new("cam"));
        let (release_tx, _) = tokio::sync::broadcast::channel::<()>(1);

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let hub = Arc::clone(&hub);
            let mut release = release_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                let _viewer = hub.register_viewer();
                let _ = release.recv().await;
            }));
        }

        // Wait until every task has registered
        tokio::time::timeout(Duration::from_secs(5), async {
            while hub.viewer_count() < 32 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(hub.viewer_count(), 32);

        // Churn while the long-lived viewers are held
        let mut churn = Vec::new();
        for _ in 0..64 {
            let hub = Arc::clone(&hub);
            churn.push(tokio::spawn(async move {
                let viewer = hub.register_viewer();
                tokio::task::yield_now().await;
                drop(viewer);
            }));
        }
        for task in churn {
            task.await.unwrap();
        }
        assert_eq!(hub.viewer_count(), 32);

        release_tx.send(()).unwrap();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(hub.viewer_count(), 0);
    }
}
