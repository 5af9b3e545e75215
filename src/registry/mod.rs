//! Channel registry and per-channel broadcast state
//!
//! Each channel owns one [`BroadcastHub`]. The channel's supervisor is the
//! only producer; HTTP handlers are the consumers.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<ChannelRegistry>
//!                     ┌─────────────────────────┐
//!                     │ channels: HashMap<Name, │
//!                     │   ChannelEntry {        │
//!                     │     channel,            │
//!                     │     hub: BroadcastHub { │
//!                     │       last_frame,       │
//!                     │       viewers: slots,   │
//!                     │     }                   │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Supervisor]           [Stream viewer]         [Image request]
//!    hub.publish()          slot.recv()             hub.last_frame()
//! ```
//!
//! # Zero-Copy Design
//!
//! Frames carry `bytes::Bytes`, so the last-frame cache and every viewer
//! slot share the allocation the demuxer produced.

pub mod error;
pub mod frame;
pub mod hub;
pub mod relay;
pub mod store;

pub use error::RegistryError;
pub use frame::Frame;
pub use hub::{BroadcastHub, HubStats, PublishOutcome, ViewerRegistration};
pub use relay::RelaySlot;
pub use store::{ChannelEntry, ChannelRegistry};
