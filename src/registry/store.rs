//! Channel registry
//!
//! Maps channel names to their configuration and broadcast hub. Built once at
//! startup; channels are never added or removed afterwards, so lookups need no
//! locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::Channel;

use super::error::RegistryError;
use super::hub::BroadcastHub;

/// A configured channel and its hub
#[derive(Debug)]
pub struct ChannelEntry {
    channel: Channel,
    hub: Arc<BroadcastHub>,
}

impl ChannelEntry {
    fn new(channel: Channel) -> Self {
        let hub = Arc::new(BroadcastHub::new(channel.name()));
        Self { channel, hub }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }
}

/// All channels served by this process
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<ChannelEntry>>,
    /// Names in configuration order
    order: Vec<String>,
}

impl ChannelRegistry {
    /// Build a registry, rejecting duplicate names
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();

        for channel in channels {
            let name = channel.name().to_string();
            if registry.channels.contains_key(&name) {
                return Err(RegistryError::DuplicateChannel(name));
            }

            tracing::debug!(
                channel = %name,
                source = channel.source(),
                resolution = %channel.resolution(),
                framerate = channel.framerate(),
                quality = channel.quality(),
                "Channel registered"
            );

            registry
                .channels
                .insert(name.clone(), Arc::new(ChannelEntry::new(channel)));
            registry.order.push(name);
        }

        Ok(registry)
    }

    /// Look up a channel by name
    pub fn get(&self, name: &str) -> Result<&Arc<ChannelEntry>, RegistryError> {
        self.channels
            .get(name)
            .ok_or_else(|| RegistryError::ChannelNotFound(name.to_string()))
    }

    /// Channels in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ChannelEntry>> {
        self.order.iter().filter_map(|name| self.channels.get(name))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
