//! Registry error types

/// Error type for channel registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No channel with this name
    #[error("channel not found: {0}")]
    ChannelNotFound(String),
    /// A channel with this name is already registered
    #[error("channel already registered: {0}")]
    DuplicateChannel(String),
}
