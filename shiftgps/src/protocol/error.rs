//! Error types for the control channel.

use thiserror::Error;

/// Errors that can occur at the protocol boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An inbound message could not be decoded.
    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// An outbound message could not be encoded.
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The other side of the channel is gone.
    #[error("Channel closed")]
    ChannelClosed,
}
