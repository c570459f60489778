//! Error types for capmux-media.

use std::io;
use thiserror::Error;

/// Result type for capmux-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for capmux-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stream configuration rejected at session open.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Codec out-of-band configuration was required but absent.
    /// Fatal to the session: the header is never committed without it.
    #[error("Missing codec configuration: {0}")]
    MissingCodecConfig(&'static str),

    /// A video packet arrived before the first keyframe. Rejected locally;
    /// the session stays usable.
    #[error("Video packet precedes the first keyframe")]
    AwaitingKeyframe,

    /// Operation is not valid in the session's current lifecycle state.
    #[error("Invalid muxer state: {0}")]
    InvalidState(&'static str),

    /// Packet payload could not be converted into container form.
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid packet error.
    pub fn invalid_packet(msg: impl Into<String>) -> Self {
        Self::InvalidPacket(msg.into())
    }

    /// Whether the session remains usable after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AwaitingKeyframe | Self::InvalidPacket(_))
    }
}
