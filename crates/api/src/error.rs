//! Error types for sharded storage operations.
//!
//! [`ShardError`] is what the core protocols return to their callers.
//! [`ExchangeError`] describes a failed round trip with a single peer; those
//! are logged and skipped by the lookup loops and only surface through the
//! single-peer client calls.

use std::string::String;

use libp2p::PeerId;
use shardline_primitives::{ChunkKey, InvalidChunkKey};

/// Error type for sharded storage operations.
#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    /// The request was rejected before any work was done.
    #[error("invalid parameter: {reason}")]
    InvalidParam {
        /// Why the parameter was rejected.
        reason: String,
    },

    /// The chunk could not be found locally, on the network, or on a full node.
    #[error("chunk not found: {key}")]
    NotFound {
        /// The chunk that was looked up.
        key: ChunkKey,
    },

    /// No peer answered a health sample.
    #[error("sync state unknown: no peer responded")]
    Unknown,

    /// No peer answered a range query.
    #[error("no peer answered {request}")]
    NoPeerResponded {
        /// Name of the request kind.
        request: &'static str,
    },

    /// The chain log failed.
    #[error("chain log error: {message}")]
    Chain {
        /// Description of the failure.
        message: String,
    },

    /// The local chunk store failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },

    /// A remote peer answered with an error string.
    #[error("remote error: {message}")]
    Remote {
        /// The error string sent by the peer.
        message: String,
    },

    /// A network operation failed.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl ShardError {
    /// Shorthand for [`ShardError::Chain`].
    pub fn chain(message: impl Into<String>) -> Self {
        Self::Chain {
            message: message.into(),
        }
    }

    /// Shorthand for [`ShardError::Storage`].
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Shorthand for [`ShardError::InvalidParam`].
    pub fn invalid_param(reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            reason: reason.into(),
        }
    }

    /// Returns true for [`ShardError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<InvalidChunkKey> for ShardError {
    fn from(err: InvalidChunkKey) -> Self {
        Self::InvalidParam {
            reason: err.to_string(),
        }
    }
}

/// Result type for sharded storage operations.
pub type ShardResult<T> = core::result::Result<T, ShardError>;

/// A failed request/response round trip with one peer.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Opening the stream failed.
    #[error("failed to open stream to {peer}: {reason}")]
    Dial {
        /// Target peer.
        peer: PeerId,
        /// Substrate error.
        reason: String,
    },

    /// Opening the stream did not finish in time.
    #[error("timed out opening stream to {peer}")]
    DialTimeout {
        /// Target peer.
        peer: PeerId,
    },

    /// Writing the request or reading the response did not finish in time.
    #[error("timed out waiting for response from {peer}")]
    ReadTimeout {
        /// Target peer.
        peer: PeerId,
    },

    /// Stream I/O failed.
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),

    /// The request or response could not be encoded or decoded.
    #[error("codec error: {reason}")]
    Codec {
        /// Codec failure description.
        reason: String,
    },

    /// The peer answered with an error string.
    #[error("peer error: {message}")]
    Remote {
        /// The error string sent by the peer.
        message: String,
    },

    /// The response carried a payload other than the one expected.
    #[error("unexpected response, expected {expected}")]
    UnexpectedResponse {
        /// The payload kind that was expected.
        expected: &'static str,
    },

    /// The lookup context was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The lookup context deadline passed.
    #[error("lookup deadline exceeded")]
    DeadlineExceeded,
}

impl ExchangeError {
    /// Returns true for failures caused by the caller's context, not the peer.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
