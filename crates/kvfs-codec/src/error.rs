//! Error types for key encoding and decoding.

use thiserror::Error;

/// Errors produced by a [`KeyCodec`](crate::KeyCodec).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The physical key was not produced by this codec.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The logical key cannot be encoded without losing information.
    #[error("key {key:?} is ambiguous under token {token:?}")]
    Ambiguous { key: String, token: String },
}

impl CodecError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
