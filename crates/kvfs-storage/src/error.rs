use kvfs_codec::CodecError;
use kvfs_kv::KvError;
use thiserror::Error;

use crate::context::ContextError;

/// Errors surfaced by [`Storage`](crate::Storage) operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object is stored at the key.
    #[error("object does not exist: {key}")]
    NotExist { key: String },

    /// The key cannot be mapped to or from a bucket key.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The key contains a token the configured codec cannot round-trip.
    #[error("key {key:?} cannot be encoded unambiguously (contains {token:?})")]
    CodecAmbiguity { key: String, token: String },

    /// The lock was still held by another client when the deadline passed.
    #[error("timed out waiting for lock on {key}")]
    LockTimeout { key: String },

    /// The caller cancelled the operation.
    #[error("operation on {key} cancelled")]
    Cancelled { key: String },

    /// The caller's deadline passed before the operation completed.
    #[error("deadline exceeded for {key}")]
    DeadlineExceeded { key: String },

    /// Unlock or renew of a lock this client does not hold.
    #[error("lock on {key} is not held by this client")]
    LockNotHeld { key: String },

    /// The backing store could not be reached.
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),

    /// Any other backing store failure.
    #[error("backing store error: {0}")]
    Backend(KvError),

    /// Lock record encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Map an interrupted context onto the error for `key`.
    pub(crate) fn interrupted(err: ContextError, key: &str) -> Self {
        let key = key.to_string();
        match err {
            ContextError::Cancelled => Self::Cancelled { key },
            ContextError::DeadlineExceeded => Self::DeadlineExceeded { key },
        }
    }
}

impl From<KvError> for StorageError {
    fn from(err: KvError) -> Self {
        match err {
            KvError::Unavailable(reason) => Self::StoreUnavailable(reason),
            KvError::InvalidKey { key, reason } => Self::InvalidKey { key, reason },
            other => Self::Backend(other),
        }
    }
}

impl From<CodecError> for StorageError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidKey { key, reason } => Self::InvalidKey { key, reason },
            CodecError::Ambiguous { key, token } => Self::CodecAmbiguity { key, token },
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
