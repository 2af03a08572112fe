use thiserror::Error;

/// Errors returned by a key-value bucket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
    /// The key has no live entry.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// `create` found a live entry at the key.
    #[error("key already exists: {key} (revision {revision})")]
    KeyExists { key: String, revision: u64 },

    /// A revision-checked write or delete lost a race.
    #[error("wrong revision for {key}: expected {expected}, current {current:?}")]
    WrongRevision {
        key: String,
        expected: u64,
        current: Option<u64>,
    },

    /// The named bucket does not exist.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// A bucket with this name already exists.
    #[error("bucket already exists: {0}")]
    BucketExists(String),

    /// The key violates the bucket's key syntax.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Transport or connectivity failure.
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience alias used throughout the bucket crate.
pub type KvResult<T> = std::result::Result<T, KvError>;
