//! Entry, event and bucket configuration types.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A live entry read from a bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvEntry {
    /// Physical key.
    pub key: String,
    /// Stored value.
    pub value: Bytes,
    /// Bucket revision at which this value was written.
    pub revision: u64,
    /// Wall-clock time the value was written.
    pub created: DateTime<Utc>,
}

impl KvEntry {
    /// Size of the stored value in bytes.
    pub fn size(&self) -> u64 {
        self.value.len() as u64
    }
}

/// Kind of change carried by a [`KvEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KvOperation {
    /// A value was written.
    Put,
    /// The key was deleted.
    Delete,
    /// The key was removed along with its history.
    Purge,
    /// The entry outlived the bucket's `max_age`.
    Expire,
}

impl KvOperation {
    /// Returns `true` if the key no longer has a live entry after this change.
    pub fn is_removal(&self) -> bool {
        !matches!(self, Self::Put)
    }
}

impl fmt::Display for KvOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Purge => "purge",
            Self::Expire => "expire",
        };
        write!(f, "{s}")
    }
}

/// A change to a single key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvEvent {
    pub key: String,
    pub revision: u64,
    pub op: KvOperation,
}

/// Configuration used when creating a bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketConfig {
    /// Bucket name.
    pub name: String,
    /// Entries older than this are expired. `None` keeps entries forever.
    pub max_age: Option<Duration>,
    /// Capacity of the change-notification channel.
    pub watch_capacity: usize,
}

impl BucketConfig {
    /// Configuration for a bucket without TTL.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_age: None,
            watch_capacity: 256,
        }
    }

    /// Expire entries after `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_operations() {
        assert!(!KvOperation::Put.is_removal());
        assert!(KvOperation::Delete.is_removal());
        assert!(KvOperation::Purge.is_removal());
        assert!(KvOperation::Expire.is_removal());
    }

    #[test]
    fn bucket_config_builder() {
        let config = BucketConfig::new("locks").with_max_age(Duration::from_secs(5));
        assert_eq!(config.name, "locks");
        assert_eq!(config.max_age, Some(Duration::from_secs(5)));
        assert!(BucketConfig::new("data").max_age.is_none());
    }

    #[test]
    fn entry_size() {
        let entry = KvEntry {
            key: "k".into(),
            value: Bytes::from_static(b"12345"),
            revision: 1,
            created: Utc::now(),
        };
        assert_eq!(entry.size(), 5);
    }
}
