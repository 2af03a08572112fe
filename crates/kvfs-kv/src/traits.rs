//! Capability traits for key-value buckets.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::KvResult;
use crate::types::{BucketConfig, KvEntry};
use crate::watch::KvWatcher;

/// A revisioned key-value bucket.
///
/// Implementations must guarantee:
/// - Single-key writes are atomic and stamped with a bucket revision that
///   increases monotonically.
/// - `create` succeeds for at most one of any set of concurrent callers.
/// - Entries past the bucket's `max_age` are never returned.
/// - Transport failures surface as [`KvError::Unavailable`](crate::KvError::Unavailable),
///   never as `NotFound`.
#[async_trait]
pub trait KvBucket: Send + Sync + fmt::Debug {
    /// Bucket name.
    fn name(&self) -> &str;

    /// Age after which the bucket drops entries, if it enforces one.
    fn max_age(&self) -> Option<Duration> {
        None
    }

    /// Read the live entry at `key`.
    ///
    /// Returns `Ok(None)` if the key has no live entry.
    async fn get(&self, key: &str) -> KvResult<Option<KvEntry>>;

    /// Write `value` at `key`, overwriting any previous value.
    async fn put(&self, key: &str, value: Bytes) -> KvResult<u64>;

    /// Write `value` at `key` only if the key has no live entry.
    ///
    /// Fails with `KeyExists` otherwise.
    async fn create(&self, key: &str, value: Bytes) -> KvResult<u64>;

    /// Overwrite `key` only if its current revision is `expected_revision`.
    async fn update(&self, key: &str, value: Bytes, expected_revision: u64) -> KvResult<u64>;

    /// Delete `key`. With `Some(revision)` the delete only happens if the
    /// current entry has that revision.
    ///
    /// Fails with `NotFound` if the key has no live entry.
    async fn delete(&self, key: &str, expected_revision: Option<u64>) -> KvResult<()>;

    /// All live keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> KvResult<Vec<String>>;

    /// Subscribe to changes of `key`.
    ///
    /// Returns `Ok(None)` when the bucket has no change notification; callers
    /// then poll.
    async fn watch(&self, _key: &str) -> KvResult<Option<KvWatcher>> {
        Ok(None)
    }
}

/// Opens and creates buckets on a key-value server.
#[async_trait]
pub trait KvProvider: Send + Sync {
    /// Open an existing bucket. Fails with `BucketNotFound`.
    async fn open_bucket(&self, name: &str) -> KvResult<Arc<dyn KvBucket>>;

    /// Create a bucket. Fails with `BucketExists`.
    async fn create_bucket(&self, config: BucketConfig) -> KvResult<Arc<dyn KvBucket>>;
}
