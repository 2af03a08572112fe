//! Single-object operations.
//!
//! Every call makes exactly one request to the bucket and passes its errors
//! through. Only a missing entry becomes [`StorageError::NotExist`].

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use kvfs_codec::KeyCodec;
use kvfs_kv::{KvBucket, KvEntry, KvError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::error::{StorageError, StorageResult};

/// Metadata about a stored object.
///
/// `ObjectInfo::default()` is the zero value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Logical key.
    pub key: String,
    /// Size of the content in bytes.
    pub size: u64,
    /// Time of the last write.
    pub modified: DateTime<Utc>,
    /// Always `true`: every entry is a leaf. Directories are derived from
    /// key prefixes and never stored.
    pub is_terminal: bool,
}

/// Object CRUD over a bucket, addressed by logical key.
#[derive(Clone, Debug)]
pub struct ObjectStore {
    bucket: Arc<dyn KvBucket>,
    codec: Arc<dyn KeyCodec>,
}

impl ObjectStore {
    pub fn new(bucket: Arc<dyn KvBucket>, codec: Arc<dyn KeyCodec>) -> Self {
        Self { bucket, codec }
    }

    /// Write `value` at `key`, replacing any existing object.
    pub async fn store(&self, ctx: &Context, key: &str, value: &[u8]) -> StorageResult<()> {
        let physical = self.codec.encode(key)?;
        let revision = ctx
            .run(self.bucket.put(&physical, Bytes::copy_from_slice(value)))
            .await
            .map_err(|e| StorageError::interrupted(e, key))??;
        debug!(key, %physical, revision, size = value.len(), "stored object");
        Ok(())
    }

    /// Read the content stored at `key`.
    pub async fn load(&self, ctx: &Context, key: &str) -> StorageResult<Vec<u8>> {
        let entry = self.fetch(ctx, key).await?;
        Ok(entry.value.to_vec())
    }

    /// Remove the object at `key`. Fails with `NotExist` if there is none.
    pub async fn delete(&self, ctx: &Context, key: &str) -> StorageResult<()> {
        let physical = self.codec.encode(key)?;
        let result = ctx
            .run(self.bucket.delete(&physical, None))
            .await
            .map_err(|e| StorageError::interrupted(e, key))?;
        match result {
            Ok(()) => {
                debug!(key, %physical, "deleted object");
                Ok(())
            }
            Err(KvError::NotFound { .. }) => Err(StorageError::NotExist {
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether an object is stored at `key`.
    ///
    /// Only a missing entry yields `Ok(false)`; lookup failures are errors.
    pub async fn exists(&self, ctx: &Context, key: &str) -> StorageResult<bool> {
        match self.fetch(ctx, key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotExist { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Metadata for the object at `key`.
    pub async fn stat(&self, ctx: &Context, key: &str) -> StorageResult<ObjectInfo> {
        let entry = self.fetch(ctx, key).await?;
        Ok(ObjectInfo {
            key: key.to_string(),
            size: entry.size(),
            modified: entry.created,
            is_terminal: true,
        })
    }

    async fn fetch(&self, ctx: &Context, key: &str) -> StorageResult<KvEntry> {
        let physical = self.codec.encode(key)?;
        ctx.run(self.bucket.get(&physical))
            .await
            .map_err(|e| StorageError::interrupted(e, key))??
            .ok_or_else(|| StorageError::NotExist {
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvfs_codec::{EscapingCodec, SubstitutionCodec};
    use kvfs_kv::{BucketConfig, InMemoryBucket};
    use std::time::Duration;

    fn setup() -> (Arc<InMemoryBucket>, ObjectStore) {
        let bucket = Arc::new(InMemoryBucket::new(BucketConfig::new("basic")));
        let store = ObjectStore::new(bucket.clone(), Arc::new(EscapingCodec));
        (bucket, store)
    }

    fn random_data(len: usize) -> Vec<u8> {
        (0..len).map(|_| rand::random::<u8>()).collect()
    }

    // -----------------------------------------------------------------------
    // Store / Load
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn store_then_load() {
        let (_, store) = setup();
        let ctx = Context::background();
        let data = random_data(50);

        store.store(&ctx, "test1", &data).await.unwrap();
        assert_eq!(store.load(&ctx, "test1").await.unwrap(), data);
    }

    #[tokio::test]
    async fn store_overwrites() {
        let (bucket, store) = setup();
        let ctx = Context::background();
        store.store(&ctx, "a/b", b"first").await.unwrap();
        store.store(&ctx, "a/b", b"second, longer").await.unwrap();
        assert_eq!(store.load(&ctx, "a/b").await.unwrap(), b"second, longer");
        assert_eq!(bucket.len(), 1);
    }

    #[tokio::test]
    async fn load_missing_is_not_exist() {
        let (_, store) = setup();
        let err = store
            .load(&Context::background(), "NotExistingKey")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotExist { ref key } if key == "NotExistingKey"));
    }

    #[tokio::test]
    async fn keys_are_encoded_in_the_bucket() {
        let (bucket, store) = setup();
        let ctx = Context::background();
        store
            .store(&ctx, "acme/example.com/cert", b"pem")
            .await
            .unwrap();
        assert_eq!(
            bucket.keys("").await.unwrap(),
            vec!["acme.example=2Ecom.cert"]
        );
    }

    // -----------------------------------------------------------------------
    // Delete / Exists
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_removes_object() {
        let (_, store) = setup();
        let ctx = Context::background();
        store.store(&ctx, "testDelete", b"delete").await.unwrap();
        store.delete(&ctx, "testDelete").await.unwrap();

        let err = store.load(&ctx, "testDelete").await.unwrap_err();
        assert!(matches!(err, StorageError::NotExist { .. }));
        assert!(!store.exists(&ctx, "testDelete").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_is_not_exist() {
        let (_, store) = setup();
        let err = store
            .delete(&Context::background(), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotExist { .. }));
    }

    #[tokio::test]
    async fn exists_reports_presence() {
        let (_, store) = setup();
        let ctx = Context::background();
        store.store(&ctx, "testExists", b"exists").await.unwrap();
        assert!(store.exists(&ctx, "testExists").await.unwrap());
        assert!(!store.exists(&ctx, "testKeyNotExists").await.unwrap());
    }

    #[tokio::test]
    async fn exists_surfaces_unavailable_store() {
        let (bucket, store) = setup();
        let ctx = Context::background();
        store.store(&ctx, "k", b"v").await.unwrap();
        bucket.set_available(false);

        let err = store.exists(&ctx, "k").await.unwrap_err();
        assert!(matches!(err, StorageError::StoreUnavailable(_)), "got {err}");
        let err = store.exists(&ctx, "missing").await.unwrap_err();
        assert!(matches!(err, StorageError::StoreUnavailable(_)), "got {err}");
    }

    // -----------------------------------------------------------------------
    // Stat
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn stat_reports_size_and_terminal() {
        let (_, store) = setup();
        let ctx = Context::background();
        store
            .store(&ctx, "testStat1", &random_data(50))
            .await
            .unwrap();

        let mut info = store.stat(&ctx, "testStat1").await.unwrap();
        let age = Utc::now() - info.modified;
        assert!(age < chrono::Duration::seconds(1), "modified too old: {}", info.modified);

        info.modified = DateTime::<Utc>::default();
        assert_eq!(
            info,
            ObjectInfo {
                key: "testStat1".into(),
                size: 50,
                modified: DateTime::<Utc>::default(),
                is_terminal: true,
            }
        );
    }

    #[tokio::test]
    async fn stat_missing_is_not_exist() {
        let (_, store) = setup();
        let err = store
            .stat(&Context::background(), "testStatNotExistingKey")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotExist { .. }));
        assert_eq!(ObjectInfo::default().size, 0);
        assert!(!ObjectInfo::default().is_terminal);
    }

    // -----------------------------------------------------------------------
    // Keys and contexts
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unicode_keys_roundtrip() {
        let (_, store) = setup();
        let ctx = Context::background();
        store.store(&ctx, "证书/ключ.pem", b"x").await.unwrap();
        assert_eq!(store.load(&ctx, "证书/ключ.pem").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn ambiguous_key_is_rejected_by_substitution_codec() {
        let bucket = Arc::new(InMemoryBucket::new(BucketConfig::new("legacy")));
        let store = ObjectStore::new(bucket, Arc::new(SubstitutionCodec));
        let err = store
            .store(&Context::background(), "a_dot_b", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::CodecAmbiguity { .. }), "got {err}");
    }

    #[tokio::test]
    async fn cancelled_context_stops_operation() {
        let (bucket, store) = setup();
        let ctx = Context::background();
        ctx.cancel();
        let err = store.store(&ctx, "k", b"v").await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled { .. }));
        assert!(bucket.is_empty());
    }

    #[tokio::test]
    async fn expired_context_reports_deadline() {
        let (_, store) = setup();
        let ctx = Context::with_timeout(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let err = store.load(&ctx, "k").await.unwrap_err();
        assert!(matches!(err, StorageError::DeadlineExceeded { .. }));
    }
}
