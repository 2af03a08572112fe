//! The [`Storage`] client.
//!
//! Ties the object store, lister and lock manager to one pair of buckets and
//! one holder identity.

use std::sync::Arc;

use async_trait::async_trait;
use kvfs_codec::KeyCodec;
use kvfs_kv::{BucketConfig, KvBucket, KvError, KvProvider};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::context::Context;
use crate::error::{StorageError, StorageResult};
use crate::list::Lister;
use crate::lock::{LockManager, LockSettings};
use crate::object::{ObjectInfo, ObjectStore};
use crate::traits::HierarchicalStorage;

/// A storage client backed by a key-value bucket.
///
/// Each `Storage` gets its own holder identity, so two clients on the same
/// buckets exclude each other through locks even inside one process.
#[derive(Clone, Debug)]
pub struct Storage {
    config: StorageConfig,
    objects: ObjectStore,
    lister: Lister,
    locks: LockManager,
}

impl Storage {
    /// Build a client on already opened buckets.
    ///
    /// Fails with `Config` if the lock bucket drops entries before the
    /// configured lease runs out.
    pub fn new(
        config: StorageConfig,
        objects: Arc<dyn KvBucket>,
        locks: Arc<dyn KvBucket>,
    ) -> StorageResult<Self> {
        config.validate()?;
        if let Some(max_age) = locks.max_age().filter(|max_age| *max_age < config.lock_ttl) {
            return Err(StorageError::Config(format!(
                "lock bucket {} expires entries after {} ms, shorter than lock_ttl_ms ({})",
                locks.name(),
                max_age.as_millis(),
                config.lock_ttl.as_millis()
            )));
        }
        let codec: Arc<dyn KeyCodec> = config.codec.build();
        let holder = Uuid::now_v7();
        debug!(
            bucket = objects.name(),
            lock_bucket = locks.name(),
            codec = codec.name(),
            %holder,
            "storage client created"
        );
        Ok(Self {
            objects: ObjectStore::new(Arc::clone(&objects), Arc::clone(&codec)),
            lister: Lister::new(objects, Arc::clone(&codec)),
            locks: LockManager::new(locks, codec, holder, LockSettings::from(&config)),
            config,
        })
    }

    /// Open the configured buckets on `provider`, creating them if allowed.
    ///
    /// The lock bucket is created with `max_age` set to the lock lease so
    /// entries of crashed holders expire on their own.
    pub async fn provision(provider: &dyn KvProvider, config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let objects = open_or_create(
            provider,
            BucketConfig::new(config.bucket.clone()),
            config.create_buckets,
        )
        .await?;
        let locks = open_or_create(
            provider,
            BucketConfig::new(config.lock_bucket_name()).with_max_age(config.lock_ttl),
            config.create_buckets,
        )
        .await?;
        info!(
            bucket = %config.bucket,
            lock_bucket = %config.lock_bucket_name(),
            lock_ttl_ms = u64::try_from(config.lock_ttl.as_millis()).unwrap_or(u64::MAX),
            "storage provisioned"
        );
        Self::new(config, objects, locks)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Identity recorded in lock entries written by this client.
    pub fn holder(&self) -> Uuid {
        self.locks.holder()
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn lister(&self) -> &Lister {
        &self.lister
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }
}

async fn open_or_create(
    provider: &dyn KvProvider,
    config: BucketConfig,
    create: bool,
) -> StorageResult<Arc<dyn KvBucket>> {
    match provider.open_bucket(&config.name).await {
        Ok(bucket) => Ok(bucket),
        Err(KvError::BucketNotFound(_)) if create => {
            let name = config.name.clone();
            match provider.create_bucket(config).await {
                Ok(bucket) => {
                    info!(bucket = %name, "created bucket");
                    Ok(bucket)
                }
                // Another client created it first.
                Err(KvError::BucketExists(_)) => Ok(provider.open_bucket(&name).await?),
                Err(err) => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl HierarchicalStorage for Storage {
    async fn store(&self, ctx: &Context, key: &str, value: &[u8]) -> StorageResult<()> {
        self.objects.store(ctx, key, value).await
    }

    async fn load(&self, ctx: &Context, key: &str) -> StorageResult<Vec<u8>> {
        self.objects.load(ctx, key).await
    }

    async fn delete(&self, ctx: &Context, key: &str) -> StorageResult<()> {
        self.objects.delete(ctx, key).await
    }

    async fn exists(&self, ctx: &Context, key: &str) -> StorageResult<bool> {
        self.objects.exists(ctx, key).await
    }

    async fn stat(&self, ctx: &Context, key: &str) -> StorageResult<ObjectInfo> {
        self.objects.stat(ctx, key).await
    }

    async fn list(
        &self,
        ctx: &Context,
        prefix: &str,
        recursive: bool,
    ) -> StorageResult<Vec<String>> {
        self.lister.list(ctx, prefix, recursive).await
    }

    async fn lock(&self, ctx: &Context, key: &str) -> StorageResult<()> {
        self.locks.lock(ctx, key).await
    }

    async fn unlock(&self, ctx: &Context, key: &str) -> StorageResult<()> {
        self.locks.unlock(ctx, key).await
    }
}
