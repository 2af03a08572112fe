//! Distributed locks on top of a key-value bucket.
//!
//! A lock is an entry in a dedicated lock bucket, written with an atomic
//! create. Whoever creates the entry holds the lock until it deletes it or
//! the entry outlives its lease. Nothing here relies on in-process state:
//! any number of [`LockManager`]s, in any number of processes, can contend
//! for the same resource as long as they share the bucket.
//!
//! Waiting contenders watch the entry when the bucket supports change
//! notification and poll with exponential backoff otherwise. Either way the
//! wait is bounded by the caller's [`Context`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use kvfs_codec::KeyCodec;
use kvfs_kv::{KvBucket, KvError, KvWatcher};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::context::{Context, ContextError};
use crate::error::{StorageError, StorageResult};

/// Contents of a lock entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Identity of the client holding the lock.
    pub holder: Uuid,
    /// Logical key of the locked resource.
    pub resource: String,
    pub acquired_at: DateTime<Utc>,
    /// End of the lease. Past this point the entry may be removed by anyone.
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    fn new(holder: Uuid, resource: &str, lease: Duration) -> StorageResult<Self> {
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| StorageError::Config(format!("lock lease out of range: {e}")))?;
        let acquired_at = Utc::now();
        let expires_at = acquired_at
            .checked_add_signed(lease)
            .ok_or_else(|| StorageError::Config("lock lease end is out of range".into()))?;
        Ok(Self {
            holder,
            resource: resource.to_string(),
            acquired_at,
            expires_at,
        })
    }

    /// Returns `true` once the lease has run out.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn to_bytes(&self) -> StorageResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    fn from_bytes(data: &[u8]) -> StorageResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Timing knobs for lock acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockSettings {
    pub lease: Duration,
    pub poll_interval_min: Duration,
    pub poll_interval_max: Duration,
    pub use_watch: bool,
}

impl From<&StorageConfig> for LockSettings {
    fn from(config: &StorageConfig) -> Self {
        Self {
            lease: config.lock_ttl,
            poll_interval_min: config.poll_interval_min,
            poll_interval_max: config.poll_interval_max,
            use_watch: config.use_watch,
        }
    }
}

/// Exponential backoff with jitter, capped at `max`.
#[derive(Debug)]
struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    fn new(min: Duration, max: Duration) -> Self {
        Self { current: min, max }
    }

    fn next_delay(&mut self) -> Duration {
        let quarter = u64::try_from(self.current.as_millis() / 4).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=quarter));
        let delay = (self.current + jitter).min(self.max);
        self.current = (self.current * 2).min(self.max);
        delay
    }
}

/// Wait until the watched entry is removed or `wait` elapses.
async fn wait_for_release(watcher: Option<&mut KvWatcher>, wait: Duration) {
    let Some(watcher) = watcher else {
        tokio::time::sleep(wait).await;
        return;
    };
    let released = async {
        while let Some(event) = watcher.next().await {
            if event.op.is_removal() {
                return;
            }
        }
        // The stream ended; fall back to the timeout.
        std::future::pending::<()>().await
    };
    let _ = tokio::time::timeout(wait, released).await;
}

/// Acquires and releases per-resource locks.
#[derive(Clone, Debug)]
pub struct LockManager {
    bucket: Arc<dyn KvBucket>,
    codec: Arc<dyn KeyCodec>,
    holder: Uuid,
    settings: LockSettings,
}

impl LockManager {
    pub fn new(
        bucket: Arc<dyn KvBucket>,
        codec: Arc<dyn KeyCodec>,
        holder: Uuid,
        settings: LockSettings,
    ) -> Self {
        Self {
            bucket,
            codec,
            holder,
            settings,
        }
    }

    /// Identity written into lock entries created by this manager.
    pub fn holder(&self) -> Uuid {
        self.holder
    }

    fn wait_error(err: ContextError, key: &str) -> StorageError {
        match err {
            ContextError::Cancelled => StorageError::Cancelled {
                key: key.to_string(),
            },
            ContextError::DeadlineExceeded => StorageError::LockTimeout {
                key: key.to_string(),
            },
        }
    }

    /// Acquire the lock on `key`, waiting while another client holds it.
    ///
    /// Fails with `LockTimeout` when the context's deadline passes and with
    /// `Cancelled` when it is cancelled. Locks are not reentrant: a second
    /// `lock` by the same holder waits like any other contender.
    pub async fn lock(&self, ctx: &Context, key: &str) -> StorageResult<()> {
        let physical = self.codec.encode(key)?;
        let mut backoff = Backoff::new(
            self.settings.poll_interval_min,
            self.settings.poll_interval_max,
        );
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            // Subscribe before the attempt so a release right after a
            // failed create is still observed.
            let mut watcher = if self.settings.use_watch {
                ctx.run(self.bucket.watch(&physical))
                    .await
                    .map_err(|e| Self::wait_error(e, key))??
            } else {
                None
            };

            let record = LockRecord::new(self.holder, key, self.settings.lease)?;
            let created = ctx
                .run(self.bucket.create(&physical, record.to_bytes()?))
                .await
                .map_err(|e| Self::wait_error(e, key))?;
            match created {
                Ok(revision) => {
                    debug!(key, holder = %self.holder, revision, attempts, "lock acquired");
                    return Ok(());
                }
                Err(KvError::KeyExists { revision, .. }) => {
                    if self.break_stale(ctx, key, &physical, revision).await? {
                        continue;
                    }
                }
                Err(err) => return Err(err.into()),
            }

            let wait = if watcher.is_some() {
                self.settings.poll_interval_max
            } else {
                backoff.next_delay()
            };
            tokio::select! {
                err = ctx.done() => return Err(Self::wait_error(err, key)),
                _ = wait_for_release(watcher.as_mut(), wait) => {}
            }
        }
    }

    /// Remove the entry at `revision` if its recorded lease has run out.
    ///
    /// Covers buckets that do not enforce `max_age` themselves. Returns
    /// `true` if the entry is gone and acquisition should be retried at once.
    async fn break_stale(
        &self,
        ctx: &Context,
        key: &str,
        physical: &str,
        revision: u64,
    ) -> StorageResult<bool> {
        let entry = ctx
            .run(self.bucket.get(physical))
            .await
            .map_err(|e| Self::wait_error(e, key))??;
        let Some(entry) = entry else {
            return Ok(true);
        };
        if entry.revision != revision {
            return Ok(false);
        }
        let record = match LockRecord::from_bytes(&entry.value) {
            Ok(record) => record,
            Err(err) => {
                debug!(key, error = %err, "unreadable lock entry; waiting for its TTL");
                return Ok(false);
            }
        };
        if !record.is_expired(Utc::now()) {
            return Ok(false);
        }

        warn!(
            key,
            stale_holder = %record.holder,
            expired_at = %record.expires_at,
            "breaking expired lock"
        );
        let deleted = ctx
            .run(self.bucket.delete(physical, Some(revision)))
            .await
            .map_err(|e| Self::wait_error(e, key))?;
        match deleted {
            Ok(()) | Err(KvError::NotFound { .. }) | Err(KvError::WrongRevision { .. }) => Ok(true),
            Err(err) => Err(err.into()),
        }
    }

    /// Release the lock on `key`.
    ///
    /// Succeeds without effect if no lock entry exists (for instance because
    /// the lease ran out). Fails with `LockNotHeld` if another client holds
    /// the lock.
    pub async fn unlock(&self, ctx: &Context, key: &str) -> StorageResult<()> {
        let physical = self.codec.encode(key)?;
        let entry = ctx
            .run(self.bucket.get(&physical))
            .await
            .map_err(|e| StorageError::interrupted(e, key))??;
        let Some(entry) = entry else {
            debug!(key, "unlock of a lock that is not held");
            return Ok(());
        };
        let record = LockRecord::from_bytes(&entry.value)?;
        if record.holder != self.holder {
            return Err(StorageError::LockNotHeld {
                key: key.to_string(),
            });
        }

        let deleted = ctx
            .run(self.bucket.delete(&physical, Some(entry.revision)))
            .await
            .map_err(|e| StorageError::interrupted(e, key))?;
        match deleted {
            Ok(()) | Err(KvError::NotFound { .. }) => {
                debug!(key, holder = %self.holder, "lock released");
                Ok(())
            }
            Err(KvError::WrongRevision { .. }) => Err(StorageError::LockNotHeld {
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Extend the lease of a lock this client holds.
    pub async fn renew(&self, ctx: &Context, key: &str) -> StorageResult<()> {
        let physical = self.codec.encode(key)?;
        let entry = ctx
            .run(self.bucket.get(&physical))
            .await
            .map_err(|e| StorageError::interrupted(e, key))??
            .ok_or_else(|| StorageError::LockNotHeld {
                key: key.to_string(),
            })?;
        let current = LockRecord::from_bytes(&entry.value)?;
        if current.holder != self.holder {
            return Err(StorageError::LockNotHeld {
                key: key.to_string(),
            });
        }

        let mut renewed = LockRecord::new(self.holder, key, self.settings.lease)?;
        renewed.acquired_at = current.acquired_at;
        let updated = ctx
            .run(
                self.bucket
                    .update(&physical, renewed.to_bytes()?, entry.revision),
            )
            .await
            .map_err(|e| StorageError::interrupted(e, key))?;
        match updated {
            Ok(revision) => {
                debug!(key, revision, expires_at = %renewed.expires_at, "lock renewed");
                Ok(())
            }
            Err(KvError::WrongRevision { .. }) => Err(StorageError::LockNotHeld {
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// The current lock entry for `key`, if any.
    pub async fn holder_of(&self, ctx: &Context, key: &str) -> StorageResult<Option<LockRecord>> {
        let physical = self.codec.encode(key)?;
        let entry = ctx
            .run(self.bucket.get(&physical))
            .await
            .map_err(|e| StorageError::interrupted(e, key))??;
        entry
            .map(|entry| LockRecord::from_bytes(&entry.value))
            .transpose()
    }
}
