//! In-memory key-value server for tests and embedding.
//!
//! [`InMemoryKv`] hosts named [`InMemoryBucket`]s. Each bucket keeps its
//! entries in a `HashMap` behind a `RwLock`, stamps every change with a
//! bucket-wide revision, expires entries lazily once they outlive
//! `max_age`, and fans changes out to watchers over a broadcast channel.
//!
//! Two switches exist for exercising callers: [`InMemoryBucket::set_available`]
//! makes every call fail as if the server were unreachable, and
//! [`InMemoryBucket::set_watch_enabled`] turns change notification off.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::key::validate_key;
use crate::traits::{KvBucket, KvProvider};
use crate::types::{BucketConfig, KvEntry, KvEvent, KvOperation};
use crate::watch::KvWatcher;

#[derive(Clone, Debug)]
struct Slot {
    value: Bytes,
    revision: u64,
    created: DateTime<Utc>,
    written_at: Instant,
}

impl Slot {
    fn to_entry(&self, key: &str) -> KvEntry {
        KvEntry {
            key: key.to_string(),
            value: self.value.clone(),
            revision: self.revision,
            created: self.created,
        }
    }
}

/// A single in-memory bucket.
pub struct InMemoryBucket {
    config: BucketConfig,
    entries: RwLock<HashMap<String, Slot>>,
    sequence: AtomicU64,
    events: broadcast::Sender<KvEvent>,
    available: AtomicBool,
    watch_enabled: AtomicBool,
}

impl InMemoryBucket {
    /// Create an empty bucket.
    pub fn new(config: BucketConfig) -> Self {
        let (events, _) = broadcast::channel(config.watch_capacity.max(1));
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            events,
            available: AtomicBool::new(true),
            watch_enabled: AtomicBool::new(true),
        }
    }

    /// The bucket's configuration.
    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|slot| !self.is_expired(slot, now))
            .count()
    }

    /// Returns `true` if the bucket has no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest revision handed out by this bucket.
    pub fn revision(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Simulate the server becoming unreachable (`false`) or recovering.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Turn change notification on or off.
    pub fn set_watch_enabled(&self, enabled: bool) {
        self.watch_enabled.store(enabled, Ordering::SeqCst);
    }

    fn check_available(&self) -> KvResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KvError::Unavailable(format!(
                "bucket {} is unreachable",
                self.config.name
            )))
        }
    }

    fn is_expired(&self, slot: &Slot, now: Instant) -> bool {
        self.config
            .max_age
            .is_some_and(|max_age| now.duration_since(slot.written_at) >= max_age)
    }

    fn next_revision(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit(&self, key: &str, revision: u64, op: KvOperation) {
        // No receivers is not an error: nobody is watching.
        let _ = self.events.send(KvEvent {
            key: key.to_string(),
            revision,
            op,
        });
    }

    /// Drop expired entries and notify watchers. Caller holds the write lock.
    fn expire_locked(&self, entries: &mut HashMap<String, Slot>) {
        if self.config.max_age.is_none() {
            return;
        }
        let now = Instant::now();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, slot)| self.is_expired(slot, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.remove(&key);
            let revision = self.next_revision();
            debug!(bucket = %self.config.name, key = %key, revision, "entry expired");
            self.emit(&key, revision, KvOperation::Expire);
        }
    }

    fn insert_locked(&self, entries: &mut HashMap<String, Slot>, key: &str, value: Bytes) -> u64 {
        let revision = self.next_revision();
        entries.insert(
            key.to_string(),
            Slot {
                value,
                revision,
                created: Utc::now(),
                written_at: Instant::now(),
            },
        );
        self.emit(key, revision, KvOperation::Put);
        revision
    }
}

#[async_trait]
impl KvBucket for InMemoryBucket {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn max_age(&self) -> Option<Duration> {
        self.config.max_age
    }

    async fn get(&self, key: &str) -> KvResult<Option<KvEntry>> {
        self.check_available()?;
        validate_key(key)?;
        let entries = self.entries.read().expect("lock poisoned");
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|slot| !self.is_expired(slot, now))
            .map(|slot| slot.to_entry(key)))
    }

    async fn put(&self, key: &str, value: Bytes) -> KvResult<u64> {
        self.check_available()?;
        validate_key(key)?;
        let mut entries = self.entries.write().expect("lock poisoned");
        self.expire_locked(&mut entries);
        Ok(self.insert_locked(&mut entries, key, value))
    }

    async fn create(&self, key: &str, value: Bytes) -> KvResult<u64> {
        self.check_available()?;
        validate_key(key)?;
        let mut entries = self.entries.write().expect("lock poisoned");
        self.expire_locked(&mut entries);
        if let Some(existing) = entries.get(key) {
            return Err(KvError::KeyExists {
                key: key.to_string(),
                revision: existing.revision,
            });
        }
        Ok(self.insert_locked(&mut entries, key, value))
    }

    async fn update(&self, key: &str, value: Bytes, expected_revision: u64) -> KvResult<u64> {
        self.check_available()?;
        validate_key(key)?;
        let mut entries = self.entries.write().expect("lock poisoned");
        self.expire_locked(&mut entries);
        let current = entries.get(key).map(|slot| slot.revision);
        if current != Some(expected_revision) {
            return Err(KvError::WrongRevision {
                key: key.to_string(),
                expected: expected_revision,
                current,
            });
        }
        Ok(self.insert_locked(&mut entries, key, value))
    }

    async fn delete(&self, key: &str, expected_revision: Option<u64>) -> KvResult<()> {
        self.check_available()?;
        validate_key(key)?;
        let mut entries = self.entries.write().expect("lock poisoned");
        self.expire_locked(&mut entries);
        let current = match entries.get(key) {
            Some(slot) => slot.revision,
            None => {
                return Err(KvError::NotFound {
                    key: key.to_string(),
                })
            }
        };
        if let Some(expected) = expected_revision {
            if expected != current {
                return Err(KvError::WrongRevision {
                    key: key.to_string(),
                    expected,
                    current: Some(current),
                });
            }
        }
        entries.remove(key);
        let revision = self.next_revision();
        self.emit(key, revision, KvOperation::Delete);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> KvResult<Vec<String>> {
        self.check_available()?;
        let entries = self.entries.read().expect("lock poisoned");
        let now = Instant::now();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, slot)| key.starts_with(prefix) && !self.is_expired(slot, now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn watch(&self, key: &str) -> KvResult<Option<KvWatcher>> {
        self.check_available()?;
        validate_key(key)?;
        if !self.watch_enabled.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(KvWatcher::new(key, self.events.subscribe())))
    }
}

impl std::fmt::Debug for InMemoryBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBucket")
            .field("name", &self.config.name)
            .field("entry_count", &self.len())
            .field("revision", &self.revision())
            .finish()
    }
}

/// In-memory key-value server hosting named buckets.
///
/// Clone the `Arc` to share one server between several storage clients.
#[derive(Debug, Default)]
pub struct InMemoryKv {
    buckets: RwLock<HashMap<String, Arc<InMemoryBucket>>>,
}

impl InMemoryKv {
    /// Create a server with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a bucket by name, keeping its concrete type.
    pub fn bucket(&self, name: &str) -> Option<Arc<InMemoryBucket>> {
        self.buckets.read().expect("lock poisoned").get(name).cloned()
    }

    /// Create a bucket, keeping its concrete type.
    pub fn create(&self, config: BucketConfig) -> KvResult<Arc<InMemoryBucket>> {
        let mut buckets = self.buckets.write().expect("lock poisoned");
        if buckets.contains_key(&config.name) {
            return Err(KvError::BucketExists(config.name));
        }
        let name = config.name.clone();
        let bucket = Arc::new(InMemoryBucket::new(config));
        buckets.insert(name, Arc::clone(&bucket));
        Ok(bucket)
    }

    /// Names of all buckets, sorted.
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .buckets
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl KvProvider for InMemoryKv {
    async fn open_bucket(&self, name: &str) -> KvResult<Arc<dyn KvBucket>> {
        let bucket: Arc<dyn KvBucket> = self
            .bucket(name)
            .ok_or_else(|| KvError::BucketNotFound(name.to_string()))?;
        Ok(bucket)
    }

    async fn create_bucket(&self, config: BucketConfig) -> KvResult<Arc<dyn KvBucket>> {
        let bucket: Arc<dyn KvBucket> = self.create(config)?;
        Ok(bucket)
    }
}
