//! Key-value bucket abstraction for kvfs.
//!
//! kvfs does not talk to a particular database. It depends on the small set
//! of capabilities declared here, which any revisioned key-value bucket
//! (NATS JetStream KV, etcd, Consul, ...) can provide:
//!
//! - single-key `get` / `put` / `delete`
//! - atomic `create` (create-if-absent) and revision-checked `update`/`delete`
//! - prefix enumeration of keys
//! - optional per-key change notification (`watch`)
//! - per-bucket entry TTL ([`BucketConfig::max_age`])
//!
//! # Modules
//!
//! - [`error`] -- [`KvError`] and the [`KvResult`] alias
//! - [`types`] -- [`KvEntry`], [`KvEvent`], [`BucketConfig`]
//! - [`traits`] -- the [`KvBucket`] and [`KvProvider`] traits
//! - [`key`] -- physical key syntax
//! - [`watch`] -- [`KvWatcher`], a per-key event stream
//! - [`memory`] -- [`InMemoryKv`] / [`InMemoryBucket`] for tests and embedding

pub mod error;
pub mod key;
pub mod memory;
pub mod traits;
pub mod types;
pub mod watch;

pub use error::{KvError, KvResult};
pub use key::validate_key;
pub use memory::{InMemoryBucket, InMemoryKv};
pub use traits::{KvBucket, KvProvider};
pub use types::{BucketConfig, KvEntry, KvEvent, KvOperation};
pub use watch::KvWatcher;
