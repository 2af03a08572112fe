//! Hierarchical object storage and distributed locking for kvfs.
//!
//! Certificate managers address their data with `/`-separated paths such as
//! `acme/example.com/sites/example.com/example.com.crt`. This crate stores
//! those objects in a flat key-value bucket, derives directory listings from
//! key prefixes, and coordinates clients through lock entries in a second
//! bucket.
//!
//! # Modules
//!
//! - [`storage`] -- [`Storage`], the client, and bucket provisioning
//! - [`traits`] -- the [`HierarchicalStorage`] contract
//! - [`object`] -- store / load / delete / exists / stat
//! - [`list`] -- prefix listing
//! - [`lock`] -- [`LockManager`] and the lock record format
//! - [`context`] -- cancellation and deadlines
//! - [`config`] -- [`StorageConfig`] and its TOML form
//! - [`error`] -- [`StorageError`] and the [`StorageResult`] alias
//!
//! # Example
//!
//! ```no_run
//! use kvfs_kv::InMemoryKv;
//! use kvfs_storage::{Context, HierarchicalStorage, Storage, StorageConfig};
//!
//! # async fn run() -> kvfs_storage::StorageResult<()> {
//! let kv = InMemoryKv::new();
//! let storage = Storage::provision(&kv, StorageConfig::for_bucket("certs")).await?;
//! let ctx = Context::background();
//!
//! storage.lock(&ctx, "acme/example.com").await?;
//! storage.store(&ctx, "acme/example.com/cert.pem", b"...").await?;
//! storage.unlock(&ctx, "acme/example.com").await?;
//!
//! assert_eq!(
//!     storage.list(&ctx, "acme/example.com", false).await?,
//!     vec!["acme/example.com/cert.pem"]
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod list;
pub mod lock;
pub mod object;
pub mod storage;
pub mod traits;

pub use config::StorageConfig;
pub use context::{Context, ContextError};
pub use error::{StorageError, StorageResult};
pub use list::{is_listed, Lister};
pub use lock::{LockManager, LockRecord, LockSettings};
pub use object::{ObjectInfo, ObjectStore};
pub use storage::Storage;
pub use traits::HierarchicalStorage;
