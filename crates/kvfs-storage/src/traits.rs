//! The storage contract consumed by certificate managers.

use async_trait::async_trait;

use crate::context::Context;
use crate::error::StorageResult;
use crate::object::ObjectInfo;

/// Hierarchical key/value storage with cooperative locking.
///
/// Keys are `/`-separated paths. Every call is bounded by `ctx`.
#[async_trait]
pub trait HierarchicalStorage: Send + Sync {
    /// Write `value` at `key`, replacing any existing object.
    async fn store(&self, ctx: &Context, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Read the object at `key`. Fails with `NotExist` if absent.
    async fn load(&self, ctx: &Context, key: &str) -> StorageResult<Vec<u8>>;

    /// Remove the object at `key`. Fails with `NotExist` if absent.
    async fn delete(&self, ctx: &Context, key: &str) -> StorageResult<()>;

    async fn exists(&self, ctx: &Context, key: &str) -> StorageResult<bool>;

    async fn stat(&self, ctx: &Context, key: &str) -> StorageResult<ObjectInfo>;

    /// Keys under `prefix`; all descendants if `recursive`, else direct children.
    async fn list(&self, ctx: &Context, prefix: &str, recursive: bool)
        -> StorageResult<Vec<String>>;

    /// Block until this client holds the lock on `key`.
    async fn lock(&self, ctx: &Context, key: &str) -> StorageResult<()>;

    async fn unlock(&self, ctx: &Context, key: &str) -> StorageResult<()>;
}
