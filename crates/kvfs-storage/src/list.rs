//! Directory listing over a flat namespace.
//!
//! Directories are never stored. A key is "under" a prefix when it equals the
//! prefix followed by `/` and a non-empty remainder; a direct child is one
//! whose remainder has no further `/`. A prefix that only has deeper
//! descendants therefore has no direct children.

use std::collections::BTreeSet;
use std::sync::Arc;

use kvfs_codec::{KeyCodec, SEPARATOR};
use kvfs_kv::KvBucket;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{StorageError, StorageResult};

/// Returns `true` if `key` is listed under `prefix`.
///
/// `prefix` must already be stripped of trailing separators.
pub fn is_listed(prefix: &str, key: &str, recursive: bool) -> bool {
    let remainder = if prefix.is_empty() {
        key
    } else {
        match key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
        {
            Some(rest) if !rest.is_empty() => rest,
            _ => return false,
        }
    };
    recursive || !remainder.contains(SEPARATOR)
}

/// Lists logical keys by prefix.
#[derive(Clone, Debug)]
pub struct Lister {
    bucket: Arc<dyn KvBucket>,
    codec: Arc<dyn KeyCodec>,
}

impl Lister {
    pub fn new(bucket: Arc<dyn KvBucket>, codec: Arc<dyn KeyCodec>) -> Self {
        Self { bucket, codec }
    }

    /// Keys stored under `prefix`, sorted and deduplicated.
    ///
    /// With `recursive` every descendant is returned, otherwise only direct
    /// children. The empty prefix covers the whole bucket. One trailing `/`
    /// on `prefix` is ignored; further ones name empty segments. Bucket keys that this codec did not produce are
    /// skipped.
    pub async fn list(
        &self,
        ctx: &Context,
        prefix: &str,
        recursive: bool,
    ) -> StorageResult<Vec<String>> {
        let prefix = prefix.strip_suffix(SEPARATOR).unwrap_or(prefix);
        let scope = self.codec.list_scope(prefix)?;
        let physical_keys = ctx
            .run(self.bucket.keys(&scope))
            .await
            .map_err(|e| StorageError::interrupted(e, prefix))??;

        let mut keys = BTreeSet::new();
        for physical in &physical_keys {
            let logical = match self.codec.decode(physical) {
                Ok(logical) => logical,
                Err(err) => {
                    warn!(%physical, error = %err, "skipping undecodable key");
                    continue;
                }
            };
            if is_listed(prefix, &logical, recursive) {
                keys.insert(logical);
            }
        }

        debug!(
            prefix,
            recursive,
            scanned = physical_keys.len(),
            matched = keys.len(),
            "listed keys"
        );
        Ok(keys.into_iter().collect())
    }
}
