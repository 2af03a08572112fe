use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use kvfs_codec::CodecKind;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Configuration for a [`Storage`](crate::Storage) client.
///
/// Durations are written in TOML as integer milliseconds:
///
/// ```toml
/// bucket = "certificates"
/// lock_ttl_ms = 30000
/// codec = "escaping"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket holding the objects.
    pub bucket: String,
    /// Bucket holding lock entries. Defaults to `<bucket>_locks`.
    pub lock_bucket: Option<String>,
    /// Lease of a lock entry; a crashed holder's lock disappears after this.
    #[serde(rename = "lock_ttl_ms", with = "millis")]
    pub lock_ttl: Duration,
    /// First delay between acquisition attempts when polling.
    #[serde(rename = "poll_interval_min_ms", with = "millis")]
    pub poll_interval_min: Duration,
    /// Upper bound for the polling delay.
    #[serde(rename = "poll_interval_max_ms", with = "millis")]
    pub poll_interval_max: Duration,
    /// Wait for lock release through change notification when available.
    pub use_watch: bool,
    /// Key codec.
    pub codec: CodecKind,
    /// Create missing buckets during provisioning.
    pub create_buckets: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "kvfs".into(),
            lock_bucket: None,
            lock_ttl: Duration::from_secs(60),
            poll_interval_min: Duration::from_millis(10),
            poll_interval_max: Duration::from_millis(500),
            use_watch: true,
            codec: CodecKind::default(),
            create_buckets: true,
        }
    }
}

impl StorageConfig {
    /// Default configuration for the named bucket.
    pub fn for_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Name of the lock bucket.
    pub fn lock_bucket_name(&self) -> String {
        self.lock_bucket
            .clone()
            .unwrap_or_else(|| format!("{}_locks", self.bucket))
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> StorageResult<()> {
        if self.bucket.is_empty() {
            return Err(StorageError::Config("bucket name must not be empty".into()));
        }
        if self.lock_bucket_name() == self.bucket {
            return Err(StorageError::Config(
                "lock bucket must differ from the object bucket".into(),
            ));
        }
        if self.lock_ttl.is_zero() {
            return Err(StorageError::Config("lock_ttl_ms must be positive".into()));
        }
        let lease_end = chrono::Duration::from_std(self.lock_ttl)
            .ok()
            .and_then(|lease| Utc::now().checked_add_signed(lease));
        if lease_end.is_none() {
            return Err(StorageError::Config(format!(
                "lock_ttl_ms ({}) is too large",
                self.lock_ttl.as_millis()
            )));
        }
        if self.poll_interval_min.is_zero() {
            return Err(StorageError::Config(
                "poll_interval_min_ms must be positive".into(),
            ));
        }
        if self.poll_interval_min > self.poll_interval_max {
            return Err(StorageError::Config(format!(
                "poll_interval_min_ms ({}) exceeds poll_interval_max_ms ({})",
                self.poll_interval_min.as_millis(),
                self.poll_interval_max.as_millis()
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> StorageResult<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&input)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> StorageResult<String> {
        toml::to_string(self).map_err(|e| StorageError::Config(e.to_string()))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = StorageConfig::default();
        assert_eq!(c.bucket, "kvfs");
        assert_eq!(c.lock_bucket_name(), "kvfs_locks");
        assert_eq!(c.lock_ttl, Duration::from_secs(60));
        assert!(c.use_watch);
        assert!(c.create_buckets);
        assert_eq!(c.codec, CodecKind::Escaping);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn explicit_lock_bucket() {
        let c = StorageConfig {
            lock_bucket: Some("leases".into()),
            ..StorageConfig::for_bucket("certs")
        };
        assert_eq!(c.lock_bucket_name(), "leases");
    }

    #[test]
    fn parse_partial_toml() {
        let c = StorageConfig::from_toml_str(
            r#"
            bucket = "certificates"
            lock_ttl_ms = 1500
            codec = "substitution"
            use_watch = false
            "#,
        )
        .unwrap();
        assert_eq!(c.bucket, "certificates");
        assert_eq!(c.lock_ttl, Duration::from_millis(1500));
        assert_eq!(c.codec, CodecKind::Substitution);
        assert!(!c.use_watch);
        assert_eq!(c.poll_interval_max, Duration::from_millis(500));
    }

    #[test]
    fn toml_roundtrip() {
        let c = StorageConfig {
            lock_bucket: Some("leases".into()),
            ..StorageConfig::for_bucket("certs")
        };
        let text = c.to_toml_string().unwrap();
        assert!(text.contains("lock_ttl_ms = 60000"));
        assert_eq!(StorageConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn reject_invalid_values() {
        assert!(StorageConfig::from_toml_str("bucket = \"\"").is_err());
        assert!(StorageConfig::from_toml_str("lock_ttl_ms = 0").is_err());
        assert!(StorageConfig::from_toml_str("lock_ttl_ms = 1152921504606846976").is_err());
        assert!(StorageConfig::from_toml_str(
            "poll_interval_min_ms = 100\npoll_interval_max_ms = 10"
        )
        .is_err());
        assert!(StorageConfig::from_toml_str("lock_bucket = \"kvfs\"").is_err());
        assert!(StorageConfig::from_toml_str("codec = \"rot13\"").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bucket = \"from-file\"").unwrap();
        let c = StorageConfig::from_file(file.path()).unwrap();
        assert_eq!(c.bucket, "from-file");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = StorageConfig::from_file(Path::new("/nonexistent/kvfs.toml")).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
