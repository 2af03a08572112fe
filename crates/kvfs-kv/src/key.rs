//! Physical key syntax.
//!
//! Keys follow the NATS key-value convention:
//! - Must be non-empty
//! - Must only contain `[-/_=.A-Za-z0-9]`
//! - Must not start or end with `.`
//! - Must not contain empty tokens (`..`)

use crate::error::{KvError, KvResult};

fn is_key_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"-/_=.".contains(&byte)
}

/// Validate a physical key, returning `Ok(())` if the bucket accepts it.
///
/// # Examples
///
/// ```
/// use kvfs_kv::validate_key;
///
/// assert!(validate_key("acme.example=2Ecom").is_ok());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("a..b").is_err());
/// ```
pub fn validate_key(key: &str) -> KvResult<()> {
    let invalid = |reason: &str| KvError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("key must not be empty"));
    }
    if let Some(byte) = key.bytes().find(|b| !is_key_byte(*b)) {
        return Err(invalid(&format!("contains forbidden byte {byte:#04x}")));
    }
    if key.starts_with('.') || key.ends_with('.') {
        return Err(invalid("must not start or end with '.'"));
    }
    if key.contains("..") {
        return Err(invalid("must not contain empty tokens"));
    }
    Ok(())
}
