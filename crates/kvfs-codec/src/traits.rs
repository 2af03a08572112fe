//! The [`KeyCodec`] trait and codec selection.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CodecResult;
use crate::escaping::EscapingCodec;
use crate::substitution::SubstitutionCodec;
use crate::DELIMITER;

/// Mapping between logical (hierarchical) keys and physical (flat) keys.
///
/// Implementations must be deterministic and must map the logical separator
/// `/` onto the physical delimiter `.` one-to-one, so that a logical prefix
/// encodes to a physical prefix of every descendant key.
pub trait KeyCodec: Send + Sync + fmt::Debug {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Encode a logical key into a physical key.
    fn encode(&self, logical: &str) -> CodecResult<String>;

    /// Decode a physical key back into the logical key it was produced from.
    ///
    /// Fails with [`CodecError::InvalidKey`](crate::CodecError::InvalidKey)
    /// if `physical` is not an output of [`encode`](Self::encode).
    fn decode(&self, physical: &str) -> CodecResult<String>;

    /// Physical prefix shared by every descendant of `logical_prefix`.
    ///
    /// The empty logical prefix scopes the whole namespace and maps to `""`.
    fn list_scope(&self, logical_prefix: &str) -> CodecResult<String> {
        if logical_prefix.is_empty() {
            return Ok(String::new());
        }
        let mut scope = self.encode(logical_prefix)?;
        scope.push(DELIMITER);
        Ok(scope)
    }
}

/// Which codec a storage instance uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// [`EscapingCodec`].
    #[default]
    Escaping,
    /// [`SubstitutionCodec`].
    Substitution,
}

impl CodecKind {
    /// Instantiate the selected codec.
    pub fn build(self) -> Arc<dyn KeyCodec> {
        match self {
            Self::Escaping => Arc::new(EscapingCodec),
            Self::Substitution => Arc::new(SubstitutionCodec),
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Escaping => write!(f, "escaping"),
            Self::Substitution => write!(f, "substitution"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kind_is_escaping() {
        assert_eq!(CodecKind::default(), CodecKind::Escaping);
        assert_eq!(CodecKind::default().build().name(), "escaping");
    }

    #[test]
    fn kind_builds_matching_codec() {
        assert_eq!(CodecKind::Substitution.build().name(), "substitution");
        assert_eq!(CodecKind::Substitution.to_string(), "substitution");
    }

    #[test]
    fn kind_serde_is_lowercase() {
        let json = serde_json::to_string(&CodecKind::Substitution).unwrap();
        assert_eq!(json, "\"substitution\"");
        let kind: CodecKind = serde_json::from_str("\"escaping\"").unwrap();
        assert_eq!(kind, CodecKind::Escaping);
    }

    #[test]
    fn list_scope_of_empty_prefix_is_empty() {
        let codec = EscapingCodec;
        assert_eq!(codec.list_scope("").unwrap(), "");
    }

    #[test]
    fn list_scope_appends_delimiter() {
        let codec = EscapingCodec;
        assert_eq!(codec.list_scope("acme/sites").unwrap(), "acme.sites.");
    }
}
