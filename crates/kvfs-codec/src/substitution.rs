//! Compatibility codec for buckets populated by older deployments.
//!
//! Those deployments stored keys by replacing `.` with a fixed token and then
//! `/` with `.`. The scheme cannot represent every key: input that already
//! contains the token, or that forms the token together with a neighboring
//! dot, would decode to something else. Such keys are refused with
//! [`CodecError::Ambiguous`] rather than silently corrupted.

use crate::error::{CodecError, CodecResult};
use crate::traits::KeyCodec;
use crate::{DELIMITER, SEPARATOR};

/// Token standing in for a literal `.` inside a segment.
pub const DOT_TOKEN: &str = "_dot_";

/// Token-substitution codec. Not total; see the module docs.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubstitutionCodec;

impl SubstitutionCodec {
    fn substitute(logical: &str) -> String {
        logical
            .replace(DELIMITER, DOT_TOKEN)
            .replace(SEPARATOR, &DELIMITER.to_string())
    }

    fn restore(physical: &str) -> String {
        physical
            .replace(DELIMITER, &SEPARATOR.to_string())
            .replace(DOT_TOKEN, &DELIMITER.to_string())
    }
}

impl KeyCodec for SubstitutionCodec {
    fn name(&self) -> &'static str {
        "substitution"
    }

    fn encode(&self, logical: &str) -> CodecResult<String> {
        let physical = Self::substitute(logical);
        if Self::restore(&physical) != logical {
            return Err(CodecError::Ambiguous {
                key: logical.to_string(),
                token: DOT_TOKEN.to_string(),
            });
        }
        Ok(physical)
    }

    fn decode(&self, physical: &str) -> CodecResult<String> {
        if physical.is_empty() {
            return Err(CodecError::invalid(physical, "empty key"));
        }
        let logical = Self::restore(physical);
        if Self::substitute(&logical) != physical {
            return Err(CodecError::invalid(physical, "not produced by substitution"));
        }
        Ok(logical)
    }
}
