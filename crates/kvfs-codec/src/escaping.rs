//! The default, total codec.
//!
//! Physical keys produced here consist of tokens drawn from `[-_=A-Za-z0-9]`
//! joined by `.`:
//!
//! - Each logical segment becomes one token.
//! - Plain bytes (`[-_A-Za-z0-9]`) are copied through.
//! - Every other byte of the segment's UTF-8 encoding is written as `=HH`
//!   with upper-case hex digits. This covers `.`, `=` and all non-ASCII text.
//! - An empty segment is written as the bare token `=`.
//!
//! Decoding accepts only the canonical form, which makes the mapping a
//! bijection between all Unicode strings and the codec's image.

use crate::error::{CodecError, CodecResult};
use crate::traits::KeyCodec;
use crate::{DELIMITER, SEPARATOR};

/// Escape marker introducing a hex-encoded byte.
const ESCAPE: char = '=';

/// Returns `true` for bytes that are copied through unescaped.
fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

fn is_upper_hex(byte: u8) -> bool {
    byte.is_ascii_digit() || (b'A'..=b'F').contains(&byte)
}

/// Total, bijective codec over arbitrary Unicode keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct EscapingCodec;

impl EscapingCodec {
    fn encode_segment(segment: &str, out: &mut String) {
        if segment.is_empty() {
            out.push(ESCAPE);
            return;
        }
        for &byte in segment.as_bytes() {
            if is_plain(byte) {
                out.push(char::from(byte));
            } else {
                out.push(ESCAPE);
                out.push_str(&hex::encode_upper([byte]));
            }
        }
    }

    fn decode_token(physical: &str, token: &str) -> CodecResult<String> {
        if token.is_empty() {
            return Err(CodecError::invalid(physical, "empty token"));
        }
        if token.len() == 1 && token.starts_with(ESCAPE) {
            return Ok(String::new());
        }

        let bytes = token.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            let byte = bytes[i];
            if is_plain(byte) {
                out.push(byte);
                i += 1;
                continue;
            }
            if byte != ESCAPE as u8 {
                return Err(CodecError::invalid(
                    physical,
                    format!("unexpected byte {byte:#04x} at offset {i} of token {token:?}"),
                ));
            }

            let digits = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| CodecError::invalid(physical, "truncated escape sequence"))?;
            if !digits.iter().all(|d| is_upper_hex(*d)) {
                return Err(CodecError::invalid(
                    physical,
                    "escape sequence must be two upper-case hex digits",
                ));
            }
            let mut decoded = [0u8; 1];
            hex::decode_to_slice(digits, &mut decoded)
                .map_err(|e| CodecError::invalid(physical, e.to_string()))?;
            if is_plain(decoded[0]) {
                return Err(CodecError::invalid(
                    physical,
                    format!("plain byte {:?} must not be escaped", char::from(decoded[0])),
                ));
            }
            out.push(decoded[0]);
            i += 3;
        }

        String::from_utf8(out)
            .map_err(|_| CodecError::invalid(physical, "escaped bytes are not valid UTF-8"))
    }
}

impl KeyCodec for EscapingCodec {
    fn name(&self) -> &'static str {
        "escaping"
    }

    fn encode(&self, logical: &str) -> CodecResult<String> {
        let mut out = String::with_capacity(logical.len());
        for (i, segment) in logical.split(SEPARATOR).enumerate() {
            if i > 0 {
                out.push(DELIMITER);
            }
            Self::encode_segment(segment, &mut out);
        }
        Ok(out)
    }

    fn decode(&self, physical: &str) -> CodecResult<String> {
        let mut out = String::with_capacity(physical.len());
        for (i, token) in physical.split(DELIMITER).enumerate() {
            if i > 0 {
                out.push(SEPARATOR);
            }
            out.push_str(&Self::decode_token(physical, token)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(logical: &str) -> String {
        let codec = EscapingCodec;
        let physical = codec.encode(logical).unwrap();
        codec.decode(&physical).unwrap()
    }

    fn is_physical_key(key: &str) -> bool {
        !key.is_empty()
            && key.split('.').all(|token| {
                !token.is_empty()
                    && token
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b"-_=".contains(&b))
            })
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    #[test]
    fn plain_segments_pass_through() {
        let codec = EscapingCodec;
        assert_eq!(codec.encode("acme").unwrap(), "acme");
        assert_eq!(codec.encode("a/b/c").unwrap(), "a.b.c");
        assert_eq!(codec.encode("with-dash_and_underscore").unwrap(), "with-dash_and_underscore");
    }

    #[test]
    fn dots_are_escaped_inside_segments() {
        let codec = EscapingCodec;
        assert_eq!(
            codec.encode("acme/example.com/sites").unwrap(),
            "acme.example=2Ecom.sites"
        );
    }

    #[test]
    fn escape_marker_is_itself_escaped() {
        let codec = EscapingCodec;
        assert_eq!(codec.encode("a=b").unwrap(), "a=3Db");
        assert_eq!(roundtrip("a=3Db"), "a=3Db");
    }

    #[test]
    fn non_ascii_is_escaped_per_byte() {
        let codec = EscapingCodec;
        assert_eq!(codec.encode("é").unwrap(), "=C3=A9");
        assert_eq!(roundtrip("名前/ファイル"), "名前/ファイル");
    }

    #[test]
    fn empty_segments_are_preserved() {
        let codec = EscapingCodec;
        assert_eq!(codec.encode("").unwrap(), "=");
        assert_eq!(codec.encode("a//b").unwrap(), "a.=.b");
        assert_eq!(codec.encode("/a/").unwrap(), "=.a.=");
        assert_eq!(roundtrip("a//b"), "a//b");
        assert_eq!(roundtrip("/"), "/");
    }

    #[test]
    fn certificate_paths_roundtrip() {
        for key in [
            "acme/example.com/sites/example.com/example.com.crt",
            "acme/example.com/sites/example.com/example.com.key",
            "acme/example.com/sites/example.com/example.com.json",
        ] {
            assert_eq!(roundtrip(key), key);
        }
    }

    // -----------------------------------------------------------------------
    // Decoding rejects non-canonical input
    // -----------------------------------------------------------------------

    #[test]
    fn decode_rejects_empty_tokens() {
        let codec = EscapingCodec;
        assert!(codec.decode("").is_err());
        assert!(codec.decode("a..b").is_err());
        assert!(codec.decode(".a").is_err());
    }

    #[test]
    fn decode_rejects_lowercase_hex() {
        let codec = EscapingCodec;
        assert!(codec.decode("a=2ecom").is_err());
    }

    #[test]
    fn decode_rejects_escaped_plain_bytes() {
        let codec = EscapingCodec;
        assert!(codec.decode("=41").is_err());
    }

    #[test]
    fn decode_rejects_truncated_escape() {
        let codec = EscapingCodec;
        assert!(codec.decode("abc=2").is_err());
        assert!(codec.decode("a.==").is_err());
    }

    #[test]
    fn decode_rejects_foreign_characters() {
        let codec = EscapingCodec;
        let err = codec.decode("a/b").unwrap_err();
        assert!(matches!(err, CodecError::InvalidKey { .. }), "got {err}");
        assert!(codec.decode("caf\u{e9}").is_err());
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let codec = EscapingCodec;
        assert!(codec.decode("=FF").is_err());
        assert!(codec.decode("=C3").is_err());
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn decode_inverts_encode(logical in any::<String>()) {
            prop_assert_eq!(roundtrip(&logical), logical);
        }

        #[test]
        fn encode_yields_store_alphabet(logical in any::<String>()) {
            let physical = EscapingCodec.encode(&logical).unwrap();
            prop_assert!(is_physical_key(&physical), "bad physical key {:?}", physical);
        }

        #[test]
        fn paths_with_escape_tokens_roundtrip(logical in "[a-z=./_]{0,24}") {
            prop_assert_eq!(roundtrip(&logical), logical);
        }

        #[test]
        fn prefix_scope_covers_descendants(parent in "[a-z.]{1,8}", child in "[a-z.]{1,8}") {
            let codec = EscapingCodec;
            let scope = codec.list_scope(&parent).unwrap();
            let physical = codec.encode(&format!("{parent}/{child}")).unwrap();
            prop_assert!(physical.starts_with(&scope));
        }
    }
}
