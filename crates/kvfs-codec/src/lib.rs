//! Key codecs for kvfs.
//!
//! A key-value bucket has a flat namespace with a narrow key alphabet, while
//! callers address objects by hierarchical paths such as
//! `acme/example.com/sites/example.com/example.com.crt`. A [`KeyCodec`] maps
//! such a *logical* path onto a *physical* bucket key and back.
//!
//! # Codecs
//!
//! - [`EscapingCodec`] -- the default. Total and bijective over every Unicode
//!   string: each `/` becomes `.`, and every byte outside `[-_A-Za-z0-9]` is
//!   written as `=HH`.
//! - [`SubstitutionCodec`] -- compatibility scheme for buckets written by older
//!   deployments. Replaces `.` with `_dot_` and `/` with `.`, and refuses input
//!   it cannot round-trip.
//!
//! # Examples
//!
//! ```
//! use kvfs_codec::{EscapingCodec, KeyCodec};
//!
//! let codec = EscapingCodec;
//! let physical = codec.encode("acme/example.com/cert.pem").unwrap();
//! assert_eq!(physical, "acme.example=2Ecom.cert=2Epem");
//! assert_eq!(codec.decode(&physical).unwrap(), "acme/example.com/cert.pem");
//! ```

pub mod error;
pub mod escaping;
pub mod substitution;
pub mod traits;

pub use error::{CodecError, CodecResult};
pub use escaping::EscapingCodec;
pub use substitution::SubstitutionCodec;
pub use traits::{CodecKind, KeyCodec};

/// Separator between segments of a logical key.
pub const SEPARATOR: char = '/';

/// Separator between tokens of a physical key.
pub const DELIMITER: char = '.';
