//! Key encoding shared by the unique and standard index flavours, plus the
//! cursor adapter both build on.
//!
//! An index key is always `ident-prefix ‖ ordered-key-string-encoding`,
//! optionally followed by an 8-byte big-endian record id for standard
//! indexes (making duplicate key values distinct entries). The ordered
//! key-string encoding itself — how a host document field value becomes a
//! lexicographically-ordered byte string — is supplied by the caller as
//! opaque bytes; this crate only frames it with the prefix/record-id/
//! type-bits envelope.

pub mod cursor;
pub mod standard;
pub mod unique;

pub use cursor::IndexCursor;

use crate::types::{Prefix, RecordId};

/// Maximum length, in bytes, an encoded index key may occupy before
/// `Error::KeyTooLong` is raised — fail fast on pathologically large
/// index keys rather than let them degrade backend performance silently.
pub const MAX_KEY_LEN: usize = 8 * 1024;

/// Build a standard-index key: prefix ‖ key-string ‖ record id.
pub fn standard_key(prefix: Prefix, key_string: &[u8], id: RecordId) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + key_string.len() + 8);
    out.extend_from_slice(&prefix.to_be_bytes());
    out.extend_from_slice(key_string);
    out.extend_from_slice(&id.to_be_bytes());
    out
}

/// Build a unique-index key: prefix ‖ key-string (no record id).
pub fn unique_key(prefix: Prefix, key_string: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + key_string.len());
    out.extend_from_slice(&prefix.to_be_bytes());
    out.extend_from_slice(key_string);
    out
}

/// Split a standard-index key back into its key-string and record id,
/// given the caller already knows the prefix length (4 bytes).
pub fn split_standard_key(key: &[u8]) -> (&[u8], RecordId) {
    let (key_string, id_bytes) = key.split_at(key.len() - 8);
    (&key_string[4..], RecordId::from_be_bytes(id_bytes))
}

pub fn key_string_of_unique_key(key: &[u8]) -> &[u8] {
    &key[4..]
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
