//! Standard (non-unique) index: the record id lives in the key itself, so
//! insert/unindex never need to read the old value first.

use crate::{
    index::{standard_key, MAX_KEY_LEN},
    recovery_unit::RecoveryUnit,
    types::{Prefix, RecordId},
    Result,
};

/// Insert a `(key_string, id)` entry. `type_bits` is stored as the whole
/// value since nothing else shares the key.
pub fn insert(
    ru: &RecoveryUnit,
    prefix: Prefix,
    key_string: &[u8],
    id: RecordId,
    type_bits: u8,
) -> Result<()> {
    if key_string.len() > MAX_KEY_LEN {
        return err_at!(KeyTooLong, msg: "standard-index key {} exceeds {}", key_string.len(), MAX_KEY_LEN);
    }
    let key = standard_key(prefix, key_string, id);
    ru.put(&key, &[type_bits])
}

pub fn unindex(ru: &RecoveryUnit, prefix: Prefix, key_string: &[u8], id: RecordId) -> Result<()> {
    ru.del(&standard_key(prefix, key_string, id))
}

pub fn contains(ru: &RecoveryUnit, prefix: Prefix, key_string: &[u8], id: RecordId) -> Result<bool> {
    ru.probe_key(&standard_key(prefix, key_string, id))
}

#[cfg(test)]
#[path = "standard_test.rs"]
mod standard_test;
