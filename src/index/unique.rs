//! Unique index: insert/unindex/dup-check over `prefix ‖ key-string` keys
//! whose value holds the owning record id(s).

use crate::{
    error::Result,
    index::{unique_key, MAX_KEY_LEN},
    recovery_unit::RecoveryUnit,
    types::{Prefix, RecordId},
};

/// One (record id, type-bits) pair backing a unique-index entry. Multiple
/// entries under one key only arise when duplicates are explicitly
/// allowed for that index.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub id: RecordId,
    pub type_bits: u8,
}

fn encode_value(entries: &[Entry]) -> Vec<u8> {
    if let [single] = entries {
        if single.type_bits == 0 {
            return single.id.to_be_bytes().to_vec();
        }
    }
    let mut out = Vec::with_capacity(entries.len() * 9);
    for e in entries {
        out.extend_from_slice(&e.id.to_be_bytes());
        out.push(e.type_bits);
    }
    out
}

pub(crate) fn decode_value(buf: &[u8]) -> Result<Vec<Entry>> {
    if buf.len() == 8 {
        return Ok(vec![Entry { id: RecordId::from_be_bytes(buf), type_bits: 0 }]);
    }
    if buf.len() % 9 != 0 {
        return err_at!(FailConvert, msg: "unique-index value length {} not a multiple of 9", buf.len());
    }
    Ok(buf
        .chunks(9)
        .map(|c| Entry { id: RecordId::from_be_bytes(&c[..8]), type_bits: c[8] })
        .collect())
}

/// Insert `(id, type_bits)` under `key_string`. If the key is already
/// bound and `allow_dup` is false, returns `Error::DuplicateKey` unless
/// the binding is to the same `id` (a re-insert of an existing entry is
/// not an error).
pub fn insert(
    ru: &RecoveryUnit,
    prefix: Prefix,
    key_string: &[u8],
    id: RecordId,
    type_bits: u8,
    allow_dup: bool,
) -> Result<()> {
    if key_string.len() > MAX_KEY_LEN {
        return err_at!(KeyTooLong, msg: "unique-index key {} exceeds {}", key_string.len(), MAX_KEY_LEN);
    }
    let key = unique_key(prefix, key_string);

    match ru.get(&key)? {
        None => {
            ru.put(&key, &encode_value(&[Entry { id, type_bits }]))?;
        }
        Some(buf) => {
            let mut entries = decode_value(&buf)?;
            if entries.iter().any(|e| e.id == id) {
                return Ok(());
            }
            if !allow_dup {
                return err_at!(DuplicateKey, msg: "unique-index key already bound to a different record");
            }
            entries.push(Entry { id, type_bits });
            entries.sort_by_key(|e| e.id);
            ru.put(&key, &encode_value(&entries))?;
        }
    }
    Ok(())
}

/// Remove the `(key_string, id)` binding. If it was the last entry under
/// the key, the key itself is deleted.
pub fn unindex(ru: &RecoveryUnit, prefix: Prefix, key_string: &[u8], id: RecordId) -> Result<()> {
    let key = unique_key(prefix, key_string);
    match ru.get(&key)? {
        None => Ok(()),
        Some(buf) => {
            let mut entries = decode_value(&buf)?;
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                ru.del(&key)
            } else {
                ru.put(&key, &encode_value(&entries))
            }
        }
    }
}

/// Blind delete used when duplicates were never allowed and the index is
/// non-partial: the key maps to exactly one record, so no read-before-
/// write is needed.
pub fn unindex_blind(ru: &RecoveryUnit, prefix: Prefix, key_string: &[u8]) -> Result<()> {
    ru.del(&unique_key(prefix, key_string))
}

/// Does `key_string` already resolve to a record other than `id`?
pub fn dup_check(ru: &RecoveryUnit, prefix: Prefix, key_string: &[u8], id: RecordId) -> Result<bool> {
    match ru.get(&unique_key(prefix, key_string))? {
        None => Ok(false),
        Some(buf) => Ok(decode_value(&buf)?.iter().any(|e| e.id != id)),
    }
}

#[cfg(test)]
#[path = "unique_test.rs"]
mod unique_test;
