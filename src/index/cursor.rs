//! Cursor adapter over a standard or unique index key space.
//!
//! A unique-index key carries no record id, so when a key binds more than
//! one id (duplicates allowed) a single backend entry expands into several
//! [`Entry`] values. An inclusive seek takes a point-get fast path on both
//! index kinds: unique keys resolve with a direct `get`, while standard
//! keys (which carry a record-id suffix making a direct `get` impossible)
//! resolve with a prefix-probe — a single match is read directly, zero or
//! many matches fall through to the underlying range cursor.

use crate::{
    index::{standard_key, unique, unique_key},
    kvs::{Cursor, Direction, ProbeCount},
    recovery_unit::RecoveryUnit,
    types::{Prefix, RecordId},
    Result,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Kind {
    Standard,
    Unique,
}

/// One (key_string, record id) pair surfaced by an index cursor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub key_string: Vec<u8>,
    pub id: RecordId,
}

pub struct IndexCursor {
    prefix: Prefix,
    kind: Kind,
    inner: Box<dyn Cursor>,
    /// Buffered remaining entries decoded from the unique-index value the
    /// cursor is currently sitting on; `read()` drains this before asking
    /// `inner` to advance.
    pending: Vec<Entry>,
    /// Set after a point-get seek so `restore()` knows to reposition by
    /// seek-then-skip rather than trusting the backend cursor's own state.
    last_point_get_key: Option<Vec<u8>>,
}

impl IndexCursor {
    pub fn new(ru: &RecoveryUnit, prefix: Prefix, kind: Kind, dir: Direction) -> Result<IndexCursor> {
        let inner = ru.begin_scan(&prefix.to_be_bytes(), dir)?;
        Ok(IndexCursor { prefix, kind, inner, pending: Vec::new(), last_point_get_key: None })
    }

    fn decode_current(&self, key: &[u8], value: &[u8]) -> Result<Vec<Entry>> {
        match self.kind {
            Kind::Standard => {
                let (key_string, id) = {
                    let (ks, id) = split_standard_key_owned(key);
                    (ks, id)
                };
                let _ = value; // type-bits byte, carried but not surfaced here
                Ok(vec![Entry { key_string, id }])
            }
            Kind::Unique => {
                let key_string = key[4..].to_vec();
                let entries = unique::decode_value(value)?;
                Ok(entries
                    .into_iter()
                    .map(|e| Entry { key_string: key_string.clone(), id: e.id })
                    .collect())
            }
        }
    }

    /// Position the cursor at `key_string`. An inclusive seek takes the
    /// point-get fast path described on the module doc comment; any other
    /// seek (or a fast path that found no match) drives the underlying
    /// range cursor instead.
    pub fn seek(&mut self, ru: &RecoveryUnit, key_string: &[u8], inclusive: bool) -> Result<()> {
        self.pending.clear();
        self.last_point_get_key = None;

        if inclusive {
            match self.kind {
                Kind::Unique => {
                    let key = unique_key(self.prefix, key_string);
                    if let Some(value) = ru.get(&key)? {
                        self.pending = self.decode_current(&key, &value)?;
                        self.last_point_get_key = Some(key);
                        return Ok(());
                    }
                }
                Kind::Standard => {
                    let probe_prefix = unique_key(self.prefix, key_string);
                    if ru.prefix_probe(&probe_prefix)? == ProbeCount::One {
                        let mut probe = ru.begin_scan(&probe_prefix, Direction::Forward)?;
                        if let Some((key, value)) = probe.read()? {
                            self.pending = self.decode_current(&key, &value)?;
                            self.last_point_get_key = Some(key);
                            return Ok(());
                        }
                    }
                }
            }
        }

        let key = match self.kind {
            Kind::Standard => standard_key(self.prefix, key_string, RecordId(0)),
            Kind::Unique => unique_key(self.prefix, key_string),
        };
        self.inner.seek(&key, inclusive)
    }

    pub fn read(&mut self) -> Result<Option<Entry>> {
        if let Some(entry) = self.pending.first().cloned() {
            return Ok(Some(entry));
        }
        match self.inner.read()? {
            None => Ok(None),
            Some((key, value)) => {
                let mut entries = self.decode_current(&key, &value)?;
                let head = if entries.is_empty() { None } else { Some(entries.remove(0)) };
                self.pending = entries;
                Ok(head)
            }
        }
    }

    pub fn advance(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.pending.remove(0);
            return Ok(());
        }
        self.inner.advance()
    }

    /// Reposition after the enclosing unit's transaction boundary moved.
    /// If the last operation that placed the cursor was a point-get, the
    /// backend cursor never moved to match, so seek back to that key and
    /// skip it (the caller already consumed it via `read()`/`advance()`
    /// before restoring).
    pub fn restore(&mut self) -> Result<()> {
        self.inner.restore()?;
        if let Some(key) = self.last_point_get_key.take() {
            self.inner.seek(&key, false)?;
        }
        Ok(())
    }
}

fn split_standard_key_owned(key: &[u8]) -> (Vec<u8>, RecordId) {
    let (ks, id) = crate::index::split_standard_key(key);
    (ks.to_vec(), id)
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod cursor_test;
