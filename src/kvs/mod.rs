//! Thin contract over the underlying ordered, transactional KVS-backend:
//! put/get/delete/prefix-delete/cursor/transaction primitives, plus error
//! normalization into [`crate::error::Error`].
//!
//! This module names the shape the rest of the crate depends on; the real
//! backend (on-disk, replicated, whatever the host embeds) is an external
//! collaborator and out of scope here. [`mem::MemEngine`] is the in-memory
//! reference implementation this crate's own tests run against.

pub mod mem;

use crate::error::Result;

/// Maximum length, in bytes, of a single value the backend will store
/// inline. Values longer than `VMAX - 4` are chunked by
/// [`crate::value_framing`].
pub const VMAX: usize = 1024 * 1024;

/// Outcome of a prefix-probe: does zero, exactly one, or more than one key
/// match the probed prefix. Standard-index cursors use this to decide
/// between a point-get fast path and a full cursor scan.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProbeCount {
    Zero,
    One,
    Many,
}

/// A key space the backend opens independently: main, large (chunk
/// overflow), unique-index, std-index, oplog, oplog-large. `prefix_len` and
/// `suffix_len` configure how the backend decorates keys for ordered
/// iteration; the core never interprets them beyond passing them through
/// at open time.
#[derive(Copy, Clone, Debug)]
pub struct KeySpaceConfig {
    pub prefix_len: usize,
    pub suffix_len: usize,
}

impl KeySpaceConfig {
    pub const MAIN: KeySpaceConfig = KeySpaceConfig { prefix_len: 4, suffix_len: 0 };
    pub const OPLOG: KeySpaceConfig = KeySpaceConfig { prefix_len: 8, suffix_len: 0 };
    pub const STD_INDEX: KeySpaceConfig = KeySpaceConfig { prefix_len: 4, suffix_len: 8 };
}

/// Direction a cursor iterates in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// A scoped backend transaction. Begun lazily by the recovery unit on the
/// first call that requires one; committed or aborted at the enclosing
/// unit's boundary.
pub trait Txn {
    fn commit(self: Box<Self>) -> Result<()>;
    fn abort(self: Box<Self>) -> Result<()>;
    /// Lets a [`KVEngine`] impl downcast the `&dyn Txn` it receives back to
    /// its own concrete transaction type.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A backend cursor scoped to a key prefix, optionally transaction-bound.
pub trait Cursor {
    /// Position the cursor at `key`. If `inclusive`, a read at the
    /// resulting position may return an entry equal to `key`.
    fn seek(&mut self, key: &[u8], inclusive: bool) -> Result<()>;
    /// Read the entry at the cursor's current position without advancing.
    fn read(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    /// Advance the cursor one entry in its configured direction.
    fn advance(&mut self) -> Result<()>;
    /// Reposition the cursor onto the enclosing unit's current snapshot,
    /// required after `restore()` invalidates the backend's own cursor
    /// state across a transaction boundary.
    fn restore(&mut self) -> Result<()>;
}

/// The facade this crate depends on for all backend access. A real
/// embedding supplies an implementation wrapping its storage library; tests
/// run against [`mem::MemEngine`].
pub trait KVEngine: Send + Sync {
    fn begin_txn(&self) -> Result<Box<dyn Txn>>;

    fn put(&self, txn: Option<&dyn Txn>, key: &[u8], val: &[u8]) -> Result<()>;
    fn get(&self, txn: Option<&dyn Txn>, key: &[u8]) -> Result<Option<Vec<u8>>>;
    /// Length-only probe, avoiding a full value copy for large values.
    fn get_len(&self, txn: Option<&dyn Txn>, key: &[u8]) -> Result<Option<usize>>;
    fn delete(&self, txn: Option<&dyn Txn>, key: &[u8]) -> Result<()>;
    fn probe_key(&self, txn: Option<&dyn Txn>, key: &[u8]) -> Result<bool>;

    /// Delete every key with the given prefix. Used for ident drop and
    /// oplog block reclamation.
    fn prefix_delete(&self, txn: Option<&dyn Txn>, prefix: &[u8]) -> Result<()>;
    /// Report whether zero, one, or many keys carry the given prefix.
    fn prefix_probe(&self, txn: Option<&dyn Txn>, prefix: &[u8]) -> Result<ProbeCount>;

    fn new_cursor(
        &self,
        txn: Option<&dyn Txn>,
        prefix: &[u8],
        dir: Direction,
    ) -> Result<Box<dyn Cursor>>;

    fn sync(&self) -> Result<()>;
}
