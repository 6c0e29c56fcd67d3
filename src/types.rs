//! Key-space primitives shared by every subsystem: the 4-byte ident prefix,
//! record ids, the oplog's prefix‖block-id key head, and the small closed
//! set of ident kinds and compression algorithms named in an ident's
//! config blob.

use std::{convert::TryInto, fmt};

/// A fresh monotonic prefix allocated per ident, identifying the logical
/// collection or index a key belongs to.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Prefix(pub u32);

impl Prefix {
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(buf: &[u8]) -> Prefix {
        Prefix(u32::from_be_bytes(buf[..4].try_into().unwrap()))
    }

    pub fn next(self) -> Prefix {
        Prefix(self.0 + 1)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// A record id: strictly increasing within a record store, big-endian
/// encoded so that lexicographic key order matches numeric order.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(buf: &[u8]) -> RecordId {
        RecordId(u64::from_be_bytes(buf[..8].try_into().unwrap()))
    }

    pub fn next(self) -> RecordId {
        RecordId(self.0 + 1)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 4-byte big-endian block id partitioning an oplog into contiguous,
/// prefix-deletable ranges.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    /// First block id ever allocated for a fresh oplog; lower ids are
    /// reserved as sentinels.
    pub const START: BlockId = BlockId(5);

    /// Sentinel block id used only for the `last_blk_del` and
    /// `current_blk` marker keys; never assigned to real data.
    pub const SENTINEL: BlockId = BlockId(0xFFFF_FFFF);

    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(buf: &[u8]) -> BlockId {
        BlockId(u32::from_be_bytes(buf[..4].try_into().unwrap()))
    }

    pub fn next(self) -> BlockId {
        BlockId(self.0 + 1)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Opaque handle a record store returns from `insert`/`update` to identify
/// a stored record. Wraps the record id together with the ident it belongs
/// to so a `find`/`delete` can reconstruct the master key without a
/// separate ident lookup.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Loc {
    pub prefix: Prefix,
    pub id: RecordId,
}

impl Loc {
    pub fn new(prefix: Prefix, id: RecordId) -> Loc {
        Loc { prefix, id }
    }
}

/// The kind of ident a prefix was allocated for, persisted in its config
/// blob. Determines which key-space layout and invariants apply.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IdentKind {
    Collection,
    StdIndex,
    UniqIndex,
    Oplog,
}

/// Compression algorithm byte prefixing a chunked value's LEB128 length
/// field. Closed set by design: the framing is specified here, the codec
/// itself is out of scope.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompAlgo {
    None = 0,
    Zstd = 1,
}

impl CompAlgo {
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<CompAlgo> {
        match b {
            0 => Some(CompAlgo::None),
            1 => Some(CompAlgo::Zstd),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
