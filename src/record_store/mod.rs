//! Record-store family: base (non-capped), capped, and oplog, sharing the
//! same CRUD surface over chunked values stored under `prefix ‖ record-id`
//! keys.
//!
//! Modeled as a small trait the three variants implement independently
//! rather than one struct branching on a kind tag: capped and oplog each
//! need hooks (cap-eviction, block-manager bookkeeping) that don't belong
//! on the base store's public surface.

pub mod base;
pub mod capped;
pub mod oplog;
pub mod block_manager;

pub use base::BaseStore;
pub use capped::CappedStore;
pub use oplog::OplogStore;

use crate::{
    kvs::{Cursor, Direction},
    recovery_unit::RecoveryUnit,
    types::{CompAlgo, Loc, Prefix},
    Result,
};

/// Upper bound on records reclaimed by one capped-eviction or oplog-block
/// reclamation pass, bounding the latency a single insert can incur.
pub const MAX_RECLAIM_PER_PASS: usize = 20_000;

/// The three record-store kinds share this surface. `update` and `delete`
/// are fallible in ways specific to each kind (e.g. an oplog entry cannot
/// change length), hence `Result` throughout rather than a narrower
/// capped/oplog-only error type.
pub trait RecordStore {
    fn insert(&self, ru: &RecoveryUnit, data: &[u8]) -> Result<Loc>;
    fn update(&self, ru: &RecoveryUnit, loc: Loc, data: &[u8]) -> Result<()>;
    fn delete(&self, ru: &RecoveryUnit, loc: Loc) -> Result<()>;
    fn find(&self, ru: &RecoveryUnit, loc: Loc) -> Result<Option<Vec<u8>>>;
    fn get_cursor(&self, ru: &RecoveryUnit, dir: Direction) -> Result<Box<dyn Cursor>>;
    fn truncate(&self, ru: &RecoveryUnit) -> Result<()>;
    fn prefix(&self) -> Prefix;
}

/// Compression/config knobs shared by every record-store variant, sourced
/// from the owning ident's persisted config.
#[derive(Copy, Clone, Debug)]
pub struct StoreConfig {
    pub compression: CompAlgo,
}

impl Default for StoreConfig {
    fn default() -> StoreConfig {
        StoreConfig { compression: CompAlgo::None }
    }
}

/// Build the 12-byte master key for a record: `prefix ‖ record-id`.
pub(crate) fn master_key(prefix: Prefix, id: crate::types::RecordId) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&prefix.to_be_bytes());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Build an overflow-chunk key: `master-key ‖ chunk-index`.
pub(crate) fn chunk_key(master: &[u8], index: u8) -> Vec<u8> {
    let mut key = master.to_vec();
    key.push(index);
    key
}

/// True iff `key` is a master key (12 bytes: 4-byte prefix ‖ 8-byte record
/// id) as opposed to a chunk-overflow suffix key.
pub(crate) fn is_master_key(key: &[u8]) -> bool {
    key.len() == 12
}

pub(crate) fn record_id_of_master_key(key: &[u8]) -> crate::types::RecordId {
    crate::types::RecordId::from_be_bytes(&key[4..12])
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
