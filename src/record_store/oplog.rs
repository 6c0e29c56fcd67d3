//! Oplog record store: block-partitioned storage with reader visibility
//! gated by a persist boundary, built on [`BlockManager`] for block
//! bookkeeping and [`VisibilityManager`] for ordering.
//!
//! Unlike the base/capped stores, the host supplies the record id on
//! insert (encoded from a timestamp) rather than letting the store
//! allocate one, so [`OplogStore`] exposes `insert` directly rather than
//! going through the shared [`RecordStore`] trait for that operation;
//! the trait impl exists for the CRUD surface the rest of the crate
//! shares (`find`/`delete`/cursor/truncate).
//!
//! The background condition-variable-driven reclamation loop itself lives
//! above this module (it owns the catalog of live oplogs); `reclaim_once`
//! is the unit of work such a loop drives, one excess block at a time.

use std::convert::TryInto;
use std::sync::Arc;

use crate::{
    counter::CounterManager,
    kvs::{Cursor, Direction, KVEngine, VMAX},
    record_store::{
        base::{DATASIZE, NUMRECORDS},
        block_manager::{block_key_prefix, BlockManager},
        chunk_key, RecordStore,
    },
    recovery_unit::{Change, RecoveryUnit},
    types::{BlockId, Loc, Prefix, RecordId},
    value_framing::{chunk_count, frame, unframe, VALUE_META_SIZE},
    visibility::{Registration, VisibilityManager},
    Result,
};

/// Build the 16-byte oplog key: `ident-prefix ‖ block-id ‖ record-id`.
fn oplog_key(prefix: Prefix, block_id: BlockId, id: RecordId) -> Vec<u8> {
    let mut key = block_key_prefix(prefix, block_id).to_vec();
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// True iff `key` is an oplog master key (16 bytes) rather than a
/// chunk-overflow suffix key.
fn is_master_key(key: &[u8]) -> bool {
    key.len() == 16
}

fn record_id_of_oplog_key(key: &[u8]) -> RecordId {
    RecordId::from_be_bytes(&key[8..16])
}

struct VisibilityChange {
    visibility: Arc<VisibilityManager>,
    registration: Registration,
}

impl Change for VisibilityChange {
    fn on_commit(self: Box<Self>) {
        self.visibility.resolve(self.registration, true);
    }

    fn on_rollback(self: Box<Self>) {
        self.visibility.resolve(self.registration, false);
    }
}

pub struct OplogStore {
    prefix: Prefix,
    engine: Arc<dyn KVEngine>,
    blocks: Arc<BlockManager>,
    visibility: Arc<VisibilityManager>,
}

impl OplogStore {
    pub fn new(
        prefix: Prefix,
        engine: Arc<dyn KVEngine>,
        blocks: Arc<BlockManager>,
        visibility: Arc<VisibilityManager>,
    ) -> OplogStore {
        OplogStore { prefix, engine, blocks, visibility }
    }

    pub fn visibility(&self) -> &Arc<VisibilityManager> {
        &self.visibility
    }

    pub fn blocks(&self) -> &Arc<BlockManager> {
        &self.blocks
    }

    fn total_len_of(&self, master_value: &[u8]) -> u32 {
        u32::from_be_bytes(master_value[..VALUE_META_SIZE].try_into().unwrap())
    }

    fn write_chunks(&self, ru: &RecoveryUnit, master: &[u8], data: &[u8]) -> Result<()> {
        for chunk in frame(data, None) {
            let key = if chunk.index == 0 { master.to_vec() } else { chunk_key(master, chunk.index) };
            ru.put(&key, &chunk.bytes)?;
        }
        Ok(())
    }

    fn read_record(&self, ru: &RecoveryUnit, master: &[u8], master_value: Vec<u8>) -> Result<Vec<u8>> {
        let n_chunks = chunk_count(self.total_len_of(&master_value) as usize, VMAX);
        if n_chunks == 0 {
            let (_, bytes) = unframe(&[master_value], false)?;
            return Ok(bytes);
        }
        let mut parts = vec![master_value];
        for idx in 1..=n_chunks {
            match ru.get(&chunk_key(master, idx as u8))? {
                Some(bytes) => parts.push(bytes),
                None => crate::fatal!("missing oplog overflow chunk {} under {:?}", idx, master),
            }
        }
        let (_, bytes) = unframe(&parts, false)?;
        Ok(bytes)
    }

    /// Insert `data` under the host-supplied `id`. Registers `id` as
    /// uncommitted with the visibility manager and a matching recovery-
    /// unit change that resolves it on commit/abort, per the oplog
    /// insert steps: register uncommitted, select target block, write
    /// the value, then register the commit/rollback change.
    pub fn insert(&self, ru: &RecoveryUnit, id: RecordId, data: &[u8]) -> Result<Loc> {
        let registration = self.visibility.add_uncommitted(id);
        let block_id = self.blocks.target_block(id);
        let master = oplog_key(self.prefix, block_id, id);

        self.write_chunks(ru, &master, data)?;
        self.blocks.note_insert(ru, block_id, id, data.len() as u64)?;

        ru.increment_counter(self.prefix, NUMRECORDS, 1);
        ru.increment_counter(self.prefix, DATASIZE, data.len() as i64);
        ru.register_change(Box::new(VisibilityChange { visibility: Arc::clone(&self.visibility), registration }));
        Ok(Loc::new(self.prefix, id))
    }

    /// A forward cursor gated by the current persist boundary: no entry
    /// with id at or beyond the boundary is ever surfaced, matching the
    /// ordering rule that the boundary must be read *before* the
    /// underlying cursor is created.
    pub fn tailable_cursor(&self, ru: &RecoveryUnit) -> Result<TailableCursor> {
        let boundary = self.visibility.persist_boundary();
        let inner = ru.begin_scan(&self.prefix.to_be_bytes(), Direction::Forward)?;
        Ok(TailableCursor { inner, boundary })
    }

    /// Block a tailing reader that has drained every entry below
    /// `waiting_for`'s visibility, until either the oplog fully quiesces or
    /// the persist boundary advances past `waiting_for`, then return so the
    /// caller can re-read [`VisibilityManager::persist_boundary`] and open
    /// a fresh [`OplogStore::tailable_cursor`].
    pub fn wait_for_visible(&self, waiting_for: RecordId) -> Result<()> {
        self.visibility.wait_for_all_visible(waiting_for)
    }

    /// Reclaim the single oldest excess block, if any, in its own nested
    /// transaction (the block's keys and last-deleted marker are handled
    /// by [`BlockManager::reclaim_oldest`]); fold the block's aggregated
    /// totals into the host-facing counters. Returns `Ok(None)` if there
    /// was nothing to reclaim. A write conflict on the nested commit is
    /// swallowed; the caller's loop tries again on its next wakeup.
    pub fn reclaim_once(&self, counters: &CounterManager) -> Result<Option<(RecordId, u64)>> {
        if !self.blocks.has_excess_blocks() {
            return Ok(None);
        }
        let nested = RecoveryUnit::new(Arc::clone(&self.engine));
        let marker = match self.blocks.reclaim_oldest(&nested)? {
            Some(m) => m,
            None => return Ok(None),
        };
        nested.increment_counter(self.prefix, NUMRECORDS, -(marker.num_recs as i64));
        nested.increment_counter(self.prefix, DATASIZE, -(marker.size as i64));
        match nested.commit(counters) {
            Ok(()) => Ok(Some((marker.highest_rec, marker.num_recs))),
            Err(e) if e.is_write_conflict() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove every record with id `> end` (or `>= end` if `inclusive`):
    /// scan-delete the matching tail of the block containing the
    /// boundary, prefix-delete every following whole block, adjust
    /// counters by the aggregated totals, and rewind the visibility
    /// manager's highest-seen.
    pub fn truncate_after(&self, ru: &RecoveryUnit, end: RecordId, inclusive: bool) -> Result<()> {
        let boundary = if inclusive { end } else { end.next() };
        // Fully-contained blocks are already prefix-deleted by
        // `BlockManager::truncate_after`; only their totals need folding
        // into the counters here.
        let removed_whole = self.blocks.truncate_after(ru, end, inclusive)?;
        let mut removed_records = 0_i64;
        let mut removed_bytes = 0_i64;
        for marker in &removed_whole {
            removed_records += marker.num_recs as i64;
            removed_bytes += marker.size as i64;
        }

        let partial_block = self.blocks.target_block(boundary);
        let partial_prefix = block_key_prefix(self.prefix, partial_block);
        let mut cursor = ru.begin_scan(&partial_prefix, Direction::Forward)?;
        let mut highest_kept: Option<RecordId> = None;
        let mut kept_size = 0_u64;
        let mut kept_count = 0_u64;
        loop {
            let (key, value) = match cursor.read()? {
                Some(entry) => entry,
                None => break,
            };
            if !is_master_key(&key) {
                cursor.advance()?;
                continue;
            }
            let id = record_id_of_oplog_key(&key);
            if id >= boundary {
                let total_len = self.total_len_of(&value) as usize;
                let n_chunks = chunk_count(total_len, VMAX);
                ru.del(&key)?;
                for idx in 1..=n_chunks {
                    ru.del(&chunk_key(&key, idx as u8))?;
                }
                removed_records += 1;
                removed_bytes += total_len as i64;
            } else {
                highest_kept = Some(id);
                kept_size += self.total_len_of(&value) as u64;
                kept_count += 1;
            }
            cursor.advance()?;
        }

        ru.increment_counter(self.prefix, NUMRECORDS, -removed_records);
        ru.increment_counter(self.prefix, DATASIZE, -removed_bytes);

        let below_boundary = if boundary.0 == 0 { RecordId(0) } else { RecordId(boundary.0 - 1) };
        let marker = match highest_kept {
            Some(highest) => {
                crate::record_store::block_manager::BlockMarker { block_id: partial_block, highest_rec: highest, size: kept_size, num_recs: kept_count }
            }
            None => {
                crate::record_store::block_manager::BlockMarker { block_id: partial_block, highest_rec: below_boundary, size: 0, num_recs: 0 }
            }
        };
        if partial_block == self.blocks.current_block_id() {
            self.blocks.reset_current(marker);
        } else {
            self.blocks.update_sealed_marker(ru, marker)?;
        }
        self.blocks.checkpoint_current(ru)?;
        self.visibility.rewind_to(boundary);
        Ok(())
    }
}

impl RecordStore for OplogStore {
    /// Not supported: the oplog always requires a caller-supplied id, see
    /// [`OplogStore::insert`].
    fn insert(&self, _ru: &RecoveryUnit, _data: &[u8]) -> Result<Loc> {
        err_at!(InvalidOperation, msg: "oplog records require a caller-supplied id; call OplogStore::insert")
    }

    /// Oplog entries are fixed-length: `data.len()` must equal the
    /// existing record's length, or `Error::InvalidOperation` is raised.
    fn update(&self, ru: &RecoveryUnit, loc: Loc, data: &[u8]) -> Result<()> {
        let block_id = self.blocks.target_block(loc.id);
        let master = oplog_key(loc.prefix, block_id, loc.id);
        let old = match ru.get(&master)? {
            Some(v) => v,
            None => return err_at!(KeyNotFound, msg: "oplog record {} not found for update", loc.id),
        };
        let old_len = self.total_len_of(&old) as usize;
        if data.len() != old_len {
            return err_at!(
                InvalidOperation,
                msg: "oplog update must preserve length: had {}, got {}", old_len, data.len()
            );
        }
        self.write_chunks(ru, &master, data)
    }

    fn delete(&self, ru: &RecoveryUnit, loc: Loc) -> Result<()> {
        let block_id = self.blocks.target_block(loc.id);
        let master = oplog_key(loc.prefix, block_id, loc.id);
        let old = match ru.get(&master)? {
            Some(v) => v,
            None => return err_at!(KeyNotFound, msg: "oplog record {} not found for delete", loc.id),
        };
        let old_len = self.total_len_of(&old) as usize;
        let old_chunk_count = chunk_count(old_len, VMAX);
        ru.del(&master)?;
        for idx in 1..=old_chunk_count {
            ru.del(&chunk_key(&master, idx as u8))?;
        }
        ru.increment_counter(self.prefix, NUMRECORDS, -1);
        ru.increment_counter(self.prefix, DATASIZE, -(old_len as i64));
        Ok(())
    }

    fn find(&self, ru: &RecoveryUnit, loc: Loc) -> Result<Option<Vec<u8>>> {
        let block_id = self.blocks.target_block(loc.id);
        let master = oplog_key(loc.prefix, block_id, loc.id);
        let value = match ru.get(&master)? {
            Some(v) => v,
            None => return Ok(None),
        };
        Ok(Some(self.read_record(ru, &master, value)?))
    }

    fn get_cursor(&self, ru: &RecoveryUnit, dir: Direction) -> Result<Box<dyn Cursor>> {
        ru.begin_scan(&self.prefix.to_be_bytes(), dir)
    }

    fn truncate(&self, ru: &RecoveryUnit) -> Result<()> {
        ru.prefix_delete(&self.prefix.to_be_bytes())?;
        self.visibility.rewind_to(RecordId(0));
        Ok(())
    }

    fn prefix(&self) -> Prefix {
        self.prefix
    }
}

/// A forward oplog cursor that filters out any entry at or beyond the
/// persist boundary captured at construction time.
pub struct TailableCursor {
    inner: Box<dyn Cursor>,
    boundary: RecordId,
}

impl TailableCursor {
    pub fn read(&mut self) -> Result<Option<(RecordId, Vec<u8>)>> {
        loop {
            match self.inner.read()? {
                Some((key, value)) if is_master_key(&key) => {
                    let id = record_id_of_oplog_key(&key);
                    return if id < self.boundary { Ok(Some((id, value))) } else { Ok(None) };
                }
                Some(_) => self.inner.advance()?,
                None => return Ok(None),
            }
        }
    }

    pub fn advance(&mut self) -> Result<()> {
        self.inner.advance()
    }

    pub fn restore(&mut self) -> Result<()> {
        self.inner.restore()
    }
}

#[cfg(test)]
#[path = "oplog_test.rs"]
mod oplog_test;
