//! Oplog block bookkeeping: markers, the active-block deque, reclamation,
//! and startup recovery.
//!
//! An oplog key is `ident-prefix (4) ‖ block-id (4) ‖ record-id (8)`: the
//! block id partitions the oplog into contiguous ranges so a reclaim pass
//! is one prefix-delete. Block metadata itself lives under two kinds of
//! marker key: a per-block marker (`ident-prefix ‖ block-id`) and two
//! sentinel-block-id markers (`last_blk_del`, `current_blk`) that never
//! hold real data.

use std::convert::TryInto;
use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex},
};

use crate::{
    kvs::{Cursor, Direction, KVEngine},
    recovery_unit::RecoveryUnit,
    types::{BlockId, Prefix, RecordId},
    value_framing::VALUE_META_SIZE,
    Result,
};

/// Suffix literal for the current-block marker key, appended after the
/// sentinel block id.
const CURRENT_BLK_SUFFIX: &[u8] = b"current_blk";
/// Suffix literal for the last-deleted-block marker key.
const LAST_BLK_DEL_SUFFIX: &[u8] = b"last_blk_del";

/// On-disk encoding of one block's metadata: 28 bytes, all big-endian.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockMarker {
    pub block_id: BlockId,
    pub highest_rec: RecordId,
    pub size: u64,
    pub num_recs: u64,
}

impl BlockMarker {
    fn encode(&self) -> [u8; 28] {
        let mut buf = [0_u8; 28];
        buf[0..4].copy_from_slice(&self.block_id.to_be_bytes());
        buf[4..12].copy_from_slice(&self.highest_rec.to_be_bytes());
        buf[12..20].copy_from_slice(&self.size.to_be_bytes());
        buf[20..28].copy_from_slice(&self.num_recs.to_be_bytes());
        buf
    }

    fn decode(buf: &[u8]) -> Result<BlockMarker> {
        if buf.len() != 28 {
            return err_at!(FailConvert, msg: "block marker length {} != 28", buf.len());
        }
        Ok(BlockMarker {
            block_id: BlockId::from_be_bytes(&buf[0..4]),
            highest_rec: RecordId::from_be_bytes(&buf[4..12]),
            size: u64::from_be_bytes(buf[12..20].try_into().unwrap()),
            num_recs: u64::from_be_bytes(buf[20..28].try_into().unwrap()),
        })
    }
}

/// Operator knobs for block sizing and the reclaim target range.
#[derive(Copy, Clone, Debug)]
pub struct Config {
    pub min_bytes_per_block: u64,
    pub min_blocks: usize,
    pub max_blocks: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config { min_bytes_per_block: 16 * 1024 * 1024, min_blocks: 10, max_blocks: 100 }
    }
}

impl Config {
    /// `max_blocks`, raised to `min_blocks` if a caller configured an
    /// inconsistent pair. Production callers get the 10-100 range via
    /// [`Config::default`]; this only guards against a nonsensical
    /// custom config, not against a deliberately small test config.
    fn clamped_max_blocks(&self) -> usize {
        self.max_blocks.max(self.min_blocks)
    }
}

struct State {
    /// Fully closed, durable blocks, oldest first.
    deque: VecDeque<BlockMarker>,
    current: BlockMarker,
}

/// Build the 8-byte key prefix an oplog entry/marker lives under:
/// `ident-prefix ‖ block-id`.
pub fn block_key_prefix(ident_prefix: Prefix, block_id: BlockId) -> [u8; 8] {
    let mut out = [0_u8; 8];
    out[0..4].copy_from_slice(&ident_prefix.to_be_bytes());
    out[4..8].copy_from_slice(&block_id.to_be_bytes());
    out
}

fn marker_key(ident_prefix: Prefix, block_id: BlockId) -> Vec<u8> {
    block_key_prefix(ident_prefix, block_id).to_vec()
}

fn sentinel_key(ident_prefix: Prefix, suffix: &[u8]) -> Vec<u8> {
    let mut key = block_key_prefix(ident_prefix, BlockId::SENTINEL).to_vec();
    key.extend_from_slice(suffix);
    key
}

/// Manages the oplog's block deque: marker reads/writes, the reclaim
/// condition variable, and startup recovery.
pub struct BlockManager {
    ident_prefix: Prefix,
    config: Config,
    state: Mutex<State>,
    cond: Condvar,
}

impl BlockManager {
    /// Recover block-manager state at open time:
    /// 1. read the last-deleted-block marker, first active block is one
    ///    past it (or [`BlockId::START`] if absent);
    /// 2. read consecutive block markers from there into the deque;
    /// 3. read the current-block key if present, else start a fresh
    ///    current block past the last marker seen;
    /// 4. erase the current-block key so a later clean shutdown rewrites
    ///    fresh state.
    pub fn open(ru: &RecoveryUnit, ident_prefix: Prefix, config: Config) -> Result<BlockManager> {
        let first_active = match ru.get(&sentinel_key(ident_prefix, LAST_BLK_DEL_SUFFIX))? {
            Some(buf) => BlockId::from_be_bytes(&buf).next(),
            None => BlockId::START,
        };

        let mut deque = VecDeque::new();
        let mut next_block = first_active;
        loop {
            match ru.get(&marker_key(ident_prefix, next_block))? {
                Some(buf) => {
                    deque.push_back(BlockMarker::decode(&buf)?);
                    next_block = next_block.next();
                }
                None => break,
            }
        }

        let current = match ru.get(&sentinel_key(ident_prefix, CURRENT_BLK_SUFFIX))? {
            Some(buf) => BlockMarker::decode(&buf)?,
            None => Self::reconstruct_current_block(ru, ident_prefix, next_block)?,
        };
        ru.del(&sentinel_key(ident_prefix, CURRENT_BLK_SUFFIX))?;

        Ok(BlockManager {
            ident_prefix,
            config,
            state: Mutex::new(State { deque, current }),
            cond: Condvar::new(),
        })
    }

    /// Rebuild a current-block marker by forward-scanning its key range,
    /// used when the crash happened before a clean-shutdown checkpoint
    /// ever wrote one: the data itself is already durable (it was written
    /// directly via `ru.put`), only the marker's aggregated bookkeeping is
    /// missing. Counts every master-key record, tracking the highest
    /// record id seen and summing each record's total length out of its
    /// value-framing header.
    fn reconstruct_current_block(ru: &RecoveryUnit, ident_prefix: Prefix, block_id: BlockId) -> Result<BlockMarker> {
        let prefix = block_key_prefix(ident_prefix, block_id);
        let mut cursor = ru.begin_scan(&prefix, Direction::Forward)?;
        let mut highest_rec = RecordId(0);
        let mut size = 0_u64;
        let mut num_recs = 0_u64;
        loop {
            match cursor.read()? {
                Some((key, value)) => {
                    if key.len() == 16 {
                        let id = RecordId::from_be_bytes(&key[8..16]);
                        highest_rec = highest_rec.max(id);
                        size += u32::from_be_bytes(value[..VALUE_META_SIZE].try_into().unwrap()) as u64;
                        num_recs += 1;
                    }
                    cursor.advance()?;
                }
                None => break,
            }
        }
        Ok(BlockMarker { block_id, highest_rec, size, num_recs })
    }

    /// Persist the current-block marker, used on clean shutdown so the
    /// next open can skip the forward-scan reconstruction.
    pub fn checkpoint_current(&self, ru: &RecoveryUnit) -> Result<()> {
        let st = self.state.lock().unwrap();
        ru.put_direct(&sentinel_key(self.ident_prefix, CURRENT_BLK_SUFFIX), &st.current.encode())
    }

    pub fn current_block_id(&self) -> BlockId {
        self.state.lock().unwrap().current.block_id
    }

    pub fn highest_rec(&self) -> RecordId {
        let st = self.state.lock().unwrap();
        match st.deque.back() {
            Some(m) if m.highest_rec > st.current.highest_rec => m.highest_rec,
            _ => st.current.highest_rec,
        }
    }

    /// Choose the block an insert of `id` should land in: normally the
    /// current block, unless `id` falls at or before an older block's
    /// `highest_rec` (an out-of-order / rollback insert).
    pub fn target_block(&self, id: RecordId) -> BlockId {
        let st = self.state.lock().unwrap();
        for marker in &st.deque {
            if id <= marker.highest_rec {
                return marker.block_id;
            }
        }
        st.current.block_id
    }

    /// Record a successful insert of `size` bytes at `id` into `block_id`,
    /// then roll to a fresh block if the current block has grown past
    /// `min_bytes_per_block`. Returns the marker written for a closed
    /// block, if rolling occurred, so the caller can persist it.
    pub fn note_insert(&self, ru: &RecoveryUnit, block_id: BlockId, id: RecordId, size: u64) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        if block_id == st.current.block_id {
            st.current.highest_rec = st.current.highest_rec.max(id);
            st.current.size += size;
            st.current.num_recs += 1;

            if st.current.size >= self.config.min_bytes_per_block {
                self.assert_strict_ordering(&st.deque, &st.current);
                ru.put_direct(&marker_key(self.ident_prefix, st.current.block_id), &st.current.encode())?;
                let closed = st.current;
                st.deque.push_back(closed);
                st.current = BlockMarker {
                    block_id: closed.block_id.next(),
                    highest_rec: RecordId(0),
                    size: 0,
                    num_recs: 0,
                };
            }
        } else {
            for marker in st.deque.iter_mut() {
                if marker.block_id == block_id {
                    marker.highest_rec = marker.highest_rec.max(id);
                    marker.size += size;
                    marker.num_recs += 1;
                    break;
                }
            }
        }
        self.cond.notify_all();
        Ok(())
    }

    /// A freshly closed block's `highest_rec` must be strictly below the
    /// next (current) block's lowest-seen id, checked against only the one
    /// block immediately behind it — or the oplog is corrupt.
    fn assert_strict_ordering(&self, deque: &VecDeque<BlockMarker>, closing: &BlockMarker) {
        if let Some(prev) = deque.back() {
            if prev.block_id >= closing.block_id || prev.highest_rec >= closing.highest_rec {
                crate::fatal!(
                    "oplog block ordering violated: prev block {} (highest {}) vs closing block {} (highest {})",
                    prev.block_id, prev.highest_rec.0, closing.block_id, closing.highest_rec.0
                );
            }
        }
    }

    /// True if the deque holds more blocks than the configured (clamped)
    /// maximum — the reclaim thread's wake condition.
    pub fn has_excess_blocks(&self) -> bool {
        self.state.lock().unwrap().deque.len() > self.config.clamped_max_blocks()
    }

    pub fn notify_reclaim_check(&self) {
        self.cond.notify_all();
    }

    /// Reclaim the oldest excess block: prefix-delete its key range in
    /// both the main and chunk-overflow oplog key spaces, record it as
    /// the new last-deleted-block, and pop it from the deque. Returns the
    /// reclaimed marker (for counter adjustment) or `None` if there was
    /// nothing to reclaim.
    pub fn reclaim_oldest(&self, ru: &RecoveryUnit) -> Result<Option<BlockMarker>> {
        let to_reclaim = {
            let st = self.state.lock().unwrap();
            if st.deque.len() <= self.config.clamped_max_blocks() {
                return Ok(None);
            }
            *st.deque.front().unwrap()
        };

        ru.prefix_delete(&block_key_prefix(self.ident_prefix, to_reclaim.block_id))?;
        ru.del(&marker_key(self.ident_prefix, to_reclaim.block_id))?;
        ru.put_direct(&sentinel_key(self.ident_prefix, LAST_BLK_DEL_SUFFIX), &to_reclaim.block_id.to_be_bytes())?;

        let mut st = self.state.lock().unwrap();
        st.deque.pop_front();
        Ok(Some(to_reclaim))
    }

    /// Remove blocks wholly past `end` (`> end`, or `>= end` if
    /// `inclusive`): every closed block whose entire range lies at or
    /// beyond the boundary is prefix-deleted and popped from the deque.
    /// The block containing the boundary itself (partial truncation) is
    /// left for the caller, which must scan and delete its trailing
    /// records individually, then call [`BlockManager::reset_current`].
    /// Returns the fully removed markers, for counter adjustment.
    pub fn truncate_after(&self, ru: &RecoveryUnit, end: RecordId, inclusive: bool) -> Result<Vec<BlockMarker>> {
        let boundary = if inclusive { end } else { end.next() };
        let mut removed = Vec::new();
        let mut st = self.state.lock().unwrap();

        while let Some(marker) = st.deque.back() {
            let lowest_rec = st
                .deque
                .iter()
                .rev()
                .skip_while(|m| m.block_id != marker.block_id)
                .nth(1)
                .map(|m| m.highest_rec.next())
                .unwrap_or(RecordId(0));
            if lowest_rec >= boundary {
                let marker = *marker;
                ru.prefix_delete(&block_key_prefix(self.ident_prefix, marker.block_id))?;
                ru.del(&marker_key(self.ident_prefix, marker.block_id))?;
                st.deque.pop_back();
                removed.push(marker);
            } else {
                break;
            }
        }

        if st.current.num_recs > 0 {
            let current_lowest = st.deque.back().map(|m| m.highest_rec.next()).unwrap_or(RecordId(0));
            if current_lowest >= boundary {
                ru.prefix_delete(&block_key_prefix(self.ident_prefix, st.current.block_id))?;
                removed.push(st.current);
                st.current = BlockMarker {
                    block_id: st.current.block_id,
                    highest_rec: if boundary.0 == 0 { RecordId(0) } else { RecordId(boundary.0 - 1) },
                    size: 0,
                    num_recs: 0,
                };
            }
        }

        Ok(removed)
    }

    /// Overwrite the current (in-progress) block's metadata after the
    /// caller has finished selectively deleting its trailing records
    /// during a partial-block truncation.
    pub fn reset_current(&self, marker: BlockMarker) {
        self.state.lock().unwrap().current = marker;
    }

    /// Overwrite a sealed (already-closed) block's persisted marker and
    /// in-memory deque entry, used when a partial-block truncation lands
    /// inside a closed block rather than the live current block.
    pub fn update_sealed_marker(&self, ru: &RecoveryUnit, marker: BlockMarker) -> Result<()> {
        ru.put_direct(&marker_key(self.ident_prefix, marker.block_id), &marker.encode())?;
        let mut st = self.state.lock().unwrap();
        for m in st.deque.iter_mut() {
            if m.block_id == marker.block_id {
                *m = marker;
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "block_manager_test.rs"]
mod block_manager_test;
