//! Non-capped record store: allocate-on-insert record ids, chunked value
//! storage, and counter-tracked `numrecords`/`datasize` totals.

use std::convert::TryInto;
use std::sync::atomic::{AtomicU64, Ordering::SeqCst};

use crate::{
    counter::CounterManager,
    kvs::{Cursor, Direction, VMAX},
    record_store::{chunk_key, is_master_key, master_key, record_id_of_master_key, RecordStore, StoreConfig},
    recovery_unit::RecoveryUnit,
    types::{CompAlgo, Loc, Prefix, RecordId},
    value_framing::{frame, unframe, VALUE_META_SIZE},
    Result,
};

pub const NUMRECORDS: &str = "numrecords";
pub const DATASIZE: &str = "datasize";

/// CRUD over an ident's `prefix ‖ record-id` key space with chunked
/// overflow storage for values larger than [`crate::kvs::VMAX`].
pub struct BaseStore {
    prefix: Prefix,
    next_id: AtomicU64,
    config: StoreConfig,
}

impl BaseStore {
    /// Open (or create) a base store at `prefix`, seeding the record-id
    /// allocator from the highest extant id via a reverse cursor rather
    /// than a separate persisted counter.
    pub fn open(ru: &RecoveryUnit, prefix: Prefix, config: StoreConfig) -> Result<BaseStore> {
        let mut cursor = ru.begin_scan(&prefix.to_be_bytes(), Direction::Reverse)?;
        let highest = loop {
            match cursor.read()? {
                Some((key, _)) if is_master_key(&key) => break Some(record_id_of_master_key(&key)),
                Some(_) => cursor.advance()?,
                None => break None,
            }
        };
        let next = highest.map(|h| h.next().0).unwrap_or(0);
        Ok(BaseStore { prefix, next_id: AtomicU64::new(next), config })
    }

    /// Register this store's counters with `counters`, seeded from their
    /// last persisted values (0 if this is a fresh ident).
    pub fn register_counters(&self, counters: &CounterManager, numrecords: i64, datasize: i64) {
        counters.register(self.prefix, NUMRECORDS, numrecords);
        counters.register(self.prefix, DATASIZE, datasize);
    }

    pub fn compression(&self) -> crate::types::CompAlgo {
        self.config.compression
    }

    fn total_len_of(&self, master_value: &[u8]) -> u32 {
        u32::from_be_bytes(master_value[..VALUE_META_SIZE].try_into().unwrap())
    }

    /// Compress `data` per this store's configured algorithm, frame it, and
    /// write every resulting chunk. Overflow-chunk *count* depends on the
    /// framed (post-compression) byte length, which the master header alone
    /// doesn't record, so any stale chunk left behind by a shrinking update
    /// is cleaned up by probing forward from the last index just written
    /// rather than by recomputing a count from the header.
    fn write_chunks(&self, ru: &RecoveryUnit, master: &[u8], data: &[u8]) -> Result<()> {
        let compressed = match self.config.compression {
            CompAlgo::None => None,
            CompAlgo::Zstd => Some(err_at!(FailConvert, zstd::encode_all(data, 0))?),
        };
        let chunks = match &compressed {
            Some(bytes) => frame(data, Some((CompAlgo::Zstd, bytes))),
            None => frame(data, None),
        };
        let written = chunks.len() as u8;
        for chunk in chunks {
            let key = if chunk.index == 0 { master.to_vec() } else { chunk_key(master, chunk.index) };
            ru.put(&key, &chunk.bytes)?;
        }
        self.delete_overflow_from(ru, master, written)
    }

    /// Delete overflow-chunk keys starting at `from_index`, stopping at the
    /// first index that doesn't exist.
    fn delete_overflow_from(&self, ru: &RecoveryUnit, master: &[u8], from_index: u8) -> Result<()> {
        let mut idx = from_index;
        while ru.probe_key(&chunk_key(master, idx))? {
            ru.del(&chunk_key(master, idx))?;
            match idx.checked_add(1) {
                Some(next) => idx = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Read every physical chunk under `master`, walking overflow indices
    /// until one is missing rather than trusting a length-derived count —
    /// the only way to know the true chunk count when compression may have
    /// shrunk the framed payload below what the uncompressed length implies.
    fn read_all_chunks(&self, ru: &RecoveryUnit, master: &[u8], master_value: Vec<u8>) -> Result<Vec<u8>> {
        let mut parts = vec![master_value];
        let mut idx = 1_u8;
        while let Some(bytes) = ru.get(&chunk_key(master, idx))? {
            parts.push(bytes);
            idx = match idx.checked_add(1) {
                Some(next) => next,
                None => crate::fatal!("overflow chunk index overflowed for record under {:?}", master),
            };
        }
        let active = self.config.compression != CompAlgo::None;
        let (algo, payload) = unframe(&parts, active)?;
        match algo {
            Some(CompAlgo::Zstd) => err_at!(FailConvert, zstd::decode_all(payload.as_slice())),
            Some(CompAlgo::None) | None => Ok(payload),
        }
    }
}

impl RecordStore for BaseStore {
    fn insert(&self, ru: &RecoveryUnit, data: &[u8]) -> Result<Loc> {
        let id = RecordId(self.next_id.fetch_add(1, SeqCst));
        let master = master_key(self.prefix, id);
        self.write_chunks(ru, &master, data)?;
        ru.increment_counter(self.prefix, NUMRECORDS, 1);
        ru.increment_counter(self.prefix, DATASIZE, data.len() as i64);
        Ok(Loc::new(self.prefix, id))
    }

    fn update(&self, ru: &RecoveryUnit, loc: Loc, data: &[u8]) -> Result<()> {
        let master = master_key(loc.prefix, loc.id);
        let old = match ru.get(&master)? {
            Some(v) => v,
            None => return err_at!(KeyNotFound, msg: "record {} not found for update", loc.id),
        };
        let old_total_len = self.total_len_of(&old) as usize;

        // write_chunks cleans up any overflow chunk left stale by a shrink.
        self.write_chunks(ru, &master, data)?;

        ru.increment_counter(self.prefix, DATASIZE, data.len() as i64 - old_total_len as i64);
        Ok(())
    }

    fn delete(&self, ru: &RecoveryUnit, loc: Loc) -> Result<()> {
        let master = master_key(loc.prefix, loc.id);
        let old = match ru.get(&master)? {
            Some(v) => v,
            None => return err_at!(KeyNotFound, msg: "record {} not found for delete", loc.id),
        };
        let old_total_len = self.total_len_of(&old) as usize;

        ru.del(&master)?;
        self.delete_overflow_from(ru, &master, 1)?;

        ru.increment_counter(self.prefix, NUMRECORDS, -1);
        ru.increment_counter(self.prefix, DATASIZE, -(old_total_len as i64));
        Ok(())
    }

    fn find(&self, ru: &RecoveryUnit, loc: Loc) -> Result<Option<Vec<u8>>> {
        let master = master_key(loc.prefix, loc.id);
        match ru.get(&master)? {
            None => Ok(None),
            Some(value) => Ok(Some(self.read_all_chunks(ru, &master, value)?)),
        }
    }

    fn get_cursor(&self, ru: &RecoveryUnit, dir: Direction) -> Result<Box<dyn Cursor>> {
        ru.begin_scan(&self.prefix.to_be_bytes(), dir)
    }

    fn truncate(&self, ru: &RecoveryUnit) -> Result<()> {
        ru.prefix_delete(&self.prefix.to_be_bytes())
    }

    fn prefix(&self) -> Prefix {
        self.prefix
    }
}

#[cfg(test)]
#[path = "base_test.rs"]
mod base_test;
