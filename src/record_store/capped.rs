//! Capped record store: a [`BaseStore`] plus a soft size/document cap
//! enforced by reclaiming the oldest records in a nested transaction after
//! every successful insert.
//!
//! Cap enforcement reads its own live `AtomicI64` totals rather than the
//! shared [`CounterManager`], since those apply on the enclosing recovery
//! unit's *commit* — too late for the cap check an insert needs to make
//! against its own, still-uncommitted, effect. The authoritative
//! `numrecords`/`datasize` counters the host queries still flow through
//! the ordinary delta/commit path on both the insert and the nested
//! reclamation transaction.

use std::convert::TryInto;
use std::sync::{
    atomic::{AtomicI64, Ordering::SeqCst},
    Arc,
};

use crate::{
    counter::CounterManager,
    kvs::{Cursor, Direction, KVEngine},
    record_store::{is_master_key, record_id_of_master_key, BaseStore, RecordStore, StoreConfig, MAX_RECLAIM_PER_PASS},
    recovery_unit::RecoveryUnit,
    types::{Loc, Prefix, RecordId},
    Result,
};

/// Soft cap configuration; a `None` field imposes no limit on that axis.
#[derive(Copy, Clone, Debug, Default)]
pub struct CapConfig {
    pub cap_bytes: Option<u64>,
    pub cap_docs: Option<u64>,
}

impl CapConfig {
    fn over_cap(&self, num_records: i64, data_size: i64) -> bool {
        self.cap_docs.is_some_and(|cap| num_records as u64 > cap)
            || self.cap_bytes.is_some_and(|cap| data_size as u64 > cap)
    }
}

/// Callback invoked, under the reclamation transaction, for every record
/// evicted by the cap — e.g. to clean up a secondary collection.
pub type CappedDeleteCallback = Box<dyn Fn(Loc) + Send + Sync>;

pub struct CappedStore {
    base: BaseStore,
    engine: Arc<dyn KVEngine>,
    cap: CapConfig,
    on_delete: Option<CappedDeleteCallback>,
    live_num_records: AtomicI64,
    live_data_size: AtomicI64,
}

impl CappedStore {
    pub fn open(
        ru: &RecoveryUnit,
        engine: Arc<dyn KVEngine>,
        prefix: Prefix,
        config: StoreConfig,
        cap: CapConfig,
        on_delete: Option<CappedDeleteCallback>,
        seed_num_records: i64,
        seed_data_size: i64,
    ) -> Result<CappedStore> {
        let base = BaseStore::open(ru, prefix, config)?;
        Ok(CappedStore {
            base,
            engine,
            cap,
            on_delete,
            live_num_records: AtomicI64::new(seed_num_records),
            live_data_size: AtomicI64::new(seed_data_size),
        })
    }

    /// Reclaim oldest records in a nested transaction until the cap is
    /// satisfied, `MAX_RECLAIM_PER_PASS` is reached, or the cursor hits a
    /// record it must not touch (`just_inserted`, or one it cannot see
    /// because it is still uncommitted). A write-conflict on the nested
    /// transaction's commit is swallowed — the cap is enforced eventually
    /// by a later insert.
    fn reclaim(&self, counters: &CounterManager, just_inserted: RecordId) -> Result<()> {
        let prefix = self.base.prefix();
        let mut num_records = self.live_num_records.load(SeqCst);
        let mut data_size = self.live_data_size.load(SeqCst);
        if !self.cap.over_cap(num_records, data_size) {
            return Ok(());
        }

        let nested = RecoveryUnit::new(Arc::clone(&self.engine));
        let mut cursor = nested.begin_scan(&prefix.to_be_bytes(), Direction::Forward)?;
        let mut reclaimed = 0;
        let mut reclaimed_records = 0_i64;
        let mut reclaimed_bytes = 0_i64;

        while reclaimed < MAX_RECLAIM_PER_PASS && self.cap.over_cap(num_records, data_size) {
            let (key, value) = match cursor.read()? {
                Some(entry) => entry,
                None => break,
            };
            if !is_master_key(&key) {
                cursor.advance()?;
                continue;
            }
            let id = record_id_of_master_key(&key);
            if id >= just_inserted {
                break;
            }
            let old_len = u32::from_be_bytes(value[..4].try_into().unwrap()) as i64;
            let loc = Loc::new(prefix, id);
            self.base.delete(&nested, loc)?;
            if let Some(cb) = &self.on_delete {
                cb(loc);
            }
            num_records -= 1;
            data_size -= old_len;
            reclaimed_records += 1;
            reclaimed_bytes += old_len;
            reclaimed += 1;
            cursor.advance()?;
        }

        match nested.commit(counters) {
            Ok(()) => {
                self.live_num_records.fetch_sub(reclaimed_records, SeqCst);
                self.live_data_size.fetch_sub(reclaimed_bytes, SeqCst);
                Ok(())
            }
            Err(e) if e.is_write_conflict() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Insert, then enforce the cap. Unlike [`RecordStore::insert`], this
    /// takes the live `CounterManager` explicitly since the nested
    /// reclamation transaction must fold its deltas into it.
    pub fn insert_capped(&self, ru: &RecoveryUnit, counters: &CounterManager, data: &[u8]) -> Result<Loc> {
        let loc = self.base.insert(ru, data)?;
        self.live_num_records.fetch_add(1, SeqCst);
        self.live_data_size.fetch_add(data.len() as i64, SeqCst);
        self.reclaim(counters, loc.id)?;
        Ok(loc)
    }
}

impl RecordStore for CappedStore {
    /// Insert without cap enforcement; callers that need the cap enforced
    /// immediately should call [`CappedStore::insert_capped`] instead. This
    /// impl exists so `CappedStore` still satisfies the shared trait for
    /// code that only needs CRUD, not reclamation.
    fn insert(&self, ru: &RecoveryUnit, data: &[u8]) -> Result<Loc> {
        let loc = self.base.insert(ru, data)?;
        self.live_num_records.fetch_add(1, SeqCst);
        self.live_data_size.fetch_add(data.len() as i64, SeqCst);
        Ok(loc)
    }

    fn update(&self, ru: &RecoveryUnit, loc: Loc, data: &[u8]) -> Result<()> {
        self.base.update(ru, loc, data)
    }

    fn delete(&self, ru: &RecoveryUnit, loc: Loc) -> Result<()> {
        self.base.delete(ru, loc)
    }

    fn find(&self, ru: &RecoveryUnit, loc: Loc) -> Result<Option<Vec<u8>>> {
        self.base.find(ru, loc)
    }

    fn get_cursor(&self, ru: &RecoveryUnit, dir: Direction) -> Result<Box<dyn Cursor>> {
        self.base.get_cursor(ru, dir)
    }

    fn truncate(&self, ru: &RecoveryUnit) -> Result<()> {
        self.base.truncate(ru)
    }

    fn prefix(&self) -> Prefix {
        self.base.prefix()
    }
}

#[cfg(test)]
#[path = "capped_test.rs"]
mod capped_test;
