//! Per-operation context binding a host call to the KVS-backend.
//!
//! One instance lives for one host operation: it lazily acquires a
//! transaction on first use, routes reads/writes through it, accumulates
//! counter deltas and a change list, and resolves everything at `commit`
//! or `abort`. A process-global snapshot id is bumped at every
//! commit/abort/abandon so higher layers can detect that a document's
//! visible version may have changed across a yield.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering::SeqCst},
        Arc,
    },
};

use crate::{
    counter::CounterManager,
    durability::DurabilityManager,
    error::Result,
    kvs::{Cursor, Direction, KVEngine, ProbeCount, Txn},
    types::Prefix,
    util::Spinlock,
};

static SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

fn next_snapshot_id() -> u64 {
    SNAPSHOT_ID.fetch_add(1, SeqCst)
}

/// A commit/rollback callback pair registered against a recovery unit.
/// These never fail partially — a panic inside either hook is a
/// programmer error in core invariant maintenance (e.g. visibility-manager
/// bookkeeping) and is allowed to propagate as a process abort rather than
/// be caught and downgraded.
pub trait Change: Send {
    fn on_commit(self: Box<Self>);
    fn on_rollback(self: Box<Self>);
}

/// Per-operation context. Not `Sync`: a recovery unit belongs to exactly
/// one host operation context at a time.
pub struct RecoveryUnit {
    engine: Arc<dyn KVEngine>,
    txn: Spinlock<Option<Box<dyn Txn>>>,
    changes: Spinlock<Vec<Box<dyn Change>>>,
    counter_deltas: Spinlock<HashMap<(Prefix, &'static str), i64>>,
    snapshot_id: u64,
}

impl RecoveryUnit {
    pub fn new(engine: Arc<dyn KVEngine>) -> RecoveryUnit {
        RecoveryUnit {
            engine,
            txn: Spinlock::new(None),
            changes: Spinlock::new(vec![]),
            counter_deltas: Spinlock::new(HashMap::new()),
            snapshot_id: next_snapshot_id(),
        }
    }

    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id
    }

    /// Acquire the cached transaction, beginning one on first use.
    fn ensure_txn(&self) -> Result<()> {
        if self.txn.read().is_none() {
            let t = self.engine.begin_txn()?;
            *self.txn.write() = Some(t);
        }
        Ok(())
    }

    fn with_txn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Option<&dyn Txn>) -> Result<T>,
    {
        self.ensure_txn()?;
        let guard = self.txn.read();
        f(guard.as_deref())
    }

    pub fn put(&self, key: &[u8], val: &[u8]) -> Result<()> {
        self.with_txn(|t| self.engine.put(t, key, val))
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_txn(|t| self.engine.get(t, key))
    }

    pub fn get_len(&self, key: &[u8]) -> Result<Option<usize>> {
        self.with_txn(|t| self.engine.get_len(t, key))
    }

    pub fn del(&self, key: &[u8]) -> Result<()> {
        self.with_txn(|t| self.engine.delete(t, key))
    }

    pub fn probe_key(&self, key: &[u8]) -> Result<bool> {
        self.with_txn(|t| self.engine.probe_key(t, key))
    }

    pub fn prefix_delete(&self, prefix: &[u8]) -> Result<()> {
        self.with_txn(|t| self.engine.prefix_delete(t, prefix))
    }

    pub fn prefix_probe(&self, prefix: &[u8]) -> Result<ProbeCount> {
        self.with_txn(|t| self.engine.prefix_probe(t, prefix))
    }

    pub fn begin_scan(&self, prefix: &[u8], dir: Direction) -> Result<Box<dyn Cursor>> {
        self.ensure_txn()?;
        let guard = self.txn.read();
        self.engine.new_cursor(guard.as_deref(), prefix, dir)
    }

    /// Non-transactional put, bypassing the cached transaction. Used only
    /// for metadata markers and bulk loads, which must land regardless of
    /// the enclosing unit of work's outcome.
    pub fn put_direct(&self, key: &[u8], val: &[u8]) -> Result<()> {
        self.engine.put(None, key, val)
    }

    pub fn register_change(&self, change: Box<dyn Change>) {
        self.changes.write().push(change);
    }

    pub fn increment_counter(&self, prefix: Prefix, name: &'static str, delta: i64) {
        *self.counter_deltas.write().entry((prefix, name)).or_insert(0) += delta;
    }

    /// Uncommitted view of a counter delta accumulated so far in this
    /// unit, for callers that need read-your-writes on counters before
    /// commit.
    pub fn get_delta_counter(&self, prefix: Prefix, name: &'static str) -> i64 {
        *self.counter_deltas.read().get(&(prefix, name)).unwrap_or(&0)
    }

    /// Commit the cached transaction (if any), fold counter deltas into
    /// `counters`, and replay registered changes in order. Backend
    /// conflicts propagate as `Error::WriteConflict` without running
    /// change callbacks — the host retries the whole operation.
    pub fn commit(self, counters: &CounterManager) -> Result<()> {
        if let Some(txn) = self.txn.into_inner() {
            txn.commit()?;
        }
        for ((prefix, name), delta) in self.counter_deltas.into_inner() {
            counters.increment(prefix, name, delta);
        }
        for change in self.changes.into_inner() {
            change.on_commit();
        }
        next_snapshot_id();
        Ok(())
    }

    /// Abort the cached transaction (if any) and replay registered
    /// changes in reverse order. Counter deltas are discarded.
    pub fn abort(self) -> Result<()> {
        if let Some(txn) = self.txn.into_inner() {
            txn.abort()?;
        }
        for change in self.changes.into_inner().into_iter().rev() {
            change.on_rollback();
        }
        next_snapshot_id();
        Ok(())
    }

    /// Discard this unit's snapshot without running change callbacks,
    /// used when the host abandons a read-only context that never wrote
    /// anything through it.
    pub fn abandon_snapshot(self) {
        next_snapshot_id();
    }

    pub fn wait_until_durable(&self, dm: &DurabilityManager) -> Result<()> {
        dm.wait_until_durable()
    }
}

#[cfg(test)]
#[path = "recovery_unit_test.rs"]
mod recovery_unit_test;
