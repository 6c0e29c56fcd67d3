//! Aggregates per-record-store and per-index counter deltas, syncing them
//! to persistent counter keys on a threshold or on demand.
//!
//! A registry of live counters, each an `AtomicI64` delta accumulator,
//! with a single compare-exchange "is-syncing" flag ensuring at most one
//! thread flushes persistent state at a time.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicI64, Ordering::SeqCst},
};

use crate::{error::Result, types::Prefix, util::Spinlock};

/// Increments-between-syncs threshold.
pub const SYNC_EVERY: u64 = 10_000;

/// A single live counter: an in-memory atomic delta plus the bookkeeping
/// needed to decide when it should be flushed.
pub struct Counter {
    value: AtomicI64,
    since_sync: AtomicI64,
}

impl Counter {
    fn new(initial: i64) -> Counter {
        Counter { value: AtomicI64::new(initial), since_sync: AtomicI64::new(0) }
    }

    pub fn get(&self) -> i64 {
        self.value.load(SeqCst)
    }

    pub fn increment(&self, delta: i64) -> i64 {
        self.since_sync.fetch_add(delta.abs(), SeqCst);
        self.value.fetch_add(delta, SeqCst) + delta
    }
}

/// Registry of live counters, keyed by ident prefix and counter name
/// (`"numrecords"`, `"datasize"`, `"storagesize"`, `"indexsize"`).
pub struct CounterManager {
    counters: Spinlock<HashMap<(Prefix, &'static str), Counter>>,
    is_syncing: AtomicBool,
}

impl Default for CounterManager {
    fn default() -> CounterManager {
        CounterManager::new()
    }
}

impl CounterManager {
    pub fn new() -> CounterManager {
        CounterManager { counters: Spinlock::new(HashMap::new()), is_syncing: AtomicBool::new(false) }
    }

    /// Register a fresh counter (e.g. at ident-open time), seeded from its
    /// last persisted value.
    pub fn register(&self, prefix: Prefix, name: &'static str, initial: i64) {
        self.counters.write().insert((prefix, name), Counter::new(initial));
    }

    pub fn unregister(&self, prefix: Prefix, name: &'static str) {
        self.counters.write().remove(&(prefix, name));
    }

    /// Apply `delta` to the named counter; returns the threshold-crossing
    /// flag the caller should check to decide whether to request a sync.
    pub fn increment(&self, prefix: Prefix, name: &'static str, delta: i64) -> bool {
        let counters = self.counters.read();
        match counters.get(&(prefix, name)) {
            Some(c) => {
                c.increment(delta);
                c.since_sync.load(SeqCst) as u64 >= SYNC_EVERY
            }
            None => false,
        }
    }

    pub fn get(&self, prefix: Prefix, name: &'static str) -> Option<i64> {
        self.counters.read().get(&(prefix, name)).map(Counter::get)
    }

    /// Best-effort sync: skip if another thread is already syncing.
    /// `persist` receives `(prefix, name, value)` pairs and is responsible
    /// for writing them through the recovery unit.
    pub fn sync<F>(&self, mut persist: F) -> Result<()>
    where
        F: FnMut(Prefix, &'static str, i64) -> Result<()>,
    {
        if self.is_syncing.compare_exchange(false, true, SeqCst, SeqCst).is_err() {
            return Ok(());
        }
        let result = self.flush(&mut persist);
        self.is_syncing.store(false, SeqCst);
        result
    }

    /// Blocking sync used by rename: must not skip even if another sync is
    /// in flight, since the renamed-to instance needs the final state.
    pub fn sync_for_rename<F>(&self, mut persist: F) -> Result<()>
    where
        F: FnMut(Prefix, &'static str, i64) -> Result<()>,
    {
        while self.is_syncing.compare_exchange(false, true, SeqCst, SeqCst).is_err() {
            std::thread::yield_now();
        }
        let result = self.flush(&mut persist);
        self.is_syncing.store(false, SeqCst);
        result
    }

    fn flush<F>(&self, persist: &mut F) -> Result<()>
    where
        F: FnMut(Prefix, &'static str, i64) -> Result<()>,
    {
        let counters = self.counters.read();
        for ((prefix, name), counter) in counters.iter() {
            persist(*prefix, name, counter.get())?;
            counter.since_sync.store(0, SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "counter_test.rs"]
mod counter_test;
