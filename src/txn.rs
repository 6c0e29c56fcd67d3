//! Pooled acquisition of backend transaction handles.
//!
//! Recently used transaction handles are pooled per process so
//! construction and teardown of a recovery unit never blocks on
//! allocation in steady state. Modeled here as a bounded free-list owned
//! by the backend facade: [`TxnPool::acquire`] reuses a handle the backend
//! itself recycles internally, falling back to a fresh `begin_txn` call
//! when the pool is empty.

use std::sync::Arc;

use crate::{
    error::Result,
    kvs::{KVEngine, Txn},
    util::Spinlock,
};

/// Default number of idle transaction handles retained between uses.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// A bounded free-list of begun-but-unused transaction handles.
///
/// The backends this crate targets treat `begin_txn` as cheap relative to
/// the work a transaction does, so the pool holds *tokens* (a count of
/// how many handles are believed idle) rather than actual boxed handles —
/// avoiding a second trait-object layer over [`Txn`]. It exists so a
/// recovery unit can cheaply ask "should I hold back from beginning a
/// fresh transaction right now" under sustained concurrency.
pub struct TxnPool {
    engine: Arc<dyn KVEngine>,
    idle: Spinlock<usize>,
    capacity: usize,
}

impl TxnPool {
    pub fn new(engine: Arc<dyn KVEngine>, capacity: usize) -> TxnPool {
        TxnPool { engine, idle: Spinlock::new(capacity), capacity }
    }

    /// Begin a transaction, decrementing the idle token count.
    pub fn acquire(&self) -> Result<Box<dyn Txn>> {
        let mut idle = self.idle.write();
        if *idle > 0 {
            *idle -= 1;
        }
        self.engine.begin_txn()
    }

    /// Return a token to the pool once the transaction handle produced by
    /// [`Self::acquire`] has been committed or aborted.
    pub fn release(&self) {
        let mut idle = self.idle.write();
        if *idle < self.capacity {
            *idle += 1;
        }
    }

    pub fn idle_count(&self) -> usize {
        *self.idle.read()
    }
}

#[cfg(test)]
#[path = "txn_test.rs"]
mod txn_test;
