//! Coordinates sync() requests against the KVS-backend, tracks sync
//! generations, and notifies the active oplog's visibility manager after
//! each sync so readers can advance their persist boundary.
//!
//! The durability manager holds a non-owning reference to at most one
//! active oplog's [`VisibilityManager`] at a time — registered by the
//! oplog store on open and cleared on close — rather than an owning cycle
//! between the two.

use std::sync::{
    atomic::{AtomicU64, Ordering::SeqCst},
    Arc, Condvar, Mutex,
};

use crate::{error::Result, kvs::KVEngine, util::Spinlock, visibility::VisibilityManager};

/// Drives periodic `sync()`/`wait_until_durable()` against a [`KVEngine`].
pub struct DurabilityManager {
    sync_lock: Mutex<()>,
    cond: Condvar,
    generation: AtomicU64,
    oplog_visibility: Spinlock<Option<Arc<VisibilityManager>>>,
    durable: bool,
}

impl DurabilityManager {
    /// `durable` mirrors the engine's journaling configuration: when
    /// false, `sync`/`wait_until_durable` are no-ops.
    pub fn new(durable: bool) -> Arc<DurabilityManager> {
        Arc::new(DurabilityManager {
            sync_lock: Mutex::new(()),
            cond: Condvar::new(),
            generation: AtomicU64::new(0),
            oplog_visibility: Spinlock::new(None),
            durable,
        })
    }

    /// Register (or clear, with `None`) the currently-open oplog's
    /// visibility manager as the durability callback's target.
    pub fn set_oplog_visibility(&self, vm: Option<Arc<VisibilityManager>>) {
        *self.oplog_visibility.write() = vm;
    }

    /// Capture the oplog's commit boundary, sync the backend, then notify
    /// the oplog's visibility manager so its persist boundary can advance.
    /// No-op when the engine is configured non-durable.
    pub fn sync(&self, engine: &dyn KVEngine) -> Result<()> {
        if !self.durable {
            return Ok(());
        }
        let _guard = self.sync_lock.lock().unwrap();

        let captured_boundary = self
            .oplog_visibility
            .read()
            .as_ref()
            .map(|vm| vm.commit_boundary());

        engine.sync()?;

        if let (Some(vm), Some(boundary)) =
            (self.oplog_visibility.read().as_ref(), captured_boundary)
        {
            vm.durable_callback(boundary);
        }

        self.generation.fetch_add(1, SeqCst);
        self.cond.notify_all();
        Ok(())
    }

    /// Block until at least two sync generations have elapsed since this
    /// call started — one pass may observe a sync already in flight that
    /// began before this caller's write, so a single generation advance
    /// does not guarantee the caller's own write was included.
    pub fn wait_until_durable(&self) -> Result<()> {
        if !self.durable {
            return Ok(());
        }
        let start = self.generation.load(SeqCst);
        let guard = self.sync_lock.lock().unwrap();
        let _guard = self
            .cond
            .wait_while(guard, |_| self.generation.load(SeqCst) < start + 2)
            .unwrap();
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(SeqCst)
    }
}

#[cfg(test)]
#[path = "durability_test.rs"]
mod durability_test;
