//! In-memory reference [`KVEngine`], standing in for an on-disk
//! KVS-backend in this crate's own test suites.
//!
//! Transactions are optimistic: a txn reads from the map as of its begin
//! generation, buffers writes in a local overlay, and conflicts on commit
//! if the shared generation has advanced since it began. This is coarser
//! than real write-set conflict detection but sufficient to exercise the
//! recovery unit's write-conflict path.

use std::{
    any::Any,
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering::SeqCst},
        Arc,
    },
};

use crate::{
    error::Result,
    kvs::{Cursor, Direction, KVEngine, ProbeCount, Txn},
    util::Spinlock,
};

type Store = BTreeMap<Vec<u8>, Vec<u8>>;

struct Inner {
    store: Spinlock<Store>,
    generation: AtomicU64,
}

/// In-memory [`KVEngine`] implementation.
#[derive(Clone)]
pub struct MemEngine {
    inner: Arc<Inner>,
}

impl Default for MemEngine {
    fn default() -> MemEngine {
        MemEngine::new()
    }
}

impl MemEngine {
    pub fn new() -> MemEngine {
        MemEngine {
            inner: Arc::new(Inner {
                store: Spinlock::new(Store::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    fn snapshot(&self) -> Store {
        self.inner.store.read().clone()
    }

    fn view(&self, txn: Option<&dyn Txn>) -> Result<Store> {
        match txn.and_then(|t| t.as_any().downcast_ref::<MemTxn>()) {
            None => Ok(self.snapshot()),
            Some(mt) => {
                let mut view = self.snapshot();
                for (k, w) in mt.writes.read().iter() {
                    match w {
                        Write::Put(v) => {
                            view.insert(k.clone(), v.clone());
                        }
                        Write::Delete => {
                            view.remove(k);
                        }
                    }
                }
                Ok(view)
            }
        }
    }
}

enum Write {
    Put(Vec<u8>),
    Delete,
}

/// Transaction handle for [`MemEngine`]; holds a shared reference to the
/// engine it was begun against so `commit`/`abort` are self-contained, as
/// the recovery unit's scoped acquisition expects.
pub struct MemTxn {
    inner: Arc<Inner>,
    base_gen: u64,
    writes: Spinlock<BTreeMap<Vec<u8>, Write>>,
}

impl Txn for MemTxn {
    fn commit(self: Box<Self>) -> Result<()> {
        let mut store = self.inner.store.write();
        if self.inner.generation.load(SeqCst) != self.base_gen {
            return err_at!(WriteConflict, msg: "mem-engine commit raced a concurrent writer");
        }
        for (k, w) in self.writes.write().iter() {
            match w {
                Write::Put(v) => {
                    store.insert(k.clone(), v.clone());
                }
                Write::Delete => {
                    store.remove(k);
                }
            }
        }
        self.inner.generation.fetch_add(1, SeqCst);
        Ok(())
    }

    fn abort(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl KVEngine for MemEngine {
    fn begin_txn(&self) -> Result<Box<dyn Txn>> {
        Ok(Box::new(MemTxn {
            inner: Arc::clone(&self.inner),
            base_gen: self.inner.generation.load(SeqCst),
            writes: Spinlock::new(BTreeMap::new()),
        }))
    }

    fn put(&self, txn: Option<&dyn Txn>, key: &[u8], val: &[u8]) -> Result<()> {
        match txn.and_then(|t| t.as_any().downcast_ref::<MemTxn>()) {
            Some(mt) => {
                mt.writes.write().insert(key.to_vec(), Write::Put(val.to_vec()));
                Ok(())
            }
            None => {
                self.inner.store.write().insert(key.to_vec(), val.to_vec());
                self.inner.generation.fetch_add(1, SeqCst);
                Ok(())
            }
        }
    }

    fn get(&self, txn: Option<&dyn Txn>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.view(txn)?.get(key).cloned())
    }

    fn get_len(&self, txn: Option<&dyn Txn>, key: &[u8]) -> Result<Option<usize>> {
        Ok(self.view(txn)?.get(key).map(|v| v.len()))
    }

    fn delete(&self, txn: Option<&dyn Txn>, key: &[u8]) -> Result<()> {
        match txn.and_then(|t| t.as_any().downcast_ref::<MemTxn>()) {
            Some(mt) => {
                mt.writes.write().insert(key.to_vec(), Write::Delete);
                Ok(())
            }
            None => {
                self.inner.store.write().remove(key);
                self.inner.generation.fetch_add(1, SeqCst);
                Ok(())
            }
        }
    }

    fn probe_key(&self, txn: Option<&dyn Txn>, key: &[u8]) -> Result<bool> {
        Ok(self.view(txn)?.contains_key(key))
    }

    fn prefix_delete(&self, txn: Option<&dyn Txn>, prefix: &[u8]) -> Result<()> {
        let keys: Vec<Vec<u8>> = self
            .view(txn)?
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        match txn.and_then(|t| t.as_any().downcast_ref::<MemTxn>()) {
            Some(mt) => {
                let mut writes = mt.writes.write();
                for k in keys {
                    writes.insert(k, Write::Delete);
                }
            }
            None => {
                let mut store = self.inner.store.write();
                for k in keys {
                    store.remove(&k);
                }
                self.inner.generation.fetch_add(1, SeqCst);
            }
        }
        Ok(())
    }

    fn prefix_probe(&self, txn: Option<&dyn Txn>, prefix: &[u8]) -> Result<ProbeCount> {
        let n = self
            .view(txn)?
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(2)
            .count();
        Ok(match n {
            0 => ProbeCount::Zero,
            1 => ProbeCount::One,
            _ => ProbeCount::Many,
        })
    }

    fn new_cursor(
        &self,
        txn: Option<&dyn Txn>,
        prefix: &[u8],
        dir: Direction,
    ) -> Result<Box<dyn Cursor>> {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = self
            .view(txn)?
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(MemCursor {
            entries,
            pos: 0,
            dir,
        }))
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

struct MemCursor {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
    dir: Direction,
}

impl Cursor for MemCursor {
    fn seek(&mut self, key: &[u8], inclusive: bool) -> Result<()> {
        match self.dir {
            Direction::Forward => {
                self.pos = self
                    .entries
                    .iter()
                    .position(|(k, _)| k.as_slice() > key || (inclusive && k.as_slice() == key))
                    .unwrap_or(self.entries.len());
            }
            Direction::Reverse => {
                self.pos = self
                    .entries
                    .iter()
                    .rposition(|(k, _)| k.as_slice() < key || (inclusive && k.as_slice() == key))
                    .map(|p| p + 1)
                    .unwrap_or(0);
            }
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        match self.dir {
            Direction::Forward => Ok(self.entries.get(self.pos).cloned()),
            Direction::Reverse => {
                if self.pos == 0 {
                    Ok(None)
                } else {
                    Ok(self.entries.get(self.pos - 1).cloned())
                }
            }
        }
    }

    fn advance(&mut self) -> Result<()> {
        match self.dir {
            Direction::Forward => self.pos = self.pos.saturating_add(1).min(self.entries.len()),
            Direction::Reverse => self.pos = self.pos.saturating_sub(1),
        }
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "mem_test.rs"]
mod mem_test;
