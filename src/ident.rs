//! Ident bookkeeping: allocates a fresh monotonic [`Prefix`] per ident and
//! persists `ident-name -> config-blob` in the metadata key space.
//!
//! Backs `create_record_store` / `create_sorted_data_interface` /
//! `drop_ident` / `rename_ident` style bookkeeping: every named collection
//! or index needs a stable prefix and a recoverable kind/compression
//! config before any record store or index can open against it.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering::SeqCst},
};

use cbordata::Cborize;

use crate::{
    error::Result,
    kvs::KVEngine,
    types::{CompAlgo, IdentKind, Prefix},
    util::{from_cbor_bytes, into_cbor_bytes},
};

const METADATA_PREFIX: &[u8] = b"meta-";

const IDENT_CONFIG_VER: u32 = 0x0001_0001;

/// Persisted `{prefix, kind, compression}` triple for one ident. `kind` and
/// `compression` are stored as their raw byte encodings rather than
/// deriving `Cborize` on the enums directly, keeping the wire shape a
/// plain struct of primitive fields.
#[derive(Clone, Debug, Cborize)]
pub struct IdentConfig {
    pub prefix: u32,
    pub kind: u8,
    pub compression: u8,
}

impl IdentConfig {
    const ID: u32 = IDENT_CONFIG_VER;

    pub fn new(prefix: Prefix, kind: IdentKind, compression: CompAlgo) -> IdentConfig {
        IdentConfig {
            prefix: prefix.0,
            kind: ident_kind_to_byte(kind),
            compression: compression.to_byte(),
        }
    }

    pub fn prefix(&self) -> Prefix {
        Prefix(self.prefix)
    }

    pub fn kind(&self) -> IdentKind {
        ident_kind_from_byte(self.kind)
    }

    pub fn compression(&self) -> CompAlgo {
        CompAlgo::from_byte(self.compression).unwrap_or(CompAlgo::None)
    }
}

fn ident_kind_to_byte(kind: IdentKind) -> u8 {
    match kind {
        IdentKind::Collection => 0,
        IdentKind::StdIndex => 1,
        IdentKind::UniqIndex => 2,
        IdentKind::Oplog => 3,
    }
}

fn ident_kind_from_byte(b: u8) -> IdentKind {
    match b {
        0 => IdentKind::Collection,
        1 => IdentKind::StdIndex,
        2 => IdentKind::UniqIndex,
        3 => IdentKind::Oplog,
        _ => crate::fatal!("corrupt ident-kind byte {}", b),
    }
}

fn meta_key(name: &str) -> Vec<u8> {
    let mut key = METADATA_PREFIX.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

/// In-memory registry of open idents, backed by persisted config blobs in
/// the metadata key space. One instance per open `KVEngine`.
pub struct Catalog {
    next_prefix: AtomicU32,
    idents: crate::util::Spinlock<HashMap<String, IdentConfig>>,
}

impl Catalog {
    /// Build a catalog seeded from `start_prefix`, the value one past the
    /// highest prefix found across all key spaces at open time (the
    /// orphan-prefix safeguard: a prefix left behind by a crash between
    /// allocation and metadata persist must never be reused).
    pub fn new(start_prefix: Prefix) -> Catalog {
        Catalog {
            next_prefix: AtomicU32::new(start_prefix.0),
            idents: crate::util::Spinlock::new(HashMap::new()),
        }
    }

    /// Load every persisted ident config under the metadata prefix,
    /// bumping the prefix allocator past the highest one found.
    pub fn open(&self, engine: &dyn KVEngine) -> Result<()> {
        let mut idents = self.idents.write();
        let mut cursor = engine.new_cursor(None, METADATA_PREFIX, crate::kvs::Direction::Forward)?;
        cursor.seek(METADATA_PREFIX, true)?;
        while let Some((key, blob)) = cursor.read()? {
            let name = String::from_utf8_lossy(&key[METADATA_PREFIX.len()..]).into_owned();
            let (cfg, _): (IdentConfig, usize) = from_cbor_bytes(&blob)?;
            self.bump_past(cfg.prefix());
            idents.insert(name, cfg);
            cursor.advance()?;
        }
        Ok(())
    }

    fn bump_past(&self, prefix: Prefix) {
        let mut cur = self.next_prefix.load(SeqCst);
        while prefix.0 >= cur {
            match self.next_prefix.compare_exchange(cur, prefix.0 + 1, SeqCst, SeqCst) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Allocate a fresh prefix, create `{prefix, kind, compression}`, and
    /// persist it under `name`'s metadata key. An oplog ident's value
    /// framing never carries a compression byte, so `compression` is
    /// forced to `CompAlgo::None` regardless of what is requested.
    pub fn create(
        &self,
        engine: &dyn KVEngine,
        name: &str,
        kind: IdentKind,
        compression: CompAlgo,
    ) -> Result<IdentConfig> {
        let mut idents = self.idents.write();
        if idents.contains_key(name) {
            return err_at!(InvalidInput, msg: "ident {} already exists", name);
        }
        let prefix = Prefix(self.next_prefix.fetch_add(1, SeqCst));
        let compression = match kind {
            IdentKind::Oplog => CompAlgo::None,
            _ => compression,
        };
        let cfg = IdentConfig::new(prefix, kind, compression);
        let blob = into_cbor_bytes(cfg.clone())?;
        engine.put(None, &meta_key(name), &blob)?;
        idents.insert(name.to_string(), cfg.clone());
        Ok(cfg)
    }

    /// Drop an ident: prefix-delete its data and erase its config blob.
    /// The caller is responsible for prefix-deleting every key space the
    /// ident's kind spans (main/large for collections, oplog/oplog-large
    /// for the oplog, the index key space for indexes) — the catalog only
    /// owns the metadata bookkeeping.
    pub fn drop_ident(&self, engine: &dyn KVEngine, name: &str) -> Result<IdentConfig> {
        let mut idents = self.idents.write();
        match idents.remove(name) {
            Some(cfg) => {
                engine.delete(None, &meta_key(name))?;
                Ok(cfg)
            }
            None => err_at!(KeyNotFound, msg: "ident {} not found", name),
        }
    }

    /// Rename an ident's config entry in place without reallocating its
    /// prefix. The caller's counter manager must `sync_for_rename` before
    /// this so the renamed-to instance reloads consistent counters.
    pub fn rename_ident(&self, engine: &dyn KVEngine, from: &str, to: &str) -> Result<()> {
        let mut idents = self.idents.write();
        let cfg = match idents.remove(from) {
            Some(cfg) => cfg,
            None => return err_at!(KeyNotFound, msg: "ident {} not found", from),
        };
        let blob = into_cbor_bytes(cfg.clone())?;
        engine.delete(None, &meta_key(from))?;
        engine.put(None, &meta_key(to), &blob)?;
        idents.insert(to.to_string(), cfg);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<IdentConfig> {
        self.idents.read().get(name).cloned()
    }

    /// Every currently-open ident name, for diagnostics snapshotting.
    pub fn names(&self) -> Vec<String> {
        self.idents.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.idents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "ident_test.rs"]
mod ident_test;
