//! Read-only snapshot of per-ident counters and the durability manager's
//! sync generation, assembled on demand for diagnostics.
//!
//! There is no background sampling thread here — a snapshot is a plain
//! struct built from the live [`CounterManager`]/[`Catalog`]/
//! [`DurabilityManager`] state at the moment a caller asks for one.

use std::collections::HashMap;

use crate::{counter::CounterManager, durability::DurabilityManager, ident::Catalog};

/// Counter totals for one ident at snapshot time. A counter this crate
/// never registers for a given ident kind (e.g. `indexsize` on a plain
/// collection) reads as zero rather than absent.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IdentStats {
    pub numrecords: i64,
    pub datasize: i64,
    pub storagesize: i64,
    pub indexsize: i64,
}

/// A point-in-time view across every open ident plus the durability
/// manager's sync generation.
#[derive(Clone, Debug)]
pub struct Snapshot {
    idents: HashMap<String, IdentStats>,
    sync_generation: u64,
}

impl Snapshot {
    pub fn capture(catalog: &Catalog, counters: &CounterManager, durability: &DurabilityManager) -> Snapshot {
        let mut idents = HashMap::new();
        for name in catalog.names() {
            let prefix = match catalog.get(&name) {
                Some(cfg) => cfg.prefix(),
                None => continue,
            };
            idents.insert(
                name,
                IdentStats {
                    numrecords: counters.get(prefix, "numrecords").unwrap_or(0),
                    datasize: counters.get(prefix, "datasize").unwrap_or(0),
                    storagesize: counters.get(prefix, "storagesize").unwrap_or(0),
                    indexsize: counters.get(prefix, "indexsize").unwrap_or(0),
                },
            );
        }
        Snapshot { idents, sync_generation: durability.generation() }
    }

    pub fn ident(&self, name: &str) -> Option<&IdentStats> {
        self.idents.get(name)
    }

    pub fn idents(&self) -> impl Iterator<Item = (&str, &IdentStats)> {
        self.idents.iter().map(|(name, stats)| (name.as_str(), stats))
    }

    pub fn sync_generation(&self) -> u64 {
        self.sync_generation
    }
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod stats_test;
