use super::*;
use crate::{
    kvs::mem::MemEngine,
    types::{CompAlgo, IdentKind, Prefix},
};

#[test]
fn test_capture_reports_registered_counters() {
    let engine = MemEngine::new();
    let catalog = Catalog::new(Prefix(0));
    let cfg = catalog.create(&engine, "coll.a", IdentKind::Collection, CompAlgo::None).unwrap();

    let counters = CounterManager::new();
    counters.register(cfg.prefix(), "numrecords", 3);
    counters.register(cfg.prefix(), "datasize", 42);

    let durability = DurabilityManager::new(false);
    let snap = Snapshot::capture(&catalog, &counters, &durability);

    let stats = snap.ident("coll.a").unwrap();
    assert_eq!(stats.numrecords, 3);
    assert_eq!(stats.datasize, 42);
    assert_eq!(stats.storagesize, 0);
    assert_eq!(stats.indexsize, 0);
}

#[test]
fn test_capture_omits_unknown_idents() {
    let engine = MemEngine::new();
    let catalog = Catalog::new(Prefix(0));
    let counters = CounterManager::new();
    let durability = DurabilityManager::new(false);
    let _ = &engine;

    let snap = Snapshot::capture(&catalog, &counters, &durability);
    assert!(snap.ident("missing").is_none());
    assert_eq!(snap.idents().count(), 0);
}

#[test]
fn test_sync_generation_reflects_durability_manager() {
    let catalog = Catalog::new(Prefix(0));
    let counters = CounterManager::new();
    let durability = DurabilityManager::new(true);
    let engine = MemEngine::new();

    durability.sync(&engine).unwrap();
    let snap = Snapshot::capture(&catalog, &counters, &durability);
    assert_eq!(snap.sync_generation(), 1);
}
