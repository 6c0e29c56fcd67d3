use std::sync::{Arc, Mutex};

use super::*;
use crate::kvs::mem::MemEngine;

fn new_capped(cap: CapConfig) -> (RecoveryUnit, CounterManager, CappedStore) {
    let engine: Arc<dyn KVEngine> = Arc::new(MemEngine::new());
    let counters = CounterManager::new();
    counters.register(Prefix(1), "numrecords", 0);
    counters.register(Prefix(1), "datasize", 0);
    let ru = RecoveryUnit::new(Arc::clone(&engine));
    let store = CappedStore::open(&ru, Arc::clone(&engine), Prefix(1), StoreConfig::default(), cap, None, 0, 0).unwrap();
    (ru, counters, store)
}

#[test]
fn test_insert_under_cap_does_not_reclaim() {
    let (ru, counters, store) = new_capped(CapConfig { cap_docs: Some(10), cap_bytes: None });
    let loc = store.insert_capped(&ru, &counters, b"a").unwrap();
    assert_eq!(store.find(&ru, loc).unwrap(), Some(b"a".to_vec()));
}

#[test]
fn test_insert_over_doc_cap_reclaims_oldest() {
    let (ru, counters, store) = new_capped(CapConfig { cap_docs: Some(2), cap_bytes: None });

    let first = store.insert_capped(&ru, &counters, b"1").unwrap();
    let second = store.insert_capped(&ru, &counters, b"2").unwrap();
    let third = store.insert_capped(&ru, &counters, b"3").unwrap();

    assert_eq!(store.find(&ru, first).unwrap(), None, "oldest record should have been reclaimed");
    assert_eq!(store.find(&ru, second).unwrap(), Some(b"2".to_vec()));
    assert_eq!(store.find(&ru, third).unwrap(), Some(b"3".to_vec()));
}

#[test]
fn test_capped_delete_callback_invoked_per_reclaimed_record() {
    let engine: Arc<dyn KVEngine> = Arc::new(MemEngine::new());
    let counters = CounterManager::new();
    counters.register(Prefix(1), "numrecords", 0);
    counters.register(Prefix(1), "datasize", 0);
    let ru = RecoveryUnit::new(Arc::clone(&engine));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);

    let store = CappedStore::open(
        &ru,
        Arc::clone(&engine),
        Prefix(1),
        StoreConfig::default(),
        CapConfig { cap_docs: Some(1), cap_bytes: None },
        Some(Box::new(move |loc: Loc| seen_clone.lock().unwrap().push(loc.id.0))),
        0,
        0,
    )
    .unwrap();

    store.insert_capped(&ru, &counters, b"1").unwrap();
    store.insert_capped(&ru, &counters, b"2").unwrap();

    assert_eq!(seen.lock().unwrap().len(), 1);
}
