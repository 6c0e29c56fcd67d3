use std::sync::Arc;

use super::*;
use crate::{
    counter::CounterManager,
    kvs::mem::MemEngine,
    record_store::block_manager::Config,
};

fn new_engine_and_counters() -> (Arc<dyn KVEngine>, CounterManager) {
    let engine: Arc<dyn KVEngine> = Arc::new(MemEngine::new());
    let counters = CounterManager::new();
    counters.register(Prefix(1), crate::record_store::base::NUMRECORDS, 0);
    counters.register(Prefix(1), crate::record_store::base::DATASIZE, 0);
    (engine, counters)
}

fn open_store(engine: &Arc<dyn KVEngine>, journaling: bool, config: Config) -> (Arc<BlockManager>, Arc<VisibilityManager>, OplogStore) {
    let ru = RecoveryUnit::new(Arc::clone(engine));
    let blocks = Arc::new(BlockManager::open(&ru, Prefix(1), config).unwrap());
    let visibility = VisibilityManager::new(journaling);
    let store = OplogStore::new(Prefix(1), Arc::clone(engine), Arc::clone(&blocks), Arc::clone(&visibility));
    (blocks, visibility, store)
}

#[test]
fn test_insert_find_roundtrip() {
    let (engine, counters) = new_engine_and_counters();
    let (_blocks, _visibility, store) = open_store(&engine, false, Config::default());

    let ru = RecoveryUnit::new(Arc::clone(&engine));
    let loc = store.insert(&ru, RecordId(100), b"hello oplog").unwrap();
    assert_eq!(store.find(&ru, loc).unwrap(), Some(b"hello oplog".to_vec()));
    ru.commit(&counters).unwrap();
}

#[test]
fn test_update_requires_same_length() {
    let (engine, counters) = new_engine_and_counters();
    let (_blocks, _visibility, store) = open_store(&engine, false, Config::default());

    let ru = RecoveryUnit::new(Arc::clone(&engine));
    let loc = store.insert(&ru, RecordId(1), b"abcd").unwrap();
    assert!(store.update(&ru, loc, b"wxyz").is_ok());
    assert_eq!(store.find(&ru, loc).unwrap(), Some(b"wxyz".to_vec()));
    assert!(store.update(&ru, loc, b"too-long").is_err());
    ru.commit(&counters).unwrap();
}

#[test]
fn test_uncommitted_and_undurable_entries_are_not_tailable() {
    let (engine, counters) = new_engine_and_counters();
    let (_blocks, visibility, store) = open_store(&engine, true, Config::default());

    let ru1 = RecoveryUnit::new(Arc::clone(&engine));
    store.insert(&ru1, RecordId(1), b"payload").unwrap();
    ru1.commit(&counters).unwrap();

    let ru2 = RecoveryUnit::new(Arc::clone(&engine));
    let mut cursor = store.tailable_cursor(&ru2).unwrap();
    assert_eq!(cursor.read().unwrap(), None, "committed but not-yet-durable entry must stay invisible");

    visibility.durable_callback(visibility.commit_boundary());

    let ru3 = RecoveryUnit::new(Arc::clone(&engine));
    let mut cursor = store.tailable_cursor(&ru3).unwrap();
    assert_eq!(cursor.read().unwrap(), Some((RecordId(1), b"payload".to_vec())));
}

#[test]
fn test_block_rolls_and_reclaim_removes_oldest_block() {
    let (engine, counters) = new_engine_and_counters();
    let config = Config { min_bytes_per_block: 10, min_blocks: 1, max_blocks: 1 };
    let (blocks, _visibility, store) = open_store(&engine, false, config);

    let ru1 = RecoveryUnit::new(Arc::clone(&engine));
    let loc1 = store.insert(&ru1, RecordId(1), b"0123456789").unwrap();
    ru1.commit(&counters).unwrap();

    let ru2 = RecoveryUnit::new(Arc::clone(&engine));
    let loc2 = store.insert(&ru2, RecordId(2), b"0123456789").unwrap();
    ru2.commit(&counters).unwrap();

    assert!(blocks.has_excess_blocks());
    let reclaimed = store.reclaim_once(&counters).unwrap();
    assert!(reclaimed.is_some());
    assert!(!blocks.has_excess_blocks());

    let ru3 = RecoveryUnit::new(Arc::clone(&engine));
    assert_eq!(store.find(&ru3, loc1).unwrap(), None, "reclaimed block's record must be gone");
    assert_eq!(store.find(&ru3, loc2).unwrap(), Some(b"0123456789".to_vec()));
}

#[test]
fn test_truncate_after_trims_partial_current_block() {
    let (engine, counters) = new_engine_and_counters();
    let (blocks, visibility, store) = open_store(&engine, false, Config::default());

    let ru1 = RecoveryUnit::new(Arc::clone(&engine));
    let loc1 = store.insert(&ru1, RecordId(1), b"aaaa").unwrap();
    let loc2 = store.insert(&ru1, RecordId(2), b"bbbb").unwrap();
    let loc3 = store.insert(&ru1, RecordId(3), b"cccc").unwrap();
    ru1.commit(&counters).unwrap();

    let ru2 = RecoveryUnit::new(Arc::clone(&engine));
    store.truncate_after(&ru2, RecordId(1), false).unwrap();
    ru2.commit(&counters).unwrap();

    let ru3 = RecoveryUnit::new(Arc::clone(&engine));
    assert_eq!(store.find(&ru3, loc1).unwrap(), Some(b"aaaa".to_vec()), "record at boundary kept");
    assert_eq!(store.find(&ru3, loc2).unwrap(), None, "record past boundary removed");
    assert_eq!(store.find(&ru3, loc3).unwrap(), None, "record past boundary removed");
    assert_eq!(blocks.highest_rec(), RecordId(1));
    assert_eq!(visibility.commit_boundary(), RecordId(2));
}

#[test]
fn test_truncate_after_inclusive_removes_boundary_record_too() {
    let (engine, counters) = new_engine_and_counters();
    let (_blocks, _visibility, store) = open_store(&engine, false, Config::default());

    let ru1 = RecoveryUnit::new(Arc::clone(&engine));
    let loc1 = store.insert(&ru1, RecordId(1), b"aaaa").unwrap();
    let loc2 = store.insert(&ru1, RecordId(2), b"bbbb").unwrap();
    ru1.commit(&counters).unwrap();

    let ru2 = RecoveryUnit::new(Arc::clone(&engine));
    store.truncate_after(&ru2, RecordId(1), true).unwrap();
    ru2.commit(&counters).unwrap();

    let ru3 = RecoveryUnit::new(Arc::clone(&engine));
    assert_eq!(store.find(&ru3, loc1).unwrap(), None, "inclusive boundary record is removed too");
    assert_eq!(store.find(&ru3, loc2).unwrap(), None);
}

#[test]
fn test_startup_recovery_across_simulated_crash() {
    let engine: Arc<dyn KVEngine> = Arc::new(MemEngine::new());
    let counters = CounterManager::new();
    counters.register(Prefix(1), crate::record_store::base::NUMRECORDS, 0);
    counters.register(Prefix(1), crate::record_store::base::DATASIZE, 0);

    let config = Config { min_bytes_per_block: 10, min_blocks: 1, max_blocks: 100 };
    let ru1 = RecoveryUnit::new(Arc::clone(&engine));
    let blocks1 = Arc::new(BlockManager::open(&ru1, Prefix(1), config).unwrap());
    let visibility1 = VisibilityManager::new(false);
    let store1 = OplogStore::new(Prefix(1), Arc::clone(&engine), Arc::clone(&blocks1), Arc::clone(&visibility1));
    let loc1 = store1.insert(&ru1, RecordId(1), b"committed").unwrap();
    blocks1.checkpoint_current(&ru1).unwrap();
    ru1.commit(&counters).unwrap();

    // A second, never-committed transaction simulates an in-flight write
    // lost to a crash: it must not be visible after "restart".
    let ru_crashed = RecoveryUnit::new(Arc::clone(&engine));
    store1.insert(&ru_crashed, RecordId(2), b"lost").unwrap();
    ru_crashed.abort().unwrap();

    let ru2 = RecoveryUnit::new(Arc::clone(&engine));
    let blocks2 = Arc::new(BlockManager::open(&ru2, Prefix(1), config).unwrap());
    let visibility2 = VisibilityManager::new(false);
    let store2 = OplogStore::new(Prefix(1), Arc::clone(&engine), Arc::clone(&blocks2), Arc::clone(&visibility2));

    assert_eq!(store2.find(&ru2, loc1).unwrap(), Some(b"committed".to_vec()));
    assert_eq!(blocks2.current_block_id(), blocks1.current_block_id());
    assert_eq!(
        store2.find(&ru2, Loc::new(Prefix(1), RecordId(2))).unwrap(),
        None,
        "aborted insert must not have survived"
    );
}
