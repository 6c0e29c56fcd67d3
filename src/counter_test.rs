use super::*;
use crate::types::Prefix;

#[test]
fn test_register_and_increment() {
    let cm = CounterManager::new();
    cm.register(Prefix(1), "numrecords", 0);
    cm.increment(Prefix(1), "numrecords", 3);
    cm.increment(Prefix(1), "numrecords", -1);
    assert_eq!(cm.get(Prefix(1), "numrecords"), Some(2));
}

#[test]
fn test_unregistered_counter_increment_is_noop() {
    let cm = CounterManager::new();
    assert!(!cm.increment(Prefix(9), "datasize", 5));
    assert_eq!(cm.get(Prefix(9), "datasize"), None);
}

#[test]
fn test_sync_crosses_threshold_and_resets() {
    let cm = CounterManager::new();
    cm.register(Prefix(1), "numrecords", 0);
    let mut crossed = false;
    for _ in 0..SYNC_EVERY {
        crossed = cm.increment(Prefix(1), "numrecords", 1);
    }
    assert!(crossed);

    let mut persisted = vec![];
    cm.sync(|p, n, v| {
        persisted.push((p, n, v));
        Ok(())
    })
    .unwrap();
    assert_eq!(persisted, vec![(Prefix(1), "numrecords", SYNC_EVERY as i64)]);
}

#[test]
fn test_sync_for_rename_always_flushes() {
    let cm = CounterManager::new();
    cm.register(Prefix(2), "indexsize", 7);
    let mut persisted = vec![];
    cm.sync_for_rename(|p, n, v| {
        persisted.push((p, n, v));
        Ok(())
    })
    .unwrap();
    assert_eq!(persisted, vec![(Prefix(2), "indexsize", 7)]);
}
