use std::{sync::Arc, thread, time::Duration};

use super::*;
use crate::{kvs::mem::MemEngine, types::RecordId};

#[test]
fn test_non_durable_is_noop() {
    let dm = DurabilityManager::new(false);
    let eng = MemEngine::new();
    dm.sync(&eng).unwrap();
    assert_eq!(dm.generation(), 0);
    dm.wait_until_durable().unwrap();
}

#[test]
fn test_sync_advances_generation_and_notifies_oplog() {
    let dm = DurabilityManager::new(true);
    let vm = VisibilityManager::new(true);
    let reg = vm.add_uncommitted(RecordId(3));
    vm.resolve(reg, true);
    dm.set_oplog_visibility(Some(Arc::clone(&vm)));

    let eng = MemEngine::new();
    dm.sync(&eng).unwrap();

    assert_eq!(dm.generation(), 1);
    assert_eq!(vm.persist_boundary(), vm.commit_boundary());
}

#[test]
fn test_wait_until_durable_requires_two_generations() {
    let dm = DurabilityManager::new(true);
    let eng = Arc::new(MemEngine::new());

    let dm2 = Arc::clone(&dm);
    let eng2 = Arc::clone(&eng);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        dm2.sync(eng2.as_ref()).unwrap();
        thread::sleep(Duration::from_millis(10));
        dm2.sync(eng2.as_ref()).unwrap();
    });

    dm.wait_until_durable().unwrap();
    handle.join().unwrap();
    assert!(dm.generation() >= 2);
}
