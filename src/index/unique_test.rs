use std::sync::Arc;

use super::*;
use crate::{kvs::mem::MemEngine, recovery_unit::RecoveryUnit};

fn new_ru() -> RecoveryUnit {
    RecoveryUnit::new(Arc::new(MemEngine::new()))
}

#[test]
fn test_insert_then_dup_check() {
    let ru = new_ru();
    insert(&ru, Prefix(1), b"alice", RecordId(10), 0, false).unwrap();
    assert!(dup_check(&ru, Prefix(1), b"alice", RecordId(99)).unwrap());
    assert!(!dup_check(&ru, Prefix(1), b"alice", RecordId(10)).unwrap());
}

#[test]
fn test_duplicate_insert_rejected_without_allow_dup() {
    let ru = new_ru();
    insert(&ru, Prefix(1), b"alice", RecordId(10), 0, false).unwrap();
    let err = insert(&ru, Prefix(1), b"alice", RecordId(11), 0, false).unwrap_err();
    matches!(err, crate::Error::DuplicateKey(_, _));
}

#[test]
fn test_reinsert_same_id_is_noop_ok() {
    let ru = new_ru();
    insert(&ru, Prefix(1), b"alice", RecordId(10), 0, false).unwrap();
    insert(&ru, Prefix(1), b"alice", RecordId(10), 0, false).unwrap();
}

#[test]
fn test_allow_dup_accumulates_entries_and_single_entry_value_is_compact() {
    let ru = new_ru();
    insert(&ru, Prefix(1), b"alice", RecordId(10), 0, true).unwrap();
    let raw = ru.get(&unique_key(Prefix(1), b"alice")).unwrap().unwrap();
    assert_eq!(raw.len(), 8, "single zero-type-bits entry omits the trailer");

    insert(&ru, Prefix(1), b"alice", RecordId(20), 3, true).unwrap();
    let raw = ru.get(&unique_key(Prefix(1), b"alice")).unwrap().unwrap();
    assert_eq!(raw.len(), 18, "two entries each carry a type-bits byte");
}

#[test]
fn test_unindex_removes_one_entry_and_drops_key_when_empty() {
    let ru = new_ru();
    insert(&ru, Prefix(1), b"alice", RecordId(10), 0, true).unwrap();
    insert(&ru, Prefix(1), b"alice", RecordId(20), 0, true).unwrap();

    unindex(&ru, Prefix(1), b"alice", RecordId(10)).unwrap();
    let raw = ru.get(&unique_key(Prefix(1), b"alice")).unwrap().unwrap();
    assert_eq!(raw.len(), 8);

    unindex(&ru, Prefix(1), b"alice", RecordId(20)).unwrap();
    assert_eq!(ru.get(&unique_key(Prefix(1), b"alice")).unwrap(), None);
}

#[test]
fn test_key_too_long_rejected() {
    let ru = new_ru();
    let huge = vec![b'x'; MAX_KEY_LEN + 1];
    let err = insert(&ru, Prefix(1), &huge, RecordId(1), 0, false).unwrap_err();
    matches!(err, crate::Error::KeyTooLong(_, _));
}
