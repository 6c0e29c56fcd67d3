use std::sync::Arc;

use super::*;
use crate::{
    index::{standard, unique},
    kvs::{mem::MemEngine, Direction},
    recovery_unit::RecoveryUnit,
};

fn new_ru() -> RecoveryUnit {
    RecoveryUnit::new(Arc::new(MemEngine::new()))
}

#[test]
fn test_standard_cursor_forward_scan_in_key_order() {
    let ru = new_ru();
    standard::insert(&ru, Prefix(1), b"a", RecordId(1), 0).unwrap();
    standard::insert(&ru, Prefix(1), b"b", RecordId(1), 0).unwrap();
    standard::insert(&ru, Prefix(1), b"c", RecordId(1), 0).unwrap();

    let mut cur = IndexCursor::new(&ru, Prefix(1), Kind::Standard, Direction::Forward).unwrap();
    let mut seen = Vec::new();
    while let Some(entry) = cur.read().unwrap() {
        seen.push(entry.key_string);
        cur.advance().unwrap();
    }
    assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn test_standard_cursor_same_key_string_multiple_ids() {
    let ru = new_ru();
    standard::insert(&ru, Prefix(1), b"a", RecordId(1), 0).unwrap();
    standard::insert(&ru, Prefix(1), b"a", RecordId(2), 0).unwrap();

    let mut cur = IndexCursor::new(&ru, Prefix(1), Kind::Standard, Direction::Forward).unwrap();
    let first = cur.read().unwrap().unwrap();
    cur.advance().unwrap();
    let second = cur.read().unwrap().unwrap();

    assert_eq!(first.key_string, b"a");
    assert_eq!(second.key_string, b"a");
    assert!(first.id.0 < second.id.0);
}

#[test]
fn test_unique_cursor_seek_inclusive_takes_point_get_path() {
    let ru = new_ru();
    unique::insert(&ru, Prefix(2), b"x", RecordId(7), 0, false).unwrap();

    let mut cur = IndexCursor::new(&ru, Prefix(2), Kind::Unique, Direction::Forward).unwrap();
    cur.seek(&ru, b"x", true).unwrap();
    let entry = cur.read().unwrap().unwrap();
    assert_eq!(entry.key_string, b"x");
    assert_eq!(entry.id, RecordId(7));
}

#[test]
fn test_unique_cursor_expands_multi_id_entry() {
    let ru = new_ru();
    unique::insert(&ru, Prefix(2), b"x", RecordId(1), 0, true).unwrap();
    unique::insert(&ru, Prefix(2), b"x", RecordId(2), 0, true).unwrap();

    let mut cur = IndexCursor::new(&ru, Prefix(2), Kind::Unique, Direction::Forward).unwrap();
    let first = cur.read().unwrap().unwrap();
    cur.advance().unwrap();
    let second = cur.read().unwrap().unwrap();
    cur.advance().unwrap();
    assert_eq!(cur.read().unwrap(), None);

    assert_eq!(first.id, RecordId(1));
    assert_eq!(second.id, RecordId(2));
}

#[test]
fn test_standard_cursor_seek_inclusive_takes_point_get_path_on_single_match() {
    let ru = new_ru();
    standard::insert(&ru, Prefix(1), b"a", RecordId(1), 0).unwrap();
    standard::insert(&ru, Prefix(1), b"b", RecordId(2), 0).unwrap();

    let mut cur = IndexCursor::new(&ru, Prefix(1), Kind::Standard, Direction::Forward).unwrap();
    cur.seek(&ru, b"a", true).unwrap();
    let entry = cur.read().unwrap().unwrap();
    assert_eq!(entry.key_string, b"a");
    assert_eq!(entry.id, RecordId(1));
}

#[test]
fn test_standard_cursor_seek_inclusive_falls_through_to_cursor_on_duplicate_key_string() {
    let ru = new_ru();
    standard::insert(&ru, Prefix(1), b"a", RecordId(1), 0).unwrap();
    standard::insert(&ru, Prefix(1), b"a", RecordId(2), 0).unwrap();

    let mut cur = IndexCursor::new(&ru, Prefix(1), Kind::Standard, Direction::Forward).unwrap();
    cur.seek(&ru, b"a", true).unwrap();
    let first = cur.read().unwrap().unwrap();
    cur.advance().unwrap();
    let second = cur.read().unwrap().unwrap();
    assert_eq!(first.id, RecordId(1));
    assert_eq!(second.id, RecordId(2));
}

#[test]
fn test_restore_after_point_get_reseeks_past_consumed_key() {
    let ru = new_ru();
    unique::insert(&ru, Prefix(2), b"x", RecordId(1), 0, false).unwrap();
    unique::insert(&ru, Prefix(2), b"y", RecordId(2), 0, false).unwrap();

    let mut cur = IndexCursor::new(&ru, Prefix(2), Kind::Unique, Direction::Forward).unwrap();
    cur.seek(&ru, b"x", true).unwrap();
    let entry = cur.read().unwrap().unwrap();
    assert_eq!(entry.key_string, b"x");
    cur.advance().unwrap();

    cur.restore().unwrap();
    let next = cur.read().unwrap().unwrap();
    assert_eq!(next.key_string, b"y");
}
