use super::*;
use crate::types::RecordId;

#[test]
fn test_master_key_round_trip() {
    let key = master_key(Prefix(9), RecordId(42));
    assert_eq!(key.len(), 12);
    assert!(is_master_key(&key));
    assert_eq!(record_id_of_master_key(&key), RecordId(42));
}

#[test]
fn test_chunk_key_is_not_a_master_key() {
    let master = master_key(Prefix(9), RecordId(42));
    let chunk = chunk_key(&master, 1);
    assert_eq!(chunk.len(), 13);
    assert!(!is_master_key(&chunk));
}
