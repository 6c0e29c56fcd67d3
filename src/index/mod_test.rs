use super::*;

#[test]
fn test_standard_key_round_trip() {
    let prefix = Prefix(7);
    let key_string = b"hello";
    let id = RecordId(42);
    let key = standard_key(prefix, key_string, id);

    assert_eq!(&key[..4], &prefix.to_be_bytes());
    let (ks, got_id) = split_standard_key(&key);
    assert_eq!(ks, key_string);
    assert_eq!(got_id, id);
}

#[test]
fn test_unique_key_has_no_record_id_suffix() {
    let prefix = Prefix(3);
    let key_string = b"world";
    let key = unique_key(prefix, key_string);
    assert_eq!(key.len(), 4 + key_string.len());
    assert_eq!(key_string_of_unique_key(&key), key_string);
}

#[test]
fn test_standard_keys_with_same_key_string_differ_by_record_id() {
    let prefix = Prefix(1);
    let a = standard_key(prefix, b"k", RecordId(1));
    let b = standard_key(prefix, b"k", RecordId(2));
    assert_ne!(a, b);
    assert!(a < b, "ordering must follow record id for equal key strings");
}
