use super::*;

#[test]
fn test_prefix_round_trip() {
    let p = Prefix(0x01020304);
    assert_eq!(Prefix::from_be_bytes(&p.to_be_bytes()), p);
    assert_eq!(p.next(), Prefix(0x01020305));
}

#[test]
fn test_record_id_ordering_matches_bytes() {
    let a = RecordId(1);
    let b = RecordId(2);
    assert!(a < b);
    assert!(a.to_be_bytes() < b.to_be_bytes());
}

#[test]
fn test_block_id_start_and_sentinel() {
    assert_eq!(BlockId::START.0, 5);
    assert_eq!(BlockId::SENTINEL.0, 0xFFFF_FFFF);
    assert!(BlockId::START < BlockId::SENTINEL);
}

#[test]
fn test_comp_algo_byte_round_trip() {
    assert_eq!(CompAlgo::from_byte(CompAlgo::None.to_byte()), Some(CompAlgo::None));
    assert_eq!(CompAlgo::from_byte(CompAlgo::Zstd.to_byte()), Some(CompAlgo::Zstd));
    assert_eq!(CompAlgo::from_byte(42), None);
}
