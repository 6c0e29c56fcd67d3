use super::*;

#[test]
fn test_leb128_round_trip() {
    for val in [0_u64, 1, 127, 128, 300, 16384, u32::MAX as u64] {
        let mut buf = vec![];
        leb128_encode(val, &mut buf);
        assert!(buf.len() <= MAX_BYTES_LEB128);
        let (got, n) = leb128_decode(&buf).unwrap();
        assert_eq!(got, val);
        assert_eq!(n, buf.len());
    }
}

#[test]
fn test_leb128_decode_truncated() {
    let buf = [0x80_u8, 0x80];
    assert!(leb128_decode(&buf).is_err());
}

#[test]
fn test_leb128_decode_too_long() {
    let buf = [0x80_u8; MAX_BYTES_LEB128 + 1];
    assert!(leb128_decode(&buf).is_err());
}
