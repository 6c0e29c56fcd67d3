use super::*;

#[test]
fn test_borrowed_does_not_copy_until_owned() {
    let data = vec![1_u8, 2, 3];
    let buf = KBuf::borrowed(&data);
    assert_eq!(buf.as_bytes(), &[1, 2, 3]);
    assert_eq!(buf.len(), 3);
    assert!(!buf.is_empty());
}

#[test]
fn test_owned_roundtrips() {
    let buf: KBuf<'static> = KBuf::owned(vec![4, 5]);
    assert_eq!(buf.clone().into_owned(), vec![4, 5]);
    assert_eq!(buf.as_ref(), &[4, 5]);
}

#[test]
fn test_from_impls() {
    let owned: KBuf<'static> = vec![9_u8].into();
    assert_eq!(owned.as_bytes(), &[9]);

    let data = [7_u8, 8];
    let borrowed: KBuf = (&data[..]).into();
    assert_eq!(borrowed.as_bytes(), &[7, 8]);
}

#[test]
fn test_equality_across_borrowed_and_owned() {
    let data = vec![1_u8, 2];
    let borrowed = KBuf::borrowed(&data);
    let owned = KBuf::owned(vec![1, 2]);
    assert_eq!(borrowed, owned);
}
