use super::*;

#[test]
fn test_inline_round_trip() {
    let data = b"hello world".to_vec();
    let chunks = frame(&data, None);
    assert_eq!(chunks.len(), 1);
    let bytes: Vec<Vec<u8>> = chunks.into_iter().map(|c| c.bytes).collect();
    let (algo, out) = unframe(&bytes, false).unwrap();
    assert_eq!(algo, None);
    assert_eq!(out, data);
}

#[test]
fn test_boundary_inline_vs_chunked() {
    assert!(is_inline(VMAX - VALUE_META_SIZE));
    assert!(!is_inline(VMAX - VALUE_META_SIZE + 1));
}

#[test]
fn test_chunked_round_trip_uncompressed() {
    let data = vec![7_u8; VMAX * 3 + 17];
    let chunks = frame(&data, None);
    assert_eq!(chunk_count(data.len(), VMAX) + 1, chunks.len());
    let bytes: Vec<Vec<u8>> = chunks.into_iter().map(|c| c.bytes).collect();
    let (algo, out) = unframe(&bytes, false).unwrap();
    assert_eq!(algo, None);
    assert_eq!(out, data);
}

#[test]
fn test_chunked_round_trip_compressed() {
    let data = vec![9_u8; VMAX * 2];
    // Stand-in for a real codec's output: large enough to still need chunking.
    let compressed = vec![3_u8; VMAX + 100];
    let chunks = frame(&data, Some((CompAlgo::Zstd, &compressed)));
    assert!(chunks.len() > 1);
    let bytes: Vec<Vec<u8>> = chunks.into_iter().map(|c| c.bytes).collect();
    let (algo, out) = unframe(&bytes, true).unwrap();
    assert_eq!(algo, Some(CompAlgo::Zstd));
    assert_eq!(out, compressed);
}

#[test]
fn test_chunk_count_formula() {
    assert_eq!(chunk_count(VMAX - VALUE_META_SIZE, VMAX), 0);
    assert_eq!(chunk_count(VMAX - VALUE_META_SIZE + 1, VMAX), 1);
}
