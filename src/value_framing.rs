//! Inline vs chunked value framing.
//!
//! A value that fits within a single backend write is stored inline under
//! its record's master key. A larger value gets a 4-byte big-endian total
//! length header followed by the first chunk under the master key, with
//! the remaining chunks under `master-key ‖ chunk-index` in the ident's
//! "large" key space. When compression is active, the length header is
//! followed by a 1-byte algorithm byte and an LEB128 uncompressed length.

use crate::{
    error::Result,
    kvs::VMAX,
    types::CompAlgo,
    util::{leb128_decode, leb128_encode, MAX_BYTES_LEB128},
};

/// Bytes consumed by the big-endian total-length header prefixing every
/// chunked value's master record.
pub const VALUE_META_SIZE: usize = 4;

/// Number of additional chunk keys (beyond the master key) a value of
/// `len` bytes requires, given a per-value byte ceiling of `vmax`.
/// `len` is the length of the framed payload (post value-meta header,
/// pre compression framing).
pub fn chunk_count(len: usize, vmax: usize) -> usize {
    let framed = len + VALUE_META_SIZE;
    if framed <= vmax {
        0
    } else {
        (framed + vmax - 1) / vmax - 1
    }
}

/// Whether a value of `len` bytes is stored inline (true) or chunked
/// (false) under the default [`VMAX`] ceiling.
pub fn is_inline(len: usize) -> bool {
    len + VALUE_META_SIZE <= VMAX
}

/// One physical chunk to write: `index` 0 is the master key's value
/// (carrying the header), `index` > 0 are large-key-space suffixes.
pub struct Chunk {
    pub index: u8,
    pub bytes: Vec<u8>,
}

/// Split `data` into its master-key chunk and any overflow chunks, framing
/// the master chunk with the 4-byte length header and, if `algo` is not
/// `None`, the algorithm byte and LEB128 uncompressed length.
///
/// `compressed` must already hold `data` run through the configured codec
/// (compression itself is out of scope here; this module only frames it).
pub fn frame(data: &[u8], compressed: Option<(CompAlgo, &[u8])>) -> Vec<Chunk> {
    let total_len = data.len() as u32;

    let mut header = Vec::with_capacity(VALUE_META_SIZE + 1 + MAX_BYTES_LEB128);
    header.extend_from_slice(&total_len.to_be_bytes());

    let payload: &[u8] = match compressed {
        Some((algo, comp_bytes)) => {
            header.push(algo.to_byte());
            leb128_encode(data.len() as u64, &mut header);
            comp_bytes
        }
        None => data,
    };

    let mut master = header;
    master.extend_from_slice(payload);

    if master.len() <= VMAX {
        return vec![Chunk { index: 0, bytes: master }];
    }

    let mut chunks = vec![];
    let mut rest = &master[..];
    let mut idx = 0_u8;
    while !rest.is_empty() {
        let take = rest.len().min(VMAX);
        chunks.push(Chunk { index: idx, bytes: rest[..take].to_vec() });
        rest = &rest[take..];
        idx += 1;
    }
    chunks
}

/// Reassemble `chunks` (in index order, as returned by a record store's
/// chunk scan) back into the original value, reversing [`frame`]. `active`
/// must reflect whether the ident's config has compression enabled for
/// this key space — the framing is ambiguous from the bytes alone, since
/// an uncompressed payload may start with any byte value.
///
/// Returns the decoded algorithm (`None` if compression is not active for
/// this ident) and the payload bytes, still in their on-disk (possibly
/// compressed) form — decompression is left to the caller, matching the
/// framing/codec split named above.
pub fn unframe(chunks: &[Vec<u8>], active: bool) -> Result<(Option<CompAlgo>, Vec<u8>)> {
    let master = chunks.concat();
    if master.len() < VALUE_META_SIZE {
        return err_at!(FailConvert, msg: "chunked value shorter than header {}", master.len());
    }
    let rest = &master[VALUE_META_SIZE..];

    if !active {
        return Ok((None, rest.to_vec()));
    }

    let algo_byte = *rest.first().unwrap_or(&0);
    match CompAlgo::from_byte(algo_byte) {
        Some(algo) => {
            let (_uncompressed_len, n) = leb128_decode(&rest[1..])?;
            Ok((Some(algo), rest[1 + n..].to_vec()))
        }
        None => err_at!(FailConvert, msg: "unrecognized compression algorithm byte {}", algo_byte),
    }
}

#[cfg(test)]
#[path = "value_framing_test.rs"]
mod value_framing_test;
