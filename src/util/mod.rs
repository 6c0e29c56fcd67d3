//! Small, dependency-light helpers shared across the crate: cbor framing,
//! LEB128 varints for the value-framing header, and a Fibonacci-sequence
//! backoff for cursor-create retries under backend resource pressure.

pub mod backoff;
pub mod kbuf;
pub mod spinlock;

pub use kbuf::KBuf;
pub use spinlock::Spinlock;

use cbordata::{Cbor, FromCbor, IntoCbor};

use crate::error::Result;

/// Serialize `val` to its cbor encoding. Used for ident config blobs and
/// persisted counters — anything this crate writes into the KVS-backend's
/// metadata key spaces.
pub fn into_cbor_bytes<T>(val: T) -> Result<Vec<u8>>
where
    T: IntoCbor,
{
    let mut data: Vec<u8> = vec![];
    let n = err_at!(FailCbor, err_at!(FailCbor, val.into_cbor())?.encode(&mut data))?;
    if n != data.len() {
        err_at!(FailCbor, msg: "cbor encoding length mismatch {} != {}", n, data.len())
    } else {
        Ok(data)
    }
}

/// Deserialize `T` from its cbor encoding, returning the value and the
/// number of bytes consumed.
pub fn from_cbor_bytes<T>(mut data: &[u8]) -> Result<(T, usize)>
where
    T: FromCbor,
{
    let (val, n) = err_at!(FailCbor, Cbor::decode(&mut data))?;
    Ok((err_at!(FailCbor, T::from_cbor(val))?, n))
}

/// Maximum bytes an LEB128 encoding of a 32-bit length can occupy.
pub const MAX_BYTES_LEB128: usize = 5;

/// Append the LEB128 (unsigned, little-endian base-128) encoding of `val` to
/// `buf`. Used for the uncompressed-length field that follows the
/// compression-algorithm byte in chunked value framing.
pub fn leb128_encode(mut val: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if val == 0 {
            break;
        }
    }
}

/// Decode an LEB128-encoded unsigned integer from the front of `buf`,
/// returning the value and the number of bytes consumed.
pub fn leb128_decode(buf: &[u8]) -> Result<(u64, usize)> {
    let mut val: u64 = 0;
    let mut shift = 0;
    for (i, byte) in buf.iter().enumerate() {
        val |= ((byte & 0x7f) as u64) << shift;
        if (byte & 0x80) == 0 {
            return Ok((val, i + 1));
        }
        shift += 7;
        if i + 1 >= MAX_BYTES_LEB128 {
            return err_at!(FailConvert, msg: "leb128 varint longer than {} bytes", MAX_BYTES_LEB128);
        }
    }
    err_at!(FailConvert, msg: "truncated leb128 varint")
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
