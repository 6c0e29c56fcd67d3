//! A small borrowed-or-owned byte buffer, avoiding a copy when a backend
//! call can hand back a slice it already owns.

use std::borrow::Cow;

/// Either a reference into someone else's buffer or an owned `Vec<u8>`.
/// Record-store and index code pass this across the `KVEngine` boundary so
/// a point read that the backend can satisfy from its own cache never pays
/// for an extra allocation, while a cursor-assembled or chunk-reframed
/// value still has somewhere to live.
#[derive(Clone, Debug)]
pub struct KBuf<'a>(Cow<'a, [u8]>);

impl<'a> KBuf<'a> {
    pub fn borrowed(bytes: &'a [u8]) -> KBuf<'a> {
        KBuf(Cow::Borrowed(bytes))
    }

    pub fn owned(bytes: Vec<u8>) -> KBuf<'static> {
        KBuf(Cow::Owned(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take ownership, cloning only if this was borrowed.
    pub fn into_owned(self) -> Vec<u8> {
        self.0.into_owned()
    }
}

impl<'a> From<&'a [u8]> for KBuf<'a> {
    fn from(bytes: &'a [u8]) -> KBuf<'a> {
        KBuf::borrowed(bytes)
    }
}

impl From<Vec<u8>> for KBuf<'static> {
    fn from(bytes: Vec<u8>) -> KBuf<'static> {
        KBuf::owned(bytes)
    }
}

impl<'a> AsRef<[u8]> for KBuf<'a> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'a> PartialEq for KBuf<'a> {
    fn eq(&self, other: &KBuf<'a>) -> bool {
        self.0 == other.0
    }
}

#[cfg(test)]
#[path = "kbuf_test.rs"]
mod kbuf_test;
