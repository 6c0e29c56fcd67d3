//! A pluggable storage-engine adapter that exposes a document database's
//! key-value storage contract on top of an embedded KVS backend.
//!
//! Organised around a recovery unit per operation, a visibility manager
//! that tracks the oldest point at which every prior commit is visible, a
//! durability manager driving background sync, and three record-store
//! flavours (base, capped, oplog) built over one key-string index layer.
//!
//! Every fallible operation threads [`error::Result`]; invariant violations
//! (corruption, impossible states) go through [`error::fatal`] instead of
//! being propagated, so they are never silently swallowed or retried.

#[macro_use]
mod error;
mod util;

pub use crate::error::{Error, Result};

pub mod types;
pub mod ident;
pub mod kvs;
pub mod txn;
pub mod value_framing;
pub mod visibility;
pub mod counter;
pub mod durability;
pub mod recovery_unit;
pub mod index;
pub mod record_store;
pub mod stats;
