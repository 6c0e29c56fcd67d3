//! Crate-wide error type and the `err_at!` helper for attaching call-site
//! provenance to fallible operations.
//!
//! Every subsystem in this crate threads [`Result`] rather than panicking,
//! with one exception: invariant violations, which are programmer/data
//! corruption errors that must never be silently swallowed or retried. Those
//! go through [`fatal`] instead, which logs, gives log sinks a moment to
//! flush, and aborts the process.

use std::{fmt, result, thread, time};

/// Crate-wide result alias.
pub type Result<T> = result::Result<T, Error>;

/// How long [`fatal`] sleeps before aborting, letting the `log` backend
/// flush pending records.
pub const INVARIANT_SLEEP_MS: u64 = 4_000;

/// Crate-wide error type.
///
/// Every variant carries a `(provenance, detail)` pair: `provenance` is a
/// `file!():line!()` string stamped in by [`err_at`], `detail` is either the
/// stringified upstream error or an explicit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The KVS-backend reported a write-write conflict on put/commit. The
    /// recovery unit must unwind and the host retries the whole operation.
    WriteConflict(String, String),
    /// Backend I/O failure (open/read/write/sync of the underlying store).
    IOError(String, String),
    /// A length, bounds or type conversion failed.
    FailConvert(String, String),
    /// A cbor-encoded value (ident config, block marker, counters) failed
    /// to decode.
    FailCbor(String, String),
    /// Caller-supplied input was invalid (bad ident, bad range, ...).
    InvalidInput(String, String),
    /// Unique-index insert found the key already bound to a different
    /// record id and duplicates are disallowed.
    DuplicateKey(String, String),
    /// Index key exceeded the configured maximum length.
    KeyTooLong(String, String),
    /// Caller attempted an operation the record-store kind disallows, e.g.
    /// changing the length of an oplog entry on update.
    InvalidOperation(String, String),
    /// A value that must exist (ident config, block marker, chunk) was
    /// missing at a point where its absence indicates caller error rather
    /// than corruption.
    KeyNotFound(String, String),
    /// Spawning or joining a background thread failed.
    ThreadFail(String, String),
    /// A cursor-create retry budget was exhausted under sustained backend
    /// resource pressure.
    Timeout(String, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            WriteConflict(p, m) => write!(f, "{} write-conflict: {}", p, m),
            IOError(p, m) => write!(f, "{} io-error: {}", p, m),
            FailConvert(p, m) => write!(f, "{} convert-error: {}", p, m),
            FailCbor(p, m) => write!(f, "{} cbor-error: {}", p, m),
            InvalidInput(p, m) => write!(f, "{} invalid-input: {}", p, m),
            DuplicateKey(p, m) => write!(f, "{} duplicate-key: {}", p, m),
            KeyTooLong(p, m) => write!(f, "{} key-too-long: {}", p, m),
            InvalidOperation(p, m) => write!(f, "{} invalid-operation: {}", p, m),
            KeyNotFound(p, m) => write!(f, "{} key-not-found: {}", p, m),
            ThreadFail(p, m) => write!(f, "{} thread-fail: {}", p, m),
            Timeout(p, m) => write!(f, "{} timeout: {}", p, m),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for the one variant the recovery unit translates into a host
    /// retry rather than propagating as a hard failure.
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, Error::WriteConflict(_, _))
    }
}

/// Attach `file!():line!()` provenance to a fallible expression or construct
/// an `Error` directly from a message.
///
/// ```ignore
/// err_at!(IOError, file.sync_all())?;
/// err_at!(InvalidInput, msg: "ident {} not found", ident)?;
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $msg:expr) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err($crate::error::Error::$v(prefix, $msg))
    }};
    ($v:ident, msg: $fmt:literal $(, $arg:expr)*) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err($crate::error::Error::$v(prefix, format!($fmt $(, $arg)*)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::error::Error::$v(prefix, err.to_string()))
            }
        }
    }};
}

/// Raise an invariant violation: log it, give log sinks [`INVARIANT_SLEEP_MS`]
/// to flush, then abort the process.
///
/// Invariant violations are not recoverable — they indicate either a bug in
/// this crate or on-disk corruption in the KVS-backend, and per the error
/// model they must never unwind through a recovery unit.
pub fn fatal(context: &str, detail: &str) -> ! {
    log::error!("invariant violation at {}: {}", context, detail);
    thread::sleep(time::Duration::from_millis(INVARIANT_SLEEP_MS));
    panic!("invariant violation at {}: {}", context, detail);
}

/// Shorthand for [`fatal`] that stamps in the caller's `file!():line!()`.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        $crate::error::fatal(&prefix, &format!($($arg)+))
    }};
}
