use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

use super::*;

#[test]
fn test_snooze_exhausts() {
    let mut backoff = Backoff::new();
    for _ in 0..MAX_ATTEMPTS {
        backoff.snooze().unwrap();
    }
    match backoff.snooze() {
        Err(crate::error::Error::Timeout(_, _)) => (),
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[test]
fn test_retry_succeeds_eventually() {
    let tries = AtomicUsize::new(0);
    let val = retry(|| {
        if tries.fetch_add(1, SeqCst) < 3 {
            Ok(None)
        } else {
            Ok(Some(42))
        }
    })
    .unwrap();
    assert_eq!(val, 42);
    assert_eq!(tries.load(SeqCst), 4);
}

#[test]
fn test_retry_propagates_error() {
    let res: Result<()> = retry(|| err_at!(Timeout, msg: "no more retries"));
    assert!(res.is_err());
}
