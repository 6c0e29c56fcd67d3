use std::{sync::Arc, thread};

use super::*;

#[test]
fn test_read_write_excludes() {
    let spin = Arc::new(Spinlock::new(0_u64));

    let mut writers = vec![];
    for _ in 0..4 {
        let spin = Arc::clone(&spin);
        writers.push(thread::spawn(move || {
            for _ in 0..1000 {
                let mut w = spin.write();
                *w += 1;
            }
        }));
    }
    for w in writers {
        w.join().unwrap();
    }

    assert_eq!(*spin.read(), 4000);
}

#[test]
fn test_concurrent_readers_allowed() {
    let spin = Arc::new(Spinlock::new(42_u64));

    let mut readers = vec![];
    for _ in 0..8 {
        let spin = Arc::clone(&spin);
        readers.push(thread::spawn(move || {
            for _ in 0..100 {
                assert_eq!(*spin.read(), 42);
            }
        }));
    }
    for r in readers {
        r.join().unwrap();
    }
}
