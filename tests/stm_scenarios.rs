//! End-to-end transactional scenarios
//!
//! Each scenario creates its own world so write-point assertions are
//! deterministic; one smoke test exercises the default-world facade.

use mvstm::{Config, Error, Ref, World, WritePoint};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_default_world_facade_smoke() {
    use mvstm::prelude::*;

    let cell = Ref::new(0i64);
    let value = run(|| cell.alter(|n| n + 5)).unwrap();
    assert_eq!(value, 5);
    assert_eq!(cell.read().unwrap(), 5);
}

#[test]
fn test_counter_100_threads_commute_without_retry() {
    let world = World::new(Config::default());
    let counter = world.new_ref(0i64);
    let attempts = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let world = Arc::clone(&world);
            let counter = counter.clone();
            let attempts = Arc::clone(&attempts);
            thread::spawn(move || {
                world
                    .run(|| {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        counter.commute(|n| n + 1)
                    })
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.read().unwrap(), 100);
    // Commuters never conflict with each other: no transaction retried.
    assert_eq!(attempts.load(Ordering::SeqCst), 100);
}

#[test]
fn test_bank_transfer_preserves_total() {
    let world = World::new(Config::default());
    let a = world.new_ref(100i64);
    let b = world.new_ref(0i64);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let world = Arc::clone(&world);
            let a = a.clone();
            let b = b.clone();
            thread::spawn(move || {
                world
                    .run(|| {
                        a.write(a.read()? - 10)?;
                        b.write(b.read()? + 10)
                    })
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let (final_a, final_b) = (a.read().unwrap(), b.read().unwrap());
    assert_eq!(final_a + final_b, 100);
    assert_eq!(final_a, 80);
    assert_eq!(final_b, 20);
}

/// Drive two transactions into the write-skew interleaving: both read
/// both refs before either commits. The barrier fires only on each
/// thread's first attempt; retries skip it.
fn run_write_skew(use_ensure: bool) -> (i64, i64) {
    let world = World::new(Config::default());
    let x = world.new_ref(1i64);
    let y = world.new_ref(1i64);
    let barrier = Arc::new(Barrier::new(2));

    let spawn_skewer = |reads: Ref<i64>, writes: Ref<i64>| {
        let world = Arc::clone(&world);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut first_attempt = true;
            world
                .run(|| {
                    if use_ensure {
                        reads.ensure()?;
                    }
                    let observed = reads.read()?;
                    if first_attempt {
                        first_attempt = false;
                        barrier.wait();
                    }
                    if observed == 1 {
                        writes.write(0)?;
                    }
                    Ok(())
                })
                .unwrap();
        })
    };

    let t1 = spawn_skewer(y.clone(), x.clone());
    let t2 = spawn_skewer(x.clone(), y.clone());
    t1.join().unwrap();
    t2.join().unwrap();

    (x.read().unwrap(), y.read().unwrap())
}

#[test]
fn test_write_skew_occurs_without_ensure() {
    // Each transaction validates only the ref it wrote, so both commit
    // and the cross-ref invariant breaks. This is the documented
    // snapshot-isolation anomaly ensure exists to close.
    let (x, y) = run_write_skew(false);
    assert_eq!((x, y), (0, 0));
}

#[test]
fn test_ensure_prevents_write_skew() {
    // The ensured ref joins the validation set: whichever transaction
    // commits second sees the other's write, retries, observes 0, and
    // writes nothing. The invariant x + y >= 1 holds.
    let (x, y) = run_write_skew(true);
    assert!(x + y >= 1, "write skew broke the invariant: x={} y={}", x, y);
    assert_eq!(x + y, 1, "exactly one transaction should have written");
}

#[test]
fn test_history_exhaustion_forces_retry_against_latest() {
    let world = World::new(Config::with_max_history(3));
    let r = world.new_ref(0i64);
    let attempts = Arc::new(AtomicUsize::new(0));

    let committer = Arc::clone(&world);
    let r2 = r.clone();
    let attempts2 = Arc::clone(&attempts);
    let observed = world
        .run(move || {
            // First attempt snapshots read point 0, then four commits
            // push every entry it could see out of the depth-3 window.
            if attempts2.fetch_add(1, Ordering::SeqCst) == 0 {
                let committer = Arc::clone(&committer);
                let r2 = r2.clone();
                thread::spawn(move || {
                    for i in 1..=4i64 {
                        committer.run(|| r2.write(i * 10)).unwrap();
                    }
                })
                .join()
                .unwrap();
            }
            r2.read()
        })
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(observed, 40);
    assert!(r.history_len() <= 3);
}

#[test]
fn test_write_after_commute_aborts_without_publishing() {
    let world = World::new(Config::default());
    let r = world.new_ref(0i64);

    let result = world.run(|| {
        r.commute(|n| n + 1)?;
        r.write(5)
    });

    assert_eq!(result, Err(Error::WriteAfterCommute));
    assert_eq!(r.read().unwrap(), 0);
    assert_eq!(world.current_write_point(), WritePoint::ZERO);
}

#[test]
fn test_outside_transaction_read_works_writes_fail() {
    let world = World::new(Config::default());
    let r = world.new_ref(7i64);

    assert_eq!(r.write(9), Err(Error::NotInTransaction { op: "write" }));
    assert_eq!(r.read().unwrap(), 7);
}

#[test]
fn test_snapshot_reads_are_repeatable_within_a_transaction() {
    let world = World::new(Config::default());
    let r = world.new_ref(1i64);
    let attempts = Arc::new(AtomicUsize::new(0));

    let interferer = Arc::clone(&world);
    let r2 = r.clone();
    let attempts2 = Arc::clone(&attempts);
    world
        .run(move || {
            let first = r2.read()?;
            if attempts2.fetch_add(1, Ordering::SeqCst) == 0 {
                let interferer = Arc::clone(&interferer);
                let r3 = r2.clone();
                thread::spawn(move || interferer.run(|| r3.write(999)))
                    .join()
                    .unwrap()
                    .unwrap();
            }
            // Cached at the read point: the concurrent commit is invisible.
            let second = r2.read()?;
            assert_eq!(first, second);
            Ok(())
        })
        .unwrap();

    // The transaction was read-only, so it never conflicted.
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(r.read().unwrap(), 999);
}

#[test]
fn test_commutes_reapply_on_top_of_conflicting_writes() {
    let world = World::new(Config::default());
    let r = world.new_ref(0i64);

    let interferer = Arc::clone(&world);
    let r2 = r.clone();
    world
        .run(move || {
            let provisional = r2.commute(|n| n + 1)?;
            // Lands after the provisional computation, before commit.
            let interferer = Arc::clone(&interferer);
            let r3 = r2.clone();
            thread::spawn(move || interferer.run(|| r3.write(100)))
                .join()
                .unwrap()
                .unwrap();
            Ok(provisional)
        })
        .unwrap();

    // No retry happened; the chain was re-applied to the newer head.
    assert_eq!(r.read().unwrap(), 101);
}
