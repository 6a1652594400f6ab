//! End-to-end lock workflows through the `redkit` facade.
//!
//! Everything here runs against the in-memory store; the Redis-backed
//! variants live next to the store implementation and need a server.

#![cfg(feature = "lock")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use redkit::prelude::*;
use redkit::redkit_lock::ManualClock;
use tokio_test::assert_ok;

const T0: i64 = 1_700_000_000_000;

fn shared_store() -> (Arc<ManualClock>, Arc<MemoryStore>) {
    let clock = Arc::new(ManualClock::new(T0));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    (clock, store)
}

// =============================================================================
// Lease timeline: A acquires at 0, B retries at 100 and 310, A releases at 320
// =============================================================================

#[tokio::test]
async fn test_timestamp_lock_timeline() {
    let (clock, store) = shared_store();
    let config = LockConfig::default();
    let a = LockBuilder::from_config(&config)
        .with_clock(clock.clone())
        .timestamp(store.clone());
    let b = LockBuilder::from_config(&config)
        .with_clock(clock.clone())
        .timestamp(store.clone());

    assert!(assert_ok!(a.try_acquire().await));

    clock.set(T0 + 100);
    assert!(!assert_ok!(b.try_acquire().await));

    clock.set(T0 + 310);
    assert!(assert_ok!(b.try_acquire().await));

    // B owns the lock, but A's release still deletes it
    clock.set(T0 + 320);
    assert!(assert_ok!(a.release().await));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_token_lock_timeline() {
    let (clock, store) = shared_store();
    let config = LockConfig::default();
    let a = LockBuilder::from_config(&config).token(store.clone());
    let b = LockBuilder::from_config(&config).token(store.clone());

    assert!(assert_ok!(a.try_acquire().await));

    clock.set(T0 + 100);
    assert!(!assert_ok!(b.try_acquire().await));

    clock.set(T0 + 310);
    assert!(assert_ok!(b.try_acquire().await));

    // A's stale release is refused and B keeps the lock
    clock.set(T0 + 320);
    assert!(!assert_ok!(a.release().await));
    assert!(assert_ok!(b.is_held().await));
    assert_eq!(store.len(), 1);
}

// =============================================================================
// Mutual exclusion under contention
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_token_lock_serializes_workers() {
    let store = Arc::new(MemoryStore::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..5)
        .map(|_| {
            let lock = LockBuilder::new("jobs:nightly")
                .with_lease(Duration::from_secs(30))
                .token(store.clone());
            let inside = inside.clone();
            let completed = completed.clone();

            tokio::spawn(async move {
                lock.acquire_timeout(Duration::from_secs(5)).await?;

                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(20)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);

                lock.release().await
            })
        })
        .collect();

    for worker in workers {
        let released = assert_ok!(worker.await.unwrap());
        assert!(released);
    }

    assert_eq!(completed.load(Ordering::SeqCst), 5);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_locks_on_different_keys_are_independent() {
    let (clock, store) = shared_store();
    let orders = LockBuilder::new("orders")
        .with_clock(clock.clone())
        .timestamp(store.clone());
    let invoices = LockBuilder::new("invoices").token(store.clone());

    assert!(assert_ok!(orders.try_acquire().await));
    assert!(assert_ok!(invoices.try_acquire().await));
    assert_eq!(store.len(), 2);

    assert!(assert_ok!(orders.release().await));
    assert!(assert_ok!(invoices.is_held().await));
}

#[tokio::test]
async fn test_locks_behind_trait_objects() {
    let (clock, store) = shared_store();
    let locks: Vec<Box<dyn DistributedLock>> = vec![
        Box::new(
            LockBuilder::new("a")
                .with_clock(clock.clone())
                .timestamp(store.clone()),
        ),
        Box::new(LockBuilder::new("b").token(store.clone())),
    ];

    for lock in &locks {
        assert_eq!(lock.lease(), Duration::from_millis(300));
        assert!(assert_ok!(lock.try_acquire().await), "{}", lock.key());
        assert!(assert_ok!(lock.release().await), "{}", lock.key());
    }
    assert!(store.is_empty());
}
