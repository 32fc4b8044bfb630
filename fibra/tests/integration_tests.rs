// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fibra::prelude::*;
use fibra_iter::{from_iter, AsyncIteratorExt};
use fibra_test_utils::assert_succeeds;

#[test]
fn a_sequencing_chain_and_a_bundle_compose_across_crates() -> anyhow::Result<()> {
    // Arrange: three independent actions feeding into an all_of bundle,
    // each itself a short sequencing chain.
    let a = Promise::<i32>::pending();
    let b = Promise::<i32>::pending();
    let c = Promise::<i32>::pending();

    let chained_a = a.handle().map(|v| v + 1);
    let chained_b = b.handle().map(|v| v * 2);
    let chained_c = c.handle().map(|v| v - 1);

    let bundle = all_of(vec![chained_a, chained_b, chained_c]);

    // Act
    a.succeed(1);
    b.succeed(10);
    c.succeed(5);

    // Assert
    assert_eq!(assert_succeeds(&bundle), vec![2, 20, 4]);
    Ok(())
}

#[test]
fn a_fiber_runs_an_async_iterator_reduction() {
    // Arrange: a fiber whose task drains an AsyncIterator built from a
    // plain synchronous iterator, doubling each element before reducing.
    let fiber = fibra_fiber::Fiber::spawn(None, Some("reducer".to_string()), false, || {
        let source = from_iter(vec![1, 2, 3, 4].into_iter());
        let doubled = source.map(|v| v * 2);
        fibra_iter::reduce(doubled, 0, |acc, v| acc + v)
    });

    // Assert
    assert_eq!(assert_succeeds(&fiber.join()), 20);
}

#[test]
fn cancelling_a_bundle_cancels_every_remaining_child() {
    // Arrange
    let winner = Promise::<i32>::pending();
    let loser_a = Promise::<i32>::pending();
    let loser_b = Promise::<i32>::pending();

    let bundle = any_of(vec![winner.handle(), loser_a.handle(), loser_b.handle()]);

    // Act
    winner.succeed(1);

    // Assert: any_of settles as soon as the winner does, and forwards a
    // cooperative cancel to the rest as a side effect — they are notified,
    // not force-settled. The bundle settles just before it cancels the
    // remaining children, both on the executor's dispatch thread.
    assert_eq!(assert_succeeds(&bundle), 1);
    std::thread::sleep(Duration::from_millis(20));
    assert!(loser_a.handle().poll_cancel().is_some());
    assert!(loser_b.handle().poll_cancel().is_some());
    assert!(!loser_a.handle().is_settled());
    assert!(!loser_b.handle().is_settled());
}

#[test]
fn a_fiber_local_is_scoped_to_its_owning_fiber() {
    // Arrange
    let local: FiberLocal<i32> = FiberLocal::new();
    let seen = Arc::new(AtomicI32::new(-1));

    let seen_clone = seen.clone();
    let fiber = fibra_fiber::Fiber::spawn(None, None, false, move || {
        local.set(Some(99)).unwrap();
        seen_clone.store(local.get().unwrap().unwrap(), Ordering::SeqCst);
        Promise::completed_with(Ok(())).handle()
    });

    fibra_test_utils::assert_succeeds(&fiber.join());
    assert_eq!(seen.load(Ordering::SeqCst), 99);

    // Outside any fiber, the same local errors.
    assert_eq!(local.get(), Err(FibraError::NoCurrentFiber));
}

// `sync()` blocks its calling thread, so this needs a multi-thread runtime:
// the timeout alarm is spawned separately and must be polled by another
// worker while this test thread is parked in `sync()`.
#[cfg(feature = "runtime-tokio")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_races_a_never_completing_action() {
    use fibra_runtime::impls::tokio::TokioRuntime;

    let never = Promise::<i32>::pending();
    let timed = fibra_async::timeout::<TokioRuntime, _>(never.handle(), Duration::from_millis(30));
    let outcome = fibra_async::sync(&timed);
    assert!(matches!(outcome, Err(FibraError::Timeout { .. })));
}
