// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Assertion helpers that eliminate the common `sync(&handle).unwrap()`
//! boilerplate in tests, plus a bounded wait for assertions that a handle
//! does *not* settle within a window.

use std::sync::Arc;
use std::time::Duration;

use fibra_async::{sync, Async};
use fibra_core::{FibraError, Outcome};
use parking_lot::Mutex;

/// Assert `handle` settles successfully and return the value.
///
/// # Panics
/// Panics if `handle` settles with a failure.
pub fn assert_succeeds<T: Clone + Send + Sync + 'static>(handle: &Arc<dyn Async<T>>) -> T {
    match sync(handle) {
        Ok(value) => value,
        Err(error) => panic!("expected success, got failure: {error}"),
    }
}

/// Assert `handle` settles with a failure and return it.
///
/// # Panics
/// Panics if `handle` settles successfully.
pub fn assert_fails<T: Clone + Send + Sync + 'static>(handle: &Arc<dyn Async<T>>) -> FibraError {
    match sync(handle) {
        Ok(_) => panic!("expected failure, got success"),
        Err(error) => error,
    }
}

/// Assert `handle` does not settle within `timeout`. Useful for proving a
/// trigger or combinator is correctly still pending.
///
/// # Panics
/// Panics if `handle` settles before `timeout` elapses.
pub fn assert_does_not_settle_within<T: Clone + Send + Sync + std::fmt::Debug + 'static>(
    handle: &Arc<dyn Async<T>>,
    timeout: Duration,
) {
    let settled: Arc<Mutex<Option<Outcome<T>>>> = Arc::new(Mutex::new(None));
    let settled_clone = settled.clone();
    handle.subscribe(Box::new(move |outcome| {
        *settled_clone.lock() = Some(outcome);
    }));
    std::thread::sleep(timeout);
    if let Some(outcome) = settled.lock().take() {
        panic!("expected no settlement within {timeout:?}, got {outcome:?}");
    }
}

#[cfg(test)]
mod tests {
    use fibra_async::Promise;

    use super::*;

    #[test]
    fn assert_succeeds_returns_the_value() {
        let promise = Promise::<i32>::pending();
        promise.succeed(4);
        assert_eq!(assert_succeeds(&promise.handle()), 4);
    }

    #[test]
    #[should_panic(expected = "expected success")]
    fn assert_succeeds_panics_on_failure() {
        let promise = Promise::<i32>::pending();
        promise.fail(FibraError::cancelled("nope"));
        assert_succeeds(&promise.handle());
    }

    #[test]
    fn assert_fails_returns_the_error() {
        let promise = Promise::<i32>::pending();
        let reason = FibraError::cancelled("nope");
        promise.fail(reason.clone());
        assert_eq!(assert_fails(&promise.handle()), reason);
    }

    #[test]
    fn assert_does_not_settle_within_passes_for_a_pending_promise() {
        let promise = Promise::<i32>::pending();
        assert_does_not_settle_within(&promise.handle(), Duration::from_millis(20));
    }

    #[test]
    #[should_panic(expected = "expected no settlement")]
    fn assert_does_not_settle_within_panics_if_it_settles() {
        let promise = Promise::<i32>::pending();
        promise.succeed(1);
        assert_does_not_settle_within(&promise.handle(), Duration::from_millis(20));
    }
}
