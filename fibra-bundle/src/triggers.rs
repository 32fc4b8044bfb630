// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The three standard triggers from spec §4.5: `any_of`, `all_of`,
//! `some_of`. Each is a thin [`Trigger`] closure handed to
//! [`AsyncBundle::new`].

use fibra_async::AsyncHandle;
use fibra_core::{FibraError, Outcome};

use crate::bundle::{AsyncBundle, Trigger};

/// `failures + k > n` is the shared "threshold unreachable" test: it covers
/// both "too many children have already failed" and "k exceeds the number
/// of children that exist at all" (the `someOf(3, [a, b])` case) in one
/// inequality, without risking unsigned underflow.
fn threshold_unreachable(failures: usize, k: usize, n: usize) -> bool {
    failures.saturating_add(k) > n
}

fn collect_failures<T>(results: &[Outcome<T>]) -> Vec<FibraError> {
    results.iter().filter_map(|r| r.as_ref().err().cloned()).collect()
}

/// First success wins; fails once every child has settled with no success.
#[must_use]
pub fn any_of<T>(children: Vec<AsyncHandle<T>>) -> AsyncHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    let n = children.len();
    let trigger: Trigger<T, T> = Box::new(move |results| {
        if let Some(value) = results.iter().find_map(|r| r.as_ref().ok().cloned()) {
            return Ok(Some(value));
        }
        let failures = results.iter().filter(|r| r.is_err()).count();
        if threshold_unreachable(failures, 1, n) {
            return Err(FibraError::over_limit(collect_failures(results)));
        }
        Ok(None)
    });
    AsyncBundle::new(children, trigger)
}

/// Succeeds with every child's value, in completion order, once all have
/// succeeded; fails on the first child failure.
#[must_use]
pub fn all_of<T>(children: Vec<AsyncHandle<T>>) -> AsyncHandle<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let n = children.len();
    let trigger: Trigger<T, Vec<T>> = Box::new(move |results| {
        let failures = results.iter().filter(|r| r.is_err()).count();
        if threshold_unreachable(failures, n, n) {
            return Err(FibraError::over_limit(collect_failures(results)));
        }
        if results.len() == n {
            return Ok(Some(results.iter().map(|r| r.clone().unwrap()).collect()));
        }
        Ok(None)
    });
    AsyncBundle::new(children, trigger)
}

/// Succeeds with the first `k` children to succeed, in completion order;
/// fails as soon as more than `n - k` children have failed (including the
/// degenerate case `k > n`, which is unreachable from construction).
#[must_use]
pub fn some_of<T>(k: usize, children: Vec<AsyncHandle<T>>) -> AsyncHandle<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let n = children.len();
    let trigger: Trigger<T, Vec<T>> = Box::new(move |results| {
        let failures = results.iter().filter(|r| r.is_err()).count();
        if threshold_unreachable(failures, k, n) {
            return Err(FibraError::over_limit(collect_failures(results)));
        }
        let successes: Vec<T> = results.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
        if successes.len() >= k {
            return Ok(Some(successes.into_iter().take(k).collect()));
        }
        Ok(None)
    });
    AsyncBundle::new(children, trigger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibra_async::{sync, Async};
    use fibra_core::FibraError;
    use fibra_async::Promise;

    #[test]
    fn any_of_wins_on_first_success() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let bundle = any_of(vec![a.handle(), b.handle()]);
        b.succeed(2);
        assert_eq!(sync(&bundle), Ok(2));
    }

    #[test]
    fn any_of_fails_once_every_child_has_failed() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let bundle = any_of(vec![a.handle(), b.handle()]);
        a.fail(FibraError::cancelled("a"));
        b.fail(FibraError::cancelled("b"));
        assert!(sync(&bundle).is_err());
    }

    #[test]
    fn all_of_empty_succeeds_immediately_with_no_values() {
        let bundle: AsyncHandle<Vec<i32>> = all_of(Vec::new());
        assert_eq!(sync(&bundle), Ok(Vec::new()));
    }

    #[test]
    fn all_of_succeeds_once_every_child_has_succeeded() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let bundle = all_of(vec![a.handle(), b.handle()]);
        a.succeed(1);
        assert!(!bundle.is_settled());
        b.succeed(2);
        assert_eq!(sync(&bundle), Ok(vec![1, 2]));
    }

    #[test]
    fn all_of_fails_on_the_first_failure() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let bundle = all_of(vec![a.handle(), b.handle()]);
        a.fail(FibraError::cancelled("a failed"));
        assert!(sync(&bundle).is_err());
        // The bundle settles just before it cancels the remaining
        // children, both on the executor's dispatch thread.
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(b.handle().poll_cancel().is_some());
    }

    #[test]
    fn some_of_succeeds_once_k_children_have_succeeded() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let c = Promise::<i32>::pending();
        let bundle = some_of(2, vec![a.handle(), b.handle(), c.handle()]);
        a.succeed(1);
        assert!(!bundle.is_settled());
        b.succeed(2);
        assert_eq!(sync(&bundle), Ok(vec![1, 2]));
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(c.handle().poll_cancel().is_some());
    }

    #[test]
    fn some_of_with_an_impossible_threshold_fails_at_construction() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let bundle = some_of(3, vec![a.handle(), b.handle()]);
        match sync(&bundle) {
            Err(FibraError::OverLimit { failures_len, .. }) => assert_eq!(failures_len, 0),
            other => panic!("expected OverLimit, got {other:?}"),
        }
    }

    #[test]
    fn some_of_fails_once_failures_exceed_n_minus_k() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let c = Promise::<i32>::pending();
        let bundle = some_of(2, vec![a.handle(), b.handle(), c.handle()]);
        a.fail(FibraError::cancelled("a"));
        b.fail(FibraError::cancelled("b"));
        assert!(sync(&bundle).is_err());
    }
}
