// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The sequencing/trampoline engine (spec §4.3): `transform` is the
//! primitive every other combinator is built from. Each one subscribes to
//! its source and settles a brand-new [`Promise`], so every step is a
//! fresh dispatch through [`current_executor`](crate::current_executor) —
//! chains of any length never grow the call stack.

use std::sync::Arc;

use fibra_core::{FibraError, FinalizerOriginal, Outcome};
use parking_lot::Mutex;

use crate::promise::{Async, AsyncHandle, Callback, Promise};

/// Where a sequencing node's `cancel(reason)` currently forwards to: the
/// still-running upstream, or — once a `then`/`catch_async`/
/// `finally_async` step has started its inner action — that inner action
/// instead. Mirrors spec §4.3.5's "forwards to the currently executing
/// step".
///
/// Cancelling latches `reason` here the same way [`Promise::cancel`] does:
/// it never settles anything on its own. Once latched, any later
/// [`retarget`](Self::retarget) call observes the reason immediately
/// instead of storing the new forward function — this is what lets a
/// `then` step that hasn't constructed its inner action yet still deliver
/// a cancel that arrived early.
enum SlotState {
    Active(Box<dyn Fn(FibraError) + Send>),
    Cancelled(FibraError),
}

struct CancelSlot {
    state: Mutex<SlotState>,
}

impl CancelSlot {
    fn new(forward: impl Fn(FibraError) + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Active(Box::new(forward))),
        })
    }

    /// Redirect forwarding to `forward`. If a cancel reason is already
    /// latched, `forward` is invoked with it right away instead of being
    /// stored.
    fn retarget(&self, forward: impl Fn(FibraError) + Send + 'static) {
        let mut state = self.state.lock();
        match &mut *state {
            SlotState::Cancelled(reason) => {
                let reason = reason.clone();
                drop(state);
                forward(reason);
            }
            SlotState::Active(slot) => {
                *slot = Box::new(forward);
            }
        }
    }

    /// First-cancel-wins: latch `reason` and forward it once to whatever
    /// target is currently active. A no-op on every subsequent call.
    fn cancel(&self, reason: FibraError) {
        let mut state = self.state.lock();
        if matches!(&*state, SlotState::Cancelled(_)) {
            return;
        }
        let previous = std::mem::replace(&mut *state, SlotState::Cancelled(reason.clone()));
        drop(state);
        if let SlotState::Active(forward) = previous {
            forward(reason);
        }
    }

    fn poll_cancel(&self) -> Option<FibraError> {
        match &*self.state.lock() {
            SlotState::Cancelled(reason) => Some(reason.clone()),
            SlotState::Active(_) => None,
        }
    }
}

/// A sequencing node: an `Async<R>` whose completion is driven by a
/// `Promise<R>` that some upstream subscription eventually settles, and
/// whose `cancel` forwards through a [`CancelSlot`] instead of settling
/// itself directly.
struct Node<R: Clone + Send + Sync + 'static> {
    promise: Promise<R>,
    cancel_slot: Arc<CancelSlot>,
}

impl<R: Clone + Send + Sync + 'static> Async<R> for Node<R> {
    fn subscribe(&self, callback: Callback<R>) {
        self.promise.subscribe(callback);
    }

    fn poll(&self) -> Option<Outcome<R>> {
        self.promise.poll()
    }

    fn cancel(&self, reason: FibraError) {
        self.cancel_slot.cancel(reason);
    }

    fn poll_cancel(&self) -> Option<FibraError> {
        if self.promise.poll().is_some() {
            return None;
        }
        self.cancel_slot.poll_cancel()
    }

    fn is_settled(&self) -> bool {
        self.promise.is_settled()
    }
}

fn node_handle<R: Clone + Send + Sync + 'static>(
    promise: Promise<R>,
    cancel_slot: Arc<CancelSlot>,
) -> AsyncHandle<R> {
    Arc::new(Node { promise, cancel_slot })
}

/// Combinators available on any [`AsyncHandle<T>`].
pub trait AsyncHandleExt<T: Clone + Send + Sync + 'static> {
    /// The primitive every other combinator reduces to: settle a new
    /// action with `f` applied to this one's outcome.
    fn transform<R, F>(self, f: F) -> AsyncHandle<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(Outcome<T>) -> Outcome<R> + Send + 'static;

    /// Apply `f` to a success value, passing failures through unchanged.
    fn map<R, F>(self, f: F) -> AsyncHandle<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> R + Send + 'static;

    /// Chain into another action produced from a success value (flatMap).
    /// Failures pass through without invoking `f`.
    fn then<R, F>(self, f: F) -> AsyncHandle<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> AsyncHandle<R> + Send + 'static;

    /// Recover from a failure by producing a replacement outcome.
    /// Successes pass through without invoking `f`.
    fn catch<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce(FibraError) -> Outcome<T> + Send + 'static;

    /// Recover from a failure by chaining into another action.
    fn catch_async<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce(FibraError) -> AsyncHandle<T> + Send + 'static;

    /// Observe the outcome without changing it.
    fn peek<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce(&Outcome<T>) + Send + 'static;

    /// Run `f` once this action settles, regardless of outcome, without
    /// changing it.
    fn finally<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce() + Send + 'static;

    /// Like [`finally`](Self::finally), but the cleanup itself is
    /// asynchronous. If the finalizer fails, the result is
    /// [`FibraError::FinalizerFailed`], carrying the original outcome it
    /// was guarding so that outcome is never silently dropped.
    fn finally_async<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce() -> AsyncHandle<()> + Send + 'static;

    /// Widen the success type via `Into`, without allocating a new
    /// executor step beyond the one `map` already performs. A safe
    /// replacement for the variance-by-transmute some action runtimes use.
    fn covary<R>(self) -> AsyncHandle<R>
    where
        T: Into<R>,
        R: Clone + Send + Sync + 'static;
}

impl<T: Clone + Send + Sync + 'static> AsyncHandleExt<T> for AsyncHandle<T> {
    fn transform<R, F>(self, f: F) -> AsyncHandle<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(Outcome<T>) -> Outcome<R> + Send + 'static,
    {
        let next = Promise::<R>::pending();
        let upstream = self.clone();
        let cancel_slot = CancelSlot::new(move |reason| upstream.cancel(reason));
        let handle = node_handle(next.clone(), cancel_slot);
        self.subscribe(Box::new(move |outcome| {
            next.complete(f(outcome));
        }));
        handle
    }

    fn map<R, F>(self, f: F) -> AsyncHandle<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> R + Send + 'static,
    {
        self.transform(move |outcome| outcome.map(f))
    }

    fn then<R, F>(self, f: F) -> AsyncHandle<R>
    where
        R: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> AsyncHandle<R> + Send + 'static,
    {
        let next = Promise::<R>::pending();
        let upstream = self.clone();
        let cancel_slot = CancelSlot::new(move |reason| upstream.cancel(reason));
        let handle = node_handle(next.clone(), cancel_slot.clone());
        self.subscribe(Box::new(move |outcome| match outcome {
            Ok(value) => {
                let inner = f(value);
                let inner_for_cancel = inner.clone();
                cancel_slot.retarget(move |reason| inner_for_cancel.cancel(reason));
                let next = next.clone();
                inner.subscribe(Box::new(move |inner_outcome| {
                    next.complete(inner_outcome);
                }));
            }
            Err(error) => {
                next.fail(error);
            }
        }));
        handle
    }

    fn catch<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce(FibraError) -> Outcome<T> + Send + 'static,
    {
        self.transform(move |outcome| match outcome {
            Ok(value) => Ok(value),
            Err(error) => f(error),
        })
    }

    fn catch_async<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce(FibraError) -> AsyncHandle<T> + Send + 'static,
    {
        let next = Promise::<T>::pending();
        let upstream = self.clone();
        let cancel_slot = CancelSlot::new(move |reason| upstream.cancel(reason));
        let handle = node_handle(next.clone(), cancel_slot.clone());
        self.subscribe(Box::new(move |outcome| match outcome {
            Ok(value) => {
                next.succeed(value);
            }
            Err(error) => {
                let inner = f(error);
                let inner_for_cancel = inner.clone();
                cancel_slot.retarget(move |reason| inner_for_cancel.cancel(reason));
                let next = next.clone();
                inner.subscribe(Box::new(move |inner_outcome| {
                    next.complete(inner_outcome);
                }));
            }
        }));
        handle
    }

    fn peek<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.transform(move |outcome| {
            f(&outcome);
            outcome
        })
    }

    fn finally<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce() + Send + 'static,
    {
        self.transform(move |outcome| {
            f();
            outcome
        })
    }

    fn finally_async<F>(self, f: F) -> AsyncHandle<T>
    where
        F: FnOnce() -> AsyncHandle<()> + Send + 'static,
    {
        let next = Promise::<T>::pending();
        let upstream = self.clone();
        let cancel_slot = CancelSlot::new(move |reason| upstream.cancel(reason));
        let handle = node_handle(next.clone(), cancel_slot.clone());
        self.subscribe(Box::new(move |outcome| {
            let finalizer = f();
            let finalizer_for_cancel = finalizer.clone();
            cancel_slot.retarget(move |reason| finalizer_for_cancel.cancel(reason));
            let next = next.clone();
            finalizer.subscribe(Box::new(move |finalizer_outcome| match finalizer_outcome {
                Ok(()) => {
                    next.complete(outcome);
                }
                Err(finalizer_error) => {
                    let original = match &outcome {
                        Ok(_) => FinalizerOriginal::Success,
                        Err(error) => FinalizerOriginal::Failure(error.clone()),
                    };
                    next.fail(FibraError::finalizer_failed(finalizer_error, original));
                }
            }));
        }));
        handle
    }

    fn covary<R>(self) -> AsyncHandle<R>
    where
        T: Into<R>,
        R: Clone + Send + Sync + 'static,
    {
        self.map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::sync;

    #[test]
    fn map_transforms_a_success() {
        let promise = Promise::<i32>::pending();
        let mapped = promise.handle().map(|v| v * 2);
        promise.succeed(21);
        assert_eq!(sync(&mapped), Ok(42));
    }

    #[test]
    fn map_passes_failures_through() {
        let promise = Promise::<i32>::pending();
        let mapped = promise.handle().map(|v| v * 2);
        let reason = FibraError::cancelled("boom");
        promise.fail(reason.clone());
        assert_eq!(sync(&mapped), Err(reason));
    }

    #[test]
    fn then_chains_into_another_action() {
        let first = Promise::<i32>::pending();
        let chained = first.handle().then(|value| {
            let second = Promise::<i32>::pending();
            second.succeed(value + 1);
            second.handle()
        });
        first.succeed(1);
        assert_eq!(sync(&chained), Ok(2));
    }

    #[test]
    fn catch_recovers_from_failure() {
        let first = Promise::<i32>::pending();
        let recovered = first.handle().catch(|_| Ok(0));
        first.fail(FibraError::cancelled("nope"));
        assert_eq!(sync(&recovered), Ok(0));
    }

    #[test]
    fn finally_runs_on_success_and_failure() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let promise = Promise::<i32>::pending();
        let guarded = promise.handle().finally(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        promise.succeed(1);
        assert_eq!(sync(&guarded), Ok(1));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finally_async_failure_wraps_the_original_outcome() {
        let promise = Promise::<i32>::pending();
        let guarded = promise.handle().finally_async(|| {
            let cleanup = Promise::<()>::pending();
            cleanup.fail(FibraError::cancelled("cleanup failed"));
            cleanup.handle()
        });
        promise.succeed(5);
        match sync(&guarded) {
            Err(FibraError::FinalizerFailed { original, .. }) => {
                assert!(matches!(*original, FinalizerOriginal::Success));
            }
            other => panic!("expected FinalizerFailed, got {other:?}"),
        }
    }

    #[test]
    fn cancel_on_a_pending_node_forwards_to_the_upstream() {
        let upstream = Promise::<i32>::pending();
        let mapped = upstream.handle().map(|v| v * 2);
        let reason = FibraError::cancelled("stop");
        mapped.cancel(reason.clone());

        // Forwarded as a cooperative request: the upstream is notified but
        // not force-settled, and neither is the node built on top of it.
        assert_eq!(upstream.handle().poll_cancel(), Some(reason.clone()));
        assert_eq!(mapped.poll_cancel(), Some(reason.clone()));
        assert!(!upstream.handle().is_settled());
        assert!(!mapped.is_settled());

        // The upstream producer can still decide to honor it, or not.
        upstream.fail(reason.clone());
        assert_eq!(sync(&mapped), Err(reason));
    }

    #[test]
    fn cancel_on_a_started_then_forwards_to_the_inner_action() {
        let upstream = Promise::<i32>::pending();
        let inner = Promise::<i32>::pending();
        let inner_clone = inner.clone();
        let chained = upstream.handle().then(move |_| inner_clone.handle());
        upstream.succeed(1);
        // `then`'s subscribe callback — which retargets the cancel slot
        // onto `inner` — is itself dispatched through the current executor,
        // so give it a moment to land before relying on the retarget.
        std::thread::sleep(std::time::Duration::from_millis(20));

        let reason = FibraError::cancelled("inner stop");
        chained.cancel(reason.clone());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(inner.handle().poll_cancel(), Some(reason.clone()));
        assert!(!chained.is_settled());

        inner.fail(reason.clone());
        assert_eq!(sync(&chained), Err(reason));
    }

    #[test]
    fn cancel_latched_before_then_builds_its_inner_action_reaches_it_on_construction() {
        // Reproduces the scenario where a cancel arrives while `then` is
        // still waiting on its upstream: the upstream must still be free to
        // succeed, `f` must still run, and the promise it produces must
        // observe the latched reason the moment it exists — not be
        // bypassed by a forced upstream failure.
        let upstream = Promise::<i32>::pending();
        let produced_inner: Arc<Mutex<Option<AsyncHandle<i32>>>> = Arc::new(Mutex::new(None));
        let produced_inner_clone = produced_inner.clone();
        let chained = upstream.handle().then(move |_| {
            let inner = Promise::<i32>::pending();
            let handle = inner.handle();
            *produced_inner_clone.lock() = Some(handle.clone());
            handle
        });

        let reason = FibraError::cancelled("stop before inner exists");
        chained.cancel(reason.clone());
        assert!(produced_inner.lock().is_none());
        assert!(!upstream.handle().is_settled());

        // The cancel did not force-complete the upstream: it can still
        // succeed, which constructs the inner action for the first time.
        // That construction happens inside `then`'s subscribe callback,
        // dispatched through the current executor — give it a moment.
        assert!(upstream.succeed(1));
        std::thread::sleep(std::time::Duration::from_millis(20));

        let inner = produced_inner
            .lock()
            .clone()
            .expect("then's inner action was constructed once upstream succeeded");
        assert_eq!(inner.poll_cancel(), Some(reason));
    }

    #[test]
    fn covary_widens_the_success_type() {
        let promise = Promise::<i32>::pending();
        let widened: AsyncHandle<i64> = promise.handle().covary();
        promise.succeed(7);
        assert_eq!(sync(&widened), Ok(7i64));
    }
}
