// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::Arc;

use fibra_async::{Async, AsyncHandle, Callback, Promise};
use fibra_core::{FibraError, Outcome};
use parking_lot::Mutex;

/// `f : [Result<T>] -> Option<R>`, possibly failing with a `FibraError`
/// (spec §4.5's trigger protocol). Called once at construction with the
/// empty prefix, then once per child completion, always with the current
/// append-only prefix of settled results in completion order.
pub type Trigger<T, R> = Box<dyn Fn(&[Outcome<T>]) -> Result<Option<R>, FibraError> + Send + Sync>;

struct State<T> {
    children: Vec<Option<AsyncHandle<T>>>,
    results: Vec<Outcome<T>>,
}

struct Inner<T, R> {
    state: Mutex<State<T>>,
    promise: Promise<R>,
    trigger: Trigger<T, R>,
}

/// A parent action over `n` children, resolved by a pluggable trigger
/// rather than a fixed `any`/`all` policy (spec §4.5).
pub struct AsyncBundle<T, R> {
    inner: Arc<Inner<T, R>>,
}

impl<T, R> Clone for AsyncBundle<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn cancel_reason() -> FibraError {
    FibraError::cancelled("remaining tasks no longer needed")
}

impl<T, R> AsyncBundle<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Build a bundle over `children`, driven by `trigger`. Returns a
    /// type-erased handle — the bundle may already have settled by the
    /// time this returns, if `trigger(&[])` resolved it outright (the
    /// `allOf([])`/empty-threshold cases).
    #[must_use]
    pub fn new(children: Vec<AsyncHandle<T>>, trigger: Trigger<T, R>) -> AsyncHandle<R> {
        let n = children.len();
        let promise = Promise::<R>::pending();
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                children: children.into_iter().map(Some).collect(),
                results: Vec::with_capacity(n),
            }),
            promise,
            trigger,
        });

        match (inner.trigger)(&[]) {
            Ok(Some(value)) => {
                inner.promise.succeed(value);
                Self::cancel_children(&inner, Self::take_all(&inner));
                return inner.promise.handle();
            }
            Err(error) => {
                inner.promise.fail(error);
                Self::cancel_children(&inner, Self::take_all(&inner));
                return inner.promise.handle();
            }
            Ok(None) => {}
        }

        let snapshot: Vec<Option<AsyncHandle<T>>> = inner.state.lock().children.clone();
        for (index, child) in snapshot.into_iter().enumerate() {
            let Some(child) = child else { continue };
            let inner_for_callback = inner.clone();
            child.subscribe(Box::new(move |outcome| {
                Self::on_child_complete(&inner_for_callback, index, outcome);
            }));
        }

        inner.promise.handle()
    }

    fn take_all(inner: &Arc<Inner<T, R>>) -> Vec<AsyncHandle<T>> {
        inner
            .state
            .lock()
            .children
            .iter_mut()
            .filter_map(std::mem::take)
            .collect()
    }

    fn cancel_children(_inner: &Arc<Inner<T, R>>, children: Vec<AsyncHandle<T>>) {
        let reason = cancel_reason();
        for child in children {
            child.cancel(reason.clone());
        }
    }

    fn on_child_complete(inner: &Arc<Inner<T, R>>, index: usize, outcome: Outcome<T>) {
        enum Resolution<R> {
            Keep,
            Settle(Result<R, FibraError>),
        }

        let (resolution, to_cancel) = {
            let mut state = inner.state.lock();
            if state.children[index].is_none() {
                return;
            }
            state.children[index] = None;
            state.results.push(outcome);

            match (inner.trigger)(&state.results) {
                Ok(None) => (Resolution::Keep, Vec::new()),
                Ok(Some(value)) => {
                    let remaining: Vec<AsyncHandle<T>> =
                        state.children.iter_mut().filter_map(std::mem::take).collect();
                    (Resolution::Settle(Ok(value)), remaining)
                }
                Err(error) => {
                    let remaining: Vec<AsyncHandle<T>> =
                        state.children.iter_mut().filter_map(std::mem::take).collect();
                    (Resolution::Settle(Err(error)), remaining)
                }
            }
        };

        if let Resolution::Settle(outcome) = resolution {
            inner.promise.complete(outcome);
            Self::cancel_children(inner, to_cancel);
        }
    }
}

impl<T, R> Async<R> for AsyncBundle<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, callback: Callback<R>) {
        self.inner.promise.subscribe(callback);
    }

    fn poll(&self) -> Option<Outcome<R>> {
        self.inner.promise.poll()
    }

    /// Forwards `reason` to every still-non-null child. Does not touch the
    /// bundle's own promise directly — it settles only when the trigger
    /// next fires on the resulting child completions, or not at all if it
    /// has already settled (spec §4.5, "External cancel").
    fn cancel(&self, reason: FibraError) {
        let snapshot: Vec<AsyncHandle<T>> = self
            .inner
            .state
            .lock()
            .children
            .iter()
            .filter_map(Clone::clone)
            .collect();
        for child in snapshot {
            child.cancel(reason.clone());
        }
    }

    /// The bundle never latches a cancel reason on itself — only its
    /// children observe one (spec §4.5, "External cancel"): it settles
    /// when the trigger next fires, or not at all.
    fn poll_cancel(&self) -> Option<FibraError> {
        self.inner.promise.poll_cancel()
    }

    fn is_settled(&self) -> bool {
        self.inner.promise.is_settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibra_async::sync;

    fn any_trigger<T: Clone + Send + Sync + 'static>(n: usize) -> Trigger<T, T> {
        Box::new(move |results: &[Outcome<T>]| {
            if let Some(v) = results.iter().find_map(|r| r.as_ref().ok().cloned()) {
                return Ok(Some(v));
            }
            if results.len() == n {
                let errs: Vec<FibraError> =
                    results.iter().filter_map(|r| r.as_ref().err().cloned()).collect();
                return Err(FibraError::over_limit(errs));
            }
            Ok(None)
        })
    }

    #[test]
    fn resolves_as_soon_as_the_trigger_is_satisfied() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let bundle = AsyncBundle::new(vec![a.handle(), b.handle()], any_trigger(2));
        a.succeed(1);
        assert_eq!(sync(&bundle), Ok(1));
    }

    #[test]
    fn resolving_cancels_the_remaining_children() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let bundle = AsyncBundle::new(vec![a.handle(), b.handle()], any_trigger(2));
        a.succeed(1);
        let _ = sync(&bundle);
        // The bundle's own promise settles (waking `sync`) just before it
        // cancels the remaining children, both on the executor's dispatch
        // thread: give the cancel a moment to land too.
        std::thread::sleep(std::time::Duration::from_millis(20));
        // The bundle resolved and forwarded a cooperative cancel to `b`: it
        // is notified, but not force-settled.
        assert!(!b.handle().is_settled());
        assert!(b.handle().poll_cancel().is_some());
    }

    #[test]
    fn empty_children_runs_the_trigger_once_at_construction() {
        let bundle: AsyncHandle<i32> = AsyncBundle::new(Vec::new(), any_trigger(0));
        assert_eq!(
            sync(&bundle),
            Err(FibraError::over_limit(Vec::new()))
        );
    }

    #[test]
    fn external_cancel_forwards_to_every_non_null_child() {
        let a = Promise::<i32>::pending();
        let b = Promise::<i32>::pending();
        let bundle = AsyncBundle::new(vec![a.handle(), b.handle()], any_trigger(2));
        let reason = FibraError::cancelled("shutdown");
        bundle.cancel(reason.clone());
        assert_eq!(a.handle().poll_cancel(), Some(reason.clone()));
        assert_eq!(b.handle().poll_cancel(), Some(reason));
        assert!(!bundle.is_settled());
    }
}
