// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Terminal ops (spec §4.6), all built on one shared do-while driver:
//! `next()` the source, feed the element through a fold step, recurse —
//! each step is a fresh `then`/`catch_async` dispatch, so the loop is
//! trampolined the same way a sequencing chain is.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use fibra_async::{AsyncHandleExt, AsyncHandle};
use fibra_core::{fibra_warn, FibraError, Outcome};

use crate::combinators::settled;
use crate::iterator::IterHandle;

#[derive(Debug)]
struct PanicError(String);

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "for_each action panicked: {}", self.0)
    }
}

impl std::error::Error for PanicError {}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The shared do-while driver: `next()`, fold `value` into `acc` via
/// `step`, recurse on success, stop with `acc` on `End`, stop with the
/// error otherwise.
fn do_while_loop<T, Acc, F>(source: IterHandle<T>, acc: Acc, step: Arc<F>) -> AsyncHandle<Acc>
where
    T: Clone + Send + Sync + 'static,
    Acc: Clone + Send + Sync + 'static,
    F: Fn(Acc, T) -> AsyncHandle<Acc> + Send + Sync + 'static,
{
    let acc_on_end = acc.clone();
    let source_for_then = source.clone();
    source
        .next()
        .then(move |value| {
            step(acc, value).then(move |next_acc| {
                do_while_loop(source_for_then.clone(), next_acc, step.clone())
            })
        })
        .catch_async(move |error| {
            if error.is_end() {
                settled(Ok(acc_on_end))
            } else {
                settled(Err(error))
            }
        })
}

/// Fold `source` into `seed` via the asynchronous `g`; an `End` failure
/// from `next()` stops the fold successfully with the accumulator so far.
#[must_use]
pub fn reduce_async<T, Acc, F>(source: IterHandle<T>, seed: Acc, g: F) -> AsyncHandle<Acc>
where
    T: Clone + Send + Sync + 'static,
    Acc: Clone + Send + Sync + 'static,
    F: Fn(Acc, T) -> AsyncHandle<Acc> + Send + Sync + 'static,
{
    do_while_loop(source, seed, Arc::new(g))
}

/// Fold `source` into `seed` via the synchronous, possibly-failing `g`.
#[must_use]
pub fn reduce<T, Acc, F>(source: IterHandle<T>, seed: Acc, g: F) -> AsyncHandle<Acc>
where
    T: Clone + Send + Sync + 'static,
    Acc: Clone + Send + Sync + 'static,
    F: Fn(Acc, T) -> Outcome<Acc> + Send + Sync + 'static,
{
    reduce_async(source, seed, move |acc, value| settled(g(acc, value)))
}

/// Collect every element into a `Vec<T>`, in iteration order.
#[must_use]
pub fn to_list<T>(source: IterHandle<T>) -> AsyncHandle<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    reduce(source, Vec::new(), |mut acc, value| {
        acc.push(value);
        Ok(acc)
    })
}

/// Run the asynchronous `action` per element; stops successfully on `End`.
#[must_use]
pub fn for_each_async<T, F>(source: IterHandle<T>, action: F) -> AsyncHandle<()>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> AsyncHandle<()> + Send + Sync + 'static,
{
    reduce_async(source, (), move |(), value| action(value))
}

/// Run the synchronous `action` per element. Unlike a dynamically typed
/// action runtime, Rust's `Fn(T)` signature already rules out `action`
/// accidentally returning an async action — the one way that guarantee
/// can still be violated is `action` panicking mid-element, which this
/// catches, logs, and turns into an ordinary iteration failure instead of
/// unwinding through the fold.
#[must_use]
pub fn for_each<T, F>(source: IterHandle<T>, action: F) -> AsyncHandle<()>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    for_each_async(source, move |value| {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| action(value))) {
            Ok(()) => settled(Ok(())),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                fibra_warn!("for_each action panicked: {message}");
                settled(Err(FibraError::user_threw(PanicError(message))))
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrappers::from_iter;
    use fibra_async::sync;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn to_list_collects_every_element() {
        let list = to_list(from_iter(vec![1, 2, 3]));
        assert_eq!(sync(&list), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn reduce_folds_with_a_seed() {
        let sum = reduce(from_iter(vec![1, 2, 3]), 0, |acc, v| Ok(acc + v));
        assert_eq!(sync(&sum), Ok(6));
    }

    #[test]
    fn for_each_runs_the_action_per_element() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let done = for_each(from_iter(vec![1, 2, 3]), move |v| {
            seen_clone.fetch_add(v as usize, Ordering::SeqCst);
        });
        assert_eq!(sync(&done), Ok(()));
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn for_each_turns_a_panic_into_a_failure() {
        let done = for_each(from_iter(vec![1]), |_| panic!("boom"));
        assert!(sync(&done).is_err());
    }

    #[test]
    fn empty_source_reduces_to_the_seed() {
        let sum = reduce(from_iter(Vec::<i32>::new()), 7, |acc, v| Ok(acc + v));
        assert_eq!(sync(&sum), Ok(7));
    }
}
