// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Intermediary ops (spec §4.6): each returns a new [`IterHandle`] whose
//! `next()` delegates to the source's `next()` through `fibra-async`'s
//! `then`/`catch_async`/`peek`.

use std::sync::Arc;

use fibra_async::{AsyncHandleExt, AsyncHandle, Promise};
use fibra_core::{FibraError, Outcome};
use parking_lot::Mutex;

use crate::iterator::{AsyncIterator, IterHandle};

pub(crate) fn settled<T: Clone + Send + Sync + 'static>(outcome: Outcome<T>) -> AsyncHandle<T> {
    Promise::completed_with(outcome).handle()
}

struct MapIter<T, U> {
    source: IterHandle<T>,
    f: Arc<dyn Fn(T) -> Outcome<U> + Send + Sync>,
}

impl<T: Clone + Send + Sync + 'static, U: Clone + Send + Sync + 'static> AsyncIterator<U>
    for MapIter<T, U>
{
    fn next(&self) -> AsyncHandle<U> {
        let f = self.f.clone();
        self.source.next().then(move |value| settled(f(value)))
    }
}

struct MapAsyncIter<T, U> {
    source: IterHandle<T>,
    f: Arc<dyn Fn(T) -> AsyncHandle<U> + Send + Sync>,
}

impl<T: Clone + Send + Sync + 'static, U: Clone + Send + Sync + 'static> AsyncIterator<U>
    for MapAsyncIter<T, U>
{
    fn next(&self) -> AsyncHandle<U> {
        let f = self.f.clone();
        self.source.next().then(move |value| f(value))
    }
}

struct PeekIter<T> {
    source: IterHandle<T>,
    f: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T: Clone + Send + Sync + 'static> AsyncIterator<T> for PeekIter<T> {
    fn next(&self) -> AsyncHandle<T> {
        let f = self.f.clone();
        self.source.next().peek(move |outcome| {
            if let Ok(value) = outcome {
                f(value);
            }
        })
    }
}

struct FilterIter<T> {
    source: IterHandle<T>,
    p: Arc<dyn Fn(&T) -> Outcome<bool> + Send + Sync>,
}

fn filter_step<T: Clone + Send + Sync + 'static>(
    source: IterHandle<T>,
    p: Arc<dyn Fn(&T) -> Outcome<bool> + Send + Sync>,
) -> AsyncHandle<T> {
    source.next().then(move |value| match p(&value) {
        Ok(true) => settled(Ok(value)),
        Ok(false) => filter_step(source.clone(), p.clone()),
        Err(error) => settled(Err(error)),
    })
}

impl<T: Clone + Send + Sync + 'static> AsyncIterator<T> for FilterIter<T> {
    fn next(&self) -> AsyncHandle<T> {
        filter_step(self.source.clone(), self.p.clone())
    }
}

struct FilterAsyncIter<T> {
    source: IterHandle<T>,
    p: Arc<dyn Fn(&T) -> AsyncHandle<bool> + Send + Sync>,
}

fn filter_async_step<T: Clone + Send + Sync + 'static>(
    source: IterHandle<T>,
    p: Arc<dyn Fn(&T) -> AsyncHandle<bool> + Send + Sync>,
) -> AsyncHandle<T> {
    source.next().then(move |value| {
        p(&value).then(move |keep| {
            if keep {
                settled(Ok(value))
            } else {
                filter_async_step(source.clone(), p.clone())
            }
        })
    })
}

impl<T: Clone + Send + Sync + 'static> AsyncIterator<T> for FilterAsyncIter<T> {
    fn next(&self) -> AsyncHandle<T> {
        filter_async_step(self.source.clone(), self.p.clone())
    }
}

struct FlatMapState<T, U> {
    outer: IterHandle<T>,
    make_inner: Arc<dyn Fn(T) -> IterHandle<U> + Send + Sync>,
    end_handler: Arc<dyn Fn(FibraError) -> Option<IterHandle<U>> + Send + Sync>,
    current: Mutex<Option<IterHandle<U>>>,
    draining_tail: Mutex<bool>,
}

struct FlatMapIter<T, U> {
    state: Arc<FlatMapState<T, U>>,
}

fn flat_map_step<T: Clone + Send + Sync + 'static, U: Clone + Send + Sync + 'static>(
    state: Arc<FlatMapState<T, U>>,
) -> AsyncHandle<U> {
    let maybe_current = state.current.lock().clone();
    match maybe_current {
        Some(inner) => {
            let state = state.clone();
            inner.next().catch_async(move |error| {
                if !error.is_end() {
                    return settled(Err(error));
                }
                if *state.draining_tail.lock() {
                    return settled(Err(FibraError::End));
                }
                *state.current.lock() = None;
                advance_outer(state)
            })
        }
        None => advance_outer(state),
    }
}

fn advance_outer<T: Clone + Send + Sync + 'static, U: Clone + Send + Sync + 'static>(
    state: Arc<FlatMapState<T, U>>,
) -> AsyncHandle<U> {
    let state_for_ok = state.clone();
    let state_for_err = state.clone();
    state
        .outer
        .next()
        .then(move |value| {
            let inner = (state_for_ok.make_inner)(value);
            *state_for_ok.current.lock() = Some(inner);
            flat_map_step(state_for_ok.clone())
        })
        .catch_async(move |error| {
            if !error.is_end() {
                return settled(Err(error));
            }
            match (state_for_err.end_handler)(error) {
                Some(tail) => {
                    *state_for_err.draining_tail.lock() = true;
                    *state_for_err.current.lock() = Some(tail);
                    flat_map_step(state_for_err.clone())
                }
                None => settled(Err(FibraError::End)),
            }
        })
}

impl<T: Clone + Send + Sync + 'static, U: Clone + Send + Sync + 'static> AsyncIterator<U>
    for FlatMapIter<T, U>
{
    fn next(&self) -> AsyncHandle<U> {
        flat_map_step(self.state.clone())
    }
}

/// Combinators available on any [`IterHandle<T>`].
pub trait AsyncIteratorExt<T: Clone + Send + Sync + 'static> {
    /// Apply `f` per element; `f` may itself return `Err(FibraError::End)`
    /// to break the iteration early.
    fn map<U, F>(self, f: F) -> IterHandle<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Outcome<U> + Send + Sync + 'static;

    /// Like [`map`](Self::map), but `f` produces a full async action.
    fn map_async<U, F>(self, f: F) -> IterHandle<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> AsyncHandle<U> + Send + Sync + 'static;

    /// A `map` that passes the element through unchanged, for side effects.
    fn peek<F>(self, f: F) -> IterHandle<T>
    where
        F: Fn(&T) + Send + Sync + 'static;

    /// Sequential scan until `p` returns `true`; `p` may return
    /// `Err(FibraError::End)` to terminate the scan.
    fn filter<F>(self, p: F) -> IterHandle<T>
    where
        F: Fn(&T) -> Outcome<bool> + Send + Sync + 'static;

    /// Like [`filter`](Self::filter), but `p` is itself async.
    fn filter_async<F>(self, p: F) -> IterHandle<T>
    where
        F: Fn(&T) -> AsyncHandle<bool> + Send + Sync + 'static;

    /// Concatenate a per-element sub-iterator; when the outer source ends,
    /// `end_handler(End)` may produce one final sub-iterator to drain.
    fn flat_map<U, F, E>(self, f: F, end_handler: E) -> IterHandle<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> IterHandle<U> + Send + Sync + 'static,
        E: Fn(FibraError) -> Option<IterHandle<U>> + Send + Sync + 'static;
}

impl<T: Clone + Send + Sync + 'static> AsyncIteratorExt<T> for IterHandle<T> {
    fn map<U, F>(self, f: F) -> IterHandle<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Outcome<U> + Send + Sync + 'static,
    {
        Arc::new(MapIter {
            source: self,
            f: Arc::new(f),
        })
    }

    fn map_async<U, F>(self, f: F) -> IterHandle<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> AsyncHandle<U> + Send + Sync + 'static,
    {
        Arc::new(MapAsyncIter {
            source: self,
            f: Arc::new(f),
        })
    }

    fn peek<F>(self, f: F) -> IterHandle<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Arc::new(PeekIter {
            source: self,
            f: Arc::new(f),
        })
    }

    fn filter<F>(self, p: F) -> IterHandle<T>
    where
        F: Fn(&T) -> Outcome<bool> + Send + Sync + 'static,
    {
        Arc::new(FilterIter {
            source: self,
            p: Arc::new(p),
        })
    }

    fn filter_async<F>(self, p: F) -> IterHandle<T>
    where
        F: Fn(&T) -> AsyncHandle<bool> + Send + Sync + 'static,
    {
        Arc::new(FilterAsyncIter {
            source: self,
            p: Arc::new(p),
        })
    }

    fn flat_map<U, F, E>(self, f: F, end_handler: E) -> IterHandle<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> IterHandle<U> + Send + Sync + 'static,
        E: Fn(FibraError) -> Option<IterHandle<U>> + Send + Sync + 'static,
    {
        Arc::new(FlatMapIter {
            state: Arc::new(FlatMapState {
                outer: self,
                make_inner: Arc::new(f),
                end_handler: Arc::new(end_handler),
                current: Mutex::new(None),
                draining_tail: Mutex::new(false),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::to_list;
    use crate::wrappers::from_iter;
    use fibra_async::sync;

    #[test]
    fn map_applies_to_every_element() {
        let doubled: IterHandle<i32> = from_iter(vec![1, 2, 3]).map(|v| Ok(v * 2));
        assert_eq!(sync(&to_list(doubled)), Ok(vec![2, 4, 6]));
    }

    #[test]
    fn map_can_break_early_with_end() {
        let capped: IterHandle<i32> =
            from_iter(vec![1, 2, 3, 4]).map(|v| if v > 2 { Err(FibraError::End) } else { Ok(v) });
        assert_eq!(sync(&to_list(capped)), Ok(vec![1, 2]));
    }

    #[test]
    fn filter_keeps_only_matching_elements() {
        let evens: IterHandle<i32> = from_iter(1..=6).filter(|v| Ok(v % 2 == 0));
        assert_eq!(sync(&to_list(evens)), Ok(vec![2, 4, 6]));
    }

    #[test]
    fn peek_observes_without_changing_elements() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let tapped: IterHandle<i32> = from_iter(vec![1, 2]).peek(move |v| seen_clone.lock().push(*v));
        assert_eq!(sync(&to_list(tapped)), Ok(vec![1, 2]));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn flat_map_concatenates_inner_iterators() {
        let outer: IterHandle<i32> = from_iter(vec![1, 2]);
        let nested: IterHandle<i32> = outer.flat_map(
            |v| from_iter(vec![v, v * 10]),
            |_| None,
        );
        assert_eq!(sync(&to_list(nested)), Ok(vec![1, 10, 2, 20]));
    }

    #[test]
    fn flat_map_drains_a_tail_iterator_from_the_end_handler() {
        let outer: IterHandle<i32> = from_iter(vec![1]);
        let nested: IterHandle<i32> = outer.flat_map(
            |v| from_iter(vec![v]),
            |_| Some(from_iter(vec![99])),
        );
        assert_eq!(sync(&to_list(nested)), Ok(vec![1, 99]));
    }
}
