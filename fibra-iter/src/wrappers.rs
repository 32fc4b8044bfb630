// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Wrappers (spec §4.6): lifting a synchronous iterator, and a finite
//! sequence-like source that closes its underlying resource on `End`.

use std::sync::Arc;

use fibra_async::{AsyncHandle, Promise};
use fibra_core::{fibra_warn, FibraError};
use parking_lot::Mutex;

struct SyncIter<I> {
    inner: Mutex<I>,
}

impl<I, T> crate::iterator::AsyncIterator<T> for SyncIter<I>
where
    I: Iterator<Item = T> + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn next(&self) -> AsyncHandle<T> {
        let outcome = match self.inner.lock().next() {
            Some(value) => Ok(value),
            None => Err(FibraError::End),
        };
        Promise::completed_with(outcome).handle()
    }
}

/// Lift a plain [`Iterator`] into an [`AsyncIterator`](crate::AsyncIterator):
/// `Success(v)` while the source has elements, then `Failure(End)` forever
/// after.
#[must_use]
pub fn from_iter<I, T>(iter: I) -> crate::iterator::IterHandle<T>
where
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    Arc::new(SyncIter {
        inner: Mutex::new(iter.into_iter()),
    })
}

/// A finite source over a closeable resource: `pull` yields the next
/// element or `None` at exhaustion, at which point `close` runs exactly
/// once. A `close` failure is logged rather than propagated — the source
/// has already reported `End` by the time it runs.
pub struct FiniteSource<P, C, T> {
    pull: Mutex<P>,
    close: Mutex<Option<C>>,
    closed: Mutex<bool>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<P, C, T> FiniteSource<P, C, T>
where
    P: FnMut() -> Option<T> + Send + 'static,
    C: FnOnce() -> Result<(), FibraError> + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(pull: P, close: C) -> Arc<Self> {
        Arc::new(Self {
            pull: Mutex::new(pull),
            close: Mutex::new(Some(close)),
            closed: Mutex::new(false),
            _marker: std::marker::PhantomData,
        })
    }

    fn close_once(&self) {
        let mut closed = self.closed.lock();
        if *closed {
            return;
        }
        *closed = true;
        if let Some(close) = self.close.lock().take() {
            if let Err(error) = close() {
                fibra_warn!("FiniteSource close failed after End: {error}");
            }
        }
    }
}

impl<P, C, T> crate::iterator::AsyncIterator<T> for FiniteSource<P, C, T>
where
    P: FnMut() -> Option<T> + Send + 'static,
    C: FnOnce() -> Result<(), FibraError> + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn next(&self) -> AsyncHandle<T> {
        let outcome = match (self.pull.lock())() {
            Some(value) => Ok(value),
            None => {
                self.close_once();
                Err(FibraError::End)
            }
        };
        Promise::completed_with(outcome).handle()
    }
}
