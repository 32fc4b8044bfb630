// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! [`FiberLocal<T>`]: storage keyed on "which fiber is running right now"
//! instead of "which OS thread is running right now" (spec §4.7).

use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use fibra_core::{FibraError, Result};

use crate::current::current_fiber;

static NEXT_KEY: AtomicUsize = AtomicUsize::new(0);

/// A slot of `T` scoped to whichever fiber is current when it is read or
/// written, rather than to the OS thread — a fiber's task may be dispatched
/// to a different worker thread every time it resumes, and plain
/// `thread_local!` storage would not follow it.
pub struct FiberLocal<T> {
    key: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for FiberLocal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Clone + 'static> FiberLocal<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }

    /// Read this slot for the current fiber. `Err(NoCurrentFiber)` when
    /// called outside any fiber's dispatch.
    pub fn get(&self) -> Result<Option<T>> {
        let fiber = current_fiber().ok_or(FibraError::NoCurrentFiber)?;
        let locals = fiber.locals().lock();
        Ok(locals
            .get(&self.key)
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned())
    }

    /// Write (or clear, with `None`) this slot for the current fiber.
    /// `set(None)` removes the entry outright rather than storing a boxed
    /// `None`, so a cleared slot does not keep the previous value's `T`
    /// alive via the map.
    pub fn set(&self, value: Option<T>) -> Result<()> {
        let fiber = current_fiber().ok_or(FibraError::NoCurrentFiber)?;
        let mut locals = fiber.locals().lock();
        match value {
            Some(value) => {
                locals.insert(self.key, Box::new(value) as Box<dyn Any + Send>);
            }
            None => {
                locals.remove(&self.key);
            }
        }
        Ok(())
    }
}
