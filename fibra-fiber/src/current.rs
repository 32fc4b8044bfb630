// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The thread-local "which fiber is this code running as part of" slot,
//! mirroring `fibra-async`'s `with_executor`/`current_executor` exactly
//! (spec §4.7: "`Fiber.current()` reads as this fiber" for the duration of
//! any task submitted through its executor wrapper).

use std::cell::RefCell;

use crate::handle::DynFiber;

thread_local! {
    static CURRENT_FIBER: RefCell<Option<DynFiber>> = const { RefCell::new(None) };
}

/// Install `fiber` as the current fiber for the duration of `f`, restoring
/// whatever was current beforehand on return (or unwind).
pub fn with_current_fiber<R>(fiber: DynFiber, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_FIBER.with(|cell| cell.borrow_mut().replace(fiber));
    struct Restore(Option<DynFiber>);
    impl Drop for Restore {
        fn drop(&mut self) {
            CURRENT_FIBER.with(|cell| *cell.borrow_mut() = self.0.take());
        }
    }
    let _restore = Restore(previous);
    f()
}

/// The fiber the calling thread is currently executing a task for, if any.
#[must_use]
pub fn current_fiber() -> Option<DynFiber> {
    CURRENT_FIBER.with(|cell| cell.borrow().clone())
}
