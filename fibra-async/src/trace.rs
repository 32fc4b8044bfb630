// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The optional push/pop-on-`Promise`-lifecycle hook behind spec §4.7's
//! stack-trace recording.
//!
//! `fibra-async` has no notion of a fiber — it only exposes the seam. A
//! crate that does (`fibra-fiber`) installs a [`TraceHook`] for the
//! duration of a task's dispatch, the same way it installs an [`Executor`]
//! via [`crate::with_executor`]. A [`Promise`](crate::Promise) calls
//! whatever hook is current when it is constructed, and runs the guard it
//! gets back when it settles — regardless of what that hook actually
//! records.

use std::cell::RefCell;
use std::sync::Arc;

/// Runs once a pending promise settles, to undo whatever `on_pending`
/// recorded for it.
pub type TraceGuard = Box<dyn FnOnce() + Send>;

/// Something that wants to know when a promise starts (and later stops)
/// being pending — `fibra-fiber`'s per-fiber trace stack is the only
/// implementation, but this crate doesn't need to know that.
pub trait TraceHook: Send + Sync + 'static {
    /// Called once, from inside `Promise::pending()`. The returned guard
    /// runs exactly once, from inside `Promise::complete()`.
    fn on_pending(&self) -> TraceGuard;
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn TraceHook>>> = const { RefCell::new(None) };
}

/// Install `hook` as the current trace hook for the duration of `f`,
/// restoring whatever was current beforehand on return (or unwind).
pub fn with_trace_hook<R>(hook: Arc<dyn TraceHook>, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT.with(|cell| cell.borrow_mut().replace(hook));
    struct Restore(Option<Arc<dyn TraceHook>>);
    impl Drop for Restore {
        fn drop(&mut self) {
            CURRENT.with(|cell| *cell.borrow_mut() = self.0.take());
        }
    }
    let _restore = Restore(previous);
    f()
}

/// The trace hook a new `Promise` should record its construction with, if
/// any. `None` on every thread that never had one installed — trace
/// recording is off by default (spec §4.7).
#[must_use]
pub fn current_trace_hook() -> Option<Arc<dyn TraceHook>> {
    CURRENT.with(|cell| cell.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHook {
        pushes: Arc<AtomicUsize>,
        pops: Arc<AtomicUsize>,
    }

    impl TraceHook for CountingHook {
        fn on_pending(&self) -> TraceGuard {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            let pops = self.pops.clone();
            Box::new(move || {
                pops.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[test]
    fn no_hook_installed_by_default() {
        assert!(current_trace_hook().is_none());
    }

    #[test]
    fn installed_hook_is_visible_only_for_the_closure_duration() {
        let pushes = Arc::new(AtomicUsize::new(0));
        let pops = Arc::new(AtomicUsize::new(0));
        let hook = Arc::new(CountingHook {
            pushes: pushes.clone(),
            pops: pops.clone(),
        });

        let guard = with_trace_hook(hook, || {
            let hook = current_trace_hook().expect("hook installed");
            hook.on_pending()
        });
        assert!(current_trace_hook().is_none());
        assert_eq!(pushes.load(Ordering::SeqCst), 1);
        guard();
        assert_eq!(pops.load(Ordering::SeqCst), 1);
    }
}
