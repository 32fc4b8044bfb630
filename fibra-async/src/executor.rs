// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The executor boundary every sequencing step dispatches through.
//!
//! A [`Promise`](crate::Promise) never runs a continuation inline on the
//! thread that completed it; it hands the continuation to the *current*
//! [`Executor`] instead. This is what keeps `map`/`then`/`catch` chains
//! from growing the call stack: each link is a fresh dispatch, not a
//! nested call.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, OnceLock};

use fibra_core::fibra_warn;

/// A unit of work ready to run, handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run a [`Job`].
///
/// `fibra-fiber`'s default pool is the production implementation; tests
/// typically install a deterministic one from `fibra-test-utils`. `as_any`
/// lets `Fiber` construction detect and unwrap an already fiber-wrapped
/// executor instead of nesting current-fiber wrappers.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, job: Job);

    /// Supports downcasting an `Arc<dyn Executor>` back to its concrete
    /// type — see `fibra-fiber`'s "unwrap an already-wrapped executor"
    /// construction step.
    fn as_any(&self) -> &dyn Any;
}

/// Runs every job on the calling thread, immediately — the one executor in
/// this crate that violates spec §4.1's "submit returns before the work
/// runs" contract on purpose. Exists for tests that want to single-step a
/// chain without standing up a real dispatcher; it is never installed
/// automatically. Reaching for this as a default would silently turn every
/// sequencing chain back into recursive, unbounded-stack calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Drains jobs on a single dedicated background thread. This is the
/// fallback [`current_executor`] uses when nothing more specific — a
/// `Fiber`'s pool, a `ManualExecutor` in a test — has been installed: it
/// still crosses a real thread boundary on every dispatch, so a chain of
/// any length stays off the calling thread's call stack (spec §4.3/§9's
/// trampolining requirement), even outside any fiber.
struct GlobalExecutor {
    sender: mpsc::Sender<Job>,
}

impl GlobalExecutor {
    fn start() -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        std::thread::Builder::new()
            .name("fibra-global-dispatch".to_string())
            .spawn(move || {
                for job in receiver {
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                        let message = payload
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic payload".to_string());
                        fibra_warn!("fibra global executor job panicked: {}", message);
                    }
                }
            })
            .expect("failed to spawn the fibra global dispatch thread");
        Self { sender }
    }
}

impl Executor for GlobalExecutor {
    fn execute(&self, job: Job) {
        // The receiving thread never exits while `sender` (cloned into the
        // process-wide static) is still alive, so this can't fail.
        let _ = self.sender.send(job);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

static GLOBAL_EXECUTOR: OnceLock<Arc<dyn Executor>> = OnceLock::new();

/// The process-wide dispatcher [`current_executor`] falls back to. Started
/// lazily on first use and never torn down.
#[must_use]
pub fn global_executor() -> Arc<dyn Executor> {
    GLOBAL_EXECUTOR
        .get_or_init(|| Arc::new(GlobalExecutor::start()) as Arc<dyn Executor>)
        .clone()
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn Executor>>> = const { RefCell::new(None) };
}

/// Install `executor` as the current executor for the duration of `f`,
/// restoring whatever was current beforehand on return (or unwind).
///
/// `Fiber` calls this around the body of every task it hosts, so every
/// promise created inside a fiber dispatches its continuations back onto
/// that fiber's executor.
pub fn with_executor<R>(executor: Arc<dyn Executor>, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT.with(|cell| cell.borrow_mut().replace(executor));
    struct Restore(Option<Arc<dyn Executor>>);
    impl Drop for Restore {
        fn drop(&mut self) {
            CURRENT.with(|cell| *cell.borrow_mut() = self.0.take());
        }
    }
    let _restore = Restore(previous);
    f()
}

/// The executor a new sequencing node should dispatch its continuation
/// through: whatever [`with_executor`] last installed on this thread, or
/// the [`global_executor`] if nothing has. Never falls back to
/// [`InlineExecutor`] — that one is opt-in only.
#[must_use]
pub fn current_executor() -> Arc<dyn Executor> {
    CURRENT.with(|cell| cell.borrow().clone()).unwrap_or_else(global_executor)
}
