// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! [`Promise<T>`] (producer side) and [`Async<T>`] (read-only consumer
//! contract) — the two halves of the spec's action data model (§3, §4.2).

use std::mem;
use std::sync::Arc;

use event_listener::Event;
use fibra_core::{FibraError, Outcome};
use parking_lot::Mutex;

use crate::executor::current_executor;
use crate::trace::{current_trace_hook, TraceGuard};

/// A callback delivered exactly once, with the settled [`Outcome`].
pub type Callback<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

/// The read-only contract a consumer holds onto an in-flight action.
///
/// Every sequencing node the trampoline builds (`map`, `then`, `catch`, …)
/// implements this the same way [`Promise`] does: by forwarding to an
/// internal promise of its own.
pub trait Async<T: Clone + Send + Sync + 'static>: Send + Sync + 'static {
    /// Register `callback` to run once this action settles. If it has
    /// already settled, `callback` is dispatched immediately (through the
    /// current executor, never inline).
    fn subscribe(&self, callback: Callback<T>);

    /// Wait-free read: `Some(outcome)` if this action has already settled,
    /// `None` if it is still pending. Never touches an executor.
    fn poll(&self) -> Option<Outcome<T>>;

    /// Request cancellation: a cooperative signal, not a forced
    /// completion. The first `cancel` call latches `reason`
    /// (`poll_cancel()` then reports it) and — if a cancel listener is
    /// registered — schedules it with `reason` through the current
    /// executor. A producer decides whether and when to actually honor
    /// the request by completing itself; `cancel` never settles the
    /// action on its own. A no-op once already settled, and a no-op on
    /// every call after the first, whether or not a listener reacted.
    fn cancel(&self, reason: FibraError);

    /// The latched cancel reason, if `cancel` has been called and this
    /// action has not yet settled. `None` once settled, even if it settled
    /// as the direct result of honoring a cancel request.
    fn poll_cancel(&self) -> Option<FibraError>;

    /// `true` once this action has settled (succeeded, failed, or — if its
    /// producer chose to honor a cancel request — failed as a result of
    /// it).
    fn is_settled(&self) -> bool;
}

/// A type-erased handle to an in-flight or settled action — what spec §4.2
/// calls `Async<T>`.
pub type AsyncHandle<T> = Arc<dyn Async<T>>;

enum Callbacks<T> {
    None,
    One(Callback<T>),
    Many(Vec<Callback<T>>),
}

impl<T> Callbacks<T> {
    fn push(&mut self, callback: Callback<T>) {
        *self = match mem::replace(self, Callbacks::None) {
            Callbacks::None => Callbacks::One(callback),
            Callbacks::One(first) => Callbacks::Many(vec![first, callback]),
            Callbacks::Many(mut many) => {
                many.push(callback);
                Callbacks::Many(many)
            }
        };
    }

    fn into_vec(self) -> Vec<Callback<T>> {
        match self {
            Callbacks::None => Vec::new(),
            Callbacks::One(callback) => vec![callback],
            Callbacks::Many(many) => many,
        }
    }
}

/// A single, displaceable cancel listener bound to whatever executor is
/// current when it eventually fires (spec §3's "at most one current
/// cancellation listener at a time").
type CancelListener = Box<dyn Fn(FibraError) + Send>;

struct Pending<T> {
    callbacks: Callbacks<T>,
    /// First-cancel-wins: `Some` once `cancel` has latched a reason.
    cancel_reason: Option<FibraError>,
    cancel_listener: Option<CancelListener>,
}

enum State<T> {
    Pending(Pending<T>),
    Settled(Outcome<T>),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    event: Event,
    /// Set only while a trace hook was installed when this promise was
    /// constructed pending; run once, on settlement, to pop whatever it
    /// pushed (spec §4.7's push-on-construction/pop-on-completion protocol).
    trace_guard: Mutex<Option<TraceGuard>>,
}

/// The producer side of an action: something with the authority to settle
/// it exactly once. Cheap to clone — every clone shares the same state.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Promise<T> {
    /// A promise with no result yet.
    #[must_use]
    pub fn pending() -> Self {
        let trace_guard = current_trace_hook().map(|hook| hook.on_pending());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending(Pending {
                    callbacks: Callbacks::None,
                    cancel_reason: None,
                    cancel_listener: None,
                })),
                event: Event::new(),
                trace_guard: Mutex::new(trace_guard),
            }),
        }
    }

    /// A promise that has already settled, for wrapping an already-known
    /// value without ever touching an executor.
    #[must_use]
    pub fn completed_with(outcome: Outcome<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Settled(outcome)),
                event: Event::new(),
                trace_guard: Mutex::new(None),
            }),
        }
    }

    /// Settle with a success value. Returns `false` if already settled.
    pub fn succeed(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Settle with a failure. Returns `false` if already settled.
    pub fn fail(&self, error: FibraError) -> bool {
        self.complete(Err(error))
    }

    /// Settle with `outcome`, waking every registered listener through the
    /// current executor. Returns `false` (and drops `outcome`) if this
    /// promise had already settled — the first settle always wins.
    pub fn complete(&self, outcome: Outcome<T>) -> bool {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if matches!(&*state, State::Settled(_)) {
                return false;
            }
            let previous = mem::replace(&mut *state, State::Settled(outcome.clone()));
            match previous {
                State::Pending(pending) => pending.callbacks,
                State::Settled(_) => unreachable!("checked above"),
            }
        };

        self.inner.event.notify(usize::MAX);

        if let Some(guard) = self.inner.trace_guard.lock().take() {
            guard();
        }

        for callback in callbacks.into_vec() {
            let outcome = outcome.clone();
            current_executor().execute(Box::new(move || callback(outcome)));
        }
        true
    }

    /// Register `listener` to run if this promise is ever cancelled.
    /// Displaces whatever listener was registered before it — at most one
    /// is kept at a time (spec §3). If a cancel reason is already latched,
    /// `listener` is scheduled with it immediately, through the current
    /// executor, instead of being stored.
    pub fn on_cancel(&self, listener: impl Fn(FibraError) + Send + 'static) {
        let boxed: CancelListener = Box::new(listener);
        let already_latched = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Settled(_) => return,
                State::Pending(pending) => match pending.cancel_reason.clone() {
                    Some(reason) => {
                        pending.cancel_listener = None;
                        Some(reason)
                    }
                    None => {
                        pending.cancel_listener = Some(boxed);
                        None
                    }
                },
            }
        };
        if let Some(reason) = already_latched {
            current_executor().execute(Box::new(move || boxed(reason)));
        }
    }

    /// A type-erased handle onto this promise for consumers.
    #[must_use]
    pub fn handle(&self) -> AsyncHandle<T> {
        Arc::new(self.clone())
    }
}

impl<T: Clone + Send + Sync + 'static> Async<T> for Promise<T> {
    fn subscribe(&self, callback: Callback<T>) {
        let mut state = self.inner.state.lock();
        match &mut *state {
            State::Settled(outcome) => {
                let outcome = outcome.clone();
                drop(state);
                current_executor().execute(Box::new(move || callback(outcome)));
            }
            State::Pending(pending) => pending.callbacks.push(callback),
        }
    }

    fn poll(&self) -> Option<Outcome<T>> {
        match &*self.inner.state.lock() {
            State::Settled(outcome) => Some(outcome.clone()),
            State::Pending(_) => None,
        }
    }

    fn cancel(&self, reason: FibraError) {
        let listener = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Settled(_) => return,
                State::Pending(pending) => {
                    if pending.cancel_reason.is_some() {
                        return;
                    }
                    pending.cancel_reason = Some(reason.clone());
                    pending.cancel_listener.take()
                }
            }
        };
        if let Some(listener) = listener {
            current_executor().execute(Box::new(move || listener(reason)));
        }
    }

    fn poll_cancel(&self) -> Option<FibraError> {
        match &*self.inner.state.lock() {
            State::Settled(_) => None,
            State::Pending(pending) => pending.cancel_reason.clone(),
        }
    }

    fn is_settled(&self) -> bool {
        matches!(&*self.inner.state.lock(), State::Settled(_))
    }
}

/// Block the calling thread until `action` settles, returning its outcome.
///
/// This is the spec's blocking `sync()` escape hatch (§4.2) for code that
/// is not itself running inside a fiber — tests and `main` functions,
/// mostly. It must never be called from inside an executor's own worker
/// thread: that would deadlock a single-threaded pool.
pub fn sync<T: Clone + Send + Sync + 'static>(action: &AsyncHandle<T>) -> Outcome<T> {
    let slot: Arc<Mutex<Option<Outcome<T>>>> = Arc::new(Mutex::new(None));
    let done = Arc::new(Event::new());

    {
        let slot = slot.clone();
        let done = done.clone();
        action.subscribe(Box::new(move |outcome| {
            *slot.lock() = Some(outcome);
            done.notify(usize::MAX);
        }));
    }

    loop {
        if let Some(outcome) = slot.lock().take() {
            return outcome;
        }
        let listener = done.listen();
        if let Some(outcome) = slot.lock().take() {
            return outcome;
        }
        listener.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_before_completion_is_delivered_once_settled() {
        let promise = Promise::<i32>::pending();
        let handle = promise.handle();
        let received = Arc::new(Mutex::new(None));
        let received_clone = received.clone();
        handle.subscribe(Box::new(move |outcome| {
            *received_clone.lock() = Some(outcome);
        }));
        assert!(promise.succeed(7));
        // Delivered through the current executor, never inline: wait for it
        // to actually land rather than assuming same-thread ordering.
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(*received.lock(), Some(Ok(7)));
    }

    #[test]
    fn subscribe_after_completion_is_delivered_immediately() {
        let promise = Promise::<i32>::pending();
        assert!(promise.succeed(9));
        let received = Arc::new(Mutex::new(None));
        let received_clone = received.clone();
        promise.handle().subscribe(Box::new(move |outcome| {
            *received_clone.lock() = Some(outcome);
        }));
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(*received.lock(), Some(Ok(9)));
    }

    #[test]
    fn second_complete_is_ignored() {
        let promise = Promise::<i32>::pending();
        assert!(promise.succeed(1));
        assert!(!promise.succeed(2));
        assert_eq!(sync(&promise.handle()), Ok(1));
    }

    #[test]
    fn cancel_before_completion_latches_the_reason_without_settling() {
        let promise = Promise::<i32>::pending();
        let handle = promise.handle();
        let reason = FibraError::cancelled("shutting down");
        handle.cancel(reason.clone());
        assert_eq!(handle.poll_cancel(), Some(reason));
        assert!(!handle.is_settled());
        assert_eq!(handle.poll(), None);
    }

    #[test]
    fn cancel_after_completion_is_a_no_op() {
        let promise = Promise::<i32>::pending();
        assert!(promise.succeed(3));
        promise.cancel(FibraError::cancelled("too late"));
        assert_eq!(sync(&promise.handle()), Ok(3));
        assert_eq!(promise.handle().poll_cancel(), None);
    }

    #[test]
    fn second_cancel_does_not_replace_the_latched_reason() {
        let promise = Promise::<i32>::pending();
        let handle = promise.handle();
        handle.cancel(FibraError::cancelled("first"));
        handle.cancel(FibraError::cancelled("second"));
        assert_eq!(
            handle.poll_cancel(),
            Some(FibraError::cancelled("first"))
        );
    }

    #[test]
    fn a_cancel_listener_is_notified_once_a_reason_is_latched() {
        let promise = Promise::<i32>::pending();
        let heard = Arc::new(Mutex::new(None));
        let heard_clone = heard.clone();
        promise.on_cancel(move |reason| {
            *heard_clone.lock() = Some(reason);
        });
        let reason = FibraError::cancelled("please stop");
        promise.handle().cancel(reason.clone());
        // Dispatched through the current executor, never inline: give it a
        // beat to land before checking.
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(*heard.lock(), Some(reason));
    }

    #[test]
    fn a_cancel_listener_registered_after_cancel_fires_immediately() {
        let promise = Promise::<i32>::pending();
        let reason = FibraError::cancelled("already latched");
        promise.handle().cancel(reason.clone());
        let heard = Arc::new(Mutex::new(None));
        let heard_clone = heard.clone();
        promise.on_cancel(move |reason| {
            *heard_clone.lock() = Some(reason);
        });
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(*heard.lock(), Some(reason));
    }

    #[test]
    fn poll_is_wait_free_and_never_blocks_on_a_pending_promise() {
        let promise = Promise::<i32>::pending();
        assert_eq!(promise.handle().poll(), None);
        promise.succeed(5);
        assert_eq!(promise.handle().poll(), Some(Ok(5)));
    }

    #[test]
    fn many_subscribers_each_receive_the_outcome() {
        let promise = Promise::<i32>::pending();
        let handle = promise.handle();
        let seen: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..5 {
            let seen = seen.clone();
            handle.subscribe(Box::new(move |outcome| {
                seen.lock().push(outcome.unwrap());
            }));
        }
        promise.succeed(42);
        std::thread::sleep(std::time::Duration::from_millis(20));
        let seen = seen.lock();
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|v| *v == 42));
    }

    #[test]
    fn a_trace_hook_is_pushed_on_pending_and_popped_on_settlement() {
        use crate::trace::{with_trace_hook, TraceGuard, TraceHook};
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

        let pushes = Arc::new(AtomicUsize::new(0));
        let pops = Arc::new(AtomicUsize::new(0));
        let hook = Arc::new(CountingHook {
            pushes: pushes.clone(),
            pops: pops.clone(),
        });

        let promise = with_trace_hook(hook, Promise::<i32>::pending);
        assert_eq!(pushes.load(Ordering::SeqCst), 1);
        assert_eq!(pops.load(Ordering::SeqCst), 0);
        promise.succeed(1);
        assert_eq!(pops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_promise_built_outside_any_trace_hook_never_touches_one() {
        // No hook installed: pending()/complete() must be no-ops against
        // the trace machinery rather than panicking on a missing one.
        let promise = Promise::<i32>::pending();
        promise.succeed(1);
    }

    #[test]
    fn sync_blocks_until_settled_from_another_thread() {
        let promise = Promise::<i32>::pending();
        let handle = promise.handle();
        let producer = promise.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            producer.succeed(99);
        });
        assert_eq!(sync(&handle), Ok(99));
    }
}
