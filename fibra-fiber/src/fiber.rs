// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! [`Fiber<T>`]: identity plus a logical executor scope (spec §4.7).

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use fibra_async::{
    current_executor, with_executor, with_trace_hook, Async, AsyncHandle, Executor, Job, Promise, TraceGuard,
    TraceHook,
};
use fibra_core::{fibra_warn, FibraError, Outcome};
use parking_lot::Mutex;

use crate::config::FibraConfig;
use crate::current::{current_fiber, with_current_fiber};
use crate::handle::{render_trace, DynFiber, FiberHandle};
use crate::id::FiberId;
use crate::pool::default_pool;
use crate::registry;
use crate::trace::TraceFrame;

struct FiberState {
    id: FiberId,
    name: String,
    locals: Mutex<HashMap<usize, Box<dyn Any + Send>>>,
    trace_recording: bool,
    /// A slab rather than a plain stack: promises don't necessarily settle
    /// in the order they were created, so a popped slot is tombstoned
    /// (`None`) in place instead of assuming the last push is the first
    /// pop.
    trace_stack: Mutex<Vec<Option<TraceFrame>>>,
}

impl FiberHandle for FiberState {
    fn id(&self) -> FiberId {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn locals(&self) -> &Mutex<HashMap<usize, Box<dyn Any + Send>>> {
        &self.locals
    }
    fn trace_recording(&self) -> bool {
        self.trace_recording
    }
    fn push_trace_frame(&self, frame: TraceFrame) -> usize {
        let mut stack = self.trace_stack.lock();
        stack.push(Some(frame));
        stack.len() - 1
    }
    fn pop_trace_frame(&self, slot: usize) {
        let mut stack = self.trace_stack.lock();
        if let Some(entry) = stack.get_mut(slot) {
            *entry = None;
        }
        while matches!(stack.last(), Some(None)) {
            stack.pop();
        }
    }
    fn recorded_trace(&self) -> Vec<String> {
        render_trace(&self.trace_stack)
    }
}

/// Every task submitted through a fiber's executor runs with
/// `Fiber::current()` set to that fiber, dispatched onto the fiber's
/// underlying (unwrapped) executor.
struct FiberExecutor {
    fiber: DynFiber,
    inner: Arc<dyn Executor>,
}

/// Pushes a frame onto the owning fiber's trace stack for every `Promise`
/// constructed while it is installed, popping it again on settlement
/// (spec §4.7). Installed only for fibers with trace recording on.
struct FiberTraceHook {
    fiber: DynFiber,
}

impl TraceHook for FiberTraceHook {
    fn on_pending(&self) -> TraceGuard {
        let slot = self.fiber.push_trace_frame(TraceFrame::capture());
        let fiber = self.fiber.clone();
        Box::new(move || fiber.pop_trace_frame(slot))
    }
}

impl Executor for FiberExecutor {
    fn execute(&self, job: Job) {
        let fiber = self.fiber.clone();
        let inner = self.inner.clone();
        self.inner.execute(Box::new(move || {
            // Re-wrap rather than reuse: `execute` only has `&self`, and a
            // fresh wrapper over the same `fiber`/`inner` pair is exactly
            // equivalent, so every continuation dispatched from inside
            // `job` still sees `Fiber::current()` as this fiber.
            let wrapper: Arc<dyn Executor> = Arc::new(FiberExecutor {
                fiber: fiber.clone(),
                inner: inner.clone(),
            });
            let trace_recording = fiber.trace_recording();
            let body = {
                let fiber = fiber.clone();
                move || {
                    with_current_fiber(fiber, || {
                        with_executor(wrapper, job);
                    });
                }
            };
            let result = catch_unwind(AssertUnwindSafe(|| {
                if trace_recording {
                    let hook: Arc<dyn TraceHook> = Arc::new(FiberTraceHook { fiber: fiber.clone() });
                    with_trace_hook(hook, body);
                } else {
                    body();
                }
            }));
            if let Err(payload) = result {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic payload".to_string());
                fibra_warn!("fiber {} executor wrapper panicked: {}", fiber.name(), message);
            }
        }));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An identity plus a logical execution scope for a task (spec §4.7).
/// `Fiber<T>` owns the task's result type; [`FiberHandle`]/[`DynFiber`]
/// expose the parts of it that don't.
pub struct Fiber<T: Clone + Send + Sync + 'static> {
    state: DynFiber,
    task: AsyncHandle<T>,
    trace_recording: bool,
    cached_join: Mutex<Option<AsyncHandle<T>>>,
}

/// A join handle that forwards `cancel` into the task it was born from,
/// rather than completing its own promise directly — so cancelling a join
/// actually cancels the fiber's task instead of merely detaching the
/// caller from it.
struct ForwardingJoin<T> {
    promise: Promise<T>,
    task: AsyncHandle<T>,
}

impl<T: Clone + Send + Sync + 'static> Async<T> for ForwardingJoin<T> {
    fn subscribe(&self, callback: fibra_async::Callback<T>) {
        self.promise.handle().subscribe(callback);
    }

    fn poll(&self) -> Option<Outcome<T>> {
        self.promise.handle().poll()
    }

    fn cancel(&self, reason: FibraError) {
        self.task.cancel(reason);
    }

    fn poll_cancel(&self) -> Option<FibraError> {
        self.task.poll_cancel()
    }

    fn is_settled(&self) -> bool {
        self.promise.handle().is_settled()
    }
}

impl<T: Clone + Send + Sync + 'static> Fiber<T> {
    /// Spawn a fiber running `task`, which is invoked (on the resolved
    /// executor, with `Fiber::current()` already set) to produce the
    /// `Async<T>` this fiber tracks. A panic inside `task` itself becomes a
    /// `Failure(UserThrew)` rather than unwinding through the executor.
    pub fn spawn<F>(
        executor: Option<Arc<dyn Executor>>,
        name: Option<String>,
        trace_recording: bool,
        task: F,
    ) -> Arc<Self>
    where
        F: FnOnce() -> AsyncHandle<T> + Send + 'static,
    {
        let resolved_executor = resolve_executor(executor);
        let id = FiberId::next();
        let state: DynFiber = Arc::new(FiberState {
            id,
            name: name.unwrap_or_else(|| id.to_string()),
            locals: Mutex::new(HashMap::new()),
            trace_recording,
            trace_stack: Mutex::new(Vec::new()),
        });

        registry::register(state.clone());

        let wrapper: Arc<dyn Executor> = Arc::new(FiberExecutor {
            fiber: state.clone(),
            inner: resolved_executor,
        });

        let task_promise: Promise<T> = Promise::pending();
        {
            let task_promise = task_promise.clone();
            let unregister_id = state.id();
            wrapper.execute(Box::new(move || {
                let produced = catch_unwind(AssertUnwindSafe(task));
                match produced {
                    Ok(inner) => {
                        let completer = task_promise.clone();
                        inner.subscribe(Box::new(move |outcome| {
                            completer.complete(outcome);
                            registry::unregister(unregister_id);
                        }));
                    }
                    Err(payload) => {
                        let message = payload
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic payload".to_string());
                        task_promise.complete(Err(FibraError::user_threw(PanicDuringSpawn(message))));
                        registry::unregister(unregister_id);
                    }
                }
            }));
        }

        Arc::new(Self {
            state,
            task: task_promise.handle(),
            trace_recording,
            cached_join: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn id(&self) -> FiberId {
        self.state.id()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.state.name()
    }

    #[must_use]
    pub fn handle(&self) -> DynFiber {
        self.state.clone()
    }

    /// `Fiber.getStackTrace()` (spec §4.7). Empty unless this fiber was
    /// spawned with trace recording on.
    #[must_use]
    pub fn stack_trace(&self) -> Vec<String> {
        self.state.stack_trace()
    }

    /// Returns an `Async<T>` that completes when the fiber's task does.
    /// Cancelling it forwards cancel into the task. With trace recording
    /// off, every call before the task settles shares one cached forwarder;
    /// with it on, each call gets its own so per-call-site traces attach.
    pub fn join(&self) -> AsyncHandle<T> {
        if self.trace_recording {
            return self.new_forwarding_join();
        }
        let mut cached = self.cached_join.lock();
        if let Some(existing) = &*cached {
            return existing.clone();
        }
        let join = if self.task.is_settled() {
            self.task.clone()
        } else {
            self.new_forwarding_join()
        };
        *cached = Some(join.clone());
        join
    }

    fn new_forwarding_join(&self) -> AsyncHandle<T> {
        let promise = Promise::pending();
        {
            let promise = promise.clone();
            self.task.subscribe(Box::new(move |outcome| {
                promise.complete(outcome);
            }));
        }
        Arc::new(ForwardingJoin {
            promise,
            task: self.task.clone(),
        })
    }
}

#[derive(Debug)]
struct PanicDuringSpawn(String);

impl std::fmt::Display for PanicDuringSpawn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fiber task panicked: {}", self.0)
    }
}

impl std::error::Error for PanicDuringSpawn {}

fn resolve_executor(explicit: Option<Arc<dyn Executor>>) -> Arc<dyn Executor> {
    if let Some(executor) = explicit {
        return unwrap_fiber_executor(executor);
    }
    if current_fiber().is_some() {
        return unwrap_fiber_executor(current_executor());
    }
    default_pool()
}

/// If `executor` is itself a `FiberExecutor`, unwrap to the raw executor it
/// wraps instead of nesting another current-fiber-setting layer on top,
/// which would otherwise make a nested fiber's dispatch incorrectly
/// overwrite the outer fiber's `Fiber::current()` for code that should
/// still see itself as running under whichever fiber submitted it.
fn unwrap_fiber_executor(executor: Arc<dyn Executor>) -> Arc<dyn Executor> {
    match executor.as_any().downcast_ref::<FiberExecutor>() {
        Some(fiber_executor) => fiber_executor.inner.clone(),
        None => executor,
    }
}

/// Convenience constructor matching spec §4.7's `Fiber(executor=None,
/// name=None, task)` signature, using process defaults for trace
/// recording.
pub fn spawn<T, F>(task: F) -> Arc<Fiber<T>>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> AsyncHandle<T> + Send + 'static,
{
    Fiber::spawn(None, None, FibraConfig::default().trace_recording, task)
}
