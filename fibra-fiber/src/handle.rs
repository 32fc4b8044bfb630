// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! [`FiberHandle`]: the type-erased identity surface of a [`crate::Fiber<T>`].
//! `Fiber<T>` is generic over its task's result type, but
//! `Fiber::current()`/`FiberLocal` only ever need identity, the fiber-local
//! map, and (optionally) the trace stack — none of which depend on `T`.

use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::current::current_fiber;
use crate::id::FiberId;
use crate::trace::{snapshot, TraceFrame};

/// The object-safe surface every `Fiber<T>` exposes regardless of its task
/// type.
pub trait FiberHandle: Send + Sync + 'static {
    fn id(&self) -> FiberId;
    fn name(&self) -> &str;
    fn locals(&self) -> &Mutex<HashMap<usize, Box<dyn Any + Send>>>;

    /// Whether this fiber records a stack trace per pending promise (spec
    /// §4.7). Off by default — see [`crate::FibraConfig::trace_recording`].
    fn trace_recording(&self) -> bool;

    /// Record a frame, returning the slot it occupies so it can be popped
    /// by the matching [`FiberHandle::pop_trace_frame`] call. Slots are not
    /// necessarily popped in LIFO order: a fiber may have several promises
    /// pending at once, and whichever settles first pops first.
    fn push_trace_frame(&self, frame: TraceFrame) -> usize;

    /// Undo a prior [`FiberHandle::push_trace_frame`] once the promise it
    /// was recorded for has settled.
    fn pop_trace_frame(&self, slot: usize);

    /// The frames still outstanding, most-recent-first, as rendered
    /// strings (spec §4.7's `Fiber.getStackTrace()`, minus the live thread
    /// trace prepended by [`FiberHandle::stack_trace`]).
    fn recorded_trace(&self) -> Vec<String>;

    /// `Fiber.getStackTrace()`: if the calling thread is currently running
    /// as this very fiber, prepend a live capture of its own call stack;
    /// then append the recorded frames, most-recent-first, with adjacent
    /// duplicates collapsed.
    fn stack_trace(&self) -> Vec<String> {
        let mut frames = Vec::new();
        if current_fiber().is_some_and(|current| current.id() == self.id()) {
            frames.push(Backtrace::force_capture().to_string());
        }
        frames.extend(self.recorded_trace());
        frames
    }
}

pub(crate) fn render_trace(slots: &Mutex<Vec<Option<TraceFrame>>>) -> Vec<String> {
    snapshot(&slots.lock())
}

/// A live handle onto any fiber, as returned by [`crate::current::current_fiber`]
/// and stored in the live-fiber registry.
pub type DynFiber = Arc<dyn FiberHandle>;
