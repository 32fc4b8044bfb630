// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! # Fibra
//!
//! An asynchronous action runtime: deferred, cancellable, single-completion
//! computations (`Async<T>`) composed by sequencing combinators, grouped in
//! structured-concurrency bundles, iterated lazily, and hosted inside
//! user-nameable logical execution contexts (`Fiber`) each bound to a
//! serialising executor.
//!
//! ## Design philosophy
//!
//! Fibra is callback-based rather than built on `std::future::Future`: a
//! [`Promise`] delivers its [`Outcome`] to every subscriber through the
//! *current executor*, never inline, so chains of any length — `map`,
//! `then`, `catch`, `AsyncIterator` loops — stay flat on the call stack.
//! Dispatch always crosses an explicit executor boundary ([`Executor`],
//! `current_executor`/`with_executor`); fibers and the default pool are two
//! different ways of supplying that boundary, not special cases of it.
//!
//! Deliberately out of scope: any HTML/DOM builder tree or HTTP/networking
//! layer that might consume this runtime. Those are plain data-model and
//! serialization concerns and are not part of this crate.
//!
//! ## Quick start
//!
//! ```
//! use fibra::prelude::*;
//!
//! let promise = Promise::<i32>::pending();
//! let doubled = promise.handle().map(|n| n * 2);
//! promise.succeed(21);
//! assert_eq!(fibra::sync(&doubled), Ok(42));
//! ```

pub use fibra_async::{
    current_executor, current_trace_hook, global_executor, sync, with_executor, with_trace_hook, Async, AsyncHandle,
    AsyncHandleExt, Callback, Executor, InlineExecutor, Job, Promise, TraceGuard, TraceHook,
};
pub use fibra_bundle::{all_of, any_of, some_of, AsyncBundle, Trigger};
pub use fibra_core::{FibraError, FinalizerOriginal, Outcome, Result};
pub use fibra_fiber::{
    all_fibers, configure_default_pool, current_fiber, default_pool, find_fiber, spawn, trace_snapshot,
    with_current_fiber, DynFiber, Fiber, FiberHandle, FiberId, FiberLocal, FibraConfig, Pool, TraceFrame,
};
pub use fibra_iter::{for_each, for_each_async, from_iter, reduce, reduce_async, to_list, AsyncIterator, AsyncIteratorExt, FiniteSource, IterHandle};

/// Convenient single-import surface for application code.
pub mod prelude {
    pub use crate::{
        all_of, any_of, current_executor, current_fiber, global_executor, some_of, spawn, sync, with_executor, Async,
        AsyncBundle, AsyncHandle, AsyncHandleExt, AsyncIterator, AsyncIteratorExt, Executor, Fiber, FiberLocal,
        FibraConfig, FibraError, Outcome, Promise, Result,
    };
}
