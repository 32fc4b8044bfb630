// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

#![allow(clippy::multiple_crate_versions)]

//! Fibers (spec §4.7) and the default executor pool (spec §4.8): identity,
//! fiber-local storage, stack-trace recording, and the thread pool that
//! backs `current_executor()` when no fiber is current.
//!
//! - [`Fiber`] is the producer-facing handle; [`FiberHandle`]/[`DynFiber`]
//!   are its type-erased identity surface.
//! - [`FiberLocal`] is storage keyed on the current fiber rather than the
//!   current OS thread.
//! - [`Pool`]/[`default_pool`]/[`configure_default_pool`] are the default
//!   executor every fiber falls back to when none is given or inherited.

mod config;
mod current;
mod fiber;
mod handle;
mod id;
mod local;
mod pool;
mod registry;
mod trace;

pub use config::FibraConfig;
pub use current::{current_fiber, with_current_fiber};
pub use fiber::{spawn, Fiber};
pub use handle::{DynFiber, FiberHandle};
pub use id::FiberId;
pub use local::FiberLocal;
pub use pool::{configure_default_pool, default_pool, Pool};
pub use registry::{all as all_fibers, find as find_fiber};
pub use trace::{snapshot as trace_snapshot, TraceFrame};
