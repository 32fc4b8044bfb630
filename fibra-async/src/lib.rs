// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! `Promise<T>` / `Async<T>` and the sequencing engine built on top of
//! them: the heart of the fibra action runtime (spec §4.2–§4.4).
//!
//! - [`Promise`] is the producer side; [`Async`] is what consumers hold.
//! - [`AsyncHandleExt`] supplies `map`/`then`/`catch`/`finally`/`peek`/
//!   `covary`, each crossing an executor boundary so chains of any length
//!   stay flat on the call stack.
//! - [`timeout`] races an action against a runtime alarm.
//! - [`Executor`]/[`with_executor`]/[`current_executor`] are the seam
//!   `fibra-fiber`'s pool plugs into.

#![allow(clippy::multiple_crate_versions)]

mod executor;
mod ops;
mod promise;
mod timeout;
mod trace;

pub use executor::{current_executor, global_executor, with_executor, Executor, InlineExecutor, Job};
pub use ops::AsyncHandleExt;
pub use promise::{sync, Async, AsyncHandle, Callback, Promise};
pub use timeout::timeout;
pub use trace::{current_trace_hook, with_trace_hook, TraceGuard, TraceHook};
