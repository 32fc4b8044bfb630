// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Backend abstraction over the async runtimes fibra can host its fiber
//! pool and timers on: tokio, smol, async-std and, behind `runtime-wasm`,
//! the browser event loop. Every other fibra crate is generic over
//! [`runtime::Runtime`] rather than depending on a concrete executor.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod impls;
pub mod mutex;
pub mod runtime;
pub mod timer;

pub use mutex::MutexLike;
pub use runtime::Runtime;
pub use timer::Timer;
