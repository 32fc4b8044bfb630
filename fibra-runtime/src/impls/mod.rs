// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

pub mod common;

#[cfg(feature = "runtime-tokio")]
pub mod tokio;

#[cfg(feature = "runtime-smol")]
pub mod smol;

#[cfg(feature = "runtime-async-std")]
pub mod async_std;

#[cfg(feature = "runtime-wasm")]
pub mod wasm;

#[cfg(feature = "runtime-tokio")]
pub use self::tokio::TokioRuntime as DefaultRuntime;

#[cfg(all(not(feature = "runtime-tokio"), feature = "runtime-smol"))]
pub use self::smol::SmolRuntime as DefaultRuntime;

#[cfg(all(
    not(feature = "runtime-tokio"),
    not(feature = "runtime-smol"),
    feature = "runtime-async-std"
))]
pub use self::async_std::AsyncStdRuntime as DefaultRuntime;
