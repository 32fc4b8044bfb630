// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Conditional logging shim: uses `tracing` when the `tracing` feature is
//! enabled, falls back to `eprintln!`/`println!` otherwise. Shared by every
//! `fibra-*` crate so none of them has to pick a logging backend on its own.

#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! fibra_error {
    ($($arg:tt)*) => {{
        tracing::error!($($arg)*);
    }};
}

#[cfg(feature = "tracing")]
#[macro_export]
macro_rules! fibra_warn {
    ($($arg:tt)*) => {{
        tracing::warn!($($arg)*);
    }};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! fibra_error {
    ($($arg:tt)*) => {{
        eprintln!($($arg)*);
    }};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! fibra_warn {
    ($($arg:tt)*) => {{
        eprintln!($($arg)*);
    }};
}
