// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

#![allow(clippy::multiple_crate_versions)]

//! Error kinds and the `Outcome<T>` carrier shared by every other `fibra`
//! crate.
//!
//! See [`FibraError`] for the full kind table and [`Outcome`] for the
//! immutable success/failure carrier that every `Async<T>` eventually
//! produces exactly once.

mod error;
pub mod logging;
mod outcome;

pub use error::{FibraError, FinalizerOriginal, IntoFibraError, ResultExt};
pub use outcome::Outcome;

/// Specialized result type for fibra operations, analogous to the spec's
/// `Result<T>` data-model entry (§3).
pub type Result<T> = core::result::Result<T, FibraError>;
