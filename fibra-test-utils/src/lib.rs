// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

#![allow(clippy::multiple_crate_versions)]

//! Test infrastructure for the fibra workspace: a deterministic executor
//! and assertion helpers that eliminate the common `sync(&handle).unwrap()`
//! boilerplate.

mod assertions;
mod macros;
mod manual_executor;

pub use assertions::{assert_does_not_settle_within, assert_fails, assert_succeeds};
pub use manual_executor::ManualExecutor;
