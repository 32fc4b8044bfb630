// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::error::FibraError;

/// The immutable success/failure carrier every `Async<T>` eventually holds
/// exactly one of (spec §3, "Result<T>").
///
/// `Outcome<T>` is a type alias over `core::result::Result`, not a new enum:
/// Rust's `Result` already is the sum-of-`Success`/`Failure` the spec
/// describes, and reusing it lets every combinator use `?`, `map`, and the
/// rest of the standard toolkit instead of a bespoke variant set.
pub type Outcome<T> = core::result::Result<T, FibraError>;

/// The canonical "empty success" mentioned in the data model: a `Success(())`.
pub const VOID: Outcome<()> = Ok(());
