// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! `AsyncBundle<T, R>`: structured parallel composition with a pluggable
//! *trigger* function (spec §4.5), plus the three standard triggers
//! `any_of`/`all_of`/`some_of`.

mod bundle;
mod triggers;

pub use bundle::{AsyncBundle, Trigger};
pub use triggers::{all_of, any_of, some_of};
