// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! `AsyncIterator<T>` (spec §4.6): `next()` yields an `Async<T>` whose
//! failure with [`FibraError::End`] is the normal end-of-iteration signal,
//! not an error. Every intermediary combinator here is built out of
//! `fibra-async`'s `then`/`catch_async`/`peek`, so the same trampoline that
//! bounds a sequencing chain's stack also bounds an iteration's.

mod combinators;
mod iterator;
mod terminal;
mod wrappers;

pub use combinators::AsyncIteratorExt;
pub use iterator::{AsyncIterator, IterHandle};
pub use terminal::{for_each, for_each_async, reduce, reduce_async, to_list};
pub use wrappers::{from_iter, FiniteSource};
