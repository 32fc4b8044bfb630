// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::Arc;

use fibra_async::AsyncHandle;

/// An asynchronous element source (spec §4.6's abstract contract).
///
/// Success settles the next element; failure with [`fibra_core::FibraError::End`]
/// is the normal end-of-iteration signal; any other failure is a genuine
/// iteration error.
pub trait AsyncIterator<T: Clone + Send + Sync + 'static>: Send + Sync + 'static {
    fn next(&self) -> AsyncHandle<T>;
}

/// A type-erased handle to an iterator, the `AsyncIterator<T>` analogue of
/// [`fibra_async::AsyncHandle`].
pub type IterHandle<T> = Arc<dyn AsyncIterator<T>>;
