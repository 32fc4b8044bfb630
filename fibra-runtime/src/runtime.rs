// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::{mutex::MutexLike, timer::Timer};
use core::cmp::Ord;
use core::default::Default;
use core::fmt::Debug;
use core::future::Future;
use core::marker::Sized;
use core::marker::{Copy, Send, Sync};

/// A backend (tokio / smol / async-std / wasm) that fibra can host its
/// fiber pool and timeouts on. Mirrors the "Delayed scheduler" and
/// "Blocking executor pool" external collaborators from spec §6: `spawn`
/// puts a future on the backend's own task system, and `Timer` supplies
/// the delayed-alarm primitive that `timeout()` and the default pool's
/// keep-alive interval are built from.
pub trait Runtime: 'static {
    type Mutex<T: ?Sized>: MutexLike<T>;
    type Timer: Timer<Instant = Self::Instant> + Default;
    type Instant: Copy + Ord + Send + Sync + Debug;

    /// Spawn a fire-and-forget future on the backend's own task system.
    /// Used by the default executor pool's worker threads and by
    /// `FiberTask::spawn` to host a fiber's top-level task.
    fn spawn<F>(future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
