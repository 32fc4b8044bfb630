// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::time::Duration;

/// Tuning knobs for the default executor pool and stack-trace recording
/// (spec §4.8, §4.7). Every field has a documented, non-contractual
/// default — tune explicitly rather than relying on them in production.
#[derive(Clone, Debug)]
pub struct FibraConfig {
    /// Number of workers in the default pool. Defaults to the host's
    /// available parallelism (falling back to 1 if it cannot be read).
    pub pool_size: usize,
    /// How long an idle worker thread waits on its monitor before exiting
    /// (spec §4.8's "keep-alive interval").
    pub keep_alive: Duration,
    /// Whether fibers record a per-fiber stack-trace stack (spec §4.7).
    /// Off by default: non-trivial overhead on every pending `Promise`.
    pub trace_recording: bool,
}

impl Default for FibraConfig {
    fn default() -> Self {
        Self {
            pool_size: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            keep_alive: Duration::from_millis(100),
            trace_recording: false,
        }
    }
}
