// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A deterministic [`Executor`] for tests: jobs queue up instead of running,
//! so a test can assert on pending work and drive the trampoline one hop at
//! a time.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use fibra_async::{Executor, Job};
use parking_lot::Mutex;

/// Queues every dispatched job instead of running it. Install with
/// `fibra_async::with_executor` and drive with [`ManualExecutor::run_one`]
/// or [`ManualExecutor::run_all`].
#[derive(Default)]
pub struct ManualExecutor {
    queue: Mutex<VecDeque<Job>>,
}

impl ManualExecutor {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// How many jobs are queued right now.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run the oldest queued job, if any. Returns whether a job ran.
    pub fn run_one(&self) -> bool {
        let job = self.queue.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs (oldest-first) until the queue is empty, including jobs
    /// enqueued by jobs run earlier in the same call.
    pub fn run_all(&self) {
        while self.run_one() {}
    }
}

impl Executor for ManualExecutor {
    fn execute(&self, job: Job) {
        self.queue.lock().push_back(job);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn jobs_queue_instead_of_running() {
        let executor = ManualExecutor::new();
        let ran = Arc::new(AtomicU32::new(0));
        let ran_clone = ran.clone();
        executor.execute(Box::new(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(executor.pending_count(), 1);
    }

    #[test]
    fn run_one_drains_a_single_job() {
        let executor = ManualExecutor::new();
        let ran = Arc::new(AtomicU32::new(0));
        for _ in 0..3 {
            let ran = ran.clone();
            executor.execute(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert!(executor.run_one());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(executor.pending_count(), 2);
    }

    #[test]
    fn run_all_drains_jobs_enqueued_by_earlier_jobs() {
        let executor = ManualExecutor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let requeue = executor.clone();
        let seen_first = seen.clone();
        executor.execute(Box::new(move || {
            seen_first.lock().push(1);
            let seen_second = seen_first.clone();
            requeue.execute(Box::new(move || {
                seen_second.lock().push(2);
            }));
        }));

        executor.run_all();
        assert_eq!(*seen.lock(), vec![1, 2]);
    }
}
