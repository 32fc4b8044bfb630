// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The default executor pool (spec §4.8): a fixed set of worker threads,
//! each with a lock-free-fast-path local queue plus a shared remote queue,
//! started lazily and retired after an idle keep-alive.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use fibra_async::{Executor, Job};
use fibra_core::fibra_warn;
use parking_lot::{Condvar, Mutex};

use crate::config::FibraConfig;

thread_local! {
    static CURRENT_WORKER_ID: Cell<Option<usize>> = const { Cell::new(None) };
    static LOCAL_QUEUE: RefCell<Option<VecDeque<Job>>> = const { RefCell::new(None) };
}

struct Worker {
    id: usize,
    remote: Mutex<VecDeque<Job>>,
    has_remote: AtomicBool,
    monitor: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
    keep_alive: Duration,
}

impl Worker {
    fn new(id: usize, keep_alive: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            remote: Mutex::new(VecDeque::new()),
            has_remote: AtomicBool::new(false),
            monitor: Condvar::new(),
            thread: Mutex::new(None),
            keep_alive,
        })
    }

    /// Push `job` onto this worker's queue, taking the uncontended local
    /// path when called from inside this worker's own run loop.
    fn dispatch(self: &Arc<Self>, job: Job) {
        let on_own_thread = CURRENT_WORKER_ID.with(|cell| cell.get() == Some(self.id));
        if on_own_thread {
            LOCAL_QUEUE.with(|queue| {
                let mut queue = queue.borrow_mut();
                queue.get_or_insert_with(VecDeque::new).push_back(job);
            });
            return;
        }

        {
            let mut remote = self.remote.lock();
            remote.push_back(job);
            self.has_remote.store(true, Ordering::SeqCst);
            self.monitor.notify_one();
        }
        self.ensure_started();
    }

    fn ensure_started(self: &Arc<Self>) {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return;
        }
        let worker = self.clone();
        *thread = Some(
            std::thread::Builder::new()
                .name(format!("fibra-worker-{}", self.id))
                .spawn(move || worker.run_loop())
                .expect("failed to spawn fibra worker thread"),
        );
    }

    fn run_loop(self: Arc<Self>) {
        CURRENT_WORKER_ID.with(|cell| cell.set(Some(self.id)));
        LOCAL_QUEUE.with(|queue| *queue.borrow_mut() = Some(VecDeque::new()));

        loop {
            if self.has_remote.swap(false, Ordering::SeqCst) {
                let mut remote = self.remote.lock();
                let drained: Vec<Job> = remote.drain(..).collect();
                drop(remote);
                LOCAL_QUEUE.with(|queue| {
                    queue.borrow_mut().get_or_insert_with(VecDeque::new).extend(drained);
                });
            }

            let job = LOCAL_QUEUE.with(|queue| queue.borrow_mut().as_mut().and_then(VecDeque::pop_front));

            if let Some(job) = job {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic payload".to_string());
                    fibra_warn!("fibra worker {} job panicked: {}", self.id, message);
                }
                continue;
            }

            let mut remote = self.remote.lock();
            if !remote.is_empty() {
                continue;
            }
            let timed_out = self.monitor.wait_for(&mut remote, self.keep_alive).timed_out();
            if timed_out && remote.is_empty() {
                // Clear `thread` while still holding `remote`: a concurrent
                // `dispatch()` takes `remote` first and only calls
                // `ensure_started` (which reads `thread`) after releasing
                // it, so holding both here closes the window where a job
                // could be queued against a worker that looks alive but is
                // about to exit, and never get picked up.
                *self.thread.lock() = None;
                drop(remote);
                CURRENT_WORKER_ID.with(|cell| cell.set(None));
                LOCAL_QUEUE.with(|queue| *queue.borrow_mut() = None);
                return;
            }
        }
    }
}

/// A fixed-size pool of worker threads (spec §4.8), the runtime's default
/// executor. Workers start lazily on first dispatch and exit after sitting
/// idle past their keep-alive.
pub struct Pool {
    workers: Vec<Arc<Worker>>,
    next_rr: AtomicUsize,
}

impl Pool {
    #[must_use]
    pub fn new(config: &FibraConfig) -> Arc<Self> {
        let size = config.pool_size.max(1);
        let workers = (0..size).map(|id| Worker::new(id, config.keep_alive)).collect();
        Arc::new(Self {
            workers,
            next_rr: AtomicUsize::new(0),
        })
    }

    /// The worker this dispatch should land on: the affinity-matched one if
    /// the calling thread is already one of this pool's workers, otherwise
    /// the next in round-robin order.
    fn get_one_exec(&self) -> &Arc<Worker> {
        if let Some(current_id) = CURRENT_WORKER_ID.with(Cell::get) {
            if let Some(worker) = self.workers.iter().find(|w| w.id == current_id) {
                return worker;
            }
        }
        let index = self.next_rr.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        &self.workers[index]
    }
}

impl Executor for Pool {
    fn execute(&self, job: Job) {
        self.get_one_exec().dispatch(job);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

static DEFAULT_POOL: OnceLock<Arc<Pool>> = OnceLock::new();

/// Tune the default pool before its first use. Returns `Err(config)`
/// (handing the config back) if the pool had already been initialized —
/// first call wins, matching spec §4.8's process-wide singleton.
pub fn configure_default_pool(config: FibraConfig) -> Result<(), FibraConfig> {
    let pool = Pool::new(&config);
    DEFAULT_POOL.set(pool).map_err(|_| config)
}

/// The process-wide default executor pool, built from [`FibraConfig::default`]
/// on first use unless [`configure_default_pool`] ran first.
pub fn default_pool() -> Arc<dyn Executor> {
    DEFAULT_POOL.get_or_init(|| Pool::new(&FibraConfig::default())).clone()
}
