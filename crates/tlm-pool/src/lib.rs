//! Fixed-size worker-thread pool for the telemetry logger.
//!
//! [`WorkerPool`] spawns its workers up front and feeds them from a bounded
//! FIFO of pending tasks ([`tlm_core::BoundedRing`]). Workers sleep on a
//! condition variable while the queue is empty and leave only once shutdown
//! has been requested *and* the queue has drained.
//!
//! # Key Design: Bounded Queue, Explicit Overflow
//!
//! The queue never grows. What happens when it is full is chosen per pool:
//!
//! - [`OverflowPolicy::Reject`] (default): `submit` fails with
//!   [`PoolError::QueueFull`] and the caller decides whether to retry.
//! - [`OverflowPolicy::OverwriteOldest`]: the oldest pending task is dropped
//!   unexecuted and `submit` reports [`Submitted::DisplacedOldest`].
//!
//! # Failure Isolation
//!
//! Each task runs inside `catch_unwind`. A panicking task is logged and
//! counted; the worker that ran it keeps serving the queue.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use tlm_pool::WorkerPool;
//!
//! let pool = WorkerPool::new(2, 8).unwrap();
//! let hits = Arc::new(AtomicUsize::new(0));
//! for _ in 0..4 {
//!     let hits = Arc::clone(&hits);
//!     pool.submit(move || {
//!         hits.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .unwrap();
//! }
//! pool.join(); // drains the queue, then joins every worker
//! assert_eq!(hits.load(Ordering::SeqCst), 4);
//! ```

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tlm_core::{BoundedRing, TlmError};
use tracing::{debug, error, info, warn};

/// A deferred unit of work. The pool never inspects or retries it.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// What `submit` does when the task queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Refuse the new task.
    #[default]
    Reject,
    /// Drop the oldest pending task to make room.
    OverwriteOldest,
}

/// Outcome of a successful submission.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// The task is queued and nothing was lost.
    Queued,
    /// The task is queued; the oldest pending task was dropped for it.
    DisplacedOldest,
}

/// Why the pool could not be built or refused a task.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Asked for zero worker threads.
    #[error("worker pool needs at least one worker")]
    NoWorkers,

    /// Asked for a zero-slot task queue.
    #[error(transparent)]
    Capacity(#[from] TlmError),

    /// The queue is full and the policy is [`OverflowPolicy::Reject`].
    #[error("task queue is full ({capacity} pending)")]
    QueueFull {
        /// Task queue capacity.
        capacity: usize,
    },

    /// Submitted after [`WorkerPool::shutdown`].
    #[error("worker pool is shut down")]
    ShutDown,

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Counters describing the pool's life so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Worker threads started.
    pub workers: usize,
    /// Tasks queued but not yet picked up.
    pub pending: usize,
    /// Tasks run to completion, panicked ones included.
    pub executed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
    /// Pending tasks dropped by [`OverflowPolicy::OverwriteOldest`].
    pub displaced: u64,
}

struct QueueState {
    tasks: BoundedRing<Task>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    work_available: Condvar,
    executed: AtomicU64,
    panicked: AtomicU64,
    displaced: AtomicU64,
}

/// Fixed set of long-lived worker threads draining a bounded task queue.
///
/// Dropping the pool requests shutdown and joins every worker, so pending
/// tasks still run before the drop returns.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<BoundedRing<JoinHandle<()>>>,
    worker_count: usize,
    policy: OverflowPolicy,
}

impl WorkerPool {
    /// Spawn `workers` threads over a queue of `queue_capacity` pending tasks,
    /// rejecting submissions when the queue is full.
    pub fn new(workers: usize, queue_capacity: usize) -> Result<Self, PoolError> {
        Self::with_policy(workers, queue_capacity, OverflowPolicy::default())
    }

    /// Spawn a pool with an explicit overflow policy.
    ///
    /// # Errors
    /// - [`PoolError::NoWorkers`] if `workers` is 0
    /// - [`PoolError::Capacity`] if `queue_capacity` is 0
    /// - [`PoolError::Spawn`] if the OS refuses a thread; workers spawned so
    ///   far are shut down and joined first
    pub fn with_policy(
        workers: usize,
        queue_capacity: usize,
        policy: OverflowPolicy,
    ) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        if queue_capacity == 0 {
            return Err(TlmError::ZeroCapacity { what: "task queue" }.into());
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                tasks: BoundedRing::new(queue_capacity)?,
                shutdown: false,
            }),
            work_available: Condvar::new(),
            executed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            displaced: AtomicU64::new(0),
        });

        let pool = Self {
            shared,
            workers: Mutex::new(BoundedRing::new(workers)?),
            worker_count: workers,
            policy,
        };

        for id in 0..workers {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("tlm-worker-{id}"))
                .spawn(move || worker_loop(&shared, id));
            match spawned {
                Ok(handle) => {
                    pool.workers.lock().push(handle);
                }
                Err(e) => {
                    error!(worker = id, error = %e, "failed to spawn worker");
                    // `pool` drops here and joins what was spawned.
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        debug!(workers, queue_capacity, ?policy, "worker pool started");
        Ok(pool)
    }

    /// Queue a task and wake one idle worker.
    ///
    /// Tasks are dequeued in submission order; completion order across
    /// workers is unspecified.
    pub fn submit<F>(&self, task: F) -> Result<Submitted, PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let task: Task = Box::new(task);
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(PoolError::ShutDown);
        }

        let (outcome, displaced) = match self.policy {
            OverflowPolicy::Reject => {
                if let Err(refused) = state.tasks.try_push(task) {
                    let capacity = state.tasks.capacity();
                    drop(state);
                    drop(refused);
                    debug!(capacity, "task queue full; submission refused");
                    return Err(PoolError::QueueFull { capacity });
                }
                (Submitted::Queued, None)
            }
            OverflowPolicy::OverwriteOldest => match state.tasks.push_displacing(task) {
                None => (Submitted::Queued, None),
                Some(old) => (Submitted::DisplacedOldest, Some(old)),
            },
        };
        drop(state);
        self.shared.work_available.notify_one();

        if let Some(old) = displaced {
            let total = self.shared.displaced.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(displaced_total = total, "task queue full; dropped oldest pending task");
            // Captured state is released outside the queue lock.
            drop(old);
        }
        Ok(outcome)
    }

    /// Ask every worker to exit once the queue is empty.
    ///
    /// Does not interrupt running tasks. Idempotent.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        let pending = state.tasks.len();
        drop(state);
        self.shared.work_available.notify_all();
        info!(pending, "worker pool shutting down");
    }

    /// Request shutdown and wait for every worker to finish.
    ///
    /// Safe to call repeatedly and after [`WorkerPool::shutdown`].
    pub fn join(&self) {
        self.shutdown();
        let current = thread::current().id();
        let mut workers = self.workers.lock();
        while let Some(handle) = workers.pop() {
            if handle.thread().id() == current {
                warn!("worker pool joined from its own worker; skipping self-join");
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
    }

    /// `true` once shutdown has begun.
    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Worker threads started.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Pending-task slots.
    pub fn queue_capacity(&self) -> usize {
        self.shared.state.lock().tasks.capacity()
    }

    /// What happens when the queue is full.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Tasks queued but not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().tasks.len()
    }

    /// Snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.worker_count,
            pending: self.pending(),
            executed: self.shared.executed.load(Ordering::Relaxed),
            panicked: self.shared.panicked.load(Ordering::Relaxed),
            displaced: self.shared.displaced.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.worker_count)
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}

fn worker_loop(shared: &Shared, id: usize) {
    debug!(worker = id, "worker started");
    loop {
        let task = {
            let mut state = shared.state.lock();
            while state.tasks.is_empty() && !state.shutdown {
                shared.work_available.wait(&mut state);
            }
            match state.tasks.pop() {
                Some(task) => task,
                // shutdown requested and nothing left
                None => break,
            }
        };

        match catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                shared.executed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                shared.panicked.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker = id,
                    panic = panic_message(payload.as_ref()),
                    "task panicked; worker continues"
                );
            }
        }
    }
    debug!(worker = id, "worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
