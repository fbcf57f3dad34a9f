// Copyright 2025 the myrtle contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The worker pool and its shared task queue.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::counter::{CompletionGuard, JobCounter};

/// How long an idle worker blocks on the queue before re-checking the stop
/// flag.
const IDLE_POLL: Duration = Duration::from_millis(1);

/// How long a waiter sleeps between checks of a [`JobCounter`].
const WAIT_POLL: Duration = Duration::from_micros(500);

type Job = Box<dyn FnOnce(&CancelToken) + Send + 'static>;

/// Configuration for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads to spawn. `0` selects
    /// `max(1, available_parallelism - 1)`.
    pub worker_threads: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { worker_threads: 0 }
    }
}

/// The pool-wide cooperative cancellation flag.
///
/// Every job receives a reference to this token when it runs. Jobs that may
/// run for a long time must poll [`is_cancelled`](CancelToken::is_cancelled)
/// and return early once it reads `true`; there is no preemption.
#[derive(Clone, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Returns `true` once [`WorkerPool::shutdown`] has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A cheap, cloneable submission handle to a [`WorkerPool`].
///
/// Handles stay valid after the pool shuts down; jobs submitted through a
/// handle at that point are discarded with a warning.
#[derive(Clone)]
pub struct PoolHandle {
    sender: Sender<Job>,
    cancel: CancelToken,
}

impl PoolHandle {
    /// Pushes a job onto the back of the shared queue.
    ///
    /// The queue is unbounded; `submit` never blocks and applies no
    /// backpressure. A panic inside the job is **not** caught and kills the
    /// worker that dequeued it — use [`submit_guarded`](Self::submit_guarded)
    /// for any job whose failure must be contained.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce(&CancelToken) + Send + 'static,
    {
        self.push(Box::new(job));
    }

    /// Like [`submit`](Self::submit), but the job reports failure as a value
    /// and the pool contains it.
    ///
    /// An `Err` returned by the job is logged and suppressed; a panic inside
    /// the job is caught, logged, and suppressed. Either way the worker
    /// resumes serving the queue.
    pub fn submit_guarded<F>(&self, job: F)
    where
        F: FnOnce(&CancelToken) -> anyhow::Result<()> + Send + 'static,
    {
        self.submit(move |cancel| {
            match panic::catch_unwind(AssertUnwindSafe(|| job(cancel))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    log::error!("WorkerPool: guarded job failed: {error:#}");
                }
                Err(payload) => {
                    log::error!(
                        "WorkerPool: guarded job panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        });
    }

    /// Submits a job and registers it on `counter`.
    ///
    /// The counter is incremented immediately and decremented when the job
    /// finishes, so [`WorkerPool::wait`] can block until a whole batch has
    /// run. A counted job that is discarded without running — refused after
    /// shutdown, or still queued when [`WorkerPool::shutdown`] drains the
    /// queue — also decrements the counter, so waiters never hang on work
    /// that will not happen.
    pub fn submit_counted<F>(&self, job: F, counter: &JobCounter)
    where
        F: FnOnce(&CancelToken) + Send + 'static,
    {
        // The guard resolves the counter entry when the boxed job is dropped,
        // run or not.
        let done = CompletionGuard::register(counter);
        self.push(Box::new(move |cancel: &CancelToken| {
            job(cancel);
            drop(done);
        }));
    }

    /// Returns a clone of the pool-wide cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // A refused job is dropped here, which is what resolves its counter
    // entry if it has one.
    fn push(&self, job: Job) {
        if self.cancel.is_cancelled() {
            log::warn!("WorkerPool: job submitted after shutdown, discarding");
            return;
        }
        if self.sender.send(job).is_err() {
            log::warn!("WorkerPool: task queue is gone, discarding job");
        }
    }
}

/// A fixed pool of OS worker threads over one shared FIFO task queue.
///
/// Lifecycle: a pool starts inert, [`init`](Self::init) spawns the workers,
/// and [`shutdown`](Self::shutdown) stops and joins them. Dropping the pool
/// shuts it down. Jobs are dequeued in submission order; with more than one
/// worker, completion order is unspecified.
///
/// On shutdown, jobs already running are allowed to finish (subject to their
/// own cancellation polling), while jobs still queued and not yet dequeued
/// are discarded without execution. This is defined behavior, not an
/// accident.
pub struct WorkerPool {
    handle: PoolHandle,
    receiver: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Creates an inert pool. No threads run until [`init`](Self::init).
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            handle: PoolHandle {
                sender,
                cancel: CancelToken::new(),
            },
            receiver,
            workers: Vec::new(),
        }
    }

    /// Spawns the worker threads.
    ///
    /// `thread_count == 0` selects `max(1, available_parallelism - 1)`,
    /// leaving one core for the main thread. Calling `init` on a pool that is
    /// already running is a no-op; calling it after [`shutdown`](Self::shutdown)
    /// is refused.
    pub fn init(&mut self, thread_count: usize) {
        if !self.workers.is_empty() {
            return;
        }
        if self.handle.cancel.is_cancelled() {
            log::warn!("WorkerPool: init called after shutdown, ignoring");
            return;
        }

        let count = if thread_count == 0 {
            let hardware = thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
            (hardware - 1).max(1)
        } else {
            thread_count
        };

        log::info!("WorkerPool: starting {count} worker threads");

        for index in 0..count {
            let receiver = self.receiver.clone();
            let cancel = self.handle.cancel.clone();
            let worker = thread::Builder::new()
                .name(format!("myrtle-worker-{index}"))
                .spawn(move || worker_loop(index, receiver, cancel))
                .expect("failed to spawn worker thread");
            self.workers.push(worker);
        }
    }

    /// Stops the pool: raises the cancellation flag and joins every worker.
    ///
    /// Blocks until in-flight jobs have finished; queued-but-undequeued jobs
    /// are discarded without execution. Idempotent.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        log::info!("WorkerPool: shutting down {} workers", self.workers.len());
        self.handle.cancel.cancel();

        for (index, worker) in self.workers.drain(..).enumerate() {
            if worker.join().is_err() {
                log::error!("WorkerPool: worker {index} was terminated by a panicking job");
            }
        }

        // Drain what the workers never dequeued. Dropping a counted job here
        // resolves its counter entry, so waiters unblock.
        let mut discarded = 0usize;
        while self.receiver.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            log::debug!("WorkerPool: discarded {discarded} queued jobs");
        }
    }

    /// Number of live worker threads.
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Returns a cloneable submission handle to this pool.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Returns a clone of the pool-wide cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.handle.cancel_token()
    }

    /// See [`PoolHandle::submit`].
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce(&CancelToken) + Send + 'static,
    {
        self.handle.submit(job);
    }

    /// See [`PoolHandle::submit_guarded`].
    pub fn submit_guarded<F>(&self, job: F)
    where
        F: FnOnce(&CancelToken) -> anyhow::Result<()> + Send + 'static,
    {
        self.handle.submit_guarded(job);
    }

    /// See [`PoolHandle::submit_counted`].
    pub fn submit_counted<F>(&self, job: F, counter: &JobCounter)
    where
        F: FnOnce(&CancelToken) + Send + 'static,
    {
        self.handle.submit_counted(job, counter);
    }

    /// Blocks the calling thread until `counter` reaches zero.
    ///
    /// [`shutdown`](Self::shutdown) resolves the counter entries of every
    /// queued-but-undequeued job while draining the queue, so a wait always
    /// terminates even across a shutdown — but the discarded work never ran.
    /// Check [`CancelToken::is_cancelled`] if that distinction matters.
    pub fn wait(&self, counter: &JobCounter) {
        while counter.pending() > 0 {
            thread::sleep(WAIT_POLL);
        }
    }

    /// Parallel-for: splits `0..job_count` into groups of `group_size`
    /// indices, submits one job per group, and blocks until all groups have
    /// run. `func` is called once per index, from worker threads.
    pub fn dispatch<F>(&self, job_count: usize, group_size: usize, func: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        if job_count == 0 || group_size == 0 {
            return;
        }

        let counter = JobCounter::new();
        let func = Arc::new(func);
        let group_count = job_count.div_ceil(group_size);

        for group in 0..group_count {
            let func = Arc::clone(&func);
            let start = group * group_size;
            let end = (start + group_size).min(job_count);
            self.submit_counted(
                move |_cancel| {
                    for index in start..end {
                        func(index);
                    }
                },
                &counter,
            );
        }

        self.wait(&counter);
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State machine per worker: Idle (blocked on the queue) ⇄ Running (executing
/// a job) → Stopped (flag observed).
fn worker_loop(index: usize, receiver: Receiver<Job>, cancel: CancelToken) {
    log::trace!("WorkerPool: worker {index} started");

    while !cancel.is_cancelled() {
        match receiver.recv_timeout(IDLE_POLL) {
            Ok(job) => job(&cancel),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::trace!("WorkerPool: worker {index} stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    fn pool_with(threads: usize) -> WorkerPool {
        let mut pool = WorkerPool::new();
        pool.init(threads);
        pool
    }

    #[test]
    fn init_is_idempotent() {
        let mut pool = pool_with(2);
        pool.init(4);
        assert_eq!(pool.thread_count(), 2);
    }

    #[test]
    fn init_zero_picks_at_least_one_worker() {
        let pool = pool_with(0);
        assert!(pool.thread_count() >= 1);
    }

    #[test]
    fn every_submitted_job_runs_exactly_once() {
        let mut pool = pool_with(4);
        let counter = JobCounter::new();
        let executed = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let executed = Arc::clone(&executed);
            pool.submit_counted(
                move |_cancel| {
                    executed.fetch_add(1, Ordering::SeqCst);
                },
                &counter,
            );
        }

        pool.wait(&counter);
        pool.shutdown();
        assert_eq!(executed.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn single_worker_dequeues_in_submission_order() {
        let mut pool = pool_with(1);
        let counter = JobCounter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for value in 0..64usize {
            let order = Arc::clone(&order);
            pool.submit_counted(
                move |_cancel| {
                    order.lock().unwrap().push(value);
                },
                &counter,
            );
        }

        pool.wait(&counter);
        pool.shutdown();

        let order = order.lock().unwrap();
        assert_eq!(*order, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn guarded_failure_does_not_poison_the_pool() {
        let mut pool = pool_with(1);
        let counter = JobCounter::new();
        let executed = Arc::new(AtomicUsize::new(0));

        pool.submit_guarded(|_cancel| Err(anyhow!("intentional failure")));
        pool.submit_guarded(|_cancel| panic!("intentional panic"));

        let executed_clone = Arc::clone(&executed);
        pool.submit_counted(
            move |_cancel| {
                executed_clone.fetch_add(1, Ordering::SeqCst);
            },
            &counter,
        );

        pool.wait(&counter);
        pool.shutdown();
        assert_eq!(executed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_cancels_a_polling_job_promptly() {
        let mut pool = pool_with(1);
        let started = Arc::new(AtomicBool::new(false));

        let started_clone = Arc::clone(&started);
        pool.submit(move |cancel| {
            started_clone.store(true, Ordering::SeqCst);
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
        });

        while !started.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }

        let begin = Instant::now();
        pool.shutdown();
        assert!(begin.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn shutdown_discards_queued_jobs() {
        let mut pool = pool_with(1);
        let started = Arc::new(AtomicBool::new(false));
        let executed = Arc::new(AtomicUsize::new(0));

        // Park the only worker inside a job until shutdown is requested.
        let started_clone = Arc::clone(&started);
        pool.submit(move |cancel| {
            started_clone.store(true, Ordering::SeqCst);
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
        });
        while !started.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }

        for _ in 0..50 {
            let executed = Arc::clone(&executed);
            pool.submit(move |_cancel| {
                executed.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.shutdown();
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn shutdown_resolves_counters_of_discarded_jobs() {
        let mut pool = pool_with(1);
        let started = Arc::new(AtomicBool::new(false));
        let executed = Arc::new(AtomicUsize::new(0));
        let counter = JobCounter::new();

        // Park the only worker so the counted jobs stay queued.
        let started_clone = Arc::clone(&started);
        pool.submit(move |cancel| {
            started_clone.store(true, Ordering::SeqCst);
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
        });
        while !started.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }

        for _ in 0..5 {
            let executed = Arc::clone(&executed);
            pool.submit_counted(
                move |_cancel| {
                    executed.fetch_add(1, Ordering::SeqCst);
                },
                &counter,
            );
        }
        assert_eq!(counter.pending(), 5);

        pool.shutdown();

        // None of the queued jobs ran, but every counter entry resolved, so
        // this wait returns instead of spinning forever.
        assert_eq!(executed.load(Ordering::SeqCst), 0);
        assert_eq!(counter.pending(), 0);
        pool.wait(&counter);
    }

    #[test]
    fn submit_after_shutdown_is_discarded() {
        let mut pool = pool_with(1);
        pool.shutdown();

        let counter = JobCounter::new();
        pool.submit_counted(|_cancel| {}, &counter);

        // Discarded jobs resolve their counter entry so waits terminate.
        assert_eq!(counter.pending(), 0);
        assert_eq!(pool.thread_count(), 0);
    }

    #[test]
    fn dispatch_covers_every_index() {
        let mut pool = pool_with(4);
        let sum = Arc::new(AtomicUsize::new(0));

        let sum_clone = Arc::clone(&sum);
        pool.dispatch(100, 8, move |index| {
            sum_clone.fetch_add(index, Ordering::SeqCst);
        });

        pool.shutdown();
        assert_eq!(sum.load(Ordering::SeqCst), (0..100usize).sum::<usize>());
    }
}
