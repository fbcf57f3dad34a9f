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

//! Completion tracking for groups of submitted jobs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// An atomic counter tracking how many jobs of a group are still pending.
///
/// Cloning a `JobCounter` is cheap and shares the underlying count. Pair it
/// with [`WorkerPool::submit_counted`](super::WorkerPool::submit_counted) and
/// [`WorkerPool::wait`](super::WorkerPool::wait) to block until a batch of
/// jobs has finished.
#[derive(Clone, Debug, Default)]
pub struct JobCounter(Arc<AtomicUsize>);

impl JobCounter {
    /// Creates a counter with no pending jobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs that have been submitted against this counter but have
    /// not yet finished.
    pub fn pending(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn add(&self, jobs: usize) {
        self.0.fetch_add(jobs, Ordering::AcqRel);
    }

    pub(crate) fn complete(&self) {
        self.0.fetch_sub(1, Ordering::Release);
    }
}

/// Resolves one entry on a [`JobCounter`] when dropped.
///
/// A counted job carries one of these into the queue. Whether the job runs,
/// panics, or is discarded without running (queue drained at shutdown, or
/// submission refused), dropping the guard decrements the counter, so waiters
/// always unblock.
pub(crate) struct CompletionGuard(JobCounter);

impl CompletionGuard {
    /// Registers one pending entry on `counter` and returns its guard.
    pub(crate) fn register(counter: &JobCounter) -> Self {
        counter.add(1);
        Self(counter.clone())
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.complete();
    }
}
