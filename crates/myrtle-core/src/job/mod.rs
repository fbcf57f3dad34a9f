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

//! Cooperative worker-thread pool.
//!
//! [`WorkerPool`] owns a fixed set of OS threads that pull jobs from one
//! shared FIFO queue. Cancellation is cooperative: the pool exposes a single
//! shared [`CancelToken`] that long-running jobs are expected to poll; there
//! is no preemption and no forced timeout.
//!
//! Jobs are submitted through two paths with different failure semantics:
//!
//! - [`WorkerPool::submit`]: a panic inside the job is **fatal to its
//!   worker**. Use this only for jobs that cannot fail.
//! - [`WorkerPool::submit_guarded`]: the job returns a `Result`; errors and
//!   panics are caught, logged, and suppressed, and the worker keeps serving
//!   the queue.

mod counter;
mod pool;

pub use self::counter::JobCounter;
pub use self::pool::{CancelToken, PoolConfig, PoolHandle, WorkerPool};
