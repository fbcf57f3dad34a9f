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

//! The engine's runtime context.
//!
//! Subsystems receive an `&EngineContext` (or clones of the individual
//! components, all of which are cheap to share) instead of reaching for a
//! global singleton. The context is constructed once at engine start and
//! dropped at shutdown.

use std::sync::Arc;

use crate::event::EventBus;
use crate::job::{PoolConfig, WorkerPool};
use crate::resource::ResourceManager;

/// Owns the runtime infrastructure: worker pool, resource manager, event bus.
///
/// Construction brings the pool up immediately; dropping the context (or
/// calling [`shutdown`](Self::shutdown)) stops it, discarding any jobs still
/// queued.
pub struct EngineContext {
    /// The shared worker-thread pool.
    pub jobs: WorkerPool,
    /// The type-keyed resource cache registry, wired to `jobs` for
    /// asynchronous loads.
    pub resources: ResourceManager,
    /// The engine-scoped event bus.
    pub events: Arc<EventBus>,
}

impl EngineContext {
    /// Builds the context and starts the worker pool.
    pub fn new(config: PoolConfig) -> Self {
        let mut jobs = WorkerPool::new();
        jobs.init(config.worker_threads);

        let resources = ResourceManager::new(jobs.handle());
        let events = Arc::new(EventBus::new());

        log::info!(
            "EngineContext: runtime core ready ({} workers)",
            jobs.thread_count()
        );

        Self {
            jobs,
            resources,
            events,
        }
    }

    /// Stops the worker pool. In-flight jobs finish; queued jobs are
    /// discarded. Idempotent, and also performed on drop.
    pub fn shutdown(&mut self) {
        self.jobs.shutdown();
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
