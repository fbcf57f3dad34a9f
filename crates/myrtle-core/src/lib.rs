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

//! # Myrtle Core
//!
//! Runtime infrastructure for the myrtle engine. This crate contains the
//! shared machinery every other subsystem (renderer, physics, asset loaders)
//! is built on:
//!
//! - [`job::WorkerPool`] — a fixed pool of worker threads pulling from one
//!   shared FIFO queue, with cooperative cancellation.
//! - [`resource::ResourceManager`] — a concurrent, type-keyed resource cache
//!   registry with synchronous and asynchronous loading.
//! - [`event::EventBus`] — a type-routed publish/subscribe bus with immediate
//!   and deferred delivery.
//!
//! The components are wired together by [`EngineContext`], which is
//! constructed once at engine start and handed by reference to whatever needs
//! it. There is deliberately no global engine singleton.

#![warn(missing_docs)]

pub mod context;
pub mod event;
pub mod job;
pub mod resource;

pub use context::EngineContext;
pub use event::EventBus;
pub use job::{CancelToken, JobCounter, PoolConfig, PoolHandle, WorkerPool};
pub use resource::{Resource, ResourceError, ResourceHandle, ResourceLoader, ResourceManager};
