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

use thiserror::Error;

/// Errors surfaced by the resource system.
///
/// For [`load`](super::ResourceManager::load) these propagate synchronously
/// to the caller; for [`load_async`](super::ResourceManager::load_async) they
/// are delivered to the callback as a value, never thrown across the thread
/// boundary.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// No loader has been registered for the requested resource type.
    #[error("no loader registered for resource type `{type_name}`")]
    NoLoader {
        /// Name of the resource type the load was requested for.
        type_name: &'static str,
    },

    /// The loader for this type failed to construct the resource. Nothing was
    /// inserted into the cache.
    #[error("failed to load resource `{path}`")]
    Load {
        /// Path the load was requested for.
        path: String,
        /// The loader's underlying failure (I/O, parse, validation, ...).
        #[source]
        source: anyhow::Error,
    },
}
