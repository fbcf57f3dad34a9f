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

use super::Resource;

/// Constructs a resource of type `T` from a path.
///
/// Implementations are supplied by asset-loading code (image decoders, mesh
/// parsers, ...) and registered on the
/// [`ResourceManager`](super::ResourceManager) per resource type. A loader
/// may be invoked from any thread, including pool workers, and must report
/// failure as an error value: a failed load never inserts a cache entry, so a
/// retry is always possible.
pub trait ResourceLoader<T: Resource>: Send + Sync {
    /// Builds the resource identified by `path`.
    fn load(&self, path: &str) -> anyhow::Result<T>;
}

impl<T, F> ResourceLoader<T> for F
where
    T: Resource,
    F: Fn(&str) -> anyhow::Result<T> + Send + Sync,
{
    fn load(&self, path: &str) -> anyhow::Result<T> {
        self(path)
    }
}
