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

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::error::ResourceError;
use super::handle::ResourceHandle;
use super::loader::ResourceLoader;
use super::Resource;

/// Type-erased view of a per-type cache, held by the registry so that
/// `clear_all` can reach every cache without knowing its resource type.
pub(super) trait ErasedCache: Send + Sync {
    fn clear(&self);
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// The cache for one resource type: a map from path to shared handle behind a
/// reader/writer lock.
///
/// Lookups take the shared lock; a miss upgrades to the exclusive lock with a
/// re-check (double-checked locking), then constructs and inserts. The
/// exclusive lock is held for the whole construction, so a load in progress
/// serializes *every* request for this type — any key, not just the one being
/// built. This mirrors the engine's original behavior and keeps "construct at
/// most once per key" trivially true; see the manager docs before relying on
/// concurrent loads of distinct keys of one type.
pub struct ResourceCache<T: Resource> {
    entries: RwLock<HashMap<String, ResourceHandle<T>>>,
}

impl<T: Resource> ResourceCache<T> {
    pub(super) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached handle for `path`, if present. Never loads.
    pub fn get(&self, path: &str) -> Option<ResourceHandle<T>> {
        self.entries.read().unwrap().get(path).cloned()
    }

    /// Returns the cached handle for `path`, constructing it with `loader` on
    /// a miss.
    ///
    /// All callers racing on the same path observe the same handle, and the
    /// loader runs at most once per path for the lifetime of the entry. A
    /// loader failure inserts nothing and is returned to the caller, so the
    /// load can be retried.
    pub fn get_or_load(
        &self,
        path: &str,
        loader: &dyn ResourceLoader<T>,
    ) -> Result<ResourceHandle<T>, ResourceError> {
        // Fast path: shared lock only.
        if let Some(handle) = self.get(path) {
            return Ok(handle);
        }

        // Miss: exclusive lock, re-check (another thread may have inserted
        // while we waited), then construct under the lock.
        let mut entries = self.entries.write().unwrap();
        if let Some(handle) = entries.get(path) {
            return Ok(handle.clone());
        }

        log::info!("ResourceCache: loading '{path}'");

        let resource = loader.load(path).map_err(|source| {
            log::error!("ResourceCache: failed to load '{path}': {source:#}");
            ResourceError::Load {
                path: path.to_owned(),
                source,
            }
        })?;

        let handle = ResourceHandle::new(resource);
        entries.insert(path.to_owned(), handle.clone());

        log::debug!("ResourceCache: loaded '{path}'");
        Ok(handle)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Drops every entry. Resources stay alive as long as external handles to
    /// them remain.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

impl<T: Resource> ErasedCache for ResourceCache<T> {
    fn clear(&self) {
        ResourceCache::clear(self);
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
