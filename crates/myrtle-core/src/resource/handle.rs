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
use std::{ops::Deref, sync::Arc};

/// A thread-safe, reference-counted handle to a loaded resource.
///
/// This acts as a smart pointer providing shared ownership of the resource
/// data. Cloning a handle is cheap: it only bumps the reference count. The
/// cache entry that produced a handle is itself one independent owner, so the
/// underlying data is released only once the entry has been cleared *and* no
/// external holder remains.
#[derive(Debug)]
pub struct ResourceHandle<T: Resource>(Arc<T>);

impl<T: Resource> ResourceHandle<T> {
    /// Wraps freshly constructed resource data in a shared handle.
    ///
    /// Typically called by the cache after a successful load.
    pub fn new(resource: T) -> Self {
        Self(Arc::new(resource))
    }

    /// Returns `true` if both handles point at the same resource instance.
    ///
    /// This is the identity guarantee the cache provides: every `load` of the
    /// same `(type, path)` pair returns handles for which `ptr_eq` holds.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Number of live owners of the underlying data, the cache entry
    /// included.
    pub fn ref_count(handle: &Self) -> usize {
        Arc::strong_count(&handle.0)
    }
}

impl<T: Resource> Clone for ResourceHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Resource> Deref for ResourceHandle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
