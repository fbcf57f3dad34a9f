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

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::job::PoolHandle;

use super::cache::{ErasedCache, ResourceCache};
use super::error::ResourceError;
use super::handle::ResourceHandle;
use super::loader::ResourceLoader;
use super::Resource;

struct Shared {
    /// Per-type caches, keyed by the resource type's `TypeId` and created
    /// lazily on first use.
    caches: RwLock<HashMap<TypeId, Arc<dyn ErasedCache>>>,
    /// Registered loaders, stored type-erased as `Arc<dyn ResourceLoader<T>>`.
    loaders: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    pool: PoolHandle,
}

/// The engine's central resource registry.
///
/// One [`ResourceCache`] exists per resource type, created lazily. The
/// manager is cheap to clone (clones share all state), which is how it
/// travels into worker-thread jobs for [`load_async`](Self::load_async).
///
/// Note on contention: a cache's exclusive lock is held for the whole
/// duration of a construction, so while any resource of type `T` is being
/// built, every other `load::<T>` — for any path — blocks until it finishes.
/// Distinct types never block each other.
#[derive(Clone)]
pub struct ResourceManager {
    shared: Arc<Shared>,
}

impl ResourceManager {
    /// Creates a manager that runs its asynchronous loads on `pool`.
    pub fn new(pool: PoolHandle) -> Self {
        Self {
            shared: Arc::new(Shared {
                caches: RwLock::new(HashMap::new()),
                loaders: RwLock::new(HashMap::new()),
                pool,
            }),
        }
    }

    /// Registers the loader used to construct resources of type `T`.
    ///
    /// Replaces any previously registered loader for `T`. Closures of shape
    /// `Fn(&str) -> anyhow::Result<T>` implement
    /// [`ResourceLoader`] directly.
    pub fn register_loader<T: Resource>(&self, loader: impl ResourceLoader<T> + 'static) {
        let erased: Arc<dyn ResourceLoader<T>> = Arc::new(loader);
        self.shared
            .loaders
            .write()
            .unwrap()
            .insert(TypeId::of::<T>(), Box::new(erased));
    }

    /// Loads the resource of type `T` identified by `path`, blocking the
    /// calling thread.
    ///
    /// Returns the cached handle when present; otherwise constructs the
    /// resource with `T`'s registered loader and caches it. Every call for
    /// the same `(T, path)` pair returns identity-equal handles
    /// ([`ResourceHandle::ptr_eq`]) and the loader runs exactly once, until
    /// an intervening [`clear`](Self::clear).
    ///
    /// A failed construction inserts nothing — the cache is never poisoned
    /// with a partial resource — and the failure is returned so the caller
    /// can retry.
    pub fn load<T: Resource>(&self, path: &str) -> Result<ResourceHandle<T>, ResourceError> {
        let loader = self.loader_of::<T>()?;
        self.cache_of::<T>().get_or_load(path, loader.as_ref())
    }

    /// Loads a resource on a pool worker and hands the outcome to `callback`.
    ///
    /// Non-blocking for the caller. The callback runs **on the worker
    /// thread**, not the calling thread; treat it as running on an arbitrary
    /// thread. Failures arrive at the callback as an explicit
    /// [`ResourceError`] value.
    pub fn load_async<T, F>(&self, path: &str, callback: F)
    where
        T: Resource,
        F: FnOnce(Result<ResourceHandle<T>, ResourceError>) + Send + 'static,
    {
        let manager = self.clone();
        let path = path.to_owned();
        self.shared.pool.submit_guarded(move |_cancel| {
            callback(manager.load::<T>(&path));
            Ok(())
        });
    }

    /// Returns the cache for resource type `T`, creating it on first use.
    ///
    /// Gives direct access to [`ResourceCache::get`] and the entry counts, so
    /// callers can peek for an already-loaded resource without triggering a
    /// load.
    pub fn cache<T: Resource>(&self) -> Arc<ResourceCache<T>> {
        self.cache_of::<T>()
    }

    /// Empties the cache for resource type `T`.
    ///
    /// Resources with live external handles stay alive until those handles
    /// are dropped; the entries themselves are gone and the next load
    /// reconstructs.
    pub fn clear<T: Resource>(&self) {
        let caches = self.shared.caches.read().unwrap();
        if let Some(cache) = caches.get(&TypeId::of::<T>()) {
            cache.clear();
            log::debug!("ResourceManager: cleared cache for {}", type_name::<T>());
        }
    }

    /// Empties every per-type cache. The registry structure itself survives.
    pub fn clear_all(&self) {
        let caches = self.shared.caches.write().unwrap();
        for cache in caches.values() {
            cache.clear();
        }
        log::info!("ResourceManager: all resource caches cleared");
    }

    /// Returns `T`'s cache, creating it on first use.
    ///
    /// Shared-lock lookup first; on a miss, the exclusive lock with a
    /// re-check, then insert (double-checked, same as the caches themselves).
    fn cache_of<T: Resource>(&self) -> Arc<ResourceCache<T>> {
        let key = TypeId::of::<T>();

        {
            let caches = self.shared.caches.read().unwrap();
            if let Some(cache) = caches.get(&key) {
                return downcast_cache::<T>(cache);
            }
        }

        let mut caches = self.shared.caches.write().unwrap();
        let cache = caches
            .entry(key)
            .or_insert_with(|| Arc::new(ResourceCache::<T>::new()) as Arc<dyn ErasedCache>);
        downcast_cache::<T>(cache)
    }

    fn loader_of<T: Resource>(&self) -> Result<Arc<dyn ResourceLoader<T>>, ResourceError> {
        self.shared
            .loaders
            .read()
            .unwrap()
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn ResourceLoader<T>>>())
            .cloned()
            .ok_or(ResourceError::NoLoader {
                type_name: type_name::<T>(),
            })
    }
}

fn downcast_cache<T: Resource>(entry: &Arc<dyn ErasedCache>) -> Arc<ResourceCache<T>> {
    // Entries are keyed by `TypeId::of::<T>()`, so the downcast cannot fail.
    Arc::clone(entry)
        .as_any_arc()
        .downcast::<ResourceCache<T>>()
        .ok()
        .expect("cache registry entry keyed by a foreign TypeId")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::WorkerPool;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    struct Blob {
        bytes: Vec<u8>,
    }
    impl Resource for Blob {}

    struct Palette {
        colors: usize,
    }
    impl Resource for Palette {}

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl ResourceLoader<Blob> for CountingLoader {
        fn load(&self, path: &str) -> anyhow::Result<Blob> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Blob {
                bytes: path.as_bytes().to_vec(),
            })
        }
    }

    /// Fails on the first call, succeeds afterwards.
    struct FlakyLoader {
        calls: Arc<AtomicUsize>,
    }

    impl ResourceLoader<Blob> for FlakyLoader {
        fn load(&self, path: &str) -> anyhow::Result<Blob> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow!("disk on fire"))
            } else {
                Ok(Blob {
                    bytes: path.as_bytes().to_vec(),
                })
            }
        }
    }

    fn manager_with_pool(threads: usize) -> (WorkerPool, ResourceManager) {
        let mut pool = WorkerPool::new();
        pool.init(threads);
        let manager = ResourceManager::new(pool.handle());
        (pool, manager)
    }

    #[test]
    fn repeated_loads_share_one_instance() {
        let (_pool, manager) = manager_with_pool(1);
        let calls = Arc::new(AtomicUsize::new(0));
        manager.register_loader::<Blob>(CountingLoader {
            calls: Arc::clone(&calls),
        });

        let first = manager.load::<Blob>("rock.obj").unwrap();
        let second = manager.load::<Blob>("rock.obj").unwrap();

        assert!(ResourceHandle::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.bytes, b"rock.obj");
    }

    #[test]
    fn concurrent_loads_construct_once() {
        let (_pool, manager) = manager_with_pool(1);
        let calls = Arc::new(AtomicUsize::new(0));
        manager.register_loader::<Blob>(CountingLoader {
            calls: Arc::clone(&calls),
        });

        let barrier = Arc::new(Barrier::new(8));
        let mut threads = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let barrier = Arc::clone(&barrier);
            threads.push(thread::spawn(move || {
                barrier.wait();
                manager.load::<Blob>("a.png").unwrap()
            }));
        }

        let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for handle in &handles[1..] {
            assert!(ResourceHandle::ptr_eq(&handles[0], handle));
        }
    }

    #[test]
    fn missing_loader_is_a_typed_error() {
        let (_pool, manager) = manager_with_pool(1);
        match manager.load::<Blob>("anything") {
            Err(ResourceError::NoLoader { type_name }) => {
                assert!(type_name.contains("Blob"));
            }
            other => panic!("expected NoLoader, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn failed_load_inserts_nothing_and_retries() {
        let (_pool, manager) = manager_with_pool(1);
        let calls = Arc::new(AtomicUsize::new(0));
        manager.register_loader::<Blob>(FlakyLoader {
            calls: Arc::clone(&calls),
        });

        match manager.load::<Blob>("flaky.png") {
            Err(ResourceError::Load { path, .. }) => assert_eq!(path, "flaky.png"),
            other => panic!("expected Load failure, got {:?}", other.map(|_| ())),
        }

        // The failure left no entry behind; the retry runs the loader again.
        let handle = manager.load::<Blob>("flaky.png").unwrap();
        assert_eq!(handle.bytes, b"flaky.png");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cache_peek_never_loads() {
        let (_pool, manager) = manager_with_pool(1);
        let calls = Arc::new(AtomicUsize::new(0));
        manager.register_loader::<Blob>(CountingLoader {
            calls: Arc::clone(&calls),
        });

        let cache = manager.cache::<Blob>();
        assert!(cache.is_empty());
        assert!(cache.get("rock.obj").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let loaded = manager.load::<Blob>("rock.obj").unwrap();
        assert_eq!(cache.len(), 1);
        let peeked = cache.get("rock.obj").unwrap();
        assert!(ResourceHandle::ptr_eq(&loaded, &peeked));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_drops_the_cache_entry_but_not_live_handles() {
        let (_pool, manager) = manager_with_pool(1);
        let calls = Arc::new(AtomicUsize::new(0));
        manager.register_loader::<Blob>(CountingLoader {
            calls: Arc::clone(&calls),
        });

        let held = manager.load::<Blob>("keep.bin").unwrap();
        assert_eq!(ResourceHandle::ref_count(&held), 2); // cache entry + us

        manager.clear::<Blob>();
        assert_eq!(ResourceHandle::ref_count(&held), 1);
        assert_eq!(held.bytes, b"keep.bin"); // still usable

        let reloaded = manager.load::<Blob>("keep.bin").unwrap();
        assert!(!ResourceHandle::ptr_eq(&held, &reloaded));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_all_empties_every_type() {
        let (_pool, manager) = manager_with_pool(1);
        let calls = Arc::new(AtomicUsize::new(0));
        manager.register_loader::<Blob>(CountingLoader {
            calls: Arc::clone(&calls),
        });
        manager.register_loader::<Palette>(|path: &str| -> anyhow::Result<Palette> {
            Ok(Palette { colors: path.len() })
        });

        manager.load::<Blob>("a").unwrap();
        let palette = manager.load::<Palette>("four").unwrap();
        assert_eq!(palette.colors, 4);

        manager.clear_all();

        manager.load::<Blob>("a").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn load_async_delivers_the_handle_on_a_worker() {
        let (_pool, manager) = manager_with_pool(2);
        let calls = Arc::new(AtomicUsize::new(0));
        manager.register_loader::<Blob>(CountingLoader {
            calls: Arc::clone(&calls),
        });

        let (tx, rx) = crossbeam_channel::bounded(1);
        let caller = thread::current().id();
        manager.load_async::<Blob, _>("async.png", move |result| {
            let on_caller_thread = thread::current().id() == caller;
            tx.send((result, on_caller_thread)).unwrap();
        });

        let (result, on_caller_thread) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let handle = result.unwrap();
        assert!(!on_caller_thread);
        assert_eq!(handle.bytes, b"async.png");

        // The async path populated the shared cache.
        let again = manager.load::<Blob>("async.png").unwrap();
        assert!(ResourceHandle::ptr_eq(&handle, &again));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn load_async_reports_failure_as_a_value() {
        let (_pool, manager) = manager_with_pool(1);

        let (tx, rx) = crossbeam_channel::bounded(1);
        manager.load_async::<Blob, _>("no-loader.png", move |result| {
            tx.send(result.is_err()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }
}
