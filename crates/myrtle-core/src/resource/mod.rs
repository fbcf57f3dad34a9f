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

//! Concurrent, type-keyed resource caching.
//!
//! The [`ResourceManager`] keeps one [`ResourceCache`] per resource type,
//! created lazily on first use. Loading the same path twice for the same type
//! yields the same shared [`ResourceHandle`], and the underlying
//! [`ResourceLoader`] runs at most once per `(type, path)` pair until the
//! cache is cleared.
//!
//! How a resource is actually constructed from a path (file I/O, decoding,
//! GPU upload) is supplied by asset-loading code through the
//! [`ResourceLoader`] trait; this module only coordinates caching and
//! concurrency.

mod cache;
mod error;
mod handle;
mod loader;
mod manager;

pub use self::cache::ResourceCache;
pub use self::error::ResourceError;
pub use self::handle::ResourceHandle;
pub use self::loader::ResourceLoader;
pub use self::manager::ResourceManager;

/// A marker trait for types that can be managed by the resource system.
///
/// The supertraits enforce what background loading needs:
/// - `Send` + `Sync`: handles are shared freely across worker threads.
/// - `'static`: a cached resource holds no borrowed data.
///
/// Resources are treated as immutable once constructed; mutation after
/// construction is not part of the contract.
pub trait Resource: Send + Sync + 'static {}
