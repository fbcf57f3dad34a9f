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

//! Type-routed publish/subscribe messaging.
//!
//! The [`EventBus`] decouples producers (input, physics) from consumers
//! (gameplay, audio): neither side knows about the other, only about the
//! event type. Routing is type-exact — publishing `T` never reaches handlers
//! registered for any other type, structurally related or not.
//!
//! Delivery comes in two flavors: [`publish`](EventBus::publish) dispatches
//! immediately and synchronously on the caller's thread, while
//! [`enqueue`](EventBus::enqueue) defers the event until the next
//! [`dispatch_queued`](EventBus::dispatch_queued), typically called once per
//! frame by the engine tick loop.

mod bus;

pub use self::bus::EventBus;
