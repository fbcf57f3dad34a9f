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

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender};

type ErasedHandler = Box<dyn Fn(&dyn Any) + Send + Sync>;
type DeferredEvent = Box<dyn FnOnce(&EventBus) + Send>;

/// A type-routed publish/subscribe bus with immediate and deferred delivery.
///
/// Handlers for one event type form an ordered list and are always invoked
/// in registration order. Subscriptions persist for the bus's lifetime;
/// there is no unsubscribe.
///
/// # Reentrancy
///
/// Dispatch happens while the bus's subscriber lock is held. A handler that
/// calls [`subscribe`](Self::subscribe) or [`publish`](Self::publish) on the
/// same bus will deadlock. **Do not call back into the bus from within a
/// handler** — this is a hard usage contract. [`enqueue`](Self::enqueue) is
/// the exception: it only touches the deferred queue and is safe from inside
/// a handler.
pub struct EventBus {
    subscribers: Mutex<HashMap<TypeId, Vec<ErasedHandler>>>,
    deferred_tx: Sender<DeferredEvent>,
    deferred_rx: Receiver<DeferredEvent>,
}

impl EventBus {
    /// Creates a bus with no subscriptions and an empty deferred queue.
    pub fn new() -> Self {
        let (deferred_tx, deferred_rx) = crossbeam_channel::unbounded();
        Self {
            subscribers: Mutex::new(HashMap::new()),
            deferred_tx,
            deferred_rx,
        }
    }

    /// Registers `handler` for events of type `E`, appended to the end of
    /// `E`'s subscription list.
    pub fn subscribe<E, F>(&self, handler: F)
    where
        E: Any,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let erased: ErasedHandler = Box::new(move |event| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });

        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.entry(TypeId::of::<E>()).or_default().push(erased);

        log::trace!(
            "EventBus: subscribed handler for {}",
            std::any::type_name::<E>()
        );
    }

    /// Dispatches `event` immediately and synchronously.
    ///
    /// Every handler currently registered for `E` runs on the calling
    /// thread, in registration order, exactly once; `publish` returns only
    /// after all of them have run. Handlers registered for other types are
    /// never invoked.
    pub fn publish<E: Any>(&self, event: &E) {
        let subscribers = self.subscribers.lock().unwrap();
        if let Some(handlers) = subscribers.get(&TypeId::of::<E>()) {
            for handler in handlers {
                handler(event);
            }
        }
    }

    /// Appends `event` to the deferred FIFO without invoking any handler.
    ///
    /// The event is delivered by the next [`dispatch_queued`](Self::dispatch_queued)
    /// call. Safe to call from any thread, including from inside a handler.
    pub fn enqueue<E: Any + Send>(&self, event: E) {
        let deferred: DeferredEvent = Box::new(move |bus| bus.publish(&event));
        // The receiver lives as long as the bus; the send cannot fail.
        let _ = self.deferred_tx.send(deferred);
    }

    /// Drains the deferred FIFO, dispatching each queued event through the
    /// same routing as [`publish`](Self::publish), in enqueue order.
    ///
    /// Only events enqueued before the call are delivered; events enqueued
    /// during the drain (for example, by a handler) are held for the next
    /// call. Intended to be called once per engine tick.
    pub fn dispatch_queued(&self) {
        // Snapshot first so same-drain enqueues roll over to the next call.
        let pending: Vec<DeferredEvent> = self.deferred_rx.try_iter().collect();
        if pending.is_empty() {
            return;
        }

        log::trace!("EventBus: dispatching {} deferred events", pending.len());
        for deliver in pending {
            deliver(self);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
