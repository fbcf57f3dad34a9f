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

// Myrtle Sandbox
// Wires the runtime core together the way an engine tick loop would:
// assets load through the pool, gameplay events flow through the bus,
// and the deferred queue drains once per frame.

use std::time::Duration;

use anyhow::Result;
use myrtle_core::{EngineContext, PoolConfig, Resource, ResourceHandle};

/// Stand-in for a decoded mesh asset.
struct Mesh {
    vertex_count: usize,
}
impl Resource for Mesh {}

/// Gameplay event published by "physics" and consumed by "audio".
#[derive(Debug, Clone)]
struct Collision {
    impulse: f32,
}

/// Frame-boundary event produced by the tick loop.
#[derive(Debug, Clone)]
struct FrameEnded {
    frame: u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let mut context = EngineContext::new(PoolConfig::default());

    // Asset code supplies the per-type loader; here it just fakes a parse.
    context
        .resources
        .register_loader::<Mesh>(|path: &str| -> Result<Mesh> {
            log::debug!("parsing mesh '{path}'");
            Ok(Mesh {
                vertex_count: path.len() * 3,
            })
        });

    // Producers and consumers only know the event types, not each other.
    context.events.subscribe::<Collision, _>(|event| {
        log::info!("audio: playing impact sound (impulse {})", event.impulse);
    });
    context.events.subscribe::<FrameEnded, _>(|event| {
        log::info!("telemetry: frame {} complete", event.frame);
    });

    // Synchronous load on the main thread.
    let rock = context.resources.load::<Mesh>("meshes/rock.obj")?;
    log::info!("rock mesh ready: {} vertices", rock.vertex_count);

    // Asynchronous load: the callback runs on a worker thread.
    let (loaded_tx, loaded_rx) = crossbeam_channel::bounded(1);
    context
        .resources
        .load_async::<Mesh, _>("meshes/house.obj", move |result| {
            let _ = loaded_tx.send(result);
        });

    // A second load of an already-cached path returns the same instance.
    let rock_again = context.resources.load::<Mesh>("meshes/rock.obj")?;
    assert!(ResourceHandle::ptr_eq(&rock, &rock_again));

    // Minimal tick loop: immediate publishes plus one deferred drain.
    for frame in 0..3u64 {
        context.events.publish(&Collision {
            impulse: frame as f32 * 0.5,
        });
        context.events.enqueue(FrameEnded { frame });
        context.events.dispatch_queued();
    }

    let house = loaded_rx.recv_timeout(Duration::from_secs(5))??;
    log::info!("house mesh ready: {} vertices", house.vertex_count);

    context.shutdown();
    Ok(())
}
