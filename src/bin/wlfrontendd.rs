// Copyright 2024 Google LLC
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

//! Entry point: loads config, wires the Cache/Coordinator/Facade/Gateway,
//! starts the Engine, and blocks the main thread on `SIGINT`/`SIGTERM`.

use std::sync::Arc;

use clap::Parser;
use nix::sys::signal::SigSet;
use nix::sys::signal::Signal;
use wl_frontend::bindings::State;
use wl_frontend::cache::Cache;
use wl_frontend::config::Args;
use wl_frontend::coordinator::BufferRc;
use wl_frontend::coordinator::Coordinator;
use wl_frontend::coordinator::Position;
use wl_frontend::coordinator::ShowReason;
use wl_frontend::coordinator::Size;
use wl_frontend::engine::Engine;
use wl_frontend::ids::IdAllocator;
use wl_frontend::ids::SurfaceId;
use wl_frontend::keyboard_state::KeyboardState;
use wl_frontend::prelude::*;
use wl_frontend::utils;
use wl_frontend::utils::signals;

/// Mints surface ids and logs every call at debug level. The real scene
/// graph this frontend drives lives outside this crate; this stand-in lets
/// `wlfrontendd` run and exercise the protocol bindings on its own.
struct LoggingCoordinator {
    ids: IdAllocator,
}

impl LoggingCoordinator {
    fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
        }
    }
}

impl Coordinator for LoggingCoordinator {
    fn surface_create(&self) -> SurfaceId {
        let sid = SurfaceId::new(self.ids.alloc());
        debug!(?sid, "surface_create");
        sid
    }

    fn surface_destroy(&self, sid: SurfaceId) {
        debug!(?sid, "surface_destroy");
    }

    fn surface_attach(&self, sid: SurfaceId, w: i32, h: i32, stride: i32, data: &[u8]) -> BufferRc {
        debug!(?sid, w, h, stride, bytes = data.len(), "surface_attach");
        0
    }

    fn surface_commit(&self, sid: SurfaceId) {
        debug!(?sid, "surface_commit");
    }

    fn surface_show(&self, sid: SurfaceId, reason: ShowReason) {
        debug!(?sid, ?reason, "surface_show");
    }

    fn surface_set_offset(&self, sid: SurfaceId, pos: Position) {
        debug!(?sid, pos.x, pos.y, "surface_set_offset");
    }

    fn surface_set_requested_size(&self, sid: SurfaceId, size: Size) {
        debug!(?sid, size.w, size.h, "surface_set_requested_size");
    }

    fn surface_reset_offset_and_requested_size(&self, sid: SurfaceId) {
        debug!(?sid, "surface_reset_offset_and_requested_size");
    }

    fn surface_set_relative_position(&self, sid: SurfaceId, pos: Position) {
        debug!(?sid, pos.x, pos.y, "surface_set_relative_position");
    }

    fn surface_relate(&self, sid: SurfaceId, parent_sid: SurfaceId) {
        debug!(?sid, ?parent_sid, "surface_relate");
    }

    fn surface_set_as_cursor(&self, sid: SurfaceId) {
        debug!(?sid, "surface_set_as_cursor");
    }
}

fn wait_for_termination() {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set.add(Signal::SIGTERM);
    match set.wait() {
        Ok(signal) => info!(?signal, "received termination signal, shutting down"),
        Err(e) => error!("sigwait failed: {e}, shutting down anyway"),
    }
}

fn main() -> Result<()> {
    let config = Args::parse().load_config().location(loc!())?;

    utils::configure_tracing(
        config.stderr_log_level.0,
        config.log_file.as_ref(),
        config.file_log_level.0,
    )
    .location(loc!())?;
    utils::exit_on_thread_panic();
    signals::install_fatal_signal_handlers().location(loc!())?;
    signals::block_termination_signals().location(loc!())?;

    let keyboard_state = KeyboardState::new().location(loc!())?;
    let cache = Arc::new(Cache::new(keyboard_state));
    let coordinator: Arc<dyn Coordinator> = Arc::new(LoggingCoordinator::new());
    let state = State::new(cache, coordinator);

    let (mut engine, _globals) = Engine::start(&config, state).location(loc!())?;
    engine.advertise_output(config.output.name.to_string()).location(loc!())?;

    wait_for_termination();
    engine.stop();

    Ok(())
}
