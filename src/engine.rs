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

//! The Engine: owns the protocol display, its event loop, the frontend
//! thread, global interface registration, and output advertisement.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use calloop::EventLoop;
use calloop::LoopSignal;
use calloop::generic::Generic;
use calloop::timer::TimeoutAction;
use calloop::timer::Timer;
use wayland_server::Display;
use wayland_server::backend::GlobalId;

use crate::bindings::State;
use crate::config::WlFrontendConfig;
use crate::config::runtime_dir;
use crate::prelude::*;
use crate::utils;

/// Monotonically increasing serial numbers for protocol events, obtained
/// from the display. Exposed as a trait so the Gateway doesn't need to
/// depend on the Engine's concrete display ownership.
pub trait SerialSource: Send + Sync {
    fn next_serial(&self) -> u32;
}

/// A `Display`'s serial allocator is only reachable from the thread that
/// owns the display loop, and the frontend thread is the only caller of
/// Gateway methods, so a free-standing atomic counter mirrors it without
/// needing to thread a `DisplayHandle` through every call site.
pub struct AtomicSerialSource {
    next: AtomicU32,
}

impl AtomicSerialSource {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }
}

impl Default for AtomicSerialSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialSource for AtomicSerialSource {
    fn next_serial(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// The globals the Engine registers at startup, one per protocol binding.
pub struct Globals {
    pub compositor: GlobalId,
    pub subcompositor: GlobalId,
    pub data_device_manager: GlobalId,
    pub shell: GlobalId,
    pub xdg_shell: GlobalId,
    pub seat: GlobalId,
    pub screenshooter: GlobalId,
    pub shm: GlobalId,
}

/// A registered `wl_output` global plus the string key it's stored under.
pub struct OutputRecord {
    pub name: String,
    pub global: GlobalId,
}

/// The event loop's shared data: the dispatch state plus the display that
/// dispatches into it.
struct LoopData {
    state: State,
    display: Display<State>,
}

pub struct Engine {
    display_handle: wayland_server::DisplayHandle,
    loop_signal: LoopSignal,
    thread: Option<JoinHandle<()>>,
    outputs: std::sync::Mutex<Vec<OutputRecord>>,
    output_defaults: crate::config::OutputDefaults,
}

impl Engine {
    /// Creates the display, binds the well-known socket, registers every
    /// global, and starts the dedicated frontend thread running the
    /// display loop. Returns once the thread is up and globals exist.
    pub fn start(config: &WlFrontendConfig, state: State) -> Result<(Self, Globals)> {
        let display: Display<State> = Display::new().location(loc!())?;
        let dh = display.handle();
        state.offer_factory.set_display_handle(dh.clone());

        let globals = Globals {
            compositor: crate::bindings::compositor::register_globals(&dh),
            subcompositor: crate::bindings::subcompositor::register_global(&dh),
            data_device_manager: crate::bindings::data_device::register_global(&dh),
            shell: crate::bindings::shell::register_global(&dh),
            xdg_shell: crate::bindings::xdg_shell::register_global(&dh),
            seat: crate::bindings::seat::register_global(&dh),
            screenshooter: crate::bindings::screenshooter::register_global(&dh),
            shm: crate::bindings::shm::register_global(&dh),
        };

        let socket_path = PathBuf::from(runtime_dir()).join(&config.socket_name);
        let listener = utils::bind_user_socket(&socket_path).location(loc!())?;
        listener.set_nonblocking(true).location(loc!())?;

        let loop_feeder_period = Duration::from_millis(config.loop_feeder_period_ms);

        let mut event_loop: EventLoop<'static, LoopData> = EventLoop::try_new().location(loc!())?;
        let loop_signal = event_loop.get_signal();
        let handle = event_loop.handle();

        handle
            .insert_source(
                Generic::new(listener, calloop::Interest::READ, calloop::Mode::Level),
                move |_, listener, loop_data: &mut LoopData| {
                    match listener.accept() {
                        Ok((stream, _addr)) => {
                            if let Err(e) = loop_data
                                .display
                                .handle()
                                .insert_client(stream, Arc::new(crate::bindings::ClientState))
                            {
                                warn!("failed to insert new wayland client: {e}");
                            }
                        },
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {},
                        Err(e) => warn!("accept() on wayland socket failed: {e}"),
                    }
                    Ok(calloop::PostAction::Continue)
                },
            )
            .location(loc!())?;

        let poll_fd = display
            .backend()
            .poll_fd()
            .try_clone_to_owned()
            .location(loc!())?;
        handle
            .insert_source(
                Generic::new(poll_fd, calloop::Interest::READ, calloop::Mode::Level),
                move |_, _, loop_data: &mut LoopData| {
                    loop_data
                        .display
                        .dispatch_clients(&mut loop_data.state)
                        .location(loc!())?;
                    Ok(calloop::PostAction::Continue)
                },
            )
            .location(loc!())?;

        // Loop-feeder quirk: calloop blocks unless it observes recurring
        // activity; this self-rearming timer's only purpose is to wake it.
        handle
            .insert_source(Timer::from_duration(loop_feeder_period), move |_, _, _| {
                TimeoutAction::ToDuration(loop_feeder_period)
            })
            .location(loc!())?;

        let mut loop_data = LoopData { state, display };

        let thread = thread::Builder::new()
            .name(utils::signals::truncate_thread_name("wayland"))
            .spawn(move || {
                if let Err(e) = utils::signals::block_termination_signals() {
                    warn!("failed to block termination signals on frontend thread: {e}");
                }
                let result = event_loop.run(Duration::from_millis(100), &mut loop_data, |loop_data| {
                    if let Err(e) = loop_data.display.flush_clients() {
                        warn!("flush_clients failed: {e}");
                    }
                });
                if let Err(e) = result {
                    error!("frontend event loop exited with error: {e}");
                }
            })
            .location(loc!())?;

        Ok((
            Self {
                display_handle: dh,
                loop_signal,
                thread: Some(thread),
                outputs: std::sync::Mutex::new(Vec::new()),
                output_defaults: config.output,
            },
            globals,
        ))
    }

    pub fn display_handle(&self) -> &wayland_server::DisplayHandle {
        &self.display_handle
    }

    /// Creates a `wl_output` global and stores the record under the
    /// output's name.
    pub fn advertise_output(&self, name: String) -> Result<()> {
        let global = crate::bindings::output::register_global(
            &self.display_handle,
            &name,
            self.output_defaults,
        );
        self.outputs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(OutputRecord { name, global });
        Ok(())
    }

    pub fn destroy_output(&self, name: &str) {
        let mut outputs = self.outputs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = outputs.iter().position(|o| o.name == name) {
            let record = outputs.remove(pos);
            self.display_handle.remove_global::<State>(record.global);
        }
    }

    /// Requests display termination and joins the frontend thread.
    pub fn stop(&mut self) {
        self.loop_signal.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("frontend thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}
