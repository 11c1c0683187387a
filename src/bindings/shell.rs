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

//! Legacy `wl_shell` (v1) and `wl_shell_surface`. Ack-configure is accepted
//! but not enforced — there's no throttling of configure serials here.

use wayland_server::Client;
use wayland_server::DataInit;
use wayland_server::DisplayHandle;
use wayland_server::GlobalDispatch;
use wayland_server::New;
use wayland_server::backend::GlobalId;
use wayland_server::protocol::wl_shell;
use wayland_server::protocol::wl_shell::WlShell;
use wayland_server::protocol::wl_shell_surface;
use wayland_server::protocol::wl_shell_surface::WlShellSurface;

use crate::bindings::State;
use crate::bindings::compositor::SurfaceData;
use crate::cache::SurfaceResource;
use crate::ids::SurfaceId;

pub const SHELL_VERSION: u32 = 1;

pub struct ShellSurfaceData {
    pub sid: SurfaceId,
}

pub fn register_global(dh: &DisplayHandle) -> GlobalId {
    dh.create_global::<State, WlShell, _>(SHELL_VERSION, ())
}

impl GlobalDispatch<WlShell, ()> for State {
    fn bind(
        _state: &mut State,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlShell>,
        _global_data: &(),
        data_init: &mut DataInit<'_, State>,
    ) {
        data_init.init(resource, ());
    }
}

impl wayland_server::Dispatch<WlShell, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlShell,
        request: wl_shell::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, State>,
    ) {
        if let wl_shell::Request::GetShellSurface { id, surface } = request {
            let Some(surface_data) = surface.data::<SurfaceData>() else {
                return;
            };
            let sid = surface_data.sid;
            let shell_surface = data_init.init(id, ShellSurfaceData { sid });
            state
                .facade
                .add_shell_surface(sid, SurfaceResource::ShellSurface(shell_surface));
        }
    }
}

impl wayland_server::Dispatch<WlShellSurface, ShellSurfaceData> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlShellSurface,
        request: wl_shell_surface::Request,
        data: &ShellSurfaceData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            wl_shell_surface::Request::SetToplevel => {
                state
                    .coordinator
                    .surface_show(data.sid, crate::coordinator::ShowReason::DRAWABLE);
            },
            wl_shell_surface::Request::Pong { .. } => {},
            // Fullscreen/maximize/popup/transient variants all forward to
            // a single "show as drawable" call in this frontend; geometry
            // negotiation is the Coordinator's responsibility.
            _ => {},
        }
    }
}
