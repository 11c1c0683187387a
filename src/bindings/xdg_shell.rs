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

//! `xdg_shell` v1, the unstable v5-era surface set (the only xdg_shell
//! version this frontend speaks — not the modern stable protocol). As with
//! `wl_shell`, ack-configure is accepted but not enforced.

use wayland_protocols::unstable::xdg_shell::v5::server::xdg_shell;
use wayland_protocols::unstable::xdg_shell::v5::server::xdg_shell::XdgShell;
use wayland_protocols::unstable::xdg_shell::v5::server::xdg_surface;
use wayland_protocols::unstable::xdg_shell::v5::server::xdg_surface::XdgSurface;
use wayland_server::Client;
use wayland_server::DataInit;
use wayland_server::DisplayHandle;
use wayland_server::GlobalDispatch;
use wayland_server::New;
use wayland_server::backend::GlobalId;

use crate::bindings::State;
use crate::bindings::compositor::SurfaceData;
use crate::cache::SurfaceResource;
use crate::ids::SurfaceId;

pub const XDG_SHELL_VERSION: u32 = 1;

pub struct XdgSurfaceData {
    pub sid: SurfaceId,
}

pub fn register_global(dh: &DisplayHandle) -> GlobalId {
    dh.create_global::<State, XdgShell, _>(XDG_SHELL_VERSION, ())
}

impl GlobalDispatch<XdgShell, ()> for State {
    fn bind(
        _state: &mut State,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<XdgShell>,
        _global_data: &(),
        data_init: &mut DataInit<'_, State>,
    ) {
        data_init.init(resource, ());
    }
}

impl wayland_server::Dispatch<XdgShell, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &XdgShell,
        request: xdg_shell::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            xdg_shell::Request::GetXdgSurface { id, surface } => {
                let Some(surface_data) = surface.data::<SurfaceData>() else {
                    return;
                };
                let sid = surface_data.sid;
                let xdg_surface = data_init.init(id, XdgSurfaceData { sid });
                state
                    .facade
                    .add_shell_surface(sid, SurfaceResource::XdgShellSurface(xdg_surface));
            },
            xdg_shell::Request::UseUnstableVersion { .. } | xdg_shell::Request::Pong { .. } => {},
            // xdg_popup is not implemented: popups are out of scope for
            // this version (only the toplevel surface set is handled).
            _ => {},
        }
    }
}

impl wayland_server::Dispatch<XdgSurface, XdgSurfaceData> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &XdgSurface,
        request: xdg_surface::Request,
        data: &XdgSurfaceData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            xdg_surface::Request::SetMaximized => {
                state.gateway.surface_reconfigured(
                    data.sid,
                    (0, 0),
                    crate::coordinator::SurfaceStateFlags::MAXIMIZED,
                );
            },
            xdg_surface::Request::UnsetMaximized => {
                state.gateway.surface_reconfigured(
                    data.sid,
                    (0, 0),
                    crate::coordinator::SurfaceStateFlags::empty(),
                );
            },
            xdg_surface::Request::AckConfigure { .. } => {},
            xdg_surface::Request::SetWindowGeometry { x, y, width, height } => {
                state.facade.set_offset(data.sid, x, y);
                state.facade.set_requested_size(data.sid, width, height);
            },
            // set_parent/set_title/set_app_id/show_window_menu/fullscreen/
            // minimized/destroy carry no Cache- or Gateway-visible effect
            // beyond what's already handled through the Coordinator.
            _ => {},
        }
    }
}
