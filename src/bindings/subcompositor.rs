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

//! `wl_subcompositor` (get_subsurface) and `wl_subsurface` (set_position,
//! place_above/below, set_sync/desync, destroy).

use wayland_server::Client;
use wayland_server::DataInit;
use wayland_server::DisplayHandle;
use wayland_server::GlobalDispatch;
use wayland_server::New;
use wayland_server::backend::GlobalId;
use wayland_server::protocol::wl_subcompositor;
use wayland_server::protocol::wl_subcompositor::WlSubcompositor;
use wayland_server::protocol::wl_subsurface;
use wayland_server::protocol::wl_subsurface::WlSubsurface;

use crate::bindings::State;
use crate::bindings::compositor::SurfaceData;
use crate::ids::SurfaceId;

pub const SUBCOMPOSITOR_VERSION: u32 = 1;

pub struct SubsurfaceData {
    pub sid: SurfaceId,
    pub parent_sid: SurfaceId,
}

pub fn register_global(dh: &DisplayHandle) -> GlobalId {
    dh.create_global::<State, WlSubcompositor, _>(SUBCOMPOSITOR_VERSION, ())
}

impl GlobalDispatch<WlSubcompositor, ()> for State {
    fn bind(
        _state: &mut State,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlSubcompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, State>,
    ) {
        data_init.init(resource, ());
    }
}

impl wayland_server::Dispatch<WlSubcompositor, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlSubcompositor,
        request: wl_subcompositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, State>,
    ) {
        if let wl_subcompositor::Request::GetSubsurface { id, surface, parent } = request {
            let Some(surface_data) = surface.data::<SurfaceData>() else {
                return;
            };
            let Some(parent_data) = parent.data::<SurfaceData>() else {
                return;
            };
            let sid = surface_data.sid;
            let parent_sid = parent_data.sid;
            data_init.init(id, SubsurfaceData { sid, parent_sid });
            state.facade.add_subsurface(sid, parent_sid, 0, 0);
        }
    }
}

impl wayland_server::Dispatch<WlSubsurface, SubsurfaceData> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlSubsurface,
        request: wl_subsurface::Request,
        data: &SubsurfaceData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            wl_subsurface::Request::SetPosition { x, y } => {
                state.facade.set_subsurface_position(data.sid, x, y);
            },
            wl_subsurface::Request::PlaceAbove { sibling } => {
                let Some(sibling_data) = sibling.data::<SurfaceData>() else {
                    return;
                };
                state.facade.place_subsurface_above(
                    data.parent_sid,
                    data.sid,
                    sibling_data.sid,
                );
            },
            wl_subsurface::Request::PlaceBelow { sibling } => {
                let Some(sibling_data) = sibling.data::<SurfaceData>() else {
                    return;
                };
                state.facade.place_subsurface_below(
                    data.parent_sid,
                    data.sid,
                    sibling_data.sid,
                );
            },
            // Sync/desync mode toggling and destroy don't have a Cache- or
            // Coordinator-visible effect in this frontend: commit ordering
            // is handled entirely on the Coordinator side.
            _ => {},
        }
    }
}
