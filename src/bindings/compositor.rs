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

//! `wl_compositor` (create_surface, create_region), `wl_surface`
//! (attach/damage/frame/set_*_region/commit/destroy), and `wl_region`
//! (add/subtract/destroy).
//!
//! `wl_surface`'s state is request-only: `(buffer | damage | frame |
//! opaque_region | input_region)* commit`. The Facade applies attach/region
//! changes immediately in the pending sense; `commit` is the only point
//! where the Coordinator sees them. This binding does not buffer anything
//! itself — the Coordinator owns the double-buffered semantics.

use wayland_server::Client;
use wayland_server::DataInit;
use wayland_server::DisplayHandle;
use wayland_server::GlobalDispatch;
use wayland_server::New;
use wayland_server::Resource;
use wayland_server::backend::GlobalId;
use wayland_server::protocol::wl_callback::WlCallback;
use wayland_server::protocol::wl_compositor;
use wayland_server::protocol::wl_compositor::WlCompositor;
use wayland_server::protocol::wl_region;
use wayland_server::protocol::wl_region::WlRegion;
use wayland_server::protocol::wl_surface;
use wayland_server::protocol::wl_surface::WlSurface;

use crate::bindings::State;
use crate::cache::SurfaceResource;
use crate::cache::SurfaceResourceKind;
use crate::ids::RegionId;
use crate::ids::SurfaceId;
use crate::prelude::*;

pub const COMPOSITOR_VERSION: u32 = 3;

pub struct SurfaceData {
    pub sid: SurfaceId,
}

pub struct RegionData {
    pub rid: RegionId,
}

pub fn register_globals(dh: &DisplayHandle) -> GlobalId {
    dh.create_global::<State, WlCompositor, _>(COMPOSITOR_VERSION, ())
}

impl GlobalDispatch<WlCompositor, ()> for State {
    fn bind(
        _state: &mut State,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, State>,
    ) {
        data_init.init(resource, ());
    }
}

impl wayland_server::Dispatch<WlCompositor, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                let sid = state.facade.create_surface();
                let surface = data_init.init(id, SurfaceData { sid });
                state
                    .facade
                    .add_surface(sid, SurfaceResource::Surface(surface));
            },
            wl_compositor::Request::CreateRegion { id } => {
                let rid = state.facade.create_region();
                data_init.init(id, RegionData { rid });
            },
            _ => {},
        }
    }
}

impl wayland_server::Dispatch<WlSurface, SurfaceData> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlSurface,
        request: wl_surface::Request,
        data: &SurfaceData,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, State>,
    ) {
        let sid = data.sid;
        match request {
            wl_surface::Request::Attach { buffer, x, y } => {
                let Some(buffer) = buffer else {
                    return;
                };
                let shm_data = buffer
                    .data::<crate::bindings::shm::BufferData>()
                    .map(|d| (d.dims(), d.bytes()));
                let ((w, h, stride), pixels) = shm_data.unwrap_or(((0, 0, 0), Vec::new()));
                state.facade.surface_attach(
                    sid,
                    SurfaceResource::Buffer(buffer),
                    w,
                    h,
                    stride,
                    &pixels,
                );
                let _ = (x, y);
            },
            wl_surface::Request::Frame { callback } => {
                let callback: WlCallback = data_init.init(callback, ());
                state
                    .facade
                    .attach_surface_resource(sid, SurfaceResource::Frame(callback));
            },
            wl_surface::Request::SetInputRegion { region } => {
                let rid = region.and_then(|r| r.data::<RegionData>().map(|d| d.rid));
                state.facade.set_input_region(sid, rid);
            },
            wl_surface::Request::Commit => {
                state.facade.commit(sid);
            },
            wl_surface::Request::Destroy => {
                state.facade.remove_surface(sid);
            },
            // Damage/opaque_region/buffer_scale/etc. are accepted as
            // protocol-valid no-ops: the Coordinator doesn't model damage
            // accumulation or opaque hints in this frontend.
            _ => {},
        }
    }

    fn destroyed(
        state: &mut State,
        _client: wayland_server::backend::ClientId,
        resource: wayland_server::backend::ObjectId,
        data: &SurfaceData,
    ) {
        state.cache.with_lock(|c| {
            c.remove_surface_resource(data.sid, SurfaceResourceKind::Surface, &resource);
        });
    }
}

impl wayland_server::Dispatch<WlRegion, RegionData> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlRegion,
        request: wl_region::Request,
        data: &RegionData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            wl_region::Request::Add { x, y, width, height } => {
                state.facade.inflate_region(data.rid, x, y, width, height);
            },
            wl_region::Request::Subtract { .. } => {
                // Accepted but unimplemented: documented non-goal.
            },
            wl_region::Request::Destroy => {
                state.facade.remove_region(data.rid);
            },
            _ => {},
        }
    }
}

impl wayland_server::Dispatch<WlCallback, ()> for State {
    fn request(
        _state: &mut State,
        _client: &Client,
        _resource: &WlCallback,
        _request: wayland_server::protocol::wl_callback::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        // wl_callback has no requests.
    }
}

