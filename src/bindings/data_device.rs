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

//! `wl_data_device_manager` v2, `wl_data_device`, `wl_data_source`, and
//! `wl_data_offer`. Only the clipboard (selection) path is wired through to
//! the Cache; drag-and-drop requests are accepted but otherwise ignored —
//! this frontend has no drag icon surface or drop-target tracking.

use std::sync::OnceLock;

use wayland_server::Client;
use wayland_server::DataInit;
use wayland_server::DisplayHandle;
use wayland_server::GlobalDispatch;
use wayland_server::New;
use wayland_server::Resource;
use wayland_server::backend::GlobalId;
use wayland_server::protocol::wl_data_device;
use wayland_server::protocol::wl_data_device::WlDataDevice;
use wayland_server::protocol::wl_data_device_manager;
use wayland_server::protocol::wl_data_device_manager::WlDataDeviceManager;
use wayland_server::protocol::wl_data_offer;
use wayland_server::protocol::wl_data_offer::WlDataOffer;
use wayland_server::protocol::wl_data_source;
use wayland_server::protocol::wl_data_source::WlDataSource;

use crate::bindings::State;
use crate::cache::GeneralResourceKind;
use crate::gateway::DataOfferFactory;

pub const DATA_DEVICE_MANAGER_VERSION: u32 = 2;

pub fn register_global(dh: &DisplayHandle) -> GlobalId {
    dh.create_global::<State, WlDataDeviceManager, _>(DATA_DEVICE_MANAGER_VERSION, ())
}

/// Builds `wl_data_offer` resources on the Gateway's behalf. The display
/// handle isn't available until `Engine::start` creates the display, so
/// it's filled in once via `set_display_handle` before the frontend thread
/// starts handling requests.
pub struct OfferFactory {
    dh: OnceLock<DisplayHandle>,
}

impl OfferFactory {
    pub fn new() -> Self {
        Self { dh: OnceLock::new() }
    }

    pub fn set_display_handle(&self, dh: DisplayHandle) {
        let _ = self.dh.set(dh);
    }
}

impl Default for OfferFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DataOfferFactory for OfferFactory {
    fn create_data_offer(&self, device: &WlDataDevice) -> Option<WlDataOffer> {
        let dh = self.dh.get()?;
        let client = dh.get_client(device.client_id().ok()?).ok()?;
        client
            .create_resource::<WlDataOffer, (), State>(dh, device.version(), ())
            .ok()
    }
}

impl GlobalDispatch<WlDataDeviceManager, ()> for State {
    fn bind(
        _state: &mut State,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlDataDeviceManager>,
        _global_data: &(),
        data_init: &mut DataInit<'_, State>,
    ) {
        data_init.init(resource, ());
    }
}

impl wayland_server::Dispatch<WlDataDeviceManager, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlDataDeviceManager,
        request: wl_data_device_manager::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            wl_data_device_manager::Request::CreateDataSource { id } => {
                let source = data_init.init(id, ());
                state.facade.create_transfer(source);
            },
            wl_data_device_manager::Request::GetDataDevice { id, seat } => {
                let _ = seat;
                let device = data_init.init(id, ());
                state.facade.add_data_device_resource(device);
            },
            _ => {},
        }
    }
}

impl wayland_server::Dispatch<WlDataSource, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlDataSource,
        request: wl_data_source::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            wl_data_source::Request::Offer { mime_type } => {
                state.facade.add_mime_type(mime_type);
            },
            wl_data_source::Request::Destroy => {
                state.facade.destroy_transfer();
            },
            // set_actions negotiates dnd actions this frontend doesn't model.
            _ => {},
        }
    }
}

impl wayland_server::Dispatch<WlDataDevice, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlDataDevice,
        request: wl_data_device::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            wl_data_device::Request::SetSelection { source, serial } => {
                let _ = (source, serial);
                state.facade.send_selection();
            },
            // start_drag is accepted but has no effect: no drag icon
            // surface or drop-target tracking exists in this frontend.
            wl_data_device::Request::StartDrag { .. } => {},
            wl_data_device::Request::Release => {},
            _ => {},
        }
    }

    fn destroyed(
        state: &mut State,
        _client: wayland_server::backend::ClientId,
        resource: wayland_server::backend::ObjectId,
        _data: &(),
    ) {
        state
            .cache
            .with_lock(|c| c.remove_general_resource(GeneralResourceKind::DataDevice, &resource));
    }
}

impl wayland_server::Dispatch<WlDataOffer, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlDataOffer,
        request: wl_data_offer::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        if let wl_data_offer::Request::Receive { mime_type, fd } = request {
            let source = state
                .cache
                .with_lock(|c| c.frontend().current_transfer.as_ref().map(|t| t.source.clone()));
            if let Some(source) = source {
                state.facade.receive_data_offer(&source, mime_type, fd);
            }
        }
        // accept/finish/set_actions carry no Cache-visible state here.
    }
}
