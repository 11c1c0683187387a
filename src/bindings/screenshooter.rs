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

//! `screenshooter` v1 (see `protocols/screenshooter.xml`). This frontend
//! has no real output backend to copy pixels from, so `shoot` always
//! answers `done` without writing into the supplied buffer — enough for a
//! client to exercise the request/response cycle.

use wayland_server::Client;
use wayland_server::DataInit;
use wayland_server::DisplayHandle;
use wayland_server::GlobalDispatch;
use wayland_server::New;
use wayland_server::backend::GlobalId;

use crate::bindings::State;
use crate::protocol::screenshooter;
use crate::protocol::screenshooter::Screenshooter;

pub const SCREENSHOOTER_VERSION: u32 = 1;

pub fn register_global(dh: &DisplayHandle) -> GlobalId {
    dh.create_global::<State, Screenshooter, _>(SCREENSHOOTER_VERSION, ())
}

impl GlobalDispatch<Screenshooter, ()> for State {
    fn bind(
        _state: &mut State,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<Screenshooter>,
        _global_data: &(),
        data_init: &mut DataInit<'_, State>,
    ) {
        data_init.init(resource, ());
    }
}

impl wayland_server::Dispatch<Screenshooter, ()> for State {
    fn request(
        _state: &mut State,
        _client: &Client,
        resource: &Screenshooter,
        request: screenshooter::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        if let screenshooter::Request::Shoot { output, buffer } = request {
            let _ = (output, buffer);
            resource.done();
        }
    }
}
