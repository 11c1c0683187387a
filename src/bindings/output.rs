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

//! `wl_output` v3. One global per advertised output, each with a fixed
//! geometry/mode/scale taken from `OutputDefaults` — this frontend has no
//! real display backend to query.

use wayland_server::Client;
use wayland_server::DataInit;
use wayland_server::DisplayHandle;
use wayland_server::GlobalDispatch;
use wayland_server::New;
use wayland_server::Resource;
use wayland_server::backend::GlobalId;
use wayland_server::protocol::wl_output;
use wayland_server::protocol::wl_output::WlOutput;

use crate::bindings::State;
use crate::config::OutputDefaults;

pub const OUTPUT_VERSION: u32 = 3;

pub struct OutputGlobalData {
    defaults: OutputDefaults,
}

pub fn register_global(dh: &DisplayHandle, name: &str, defaults: OutputDefaults) -> GlobalId {
    let _ = name;
    dh.create_global::<State, WlOutput, _>(OUTPUT_VERSION, OutputGlobalData { defaults })
}

impl GlobalDispatch<WlOutput, OutputGlobalData> for State {
    fn bind(
        _state: &mut State,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlOutput>,
        global_data: &OutputGlobalData,
        data_init: &mut DataInit<'_, State>,
    ) {
        let output = data_init.init(resource, ());
        let d = global_data.defaults;

        output.geometry(
            0,
            0,
            d.physical_width_mm,
            d.physical_height_mm,
            wl_output::Subpixel::Unknown,
            d.name.to_string(),
            d.name.to_string(),
            wl_output::Transform::Normal,
        );
        output.mode(
            wl_output::Mode::Current | wl_output::Mode::Preferred,
            d.width,
            d.height,
            d.refresh_mhz,
        );
        if output.version() >= 2 {
            output.scale(d.scale);
            output.done();
        }
    }
}

impl wayland_server::Dispatch<WlOutput, ()> for State {
    fn request(
        _state: &mut State,
        _client: &Client,
        _resource: &WlOutput,
        request: wl_output::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        // wl_output's only request (release) needs no Cache-side effect.
        let _ = request;
    }
}
