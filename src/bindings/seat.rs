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

//! `wl_seat` v4 (name `seat0`, pointer + keyboard capabilities only — no
//! touch), `wl_pointer`, and `wl_keyboard`.

use std::os::fd::AsFd;

use wayland_server::Client;
use wayland_server::DataInit;
use wayland_server::DisplayHandle;
use wayland_server::GlobalDispatch;
use wayland_server::New;
use wayland_server::Resource;
use wayland_server::backend::GlobalId;
use wayland_server::protocol::wl_keyboard;
use wayland_server::protocol::wl_keyboard::WlKeyboard;
use wayland_server::protocol::wl_pointer;
use wayland_server::protocol::wl_pointer::WlPointer;
use wayland_server::protocol::wl_seat;
use wayland_server::protocol::wl_seat::WlSeat;

use crate::bindings::State;
use crate::bindings::compositor::SurfaceData;
use crate::cache::GeneralResourceKind;
use crate::prelude::*;

pub const SEAT_VERSION: u32 = 4;
pub const SEAT_NAME: &str = "seat0";

pub fn register_global(dh: &DisplayHandle) -> GlobalId {
    dh.create_global::<State, WlSeat, _>(SEAT_VERSION, ())
}

impl GlobalDispatch<WlSeat, ()> for State {
    fn bind(
        _state: &mut State,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlSeat>,
        _global_data: &(),
        data_init: &mut DataInit<'_, State>,
    ) {
        let seat = data_init.init(resource, ());
        seat.capabilities(wl_seat::Capability::Pointer | wl_seat::Capability::Keyboard);
        if seat.version() >= 2 {
            seat.name(SEAT_NAME.to_string());
        }
    }
}

impl wayland_server::Dispatch<WlSeat, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlSeat,
        request: wl_seat::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            wl_seat::Request::GetPointer { id } => {
                let pointer = data_init.init(id, ());
                state.facade.add_pointer_resource(pointer);
            },
            wl_seat::Request::GetKeyboard { id } => {
                let keyboard: WlKeyboard = data_init.init(id, ());
                send_keymap(state, &keyboard);
                state.facade.add_keyboard_resource(keyboard);
            },
            // Touch input is out of scope for this frontend.
            wl_seat::Request::GetTouch { .. } => {},
            wl_seat::Request::Release => {},
            _ => {},
        }
    }
}

fn send_keymap(state: &State, keyboard: &WlKeyboard) {
    let fd = state
        .cache
        .with_lock(|c| c.frontend().keyboard_state.settings().dup_fd());
    let size = state
        .cache
        .with_lock(|c| c.frontend().keyboard_state.settings().size);
    match fd {
        Ok(fd) => keyboard.keymap(wl_keyboard::KeymapFormat::XkbV1, fd.as_fd(), size),
        Err(e) => warn!("failed to duplicate keymap fd for new wl_keyboard: {e}"),
    }
    // `fd` (the duplicated keymap fd) drops here, closing this frontend's copy.
}

impl wayland_server::Dispatch<WlPointer, ()> for State {
    fn request(
        state: &mut State,
        _client: &Client,
        _resource: &WlPointer,
        request: wl_pointer::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        if let wl_pointer::Request::SetCursor { surface, .. } = request {
            if let Some(surface) = surface {
                if let Some(data) = surface.data::<SurfaceData>() {
                    state.facade.set_cursor(data.sid);
                }
            }
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
            .with_lock(|c| c.remove_general_resource(GeneralResourceKind::Pointer, &resource));
    }
}

impl wayland_server::Dispatch<WlKeyboard, ()> for State {
    fn request(
        _state: &mut State,
        _client: &Client,
        _resource: &WlKeyboard,
        request: wl_keyboard::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        if let wl_keyboard::Request::Release = request {}
    }

    fn destroyed(
        state: &mut State,
        _client: wayland_server::backend::ClientId,
        resource: wayland_server::backend::ObjectId,
        _data: &(),
    ) {
        state
            .cache
            .with_lock(|c| c.remove_general_resource(GeneralResourceKind::Keyboard, &resource));
    }
}
