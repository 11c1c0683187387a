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

//! Server-side bindings generated by `wayland-scanner` (see `build.rs`) for
//! the one interface this frontend doesn't get from `wayland-protocols`:
//! `screenshooter`.

#![allow(dead_code, non_camel_case_types, unused_unsafe, unused_variables)]
#![allow(non_upper_case_globals, non_snake_case, unused_imports)]
#![allow(clippy::all)]

use wayland_server;
use wayland_server::backend;
use wayland_server::protocol::wl_buffer;
use wayland_server::protocol::wl_output;

include!(concat!(env!("OUT_DIR"), "/screenshooter_server_api.rs"));
