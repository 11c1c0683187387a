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

use std::env;
use std::path::Path;
use std::path::PathBuf;

use wayland_scanner::Side;

fn main() {
    let out_dir: PathBuf = env::var_os("OUT_DIR").unwrap().into();
    let protocol = Path::new("protocols/screenshooter.xml");

    println!("cargo:rerun-if-changed={}", protocol.display());

    wayland_scanner::generate_code(
        protocol,
        out_dir.join("screenshooter_server_api.rs"),
        Side::Server,
    );
}
