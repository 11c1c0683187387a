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

//! `wl_shm` (Argb8888/Xrgb8888 only), `wl_shm_pool`, and `wl_buffer`. Pool
//! memory is mapped read-only; a buffer's pixel bytes are sliced out of the
//! pool's mapping on attach and handed to the Coordinator by value, so a
//! pool resize or destroy after attach can't invalidate data already
//! passed on.

use std::sync::Arc;
use std::sync::Mutex;

use memmap2::Mmap;
use wayland_server::Client;
use wayland_server::DataInit;
use wayland_server::DisplayHandle;
use wayland_server::GlobalDispatch;
use wayland_server::New;
use wayland_server::backend::GlobalId;
use wayland_server::protocol::wl_buffer;
use wayland_server::protocol::wl_buffer::WlBuffer;
use wayland_server::protocol::wl_shm;
use wayland_server::protocol::wl_shm::WlShm;
use wayland_server::protocol::wl_shm_pool;
use wayland_server::protocol::wl_shm_pool::WlShmPool;

use crate::bindings::State;
use crate::prelude::*;

pub const SHM_VERSION: u32 = 1;

struct PoolInner {
    map: Mmap,
}

pub struct PoolData {
    inner: Mutex<PoolInner>,
}

/// Attached to every `wl_buffer` created from a pool: enough to slice its
/// bytes back out and to report dimensions to `wl_surface.attach`.
pub struct BufferData {
    pool: Arc<PoolData>,
    pub offset: i32,
    pub width: i32,
    pub height: i32,
    pub stride: i32,
}

impl BufferData {
    pub fn dims(&self) -> (i32, i32, i32) {
        (self.width, self.height, self.stride)
    }

    pub fn bytes(&self) -> Vec<u8> {
        let inner = self.inner_lock();
        let start = self.offset as usize;
        let len = (self.stride * self.height).max(0) as usize;
        inner
            .map
            .get(start..start + len)
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }

    fn inner_lock(&self) -> std::sync::MutexGuard<'_, PoolInner> {
        self.pool.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn register_global(dh: &DisplayHandle) -> GlobalId {
    dh.create_global::<State, WlShm, _>(SHM_VERSION, ())
}

impl GlobalDispatch<WlShm, ()> for State {
    fn bind(
        _state: &mut State,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlShm>,
        _global_data: &(),
        data_init: &mut DataInit<'_, State>,
    ) {
        let shm = data_init.init(resource, ());
        shm.format(wl_shm::Format::Argb8888);
        shm.format(wl_shm::Format::Xrgb8888);
    }
}

impl wayland_server::Dispatch<WlShm, ()> for State {
    fn request(
        _state: &mut State,
        _client: &Client,
        _resource: &WlShm,
        request: wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, State>,
    ) {
        if let wl_shm::Request::CreatePool { id, fd, size } = request {
            let file = std::fs::File::from(fd);
            let map = match unsafe { Mmap::map(&file) } {
                Ok(map) if map.len() >= size.max(0) as usize => map,
                Ok(_) => {
                    warn!("create_pool: fd smaller than advertised size {size}");
                    return;
                },
                Err(e) => {
                    warn!("create_pool: failed to mmap shm fd: {e}");
                    return;
                },
            };
            data_init.init(id, Arc::new(PoolData {
                inner: Mutex::new(PoolInner { map }),
            }));
        }
    }
}

impl wayland_server::Dispatch<WlShmPool, Arc<PoolData>> for State {
    fn request(
        _state: &mut State,
        _client: &Client,
        _resource: &WlShmPool,
        request: wl_shm_pool::Request,
        data: &Arc<PoolData>,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, State>,
    ) {
        match request {
            wl_shm_pool::Request::CreateBuffer {
                id,
                offset,
                width,
                height,
                stride,
                format: _,
            } => {
                data_init.init(id, BufferData {
                    pool: data.clone(),
                    offset,
                    width,
                    height,
                    stride,
                });
            },
            wl_shm_pool::Request::Resize { size } => {
                let _ = size;
                // Growing the mapping in place would require re-mmap'ing
                // with the same fd, which wl_shm_pool.resize doesn't carry;
                // buffers created before a resize keep their original map.
            },
            wl_shm_pool::Request::Destroy => {},
            _ => {},
        }
    }
}

#[cfg(test)]
pub(crate) fn test_buffer_data(bytes: &[u8], width: i32, height: i32, stride: i32) -> BufferData {
    use std::io::Write;

    let mut file = tempfile::tempfile().expect("failed to create test shm backing file");
    file.write_all(bytes).expect("failed to write test shm bytes");
    let map = unsafe { Mmap::map(&file) }.expect("failed to mmap test shm file");
    BufferData {
        pool: Arc::new(PoolData {
            inner: Mutex::new(PoolInner { map }),
        }),
        offset: 0,
        width,
        height,
        stride,
    }
}

impl wayland_server::Dispatch<WlBuffer, BufferData> for State {
    fn request(
        _state: &mut State,
        _client: &Client,
        _resource: &WlBuffer,
        request: wl_buffer::Request,
        _data: &BufferData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, State>,
    ) {
        if let wl_buffer::Request::Destroy = request {
            // Destruction is observed by the client dropping the proxy;
            // release() is sent explicitly by the Gateway on screen_refresh.
        }
    }
}
