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

//! The Cache: the only component holding shared mutable state. A
//! thread-safe store of per-surface resource bundles, regions, and
//! per-kind general resource lists, all behind one cache-wide lock.
//!
//! The Facade acquires the lock, does one atomic unit of work, releases.
//! The Gateway acquires the lock, iterates, emits events, releases. Nothing
//! in this module calls out to protocol resources directly; it only stores
//! and hands back handles.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;

use wayland_protocols::unstable::xdg_shell::v5::server::xdg_surface::XdgSurface;
use wayland_server::Resource;
use wayland_server::backend::ClientId;
use wayland_server::backend::ObjectId;
use wayland_server::protocol::wl_buffer::WlBuffer;
use wayland_server::protocol::wl_callback::WlCallback;
use wayland_server::protocol::wl_data_device::WlDataDevice;
use wayland_server::protocol::wl_keyboard::WlKeyboard;
use wayland_server::protocol::wl_pointer::WlPointer;
use wayland_server::protocol::wl_shell_surface::WlShellSurface;
use wayland_server::protocol::wl_surface::WlSurface;

use crate::containers::OrderedList;
use crate::containers::Registry;
use crate::containers::ScopedMutex;
use crate::ids::IdAllocator;
use crate::ids::RegionId;
use crate::ids::SurfaceId;
use crate::keyboard_state::KeyboardState;
use crate::prelude::*;

/// Which slot of a `SurfaceRecord` a resource occupies. `Frame` is the only
/// kind backed by a queue rather than a single slot (Qt-class clients
/// register two frame callbacks per commit).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SurfaceResourceKind {
    Surface,
    Buffer,
    Frame,
    ShellSurface,
    XdgShellSurface,
}

/// A protocol resource bound into one of a surface's fixed slots.
#[derive(Clone, Debug)]
pub enum SurfaceResource {
    Surface(WlSurface),
    Buffer(WlBuffer),
    Frame(WlCallback),
    ShellSurface(WlShellSurface),
    XdgShellSurface(XdgSurface),
}

impl SurfaceResource {
    pub fn kind(&self) -> SurfaceResourceKind {
        match self {
            Self::Surface(_) => SurfaceResourceKind::Surface,
            Self::Buffer(_) => SurfaceResourceKind::Buffer,
            Self::Frame(_) => SurfaceResourceKind::Frame,
            Self::ShellSurface(_) => SurfaceResourceKind::ShellSurface,
            Self::XdgShellSurface(_) => SurfaceResourceKind::XdgShellSurface,
        }
    }

    pub fn object_id(&self) -> ObjectId {
        match self {
            Self::Surface(r) => r.id(),
            Self::Buffer(r) => r.id(),
            Self::Frame(r) => r.id(),
            Self::ShellSurface(r) => r.id(),
            Self::XdgShellSurface(r) => r.id(),
        }
    }
}

/// One per live surface id. A fixed-slot table plus a frame-callback queue.
#[derive(Clone, Debug, Default)]
pub struct SurfaceRecord {
    pub surface: Option<WlSurface>,
    pub buffer: Option<WlBuffer>,
    pub frames: VecDeque<WlCallback>,
    pub shell_surface: Option<WlShellSurface>,
    pub xdg_shell_surface: Option<XdgSurface>,
}

impl SurfaceRecord {
    /// Writes `resource` into its slot. Writing an occupied non-frame slot
    /// replaces it and logs a warning; frame resources are always pushed
    /// onto the back of the queue.
    fn add_resource(&mut self, resource: SurfaceResource) {
        match resource {
            SurfaceResource::Surface(r) => {
                if self.surface.is_some() {
                    warn!("surface slot already occupied, overwriting");
                }
                self.surface = Some(r);
            },
            SurfaceResource::Buffer(r) => {
                if self.buffer.is_some() {
                    warn!("buffer slot already occupied, overwriting");
                }
                self.buffer = Some(r);
            },
            SurfaceResource::Frame(r) => self.frames.push_back(r),
            SurfaceResource::ShellSurface(r) => {
                if self.shell_surface.is_some() {
                    warn!("shell_surface slot already occupied, overwriting");
                }
                self.shell_surface = Some(r);
            },
            SurfaceResource::XdgShellSurface(r) => {
                if self.xdg_shell_surface.is_some() {
                    warn!("xdg_shell_surface slot already occupied, overwriting");
                }
                self.xdg_shell_surface = Some(r);
            },
        }
    }

    /// Clears the slot matching `object_id`. For `frame`, pops it out of
    /// the queue wherever it sits (it may not be at the front).
    fn remove_resource(&mut self, kind: SurfaceResourceKind, object_id: &ObjectId) {
        match kind {
            SurfaceResourceKind::Surface => {
                if self.surface.as_ref().map(Resource::id).as_ref() == Some(object_id) {
                    self.surface = None;
                }
            },
            SurfaceResourceKind::Buffer => {
                if self.buffer.as_ref().map(Resource::id).as_ref() == Some(object_id) {
                    self.buffer = None;
                }
            },
            SurfaceResourceKind::Frame => {
                self.frames.retain(|f| &f.id() != object_id);
            },
            SurfaceResourceKind::ShellSurface => {
                if self.shell_surface.as_ref().map(Resource::id).as_ref() == Some(object_id) {
                    self.shell_surface = None;
                }
            },
            SurfaceResourceKind::XdgShellSurface => {
                if self.xdg_shell_surface.as_ref().map(Resource::id).as_ref() == Some(object_id) {
                    self.xdg_shell_surface = None;
                }
            },
        }
    }
}

/// An axis-aligned rectangle. "Add rectangle" inflates to the bounding box
/// of old union new; subtraction is accepted but not implemented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionRecord {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl RegionRecord {
    pub fn inflate(&mut self, x: i32, y: i32, w: i32, h: i32) {
        if self.w == 0 && self.h == 0 {
            *self = Self { x, y, w, h };
            return;
        }
        let min_x = self.x.min(x);
        let min_y = self.y.min(y);
        let max_x = (self.x + self.w).max(x + w);
        let max_y = (self.y + self.h).max(y + h);
        *self = Self {
            x: min_x,
            y: min_y,
            w: max_x - min_x,
            h: max_y - min_y,
        };
    }

    /// Valid iff both position components are strictly positive and both
    /// extents are positive. A region anchored at `(0,0)` is deliberately
    /// excluded by this rule, not an oversight.
    pub fn is_valid(&self) -> bool {
        self.x > 0 && self.y > 0 && self.w > 0 && self.h > 0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GeneralResourceKind {
    Keyboard,
    Pointer,
    DataDevice,
    Other,
}

#[derive(Clone, Debug)]
pub enum GeneralResource {
    Keyboard(WlKeyboard),
    Pointer(WlPointer),
    DataDevice(WlDataDevice),
}

impl GeneralResource {
    pub fn kind(&self) -> GeneralResourceKind {
        match self {
            Self::Keyboard(_) => GeneralResourceKind::Keyboard,
            Self::Pointer(_) => GeneralResourceKind::Pointer,
            Self::DataDevice(_) => GeneralResourceKind::DataDevice,
        }
    }

    pub fn object_id(&self) -> ObjectId {
        match self {
            Self::Keyboard(r) => r.id(),
            Self::Pointer(r) => r.id(),
            Self::DataDevice(r) => r.id(),
        }
    }

    pub fn client_id(&self) -> Option<ClientId> {
        match self {
            Self::Keyboard(r) => r.client_id().ok(),
            Self::Pointer(r) => r.client_id().ok(),
            Self::DataDevice(r) => r.client_id().ok(),
        }
    }

    pub fn as_keyboard(&self) -> Option<&WlKeyboard> {
        match self {
            Self::Keyboard(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&WlPointer> {
        match self {
            Self::Pointer(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_data_device(&self) -> Option<&WlDataDevice> {
        match self {
            Self::DataDevice(r) => Some(r),
            _ => None,
        }
    }
}

/// A clipboard data source: a resource handle plus the MIME types it
/// offers. At most one current transfer exists on `FrontendState`.
#[derive(Clone, Debug)]
pub struct Transfer {
    pub source: wayland_server::protocol::wl_data_source::WlDataSource,
    pub mime_types: Vec<String>,
}

impl Transfer {
    pub fn new(source: wayland_server::protocol::wl_data_source::WlDataSource) -> Self {
        Self {
            source,
            mime_types: Vec::new(),
        }
    }
}

/// Singleton, Cache-peer state: the two input focuses, the active
/// clipboard transfer, and the keyboard state machine.
pub struct FrontendState {
    pub keyboard_focused_sid: SurfaceId,
    pub pointer_focused_sid: SurfaceId,
    pub current_transfer: Option<Transfer>,
    pub keyboard_state: KeyboardState,
}

impl fmt::Debug for FrontendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrontendState")
            .field("keyboard_focused_sid", &self.keyboard_focused_sid)
            .field("pointer_focused_sid", &self.pointer_focused_sid)
            .field("current_transfer", &self.current_transfer.is_some())
            .finish_non_exhaustive()
    }
}

struct CacheInner {
    surfaces: Registry<SurfaceId, SurfaceRecord>,
    regions: Registry<RegionId, RegionRecord>,
    region_ids: IdAllocator,
    general: HashMap<GeneralResourceKind, Vec<GeneralResource>>,
    /// Sibling order of subsurfaces, keyed by parent surface id.
    children: HashMap<SurfaceId, OrderedList<SurfaceId>>,
    frontend: FrontendState,
}

pub struct Cache {
    inner: ScopedMutex<CacheInner>,
}

impl Cache {
    pub fn new(keyboard_state: KeyboardState) -> Self {
        let mut general = HashMap::new();
        general.insert(GeneralResourceKind::Keyboard, Vec::new());
        general.insert(GeneralResourceKind::Pointer, Vec::new());
        general.insert(GeneralResourceKind::DataDevice, Vec::new());

        Self {
            inner: ScopedMutex::new(CacheInner {
                surfaces: Registry::new(),
                regions: Registry::new(),
                region_ids: IdAllocator::new(),
                general,
                children: HashMap::new(),
                frontend: FrontendState {
                    keyboard_focused_sid: SurfaceId::INVALID,
                    pointer_focused_sid: SurfaceId::INVALID,
                    current_transfer: None,
                    keyboard_state,
                },
            }),
        }
    }

    pub fn with_lock<R>(&self, f: impl FnOnce(&mut CacheTxn<'_>) -> R) -> R {
        self.inner.with_lock(|inner| {
            let mut txn = CacheTxn { inner };
            f(&mut txn)
        })
    }
}

/// The handle exposed inside a `Cache::with_lock` closure: every Cache
/// operation lives here as a method, so a Facade/Gateway transaction reads
/// as a single call to `cache.with_lock(|c| ...)`.
pub struct CacheTxn<'a> {
    inner: &'a mut CacheInner,
}

impl CacheTxn<'_> {
    pub fn create_surface(&mut self, sid: SurfaceId) {
        self.inner.surfaces.insert(sid, SurfaceRecord::default());
    }

    pub fn remove_surface(&mut self, sid: SurfaceId) {
        self.inner.surfaces.remove(&sid);
    }

    pub fn find_surface(&self, sid: SurfaceId) -> Option<&SurfaceRecord> {
        self.inner.surfaces.get(&sid)
    }

    pub fn find_surface_mut(&mut self, sid: SurfaceId) -> Option<&mut SurfaceRecord> {
        self.inner.surfaces.get_mut(&sid)
    }

    pub fn create_region(&mut self) -> RegionId {
        let rid = RegionId::new(self.inner.region_ids.alloc());
        self.inner.regions.insert(rid, RegionRecord::default());
        rid
    }

    pub fn find_region(&self, rid: RegionId) -> Option<&RegionRecord> {
        self.inner.regions.get(&rid)
    }

    pub fn inflate_region(&mut self, rid: RegionId, x: i32, y: i32, w: i32, h: i32) {
        let Some(region) = self.inner.regions.get_mut(&rid) else {
            warn!("inflate_region: unknown region {rid:?}");
            return;
        };
        region.inflate(x, y, w, h);
    }

    pub fn remove_region(&mut self, rid: RegionId) {
        self.inner.regions.remove(&rid);
    }

    pub fn add_surface_resource(&mut self, sid: SurfaceId, resource: SurfaceResource) {
        let Some(record) = self.inner.surfaces.get_mut(&sid) else {
            warn!("add_surface_resource: unknown surface {sid:?}");
            return;
        };
        record.add_resource(resource);
    }

    pub fn remove_surface_resource(
        &mut self,
        sid: SurfaceId,
        kind: SurfaceResourceKind,
        object_id: &ObjectId,
    ) {
        let Some(record) = self.inner.surfaces.get_mut(&sid) else {
            warn!("remove_surface_resource: unknown surface {sid:?}");
            return;
        };
        record.remove_resource(kind, object_id);
    }

    /// Pops the buffer slot and drains the frame queue, releasing the
    /// buffer only if at least one frame callback is waiting on it.
    pub fn take_buffer_and_front_frame(
        &mut self,
        sid: SurfaceId,
    ) -> Option<(Option<WlBuffer>, VecDeque<WlCallback>)> {
        let record = self.inner.surfaces.get_mut(&sid)?;
        let buffer = if !record.frames.is_empty() {
            record.buffer.take()
        } else {
            None
        };
        let frames = std::mem::take(&mut record.frames);
        Some((buffer, frames))
    }

    /// Finds `(client_id, surface resource)` for a surface id: the single
    /// most-called Cache helper.
    pub fn resource_for_sid(&self, sid: SurfaceId) -> Option<(ClientId, WlSurface)> {
        let record = self.inner.surfaces.get(&sid)?;
        let surface = record.surface.clone()?;
        let client_id = surface.client_id().ok()?;
        Some((client_id, surface))
    }

    pub fn add_general_resource(&mut self, resource: GeneralResource) {
        self.inner
            .general
            .entry(resource.kind())
            .or_default()
            .push(resource);
    }

    pub fn remove_general_resource(&mut self, kind: GeneralResourceKind, object_id: &ObjectId) {
        if let Some(list) = self.inner.general.get_mut(&kind) {
            list.retain(|r| &r.object_id() != object_id);
        }
    }

    pub fn get_resources(&self, kind: GeneralResourceKind) -> &[GeneralResource] {
        self.inner
            .general
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_child(&mut self, parent_sid: SurfaceId, child_sid: SurfaceId) {
        self.inner
            .children
            .entry(parent_sid)
            .or_default()
            .push_back(child_sid);
    }

    pub fn remove_child(&mut self, parent_sid: SurfaceId, child_sid: SurfaceId) {
        if let Some(list) = self.inner.children.get_mut(&parent_sid) {
            list.remove(&child_sid);
        }
    }

    pub fn place_child_above(&mut self, parent_sid: SurfaceId, sid: SurfaceId, sibling: SurfaceId) {
        if let Some(list) = self.inner.children.get_mut(&parent_sid) {
            list.place_above(&sid, &sibling);
        }
    }

    pub fn place_child_below(&mut self, parent_sid: SurfaceId, sid: SurfaceId, sibling: SurfaceId) {
        if let Some(list) = self.inner.children.get_mut(&parent_sid) {
            list.place_below(&sid, &sibling);
        }
    }

    pub fn children_of(&self, parent_sid: SurfaceId) -> &[SurfaceId] {
        self.inner
            .children
            .get(&parent_sid)
            .map(OrderedList::as_slice)
            .unwrap_or(&[])
    }

    pub fn frontend(&self) -> &FrontendState {
        &self.inner.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut FrontendState {
        &mut self.inner.frontend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache() -> Cache {
        Cache::new(KeyboardState::new().unwrap())
    }

    #[test]
    fn region_round_trip_inflate() {
        let cache = test_cache();
        cache.with_lock(|c| {
            let rid = c.create_region();
            c.inflate_region(rid, 1, 2, 3, 4);
            let r = c.find_region(rid).unwrap();
            assert_eq!((r.x, r.y, r.w, r.h), (1, 2, 3, 4));
        });
    }

    #[test]
    fn region_inflate_is_bounding_box_union() {
        let mut r1 = RegionRecord {
            x: 1,
            y: 1,
            w: 10,
            h: 10,
        };
        r1.inflate(5, 5, 20, 2);
        assert_eq!(r1, RegionRecord {
            x: 1,
            y: 1,
            w: 24,
            h: 10
        });
    }

    #[test]
    fn region_is_valid_requires_strictly_positive_position() {
        let r = RegionRecord {
            x: 0,
            y: 0,
            w: 10,
            h: 10,
        };
        assert!(!r.is_valid());
        let r = RegionRecord {
            x: 1,
            y: 1,
            w: 10,
            h: 10,
        };
        assert!(r.is_valid());
    }

    #[test]
    fn create_and_remove_surface_round_trip() {
        let cache = test_cache();
        let sid = SurfaceId::new(1);
        cache.with_lock(|c| {
            c.create_surface(sid);
            assert!(c.find_surface(sid).is_some());
            c.remove_surface(sid);
            assert!(c.find_surface(sid).is_none());
        });
    }
}
