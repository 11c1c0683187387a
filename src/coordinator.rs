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

//! The external interface consumed from the Coordinator: the compositor's
//! scene-graph and window-manager core. It lives outside this crate; the
//! `Coordinator` trait here is the minimal surface the Facade needs to
//! drive it. Calls happen with the cache lock released, never nested
//! inside a `cache.with_lock` closure.

use bitflags::bitflags;

use crate::ids::SurfaceId;
use crate::prelude::*;

bitflags! {
    /// Reasons a surface becomes "shown"; `surface_show` takes a union.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ShowReason: u32 {
        const DRAWABLE = 0b01;
        const IN_SHELL = 0b10;
    }
}

bitflags! {
    /// Per-surface state flags carried into `surface_reconfigured`.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct SurfaceStateFlags: u32 {
        const MAXIMIZED = 0b01;
        const ACTIVATED = 0b10;
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Size {
    pub w: i32,
    pub h: i32,
}

/// Opaque handle for a buffer's backing pixels, returned later via
/// frame-release. The Coordinator defines what it actually points to.
pub type BufferRc = u64;

/// The minimal surface the Facade needs, per the external-interfaces
/// section of the design: surface lifecycle, attach/commit, show/hide,
/// geometry, parenting, and cursor designation.
pub trait Coordinator: Send + Sync {
    fn surface_create(&self) -> SurfaceId;
    fn surface_destroy(&self, sid: SurfaceId);
    fn surface_attach(&self, sid: SurfaceId, w: i32, h: i32, stride: i32, data: &[u8]) -> BufferRc;
    fn surface_commit(&self, sid: SurfaceId);
    fn surface_show(&self, sid: SurfaceId, reason: ShowReason);
    fn surface_set_offset(&self, sid: SurfaceId, pos: Position);
    fn surface_set_requested_size(&self, sid: SurfaceId, size: Size);
    fn surface_reset_offset_and_requested_size(&self, sid: SurfaceId);
    fn surface_set_relative_position(&self, sid: SurfaceId, pos: Position);
    fn surface_relate(&self, sid: SurfaceId, parent_sid: SurfaceId);
    fn surface_set_as_cursor(&self, sid: SurfaceId);
}

/// In-memory `Coordinator` double used by unit tests: records every call so
/// assertions can check exactly-once invariants without a real scene graph.
#[cfg(test)]
pub mod test_double {
    use std::sync::Mutex;

    use super::*;
    use crate::ids::IdAllocator;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        SurfaceCreate(SurfaceId),
        SurfaceDestroy(SurfaceId),
        SurfaceAttach {
            sid: SurfaceId,
            w: i32,
            h: i32,
            stride: i32,
        },
        SurfaceCommit(SurfaceId),
        SurfaceShow(SurfaceId, ShowReason),
        SurfaceSetOffset(SurfaceId, Position),
        SurfaceSetRequestedSize(SurfaceId, Size),
        SurfaceResetOffsetAndRequestedSize(SurfaceId),
        SurfaceSetRelativePosition(SurfaceId, Position),
        SurfaceRelate(SurfaceId, SurfaceId),
        SurfaceSetAsCursor(SurfaceId),
    }

    #[derive(Default)]
    pub struct RecordingCoordinator {
        ids: IdAllocator,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingCoordinator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        fn push(&self, call: Call) {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(call);
        }
    }

    impl Coordinator for RecordingCoordinator {
        fn surface_create(&self) -> SurfaceId {
            let sid = SurfaceId::new(self.ids.alloc());
            self.push(Call::SurfaceCreate(sid));
            sid
        }

        fn surface_destroy(&self, sid: SurfaceId) {
            self.push(Call::SurfaceDestroy(sid));
        }

        fn surface_attach(
            &self,
            sid: SurfaceId,
            w: i32,
            h: i32,
            stride: i32,
            _data: &[u8],
        ) -> BufferRc {
            self.push(Call::SurfaceAttach { sid, w, h, stride });
            0
        }

        fn surface_commit(&self, sid: SurfaceId) {
            self.push(Call::SurfaceCommit(sid));
        }

        fn surface_show(&self, sid: SurfaceId, reason: ShowReason) {
            self.push(Call::SurfaceShow(sid, reason));
        }

        fn surface_set_offset(&self, sid: SurfaceId, pos: Position) {
            self.push(Call::SurfaceSetOffset(sid, pos));
        }

        fn surface_set_requested_size(&self, sid: SurfaceId, size: Size) {
            self.push(Call::SurfaceSetRequestedSize(sid, size));
        }

        fn surface_reset_offset_and_requested_size(&self, sid: SurfaceId) {
            self.push(Call::SurfaceResetOffsetAndRequestedSize(sid));
        }

        fn surface_set_relative_position(&self, sid: SurfaceId, pos: Position) {
            self.push(Call::SurfaceSetRelativePosition(sid, pos));
        }

        fn surface_relate(&self, sid: SurfaceId, parent_sid: SurfaceId) {
            self.push(Call::SurfaceRelate(sid, parent_sid));
        }

        fn surface_set_as_cursor(&self, sid: SurfaceId) {
            self.push(Call::SurfaceSetAsCursor(sid));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_double::Call;
    use super::test_double::RecordingCoordinator;
    use super::*;

    #[test]
    fn recording_coordinator_logs_exactly_one_create_and_commit() {
        let coordinator = RecordingCoordinator::new();
        let sid = coordinator.surface_create();
        coordinator.surface_commit(sid);
        let calls = coordinator.calls();
        assert_eq!(
            calls
                .iter()
                .filter(|c| matches!(c, Call::SurfaceCommit(s) if *s == sid))
                .count(),
            1
        );
    }
}
