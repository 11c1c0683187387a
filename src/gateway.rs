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

//! The Gateway: the single outbound API. Walks the Cache, emits protocol
//! events to the resources that match. Every method here acquires the
//! cache lock, iterates or snapshots, emits events, and releases — it must
//! never recursively re-enter via the Coordinator while the lock is held.

use wayland_protocols::unstable::xdg_shell::v5::server::xdg_surface;
use wayland_server::Resource;
use wayland_server::protocol::wl_data_device::WlDataDevice;
use wayland_server::protocol::wl_data_device_manager::DndAction;
use wayland_server::protocol::wl_data_offer::WlDataOffer;
use wayland_server::protocol::wl_keyboard::KeyState;
use wayland_server::protocol::wl_keyboard::WlKeyboard;
use wayland_server::protocol::wl_pointer::Axis;
use wayland_server::protocol::wl_pointer::ButtonState;
use wayland_server::protocol::wl_surface::WlSurface;

use crate::cache::Cache;
use crate::cache::GeneralResourceKind;
use crate::coordinator::SurfaceStateFlags;
use crate::engine::SerialSource;
use crate::ids::SurfaceId;
use crate::prelude::*;

/// Creates a new `wl_data_offer` resource for a client, at the negotiated
/// version of its `wl_data_device`. Bindings implement this: only the
/// module holding the concrete `Dispatch` state type can call
/// `Client::create_resource`, so the Gateway reaches it through this seam
/// instead of depending on the dispatch machinery directly.
pub trait DataOfferFactory: Send + Sync {
    fn create_data_offer(&self, device: &WlDataDevice) -> Option<WlDataOffer>;
}

pub struct Gateway {
    cache: std::sync::Arc<Cache>,
    serials: std::sync::Arc<dyn SerialSource>,
    offer_factory: std::sync::Arc<dyn DataOfferFactory>,
}

impl Gateway {
    pub fn new(
        cache: std::sync::Arc<Cache>,
        serials: std::sync::Arc<dyn SerialSource>,
        offer_factory: std::sync::Arc<dyn DataOfferFactory>,
    ) -> Self {
        Self {
            cache,
            serials,
            offer_factory,
        }
    }

    /// 1. Snapshot the frame queue. 2. If non-empty and a buffer slot is
    /// set, release that buffer and clear the slot. 3. Fire every queued
    /// frame callback in FIFO order, then destroy it.
    pub fn screen_refresh(&self, sid: SurfaceId, ms_since_monotonic_epoch: u32) {
        let Some((buffer, frames)) = self.cache.with_lock(|c| c.take_buffer_and_front_frame(sid))
        else {
            return;
        };

        if let Some(buffer) = buffer {
            buffer.release();
        }

        for frame in frames {
            frame.done(ms_since_monotonic_epoch);
        }
    }

    /// Sends an `enter` to a single just-bound keyboard resource that
    /// arrived after its client already held focus.
    pub fn enter_one_keyboard(&self, resource: &WlKeyboard, surface: &WlSurface) {
        let serial = self.serials.next_serial();
        resource.enter(serial, surface, Vec::new());
    }

    #[allow(clippy::too_many_arguments)]
    pub fn keyboard_focus_update(
        &self,
        old_sid: SurfaceId,
        old_size: (i32, i32),
        old_flags: SurfaceStateFlags,
        new_sid: SurfaceId,
        new_size: (i32, i32),
        new_flags: SurfaceStateFlags,
    ) {
        let old = self.cache.with_lock(|c| c.resource_for_sid(old_sid));
        let new = self.cache.with_lock(|c| c.resource_for_sid(new_sid));

        let old_client = old.as_ref().map(|(cid, _)| *cid);
        let new_client = new.as_ref().map(|(cid, _)| *cid);

        if old_client != new_client {
            let leave_serial = self.serials.next_serial();
            let enter_serial = self.serials.next_serial();

            self.cache.with_lock(|c| {
                c.frontend_mut().keyboard_focused_sid = SurfaceId::INVALID;

                for resource in c.get_resources(GeneralResourceKind::Keyboard) {
                    let Some(keyboard) = resource.as_keyboard() else {
                        continue;
                    };
                    let Ok(client) = keyboard.client_id() else {
                        continue;
                    };
                    if Some(client) == old_client {
                        if let Some((_, ref old_rc)) = old {
                            keyboard.leave(leave_serial, old_rc);
                        }
                    } else if Some(client) == new_client {
                        if let Some((_, ref new_rc)) = new {
                            keyboard.enter(enter_serial, new_rc, Vec::new());
                        }
                    }
                }

                c.frontend_mut().keyboard_focused_sid = new_sid;
            });
        }

        self.send_selection(&self.cache);

        self.surface_reconfigured(old_sid, old_size, old_flags);
        self.surface_reconfigured(new_sid, new_size, new_flags);
    }

    pub fn key(&self, time: u32, code: u32, pressed: bool) {
        let (before, after) = self
            .cache
            .with_lock(|c| c.frontend_mut().keyboard_state.update_key(code, pressed));
        let mods_changed = before != after;

        let focused_sid = self.cache.with_lock(|c| c.frontend().keyboard_focused_sid);
        if !focused_sid.is_valid() {
            return;
        }
        let Some((focused_client, _)) = self.cache.with_lock(|c| c.resource_for_sid(focused_sid))
        else {
            return;
        };

        let state = if pressed {
            KeyState::Pressed
        } else {
            KeyState::Released
        };

        let serial = self.serials.next_serial();
        self.cache.with_lock(|c| {
            for resource in c.get_resources(GeneralResourceKind::Keyboard) {
                let Some(keyboard) = resource.as_keyboard() else {
                    continue;
                };
                let Ok(client) = keyboard.client_id() else {
                    continue;
                };
                if client != focused_client {
                    continue;
                }
                keyboard.key(serial, time, code, state);
                if mods_changed {
                    keyboard.modifiers(
                        serial,
                        after.depressed,
                        after.latched,
                        after.locked,
                        after.group,
                    );
                }
            }
        });
    }

    pub fn pointer_focus_update(&self, new_sid: SurfaceId, x: f64, y: f64) {
        let old_sid = self.cache.with_lock(|c| c.frontend().pointer_focused_sid);
        let old = self.cache.with_lock(|c| c.resource_for_sid(old_sid));
        let new = self.cache.with_lock(|c| c.resource_for_sid(new_sid));

        let old_client = old.as_ref().map(|(cid, _)| *cid);
        let new_client = new.as_ref().map(|(cid, _)| *cid);

        if old_client == new_client {
            return;
        }

        let leave_serial = self.serials.next_serial();
        let enter_serial = self.serials.next_serial();

        self.cache.with_lock(|c| {
            c.frontend_mut().pointer_focused_sid = SurfaceId::INVALID;

            for resource in c.get_resources(GeneralResourceKind::Pointer) {
                let Some(pointer) = resource.as_pointer() else {
                    continue;
                };
                let Ok(client) = pointer.client_id() else {
                    continue;
                };
                if Some(client) == old_client {
                    if let Some((_, ref old_rc)) = old {
                        pointer.leave(leave_serial, old_rc);
                    }
                } else if Some(client) == new_client {
                    if let Some((_, ref new_rc)) = new {
                        pointer.enter(
                            enter_serial,
                            new_rc,
                            wayland_server::Fixed::from(x),
                            wayland_server::Fixed::from(y),
                        );
                    }
                }
            }

            c.frontend_mut().pointer_focused_sid = new_sid;
        });
    }

    pub fn pointer_motion(&self, sid: SurfaceId, x: f64, y: f64, ms: u32) {
        let Some((client, _)) = self.cache.with_lock(|c| c.resource_for_sid(sid)) else {
            return;
        };
        self.cache.with_lock(|c| {
            for resource in c.get_resources(GeneralResourceKind::Pointer) {
                let Some(pointer) = resource.as_pointer() else {
                    continue;
                };
                if pointer.client_id().ok() != Some(client) {
                    continue;
                }
                pointer.motion(
                    ms,
                    wayland_server::Fixed::from(x),
                    wayland_server::Fixed::from(y),
                );
            }
        });
    }

    pub fn pointer_button(&self, time: u32, button: u32, pressed: bool) {
        let focused_sid = self.cache.with_lock(|c| c.frontend().pointer_focused_sid);
        if !focused_sid.is_valid() {
            return;
        }
        let Some((focused_client, _)) = self.cache.with_lock(|c| c.resource_for_sid(focused_sid))
        else {
            return;
        };
        let state = if pressed {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        };

        self.cache.with_lock(|c| {
            for resource in c.get_resources(GeneralResourceKind::Pointer) {
                let Some(pointer) = resource.as_pointer() else {
                    continue;
                };
                if pointer.client_id().ok() != Some(focused_client) {
                    continue;
                }
                let serial = self.serials.next_serial();
                pointer.button(serial, time, button, state);
            }
        });
    }

    /// Per axis: a non-zero discrete value sends `axis_discrete`; otherwise
    /// a non-zero continuous value sends `axis`, a zero value sends
    /// `axis_stop`.
    pub fn pointer_axis(&self, horiz: f64, vert: f64, horiz_discrete: i32, vert_discrete: i32) {
        let focused_sid = self.cache.with_lock(|c| c.frontend().pointer_focused_sid);
        if !focused_sid.is_valid() {
            return;
        }
        let Some((focused_client, _)) = self.cache.with_lock(|c| c.resource_for_sid(focused_sid))
        else {
            return;
        };

        self.cache.with_lock(|c| {
            for resource in c.get_resources(GeneralResourceKind::Pointer) {
                let Some(pointer) = resource.as_pointer() else {
                    continue;
                };
                if pointer.client_id().ok() != Some(focused_client) {
                    continue;
                }
                emit_one_axis(pointer, Axis::HorizontalScroll, horiz, horiz_discrete);
                emit_one_axis(pointer, Axis::VerticalScroll, vert, vert_discrete);
            }
        });
    }

    /// If the surface owns a `shell_surface` slot, send its `configure`.
    /// Else if it owns an `xdg_shell_surface` slot, build the XDG state
    /// array (maximized / activated) and send its `configure`.
    pub fn surface_reconfigured(
        &self,
        sid: SurfaceId,
        (w, h): (i32, i32),
        state_flags: SurfaceStateFlags,
    ) {
        if !sid.is_valid() {
            return;
        }
        let is_focused = self.cache.with_lock(|c| c.frontend().keyboard_focused_sid) == sid;

        self.cache.with_lock(|c| {
            let Some(record) = c.find_surface(sid) else {
                return;
            };
            if let Some(shell_surface) = record.shell_surface.clone() {
                shell_surface.configure(
                    wayland_server::protocol::wl_shell_surface::Resize::None,
                    w,
                    h,
                );
            } else if let Some(xdg_surface) = record.xdg_shell_surface.clone() {
                let states_bytes = xdg_configure_states(state_flags, is_focused);
                let serial = self.serials.next_serial();
                xdg_surface.configure(w, h, states_bytes, serial);
            }
        });
    }

    /// With the cache locked: if no current transfer, no-op. Otherwise for
    /// each `data_device` resource of the keyboard-focused client, offer
    /// the transfer's MIME types and announce the selection.
    pub fn send_selection(&self, cache: &Cache) {
        cache.with_lock(|c| {
            let Some(transfer) = c.frontend().current_transfer.clone() else {
                return;
            };
            let focused_sid = c.frontend().keyboard_focused_sid;
            let Some((focused_client, _)) = c.resource_for_sid(focused_sid) else {
                return;
            };

            for resource in c.get_resources(GeneralResourceKind::DataDevice) {
                let Some(device) = resource.as_data_device() else {
                    continue;
                };
                let Ok(client) = device.client_id() else {
                    continue;
                };
                if client != focused_client {
                    continue;
                }

                let Some(offer) = self.offer_factory.create_data_offer(device) else {
                    warn!("send_selection: failed to create data_offer resource");
                    continue;
                };

                device.data_offer(&offer);
                for mime in &transfer.mime_types {
                    offer.offer(mime.clone());
                }
                offer.action(DndAction::Copy);
                device.selection(Some(&offer));
            }
        });
    }
}

/// Builds the `xdg_surface.configure` state array: Maximized (1) when the
/// surface carries that flag, Activated (4) when it holds keyboard focus.
fn xdg_configure_states(flags: SurfaceStateFlags, is_focused: bool) -> Vec<u8> {
    let mut states = Vec::new();
    if flags.contains(SurfaceStateFlags::MAXIMIZED) {
        states.push(xdg_surface::State::Maximized as u32);
    }
    if is_focused {
        states.push(xdg_surface::State::Activated as u32);
    }
    states.iter().flat_map(|s| s.to_ne_bytes()).collect()
}

fn emit_one_axis(
    pointer: &wayland_server::protocol::wl_pointer::WlPointer,
    axis: Axis,
    continuous: f64,
    discrete: i32,
) {
    if discrete != 0 {
        pointer.axis_discrete(axis, discrete);
    } else if continuous != 0.0 {
        pointer.axis(0, axis, wayland_server::Fixed::from(continuous));
    } else {
        pointer.axis_stop(0, axis);
    }
}

/// Test doubles shared with `facade`'s test module — same role as
/// `coordinator::test_double`, one level down the call chain.
#[cfg(test)]
pub mod test_double {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use super::*;

    /// Never offers a clipboard transfer; `send_selection` just skips every
    /// matching resource with a warning.
    pub struct NoOpOfferFactory;

    impl DataOfferFactory for NoOpOfferFactory {
        fn create_data_offer(&self, _device: &WlDataDevice) -> Option<WlDataOffer> {
            None
        }
    }

    /// A `SerialSource` that also counts how many serials it has handed
    /// out, so a test can assert a call site shares one serial across a
    /// loop instead of minting one per iteration.
    #[derive(Default)]
    pub struct CountingSerialSource {
        next: AtomicU32,
        calls: AtomicU32,
    }

    impl CountingSerialSource {
        pub fn new() -> Self {
            Self {
                next: AtomicU32::new(1),
                calls: AtomicU32::new(0),
            }
        }

        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl SerialSource for CountingSerialSource {
        fn next_serial(&self) -> u32 {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.next.fetch_add(1, Ordering::Relaxed)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_double::CountingSerialSource;
    use super::test_double::NoOpOfferFactory;
    use super::*;
    use crate::bindings::compositor::SurfaceData;
    use crate::cache::GeneralResource;
    use crate::cache::SurfaceResource;
    use crate::keyboard_state::KeyboardState;
    use crate::test_support::TestServer;

    fn test_cache() -> Arc<Cache> {
        Arc::new(Cache::new(KeyboardState::new().unwrap()))
    }

    #[test]
    fn xdg_configure_states_uses_correct_maximized_constant() {
        let bytes = xdg_configure_states(SurfaceStateFlags::MAXIMIZED, false);
        assert_eq!(bytes, 1u32.to_ne_bytes().to_vec());
    }

    #[test]
    fn xdg_configure_states_includes_activated_when_focused() {
        let bytes = xdg_configure_states(SurfaceStateFlags::empty(), true);
        assert_eq!(bytes, 4u32.to_ne_bytes().to_vec());
    }

    #[test]
    fn xdg_configure_states_combines_both_flags_in_order() {
        let bytes = xdg_configure_states(SurfaceStateFlags::MAXIMIZED, true);
        let expected: Vec<u8> = [1u32, 4u32].iter().flat_map(|s| s.to_ne_bytes()).collect();
        assert_eq!(bytes, expected);
    }

    /// Regression test for the Minor review fix: `key` must mint one
    /// serial for the whole call, shared across every matching resource,
    /// unlike `pointer_button` which mints one per resource.
    #[test]
    fn key_shares_one_serial_across_focused_clients_keyboards() {
        let cache = test_cache();
        let server = TestServer::new();
        let client = server.client().clone();

        let sid = SurfaceId::new(1);
        cache.with_lock(|c| c.create_surface(sid));
        let surface: WlSurface =
            server.create_resource_for(&client, 1, SurfaceData { sid });
        cache.with_lock(|c| {
            c.add_surface_resource(sid, SurfaceResource::Surface(surface));
            c.frontend_mut().keyboard_focused_sid = sid;
        });

        let kb1: WlKeyboard = server.create_resource_for(&client, 1, ());
        let kb2: WlKeyboard = server.create_resource_for(&client, 1, ());
        cache.with_lock(|c| {
            c.add_general_resource(GeneralResource::Keyboard(kb1));
            c.add_general_resource(GeneralResource::Keyboard(kb2));
        });

        let serials = Arc::new(CountingSerialSource::new());
        let gateway = Gateway::new(
            cache,
            serials.clone() as Arc<dyn SerialSource>,
            Arc::new(NoOpOfferFactory),
        );

        // KEY_LEFTSHIFT (evdev 42): a real modifier change, so `key` also
        // sends `modifiers` — still sharing the one serial minted above.
        gateway.key(1000, 42, true);

        assert_eq!(serials.call_count(), 1);
    }

    /// Focus hand-off between two distinct clients. Keyboard focus must
    /// end up on the new surface, and walking both clients' keyboard
    /// resources during the transition must not panic or misattribute an
    /// `enter`/`leave` to the wrong client.
    #[test]
    fn keyboard_focus_update_moves_focus_to_new_clients_surface() {
        let cache = test_cache();
        let mut server = TestServer::new();
        let client_a = server.client().clone();
        let client_b = server.add_client();

        let sid_a = SurfaceId::new(1);
        let sid_b = SurfaceId::new(2);
        cache.with_lock(|c| {
            c.create_surface(sid_a);
            c.create_surface(sid_b);
        });

        let surface_a: WlSurface =
            server.create_resource_for(&client_a, 1, SurfaceData { sid: sid_a });
        let surface_b: WlSurface =
            server.create_resource_for(&client_b, 1, SurfaceData { sid: sid_b });
        cache.with_lock(|c| {
            c.add_surface_resource(sid_a, SurfaceResource::Surface(surface_a));
            c.add_surface_resource(sid_b, SurfaceResource::Surface(surface_b));
            c.frontend_mut().keyboard_focused_sid = sid_a;
        });

        let kb_a: WlKeyboard = server.create_resource_for(&client_a, 1, ());
        let kb_b: WlKeyboard = server.create_resource_for(&client_b, 1, ());
        cache.with_lock(|c| {
            c.add_general_resource(GeneralResource::Keyboard(kb_a));
            c.add_general_resource(GeneralResource::Keyboard(kb_b));
        });

        let serials = Arc::new(CountingSerialSource::new());
        let gateway = Gateway::new(
            cache.clone(),
            serials as Arc<dyn SerialSource>,
            Arc::new(NoOpOfferFactory),
        );

        gateway.keyboard_focus_update(
            sid_a,
            (0, 0),
            SurfaceStateFlags::empty(),
            sid_b,
            (0, 0),
            SurfaceStateFlags::empty(),
        );

        assert_eq!(cache.with_lock(|c| c.frontend().keyboard_focused_sid), sid_b);
    }
}
