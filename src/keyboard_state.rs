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

//! Keyboard State: a thin wrapper around an xkbcommon keymap/state machine.
//! Owns the one keymap the frontend hands out to every bound `wl_keyboard`
//! resource, and tracks the live modifier state as keys arrive.

use std::os::fd::AsFd;
use std::os::fd::OwnedFd;

use nix::sys::memfd::MFdFlags;
use nix::sys::memfd::memfd_create;
use nix::unistd;
use xkbcommon::xkb;

use crate::prelude::*;

/// A modifier snapshot, carried verbatim into `wl_keyboard.modifiers`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ModifierState {
    pub depressed: u32,
    pub latched: u32,
    pub locked: u32,
    pub group: u32,
}

/// `{format, size, fd}`, immutable after construction, sent to every newly
/// bound keyboard resource via `wl_keyboard.keymap`.
pub struct KeymapSettings {
    pub format: u32,
    pub size: u32,
    pub fd: OwnedFd,
}

impl KeymapSettings {
    fn from_keymap(keymap: &xkb::Keymap) -> Result<Self> {
        let keymap_str = keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1);
        let bytes = keymap_str.as_bytes();
        let size = (bytes.len() + 1) as u32;

        let fd = memfd_create(c"wl-frontend-keymap", MFdFlags::empty()).location(loc!())?;
        unistd::ftruncate(&fd, size as i64).location(loc!())?;
        unistd::write(&fd, bytes).location(loc!())?;
        unistd::write(&fd, &[0u8]).location(loc!())?;

        Ok(Self {
            // XKB_KEYMAP_FORMAT_TEXT_V1, the only format wl_keyboard speaks.
            format: 1,
            size,
            fd,
        })
    }

    pub fn dup_fd(&self) -> Result<OwnedFd> {
        self.fd.as_fd().try_clone_to_owned().location(loc!())
    }
}

pub struct KeyboardState {
    context: xkb::Context,
    keymap: xkb::Keymap,
    state: xkb::State,
    settings: KeymapSettings,
}

impl KeyboardState {
    /// Builds the default keymap (evdev rules, empty model/layout/variant/
    /// options — i.e. whatever `xkb_rule_names::default()` resolves to).
    pub fn new() -> Result<Self> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_names(
            &context,
            &xkb::RuleNames::default(),
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| anyhow!("xkbcommon failed to compile the default keymap"))?;
        let state = xkb::State::new(&keymap);
        let settings = KeymapSettings::from_keymap(&keymap)?;

        Ok(Self {
            context,
            keymap,
            state,
            settings,
        })
    }

    pub fn settings(&self) -> &KeymapSettings {
        &self.settings
    }

    fn snapshot(&self) -> ModifierState {
        ModifierState {
            depressed: self.state.serialize_mods(xkb::STATE_MODS_DEPRESSED),
            latched: self.state.serialize_mods(xkb::STATE_MODS_LATCHED),
            locked: self.state.serialize_mods(xkb::STATE_MODS_LOCKED),
            group: self.state.serialize_layout(xkb::STATE_LAYOUT_EFFECTIVE),
        }
    }

    /// Feeds one key event into the state machine. `code` is the evdev
    /// keycode (wire format), `pressed` true for key-down. Returns
    /// `(before, after)` modifier snapshots so callers can tell whether
    /// `wl_keyboard.modifiers` needs to be sent alongside `key`.
    pub fn update_key(&mut self, code: u32, pressed: bool) -> (ModifierState, ModifierState) {
        let before = self.snapshot();
        // xkbcommon keycodes are evdev keycodes offset by 8.
        let xkb_code = xkb::Keycode::new(code + 8);
        let direction = if pressed {
            xkb::KeyDirection::Down
        } else {
            xkb::KeyDirection::Up
        };
        self.state.update_key(xkb_code, direction);
        let after = self.snapshot();
        (before, after)
    }

    #[cfg(test)]
    fn context(&self) -> &xkb::Context {
        &self.context
    }

    #[cfg(test)]
    fn keymap(&self) -> &xkb::Keymap {
        &self.keymap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_compiles_a_keymap_and_settings() {
        let ks = KeyboardState::new().unwrap();
        assert!(ks.settings().size > 0);
        assert_eq!(ks.settings().format, 1);
        let _ = ks.context();
        let _ = ks.keymap();
    }

    #[test]
    fn update_key_reports_no_change_for_a_plain_letter() {
        let mut ks = KeyboardState::new().unwrap();
        // KEY_A = 30 (evdev).
        let (before, after) = ks.update_key(30, true);
        assert_eq!(before, after);
    }

    #[test]
    fn update_key_reports_change_for_shift() {
        let mut ks = KeyboardState::new().unwrap();
        // KEY_LEFTSHIFT = 42 (evdev).
        let (before, after) = ks.update_key(42, true);
        assert_ne!(before, after);
        assert_ne!(after.depressed, 0);
    }
}
