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

//! Opaque entity handles: integer newtypes, never pointers.
//!
//! `SurfaceId` is minted by the Coordinator; `RegionId` by the Cache. Both
//! reserve 0 as "invalid" and may be reused after destruction, so equality
//! is the only thing callers should rely on, not monotonicity.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Eq, PartialEq, Hash)]
        pub struct $name(Option<NonZeroU64>);

        impl $name {
            pub const INVALID: Self = Self(None);

            pub fn new(raw: u64) -> Self {
                Self(NonZeroU64::new(raw))
            }

            pub fn is_valid(self) -> bool {
                self.0.is_some()
            }

            pub fn raw(self) -> u64 {
                self.0.map_or(0, NonZeroU64::get)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.raw())
                } else {
                    write!(f, "{}(invalid)", stringify!($name))
                }
            }
        }
    };
}

opaque_id!(SurfaceId);
opaque_id!(RegionId);

/// Monotonic id allocator. The Coordinator mints `SurfaceId`s this way; the
/// Cache mints `RegionId`s the same way. Freed ids are never reused; a
/// 64-bit counter will not wrap in practice.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn alloc(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_is_the_default() {
        assert_eq!(SurfaceId::default(), SurfaceId::INVALID);
        assert!(!SurfaceId::INVALID.is_valid());
    }

    #[test]
    fn allocator_never_returns_zero() {
        let alloc = IdAllocator::new();
        for _ in 0..100 {
            assert_ne!(alloc.alloc(), 0);
        }
    }

    #[test]
    fn allocator_is_monotonic() {
        let alloc = IdAllocator::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        assert!(b > a);
    }
}
