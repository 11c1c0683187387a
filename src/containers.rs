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

//! Containers: the small set of generic collection types the rest of the
//! crate is built out of. Nothing here knows about Wayland; it's the
//! load-bearing plumbing underneath Cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::prelude::*;

/// An id-keyed registry. A thin wrapper over `HashMap` rather than
/// `bimap::BiHashMap` when the reverse direction (value -> id) isn't
/// needed; `BiRegistry` below covers the reverse-lookup case (e.g.
/// Containers' object-id <-> entity-id tables).
#[derive(Debug, Default)]
pub struct Registry<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash + Clone + std::fmt::Debug, V> Registry<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }
}

/// A bidirectional id <-> value registry, used where the Cache needs to go
/// both from a client-visible protocol object back to the compositor-side
/// entity id and vice versa. The other direction (object -> id) typically
/// comes straight off the wire library's typed user-data accessor; this
/// covers the handful of places that need the reverse map explicitly.
#[derive(Debug, Default)]
pub struct BiRegistry<K, V> {
    map: bimap::BiHashMap<K, V>,
}

impl<K, V> BiRegistry<K, V>
where
    K: Eq + Hash,
    V: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            map: bimap::BiHashMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }

    pub fn get_by_key(&self, key: &K) -> Option<&V> {
        self.map.get_by_left(key)
    }

    pub fn get_by_value(&self, value: &V) -> Option<&K> {
        self.map.get_by_right(value)
    }

    pub fn remove_by_key(&mut self, key: &K) -> Option<(K, V)> {
        self.map.remove_by_left(key)
    }
}

/// An ordered collection with no duplicate entries, supporting subsurface
/// stacking: `place_above`/`place_below` move an existing element to just
/// after/before a sibling, preserving everyone else's relative order.
///
/// Expressed with a `Vec` rather than actual intrusive pointers — Rust has
/// no safe equivalent of the C sibling-pointer trick, and sibling lists
/// here are small (a handful of subsurfaces per parent), so the O(n)
/// reorder cost is not worth hand-rolling unsafe linked-list splicing for.
#[derive(Debug, Clone, Default)]
pub struct OrderedList<T> {
    items: Vec<T>,
}

impl<T: Eq + Clone> OrderedList<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push_back(&mut self, item: T) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }

    pub fn remove(&mut self, item: &T) -> bool {
        if let Some(pos) = self.items.iter().position(|i| i == item) {
            self.items.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Moves `item` to be the immediate successor of `sibling`. Warns and
    /// no-ops if either is missing.
    pub fn place_above(&mut self, item: &T, sibling: &T) {
        self.reposition(item, sibling, 1);
    }

    /// Moves `item` to be the immediate predecessor of `sibling`.
    pub fn place_below(&mut self, item: &T, sibling: &T) {
        self.reposition(item, sibling, 0);
    }

    fn reposition(&mut self, item: &T, sibling: &T, offset: usize) {
        let Some(item_pos) = self.items.iter().position(|i| i == item) else {
            warn!("place_above/below: item not present in sibling list");
            return;
        };
        let Some(sibling_pos) = self.items.iter().position(|i| i == sibling) else {
            warn!("place_above/below: sibling not present in sibling list");
            return;
        };
        // `sibling_pos` is an index into the list as it stands *before*
        // `item` is removed; removing `item` first and re-searching for
        // `sibling` would silently shift the target index by one whenever
        // `item` originally sat before `sibling`.
        let removed = self.items.remove(item_pos);
        let insert_at = (sibling_pos + offset).min(self.items.len());
        self.items.insert(insert_at, removed);
    }
}

/// A thin marker for "this is the one cache-wide lock": every mutation and
/// every iteration happens through this guard, so it's the only
/// synchronization primitive the rest of the crate reaches for.
#[derive(Debug, Default)]
pub struct ScopedMutex<T> {
    inner: Mutex<T>,
}

impl<T> ScopedMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquires the lock for the duration of `f`. Deliberately doesn't
    /// expose the guard beyond a closure: every transaction should be a
    /// single atomic unit of work that releases the lock before doing
    /// anything that could block or re-enter.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard: MutexGuard<'_, T> = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_list_place_above_and_below_reorder_siblings() {
        let mut l = OrderedList::new();
        l.push_back("c1");
        l.push_back("c2");
        l.push_back("c3");

        l.place_above(&"c1", &"c3");
        assert_eq!(l.as_slice(), &["c2", "c3", "c1"]);

        l.place_below(&"c2", &"c3");
        assert_eq!(l.as_slice(), &["c3", "c2", "c1"]);
    }

    #[test]
    fn ordered_list_ignores_missing_item() {
        let mut l = OrderedList::new();
        l.push_back("a");
        l.place_above(&"missing", &"a");
        assert_eq!(l.as_slice(), &["a"]);
    }

    #[test]
    fn registry_basic_roundtrip() {
        let mut r = Registry::new();
        r.insert(1u32, "one");
        assert_eq!(r.get(&1), Some(&"one"));
        assert_eq!(r.remove(&1), Some("one"));
        assert!(r.get(&1).is_none());
    }

    #[test]
    fn scoped_mutex_runs_closure_under_lock() {
        let m = ScopedMutex::new(0);
        m.with_lock(|v| *v += 1);
        assert_eq!(m.with_lock(|v| *v), 1);
    }
}
