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

//! Protocol Bindings: one module per Wayland interface. Each is
//! declarative — a table of request handlers reached through
//! `wayland_server::Dispatch`, plus a `bind`/`register_global` entry point
//! that creates the resource, installs it, and inserts it into the Cache.
//!
//! The *unbind* callback (`Dispatch::destroyed`) is the single source of
//! truth for removing a resource from the Cache; a missing unbind is the
//! principal leak risk; `State::drop` logs non-empty general-resource
//! lists as a warning.

pub mod compositor;
pub mod data_device;
pub mod output;
pub mod screenshooter;
pub mod seat;
pub mod shell;
pub mod shm;
pub mod subcompositor;
pub mod xdg_shell;

use std::sync::Arc;

use wayland_server::Client;

use crate::cache::Cache;
use crate::coordinator::Coordinator;
use crate::engine::AtomicSerialSource;
use crate::facade::Facade;
use crate::gateway::Gateway;
use crate::prelude::*;

/// Per-client data the wire library attaches to every client connection.
/// Nothing interface-specific lives here; resource-to-entity mapping goes
/// through the Cache instead.
pub struct ClientState;

impl wayland_server::backend::ClientData for ClientState {
    fn initialized(&self, _client_id: wayland_server::backend::ClientId) {}

    fn disconnected(
        &self,
        _client_id: wayland_server::backend::ClientId,
        _reason: wayland_server::backend::DisconnectReason,
    ) {
    }
}

/// The central `Dispatch` state type every protocol binding implements its
/// traits against. Holds the three components the bindings translate
/// between: Facade (inbound), Gateway (outbound), Cache (shared state).
pub struct State {
    pub cache: Arc<Cache>,
    pub facade: Arc<Facade>,
    pub gateway: Arc<Gateway>,
    pub coordinator: Arc<dyn Coordinator>,
    pub serials: Arc<AtomicSerialSource>,
    pub offer_factory: Arc<data_device::OfferFactory>,
}

impl State {
    pub fn new(cache: Arc<Cache>, coordinator: Arc<dyn Coordinator>) -> Self {
        let serials = Arc::new(AtomicSerialSource::new());
        let offer_factory = Arc::new(data_device::OfferFactory::new());
        let gateway = Arc::new(Gateway::new(
            cache.clone(),
            serials.clone() as Arc<dyn crate::engine::SerialSource>,
            offer_factory.clone(),
        ));
        let facade = Arc::new(Facade::new(cache.clone(), coordinator.clone(), gateway.clone()));

        Self {
            cache,
            facade,
            gateway,
            coordinator,
            serials,
            offer_factory,
        }
    }
}

/// Logs a diagnostic when a client is unbinding a resource the Cache never
/// got (or already lost) an entry for — the principal leak-detection point
/// per the Protocol Bindings design.
pub fn warn_if_client_has_leaked_resources(client: &Client, count: usize) {
    if count > 0 {
        warn!(
            "client {:?} disconnected with {count} resources still tracked in the cache",
            client.id()
        );
    }
}
