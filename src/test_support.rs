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

//! Test-only harness shared by the Facade/Gateway test modules: a real
//! (in-process) `Display` with one connected client, so tests mint actual
//! protocol resources instead of mocking the wire layer. Nothing here is
//! compiled outside `#[cfg(test)]`.

#![cfg(test)]

use std::os::unix::net::UnixStream;
use std::sync::Arc;

use wayland_server::Client;
use wayland_server::Display;
use wayland_server::DisplayHandle;

use crate::bindings::ClientState;
use crate::bindings::State;
use crate::cache::Cache;
use crate::coordinator::Coordinator;
use crate::keyboard_state::KeyboardState;

/// An in-process display with one or more already-inserted clients.
/// Requests are never dispatched and events are never flushed, so the peer
/// sockets can sit idle for the lifetime of the test; we only use them to
/// mint resources via `Client::create_resource`, the same seam
/// `data_device::OfferFactory` uses in production.
pub struct TestServer {
    display: Display<State>,
    clients: Vec<Client>,
    _peers: Vec<UnixStream>,
}

impl TestServer {
    pub fn new() -> Self {
        let display: Display<State> = Display::new().expect("failed to create test display");
        let mut server = Self {
            display,
            clients: Vec::new(),
            _peers: Vec::new(),
        };
        server.add_client();
        server
    }

    pub fn handle(&self) -> DisplayHandle {
        self.display.handle()
    }

    /// Inserts another connected client, distinct from every client added
    /// so far — for scenarios that need to tell two clients' resources
    /// apart (focus hand-off).
    pub fn add_client(&mut self) -> Client {
        let dh = self.display.handle();
        let (ours, peer) = UnixStream::pair().expect("failed to create test socket pair");
        let client = dh
            .insert_client(ours, Arc::new(ClientState))
            .expect("failed to insert test client");
        self.clients.push(client.clone());
        self._peers.push(peer);
        client
    }

    /// The first client, inserted by `new`.
    pub fn client(&self) -> &Client {
        &self.clients[0]
    }

    /// Mints a real protocol resource for the given client, bypassing the
    /// bind handshake entirely (there is no global to bind against in these
    /// tests).
    pub fn create_resource_for<I, U>(&self, client: &Client, version: u32, data: U) -> I
    where
        I: wayland_server::Resource + 'static,
        U: Send + Sync + 'static,
        State: wayland_server::Dispatch<I, U>,
    {
        client
            .create_resource::<I, U, State>(&self.handle(), version, data)
            .expect("failed to create test resource")
    }

    /// Shorthand for `create_resource_for(self.client(), ...)`.
    pub fn create_resource<I, U>(&self, version: u32, data: U) -> I
    where
        I: wayland_server::Resource + 'static,
        U: Send + Sync + 'static,
        State: wayland_server::Dispatch<I, U>,
    {
        self.create_resource_for(self.client(), version, data)
    }
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}

/// A fresh `State` wired to `coordinator`, independent of any `TestServer`
/// (the Cache/Facade/Gateway triangle doesn't need a display to exist).
pub fn test_state(coordinator: Arc<dyn Coordinator>) -> State {
    let cache = Arc::new(Cache::new(KeyboardState::new().unwrap()));
    State::new(cache, coordinator)
}
