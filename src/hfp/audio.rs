// Copyright 2026 Daniel Pelikan
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

//! SCO audio link slots.
//!
//! Three slots are tracked: the incoming listener, an in-flight outgoing
//! connect and the connected link. Methods that can change Bluetooth audio
//! routing return `Some(enabled)`; the caller forwards that to
//! [`AudioRouting`](crate::telephony::AudioRouting) after releasing its lock.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

/// Opaque identity of one SCO socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoHandle(pub u64);

/// SCO socket primitives.
///
/// Completion is reported back through the engine's `on_sco_*` hooks. An
/// implementation must not invoke those hooks from inside these methods.
pub trait ScoTransport: Send + Sync {
    /// Create a listening socket and start accepting.
    fn listen(&self) -> Result<ScoHandle>;

    /// Start connecting to `peer`.
    fn connect(&self, peer: &str) -> Result<ScoHandle>;

    fn close(&self, handle: ScoHandle);
}

/// State of the incoming slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingState {
    Listening,
    Accepting,
    Closed,
}

/// Observable slot summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioState {
    pub incoming: IncomingState,
    pub outgoing: bool,
    pub connected: bool,
    /// A call state that carries audio.
    pub possible: bool,
    /// Operator switch from `audio on|off`.
    pub allowed: bool,
}

pub struct AudioLinkManager {
    transport: Arc<dyn ScoTransport>,
    enabled: bool,
    incoming: Option<ScoHandle>,
    incoming_state: IncomingState,
    outgoing: Option<ScoHandle>,
    connected: Option<ScoHandle>,
    peer: Option<String>,
    audio_possible: bool,
    user_enabled: bool,
}

impl AudioLinkManager {
    pub fn new(transport: Arc<dyn ScoTransport>) -> Self {
        Self {
            transport,
            enabled: false,
            incoming: None,
            incoming_state: IncomingState::Closed,
            outgoing: None,
            connected: None,
            peer: None,
            audio_possible: false,
            user_enabled: true,
        }
    }

    pub fn state(&self) -> AudioState {
        AudioState {
            incoming: self.incoming_state,
            outgoing: self.outgoing.is_some(),
            connected: self.connected.is_some(),
            possible: self.audio_possible,
            allowed: self.user_enabled,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    /// Radio on: start listening.
    pub fn enable(&mut self) {
        self.enabled = true;
        if self.incoming.is_none() {
            self.listen();
        }
    }

    /// Radio off: close every slot.
    pub fn disable(&mut self) -> Option<bool> {
        self.enabled = false;
        if let Some(handle) = self.incoming.take() {
            self.transport.close(handle);
        }
        self.incoming_state = IncomingState::Closed;
        self.disconnect()
    }

    pub fn set_peer(&mut self, peer: Option<String>) {
        self.peer = peer;
    }

    /// Start an outgoing connect to the peer.
    pub fn connect(&mut self) -> Option<bool> {
        let Some(peer) = self.peer.clone() else {
            debug!("SCO connect skipped: no peer");
            return None;
        };
        if self.connected.is_some() || self.outgoing.is_some() {
            debug!("SCO connect skipped: link already present");
            return None;
        }
        if !self.user_enabled {
            debug!("SCO connect skipped: audio disabled by user");
            return None;
        }

        match self.transport.connect(&peer) {
            Ok(handle) => {
                info!("SCO connecting to {} ({:?})", peer, handle);
                self.outgoing = Some(handle);
            }
            Err(e) => warn!("Failed to start SCO connect to {}: {}", peer, e),
        }
        None
    }

    /// Close the outgoing and connected slots.
    pub fn disconnect(&mut self) -> Option<bool> {
        if let Some(handle) = self.outgoing.take() {
            self.transport.close(handle);
        }
        self.connected.take().map(|handle| {
            info!("SCO link {:?} closed locally", handle);
            self.transport.close(handle);
            false
        })
    }

    /// The listener accepted a connection on `handle`.
    pub fn on_accepted(&mut self, handle: ScoHandle) -> Option<bool> {
        if self.incoming != Some(handle) {
            warn!("SCO accept on unknown socket {:?}", handle);
            self.transport.close(handle);
            return None;
        }
        self.incoming = None;
        self.incoming_state = IncomingState::Accepting;

        let change = if self.connected.is_none() && self.audio_possible && self.user_enabled {
            if let Some(pending) = self.outgoing.take() {
                self.transport.close(pending);
            }
            info!("SCO link {:?} accepted", handle);
            self.connected = Some(handle);
            Some(true)
        } else {
            debug!("Rejecting incoming SCO {:?}", handle);
            self.transport.close(handle);
            None
        };

        if self.enabled {
            self.listen();
        } else {
            self.incoming_state = IncomingState::Closed;
        }
        change
    }

    /// An outgoing connect finished.
    pub fn on_connect_result(&mut self, handle: ScoHandle, success: bool) -> Option<bool> {
        if self.outgoing != Some(handle) {
            debug!("Stale SCO connect result for {:?}", handle);
            if success {
                self.transport.close(handle);
            }
            return None;
        }
        self.outgoing = None;

        if !success {
            warn!("SCO connect {:?} failed", handle);
            return None;
        }
        if self.connected.is_some() {
            self.transport.close(handle);
            return None;
        }
        info!("SCO link {:?} connected", handle);
        self.connected = Some(handle);
        Some(true)
    }

    /// A socket closed underneath us.
    pub fn on_closed(&mut self, handle: ScoHandle) -> Option<bool> {
        if self.incoming == Some(handle) {
            self.incoming = None;
            self.incoming_state = IncomingState::Closed;
            if self.enabled {
                self.listen();
            }
            None
        } else if self.outgoing == Some(handle) {
            self.outgoing = None;
            None
        } else if self.connected == Some(handle) {
            info!("SCO link {:?} closed by peer", handle);
            self.connected = None;
            Some(false)
        } else {
            None
        }
    }

    /// Update the audio permission. A rising edge connects to the peer.
    pub fn set_audio_possible(&mut self, possible: bool) -> Option<bool> {
        let rising = possible && !self.audio_possible;
        self.audio_possible = possible;
        if rising && self.peer.is_some() {
            self.connect()
        } else {
            None
        }
    }

    pub fn set_user_enabled(&mut self, enabled: bool) -> Option<bool> {
        self.user_enabled = enabled;
        if enabled {
            None
        } else {
            self.disconnect()
        }
    }

    fn listen(&mut self) {
        match self.transport.listen() {
            Ok(handle) => {
                self.incoming = Some(handle);
                self.incoming_state = IncomingState::Listening;
            }
            Err(e) => {
                warn!("Failed to create SCO listener: {}", e);
                self.incoming = None;
                self.incoming_state = IncomingState::Closed;
            }
        }
    }
}
