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

//! Bluetooth transport.
//!
//! SDP-registered RFCOMM services for the hands-free and headset gateways.

mod connection;
mod server;

pub use connection::{frame_response, ConnectionEvent, ConnectionHandler, LineSplitter};
pub use server::{gateway_profile, GatewayServer, HFP_AG_UUID, HSP_AG_UUID};
