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

//! Hands-free audio gateway protocol engine.

pub mod audio;
pub mod clcc;
mod commands;
pub mod engine;
pub mod indicators;
pub mod phonebook;
pub mod timers;

pub use audio::{AudioLinkManager, AudioState, IncomingState, ScoHandle, ScoTransport};
pub use clcc::{CallLineIndexAllocator, CallLineRecord};
pub use commands::AG_FEATURES;
pub use engine::{Collaborators, HandsfreeEngine, PeerKind, TelephonyAction};
pub use indicators::{IndicatorSnapshot, IndicatorState, IndicatorUpdate};
pub use timers::{EventTimerController, TimerKind};
