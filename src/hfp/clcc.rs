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

//! `+CLCC` line numbering.
//!
//! Each live connection keeps its 1-based line index for as long as it stays
//! alive. Connections are identified across rebuilds by their creation
//! timestamp. New connections take the lowest free index, earliest first.

use std::fmt;

use tracing::warn;

use crate::telephony::{Call, CallSnapshot, CallState, Timestamp};

/// Default bound on concurrently numbered lines.
pub const DEFAULT_MAX_LINES: usize = 3;

/// `<stat>` field of `+CLCC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Active = 0,
    Held = 1,
    Dialing = 2,
    Alerting = 3,
    Incoming = 4,
    Waiting = 5,
}

impl LineState {
    pub fn from_call_state(state: CallState) -> Option<Self> {
        match state {
            CallState::Active => Some(LineState::Active),
            CallState::Holding => Some(LineState::Held),
            CallState::Dialing => Some(LineState::Dialing),
            CallState::Alerting => Some(LineState::Alerting),
            CallState::Incoming => Some(LineState::Incoming),
            CallState::Waiting => Some(LineState::Waiting),
            _ => None,
        }
    }
}

/// `<dir>` field of `+CLCC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    MobileOriginated = 0,
    MobileTerminated = 1,
}

/// One live connection as seen by `+CLCC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLine {
    pub created_at: Timestamp,
    pub state: LineState,
    pub direction: Direction,
    pub address: Option<String>,
    pub address_type: u8,
    pub multiparty: bool,
}

/// A numbered call line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLineRecord {
    pub index: u8,
    pub line: CallLine,
}

impl fmt::Display for CallLineRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+CLCC: {},{},{},0,{}",
            self.index,
            self.line.direction as u8,
            self.line.state as u8,
            u8::from(self.line.multiparty)
        )?;
        match self.line.address.as_deref() {
            Some(number) if !number.is_empty() => {
                write!(f, ",\"{}\",{}", number, self.line.address_type)
            }
            _ => Ok(()),
        }
    }
}

/// All live connections, foreground first, then background, then ringing.
pub fn lines_from_calls(calls: &CallSnapshot) -> Vec<CallLine> {
    let mut lines = Vec::new();
    for call in [&calls.foreground, &calls.background, &calls.ringing] {
        push_call_lines(call, &mut lines);
    }
    lines
}

fn push_call_lines(call: &Call, lines: &mut Vec<CallLine>) {
    if !call.is_alive() {
        return;
    }
    let Some(state) = LineState::from_call_state(call.state) else {
        return;
    };
    let multiparty = call.is_multiparty();
    for connection in &call.connections {
        lines.push(CallLine {
            created_at: connection.created_at,
            state,
            direction: if connection.incoming {
                Direction::MobileTerminated
            } else {
                Direction::MobileOriginated
            },
            address: connection.address.clone(),
            address_type: connection.address_type(),
            multiparty,
        });
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    created_at: Timestamp,
    in_use: bool,
}

/// Stable line index assignment.
#[derive(Debug)]
pub struct CallLineIndexAllocator {
    slots: Vec<Slot>,
}

/// Indices go on the wire as one byte.
const INDEX_LIMIT: usize = u8::MAX as usize;

impl CallLineIndexAllocator {
    /// `max_lines` is clamped to `1..=255`.
    pub fn new(max_lines: usize) -> Self {
        Self {
            slots: vec![Slot::default(); max_lines.clamp(1, INDEX_LIMIT)],
        }
    }

    /// Reassign indices for the given live connection timestamps.
    ///
    /// The result is aligned with `live`. `None` marks a connection that did
    /// not fit; those are always the most recently created ones.
    pub fn rebuild(&mut self, live: &[Timestamp]) -> Vec<Option<u8>> {
        let previously_used: Vec<bool> = self.slots.iter().map(|s| s.in_use).collect();
        for slot in &mut self.slots {
            slot.in_use = false;
        }

        let mut assigned: Vec<Option<u8>> = vec![None; live.len()];
        let mut pending = Vec::new();

        for (pos, ts) in live.iter().enumerate() {
            let kept = self
                .slots
                .iter()
                .enumerate()
                .position(|(i, s)| previously_used[i] && !s.in_use && s.created_at == *ts);
            match kept {
                Some(i) => {
                    self.slots[i].in_use = true;
                    assigned[pos] = Some(i as u8 + 1);
                }
                None => pending.push(pos),
            }
        }

        while !pending.is_empty() {
            let Some(free) = self.slots.iter().position(|s| !s.in_use) else {
                break;
            };

            let mut earliest = 0;
            for (n, pos) in pending.iter().enumerate() {
                if live[*pos] < live[pending[earliest]] {
                    earliest = n;
                }
            }
            let pos = pending.remove(earliest);

            self.slots[free] = Slot {
                created_at: live[pos],
                in_use: true,
            };
            assigned[pos] = Some(free as u8 + 1);
        }

        if !pending.is_empty() {
            warn!(
                "{} call line(s) exceed the limit of {}, omitting from +CLCC",
                pending.len(),
                self.slots.len()
            );
        }

        assigned
    }

    /// Number the live connections of `calls`, ordered by index.
    pub fn assign(&mut self, calls: &CallSnapshot) -> Vec<CallLineRecord> {
        let lines = lines_from_calls(calls);
        let stamps: Vec<Timestamp> = lines.iter().map(|l| l.created_at).collect();
        let indices = self.rebuild(&stamps);

        let mut records: Vec<CallLineRecord> = lines
            .into_iter()
            .zip(indices)
            .filter_map(|(line, index)| index.map(|index| CallLineRecord { index, line }))
            .collect();
        records.sort_by_key(|r| r.index);
        records
    }

    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::default();
        }
    }
}

impl Default for CallLineIndexAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}
