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

//! Per-kind timer table.
//!
//! The controller only records which timers are armed. The engine spawns the
//! sleeping task and, when it wakes, asks [`EventTimerController::take_fired`]
//! under its lock whether the default action should still run.

/// The delayed actions of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Repeat `RING` for an unanswered call.
    ReRing,
    /// Give up waiting for a dialed call to start.
    CallStartTimeout,
    /// Re-announce `+CCWA` for a call that is still waiting.
    CallWaitingDisplay,
    /// Lift the temporary lock on multi-call operations.
    AddCallReenable,
}

impl TimerKind {
    pub const ALL: [TimerKind; 4] = [
        TimerKind::ReRing,
        TimerKind::CallStartTimeout,
        TimerKind::CallWaitingDisplay,
        TimerKind::AddCallReenable,
    ];

    fn slot(self) -> usize {
        match self {
            TimerKind::ReRing => 0,
            TimerKind::CallStartTimeout => 1,
            TimerKind::CallWaitingDisplay => 2,
            TimerKind::AddCallReenable => 3,
        }
    }
}

/// Identifies one arming of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    pub kind: TimerKind,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct PendingTimer {
    armed: bool,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct EventTimerController {
    timers: [PendingTimer; 4],
}

impl EventTimerController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind`, superseding any earlier arming of the same kind.
    pub fn arm(&mut self, kind: TimerKind) -> TimerToken {
        let timer = &mut self.timers[kind.slot()];
        timer.generation = timer.generation.wrapping_add(1);
        timer.armed = true;
        TimerToken {
            kind,
            generation: timer.generation,
        }
    }

    /// Disarm `kind`. Returns whether it was armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        let timer = &mut self.timers[kind.slot()];
        let was_armed = timer.armed;
        timer.armed = false;
        was_armed
    }

    pub fn cancel_all(&mut self) {
        for kind in TimerKind::ALL {
            self.cancel(kind);
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers[kind.slot()].armed
    }

    /// Consume a fired token.
    ///
    /// Returns true exactly once for the latest arming, and never after a
    /// cancel.
    pub fn take_fired(&mut self, token: TimerToken) -> bool {
        let timer = &mut self.timers[token.kind.slot()];
        if timer.armed && timer.generation == token.generation {
            timer.armed = false;
            true
        } else {
            false
        }
    }
}
