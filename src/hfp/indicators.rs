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

//! AG indicator state (`+CIND`, `+CIEV`, `+CSQ`, `+CREG`).
//!
//! Every `apply_*` call recomputes the indicators it owns and returns the
//! ones that changed. Whether the changes are sent is decided by the caller;
//! the snapshot itself is always kept current so that a later `+CIND?`
//! reflects the phone.

use std::fmt;

use crate::telephony::{CallSnapshot, CallState};

/// Indicator indices, fixed by the order of the `+CIND=?` response.
pub const SERVICE: u8 = 1;
pub const CALL: u8 = 2;
pub const CALLSETUP: u8 = 3;
pub const CALLHELD: u8 = 4;
pub const SIGNAL: u8 = 5;
pub const ROAM: u8 = 6;
pub const BATTERY: u8 = 7;

/// Response to `AT+CIND=?`.
pub const CIND_TEST_RESPONSE: &str = "+CIND: (\"service\",(0-1)),(\"call\",(0-1)),\
(\"callsetup\",(0-3)),(\"callheld\",(0-2)),(\"signal\",(0-5)),(\"roam\",(0-1)),(\"battchg\",(0-5))";

/// CSQ rssi shown for each signal bucket.
const RSSI_FOR_SIGNAL: [u8; 6] = [0, 4, 8, 13, 19, 31];

/// Battery indicator maximum.
const BATTERY_MAX: u8 = 5;

/// `+CREG` registration status values.
pub const REG_NOT_REGISTERED: u8 = 0;
pub const REG_HOME: u8 = 1;
pub const REG_ROAMING: u8 = 5;

/// Call setup indicator (HFP 1.5, 4.33.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallSetup {
    #[default]
    None = 0,
    Incoming = 1,
    OutgoingDialing = 2,
    OutgoingAlerting = 3,
}

/// Call held indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallHeld {
    #[default]
    None = 0,
    /// A held call and an active call.
    HeldAndActive = 1,
    /// A held call and no active call.
    Held = 2,
}

/// Call-related indicator values derived from the phone's call containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallIndicators {
    /// An active or held call exists.
    pub call: bool,
    pub callsetup: CallSetup,
    pub callheld: CallHeld,
}

impl CallIndicators {
    pub fn from_calls(calls: &CallSnapshot) -> Self {
        let active = calls.foreground.is_alive() && calls.foreground.state == CallState::Active;
        let held = calls.background.is_alive() && calls.background.state == CallState::Holding;

        let callsetup = if calls.ringing.is_alive() && calls.ringing.state.is_ringing() {
            CallSetup::Incoming
        } else if calls.foreground.is_alive() {
            match calls.foreground.state {
                CallState::Dialing => CallSetup::OutgoingDialing,
                CallState::Alerting => CallSetup::OutgoingAlerting,
                _ => CallSetup::None,
            }
        } else {
            CallSetup::None
        };

        let callheld = match (held, active) {
            (true, true) => CallHeld::HeldAndActive,
            (true, false) => CallHeld::Held,
            (false, _) => CallHeld::None,
        };

        Self {
            call: active || held,
            callsetup,
            callheld,
        }
    }
}

/// One changed indicator, rendered as `+CIEV: <index>,<value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorUpdate {
    pub index: u8,
    pub value: u8,
}

impl fmt::Display for IndicatorUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+CIEV: {},{}", self.index, self.value)
    }
}

/// The set of indicators changed by one update.
pub type DiffSet = Vec<IndicatorUpdate>;

/// Current indicator values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorSnapshot {
    pub service: bool,
    pub call: bool,
    pub callsetup: CallSetup,
    pub callheld: CallHeld,
    /// 0..=5
    pub signal: u8,
    pub roam: bool,
    /// 0..=5
    pub battery: u8,
    /// `+CREG` status: 0, 1 or 5.
    pub registration_stat: u8,
    /// `+CSQ` rssi, 0..=31.
    pub rssi: u8,
}

/// Map ASU (0..=31) to the 0..=5 signal indicator.
pub fn signal_bucket(asu: u8) -> u8 {
    match asu {
        16.. => 5,
        8..=15 => 4,
        4..=7 => 3,
        2..=3 => 2,
        1 => 1,
        _ => 0,
    }
}

/// CSQ rssi displayed for a signal bucket.
pub fn rssi_for_bucket(bucket: u8) -> u8 {
    RSSI_FOR_SIGNAL[usize::from(bucket.min(5))]
}

/// Map a battery reading to the 0..=5 indicator.
pub fn battery_bucket(level: u32, scale: u32) -> u8 {
    if scale == 0 {
        return 0;
    }
    let bucket = u64::from(level) * u64::from(BATTERY_MAX) / u64::from(scale);
    bucket.min(u64::from(BATTERY_MAX)) as u8
}

/// Indicator state of one peer session.
#[derive(Debug, Default)]
pub struct IndicatorState {
    snapshot: IndicatorSnapshot,
}

impl IndicatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        self.snapshot
    }

    pub fn apply_service_state(&mut self, in_service: bool, roaming: bool) -> DiffSet {
        let mut diff = DiffSet::new();
        let s = &mut self.snapshot;

        if s.service != in_service {
            s.service = in_service;
            diff.push(IndicatorUpdate {
                index: SERVICE,
                value: in_service.into(),
            });
        }
        if s.roam != roaming {
            s.roam = roaming;
            diff.push(IndicatorUpdate {
                index: ROAM,
                value: roaming.into(),
            });
        }

        s.registration_stat = if !s.service {
            REG_NOT_REGISTERED
        } else if s.roam {
            REG_ROAMING
        } else {
            REG_HOME
        };

        diff
    }

    pub fn apply_call_state(
        &mut self,
        active_line_exists: bool,
        setup: CallSetup,
        held: CallHeld,
    ) -> DiffSet {
        let mut diff = DiffSet::new();
        let s = &mut self.snapshot;

        if s.call != active_line_exists {
            s.call = active_line_exists;
            diff.push(IndicatorUpdate {
                index: CALL,
                value: active_line_exists.into(),
            });
        }
        if s.callsetup != setup {
            s.callsetup = setup;
            diff.push(IndicatorUpdate {
                index: CALLSETUP,
                value: setup as u8,
            });
        }
        if s.callheld != held {
            s.callheld = held;
            diff.push(IndicatorUpdate {
                index: CALLHELD,
                value: held as u8,
            });
        }

        diff
    }

    /// Convenience wrapper deriving the call indicators from the phone.
    pub fn apply_calls(&mut self, calls: &CallSnapshot) -> DiffSet {
        let ind = CallIndicators::from_calls(calls);
        self.apply_call_state(ind.call, ind.callsetup, ind.callheld)
    }

    pub fn apply_signal(&mut self, asu: u8) -> DiffSet {
        let mut diff = DiffSet::new();
        let bucket = signal_bucket(asu);
        self.snapshot.rssi = rssi_for_bucket(bucket);

        if self.snapshot.signal != bucket {
            self.snapshot.signal = bucket;
            diff.push(IndicatorUpdate {
                index: SIGNAL,
                value: bucket,
            });
        }
        diff
    }

    pub fn apply_battery(&mut self, level: u32, scale: u32) -> DiffSet {
        let mut diff = DiffSet::new();
        let bucket = battery_bucket(level, scale);

        if self.snapshot.battery != bucket {
            self.snapshot.battery = bucket;
            diff.push(IndicatorUpdate {
                index: BATTERY,
                value: bucket,
            });
        }
        diff
    }

    /// Response to `AT+CIND?`.
    pub fn to_cind_result(&self) -> String {
        let s = &self.snapshot;
        format!(
            "+CIND: {},{},{},{},{},{},{}",
            u8::from(s.service),
            u8::from(s.call),
            s.callsetup as u8,
            s.callheld as u8,
            s.signal,
            u8::from(s.roam),
            s.battery
        )
    }

    /// Response to `AT+CSQ`.
    pub fn to_csq_result(&self) -> String {
        format!("+CSQ: {},99", self.snapshot.rssi)
    }

    /// Response to `AT+CREG?`.
    pub fn to_creg_result(&self) -> String {
        format!("+CREG: 1,{}", self.snapshot.registration_stat)
    }
}
