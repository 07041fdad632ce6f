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

//! Collaborators outside the protocol engine.
//!
//! The engine never owns the phone, the audio path or the contact database.
//! It observes them through the call model below and drives them through
//! the [`Telephony`], [`AudioRouting`] and [`PhonebookSource`] traits.

use anyhow::Result;

/// Milliseconds since an arbitrary epoch, used to identify connections.
pub type Timestamp = u64;

/// Type-of-address for international numbers.
pub const NUMBER_TYPE_INTERNATIONAL: u8 = 145;

/// Type-of-address for everything else.
pub const NUMBER_TYPE_UNKNOWN: u8 = 129;

/// Type-of-address of a dial string.
pub fn number_type(number: &str) -> u8 {
    if number.starts_with('+') {
        NUMBER_TYPE_INTERNATIONAL
    } else {
        NUMBER_TYPE_UNKNOWN
    }
}

/// State of a call object as reported by the phone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    Idle,
    Active,
    Holding,
    Dialing,
    Alerting,
    Incoming,
    Waiting,
    Disconnecting,
    Disconnected,
}

impl CallState {
    /// Whether the call still occupies a line.
    pub fn is_alive(&self) -> bool {
        !matches!(
            self,
            CallState::Idle | CallState::Disconnecting | CallState::Disconnected
        )
    }

    /// Whether the call is an unanswered incoming call.
    pub fn is_ringing(&self) -> bool {
        matches!(self, CallState::Incoming | CallState::Waiting)
    }
}

/// One party of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Remote number, `None` when withheld.
    pub address: Option<String>,
    /// Creation time; stable for the lifetime of the connection.
    pub created_at: Timestamp,
    /// Mobile terminated.
    pub incoming: bool,
}

impl Connection {
    /// Type-of-address of the remote number.
    pub fn address_type(&self) -> u8 {
        number_type(self.address.as_deref().unwrap_or(""))
    }
}

/// A call object grouping one or more connections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Call {
    pub state: CallState,
    pub connections: Vec<Connection>,
}

impl Call {
    pub fn new(state: CallState, connections: Vec<Connection>) -> Self {
        Self { state, connections }
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive() && !self.connections.is_empty()
    }

    pub fn is_multiparty(&self) -> bool {
        self.connections.len() > 1
    }

    /// The connection created first, which represents the call on the wire.
    pub fn earliest_connection(&self) -> Option<&Connection> {
        self.connections.iter().min_by_key(|c| c.created_at)
    }
}

/// Overall phone state, as reported by `+CPAS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneState {
    Idle,
    Ringing,
    OffHook,
}

/// The three call containers of the phone at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallSnapshot {
    pub ringing: Call,
    pub foreground: Call,
    pub background: Call,
}

impl CallSnapshot {
    pub fn phone_state(&self) -> PhoneState {
        if self.ringing.is_alive() && self.ringing.state.is_ringing() {
            PhoneState::Ringing
        } else if self.foreground.is_alive() || self.background.is_alive() {
            PhoneState::OffHook
        } else {
            PhoneState::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phone_state() == PhoneState::Idle
    }
}

/// Network registration as reported by the radio.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceState {
    pub in_service: bool,
    pub roaming: bool,
    /// Operator name in long alphanumeric format.
    pub operator: Option<String>,
}

/// Everything the engine needs to seed a new peer session.
#[derive(Debug, Clone, Default)]
pub struct PhoneStatus {
    pub service: ServiceState,
    /// Signal strength in ASU (0..=31).
    pub signal_asu: u8,
    pub battery_level: u32,
    pub battery_scale: u32,
    pub calls: CallSnapshot,
    pub subscriber_number: Option<String>,
}

/// Call-control primitives of the phone.
///
/// Implementations may deliver state-change callbacks into the engine
/// synchronously from inside these methods; the engine never calls them
/// while holding its own lock.
pub trait Telephony: Send + Sync {
    /// Current phone status, used to seed a new peer session.
    fn status(&self) -> PhoneStatus;

    /// Answer the ringing call, holding an active call if there is one.
    fn answer(&self) -> Result<()>;

    /// Reject the ringing or waiting call.
    fn reject(&self) -> Result<()>;

    fn hangup_foreground(&self) -> Result<()>;

    fn hangup_background(&self) -> Result<()>;

    /// Swap the active and held calls.
    fn switch_holding_and_active(&self) -> Result<()>;

    /// Merge the held call into the active one.
    fn conference(&self) -> Result<()>;

    fn dial(&self, number: &str) -> Result<()>;

    fn send_dtmf(&self, digit: char) -> Result<()>;
}

/// Audio routing control of the phone.
pub trait AudioRouting: Send + Sync {
    /// Route call audio to (or away from) the Bluetooth SCO link.
    fn set_bluetooth_audio(&self, enabled: bool);

    /// Speaker gain requested by the peer, 0..=15.
    fn set_speaker_volume(&self, level: u8);

    /// Microphone gain requested by the peer, 0..=15.
    fn set_microphone_gain(&self, level: u8);
}

/// The phonebooks exposed through `+CPBS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhonebookKind {
    /// Outgoing call log ("DC").
    Dialed,
    /// Incoming call log ("RC").
    Received,
    /// Missed call log ("MC").
    Missed,
    /// Saved numbers ("ME").
    Saved,
}

impl PhonebookKind {
    pub const ALL: [PhonebookKind; 4] = [
        PhonebookKind::Saved,
        PhonebookKind::Dialed,
        PhonebookKind::Received,
        PhonebookKind::Missed,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            PhonebookKind::Dialed => "DC",
            PhonebookKind::Received => "RC",
            PhonebookKind::Missed => "MC",
            PhonebookKind::Saved => "ME",
        }
    }

    /// Parse a storage code, case-insensitive.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "DC" => Some(PhonebookKind::Dialed),
            "RC" => Some(PhonebookKind::Received),
            "MC" => Some(PhonebookKind::Missed),
            "ME" => Some(PhonebookKind::Saved),
            _ => None,
        }
    }
}

/// Label attached to a saved number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberLabel {
    Home,
    Mobile,
    Work,
    Other,
}

impl NumberLabel {
    /// Single-letter code appended to phonebook names.
    pub fn code(&self) -> char {
        match self {
            NumberLabel::Home => 'H',
            NumberLabel::Mobile => 'M',
            NumberLabel::Work => 'W',
            NumberLabel::Other => 'O',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NumberLabel::Home => "home",
            NumberLabel::Mobile => "mobile",
            NumberLabel::Work => "work",
            NumberLabel::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "home" => NumberLabel::Home,
            "mobile" => NumberLabel::Mobile,
            "work" => NumberLabel::Work,
            _ => NumberLabel::Other,
        }
    }
}

/// One phonebook row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonebookEntry {
    pub number: String,
    pub name: Option<String>,
    pub label: Option<NumberLabel>,
}

/// Contact and call-log lookups.
///
/// Implementations must not call back into the engine.
pub trait PhonebookSource: Send + Sync {
    /// All entries of `kind`, most recent first for call logs.
    fn entries(&self, kind: PhonebookKind) -> Result<Vec<PhonebookEntry>>;

    /// Number of the most recent outgoing call.
    fn last_dialed(&self) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(ts: Timestamp) -> Connection {
        Connection {
            address: Some("5551234".to_string()),
            created_at: ts,
            incoming: true,
        }
    }

    #[test]
    fn test_number_type() {
        assert_eq!(number_type("+15551234"), 145);
        assert_eq!(number_type("5551234"), 129);
        assert_eq!(number_type(""), 129);
    }

    #[test]
    fn test_phone_state() {
        let mut calls = CallSnapshot::default();
        assert_eq!(calls.phone_state(), PhoneState::Idle);

        calls.ringing = Call::new(CallState::Incoming, vec![conn(1)]);
        assert_eq!(calls.phone_state(), PhoneState::Ringing);

        calls.ringing = Call::default();
        calls.background = Call::new(CallState::Holding, vec![conn(2)]);
        assert_eq!(calls.phone_state(), PhoneState::OffHook);

        calls.background.state = CallState::Disconnected;
        assert!(calls.is_idle());
    }

    #[test]
    fn test_earliest_connection() {
        let call = Call::new(CallState::Active, vec![conn(30), conn(10), conn(20)]);
        assert!(call.is_multiparty());
        assert_eq!(call.earliest_connection().map(|c| c.created_at), Some(10));
    }

    #[test]
    fn test_phonebook_codes() {
        for kind in PhonebookKind::ALL {
            assert_eq!(PhonebookKind::parse(kind.code()), Some(kind));
        }
        assert_eq!(PhonebookKind::parse("dc"), Some(PhonebookKind::Dialed));
        assert_eq!(PhonebookKind::parse("SM"), None);
    }
}
