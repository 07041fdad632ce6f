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

//! Simulated phone, SCO transport and audio routing.
//!
//! Used by the console of the binary and by the integration tests. The
//! phone reports every call change to the attached engine synchronously,
//! like a real telephony stack delivering callbacks on the caller's thread.

use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::hfp::{HandsfreeEngine, ScoHandle, ScoTransport};
use crate::storage::{CallLogKind, PhonebookStore};
use crate::telephony::{
    AudioRouting, Call, CallSnapshot, CallState, Connection, PhoneStatus, ServiceState, Telephony,
    Timestamp,
};

const FIRST_TIMESTAMP: Timestamp = 1000;

struct SimState {
    calls: CallSnapshot,
    service: ServiceState,
    signal_asu: u8,
    battery_level: u32,
    battery_scale: u32,
    subscriber_number: Option<String>,
    clock: Timestamp,
    fail_dials: bool,
    auto_start: bool,
    dialed: Vec<String>,
    dtmf: Vec<char>,
}

impl SimState {
    fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        self.clock
    }

    fn connection(&mut self, number: &str, incoming: bool) -> Connection {
        Connection {
            address: (!number.is_empty()).then(|| number.to_string()),
            created_at: self.tick(),
            incoming,
        }
    }
}

/// A phone with one radio and scripted calls.
pub struct SimPhone {
    state: Mutex<SimState>,
    engine: Mutex<Weak<HandsfreeEngine>>,
    store: Option<PhonebookStore>,
}

impl SimPhone {
    /// A phone in service with full signal and battery.
    pub fn new(store: Option<PhonebookStore>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SimState {
                calls: CallSnapshot::default(),
                service: ServiceState {
                    in_service: true,
                    roaming: false,
                    operator: Some("Simulated Network".to_string()),
                },
                signal_asu: 31,
                battery_level: 100,
                battery_scale: 100,
                subscriber_number: Some("+15550100".to_string()),
                clock: FIRST_TIMESTAMP,
                fail_dials: false,
                auto_start: true,
                dialed: Vec::new(),
                dtmf: Vec::new(),
            }),
            engine: Mutex::new(Weak::new()),
            store,
        })
    }

    /// Deliver call changes to `engine` from now on.
    pub fn attach(&self, engine: &Arc<HandsfreeEngine>) {
        *self.engine.lock() = Arc::downgrade(engine);
    }

    fn engine(&self) -> Option<Arc<HandsfreeEngine>> {
        self.engine.lock().upgrade()
    }

    fn notify(&self, calls: CallSnapshot) {
        if let Some(engine) = self.engine() {
            engine.on_call_state_changed(calls);
        }
    }

    fn log_call(&self, number: Option<&str>, kind: CallLogKind) {
        let (Some(store), Some(number)) = (&self.store, number) else {
            return;
        };
        if let Err(e) = store.record_call(number, kind) {
            warn!("Failed to log call: {}", e);
        }
    }

    /// Apply `f` to the call state and report the result.
    fn update<R>(&self, f: impl FnOnce(&mut SimState) -> Result<R>) -> Result<R> {
        let (result, calls) = {
            let mut state = self.state.lock();
            let result = f(&mut state)?;
            (result, state.calls.clone())
        };
        self.notify(calls);
        Ok(result)
    }

    pub fn calls(&self) -> CallSnapshot {
        self.state.lock().calls.clone()
    }

    /// Numbers passed to `dial`, oldest first.
    pub fn dialed(&self) -> Vec<String> {
        self.state.lock().dialed.clone()
    }

    pub fn dtmf(&self) -> Vec<char> {
        self.state.lock().dtmf.clone()
    }

    /// Make every following dial fail.
    pub fn set_fail_dials(&self, fail: bool) {
        self.state.lock().fail_dials = fail;
    }

    /// Whether a dial immediately enters the dialing state.
    pub fn set_auto_start(&self, auto_start: bool) {
        self.state.lock().auto_start = auto_start;
    }

    pub fn set_subscriber_number(&self, number: Option<&str>) {
        self.state.lock().subscriber_number = number.map(str::to_string);
    }

    /// A call arrives from `number`. Empty means withheld.
    pub fn incoming(&self, number: &str) -> Result<()> {
        info!("Incoming call from {}", number);
        self.update(|state| {
            if state.calls.ringing.is_alive() {
                bail!("a call is already ringing");
            }
            let busy = state.calls.foreground.is_alive() || state.calls.background.is_alive();
            let connection = state.connection(number, true);
            state.calls.ringing = Call::new(
                if busy {
                    CallState::Waiting
                } else {
                    CallState::Incoming
                },
                vec![connection],
            );
            Ok(())
        })
    }

    /// The remote party of a dialing call starts ringing.
    pub fn alert(&self) -> Result<()> {
        self.update(|state| {
            if state.calls.foreground.state != CallState::Dialing {
                bail!("no call is dialing");
            }
            state.calls.foreground.state = CallState::Alerting;
            Ok(())
        })
    }

    /// The remote party of an outgoing call answers.
    pub fn connect_outgoing(&self) -> Result<()> {
        self.update(|state| {
            let fg = &mut state.calls.foreground;
            if !matches!(fg.state, CallState::Dialing | CallState::Alerting) {
                bail!("no outgoing call in progress");
            }
            fg.state = CallState::Active;
            Ok(())
        })
    }

    /// The remote party ends the foreground call, or gives up ringing.
    pub fn remote_hangup(&self) -> Result<()> {
        let missed = self.update(|state| {
            if state.calls.foreground.is_alive() {
                state.calls.foreground = Call::default();
                Ok(None)
            } else if state.calls.ringing.is_alive() {
                let call = std::mem::take(&mut state.calls.ringing);
                Ok(call.earliest_connection().and_then(|c| c.address.clone()))
            } else {
                bail!("no call to end");
            }
        })?;
        self.log_call(missed.as_deref(), CallLogKind::Missed);
        Ok(())
    }

    pub fn set_signal(&self, asu: u8) {
        self.state.lock().signal_asu = asu;
        if let Some(engine) = self.engine() {
            engine.on_signal_changed(asu);
        }
    }

    pub fn set_battery(&self, level: u32) {
        let scale = {
            let mut state = self.state.lock();
            state.battery_level = level;
            state.battery_scale
        };
        if let Some(engine) = self.engine() {
            engine.on_battery_changed(level, scale);
        }
    }

    pub fn set_service(&self, in_service: bool, roaming: bool) {
        let service = {
            let mut state = self.state.lock();
            state.service.in_service = in_service;
            state.service.roaming = roaming;
            state.service.clone()
        };
        if let Some(engine) = self.engine() {
            engine.on_service_state_changed(service);
        }
    }
}

impl Telephony for SimPhone {
    fn status(&self) -> PhoneStatus {
        let state = self.state.lock();
        PhoneStatus {
            service: state.service.clone(),
            signal_asu: state.signal_asu,
            battery_level: state.battery_level,
            battery_scale: state.battery_scale,
            calls: state.calls.clone(),
            subscriber_number: state.subscriber_number.clone(),
        }
    }

    fn answer(&self) -> Result<()> {
        let number = self.update(|state| {
            let calls = &mut state.calls;
            if !calls.ringing.is_alive() {
                bail!("nothing to answer");
            }
            if calls.foreground.is_alive() {
                if calls.background.is_alive() {
                    bail!("no free line");
                }
                calls.background = std::mem::take(&mut calls.foreground);
                calls.background.state = CallState::Holding;
            }
            calls.foreground = std::mem::take(&mut calls.ringing);
            calls.foreground.state = CallState::Active;
            Ok(calls
                .foreground
                .earliest_connection()
                .and_then(|c| c.address.clone()))
        })?;
        self.log_call(number.as_deref(), CallLogKind::Incoming);
        Ok(())
    }

    fn reject(&self) -> Result<()> {
        let number = self.update(|state| {
            if !state.calls.ringing.is_alive() {
                bail!("nothing to reject");
            }
            let call = std::mem::take(&mut state.calls.ringing);
            Ok(call.earliest_connection().and_then(|c| c.address.clone()))
        })?;
        self.log_call(number.as_deref(), CallLogKind::Missed);
        Ok(())
    }

    fn hangup_foreground(&self) -> Result<()> {
        self.update(|state| {
            if !state.calls.foreground.is_alive() {
                bail!("no foreground call");
            }
            state.calls.foreground = Call::default();
            Ok(())
        })
    }

    fn hangup_background(&self) -> Result<()> {
        self.update(|state| {
            if !state.calls.background.is_alive() {
                bail!("no background call");
            }
            state.calls.background = Call::default();
            Ok(())
        })
    }

    fn switch_holding_and_active(&self) -> Result<()> {
        self.update(|state| {
            let calls = &mut state.calls;
            std::mem::swap(&mut calls.foreground, &mut calls.background);
            if calls.foreground.is_alive() {
                calls.foreground.state = CallState::Active;
            }
            if calls.background.is_alive() {
                calls.background.state = CallState::Holding;
            }
            Ok(())
        })
    }

    fn conference(&self) -> Result<()> {
        self.update(|state| {
            let calls = &mut state.calls;
            if calls.foreground.state != CallState::Active
                || calls.background.state != CallState::Holding
            {
                bail!("conference needs an active and a held call");
            }
            let held = std::mem::take(&mut calls.background);
            calls.foreground.connections.extend(held.connections);
            Ok(())
        })
    }

    fn dial(&self, number: &str) -> Result<()> {
        let started = self.update(|state| {
            if state.fail_dials {
                bail!("dial rejected by network");
            }
            state.dialed.push(number.to_string());
            if !state.auto_start {
                return Ok(false);
            }

            if state.calls.foreground.is_alive() {
                if state.calls.background.is_alive() {
                    bail!("no free line");
                }
                state.calls.background = std::mem::take(&mut state.calls.foreground);
                state.calls.background.state = CallState::Holding;
            }
            let connection = state.connection(number, false);
            state.calls.foreground = Call::new(CallState::Dialing, vec![connection]);
            Ok(true)
        })?;

        debug!("Dialed {} (started: {})", number, started);
        self.log_call(Some(number), CallLogKind::Outgoing);
        Ok(())
    }

    fn send_dtmf(&self, digit: char) -> Result<()> {
        self.state.lock().dtmf.push(digit);
        Ok(())
    }
}

/// SCO sockets that exist only as handles.
///
/// When attached, outgoing connects complete successfully on a spawned
/// task.
#[derive(Default)]
pub struct SimSco {
    next: AtomicU64,
    listener: Mutex<Option<ScoHandle>>,
    connects: Mutex<Vec<ScoHandle>>,
    closed: Mutex<Vec<ScoHandle>>,
    auto_complete: Mutex<Option<(Weak<HandsfreeEngine>, Handle)>>,
}

impl SimSco {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Complete connects asynchronously on `runtime`.
    pub fn attach(&self, engine: &Arc<HandsfreeEngine>, runtime: Handle) {
        *self.auto_complete.lock() = Some((Arc::downgrade(engine), runtime));
    }

    fn alloc(&self) -> ScoHandle {
        ScoHandle(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The current listening socket.
    pub fn listener(&self) -> Option<ScoHandle> {
        *self.listener.lock()
    }

    /// The most recent outgoing connect.
    pub fn last_connect(&self) -> Option<ScoHandle> {
        self.connects.lock().last().copied()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().len()
    }

    pub fn is_closed(&self, handle: ScoHandle) -> bool {
        self.closed.lock().contains(&handle)
    }
}

impl ScoTransport for SimSco {
    fn listen(&self) -> Result<ScoHandle> {
        let handle = self.alloc();
        *self.listener.lock() = Some(handle);
        Ok(handle)
    }

    fn connect(&self, peer: &str) -> Result<ScoHandle> {
        let handle = self.alloc();
        debug!("SCO connect to {} as {:?}", peer, handle);
        self.connects.lock().push(handle);

        if let Some((engine, runtime)) = self.auto_complete.lock().clone() {
            runtime.spawn(async move {
                if let Some(engine) = engine.upgrade() {
                    engine.on_sco_connected(handle, true);
                }
            });
        }
        Ok(handle)
    }

    fn close(&self, handle: ScoHandle) {
        let mut listener = self.listener.lock();
        if *listener == Some(handle) {
            *listener = None;
        }
        self.closed.lock().push(handle);
    }
}

/// Audio routing that only remembers the last request.
#[derive(Default)]
pub struct SimAudio {
    bluetooth: AtomicBool,
    speaker: AtomicU8,
    microphone: AtomicU8,
}

impl SimAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_bluetooth_routed(&self) -> bool {
        self.bluetooth.load(Ordering::SeqCst)
    }

    pub fn speaker_volume(&self) -> u8 {
        self.speaker.load(Ordering::SeqCst)
    }

    pub fn microphone_gain(&self) -> u8 {
        self.microphone.load(Ordering::SeqCst)
    }
}

impl AudioRouting for SimAudio {
    fn set_bluetooth_audio(&self, enabled: bool) {
        self.bluetooth.store(enabled, Ordering::SeqCst);
    }

    fn set_speaker_volume(&self, level: u8) {
        self.speaker.store(level, Ordering::SeqCst);
    }

    fn set_microphone_gain(&self, level: u8) {
        self.microphone.store(level, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telephony::PhonebookSource;

    #[test]
    fn test_incoming_then_answer() {
        let phone = SimPhone::new(None);
        phone.incoming("5551234").unwrap();
        assert_eq!(phone.calls().ringing.state, CallState::Incoming);

        phone.answer().unwrap();
        let calls = phone.calls();
        assert!(!calls.ringing.is_alive());
        assert_eq!(calls.foreground.state, CallState::Active);
    }

    #[test]
    fn test_second_call_waits_and_holds_first() {
        let phone = SimPhone::new(None);
        phone.dial("5550001").unwrap();
        phone.connect_outgoing().unwrap();
        phone.incoming("5550002").unwrap();
        assert_eq!(phone.calls().ringing.state, CallState::Waiting);

        phone.answer().unwrap();
        let calls = phone.calls();
        assert_eq!(calls.background.state, CallState::Holding);
        assert_eq!(calls.foreground.state, CallState::Active);

        phone.conference().unwrap();
        let calls = phone.calls();
        assert!(calls.foreground.is_multiparty());
        assert!(!calls.background.is_alive());
    }

    #[test]
    fn test_timestamps_increase() {
        let phone = SimPhone::new(None);
        phone.dial("1").unwrap();
        phone.incoming("2").unwrap();
        let calls = phone.calls();
        let fg = calls.foreground.connections[0].created_at;
        let ringing = calls.ringing.connections[0].created_at;
        assert!(fg < ringing);
    }

    #[test]
    fn test_dial_failure_and_logging() {
        let store = PhonebookStore::in_memory(100).unwrap();
        let phone = SimPhone::new(Some(store.clone()));
        phone.set_fail_dials(true);
        assert!(phone.dial("5551234").is_err());

        phone.set_fail_dials(false);
        phone.dial("5551234").unwrap();
        assert_eq!(store.last_dialed().unwrap().as_deref(), Some("5551234"));
    }

    #[test]
    fn test_sco_listener_tracking() {
        let sco = SimSco::new();
        let handle = sco.listen().unwrap();
        assert_eq!(sco.listener(), Some(handle));
        sco.close(handle);
        assert_eq!(sco.listener(), None);
        assert!(sco.is_closed(handle));
    }
}
