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

//! The audio gateway protocol engine.
//!
//! All protocol state lives in one [`EngineState`] behind a mutex. Event
//! hooks take the lock, update state, send peer lines and collect
//! [`Effect`]s. The effects (telephony primitives, audio routing and timer
//! scheduling) run after the lock is dropped, so a collaborator may call
//! straight back into the engine.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::audio::{AudioLinkManager, AudioState, ScoHandle, ScoTransport};
use super::clcc::{lines_from_calls, CallLineIndexAllocator, CallLineRecord};
use super::commands::{self, Ctx};
use super::indicators::{IndicatorSnapshot, IndicatorState, IndicatorUpdate};
use super::phonebook::Phonebook;
use super::timers::{EventTimerController, TimerKind, TimerToken};
use crate::at::{parse_line, FinalResult};
use crate::config::EngineConfig;
use crate::telephony::{
    AudioRouting, CallSnapshot, CallState, PhonebookSource, ServiceState, Telephony, Timestamp,
};

/// Which profile the peer connected through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerKind {
    #[default]
    Headset,
    Handsfree,
}

/// Character set selected with `+CSCS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Gsm,
}

impl Charset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Gsm => "GSM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UTF-8" => Some(Charset::Utf8),
            "GSM" => Some(Charset::Gsm),
            _ => None,
        }
    }
}

/// A call-control request for the phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyAction {
    Answer,
    Reject,
    HangupForeground,
    HangupBackground,
    SwitchHoldingAndActive,
    Conference,
    Dial(String),
    SendDtmf(char),
}

/// Work deferred until the engine lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    Telephony(TelephonyAction),
    Routing(bool),
    Schedule(TimerToken, Duration),
    SpeakerVolume(u8),
    MicGain(u8),
}

/// Per-peer AT state. Reset to default on disconnect.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub connected: bool,
    sink: Option<mpsc::UnboundedSender<String>>,
    pub address: Option<String>,
    pub kind: PeerKind,
    pub indicators_enabled: bool,
    pub cme_enabled: bool,
    pub clip_enabled: bool,
    pub ccwa_enabled: bool,
    pub hf_features: Option<u32>,
    pub charset: Charset,
    pub waiting_for_call_start: bool,
    /// Connections that already existed when the pending dial was issued.
    pub dial_baseline: Vec<Timestamp>,
}

impl Session {
    pub fn send(&self, line: &str) {
        if let Some(sink) = &self.sink {
            debug!("AT -> {}", line);
            if sink.send(line.to_string()).is_err() {
                debug!("Peer writer gone, dropping {:?}", line);
            }
        }
    }

    pub fn send_result(&self, status: FinalResult) {
        if let Some(text) = status.render(self.cme_enabled) {
            self.send(&text);
        }
    }

    /// Whether `+CIEV` updates go out.
    pub fn wants_updates(&self) -> bool {
        self.connected && self.indicators_enabled && self.kind == PeerKind::Handsfree
    }
}

/// The ringing call currently being announced.
#[derive(Debug, Default)]
pub(crate) struct RingState {
    /// Creation time of the ringing call's first connection.
    pub call: Option<Timestamp>,
    /// Announced with `+CCWA` rather than `RING`.
    pub waiting: bool,
    pub ignored: bool,
}

pub(crate) struct EngineState {
    pub config: EngineConfig,
    pub session: Session,
    pub indicators: IndicatorState,
    pub clcc: CallLineIndexAllocator,
    pub audio: AudioLinkManager,
    pub timers: EventTimerController,
    pub phonebook: Phonebook,
    pub calls: CallSnapshot,
    /// `calls` came from a call state callback rather than a status poll.
    pub calls_reported: bool,
    pub service: ServiceState,
    pub service_reported: bool,
    pub subscriber_number: Option<String>,
    pub ring: RingState,
    pub multiparty_locked: bool,
}

impl EngineState {
    fn new(
        config: EngineConfig,
        phonebook: Arc<dyn PhonebookSource>,
        sco: Arc<dyn ScoTransport>,
    ) -> Self {
        Self {
            clcc: CallLineIndexAllocator::new(config.max_call_lines),
            config,
            session: Session::default(),
            indicators: IndicatorState::new(),
            audio: AudioLinkManager::new(sco),
            timers: EventTimerController::new(),
            phonebook: Phonebook::new(phonebook),
            calls: CallSnapshot::default(),
            calls_reported: false,
            service: ServiceState::default(),
            service_reported: false,
            subscriber_number: None,
            ring: RingState::default(),
            multiparty_locked: false,
        }
    }

    fn delay(&self, kind: TimerKind) -> Duration {
        match kind {
            TimerKind::ReRing => self.config.ring_interval(),
            TimerKind::CallStartTimeout => self.config.call_start_timeout(),
            TimerKind::CallWaitingDisplay => self.config.call_waiting_display(),
            TimerKind::AddCallReenable => self.config.add_call_reenable(),
        }
    }

    pub fn arm(&mut self, kind: TimerKind, effects: &mut Vec<Effect>) {
        let delay = self.delay(kind);
        let token = self.timers.arm(kind);
        effects.push(Effect::Schedule(token, delay));
    }

    pub fn route(&self, change: Option<bool>, effects: &mut Vec<Effect>) {
        if let Some(enabled) = change {
            effects.push(Effect::Routing(enabled));
        }
    }

    fn send_updates(&self, diff: &[IndicatorUpdate]) {
        if !self.session.wants_updates() {
            return;
        }
        for update in diff {
            self.session.send(&update.to_string());
        }
    }

    /// Foreground call is active or alerting.
    fn audio_possible(&self) -> bool {
        let fg = &self.calls.foreground;
        fg.is_alive() && matches!(fg.state, CallState::Active | CallState::Alerting)
    }

    /// Send the deferred result of a dial.
    pub fn finish_call_start(&mut self, status: FinalResult) {
        self.timers.cancel(TimerKind::CallStartTimeout);
        self.session.waiting_for_call_start = false;
        self.session.dial_baseline.clear();
        self.session.send_result(status);
    }

    /// Start waiting for a dialed call to show up in the foreground.
    pub fn begin_call_start(&mut self, effects: &mut Vec<Effect>) {
        self.session.dial_baseline = lines_from_calls(&self.calls)
            .iter()
            .map(|line| line.created_at)
            .collect();
        self.session.waiting_for_call_start = true;
        self.arm(TimerKind::CallStartTimeout, effects);
    }

    /// The foreground holds a connection created after the dial was issued
    /// and is dialing or alerting.
    fn dialed_call_started(&self) -> bool {
        let fg = &self.calls.foreground;
        fg.is_alive()
            && matches!(fg.state, CallState::Dialing | CallState::Alerting)
            && fg
                .connections
                .iter()
                .any(|c| !self.session.dial_baseline.contains(&c.created_at))
    }

    /// Number and type of the ringing call, if any.
    fn ringing_number(&self) -> Option<(String, u8)> {
        let connection = self.calls.ringing.earliest_connection()?;
        let number = connection.address.clone()?;
        Some((number, connection.address_type()))
    }

    fn send_ring(&self) {
        self.session.send("RING");
        if self.session.clip_enabled && self.session.kind == PeerKind::Handsfree {
            if let Some((number, kind)) = self.ringing_number() {
                self.session.send(&format!("+CLIP: \"{}\",{}", number, kind));
            }
        }
    }

    fn send_call_waiting(&self) {
        if !self.session.ccwa_enabled {
            return;
        }
        if let Some((number, kind)) = self.ringing_number() {
            self.session.send(&format!("+CCWA: \"{}\",{}", number, kind));
        }
    }

    fn announce_ring(&mut self, effects: &mut Vec<Effect>) {
        self.timers.cancel(TimerKind::CallWaitingDisplay);
        if !self.session.connected {
            return;
        }
        info!("Ringing peer");
        self.send_ring();
        self.arm(TimerKind::ReRing, effects);
    }

    fn announce_waiting(&mut self, effects: &mut Vec<Effect>) {
        self.timers.cancel(TimerKind::ReRing);
        if !self.session.connected {
            return;
        }
        info!("Announcing waiting call");
        self.send_call_waiting();
        self.arm(TimerKind::CallWaitingDisplay, effects);
    }

    /// Start, convert or stop ring announcements after a call change.
    fn update_ringing(&mut self, effects: &mut Vec<Effect>) {
        let ringing = &self.calls.ringing;
        let current = if ringing.is_alive() && ringing.state.is_ringing() {
            ringing
                .earliest_connection()
                .map(|c| (c.created_at, ringing.state))
        } else {
            None
        };

        let Some((created_at, state)) = current else {
            if self.ring.call.take().is_some() {
                debug!("Ringing ended");
                self.timers.cancel(TimerKind::ReRing);
                self.timers.cancel(TimerKind::CallWaitingDisplay);
                self.ring = RingState::default();
            }
            return;
        };

        let waiting = state == CallState::Waiting || self.indicators.snapshot().call;

        if self.ring.call != Some(created_at) {
            self.ring = RingState {
                call: Some(created_at),
                waiting,
                ignored: false,
            };
            if waiting {
                self.announce_waiting(effects);
            } else {
                self.announce_ring(effects);
            }
        } else if self.ring.waiting && !waiting {
            // The other call went away; the waiting call now rings.
            self.ring.waiting = false;
            if self.ring.ignored {
                self.timers.cancel(TimerKind::CallWaitingDisplay);
            } else {
                self.announce_ring(effects);
            }
        }
    }

    fn on_timer_fired(&mut self, token: TimerToken, effects: &mut Vec<Effect>) {
        if !self.timers.take_fired(token) {
            return;
        }
        debug!("Timer {:?} fired", token.kind);

        match token.kind {
            TimerKind::ReRing => {
                if self.ring.call.is_some() && !self.ring.waiting && !self.ring.ignored {
                    self.announce_ring(effects);
                }
            }
            TimerKind::CallStartTimeout => {
                if self.session.waiting_for_call_start {
                    warn!("Call did not start in time");
                    self.finish_call_start(FinalResult::Error);
                }
            }
            TimerKind::CallWaitingDisplay => {
                if self.ring.call.is_some() && self.ring.waiting && !self.ring.ignored {
                    self.announce_waiting(effects);
                }
            }
            TimerKind::AddCallReenable => {
                self.multiparty_locked = false;
            }
        }
    }

    fn on_call_state_changed(&mut self, calls: CallSnapshot, effects: &mut Vec<Effect>) {
        self.calls = calls;

        if self.multiparty_locked {
            self.multiparty_locked = false;
            self.timers.cancel(TimerKind::AddCallReenable);
        }

        self.calls_reported = true;

        if self.session.waiting_for_call_start && self.dialed_call_started() {
            info!("Dialed call started");
            self.finish_call_start(FinalResult::Ok);
        }

        let diff = self.indicators.apply_calls(&self.calls);
        self.send_updates(&diff);

        self.update_ringing(effects);

        let possible = self.audio_possible();
        let change = self.audio.set_audio_possible(possible);
        self.route(change, effects);
        if self.calls.is_idle() {
            let change = self.audio.disconnect();
            self.route(change, effects);
        }

        self.clcc.assign(&self.calls);
    }

    fn reset_session(&mut self, effects: &mut Vec<Effect>) {
        self.timers.cancel_all();
        self.session = Session::default();
        self.ring = RingState::default();
        self.multiparty_locked = false;
        self.indicators = IndicatorState::new();
        self.clcc.reset();
        self.phonebook.reset();

        let change = self.audio.disconnect();
        self.route(change, effects);
        self.audio.set_peer(None);
        self.audio.set_audio_possible(false);
    }
}

/// External collaborators of the engine.
pub struct Collaborators {
    pub telephony: Arc<dyn Telephony>,
    pub routing: Arc<dyn AudioRouting>,
    pub phonebook: Arc<dyn PhonebookSource>,
    pub sco: Arc<dyn ScoTransport>,
}

/// Hands-free / headset audio gateway engine.
pub struct HandsfreeEngine {
    me: Weak<HandsfreeEngine>,
    runtime: Handle,
    telephony: Arc<dyn Telephony>,
    routing: Arc<dyn AudioRouting>,
    state: Mutex<EngineState>,
}

impl HandsfreeEngine {
    /// Create an engine. Timers are spawned on `runtime`.
    pub fn new(config: EngineConfig, collaborators: Collaborators, runtime: Handle) -> Arc<Self> {
        let Collaborators {
            telephony,
            routing,
            phonebook,
            sco,
        } = collaborators;

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            runtime,
            telephony,
            routing,
            state: Mutex::new(EngineState::new(config, phonebook, sco)),
        })
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut EngineState, &mut Vec<Effect>) -> R) -> R {
        let mut effects = Vec::new();
        let result = {
            let mut state = self.state.lock();
            f(&mut state, &mut effects)
        };
        self.run_effects(effects);
        result
    }

    fn run_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Telephony(action) => self.perform(action),
                Effect::Routing(enabled) => {
                    info!("Bluetooth audio routing {}", if enabled { "on" } else { "off" });
                    self.routing.set_bluetooth_audio(enabled);
                }
                Effect::Schedule(token, delay) => self.schedule(token, delay),
                Effect::SpeakerVolume(level) => self.routing.set_speaker_volume(level),
                Effect::MicGain(level) => self.routing.set_microphone_gain(level),
            }
        }
    }

    fn perform(&self, action: TelephonyAction) {
        debug!("Telephony: {:?}", action);
        let result = match &action {
            TelephonyAction::Answer => self.telephony.answer(),
            TelephonyAction::Reject => self.telephony.reject(),
            TelephonyAction::HangupForeground => self.telephony.hangup_foreground(),
            TelephonyAction::HangupBackground => self.telephony.hangup_background(),
            TelephonyAction::SwitchHoldingAndActive => self.telephony.switch_holding_and_active(),
            TelephonyAction::Conference => self.telephony.conference(),
            TelephonyAction::Dial(number) => self.telephony.dial(number),
            TelephonyAction::SendDtmf(digit) => self.telephony.send_dtmf(*digit),
        };

        if let Err(e) = result {
            warn!("Telephony action {:?} failed: {}", action, e);
            if matches!(action, TelephonyAction::Dial(_)) {
                self.with_state(|state, _| {
                    if state.session.waiting_for_call_start {
                        state.finish_call_start(FinalResult::Error);
                    }
                });
            }
        }
    }

    fn schedule(&self, token: TimerToken, delay: Duration) {
        let engine = self.me.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(engine) = engine.upgrade() {
                engine.with_state(|state, effects| state.on_timer_fired(token, effects));
            }
        });
    }

    /// The Bluetooth stack came up: start listening for SCO.
    pub fn on_radio_enabled(&self) {
        self.with_state(|state, _| state.audio.enable());
    }

    pub fn on_radio_disabled(&self) {
        self.with_state(|state, effects| {
            let change = state.audio.disable();
            state.route(change, effects);
        });
    }

    /// A peer connected on the RFCOMM channel of `kind`.
    ///
    /// Lines for the peer are pushed into `sink` without framing.
    pub fn on_peer_connected(
        &self,
        address: String,
        kind: PeerKind,
        sink: mpsc::UnboundedSender<String>,
    ) {
        let status = self.telephony.status();

        self.with_state(|state, effects| {
            state.reset_session(effects);
            info!("Peer {} connected ({:?})", address, kind);

            state.session = Session {
                connected: true,
                sink: Some(sink),
                address: Some(address.clone()),
                kind,
                ..Session::default()
            };

            // Once callbacks have arrived the engine's copy is current; the
            // poll only seeds a fresh engine.
            if !state.calls_reported {
                state.calls = status.calls;
            }
            if !state.service_reported {
                state.service = status.service;
            }
            state.subscriber_number = status.subscriber_number;

            state
                .indicators
                .apply_service_state(state.service.in_service, state.service.roaming);
            state.indicators.apply_signal(status.signal_asu);
            state
                .indicators
                .apply_battery(status.battery_level, status.battery_scale);
            state.indicators.apply_calls(&state.calls);
            state.clcc.assign(&state.calls);

            state.audio.set_peer(Some(address));
            let possible = state.audio_possible();
            let change = state.audio.set_audio_possible(possible);
            state.route(change, effects);

            state.update_ringing(effects);
        });
    }

    /// Connection loss. Clears every piece of per-peer state.
    pub fn on_peer_disconnected(&self) {
        self.with_state(|state, effects| {
            if let Some(address) = &state.session.address {
                info!("Peer {} disconnected", address);
            }
            state.reset_session(effects);
        });
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().session.connected
    }

    /// Process one AT command line from the peer.
    pub fn handle_line(&self, line: &str) {
        self.with_state(|state, effects| {
            if !state.session.connected {
                warn!("Dropping AT line without a peer: {:?}", line);
                return;
            }
            debug!("AT <- {}", line);

            let status = match parse_line(line) {
                Err(e) => {
                    warn!("Malformed AT line {:?}: {}", line, e);
                    FinalResult::Error
                }
                Ok(parsed) => {
                    let mut status = FinalResult::Ok;
                    for command in &parsed {
                        let mut ctx = Ctx {
                            state: &mut *state,
                            effects: &mut *effects,
                        };
                        let result = commands::dispatch(&mut ctx, command);
                        for text in &result.lines {
                            state.session.send(text);
                        }
                        if result.status != FinalResult::Ok {
                            status = result.status;
                            break;
                        }
                    }
                    status
                }
            };

            state.session.send_result(status);
        });
    }

    /// The phone's call containers changed.
    pub fn on_call_state_changed(&self, calls: CallSnapshot) {
        self.with_state(|state, effects| state.on_call_state_changed(calls, effects));
    }

    pub fn on_service_state_changed(&self, service: ServiceState) {
        self.with_state(|state, _| {
            let diff = state
                .indicators
                .apply_service_state(service.in_service, service.roaming);
            state.send_updates(&diff);
            state.service = service;
            state.service_reported = true;
        });
    }

    /// Signal strength in ASU.
    pub fn on_signal_changed(&self, asu: u8) {
        self.with_state(|state, _| {
            let diff = state.indicators.apply_signal(asu);
            state.send_updates(&diff);
        });
    }

    pub fn on_battery_changed(&self, level: u32, scale: u32) {
        self.with_state(|state, _| {
            let diff = state.indicators.apply_battery(level, scale);
            state.send_updates(&diff);
        });
    }

    /// Speaker volume changed on the phone side.
    pub fn on_speaker_volume_changed(&self, level: u8) {
        self.with_state(|state, _| {
            if state.session.connected {
                state.session.send(&format!("+VGS: {}", level.min(15)));
            }
        });
    }

    /// Stop sending `RING` for the current call without rejecting it.
    pub fn ignore_ring(&self) {
        self.with_state(|state, _| {
            if state.ring.call.is_some() {
                info!("Ignoring ringing call");
                state.ring.ignored = true;
                state.timers.cancel(TimerKind::ReRing);
                state.timers.cancel(TimerKind::CallWaitingDisplay);
            }
        });
    }

    pub fn connect_audio(&self) {
        self.with_state(|state, effects| {
            let change = state.audio.connect();
            state.route(change, effects);
        });
    }

    pub fn disconnect_audio(&self) {
        self.with_state(|state, effects| {
            let change = state.audio.disconnect();
            state.route(change, effects);
        });
    }

    /// User-level audio switch.
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.with_state(|state, effects| {
            let change = state.audio.set_user_enabled(enabled);
            state.route(change, effects);
        });
    }

    pub fn on_sco_accepted(&self, handle: ScoHandle) {
        self.with_state(|state, effects| {
            let change = state.audio.on_accepted(handle);
            state.route(change, effects);
        });
    }

    pub fn on_sco_connected(&self, handle: ScoHandle, success: bool) {
        self.with_state(|state, effects| {
            let change = state.audio.on_connect_result(handle, success);
            state.route(change, effects);
        });
    }

    pub fn on_sco_closed(&self, handle: ScoHandle) {
        self.with_state(|state, effects| {
            let change = state.audio.on_closed(handle);
            state.route(change, effects);
        });
    }

    pub fn indicator_snapshot(&self) -> IndicatorSnapshot {
        self.state.lock().indicators.snapshot()
    }

    /// Feature bits from the peer's `AT+BRSF`, if it sent one.
    pub fn peer_features(&self) -> Option<u32> {
        self.state.lock().session.hf_features
    }

    pub fn audio_state(&self) -> AudioState {
        self.state.lock().audio.state()
    }

    /// Current `+CLCC` numbering.
    pub fn call_lines(&self) -> Vec<CallLineRecord> {
        let mut state = self.state.lock();
        let state = &mut *state;
        state.clcc.assign(&state.calls)
    }
}
