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

//! Operator console driving the simulated phone.

use anyhow::Result;
use std::fmt::Write as _;

use crate::hfp::HandsfreeEngine;
use crate::sim::SimPhone;
use crate::storage::PhonebookStore;
use crate::telephony::Telephony;

/// Help text printed for `help` and unknown input.
pub const HELP: &str = "\
commands:
  incoming <number>   simulate an incoming call
  dial <number>       place a call from the phone
  alert | connect     progress the outgoing call
  answer | hangup     answer or end the current call
  remote-hangup       the other party ends the call
  hold                swap active and held calls
  ignore              stop ringing the peer
  signal <0-31>       set signal strength (ASU)
  battery <0-100>     set battery level
  service on|off      toggle network service
  number <n>|none     set or clear the subscriber number
  volume <0-15>       report a speaker volume change
  audio on|off        allow or forbid SCO audio
  log                 show recent calls
  clear-log           erase the call log
  status              show phone and peer state
  quit";

/// One console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Incoming(String),
    Dial(String),
    Alert,
    Connect,
    Answer,
    Hangup,
    RemoteHangup,
    Hold,
    Ignore,
    Signal(u8),
    Battery(u32),
    Service(bool),
    Number(Option<String>),
    Volume(u8),
    Audio(bool),
    Log,
    ClearLog,
    Status,
    Help,
    Quit,
}

fn on_off(arg: Option<&str>) -> Option<bool> {
    match arg? {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

impl ConsoleCommand {
    /// Parse a console line. Returns `None` for unknown or malformed input.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?.to_lowercase();
        let arg = words.next();

        let command = match verb.as_str() {
            "incoming" => ConsoleCommand::Incoming(arg.unwrap_or("").to_string()),
            "dial" => ConsoleCommand::Dial(arg?.to_string()),
            "alert" => ConsoleCommand::Alert,
            "connect" => ConsoleCommand::Connect,
            "answer" => ConsoleCommand::Answer,
            "hangup" => ConsoleCommand::Hangup,
            "remote-hangup" => ConsoleCommand::RemoteHangup,
            "hold" => ConsoleCommand::Hold,
            "ignore" => ConsoleCommand::Ignore,
            "signal" => ConsoleCommand::Signal(arg?.parse().ok().filter(|v| *v <= 31)?),
            "battery" => ConsoleCommand::Battery(arg?.parse().ok().filter(|v| *v <= 100)?),
            "service" => ConsoleCommand::Service(on_off(arg)?),
            "number" => ConsoleCommand::Number(match arg? {
                "none" => None,
                number => Some(number.to_string()),
            }),
            "volume" => ConsoleCommand::Volume(arg?.parse().ok().filter(|v| *v <= 15)?),
            "audio" => ConsoleCommand::Audio(on_off(arg)?),
            "log" => ConsoleCommand::Log,
            "clear-log" => ConsoleCommand::ClearLog,
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            _ => return None,
        };
        Some(command)
    }

    /// Run the command, returning text for the operator.
    pub fn execute(
        &self,
        phone: &SimPhone,
        engine: &HandsfreeEngine,
        store: &PhonebookStore,
    ) -> Result<String> {
        match self {
            ConsoleCommand::Incoming(number) => phone.incoming(number)?,
            ConsoleCommand::Dial(number) => phone.dial(number)?,
            ConsoleCommand::Alert => phone.alert()?,
            ConsoleCommand::Connect => phone.connect_outgoing()?,
            ConsoleCommand::Answer => phone.answer()?,
            ConsoleCommand::Hangup => {
                if phone.calls().ringing.is_alive() {
                    phone.reject()?
                } else {
                    phone.hangup_foreground()?
                }
            }
            ConsoleCommand::RemoteHangup => phone.remote_hangup()?,
            ConsoleCommand::Hold => phone.switch_holding_and_active()?,
            ConsoleCommand::Ignore => engine.ignore_ring(),
            ConsoleCommand::Signal(asu) => phone.set_signal(*asu),
            ConsoleCommand::Battery(level) => phone.set_battery(*level),
            ConsoleCommand::Service(on) => phone.set_service(*on, false),
            ConsoleCommand::Number(number) => phone.set_subscriber_number(number.as_deref()),
            ConsoleCommand::Volume(level) => engine.on_speaker_volume_changed(*level),
            ConsoleCommand::Audio(on) => engine.set_audio_enabled(*on),
            ConsoleCommand::Log => return Self::call_log(store),
            ConsoleCommand::ClearLog => store.clear_call_log()?,
            ConsoleCommand::Status => return Ok(Self::status(phone, engine)),
            ConsoleCommand::Help => return Ok(HELP.to_string()),
            ConsoleCommand::Quit => return Ok(String::new()),
        }
        Ok("ok".to_string())
    }

    fn call_log(store: &PhonebookStore) -> Result<String> {
        let mut out = String::new();
        for entry in store.recent_calls(10)? {
            let _ = writeln!(
                out,
                "{} {:?} {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.kind,
                entry.number
            );
        }
        if out.is_empty() {
            out.push_str("call log empty");
        }
        Ok(out.trim_end().to_string())
    }

    fn status(phone: &SimPhone, engine: &HandsfreeEngine) -> String {
        let calls = phone.calls();
        let ind = engine.indicator_snapshot();
        let audio = engine.audio_state();

        let mut out = String::new();
        let _ = writeln!(out, "phone: {:?}", calls.phone_state());
        for record in engine.call_lines() {
            let _ = writeln!(out, "  {}", record);
        }
        let _ = writeln!(
            out,
            "indicators: service={} call={} callsetup={} callheld={} signal={} roam={} battery={}",
            u8::from(ind.service),
            u8::from(ind.call),
            ind.callsetup as u8,
            ind.callheld as u8,
            ind.signal,
            u8::from(ind.roam),
            ind.battery
        );
        let peer = match (engine.is_connected(), engine.peer_features()) {
            (false, _) => "none".to_string(),
            (true, Some(features)) => format!("connected features={:#x}", features),
            (true, None) => "connected".to_string(),
        };
        let _ = write!(
            out,
            "peer: {} audio: incoming={:?} outgoing={} connected={} possible={} allowed={}",
            peer,
            audio.incoming,
            audio.outgoing,
            audio.connected,
            audio.possible,
            audio.allowed
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            ConsoleCommand::parse("incoming 5551234"),
            Some(ConsoleCommand::Incoming("5551234".to_string()))
        );
        assert_eq!(
            ConsoleCommand::parse("incoming"),
            Some(ConsoleCommand::Incoming(String::new()))
        );
        assert_eq!(
            ConsoleCommand::parse("  SIGNAL 12 "),
            Some(ConsoleCommand::Signal(12))
        );
        assert_eq!(
            ConsoleCommand::parse("service off"),
            Some(ConsoleCommand::Service(false))
        );
        assert_eq!(
            ConsoleCommand::parse("number +15550100"),
            Some(ConsoleCommand::Number(Some("+15550100".to_string())))
        );
        assert_eq!(
            ConsoleCommand::parse("number none"),
            Some(ConsoleCommand::Number(None))
        );
        assert_eq!(
            ConsoleCommand::parse("clear-log"),
            Some(ConsoleCommand::ClearLog)
        );
        assert_eq!(ConsoleCommand::parse("quit"), Some(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(ConsoleCommand::parse(""), None);
        assert_eq!(ConsoleCommand::parse("dial"), None);
        assert_eq!(ConsoleCommand::parse("number"), None);
        assert_eq!(ConsoleCommand::parse("signal 40"), None);
        assert_eq!(ConsoleCommand::parse("battery x"), None);
        assert_eq!(ConsoleCommand::parse("service maybe"), None);
        assert_eq!(ConsoleCommand::parse("reboot"), None);
    }
}
