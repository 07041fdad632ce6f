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

//! AT command table and handlers.
//!
//! Every command name maps to one [`CommandHandler`] with an optional
//! function per syntactic form. A form without a function answers
//! "operation not supported".

use tracing::{debug, info};

use super::engine::{Charset, Effect, EngineState, TelephonyAction};
use super::indicators::CIND_TEST_RESPONSE;
use super::phonebook::NOMINAL_CAPACITY;
use super::timers::TimerKind;
use crate::at::{AtCommand, AtResult, CommandForm};
use crate::error::CmeError;
use crate::telephony::{number_type, CallState, PhoneState, PhonebookKind};

/// Features reported in `+BRSF`: three-way calling, EC/NR, call reject,
/// enhanced call status and extended error codes.
pub const AG_FEATURES: u32 = 1 | 2 | 32 | 64 | 256;

/// The only `+CKPD` code a headset sends.
const HEADSET_BUTTON: i64 = 200;

const MAX_GAIN: i64 = 15;

/// Handler state for one command.
pub(crate) struct Ctx<'a> {
    pub state: &'a mut EngineState,
    pub effects: &'a mut Vec<Effect>,
}

impl Ctx<'_> {
    fn telephony(&mut self, action: TelephonyAction) {
        self.effects.push(Effect::Telephony(action));
    }

    fn arm(&mut self, kind: TimerKind) {
        self.state.arm(kind, self.effects);
    }
}

type Handler = for<'a, 'b> fn(&'a mut Ctx<'b>, &AtCommand) -> AtResult;

pub(crate) struct CommandHandler {
    name: &'static str,
    basic: Option<Handler>,
    action: Option<Handler>,
    read: Option<Handler>,
    set: Option<Handler>,
    test: Option<Handler>,
}

const UNSUPPORTED: CommandHandler = CommandHandler {
    name: "",
    basic: None,
    action: None,
    read: None,
    set: None,
    test: None,
};

static COMMAND_TABLE: &[CommandHandler] = &[
    CommandHandler {
        name: "A",
        basic: Some(answer),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "D",
        basic: Some(dial),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+BLDN",
        action: Some(redial),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CHUP",
        action: Some(hang_up),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+BRSF",
        set: Some(brsf_set),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CIND",
        read: Some(cind_read),
        test: Some(cind_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CMER",
        read: Some(cmer_read),
        set: Some(cmer_set),
        test: Some(cmer_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CMEE",
        read: Some(cmee_read),
        set: Some(cmee_set),
        test: Some(cmee_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CLCC",
        action: Some(clcc),
        test: Some(ok),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CHLD",
        set: Some(chld_set),
        test: Some(chld_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CSQ",
        action: Some(csq),
        test: Some(csq_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CREG",
        read: Some(creg_read),
        set: Some(creg_set),
        test: Some(creg_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+VTS",
        set: Some(vts_set),
        test: Some(vts_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+COPS",
        read: Some(cops_read),
        set: Some(cops_set),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CNUM",
        action: Some(cnum),
        test: Some(ok),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CPAS",
        action: Some(cpas),
        test: Some(cpas_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CSCS",
        read: Some(cscs_read),
        set: Some(cscs_set),
        test: Some(cscs_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CPBS",
        read: Some(cpbs_read),
        set: Some(cpbs_set),
        test: Some(cpbs_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CPBR",
        set: Some(cpbr_set),
        test: Some(cpbr_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CKPD",
        set: Some(ckpd_set),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CLIP",
        read: Some(clip_read),
        set: Some(clip_set),
        test: Some(clip_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CCWA",
        read: Some(ccwa_read),
        set: Some(ccwa_set),
        test: Some(ccwa_test),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+VGS",
        set: Some(vgs_set),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+VGM",
        set: Some(vgm_set),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+NREC",
        set: Some(nrec_set),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CGMI",
        action: Some(cgmi),
        test: Some(ok),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CGMM",
        action: Some(cgmm),
        test: Some(ok),
        ..UNSUPPORTED
    },
    CommandHandler {
        name: "+CGMR",
        action: Some(cgmr),
        test: Some(ok),
        ..UNSUPPORTED
    },
];

/// Run one parsed command.
pub(crate) fn dispatch(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    let Some(entry) = COMMAND_TABLE.iter().find(|h| h.name == command.name) else {
        debug!("Unknown command {}", command);
        return AtResult::cme(CmeError::OperationNotSupported);
    };

    let handler = match command.form {
        CommandForm::Basic => entry.basic,
        CommandForm::Action => entry.action,
        CommandForm::Read => entry.read,
        CommandForm::Set => entry.set,
        CommandForm::Test => entry.test,
    };

    match handler {
        Some(handler) => handler(ctx, command),
        None => {
            debug!("Unsupported form {}", command);
            AtResult::cme(CmeError::OperationNotSupported)
        }
    }
}

fn ok(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::ok()
}

fn int_arg(command: &AtCommand, index: usize) -> Result<i64, CmeError> {
    command
        .int_arg(index)
        .ok_or(CmeError::IncorrectParameters)
}

fn flag_arg(command: &AtCommand) -> Result<bool, CmeError> {
    match int_arg(command, 0)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(CmeError::OperationNotSupported),
    }
}

fn gain_arg(command: &AtCommand) -> Result<u8, CmeError> {
    let level = int_arg(command, 0)?;
    if (0..=MAX_GAIN).contains(&level) {
        Ok(level as u8)
    } else {
        Err(CmeError::IncorrectParameters)
    }
}

fn is_ringing(ctx: &Ctx<'_>) -> bool {
    let ringing = &ctx.state.calls.ringing;
    ringing.is_alive() && ringing.state.is_ringing()
}

fn is_valid_dial_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '*' | '#' | '+' | 'A'..='D' | ',' | 'p' | 'P' | 'w' | 'W')
}

fn is_valid_dtmf(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '*' | '#' | 'A'..='D')
}

/// Start an outgoing call and defer the final result.
fn start_dial(ctx: &mut Ctx<'_>, number: String) -> AtResult {
    if ctx.state.session.waiting_for_call_start {
        return AtResult::cme(CmeError::OperationNotAllowed);
    }
    info!("Dialing {}", number);
    ctx.telephony(TelephonyAction::Dial(number));
    ctx.state.begin_call_start(ctx.effects);
    AtResult::deferred()
}

/// Most recent outgoing number, then dial it.
fn dial_last(ctx: &mut Ctx<'_>) -> AtResult {
    match ctx.state.phonebook.last_dialed() {
        Ok(Some(number)) => start_dial(ctx, number),
        Ok(None) => {
            info!("No number to redial");
            AtResult::error()
        }
        Err(e) => AtResult::cme(e),
    }
}

fn answer(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    if !is_ringing(ctx) {
        return AtResult::cme(CmeError::OperationNotAllowed);
    }
    ctx.telephony(TelephonyAction::Answer);
    AtResult::ok()
}

fn dial(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    let target = command.raw_args.trim().trim_end_matches(';');

    if let Some(index) = target.strip_prefix('>') {
        let index: usize = match index.trim().parse() {
            Ok(index) => index,
            Err(_) => return AtResult::cme(CmeError::InvalidIndex),
        };
        return match ctx.state.phonebook.entry_at(index) {
            Ok(entry) => start_dial(ctx, entry.number),
            Err(e) => AtResult::cme(e),
        };
    }

    if target.is_empty() {
        return AtResult::cme(CmeError::IncorrectParameters);
    }
    if !target.chars().all(is_valid_dial_char) {
        return AtResult::cme(CmeError::InvalidDialCharacters);
    }
    start_dial(ctx, target.to_string())
}

fn redial(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    dial_last(ctx)
}

fn hang_up(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    let action = if is_ringing(ctx) {
        TelephonyAction::Reject
    } else if ctx.state.calls.foreground.is_alive() {
        TelephonyAction::HangupForeground
    } else if ctx.state.calls.background.is_alive() {
        TelephonyAction::HangupBackground
    } else {
        return AtResult::cme(CmeError::OperationNotAllowed);
    };
    ctx.telephony(action);
    AtResult::ok()
}

fn brsf_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    let features = match int_arg(command, 0) {
        Ok(features) if features >= 0 => features,
        _ => return AtResult::cme(CmeError::IncorrectParameters),
    };
    ctx.state.session.hf_features = Some(features as u32);
    debug!("Peer features {:#x}", features);
    AtResult::line(format!("+BRSF: {}", AG_FEATURES))
}

fn cind_read(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(ctx.state.indicators.to_cind_result())
}

fn cind_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(CIND_TEST_RESPONSE)
}

fn cmer_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    match indicator_reporting(command) {
        Ok(enabled) => {
            ctx.state.session.indicators_enabled = enabled;
            AtResult::ok()
        }
        Err(e) => AtResult::cme(e),
    }
}

/// `+CMER=3,0,0,<ind>`: only mode 3 is supported.
fn indicator_reporting(command: &AtCommand) -> Result<bool, CmeError> {
    if command.args.len() < 4 || int_arg(command, 0)? != 3 {
        return Err(CmeError::OperationNotSupported);
    }
    match int_arg(command, 3)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(CmeError::OperationNotSupported),
    }
}

fn cmer_read(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(format!(
        "+CMER: 3,0,0,{}",
        u8::from(ctx.state.session.indicators_enabled)
    ))
}

fn cmer_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+CMER: (3),(0),(0),(0-1)")
}

fn cmee_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    match flag_arg(command) {
        Ok(enabled) => {
            ctx.state.session.cme_enabled = enabled;
            AtResult::ok()
        }
        Err(e) => AtResult::cme(e),
    }
}

fn cmee_read(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(format!(
        "+CMEE: {}",
        u8::from(ctx.state.session.cme_enabled)
    ))
}

fn cmee_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+CMEE: (0-1)")
}

fn clcc(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    let state = &mut *ctx.state;
    let records = state.clcc.assign(&state.calls);
    AtResult::lines(records.iter().map(|r| r.to_string()).collect())
}

fn chld_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    let Some(op) = command.int_arg(0) else {
        return AtResult::cme(CmeError::OperationNotSupported);
    };
    if !(0..=3).contains(&op) {
        return AtResult::cme(CmeError::OperationNotSupported);
    }
    if ctx.state.multiparty_locked {
        return AtResult::cme(CmeError::OperationNotAllowed);
    }

    let ringing = is_ringing(ctx);
    let calls = &ctx.state.calls;
    let fg_alive = calls.foreground.is_alive();
    let bg_alive = calls.background.is_alive();

    let actions = match op {
        0 if ringing => vec![TelephonyAction::Reject],
        0 if bg_alive => vec![TelephonyAction::HangupBackground],
        1 if ringing && fg_alive => vec![
            TelephonyAction::HangupForeground,
            TelephonyAction::Answer,
        ],
        1 if ringing => vec![TelephonyAction::Answer],
        1 if fg_alive && bg_alive => vec![
            TelephonyAction::HangupForeground,
            TelephonyAction::SwitchHoldingAndActive,
        ],
        1 if fg_alive => vec![TelephonyAction::HangupForeground],
        1 if bg_alive => vec![TelephonyAction::SwitchHoldingAndActive],
        2 if ringing => vec![TelephonyAction::Answer],
        2 if fg_alive || bg_alive => vec![TelephonyAction::SwitchHoldingAndActive],
        3 if calls.foreground.state == CallState::Active
            && calls.background.state == CallState::Holding
            && fg_alive
            && bg_alive =>
        {
            vec![TelephonyAction::Conference]
        }
        _ => return AtResult::cme(CmeError::OperationNotAllowed),
    };

    for action in actions {
        ctx.telephony(action);
    }
    if op != 0 {
        ctx.state.multiparty_locked = true;
        ctx.arm(TimerKind::AddCallReenable);
    }
    AtResult::ok()
}

fn chld_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+CHLD: (0,1,2,3)")
}

fn csq(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(ctx.state.indicators.to_csq_result())
}

fn csq_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+CSQ: (0-31,99),(0-7,99)")
}

fn creg_read(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(ctx.state.indicators.to_creg_result())
}

fn creg_set(_ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    match flag_arg(command) {
        Ok(_) => AtResult::ok(),
        Err(e) => AtResult::cme(e),
    }
}

fn creg_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+CREG: (0-1)")
}

fn vts_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    let Some(text) = command.arg(0).and_then(|a| a.as_text()) else {
        return AtResult::error();
    };
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(digit), None) if is_valid_dtmf(digit) => {
            ctx.telephony(TelephonyAction::SendDtmf(digit));
            AtResult::ok()
        }
        _ => AtResult::error(),
    }
}

fn vts_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+VTS: (0-9,#,*,A-D)")
}

fn cops_read(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    let service = &ctx.state.service;
    match service.operator.as_deref() {
        Some(name) if service.in_service => {
            let name: String = name.chars().take(16).collect();
            AtResult::line(format!("+COPS: 0,0,\"{}\"", name))
        }
        _ => AtResult::line("+COPS: 0"),
    }
}

fn cops_set(_ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    // Only selecting the long alphanumeric format is supported.
    if command.int_arg(0) == Some(3) && command.int_arg(1) == Some(0) {
        AtResult::ok()
    } else {
        AtResult::cme(CmeError::OperationNotSupported)
    }
}

fn cnum(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    match ctx.state.subscriber_number.as_deref() {
        Some(number) => AtResult::line(format!(
            "+CNUM: ,\"{}\",{},,4",
            number,
            number_type(number)
        )),
        None => AtResult::cme(CmeError::SimFailure),
    }
}

fn cpas(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    let status = match ctx.state.calls.phone_state() {
        PhoneState::Idle => 0,
        PhoneState::Ringing => 3,
        PhoneState::OffHook => 4,
    };
    AtResult::line(format!("+CPAS: {}", status))
}

fn cpas_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+CPAS: (0-5)")
}

fn cscs_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    match command.arg(0).and_then(|a| a.as_text()).and_then(|s| Charset::parse(&s)) {
        Some(charset) => {
            ctx.state.session.charset = charset;
            AtResult::ok()
        }
        None => AtResult::cme(CmeError::OperationNotSupported),
    }
}

fn cscs_read(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(format!("+CSCS: \"{}\"", ctx.state.session.charset.as_str()))
}

fn cscs_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+CSCS: (\"UTF-8\",\"GSM\")")
}

fn cpbs_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    let Some(kind) = command
        .arg(0)
        .and_then(|a| a.as_text())
        .and_then(|s| PhonebookKind::parse(&s))
    else {
        return AtResult::cme(CmeError::OperationNotSupported);
    };
    match ctx.state.phonebook.select(kind) {
        Ok(()) => AtResult::ok(),
        Err(e) => AtResult::cme(e),
    }
}

fn cpbs_read(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    let book = &mut ctx.state.phonebook;
    match book.size() {
        Ok(used) => AtResult::line(format!(
            "+CPBS: \"{}\",{},{}",
            book.selected().code(),
            used,
            used.max(NOMINAL_CAPACITY)
        )),
        Err(e) => AtResult::cme(e),
    }
}

fn cpbs_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    let codes: Vec<String> = PhonebookKind::ALL
        .iter()
        .map(|k| format!("\"{}\"", k.code()))
        .collect();
    AtResult::line(format!("+CPBS: ({})", codes.join(",")))
}

fn cpbr_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    read_phonebook(ctx, command).into()
}

fn read_phonebook(ctx: &mut Ctx<'_>, command: &AtCommand) -> Result<AtResult, CmeError> {
    let first = int_arg(command, 0)?;
    let last = match command.arg(1) {
        Some(_) => int_arg(command, 1)?,
        None => first,
    };
    if first < 1 || last < 1 {
        return Err(CmeError::InvalidIndex);
    }
    let lines = ctx.state.phonebook.read(first as usize, last as usize)?;
    Ok(AtResult::lines(lines))
}

fn cpbr_test(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    let book = &mut ctx.state.phonebook;
    match book.requery().and_then(|_| book.size()) {
        Ok(size) => AtResult::line(format!("+CPBR: (1-{}),30,30", size.max(1))),
        Err(e) => AtResult::cme(e),
    }
}

fn ckpd_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    if command.int_arg(0) != Some(HEADSET_BUTTON) {
        return AtResult::cme(CmeError::OperationNotSupported);
    }

    if is_ringing(ctx) {
        ctx.telephony(TelephonyAction::Answer);
        let change = ctx.state.audio.connect();
        ctx.state.route(change, ctx.effects);
    } else if !ctx.state.calls.is_idle() {
        let change = if ctx.state.audio.is_connected() {
            ctx.telephony(TelephonyAction::HangupForeground);
            None
        } else {
            ctx.state.audio.connect()
        };
        ctx.state.route(change, ctx.effects);
    } else {
        return dial_last(ctx);
    }
    AtResult::ok()
}

fn clip_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    match flag_arg(command) {
        Ok(enabled) => {
            ctx.state.session.clip_enabled = enabled;
            AtResult::ok()
        }
        Err(e) => AtResult::cme(e),
    }
}

fn clip_read(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(format!(
        "+CLIP: {},1",
        u8::from(ctx.state.session.clip_enabled)
    ))
}

fn clip_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+CLIP: (0-1)")
}

fn ccwa_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    match flag_arg(command) {
        Ok(enabled) => {
            ctx.state.session.ccwa_enabled = enabled;
            AtResult::ok()
        }
        Err(e) => AtResult::cme(e),
    }
}

fn ccwa_read(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(format!(
        "+CCWA: {}",
        u8::from(ctx.state.session.ccwa_enabled)
    ))
}

fn ccwa_test(_ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line("+CCWA: (0-1)")
}

fn vgs_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    match gain_arg(command) {
        Ok(level) => {
            ctx.effects.push(Effect::SpeakerVolume(level));
            AtResult::ok()
        }
        Err(e) => AtResult::cme(e),
    }
}

fn vgm_set(ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    match gain_arg(command) {
        Ok(level) => {
            ctx.effects.push(Effect::MicGain(level));
            AtResult::ok()
        }
        Err(e) => AtResult::cme(e),
    }
}

fn nrec_set(_ctx: &mut Ctx<'_>, command: &AtCommand) -> AtResult {
    // Echo cancellation can be turned off but not on.
    match command.int_arg(0) {
        Some(0) => AtResult::ok(),
        _ => AtResult::cme(CmeError::OperationNotSupported),
    }
}

fn cgmi(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(format!("+CGMI: {}", ctx.state.config.manufacturer))
}

fn cgmm(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(format!("+CGMM: {}", ctx.state.config.model))
}

fn cgmr(ctx: &mut Ctx<'_>, _command: &AtCommand) -> AtResult {
    AtResult::line(format!("+CGMR: {}", ctx.state.config.revision))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brsf_bitmap() {
        assert_eq!(AG_FEATURES, 355);
    }

    #[test]
    fn test_dtmf_digits() {
        for c in "0123456789*#ABCD".chars() {
            assert!(is_valid_dtmf(c), "{}", c);
        }
        for c in "XEa+,".chars() {
            assert!(!is_valid_dtmf(c), "{}", c);
        }
    }

    #[test]
    fn test_dial_characters() {
        assert!("+1555,p12W#".chars().all(is_valid_dial_char));
        assert!(!"555-1234".chars().all(is_valid_dial_char));
    }

    #[test]
    fn test_table_names_are_unique() {
        for (i, a) in COMMAND_TABLE.iter().enumerate() {
            for b in &COMMAND_TABLE[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }
}
