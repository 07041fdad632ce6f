//! End-to-end scenarios: a peer talking AT to the engine in front of the
//! simulated phone.

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::sleep;

use hfp_gateway::config::EngineConfig;
use hfp_gateway::console::ConsoleCommand;
use hfp_gateway::hfp::indicators::CIND_TEST_RESPONSE;
use hfp_gateway::hfp::{Collaborators, HandsfreeEngine, PeerKind};
use hfp_gateway::sim::{SimAudio, SimPhone, SimSco};
use hfp_gateway::storage::{CallLogKind, PhonebookStore};
use hfp_gateway::telephony::{
    Call, CallSnapshot, CallState, Connection, NumberLabel, PhoneStatus, Telephony,
};

const PEER: &str = "00:11:22:33:44:55";

struct Harness {
    engine: Arc<HandsfreeEngine>,
    phone: Arc<SimPhone>,
    sco: Arc<SimSco>,
    audio: Arc<SimAudio>,
    store: PhonebookStore,
    rx: mpsc::UnboundedReceiver<String>,
}

impl Harness {
    fn new(kind: PeerKind) -> Self {
        let store = PhonebookStore::in_memory(100).unwrap();
        let phone = SimPhone::new(Some(store.clone()));
        let sco = SimSco::new();
        let audio = SimAudio::new();

        let engine = HandsfreeEngine::new(
            EngineConfig::default(),
            Collaborators {
                telephony: phone.clone(),
                routing: audio.clone(),
                phonebook: Arc::new(store.clone()),
                sco: sco.clone(),
            },
            Handle::current(),
        );
        phone.attach(&engine);
        sco.attach(&engine, Handle::current());
        engine.on_radio_enabled();

        let (tx, rx) = mpsc::unbounded_channel();
        engine.on_peer_connected(PEER.to_string(), kind, tx);

        Self {
            engine,
            phone,
            sco,
            audio,
            store,
            rx,
        }
    }

    fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    fn send(&mut self, line: &str) -> Vec<String> {
        self.engine.handle_line(line);
        self.drain()
    }

    /// Drop the peer and connect a fresh one of the same kind.
    fn reconnect(&mut self, kind: PeerKind) {
        self.engine.on_peer_disconnected();
        let (tx, rx) = mpsc::unbounded_channel();
        self.engine.on_peer_connected(PEER.to_string(), kind, tx);
        self.rx = rx;
    }

    fn console(&self, command: ConsoleCommand) -> String {
        command
            .execute(&self.phone, &self.engine, &self.store)
            .unwrap()
    }
}

/// A phone that accepts every request and never reports back.
#[derive(Default)]
struct SilentPhone {
    actions: Mutex<Vec<String>>,
}

impl Telephony for SilentPhone {
    fn status(&self) -> PhoneStatus {
        PhoneStatus {
            battery_scale: 100,
            ..Default::default()
        }
    }
    fn answer(&self) -> Result<()> {
        self.actions.lock().push("answer".into());
        Ok(())
    }
    fn reject(&self) -> Result<()> {
        self.actions.lock().push("reject".into());
        Ok(())
    }
    fn hangup_foreground(&self) -> Result<()> {
        self.actions.lock().push("hangup_fg".into());
        Ok(())
    }
    fn hangup_background(&self) -> Result<()> {
        self.actions.lock().push("hangup_bg".into());
        Ok(())
    }
    fn switch_holding_and_active(&self) -> Result<()> {
        self.actions.lock().push("switch".into());
        Ok(())
    }
    fn conference(&self) -> Result<()> {
        self.actions.lock().push("conference".into());
        Ok(())
    }
    fn dial(&self, number: &str) -> Result<()> {
        self.actions.lock().push(format!("dial {}", number));
        Ok(())
    }
    fn send_dtmf(&self, digit: char) -> Result<()> {
        self.actions.lock().push(format!("dtmf {}", digit));
        Ok(())
    }
}

fn single(state: CallState, number: &str, created_at: u64, incoming: bool) -> Call {
    Call::new(
        state,
        vec![Connection {
            address: Some(number.to_string()),
            created_at,
            incoming,
        }],
    )
}

/// An engine in front of a [`SilentPhone`], with a connected peer.
fn silent_engine() -> (
    Arc<SilentPhone>,
    Arc<HandsfreeEngine>,
    mpsc::UnboundedReceiver<String>,
) {
    let phone = Arc::new(SilentPhone::default());
    let store = PhonebookStore::in_memory(100).unwrap();
    let engine = HandsfreeEngine::new(
        EngineConfig::default(),
        Collaborators {
            telephony: phone.clone(),
            routing: SimAudio::new(),
            phonebook: Arc::new(store),
            sco: SimSco::new(),
        },
        Handle::current(),
    );
    let (tx, rx) = mpsc::unbounded_channel();
    engine.on_peer_connected(PEER.to_string(), PeerKind::Handsfree, tx);
    (phone, engine, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}

#[tokio::test]
async fn test_indicator_queries() {
    let mut h = Harness::new(PeerKind::Handsfree);

    assert_eq!(h.send("AT+CIND=?"), vec![CIND_TEST_RESPONSE, "OK"]);
    assert_eq!(h.send("AT+CIND?"), vec!["+CIND: 1,0,0,0,5,0,5", "OK"]);

    h.phone.set_service(true, true);
    h.phone.set_battery(40);
    assert_eq!(h.send("AT+CIND?"), vec!["+CIND: 1,0,0,0,5,1,2", "OK"]);
    assert_eq!(h.send("AT+CREG?"), vec!["+CREG: 1,5", "OK"]);
}

#[tokio::test]
async fn test_indicator_events_after_cmer() {
    let mut h = Harness::new(PeerKind::Handsfree);
    assert_eq!(h.send("AT+CMER=3,0,0,1"), vec!["OK"]);

    h.phone.incoming("5551234").unwrap();
    assert_eq!(h.drain(), vec!["+CIEV: 3,1", "RING"]);

    h.phone.answer().unwrap();
    assert_eq!(h.drain(), vec!["+CIEV: 2,1", "+CIEV: 3,0"]);

    h.phone.set_service(false, false);
    assert_eq!(h.drain(), vec!["+CIEV: 1,0"]);
}

#[tokio::test]
async fn test_redial_confirmed_by_call_start() {
    let mut h = Harness::new(PeerKind::Handsfree);
    h.store
        .record_call("5551234", CallLogKind::Outgoing)
        .unwrap();

    assert_eq!(h.send("AT+BLDN"), vec!["OK"]);
    assert_eq!(h.phone.dialed(), vec!["5551234"]);
    assert_eq!(h.phone.calls().foreground.state, CallState::Dialing);
}

#[tokio::test(start_paused = true)]
async fn test_redial_times_out_without_call_start() {
    let mut h = Harness::new(PeerKind::Handsfree);
    h.store
        .record_call("5551234", CallLogKind::Outgoing)
        .unwrap();
    h.phone.set_auto_start(false);

    assert!(h.send("AT+BLDN").is_empty());

    sleep(Duration::from_millis(9_000)).await;
    assert!(h.drain().is_empty());

    sleep(Duration::from_millis(1_100)).await;
    assert_eq!(h.drain(), vec!["ERROR"]);

    // The call showing up late changes nothing on the wire.
    h.phone.set_auto_start(true);
    h.phone.dial("5551234").unwrap();
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn test_redial_without_history() {
    let mut h = Harness::new(PeerKind::Handsfree);
    assert_eq!(h.send("AT+BLDN"), vec!["ERROR"]);
    assert!(h.phone.dialed().is_empty());
}

#[tokio::test]
async fn test_dial_errors() {
    let mut h = Harness::new(PeerKind::Handsfree);
    assert_eq!(h.send("AT+CMEE=1"), vec!["OK"]);

    assert_eq!(h.send("ATD;"), vec!["+CME ERROR: 50"]);
    assert_eq!(h.send("ATD555x1234;"), vec!["+CME ERROR: 27"]);
    assert_eq!(h.send("ATD>7;"), vec!["+CME ERROR: 21"]);

    h.phone.set_fail_dials(true);
    assert_eq!(h.send("ATD5551234;"), vec!["ERROR"]);
}

#[tokio::test]
async fn test_memory_dial() {
    let mut h = Harness::new(PeerKind::Handsfree);
    h.store
        .add_contact("Alice", "+15551234", NumberLabel::Mobile)
        .unwrap();

    assert_eq!(h.send("ATD>1;"), vec!["OK"]);
    assert_eq!(h.phone.dialed(), vec!["+15551234"]);
}

#[tokio::test]
async fn test_dtmf() {
    let mut h = Harness::new(PeerKind::Handsfree);
    assert_eq!(h.send("AT+CMEE=1"), vec!["OK"]);

    assert_eq!(h.send("AT+VTS=5"), vec!["OK"]);
    assert_eq!(h.send("AT+VTS=#"), vec!["OK"]);
    assert_eq!(h.phone.dtmf(), vec!['5', '#']);

    assert_eq!(h.send("AT+VTS=X"), vec!["ERROR"]);
    assert_eq!(h.send("AT+VTS=12"), vec!["ERROR"]);
    assert_eq!(h.phone.dtmf().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_ring_repeats_until_answered() {
    let mut h = Harness::new(PeerKind::Handsfree);
    assert_eq!(h.send("AT+CLIP=1"), vec!["OK"]);

    h.phone.incoming("+15551234").unwrap();
    assert_eq!(h.drain(), vec!["RING", "+CLIP: \"+15551234\",145"]);

    sleep(Duration::from_millis(3_100)).await;
    assert_eq!(h.drain(), vec!["RING", "+CLIP: \"+15551234\",145"]);

    sleep(Duration::from_millis(3_000)).await;
    assert_eq!(h.drain(), vec!["RING", "+CLIP: \"+15551234\",145"]);

    assert_eq!(h.send("ATA"), vec!["OK"]);
    sleep(Duration::from_millis(10_000)).await;
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_waiting_call_announced_with_ccwa() {
    let mut h = Harness::new(PeerKind::Handsfree);
    assert_eq!(h.send("AT+CCWA=1"), vec!["OK"]);

    h.phone.incoming("5551111").unwrap();
    h.phone.answer().unwrap();
    assert_eq!(h.drain(), vec!["RING"]);

    h.phone.incoming("5552222").unwrap();
    assert_eq!(h.drain(), vec!["+CCWA: \"5552222\",129"]);

    sleep(Duration::from_millis(3_100)).await;
    assert_eq!(h.drain(), vec!["+CCWA: \"5552222\",129"]);

    h.engine.ignore_ring();
    sleep(Duration::from_millis(10_000)).await;
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ignored_ring_stays_quiet() {
    let mut h = Harness::new(PeerKind::Headset);

    h.phone.incoming("5551234").unwrap();
    assert_eq!(h.drain(), vec!["RING"]);

    h.engine.ignore_ring();
    sleep(Duration::from_millis(10_000)).await;
    assert!(h.drain().is_empty());
    assert!(h.phone.calls().ringing.is_alive());
}

#[tokio::test(start_paused = true)]
async fn test_ring_stops_when_rejected() {
    let mut h = Harness::new(PeerKind::Handsfree);

    h.phone.incoming("5551234").unwrap();
    assert_eq!(h.drain(), vec!["RING"]);

    assert_eq!(h.send("AT+CHUP"), vec!["OK"]);
    assert!(!h.phone.calls().ringing.is_alive());
    sleep(Duration::from_millis(10_000)).await;
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ring_stops_on_release_and_reject() {
    let mut h = Harness::new(PeerKind::Handsfree);

    h.phone.incoming("5551234").unwrap();
    assert_eq!(h.drain(), vec!["RING"]);

    assert_eq!(h.send("AT+CHLD=0"), vec!["OK"]);
    assert!(!h.phone.calls().ringing.is_alive());
    sleep(Duration::from_millis(10_000)).await;
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ring_stops_on_disconnect() {
    let mut h = Harness::new(PeerKind::Handsfree);

    h.phone.incoming("5551234").unwrap();
    assert_eq!(h.drain(), vec!["RING"]);

    h.engine.on_peer_disconnected();
    sleep(Duration::from_millis(10_000)).await;
    assert!(h.drain().is_empty());

    // The next peer is rung afresh for the call still ringing.
    let (tx, rx) = mpsc::unbounded_channel();
    h.engine
        .on_peer_connected(PEER.to_string(), PeerKind::Handsfree, tx);
    h.rx = rx;
    assert_eq!(h.drain(), vec!["RING"]);
    sleep(Duration::from_millis(3_100)).await;
    assert_eq!(h.drain(), vec!["RING"]);
}

#[tokio::test(start_paused = true)]
async fn test_waiting_call_rings_once_other_call_ends() {
    let (_phone, engine, mut rx) = silent_engine();
    engine.handle_line("AT+CCWA=1");
    assert_eq!(drain(&mut rx), vec!["OK"]);

    engine.on_call_state_changed(CallSnapshot {
        foreground: single(CallState::Active, "5551111", 1, true),
        ringing: single(CallState::Waiting, "5552222", 2, true),
        ..Default::default()
    });
    assert_eq!(drain(&mut rx), vec!["+CCWA: \"5552222\",129"]);

    // The active call ends and the phone reports the waiting call as incoming.
    engine.on_call_state_changed(CallSnapshot {
        ringing: single(CallState::Incoming, "5552222", 2, true),
        ..Default::default()
    });
    assert_eq!(drain(&mut rx), vec!["RING"]);

    sleep(Duration::from_millis(3_100)).await;
    assert_eq!(drain(&mut rx), vec!["RING"]);
}

#[tokio::test(start_paused = true)]
async fn test_ignored_waiting_call_stays_quiet_once_other_call_ends() {
    let (_phone, engine, mut rx) = silent_engine();
    engine.handle_line("AT+CCWA=1");
    assert_eq!(drain(&mut rx), vec!["OK"]);

    engine.on_call_state_changed(CallSnapshot {
        foreground: single(CallState::Active, "5551111", 1, true),
        ringing: single(CallState::Waiting, "5552222", 2, true),
        ..Default::default()
    });
    assert_eq!(drain(&mut rx), vec!["+CCWA: \"5552222\",129"]);
    engine.ignore_ring();

    engine.on_call_state_changed(CallSnapshot {
        ringing: single(CallState::Incoming, "5552222", 2, true),
        ..Default::default()
    });
    sleep(Duration::from_millis(10_000)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_call_list_indices_are_stable() {
    let mut h = Harness::new(PeerKind::Handsfree);

    h.phone.incoming("5551111").unwrap();
    h.phone.answer().unwrap();
    h.phone.incoming("5552222").unwrap();

    assert_eq!(
        h.send("AT+CLCC"),
        vec![
            "+CLCC: 1,1,0,0,0,\"5551111\",129",
            "+CLCC: 2,1,5,0,0,\"5552222\",129",
            "OK"
        ]
    );

    // Release the active call and take the waiting one.
    assert_eq!(h.send("AT+CHLD=1"), vec!["OK"]);
    assert_eq!(
        h.send("AT+CLCC"),
        vec!["+CLCC: 2,1,0,0,0,\"5552222\",129", "OK"]
    );

    // A new call takes the lowest free index.
    h.phone.incoming("5553333").unwrap();
    assert_eq!(
        h.send("AT+CLCC"),
        vec![
            "+CLCC: 1,1,5,0,0,\"5553333\",129",
            "+CLCC: 2,1,0,0,0,\"5552222\",129",
            "OK"
        ]
    );
}

#[tokio::test]
async fn test_call_list_outgoing_and_held() {
    let mut h = Harness::new(PeerKind::Handsfree);

    h.phone.dial("5551111").unwrap();
    h.phone.connect_outgoing().unwrap();
    h.phone.dial("+15552222").unwrap();
    h.phone.alert().unwrap();

    let lines: Vec<String> = h.engine.call_lines().iter().map(|r| r.to_string()).collect();
    assert_eq!(
        lines,
        vec![
            "+CLCC: 1,0,1,0,0,\"5551111\",129",
            "+CLCC: 2,0,3,0,0,\"+15552222\",145",
        ]
    );

    h.phone.conference().unwrap_err();
    h.phone.connect_outgoing().unwrap();
    h.phone.conference().unwrap();
    let lines: Vec<String> = h.engine.call_lines().iter().map(|r| r.to_string()).collect();
    assert_eq!(
        lines,
        vec![
            "+CLCC: 1,0,0,0,1,\"5551111\",129",
            "+CLCC: 2,0,0,0,1,\"+15552222\",145",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_multiparty_lock() {
    let (phone, engine, mut rx) = silent_engine();

    let calls = CallSnapshot {
        foreground: single(CallState::Active, "5551111", 1, true),
        ringing: single(CallState::Waiting, "5552222", 2, true),
        ..Default::default()
    };
    engine.on_call_state_changed(calls.clone());

    let mut send = |line: &str| {
        engine.handle_line(line);
        drain(&mut rx)
    };

    assert_eq!(send("AT+CMEE=1"), vec!["OK"]);
    assert_eq!(send("AT+CHLD=2"), vec!["OK"]);
    assert_eq!(send("AT+CHLD=2"), vec!["+CME ERROR: 3"]);

    sleep(Duration::from_millis(1_100)).await;
    assert_eq!(send("AT+CHLD=2"), vec!["OK"]);
    assert_eq!(send("AT+CHLD=1"), vec!["+CME ERROR: 3"]);

    // Any call change releases the lock.
    engine.on_call_state_changed(calls);
    assert_eq!(send("AT+CHLD=1"), vec!["OK"]);

    assert_eq!(send("AT+CHLD=7"), vec!["+CME ERROR: 4"]);
    assert_eq!(
        *phone.actions.lock(),
        vec!["answer", "answer", "hangup_fg", "answer"]
    );
}

#[tokio::test]
async fn test_phonebook_read() {
    let mut h = Harness::new(PeerKind::Handsfree);
    h.store
        .add_contact("Alice", "+15551234", NumberLabel::Mobile)
        .unwrap();
    h.store.record_call("5550001", CallLogKind::Outgoing).unwrap();
    h.store.record_call("+15551234", CallLogKind::Outgoing).unwrap();

    assert_eq!(h.send("AT+CPBS=\"DC\""), vec!["OK"]);
    assert_eq!(h.send("AT+CPBS?"), vec!["+CPBS: \"DC\",2,100", "OK"]);
    assert_eq!(h.send("AT+CPBR=?"), vec!["+CPBR: (1-2),30,30", "OK"]);
    assert_eq!(
        h.send("AT+CPBR=1,5"),
        vec![
            "+CPBR: 1,\"+15551234\",145,\"Alice/M\"",
            "+CPBR: 2,\"5550001\",129,\"\"",
            "OK"
        ]
    );

    assert_eq!(h.send("AT+CMEE=1"), vec!["OK"]);
    assert_eq!(h.send("AT+CPBR=3"), vec!["+CME ERROR: 21"]);
    assert_eq!(h.send("AT+CPBS=\"SM\""), vec!["+CME ERROR: 4"]);
}

#[tokio::test]
async fn test_subscriber_and_operator() {
    let mut h = Harness::new(PeerKind::Handsfree);

    assert_eq!(
        h.send("AT+CNUM"),
        vec!["+CNUM: ,\"+15550100\",145,,4", "OK"]
    );
    assert_eq!(
        h.send("AT+COPS?"),
        vec!["+COPS: 0,0,\"Simulated Networ\"", "OK"]
    );

    h.phone.set_service(false, false);
    assert_eq!(h.send("AT+COPS?"), vec!["+COPS: 0", "OK"]);
}

#[tokio::test]
async fn test_missing_subscriber_number() {
    let mut h = Harness::new(PeerKind::Handsfree);
    assert_eq!(h.console(ConsoleCommand::Number(None)), "ok");

    // The number is read when the peer connects.
    h.reconnect(PeerKind::Handsfree);
    assert_eq!(h.send("AT+CNUM"), vec!["ERROR"]);
    assert_eq!(h.send("AT+CMEE=1"), vec!["OK"]);
    assert_eq!(h.send("AT+CNUM"), vec!["+CME ERROR: 13"]);

    h.console(ConsoleCommand::Number(Some("5550123".to_string())));
    h.reconnect(PeerKind::Handsfree);
    assert_eq!(h.send("AT+CNUM"), vec!["+CNUM: ,\"5550123\",129,,4", "OK"]);
}

#[tokio::test]
async fn test_cleared_call_log_has_nothing_to_redial() {
    let mut h = Harness::new(PeerKind::Handsfree);
    h.store
        .record_call("5551234", CallLogKind::Outgoing)
        .unwrap();

    assert_eq!(h.console(ConsoleCommand::ClearLog), "ok");
    assert!(h.store.recent_calls(10).unwrap().is_empty());
    assert_eq!(h.send("AT+BLDN"), vec!["ERROR"]);
    assert!(h.phone.dialed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_headset_button() {
    let mut h = Harness::new(PeerKind::Headset);

    h.phone.incoming("5551234").unwrap();
    assert_eq!(h.drain(), vec!["RING"]);

    // Answer and bring audio up.
    assert_eq!(h.send("AT+CKPD=200"), vec!["OK"]);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(h.phone.calls().foreground.state, CallState::Active);
    assert!(h.engine.audio_state().connected);
    assert!(h.audio.is_bluetooth_routed());
    assert_eq!(h.sco.connect_count(), 1);

    // Audio is up, so the button hangs up.
    assert_eq!(h.send("AT+CKPD=200"), vec!["OK"]);
    assert!(h.phone.calls().is_idle());
    assert!(!h.audio.is_bluetooth_routed());

    // Idle: redial.
    h.store
        .record_call("5559999", CallLogKind::Outgoing)
        .unwrap();
    assert_eq!(h.send("AT+CKPD=200"), vec!["OK"]);
    assert_eq!(h.phone.dialed(), vec!["5559999"]);

    assert_eq!(h.send("AT+CKPD=1"), vec!["ERROR"]);
}

#[tokio::test(start_paused = true)]
async fn test_single_audio_link() {
    let mut h = Harness::new(PeerKind::Handsfree);

    h.phone.incoming("5551234").unwrap();
    h.phone.answer().unwrap();
    sleep(Duration::from_millis(1)).await;
    assert!(h.engine.audio_state().connected);
    assert!(h.engine.audio_state().possible);

    // A second link from the peer is turned away.
    let listener = h.sco.listener().unwrap();
    h.engine.on_sco_accepted(listener);
    assert!(h.sco.is_closed(listener));
    assert!(h.engine.audio_state().connected);
    assert_ne!(h.sco.listener(), Some(listener));

    h.engine.disconnect_audio();
    assert!(!h.engine.audio_state().connected);
    assert!(!h.audio.is_bluetooth_routed());

    // The user switch blocks reconnects.
    h.engine.set_audio_enabled(false);
    assert!(!h.engine.audio_state().allowed);
    h.engine.connect_audio();
    assert!(!h.engine.audio_state().outgoing);
    h.engine.set_audio_enabled(true);
    h.engine.connect_audio();
    sleep(Duration::from_millis(1)).await;
    assert!(h.engine.audio_state().connected);

    h.phone.remote_hangup().unwrap();
    assert!(!h.engine.audio_state().connected);
    assert!(!h.engine.audio_state().possible);
    h.drain();
}

#[tokio::test]
async fn test_error_rendering_follows_cmee() {
    let mut h = Harness::new(PeerKind::Handsfree);

    assert_eq!(h.send("ATA"), vec!["ERROR"]);
    assert_eq!(h.send("AT+CMEE=1"), vec!["OK"]);
    assert_eq!(h.send("ATA"), vec!["+CME ERROR: 3"]);
    assert_eq!(h.send("AT+CHUP"), vec!["+CME ERROR: 3"]);
    assert_eq!(h.send("AT+BOGUS"), vec!["+CME ERROR: 4"]);
    assert_eq!(h.send("AT+VGS=16"), vec!["+CME ERROR: 50"]);
    assert_eq!(h.send("AT+CMEE=0"), vec!["OK"]);
    assert_eq!(h.send("AT+BOGUS"), vec!["ERROR"]);
}

#[tokio::test]
async fn test_volume_and_gain() {
    let mut h = Harness::new(PeerKind::Handsfree);

    assert_eq!(h.send("AT+VGS=9"), vec!["OK"]);
    assert_eq!(h.send("AT+VGM=4"), vec!["OK"]);
    assert_eq!(h.audio.speaker_volume(), 9);
    assert_eq!(h.audio.microphone_gain(), 4);

    h.engine.on_speaker_volume_changed(12);
    assert_eq!(h.drain(), vec!["+VGS: 12"]);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_resets_session() {
    let mut h = Harness::new(PeerKind::Handsfree);
    assert_eq!(h.send("AT+CMEE=1;+CMER=3,0,0,1;+CLIP=1"), vec!["OK"]);

    h.phone.incoming("5551234").unwrap();
    h.phone.answer().unwrap();
    sleep(Duration::from_millis(1)).await;
    assert!(h.audio.is_bluetooth_routed());

    h.engine.on_peer_disconnected();
    assert!(!h.engine.is_connected());
    assert!(!h.audio.is_bluetooth_routed());

    // A new peer starts from defaults but sees the live call.
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.engine
        .on_peer_connected(PEER.to_string(), PeerKind::Handsfree, tx);
    h.engine.handle_line("ATA");
    h.engine.handle_line("AT+CIND?");
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    assert_eq!(lines, vec!["ERROR", "+CIND: 1,1,0,0,5,0,5", "OK"]);

    h.phone.set_signal(1);
    assert!(rx.try_recv().is_err());
}
