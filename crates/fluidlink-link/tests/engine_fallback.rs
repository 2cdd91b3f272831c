//! End-to-end tests of the dual-reporting strategy through the engine

use fluidlink_core::Result;
use fluidlink_link::{
    EngineConfig, LinkDescriptor, ProtocolEngine, TransportEvent, WireTransport,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct ScriptState {
    open: bool,
    events: VecDeque<TransportEvent>,
    sent_text: Vec<String>,
    sent_bytes: Vec<u8>,
}

/// Scripted transport shared between the test and the engine.
#[derive(Clone, Default)]
struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    fn push_frame(&self, frame: &str) {
        self.state
            .lock()
            .events
            .push_back(TransportEvent::Frame(frame.to_string()));
    }

    fn status_queries(&self) -> usize {
        self.state
            .lock()
            .sent_bytes
            .iter()
            .filter(|b| **b == b'?')
            .count()
    }

    fn lines_sent(&self, line: &str) -> usize {
        self.state
            .lock()
            .sent_text
            .iter()
            .filter(|t| t.as_str() == line)
            .count()
    }

    fn enable_requests(&self) -> usize {
        self.state
            .lock()
            .sent_text
            .iter()
            .filter(|t| t.starts_with("$Report/Interval"))
            .count()
    }
}

impl WireTransport for ScriptedTransport {
    fn connect(&mut self, _d: &LinkDescriptor) -> Result<()> {
        let mut state = self.state.lock();
        state.open = true;
        state.events.push_back(TransportEvent::Opened);
        Ok(())
    }
    fn disconnect(&mut self) {
        self.state.lock().open = false;
    }
    fn set_reconnect_interval(&mut self, _interval: Duration) {}
    fn send_text(&mut self, text: &str) -> Result<()> {
        self.state.lock().sent_text.push(text.to_string());
        Ok(())
    }
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.state.lock().sent_bytes.extend_from_slice(bytes);
        Ok(())
    }
    fn poll(&mut self) -> Vec<TransportEvent> {
        self.state.lock().events.drain(..).collect()
    }
    fn is_open(&self) -> bool {
        self.state.lock().open
    }
}

fn connected_engine() -> (ProtocolEngine, ScriptedTransport, Instant) {
    let transport = ScriptedTransport::default();
    let mut engine = ProtocolEngine::new(Box::new(transport.clone()), EngineConfig::default());
    engine.connect(&LinkDescriptor::default()).unwrap();
    let t0 = Instant::now();
    engine.tick_at(t0);
    (engine, transport, t0)
}

#[test]
fn test_unconfirmed_attempt_degrades_to_polling() {
    let (mut engine, transport, t0) = connected_engine();
    assert_eq!(transport.enable_requests(), 1);

    // Inside the confirmation window nothing is polled.
    engine.tick_at(t0 + Duration::from_millis(1500));
    assert_eq!(transport.status_queries(), 0);

    // Window expires: `?` roughly every second, `$G` every ten.
    engine.tick_at(t0 + Duration::from_millis(2000));
    assert_eq!(transport.status_queries(), 1);
    assert_eq!(transport.lines_sent("$G\n"), 1);
    assert!(!engine.is_auto_reporting());

    for ms in (2100..12_200).step_by(100) {
        engine.tick_at(t0 + Duration::from_millis(ms));
    }
    // ~10 seconds of polling: about ten status queries, one more $G.
    assert_eq!(transport.status_queries(), 11);
    assert_eq!(transport.lines_sent("$G\n"), 2);
}

#[test]
fn test_poll_response_does_not_confirm_auto_reporting() {
    let (mut engine, transport, t0) = connected_engine();

    engine.tick_at(t0 + Duration::from_millis(2000));
    assert_eq!(transport.status_queries(), 1);

    // This report answers our own `?`; no attempt is pending, so it must
    // not count as confirmation or polling would starve itself.
    transport.push_frame("<Idle|MPos:0.0,0.0,0.0>");
    engine.tick_at(t0 + Duration::from_millis(2100));
    assert!(engine.is_connected());
    assert!(!engine.is_auto_reporting());

    engine.tick_at(t0 + Duration::from_millis(3000));
    assert_eq!(transport.status_queries(), 2);
}

#[test]
fn test_report_during_attempt_confirms_auto_reporting() {
    let (mut engine, transport, t0) = connected_engine();

    transport.push_frame("<Idle|MPos:0.0,0.0,0.0>");
    engine.tick_at(t0 + Duration::from_millis(100));
    assert!(engine.is_connected());
    assert!(engine.is_auto_reporting());

    // Push mode: no maintenance traffic ever again on this session.
    for s in 1..30 {
        engine.tick_at(t0 + Duration::from_secs(s));
    }
    assert_eq!(transport.status_queries(), 0);
    assert_eq!(transport.lines_sent("$G\n"), 0);
}

#[test]
fn test_ack_message_confirms_auto_reporting() {
    let (mut engine, transport, t0) = connected_engine();

    transport.push_frame("[MSG:INFO: Report interval set to 250ms]");
    engine.tick_at(t0 + Duration::from_millis(100));

    assert!(engine.is_connected());
    assert!(engine.is_auto_reporting());
    engine.tick_at(t0 + Duration::from_secs(10));
    assert_eq!(transport.status_queries(), 0);
}

#[test]
fn test_idle_transition_retries_enable_once() {
    let (mut engine, transport, t0) = connected_engine();

    // Degrade to polling, then observe the machine running.
    engine.tick_at(t0 + Duration::from_millis(2000));
    transport.push_frame("<Run|MPos:0.0,0.0,0.0>");
    engine.tick_at(t0 + Duration::from_millis(2100));
    assert_eq!(transport.enable_requests(), 1);

    // Run -> Idle: one fresh attempt.
    transport.push_frame("<Idle|MPos:0.0,0.0,0.0>");
    engine.tick_at(t0 + Duration::from_millis(2200));
    assert_eq!(transport.enable_requests(), 2);
    assert!(!engine.is_auto_reporting());

    // The next report lands while that attempt is pending and confirms
    // it; no further enable requests go out.
    transport.push_frame("<Idle|MPos:0.0,0.0,0.0>");
    engine.tick_at(t0 + Duration::from_millis(2300));
    assert!(engine.is_auto_reporting());
    assert_eq!(transport.enable_requests(), 2);
}

#[test]
fn test_send_command_forwards_verbatim_once_connected() {
    let (mut engine, transport, t0) = connected_engine();
    transport.push_frame("<Idle>");
    engine.tick_at(t0 + Duration::from_millis(100));

    engine.send_command("$J=G91 X1.000 F600\n").unwrap();
    assert_eq!(transport.lines_sent("$J=G91 X1.000 F600\n"), 1);

    engine.jog_cancel().unwrap();
    assert_eq!(*transport.state.lock().sent_bytes.last().unwrap(), 0x85);
}
