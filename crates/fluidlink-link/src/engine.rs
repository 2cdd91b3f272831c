//! Protocol engine
//!
//! Composition root of the machine link: owns the wire transport, the
//! machine-state snapshot, and the connection-health state machine, and
//! exposes the connect/disconnect/send/status surface the rest of the
//! application uses.
//!
//! The engine is single-threaded and poll-driven. `tick()` must be
//! called on a sub-100 ms cadence from the owning scheduling loop; it
//! pumps transport events, dispatches received lines, and runs the
//! time-based health transitions. Nothing here blocks.

use crate::commands;
use crate::health::{ConnectionHealth, HealthConfig};
use crate::report::{apply_line, LineClass};
use crate::transport::{LinkDescriptor, TransportEvent, WireTransport};
use fluidlink_core::{LinkError, LinkListener, MachineSnapshot, ProtocolError, Result};
use std::time::{Duration, Instant};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Transport reconnect interval while the initial handshake is still
    /// being attempted.
    pub initial_reconnect: Duration,
    /// Transport reconnect interval once the link has been established.
    /// Effectively disabled: a mid-session drop is surfaced to the user
    /// instead of silently retried against a machine that may have been
    /// intentionally power-cycled.
    pub established_reconnect: Duration,
    /// Delay between the feed-hold and soft-reset halves of a quick stop.
    pub quick_stop_delay: Duration,
    /// Health state machine cadences.
    pub health: HealthConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_reconnect: Duration::from_millis(2000),
            established_reconnect: Duration::from_secs(24 * 60 * 60),
            quick_stop_delay: Duration::from_millis(150),
            health: HealthConfig::default(),
        }
    }
}

/// Per-frame message callback. Single-slot: registering replaces.
pub type MessageCallback = Box<dyn FnMut(&str)>;

/// The machine-link protocol engine.
pub struct ProtocolEngine {
    transport: Box<dyn WireTransport>,
    snapshot: MachineSnapshot,
    health: ConnectionHealth,
    config: EngineConfig,
    network_up: Box<dyn Fn() -> bool>,
    listener: Option<Box<dyn LinkListener>>,
    raw_callback: Option<MessageCallback>,
    terminal_callback: Option<MessageCallback>,
    pending_reset: Option<Instant>,
}

impl ProtocolEngine {
    /// Create an engine around a transport.
    pub fn new(transport: Box<dyn WireTransport>, config: EngineConfig) -> Self {
        let health = ConnectionHealth::new(config.health);
        Self {
            transport,
            snapshot: MachineSnapshot::new(),
            health,
            config,
            network_up: Box::new(|| true),
            listener: None,
            raw_callback: None,
            terminal_callback: None,
            pending_reset: None,
        }
    }

    /// Replace the "underlying network is up" predicate checked by
    /// [`connect`](Self::connect). Defaults to always-up.
    pub fn set_network_probe(&mut self, probe: impl Fn() -> bool + 'static) {
        self.network_up = Box::new(probe);
    }

    /// Register the link listener. Single-slot: replaces any previous one.
    pub fn register_listener(&mut self, listener: impl LinkListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Register the raw-message callback, invoked for every received line.
    pub fn register_raw_callback(&mut self, callback: impl FnMut(&str) + 'static) {
        self.raw_callback = Some(Box::new(callback));
    }

    /// Register the terminal callback, invoked for every received line
    /// except status reports (lines beginning with `<`).
    pub fn register_terminal_callback(&mut self, callback: impl FnMut(&str) + 'static) {
        self.terminal_callback = Some(Box::new(callback));
    }

    /// Begin connecting to a machine.
    ///
    /// Fails fast without touching the socket when the network predicate
    /// says the underlying network is down. Otherwise configures a short
    /// reconnect interval for the initial handshake and starts the
    /// asynchronous connect; the link is established later, when the
    /// first report arrives.
    pub fn connect(&mut self, descriptor: &LinkDescriptor) -> Result<()> {
        if !(self.network_up)() {
            tracing::warn!(machine = %descriptor, "network down, not connecting");
            return Err(LinkError::NetworkDown.into());
        }

        tracing::info!(machine = %descriptor, "connecting");
        self.transport
            .set_reconnect_interval(self.config.initial_reconnect);
        self.transport.connect(descriptor)?;
        Ok(())
    }

    /// Tear the link down and reset all machine state.
    pub fn disconnect(&mut self) {
        tracing::info!("disconnecting");
        self.transport.disconnect();
        self.snapshot.reset();
        self.health.on_disconnected();
        self.pending_reset = None;
    }

    /// Whether the link is established (a report has been received).
    pub fn is_connected(&self) -> bool {
        self.snapshot.is_connected
    }

    /// Whether push auto-reporting is confirmed active.
    pub fn is_auto_reporting(&self) -> bool {
        self.health.is_auto_reporting()
    }

    /// Read-only view of the current machine state.
    pub fn status(&self) -> &MachineSnapshot {
        &self.snapshot
    }

    /// Send a command line verbatim. Callers own line termination and
    /// GCode semantics; this boundary does not.
    pub fn send_command(&mut self, text: &str) -> Result<()> {
        if !self.snapshot.is_connected {
            tracing::warn!(command = text.trim_end(), "dropping command, not connected");
            return Err(ProtocolError::CommandWhileDisconnected {
                command: text.trim_end().to_string(),
            }
            .into());
        }
        self.transport.send_text(text)
    }

    /// Send a realtime single-byte command.
    pub fn send_realtime(&mut self, byte: u8) -> Result<()> {
        if !self.snapshot.is_connected {
            tracing::warn!(byte, "dropping realtime byte, not connected");
            return Err(ProtocolError::CommandWhileDisconnected {
                command: format!("0x{byte:02X}"),
            }
            .into());
        }
        self.transport.send_bytes(&[byte])
    }

    /// Feed hold (`!`).
    pub fn feed_hold(&mut self) -> Result<()> {
        self.send_realtime(commands::FEED_HOLD)
    }

    /// Cycle resume (`~`).
    pub fn resume(&mut self) -> Result<()> {
        self.send_realtime(commands::CYCLE_RESUME)
    }

    /// Soft reset (Ctrl-X).
    pub fn soft_reset(&mut self) -> Result<()> {
        self.send_realtime(commands::SOFT_RESET)
    }

    /// Cancel an in-flight jog.
    pub fn jog_cancel(&mut self) -> Result<()> {
        self.send_realtime(commands::JOG_CANCEL)
    }

    /// Incremental jog in machine units.
    pub fn jog_incremental(&mut self, axis: char, distance: f32, feed_rate: f32) -> Result<()> {
        self.send_command(&commands::jog_incremental(axis, distance, feed_rate))
    }

    /// Run the homing cycle.
    pub fn home(&mut self) -> Result<()> {
        self.send_command(&commands::home_all())
    }

    /// Clear an alarm lock.
    pub fn unlock(&mut self) -> Result<()> {
        self.send_command(&commands::unlock())
    }

    /// Nudge the feed override.
    pub fn feed_override(&mut self, step: commands::FeedOverride) -> Result<()> {
        self.send_realtime(step.byte())
    }

    /// Set the rapid override level.
    pub fn rapid_override(&mut self, level: commands::RapidOverride) -> Result<()> {
        self.send_realtime(level.byte())
    }

    /// Nudge the spindle override.
    pub fn spindle_override(&mut self, step: commands::SpindleOverride) -> Result<()> {
        self.send_realtime(step.byte())
    }

    /// Quick stop: feed hold immediately, soft reset once
    /// [`EngineConfig::quick_stop_delay`] has elapsed on a later tick.
    /// Two-step deferred send; nothing blocks.
    pub fn quick_stop(&mut self) -> Result<()> {
        self.feed_hold()?;
        self.pending_reset = Some(Instant::now() + self.config.quick_stop_delay);
        Ok(())
    }

    /// Periodic pump. Call on a sub-100 ms cadence; this is the only
    /// place time-based transitions happen.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// [`tick`](Self::tick) with an injected clock, for schedulers and
    /// tests that own time.
    pub fn tick_at(&mut self, now: Instant) {
        if let Some(due) = self.pending_reset {
            if now >= due {
                self.pending_reset = None;
                if let Err(e) = self.transport.send_bytes(&[commands::SOFT_RESET]) {
                    tracing::error!(error = %e, "quick stop reset failed");
                }
            }
        }

        for event in self.transport.poll() {
            match event {
                TransportEvent::Opened => self.on_transport_opened(now),
                TransportEvent::Closed => self.on_transport_closed(),
                TransportEvent::Frame(frame) => {
                    // A frame occasionally carries several report lines.
                    for line in frame.lines() {
                        self.dispatch_line(line, now);
                    }
                }
            }
        }

        self.health.tick(now, self.transport.as_mut());
    }

    fn on_transport_opened(&mut self, now: Instant) {
        tracing::info!("socket open, requesting auto reports");
        self.pending_reset = None;
        // Mid-session drops surface to the user instead of silently
        // retrying; only the initial handshake keeps a short interval.
        self.transport
            .set_reconnect_interval(self.config.established_reconnect);
        self.health.on_connected(now, self.transport.as_mut());
    }

    fn on_transport_closed(&mut self) {
        if self.snapshot.is_connected {
            tracing::error!("link lost");
            self.snapshot.reset();
            self.health.on_disconnected();
            self.pending_reset = None;
            if let Some(listener) = self.listener.as_mut() {
                listener.on_link_lost();
            }
        } else {
            // Never-yet-connected: the short reconnect interval stays in
            // force and the handshake keeps retrying.
            tracing::debug!("socket closed before link established");
        }
    }

    fn dispatch_line(&mut self, line: &str, now: Instant) {
        if let Some(callback) = self.raw_callback.as_mut() {
            callback(line);
        }
        if !line.starts_with('<') {
            if let Some(callback) = self.terminal_callback.as_mut() {
                callback(line);
            }
        }

        let previous_state = self.snapshot.state;
        let class = apply_line(&mut self.snapshot, line, now);

        match class {
            LineClass::StatusReport => {
                // The report itself is proof reporting works.
                self.health.on_status_report();
                self.mark_connected();
                self.health.on_state_transition(
                    previous_state,
                    self.snapshot.state,
                    now,
                    self.transport.as_mut(),
                );
            }
            LineClass::AutoReportAck => {
                self.health.on_auto_report_ack();
                self.mark_connected();
            }
            LineClass::Probe(result) => {
                if let Some(listener) = self.listener.as_mut() {
                    listener.on_probe_result(result);
                }
            }
            LineClass::ParserState | LineClass::Feedback | LineClass::Other => {}
        }
    }

    fn mark_connected(&mut self) {
        if !self.snapshot.is_connected {
            self.snapshot.is_connected = true;
            tracing::info!("link established");
            if let Some(listener) = self.listener.as_mut() {
                listener.on_link_established();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluidlink_core::MachineState;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Scripted transport: the test queues events and inspects sends
    /// through a shared handle.
    #[derive(Default)]
    struct FakeState {
        open: bool,
        events: VecDeque<TransportEvent>,
        sent_text: Vec<String>,
        sent_bytes: Vec<u8>,
        reconnect: Option<Duration>,
    }

    #[derive(Clone, Default)]
    struct FakeTransport {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeTransport {
        fn push(&self, event: TransportEvent) {
            self.state.lock().events.push_back(event);
        }

        fn push_frame(&self, frame: &str) {
            self.push(TransportEvent::Frame(frame.to_string()));
        }
    }

    impl WireTransport for FakeTransport {
        fn connect(&mut self, _d: &LinkDescriptor) -> fluidlink_core::Result<()> {
            self.state.lock().open = true;
            Ok(())
        }
        fn disconnect(&mut self) {
            self.state.lock().open = false;
        }
        fn set_reconnect_interval(&mut self, interval: Duration) {
            self.state.lock().reconnect = Some(interval);
        }
        fn send_text(&mut self, text: &str) -> fluidlink_core::Result<()> {
            self.state.lock().sent_text.push(text.to_string());
            Ok(())
        }
        fn send_bytes(&mut self, bytes: &[u8]) -> fluidlink_core::Result<()> {
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

    fn engine_with_fake() -> (ProtocolEngine, FakeTransport) {
        let fake = FakeTransport::default();
        let engine = ProtocolEngine::new(Box::new(fake.clone()), EngineConfig::default());
        (engine, fake)
    }

    /// Bring the engine to the established state.
    fn establish(engine: &mut ProtocolEngine, fake: &FakeTransport, now: Instant) {
        engine.connect(&LinkDescriptor::default()).unwrap();
        fake.push(TransportEvent::Opened);
        fake.push_frame("<Idle|MPos:0.000,0.000,0.000|FS:0,0>");
        engine.tick_at(now);
        assert!(engine.is_connected());
    }

    #[test]
    fn connect_rejected_when_network_down() {
        let (mut engine, fake) = engine_with_fake();
        engine.set_network_probe(|| false);
        assert!(engine.connect(&LinkDescriptor::default()).is_err());
        assert!(!fake.state.lock().open);
    }

    #[test]
    fn send_command_while_disconnected_is_rejected() {
        let (mut engine, fake) = engine_with_fake();
        let err = engine.send_command("$H\n").unwrap_err();
        assert!(err.is_protocol_error());
        assert!(fake.state.lock().sent_text.is_empty());
        assert_eq!(engine.status().state, MachineState::Disconnected);
    }

    #[test]
    fn first_status_report_establishes_link() {
        let (mut engine, fake) = engine_with_fake();
        let t0 = Instant::now();
        establish(&mut engine, &fake, t0);
        assert!(engine.is_auto_reporting());
        assert_eq!(engine.status().state, MachineState::Idle);
    }

    #[test]
    fn reconnect_interval_raised_after_open() {
        let (mut engine, fake) = engine_with_fake();
        engine.connect(&LinkDescriptor::default()).unwrap();
        assert_eq!(
            fake.state.lock().reconnect,
            Some(EngineConfig::default().initial_reconnect)
        );
        fake.push(TransportEvent::Opened);
        engine.tick_at(Instant::now());
        assert_eq!(
            fake.state.lock().reconnect,
            Some(EngineConfig::default().established_reconnect)
        );
    }

    #[test]
    fn multi_line_frame_dispatches_each_line() {
        let (mut engine, fake) = engine_with_fake();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.register_raw_callback(move |line| sink.lock().push(line.to_string()));

        engine.connect(&LinkDescriptor::default()).unwrap();
        fake.push(TransportEvent::Opened);
        fake.push_frame("<Idle>\n[MSG:hello]\nok");
        engine.tick_at(Instant::now());

        assert_eq!(seen.lock().as_slice(), ["<Idle>", "[MSG:hello]", "ok"]);
        assert_eq!(engine.status().last_message, "hello");
    }

    #[test]
    fn terminal_callback_skips_status_reports() {
        let (mut engine, fake) = engine_with_fake();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.register_terminal_callback(move |line| sink.lock().push(line.to_string()));

        engine.connect(&LinkDescriptor::default()).unwrap();
        fake.push(TransportEvent::Opened);
        fake.push_frame("<Idle>\n[MSG:hello]");
        engine.tick_at(Instant::now());

        assert_eq!(seen.lock().as_slice(), ["[MSG:hello]"]);
    }

    #[test]
    fn probe_result_reaches_listener() {
        #[derive(Default)]
        struct Recorder(Arc<Mutex<Vec<fluidlink_core::ProbeResult>>>);
        impl LinkListener for Recorder {
            fn on_probe_result(&mut self, result: fluidlink_core::ProbeResult) {
                self.0.lock().push(result);
            }
        }

        let (mut engine, fake) = engine_with_fake();
        let probes = Arc::new(Mutex::new(Vec::new()));
        engine.register_listener(Recorder(probes.clone()));

        let t0 = Instant::now();
        establish(&mut engine, &fake, t0);
        fake.push_frame("[PRB:1.000,2.000,3.000:1]");
        engine.tick_at(t0);

        let seen = probes.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].success);
        assert_eq!(seen[0].z, 3.0);
    }

    #[test]
    fn link_lost_notifies_and_resets() {
        #[derive(Default)]
        struct Recorder(Arc<Mutex<u32>>);
        impl LinkListener for Recorder {
            fn on_link_lost(&mut self) {
                *self.0.lock() += 1;
            }
        }

        let (mut engine, fake) = engine_with_fake();
        let losses = Arc::new(Mutex::new(0));
        engine.register_listener(Recorder(losses.clone()));

        let t0 = Instant::now();
        establish(&mut engine, &fake, t0);
        fake.push_frame("<Run|SD:42.5,part.gcode>");
        engine.tick_at(t0);
        assert!(engine.status().job.active);

        fake.push(TransportEvent::Closed);
        engine.tick_at(t0);

        assert_eq!(*losses.lock(), 1);
        assert!(!engine.is_connected());
        assert_eq!(engine.status().state, MachineState::Disconnected);
        assert!(!engine.status().job.active);
    }

    #[test]
    fn close_before_establishment_is_silent() {
        #[derive(Default)]
        struct Recorder(Arc<Mutex<u32>>);
        impl LinkListener for Recorder {
            fn on_link_lost(&mut self) {
                *self.0.lock() += 1;
            }
        }

        let (mut engine, fake) = engine_with_fake();
        let losses = Arc::new(Mutex::new(0));
        engine.register_listener(Recorder(losses.clone()));

        engine.connect(&LinkDescriptor::default()).unwrap();
        fake.push(TransportEvent::Opened);
        fake.push(TransportEvent::Closed);
        engine.tick_at(Instant::now());

        assert_eq!(*losses.lock(), 0);
    }

    #[test]
    fn quick_stop_defers_the_reset() {
        let (mut engine, fake) = engine_with_fake();
        let t0 = Instant::now();
        establish(&mut engine, &fake, t0);
        fake.state.lock().sent_bytes.clear();

        engine.quick_stop().unwrap();
        assert_eq!(fake.state.lock().sent_bytes, vec![commands::FEED_HOLD]);

        // Before the delay elapses the reset is still pending.
        engine.tick_at(Instant::now());
        assert_eq!(fake.state.lock().sent_bytes, vec![commands::FEED_HOLD]);

        engine.tick_at(Instant::now() + Duration::from_millis(200));
        assert_eq!(
            fake.state.lock().sent_bytes,
            vec![commands::FEED_HOLD, commands::SOFT_RESET]
        );
    }

    #[test]
    fn override_nudges_send_realtime_bytes() {
        let (mut engine, fake) = engine_with_fake();
        let t0 = Instant::now();
        establish(&mut engine, &fake, t0);
        fake.state.lock().sent_bytes.clear();

        engine.feed_override(commands::FeedOverride::CoarsePlus).unwrap();
        engine.rapid_override(commands::RapidOverride::Medium).unwrap();
        engine
            .spindle_override(commands::SpindleOverride::Reset)
            .unwrap();

        assert_eq!(fake.state.lock().sent_bytes, vec![0x91, 0x96, 0x99]);
    }

    #[test]
    fn disconnect_mid_job_resets_snapshot() {
        let (mut engine, fake) = engine_with_fake();
        let t0 = Instant::now();
        establish(&mut engine, &fake, t0);
        fake.push_frame("<Run|MPos:1.0,2.0,3.0|SD:50.0,job.nc>");
        engine.tick_at(t0);
        assert!(engine.status().job.active);

        engine.disconnect();
        assert!(!engine.is_connected());
        assert_eq!(engine.status().state, MachineState::Disconnected);
        assert!(!engine.status().job.active);
        assert!(!fake.state.lock().open);
    }
}
