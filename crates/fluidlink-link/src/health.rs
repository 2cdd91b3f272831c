//! Connection health state machine
//!
//! Decides whether the link uses push auto-reporting or fallback polling
//! and drives the outbound maintenance traffic for whichever mode is
//! active. There is no hard failure here: when the controller ignores
//! the reporting-interval command the link degrades to polling and keeps
//! working. Giving up on the link itself is the engine's decision.
//!
//! All methods take an explicit `now` so the 2 s confirmation window and
//! the polling cadences are testable without sleeping.

use crate::commands;
use crate::transport::WireTransport;
use fluidlink_core::MachineState;
use std::time::{Duration, Instant};

/// Cadence configuration for the health state machine.
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    /// How long to wait for a confirming status report after sending the
    /// enable-auto-report command.
    pub confirm_timeout: Duration,
    /// Minimum spacing of `?` status queries while polling.
    pub poll_interval: Duration,
    /// Minimum spacing of `$G` parser-state refreshes while polling.
    pub parser_state_interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(1000),
            parser_state_interval: Duration::from_millis(10_000),
        }
    }
}

/// Per-connection reporting-mode bookkeeping.
///
/// Created at connect time, reset on disconnect. The invariant: at most
/// one of auto-reporting and fallback polling drives outbound maintenance
/// traffic at any time.
#[derive(Debug)]
pub struct ConnectionHealth {
    config: HealthConfig,
    auto_reporting_enabled: bool,
    auto_reporting_attempted: bool,
    last_attempt: Option<Instant>,
    last_poll: Option<Instant>,
    last_parser_state_poll: Option<Instant>,
}

impl ConnectionHealth {
    /// Create a fresh health tracker.
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            auto_reporting_enabled: false,
            auto_reporting_attempted: false,
            last_attempt: None,
            last_poll: None,
            last_parser_state_poll: None,
        }
    }

    /// Whether the controller confirmed push reporting.
    pub fn is_auto_reporting(&self) -> bool {
        self.auto_reporting_enabled
    }

    /// Whether an enable attempt is outstanding.
    pub fn is_attempt_pending(&self) -> bool {
        self.auto_reporting_attempted
    }

    /// Socket came up: request push reporting and start the confirmation
    /// window.
    pub fn on_connected(&mut self, now: Instant, transport: &mut dyn WireTransport) {
        self.auto_reporting_enabled = false;
        self.auto_reporting_attempted = false;
        self.last_poll = None;
        self.last_parser_state_poll = None;
        self.attempt_auto_report(now, transport);
    }

    /// Socket went down: discard per-connection state.
    pub fn on_disconnected(&mut self) {
        self.auto_reporting_enabled = false;
        self.auto_reporting_attempted = false;
        self.last_attempt = None;
        self.last_poll = None;
        self.last_parser_state_poll = None;
    }

    /// Any status report proves reporting works; a pending attempt is
    /// thereby confirmed.
    pub fn on_status_report(&mut self) {
        if self.auto_reporting_attempted {
            self.auto_reporting_attempted = false;
            self.auto_reporting_enabled = true;
            tracing::debug!("auto reporting confirmed by status report");
        }
    }

    /// Explicit confirmation that the report interval was accepted.
    pub fn on_auto_report_ack(&mut self) {
        self.auto_reporting_attempted = false;
        self.auto_reporting_enabled = true;
        tracing::debug!("auto reporting confirmed by controller message");
    }

    /// The controller may only honor `$Report/Interval` while idle, so a
    /// Hold/Run -> Idle transition in polling mode triggers exactly one
    /// fresh attempt.
    pub fn on_state_transition(
        &mut self,
        previous: MachineState,
        current: MachineState,
        now: Instant,
        transport: &mut dyn WireTransport,
    ) {
        if self.auto_reporting_enabled || self.auto_reporting_attempted {
            return;
        }
        if current == MachineState::Idle
            && matches!(previous, MachineState::Hold | MachineState::Run)
        {
            tracing::debug!("machine settled to Idle, retrying auto report");
            self.attempt_auto_report(now, transport);
        }
    }

    /// Scheduler tick. Expires a stale enable attempt, then runs the
    /// fallback polling cadences when neither attempting nor confirmed.
    pub fn tick(&mut self, now: Instant, transport: &mut dyn WireTransport) {
        if self.auto_reporting_enabled {
            return;
        }

        if self.auto_reporting_attempted {
            let expired = self
                .last_attempt
                .is_none_or(|at| now.saturating_duration_since(at) >= self.config.confirm_timeout);
            if !expired {
                return;
            }
            // Drop to the neutral state that permits polling. The enabled
            // flag stays false; only a report or an ack may set it.
            self.auto_reporting_attempted = false;
            tracing::warn!(
                timeout_ms = self.config.confirm_timeout.as_millis() as u64,
                "auto report not confirmed, degrading to fallback polling"
            );
        }

        if self.due(self.last_poll, self.config.poll_interval, now) {
            if transport.send_bytes(&[commands::STATUS_QUERY]).is_ok() {
                self.last_poll = Some(now);
            }
        }

        if self.due(
            self.last_parser_state_poll,
            self.config.parser_state_interval,
            now,
        ) {
            if transport.send_text(&commands::parser_state_query()).is_ok() {
                self.last_parser_state_poll = Some(now);
            }
        }
    }

    fn due(&self, last: Option<Instant>, interval: Duration, now: Instant) -> bool {
        last.is_none_or(|at| now.saturating_duration_since(at) >= interval)
    }

    fn attempt_auto_report(&mut self, now: Instant, transport: &mut dyn WireTransport) {
        if transport.send_text(&commands::enable_auto_report()).is_ok() {
            self.auto_reporting_attempted = true;
            self.last_attempt = Some(now);
        }
    }
}
