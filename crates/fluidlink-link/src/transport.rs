//! Wire transport abstraction
//!
//! The protocol engine drives a message-oriented socket through this
//! seam. The engine never blocks on it: sends are fire-and-forget and
//! `poll` drains whatever arrived since the last call.

use fluidlink_core::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Address of a FluidNC machine on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescriptor {
    /// Hostname or IP of the controller
    pub host: String,
    /// WebSocket port (FluidNC default 81)
    pub port: u16,
}

impl Default for LinkDescriptor {
    fn default() -> Self {
        Self {
            host: "fluidnc.local".to_string(),
            port: 81,
        }
    }
}

impl LinkDescriptor {
    /// Create a descriptor from host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// WebSocket URL for this machine
    pub fn url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.port)
    }
}

impl std::fmt::Display for LinkDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Event surfaced by a transport's `poll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Socket opened (initial connect or reconnect)
    Opened,
    /// Socket closed or dropped
    Closed,
    /// An inbound frame; may contain several newline-separated lines
    Frame(String),
}

/// Message-oriented socket the engine configures and drives.
///
/// Implementations must be non-blocking throughout: `poll` returns
/// immediately with whatever is buffered, sends queue and return.
pub trait WireTransport {
    /// Begin connecting to the machine. Asynchronous; an `Opened` event
    /// is surfaced through `poll` once the socket is up.
    fn connect(&mut self, descriptor: &LinkDescriptor) -> Result<()>;

    /// Tear the socket down. No further events after the final `Closed`.
    fn disconnect(&mut self);

    /// Set how often the transport retries after a failed or dropped
    /// connection. An effectively-infinite interval disables retries.
    fn set_reconnect_interval(&mut self, interval: Duration);

    /// Queue a text frame. Callers own line termination.
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Queue raw bytes (realtime single-byte commands).
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drain pending events without blocking.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Whether the socket is currently open.
    fn is_open(&self) -> bool;
}

/// Transport that accepts everything and delivers nothing.
///
/// Stands in before a real transport is attached, and in tests that
/// only exercise the engine's offline behavior.
#[derive(Debug, Default)]
pub struct NoOpTransport {
    open: bool,
}

impl NoOpTransport {
    /// Create a new no-op transport
    pub fn new() -> Self {
        Self::default()
    }
}

impl WireTransport for NoOpTransport {
    fn connect(&mut self, _descriptor: &LinkDescriptor) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.open = false;
    }

    fn set_reconnect_interval(&mut self, _interval: Duration) {}

    fn send_text(&mut self, _text: &str) -> Result<()> {
        if !self.open {
            return Err(LinkError::NotConnected.into());
        }
        Ok(())
    }

    fn send_bytes(&mut self, _bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(LinkError::NotConnected.into());
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        Vec::new()
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
