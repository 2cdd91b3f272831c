//! Link listener interface
//!
//! Defines the listener trait the protocol engine notifies on link
//! lifecycle events and probe results. Registration is single-slot:
//! registering a listener replaces any previous one.

use serde::{Deserialize, Serialize};

/// Outcome of a `G38.x` probe cycle, reported by the controller as
/// `[PRB:x,y,z:success]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// X coordinate of the probe trigger point
    pub x: f32,
    /// Y coordinate of the probe trigger point
    pub y: f32,
    /// Z coordinate of the probe trigger point
    pub z: f32,
    /// Whether the probe made contact
    pub success: bool,
}

/// Listener trait for link events
///
/// Implement this trait to receive notifications from the protocol engine.
/// All methods have no-op defaults so implementors pick what they need.
pub trait LinkListener {
    /// Called once when the link is first established (auto-report
    /// confirmation or the first status report received).
    fn on_link_established(&mut self) {}

    /// Called when a previously-established link is lost.
    fn on_link_lost(&mut self) {}

    /// Called when the controller reports a probe result.
    fn on_probe_result(&mut self, _result: ProbeResult) {}
}
