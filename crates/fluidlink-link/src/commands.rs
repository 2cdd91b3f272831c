//! Outbound command vocabulary
//!
//! Realtime single-byte commands and line-command builders for the
//! FluidNC/GRBL wire protocol. Realtime bytes are executed by the
//! controller immediately, outside the line buffer; line commands must
//! be terminated with `\n`.

/// Status query realtime byte (`?`)
pub const STATUS_QUERY: u8 = b'?';
/// Feed hold realtime byte (`!`)
pub const FEED_HOLD: u8 = b'!';
/// Cycle start / resume realtime byte (`~`)
pub const CYCLE_RESUME: u8 = b'~';
/// Soft reset realtime byte (Ctrl-X)
pub const SOFT_RESET: u8 = 0x18;
/// Jog cancel realtime byte
pub const JOG_CANCEL: u8 = 0x85;

/// Feed override: reset to 100%
pub const FEED_OVR_RESET: u8 = 0x90;
/// Feed override: +10%
pub const FEED_OVR_COARSE_PLUS: u8 = 0x91;
/// Feed override: -10%
pub const FEED_OVR_COARSE_MINUS: u8 = 0x92;
/// Feed override: +1%
pub const FEED_OVR_FINE_PLUS: u8 = 0x93;
/// Feed override: -1%
pub const FEED_OVR_FINE_MINUS: u8 = 0x94;
/// Rapid override: 100%
pub const RAPID_OVR_RESET: u8 = 0x95;
/// Rapid override: 50%
pub const RAPID_OVR_MEDIUM: u8 = 0x96;
/// Rapid override: 25%
pub const RAPID_OVR_LOW: u8 = 0x97;
/// Spindle override: reset to 100%
pub const SPINDLE_OVR_RESET: u8 = 0x99;
/// Spindle override: +10%
pub const SPINDLE_OVR_COARSE_PLUS: u8 = 0x9A;
/// Spindle override: -10%
pub const SPINDLE_OVR_COARSE_MINUS: u8 = 0x9B;
/// Spindle override: +1%
pub const SPINDLE_OVR_FINE_PLUS: u8 = 0x9C;
/// Spindle override: -1%
pub const SPINDLE_OVR_FINE_MINUS: u8 = 0x9D;

/// Feed override nudge, mapped to its realtime byte. The controller
/// clamps the resulting percentage to 10-200%.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOverride {
    /// Back to 100%
    Reset,
    /// +10%
    CoarsePlus,
    /// -10%
    CoarseMinus,
    /// +1%
    FinePlus,
    /// -1%
    FineMinus,
}

impl FeedOverride {
    /// The realtime byte for this nudge.
    pub fn byte(self) -> u8 {
        match self {
            Self::Reset => FEED_OVR_RESET,
            Self::CoarsePlus => FEED_OVR_COARSE_PLUS,
            Self::CoarseMinus => FEED_OVR_COARSE_MINUS,
            Self::FinePlus => FEED_OVR_FINE_PLUS,
            Self::FineMinus => FEED_OVR_FINE_MINUS,
        }
    }
}

/// Rapid override level; rapids only support the three fixed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RapidOverride {
    /// 100%
    Full,
    /// 50%
    Medium,
    /// 25%
    Low,
}

impl RapidOverride {
    /// The realtime byte for this level.
    pub fn byte(self) -> u8 {
        match self {
            Self::Full => RAPID_OVR_RESET,
            Self::Medium => RAPID_OVR_MEDIUM,
            Self::Low => RAPID_OVR_LOW,
        }
    }
}

/// Spindle override nudge, mapped to its realtime byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpindleOverride {
    /// Back to 100%
    Reset,
    /// +10%
    CoarsePlus,
    /// -10%
    CoarseMinus,
    /// +1%
    FinePlus,
    /// -1%
    FineMinus,
}

impl SpindleOverride {
    /// The realtime byte for this nudge.
    pub fn byte(self) -> u8 {
        match self {
            Self::Reset => SPINDLE_OVR_RESET,
            Self::CoarsePlus => SPINDLE_OVR_COARSE_PLUS,
            Self::CoarseMinus => SPINDLE_OVR_COARSE_MINUS,
            Self::FinePlus => SPINDLE_OVR_FINE_PLUS,
            Self::FineMinus => SPINDLE_OVR_FINE_MINUS,
        }
    }
}

/// Auto-report interval requested from the controller, in milliseconds.
pub const REPORT_INTERVAL_MS: u32 = 250;

/// `$Report/Interval=...` line enabling push status reports.
pub fn enable_auto_report() -> String {
    format!("$Report/Interval={}\n", REPORT_INTERVAL_MS)
}

/// `$G` parser-state refresh request.
pub fn parser_state_query() -> String {
    "$G\n".to_string()
}

/// `$H` homing cycle.
pub fn home_all() -> String {
    "$H\n".to_string()
}

/// `$X` alarm unlock.
pub fn unlock() -> String {
    "$X\n".to_string()
}

/// Incremental jog: `$J=G91 <axis><distance> F<feed>`.
///
/// `distance` carries its own sign. Feed is clamped to a minimum of
/// 1 unit/min; a zero feed would be rejected by the controller.
pub fn jog_incremental(axis: char, distance: f32, feed_rate: f32) -> String {
    format!(
        "$J=G91 {}{:.3} F{:.0}\n",
        axis.to_ascii_uppercase(),
        distance,
        feed_rate.max(1.0)
    )
}
