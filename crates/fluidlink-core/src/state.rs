//! Machine state and modal group vocabulary
//!
//! This module provides:
//! - The machine state reported in FluidNC status reports
//! - 3-axis position tracking in millimeters
//! - The nine GCode modal groups carried in `$G` parser-state reports

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine state as reported in the first field of a status report.
///
/// FluidNC (like GRBL) reports the state token first, e.g. `<Idle|...>`
/// or `<Hold:0|...>`. Tokens are matched case-sensitively by prefix so
/// qualified forms such as `Hold:0` and `Door:1` resolve correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MachineState {
    /// Waiting for commands
    Idle,
    /// Executing motion
    Run,
    /// Feed hold in progress or complete
    Hold,
    /// Jog motion in progress
    Jog,
    /// Alarm lock, motion disabled
    Alarm,
    /// Safety door open
    Door,
    /// Check mode, GCode parsed but not executed
    Check,
    /// Homing cycle running
    Home,
    /// Sleep mode
    Sleep,
    /// No link to the machine
    #[default]
    Disconnected,
}

impl MachineState {
    /// Map a status-report state token to a machine state.
    ///
    /// Returns `None` for unrecognized tokens; the caller keeps the
    /// previous state in that case (forward compatibility).
    pub fn from_report_token(token: &str) -> Option<Self> {
        const TABLE: [(&str, MachineState); 9] = [
            ("Idle", MachineState::Idle),
            ("Run", MachineState::Run),
            ("Hold", MachineState::Hold),
            ("Jog", MachineState::Jog),
            ("Alarm", MachineState::Alarm),
            ("Door", MachineState::Door),
            ("Check", MachineState::Check),
            ("Home", MachineState::Home),
            ("Sleep", MachineState::Sleep),
        ];

        TABLE
            .iter()
            .find(|(prefix, _)| token.starts_with(prefix))
            .map(|(_, state)| *state)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Run => write!(f, "Run"),
            Self::Hold => write!(f, "Hold"),
            Self::Jog => write!(f, "Jog"),
            Self::Alarm => write!(f, "Alarm"),
            Self::Door => write!(f, "Door"),
            Self::Check => write!(f, "Check"),
            Self::Home => write!(f, "Home"),
            Self::Sleep => write!(f, "Sleep"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// A 3-axis position in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f32,
    /// Y-axis position
    pub y: f32,
    /// Z-axis position
    pub z: f32,
}

impl Position {
    /// Create a position from explicit coordinates
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl std::ops::Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3},{:.3},{:.3}", self.x, self.y, self.z)
    }
}

/// Motion modal group (GCode group 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionMode {
    /// G0 rapid positioning
    #[default]
    Rapid,
    /// G1 linear feed
    Linear,
    /// G2 clockwise arc
    ArcCw,
    /// G3 counter-clockwise arc
    ArcCcw,
    /// G80 canned cycle cancel
    None,
}

/// Active work coordinate system (G54-G59)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// G54 (default)
    #[default]
    G54,
    /// G55
    G55,
    /// G56
    G56,
    /// G57
    G57,
    /// G58
    G58,
    /// G59
    G59,
}

/// Plane selection modal group (G17-G19)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaneSelect {
    /// G17 XY plane (default)
    #[default]
    Xy,
    /// G18 ZX plane
    Zx,
    /// G19 YZ plane
    Yz,
}

/// Units modal group (G20/G21)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnitsMode {
    /// G21 millimeters (FluidNC default)
    #[default]
    Mm,
    /// G20 inches
    Inch,
}

/// Distance modal group (G90/G91)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMode {
    /// G90 absolute (default)
    #[default]
    Absolute,
    /// G91 incremental
    Incremental,
}

/// Feed rate modal group (G93-G95)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeedRateMode {
    /// G94 units per minute (default)
    #[default]
    UnitsPerMinute,
    /// G93 inverse time
    InverseTime,
    /// G95 units per revolution
    UnitsPerRev,
}

/// Spindle modal group (M3-M5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpindleMode {
    /// M5 spindle stopped (default)
    #[default]
    Off,
    /// M3 clockwise
    Cw,
    /// M4 counter-clockwise
    Ccw,
}

/// Coolant modal group (M7-M9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoolantMode {
    /// M9 coolant off (default)
    #[default]
    Off,
    /// M7 mist coolant
    Mist,
    /// M8 flood coolant
    Flood,
}
