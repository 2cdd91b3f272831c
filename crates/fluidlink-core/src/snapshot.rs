//! Machine state snapshot
//!
//! The single mutable aggregate holding the latest known value of every
//! field the rest of the application reads. Owned exclusively by the
//! protocol engine; readers clone it to get an internally-consistent view.

use crate::state::{
    CoolantMode, CoordinateSystem, DistanceMode, FeedRateMode, MachineState, MotionMode,
    PlaneSelect, Position, SpindleMode, UnitsMode,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Upper bound on the stored feedback message, in characters.
pub const MAX_MESSAGE_LEN: usize = 127;

/// Progress of a job streaming from the controller's SD card.
///
/// The whole record resets to empty the moment a status report arrives
/// without the `SD` field; absence is the only "job finished" signal the
/// wire protocol provides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobProgress {
    /// A job is currently running
    pub active: bool,
    /// Completion percentage, 0-100
    pub percent: f32,
    /// Name of the file being run
    pub filename: String,
    /// When the running job was first observed
    #[serde(skip)]
    pub started_at: Option<Instant>,
    /// Time elapsed since `started_at`, refreshed on every report
    pub elapsed: Duration,
}

impl JobProgress {
    /// Update from an `SD:` field, refreshing the elapsed duration.
    pub fn update(&mut self, percent: f32, filename: &str, now: Instant) {
        if !self.active {
            self.started_at = Some(now);
            self.elapsed = Duration::ZERO;
        } else if let Some(start) = self.started_at {
            self.elapsed = now.saturating_duration_since(start);
        }
        self.active = true;
        self.percent = percent;
        if self.filename != filename {
            self.filename = filename.to_string();
        }
    }

    /// Reset to the no-job-running state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Aggregate of the latest known machine state.
///
/// Single writer (the protocol engine), any number of readers. Cheap to
/// clone; readers needing multi-field consistency should clone first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSnapshot {
    /// Reported machine state
    pub state: MachineState,
    /// Absolute axis position as reported by the controller (`MPos`)
    pub machine_position: Position,
    /// Last-known coordinate system offset (`WCO`), reported infrequently
    pub work_offset: Position,
    /// Work position; derived as `machine_position - work_offset` unless
    /// the controller reported `WPos` directly
    pub work_position: Position,
    /// Current (not programmed) feed rate
    pub feed_rate: f32,
    /// Current (not programmed) spindle speed
    pub spindle_speed: f32,
    /// Feed override percentage
    pub feed_override: f32,
    /// Rapid override percentage
    pub rapid_override: f32,
    /// Spindle override percentage
    pub spindle_override: f32,
    /// Motion modal group
    pub motion_mode: MotionMode,
    /// Active work coordinate system
    pub coordinate_system: CoordinateSystem,
    /// Plane selection
    pub plane: PlaneSelect,
    /// Units modal group
    pub units_mode: UnitsMode,
    /// Distance modal group
    pub distance_mode: DistanceMode,
    /// Feed rate modal group
    pub feed_rate_mode: FeedRateMode,
    /// Spindle modal group
    pub spindle_mode: SpindleMode,
    /// Coolant modal group
    pub coolant_mode: CoolantMode,
    /// Active tool number
    pub tool: u32,
    /// Most recent human-readable feedback line, bounded
    pub last_message: String,
    /// SD job progress
    pub job: JobProgress,
    /// Link considered established
    pub is_connected: bool,
    /// When the last report was applied
    #[serde(skip)]
    pub last_update: Option<Instant>,
}

impl Default for MachineSnapshot {
    fn default() -> Self {
        Self {
            state: MachineState::Disconnected,
            machine_position: Position::default(),
            work_offset: Position::default(),
            work_position: Position::default(),
            feed_rate: 0.0,
            spindle_speed: 0.0,
            feed_override: 100.0,
            rapid_override: 100.0,
            spindle_override: 100.0,
            motion_mode: MotionMode::default(),
            coordinate_system: CoordinateSystem::default(),
            plane: PlaneSelect::default(),
            units_mode: UnitsMode::default(),
            distance_mode: DistanceMode::default(),
            feed_rate_mode: FeedRateMode::default(),
            spindle_mode: SpindleMode::default(),
            coolant_mode: CoolantMode::default(),
            tool: 0,
            last_message: String::new(),
            job: JobProgress::default(),
            is_connected: false,
            last_update: None,
        }
    }
}

impl MachineSnapshot {
    /// Create a snapshot with documented defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a reported machine position and recompute the derived
    /// work position from the last-known offset.
    pub fn set_machine_position(&mut self, mpos: Position) {
        self.machine_position = mpos;
        self.work_position = mpos - self.work_offset;
    }

    /// Apply a reported work coordinate offset and recompute the derived
    /// work position.
    pub fn set_work_offset(&mut self, wco: Position) {
        self.work_offset = wco;
        self.work_position = self.machine_position - wco;
    }

    /// Apply a directly-reported work position, overriding the derived
    /// value. Rare path; some controller configurations send `WPos`
    /// instead of `MPos`.
    pub fn set_work_position(&mut self, wpos: Position) {
        self.work_position = wpos;
    }

    /// Store a feedback message, truncated to [`MAX_MESSAGE_LEN`] characters.
    pub fn set_message(&mut self, message: &str) {
        if message.chars().count() <= MAX_MESSAGE_LEN {
            self.last_message = message.to_string();
        } else {
            self.last_message = message.chars().take(MAX_MESSAGE_LEN).collect();
        }
    }

    /// Reset everything to construction defaults. Called on disconnect;
    /// this is the only point (besides construction) where modal fields
    /// revert to their defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
