//! # FluidLink Core
//!
//! Core types and abstractions for the FluidLink machine-link engine.
//! Provides the machine-state snapshot, modal group vocabulary, the
//! listener interface the engine notifies, and the error taxonomy.

pub mod error;
pub mod listener;
pub mod snapshot;
pub mod state;

pub use error::{Error, LinkError, ProtocolError, Result};
pub use listener::{LinkListener, ProbeResult};
pub use snapshot::{JobProgress, MachineSnapshot, MAX_MESSAGE_LEN};
pub use state::{
    CoolantMode, CoordinateSystem, DistanceMode, FeedRateMode, MachineState, MotionMode,
    PlaneSelect, Position, SpindleMode, UnitsMode,
};
