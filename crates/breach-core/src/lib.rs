//! Breach Core -- data model for the security-script simulation.
//!
//! This crate holds the types shared by the script compiler and the tick
//! engine: integer grid geometry, the closed set of security [`Device`]s,
//! static [`LevelDefinition`]s with their script constraints, and the mutable
//! [`SimulationState`] a run folds over.
//!
//! # Quick Start
//!
//! ```
//! use breach_core::prelude::*;
//!
//! let camera = Device::camera("C1", Point::new(4, 1), 5, Facing::Down);
//! assert_eq!(camera.device_type(), DeviceType::Camera);
//!
//! let seen = Facing::Down.cone_contains(camera.position, Point::new(4, 4));
//! assert!(seen && camera.position.manhattan(Point::new(4, 4)) <= 5);
//! ```
//!
//! [`Device`]: device::Device
//! [`LevelDefinition`]: level::LevelDefinition
//! [`SimulationState`]: state::SimulationState

#![deny(unsafe_code)]

pub mod device;
pub mod geometry;
pub mod level;
pub mod state;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Structural problems in a level definition.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    /// The level JSON could not be decoded.
    #[error("malformed level definition: {details}")]
    Malformed { details: String },

    /// Two devices share an id.
    #[error("device id '{id}' is used more than once")]
    DuplicateDevice { id: String },

    /// The engine reads a single alarm bus.
    #[error("level declares {count} alarm devices, at most one is allowed")]
    MultipleAlarms { count: usize },

    #[error("player path is empty")]
    EmptyPlayerPath,

    #[error("drone '{id}' has a patrol path of {len} point(s), at least 2 are required")]
    ShortDronePath { id: String, len: usize },

    #[error("network scope names unknown device '{id}'")]
    UnknownScopeDevice { id: String },

    #[error("{what} at {point} lies outside the {width}x{height} map")]
    OutOfBounds {
        what: String,
        point: geometry::Point,
        width: i32,
        height: i32,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::device::{
        Alarm, AlarmState, AlarmTrigger, Camera, Device, DeviceKind, DeviceType, Door, Drone,
        Turret,
    };
    pub use crate::geometry::{Facing, Point};
    pub use crate::level::{
        ConstraintBonus, EffectiveConstraints, LevelConstraints, LevelDefinition, LevelMap,
        GLOBAL_TICK_LIMIT,
    };
    pub use crate::state::{PlayerState, RunOutcome, SimulationState};
    pub use crate::LevelError;
}
