//! Breach Engine -- deterministic tick simulation, replay and failure analysis.
//!
//! This crate builds on [`breach_core`] and [`breach_compiler`] to run a
//! compiled script against a level: a fixed-phase tick loop that mutates a
//! working copy of the level's devices, emits typed events, captures one
//! replay frame per tick, and explains failures from the event log.
//!
//! # Quick Start
//!
//! ```
//! use breach_engine::prelude::*;
//!
//! let level = LevelDefinition {
//!     id: "gate".to_owned(),
//!     name: String::new(),
//!     brief: String::new(),
//!     map: LevelMap { width: 6, height: 1, walls: Vec::new() },
//!     entry: Point::new(0, 0),
//!     exit: Point::new(5, 0),
//!     player_path: (0..=5).map(|x| Point::new(x, 0)).collect(),
//!     devices: vec![Device::door("D1", Point::new(3, 0), false)],
//!     network_scope: vec!["D1".to_owned()],
//!     constraints: LevelConstraints {
//!         max_lines: 2, max_commands: 2, max_delay_ticks: 5, tick_limit: 20,
//!     },
//!     suggested_script: None,
//! };
//!
//! let config = EngineConfig::default();
//! let stuck = run_script(&level, "", &CompileOptions::default(), &config).unwrap();
//! assert_eq!(stuck.outcome, RunOutcome::Failure);
//!
//! let through = run_script(&level, "door(\"D1\").open()", &CompileOptions::default(), &config)
//!     .unwrap();
//! assert_eq!(through.outcome, RunOutcome::Success);
//! ```

#![deny(unsafe_code)]

pub mod event;
pub mod failure;
pub mod replay;
pub mod result;
pub mod snapshot;
pub mod tick;

use breach_compiler::{compile_script_checked, CompileFailure, CompileOptions};
use breach_core::level::LevelDefinition;
use breach_core::LevelError;

use crate::result::SimulationResult;
use crate::tick::{simulate, EngineConfig};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why [`run_script`] could not start a simulation.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid level: {0}")]
    Level(#[from] LevelError),

    #[error(transparent)]
    Compile(#[from] CompileFailure),
}

// ---------------------------------------------------------------------------
// run_script()
// ---------------------------------------------------------------------------

/// Check the level, compile `source` and simulate it.
///
/// # Errors
///
/// Returns [`RunError::Level`] if the level breaks a structural invariant and
/// [`RunError::Compile`] if the script does not compile. The simulation
/// itself cannot fail.
pub fn run_script(
    level: &LevelDefinition,
    source: &str,
    options: &CompileOptions,
    config: &EngineConfig,
) -> Result<SimulationResult, RunError> {
    level.check()?;
    let options = CompileOptions {
        tick_ceiling: options.tick_ceiling.min(config.tick_ceiling),
        ..*options
    };
    let commands = compile_script_checked(source, level, &options)?;
    Ok(simulate(level, &commands, config))
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use breach_compiler::prelude::*;
    pub use breach_core::prelude::*;

    pub use crate::event::{EventCategory, EventLog, EventRecord, EventType, PayloadValue};
    pub use crate::failure::{summarize_failure, FailureSummary};
    pub use crate::replay::{
        verify_replay, ReplayDivergence, ReplayFrame, ReplayRecorder, ReplayVerification,
    };
    pub use crate::result::SimulationResult;
    pub use crate::snapshot::SimulationSnapshot;
    pub use crate::tick::{simulate, EngineConfig, TickEngine};
    pub use crate::{run_script, RunError};
}
