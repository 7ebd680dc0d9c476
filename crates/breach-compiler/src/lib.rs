//! Breach Compiler -- script text to tick-stamped commands.
//!
//! Compilation runs three synchronous stages:
//!
//! 1. [`parser`] -- text to line-tagged [`Command`]s or syntax errors.
//! 2. [`validator`] -- topology, scope, type and budget checks, accumulated.
//! 3. [`schedule`] -- absolute tick stamping, then a bound check that every
//!    command lands inside `[0, tick_limit)`.
//!
//! A stage with errors stops the pipeline; the result then carries errors and
//! no commands.
//!
//! # Example
//!
//! ```
//! use breach_compiler::compile_script;
//! use breach_core::prelude::*;
//!
//! let level = LevelDefinition {
//!     id: "demo".to_owned(),
//!     name: String::new(),
//!     brief: String::new(),
//!     map: LevelMap { width: 8, height: 3, walls: Vec::new() },
//!     entry: Point::new(0, 1),
//!     exit: Point::new(4, 1),
//!     player_path: (0..=4).map(|x| Point::new(x, 1)).collect(),
//!     devices: vec![Device::door("D1", Point::new(2, 1), false)],
//!     network_scope: vec!["D1".to_owned()],
//!     constraints: LevelConstraints {
//!         max_lines: 4, max_commands: 4, max_delay_ticks: 20, tick_limit: 15,
//!     },
//!     suggested_script: None,
//! };
//!
//! let ok = compile_script("wait(14)\ndoor(\"D1\").open()", &level);
//! assert!(ok.is_ok());
//! assert_eq!(ok.commands[1].tick, 14);
//!
//! let late = compile_script("wait(15)\ndoor(\"D1\").open()", &level);
//! assert_eq!(late.errors.len(), 1);
//! assert!(late.errors[0].message.contains("[0, 15)"));
//! ```
//!
//! [`Command`]: script::Command

#![deny(unsafe_code)]

pub mod parser;
pub mod schedule;
pub mod script;
pub mod validator;

use breach_core::level::{ConstraintBonus, LevelDefinition, GLOBAL_TICK_LIMIT};

use crate::script::{CompileError, CompileResult, CompiledCommand};

pub use crate::parser::count_script_commands;

// ---------------------------------------------------------------------------
// CompileOptions
// ---------------------------------------------------------------------------

/// Caller-supplied knobs for a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Upgrade deltas merged into the level's base constraints.
    pub bonus: ConstraintBonus,
    /// Global hard ceiling on the run length.
    pub tick_ceiling: u64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            bonus: ConstraintBonus::default(),
            tick_ceiling: GLOBAL_TICK_LIMIT,
        }
    }
}

// ---------------------------------------------------------------------------
// CompileFailure
// ---------------------------------------------------------------------------

/// A script that did not compile, for callers that prefer `Result`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("script failed to compile with {} error(s); first: {}", .errors.len(), first_error(.errors))]
pub struct CompileFailure {
    pub errors: Vec<CompileError>,
}

fn first_error(errors: &[CompileError]) -> String {
    errors
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Compile `source` for `level` with default options.
pub fn compile_script(source: &str, level: &LevelDefinition) -> CompileResult {
    compile_script_with(source, level, &CompileOptions::default())
}

/// Compile `source` for `level`, merging `options.bonus` into the level's
/// constraints and bounding the schedule by
/// `min(level.tick_limit, options.tick_ceiling)`.
pub fn compile_script_with(
    source: &str,
    level: &LevelDefinition,
    options: &CompileOptions,
) -> CompileResult {
    let parsed = parser::parse_script(source);
    if !parsed.errors.is_empty() {
        return CompileResult::failed(parsed.errors);
    }

    let constraints = level.constraints.with_bonus(&options.bonus);
    let errors = validator::validate(level, &constraints, &parsed.commands);
    if !errors.is_empty() {
        return CompileResult::failed(errors);
    }

    let commands = schedule::schedule(parsed.commands);
    let tick_limit = level.constraints.effective_tick_limit(options.tick_ceiling);
    let last = schedule::last_tick(&commands);
    if !commands.is_empty() && last >= tick_limit {
        tracing::debug!(level = %level.id, last, tick_limit, "schedule overruns run window");
        return CompileResult::failed(vec![CompileError::new(
            1,
            format!(
                "Script schedule exceeds run range [0, {tick_limit}): last command lands on tick {last}"
            ),
        )]);
    }

    tracing::debug!(
        level = %level.id,
        commands = commands.len(),
        last_tick = last,
        "compiled script"
    );
    CompileResult {
        commands,
        errors: Vec::new(),
    }
}

/// Like [`compile_script_with`], but returns the errors as `Err`.
pub fn compile_script_checked(
    source: &str,
    level: &LevelDefinition,
    options: &CompileOptions,
) -> Result<Vec<CompiledCommand>, CompileFailure> {
    let result = compile_script_with(source, level, options);
    if result.errors.is_empty() {
        Ok(result.commands)
    } else {
        Err(CompileFailure {
            errors: result.errors,
        })
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::parser::{count_script_commands, parse_script, ParseResult};
    pub use crate::script::{
        Command, CommandKind, CompileError, CompileResult, CompiledCommand, ParsedCommand,
    };
    pub use crate::{
        compile_script, compile_script_checked, compile_script_with, CompileFailure,
        CompileOptions,
    };
}
