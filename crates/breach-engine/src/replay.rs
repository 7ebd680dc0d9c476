//! Replay frames and determinism verification.
//!
//! The [`ReplayRecorder`] captures one [`ReplayFrame`] per simulated tick: a
//! deep [`SimulationSnapshot`] plus the events and script lines produced in
//! that tick. Frames are enough to scrub or play back a run without
//! re-simulating.
//!
//! Because simulation is a pure function of `(level, commands)`,
//! [`verify_replay`] can re-run a recorded script and compare frame digests to
//! prove a stored run is reproducible.
//!
//! # Example
//!
//! ```
//! use breach_core::prelude::*;
//! use breach_engine::replay::verify_replay;
//! use breach_engine::tick::{simulate, EngineConfig};
//!
//! let level = LevelDefinition {
//!     id: "walk".to_owned(),
//!     name: String::new(),
//!     brief: String::new(),
//!     map: LevelMap { width: 4, height: 1, walls: Vec::new() },
//!     entry: Point::new(0, 0),
//!     exit: Point::new(3, 0),
//!     player_path: (0..=3).map(|x| Point::new(x, 0)).collect(),
//!     devices: Vec::new(),
//!     network_scope: Vec::new(),
//!     constraints: LevelConstraints {
//!         max_lines: 1, max_commands: 1, max_delay_ticks: 1, tick_limit: 10,
//!     },
//!     suggested_script: None,
//! };
//!
//! let config = EngineConfig::default();
//! let recorded = simulate(&level, &[], &config);
//! let check = verify_replay(&level, &[], &recorded.frames, &config);
//! assert!(check.first_divergence.is_none());
//! ```

use serde::{Deserialize, Serialize};

use breach_compiler::script::CompiledCommand;
use breach_core::level::LevelDefinition;
use breach_core::state::SimulationState;

use crate::event::EventRecord;
use crate::snapshot::SimulationSnapshot;
use crate::tick::{simulate, EngineConfig};

// ---------------------------------------------------------------------------
// ReplayFrame
// ---------------------------------------------------------------------------

/// Everything observable about one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFrame {
    pub tick: u64,
    pub snapshot: SimulationSnapshot,
    /// Events emitted during this tick, in emission order.
    pub events: Vec<EventRecord>,
    /// Script lines whose commands executed this tick.
    pub executed_lines: Vec<u32>,
    /// BLAKE3 digest of `snapshot`, when frame hashing is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ReplayFrame {
    /// The stored digest, or a freshly computed one if the frame was recorded
    /// without hashing.
    pub fn digest(&self) -> String {
        self.hash
            .clone()
            .unwrap_or_else(|| self.snapshot.state_hash())
    }
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Accumulates frames during a run.
///
/// Frames must be recorded in strictly increasing tick order.
#[derive(Debug, Default)]
pub struct ReplayRecorder {
    frames: Vec<ReplayFrame>,
    hash_frames: bool,
}

impl ReplayRecorder {
    pub fn new(hash_frames: bool) -> Self {
        Self {
            frames: Vec::new(),
            hash_frames,
        }
    }

    /// Capture the end-of-tick state together with the tick's events and
    /// executed lines, and return the recorded frame.
    pub fn record(
        &mut self,
        state: &SimulationState,
        events: Vec<EventRecord>,
        executed_lines: Vec<u32>,
    ) -> &ReplayFrame {
        debug_assert!(
            self.frames.last().map_or(true, |f| f.tick < state.tick),
            "frames must be recorded in increasing tick order"
        );
        let snapshot = SimulationSnapshot::capture(state);
        let hash = self.hash_frames.then(|| snapshot.state_hash());
        self.frames.push(ReplayFrame {
            tick: state.tick,
            snapshot,
            events,
            executed_lines,
            hash,
        });
        &self.frames[self.frames.len() - 1]
    }

    pub fn frames(&self) -> &[ReplayFrame] {
        &self.frames
    }

    pub fn finish(self) -> Vec<ReplayFrame> {
        self.frames
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Details about a determinism failure detected during replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayDivergence {
    /// Tick of the first frame that differs.
    pub tick: u64,
    /// Digest of the recorded frame, or `"missing"` if the recording ended
    /// early.
    pub expected_hash: String,
    /// Digest of the re-simulated frame, or `"missing"` if the re-run ended
    /// early.
    pub actual_hash: String,
}

/// Outcome of [`verify_replay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayVerification {
    /// Frames whose digests were compared and matched.
    pub frames_matched: usize,
    /// `None` if every frame matched and both runs have the same length.
    pub first_divergence: Option<ReplayDivergence>,
}

impl ReplayVerification {
    pub fn is_identical(&self) -> bool {
        self.first_divergence.is_none()
    }
}

const MISSING: &str = "missing";

/// Re-simulate `commands` on `level` and compare each frame digest against
/// `recorded`. Stops at the first differing frame.
pub fn verify_replay(
    level: &LevelDefinition,
    commands: &[CompiledCommand],
    recorded: &[ReplayFrame],
    config: &EngineConfig,
) -> ReplayVerification {
    let rerun = simulate(level, commands, config);
    let mut frames_matched = 0;

    for (expected, actual) in recorded.iter().zip(&rerun.frames) {
        let expected_hash = expected.digest();
        let actual_hash = actual.digest();
        if expected.tick != actual.tick || expected_hash != actual_hash {
            tracing::debug!(tick = expected.tick, "replay diverged");
            return ReplayVerification {
                frames_matched,
                first_divergence: Some(ReplayDivergence {
                    tick: expected.tick,
                    expected_hash,
                    actual_hash,
                }),
            };
        }
        frames_matched += 1;
    }

    let first_divergence = match (recorded.get(frames_matched), rerun.frames.get(frames_matched)) {
        (Some(expected), None) => Some(ReplayDivergence {
            tick: expected.tick,
            expected_hash: expected.digest(),
            actual_hash: MISSING.to_owned(),
        }),
        (None, Some(actual)) => Some(ReplayDivergence {
            tick: actual.tick,
            expected_hash: MISSING.to_owned(),
            actual_hash: actual.digest(),
        }),
        _ => None,
    };

    ReplayVerification {
        frames_matched,
        first_divergence,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
