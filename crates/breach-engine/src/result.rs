//! The plain-data output of a run.

use serde::{Deserialize, Serialize};

use breach_core::state::RunOutcome;

use crate::event::EventLog;
use crate::failure::FailureSummary;
use crate::replay::ReplayFrame;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// One frame per simulated tick, starting at tick 0.
    pub frames: Vec<ReplayFrame>,
    pub events: EventLog,
    /// `Success` or `Failure`; never `Running`.
    pub outcome: RunOutcome,
    pub final_tick: u64,
    /// Effective limit the run was bounded by.
    pub tick_limit: u64,
    /// Present exactly when the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<FailureSummary>,
}

impl SimulationResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    /// BLAKE3 digest of the whole run: every frame digest in order, then every
    /// event, then the outcome and final tick. Two runs with equal digests
    /// are bit-identical for all practical purposes.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for frame in &self.frames {
            hasher.update(frame.digest().as_bytes());
        }
        for event in &self.events {
            hasher.update(crate::snapshot::hash_json(event).as_bytes());
        }
        hasher.update(format!("{:?}", self.outcome).as_bytes());
        hasher.update(&self.final_tick.to_le_bytes());
        hasher.finalize().to_hex().to_string()
    }
}
