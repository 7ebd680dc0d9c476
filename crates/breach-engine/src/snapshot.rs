//! Per-tick state snapshots and their BLAKE3 digests.
//!
//! A [`SimulationSnapshot`] is an owned deep copy of the mutable run state at
//! the end of a tick. Nothing in it is shared with the live engine, so later
//! ticks can never change a recorded snapshot.
//!
//! The digest covers the canonical JSON form of the snapshot. Devices are held
//! in declaration order and payload maps are key-ordered, so equal states
//! always serialize to equal bytes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use breach_core::device::{AlarmState, Device};
use breach_core::state::{PlayerState, SimulationState};

// ---------------------------------------------------------------------------
// SimulationSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSnapshot {
    pub tick: u64,
    pub player: PlayerState,
    pub devices: IndexMap<String, Device>,
    /// Alarm bus level at capture time; GREEN when the level has no alarm.
    pub alarm_state: AlarmState,
}

impl SimulationSnapshot {
    pub fn capture(state: &SimulationState) -> Self {
        Self {
            tick: state.tick,
            player: state.player.clone(),
            devices: state.devices.clone(),
            alarm_state: state.alarm_state(),
        }
    }

    /// BLAKE3 hex digest (64 lowercase hex chars) of this snapshot.
    pub fn state_hash(&self) -> String {
        hash_json(self)
    }
}

// ---------------------------------------------------------------------------
// Hashing helpers
// ---------------------------------------------------------------------------

/// BLAKE3 hex digest of `value`'s canonical JSON encoding.
///
/// # Panics
///
/// Panics if `value` cannot be encoded as JSON, which only happens for maps
/// with non-string keys. Every map reachable from a snapshot or an event is
/// keyed by `String`, so a digest always covers the complete encoding.
pub(crate) fn hash_json<T: Serialize>(value: &T) -> String {
    let bytes = serde_json::to_vec(value)
        .expect("snapshot and event types have string-keyed maps only");
    blake3::hash(&bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
