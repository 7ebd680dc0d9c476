//! Backward causal narrative for failed runs.
//!
//! [`summarize_failure`] reads the finished event log and explains the failure
//! in terms of the most specific cause it can find, checked in this order:
//! player killed, player blocked by a door, run timeout, anything else.

use serde::{Deserialize, Serialize};

use breach_core::device::AlarmState;

use crate::event::{EventLog, EventRecord, EventType};

/// Longest cause chain reported.
pub const MAX_CHAIN_LEN: usize = 4;

// ---------------------------------------------------------------------------
// FailureSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureSummary {
    pub primary_cause: String,
    /// Oldest cause first.
    pub cause_chain: Vec<String>,
    pub suggested_focus: String,
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

pub fn summarize_failure(events: &EventLog) -> FailureSummary {
    if let Some(killed) = events.find_last(EventType::PlayerKilled) {
        return kill_summary(events, killed);
    }
    if let Some(blocked) = events.find_last(EventType::PlayerBlockedByDoor) {
        return door_summary(events, blocked);
    }
    if events.find_last(EventType::RunTimeout).is_some() {
        return FailureSummary {
            primary_cause: "Run timed out before reaching exit".to_owned(),
            cause_chain: vec!["No successful path completion before tick limit".to_owned()],
            suggested_focus: "Reduce waits and unblock doors earlier".to_owned(),
        };
    }
    FailureSummary {
        primary_cause: "Run failed".to_owned(),
        cause_chain: vec!["Simulation ended without reaching exit".to_owned()],
        suggested_focus: "Inspect event log and adjust script timing".to_owned(),
    }
}

fn kill_summary(events: &EventLog, killed: &EventRecord) -> FailureSummary {
    let turret = killed.text("turretId").unwrap_or("unknown turret");
    let detected = events.find_last_at_or_before(EventType::CameraDetectedPlayer, killed.tick);
    let alarm = events.find_last_at_or_before(EventType::AlarmStateChanged, killed.tick);
    let lock = events.find_last_at_or_before(EventType::TurretTargetLock, killed.tick);

    let mut chain = Vec::new();
    let camera = detected.and_then(|e| e.text("cameraId"));
    if let Some(camera) = camera {
        chain.push(format!("Camera {camera} detected player"));
    }
    if alarm.is_some_and(escalated_to_red) {
        chain.push("Alarm escalated to RED".to_owned());
    }
    if let Some(lock) = lock {
        chain.push(format!(
            "Turret {} acquired target {}",
            lock.text("turretId").unwrap_or("unknown turret"),
            lock.text("targetId").unwrap_or("unknown target"),
        ));
    }
    chain.push(format!("Turret {turret} fired on player"));

    let keep_from = chain.len().saturating_sub(MAX_CHAIN_LEN);
    chain.drain(..keep_from);

    let suggested_focus = match camera {
        Some(camera) => format!("Disable {camera} or delay alarm before turret lock"),
        None => format!("Retarget {turret} to a drone or keep alarm below RED"),
    };

    FailureSummary {
        primary_cause: format!("Turret {turret} killed player"),
        cause_chain: chain,
        suggested_focus,
    }
}

fn door_summary(events: &EventLog, blocked: &EventRecord) -> FailureSummary {
    let door = blocked.text("doorId").unwrap_or("unknown door");
    let alarm = events.find_last_at_or_before(EventType::AlarmStateChanged, blocked.tick);

    let mut chain = Vec::new();
    if alarm.is_some_and(escalated_to_red) {
        chain.push("Alarm escalated to RED".to_owned());
    }
    chain.push(format!("Door {door} blocked movement"));

    FailureSummary {
        primary_cause: format!("Player was stopped by door {door}"),
        cause_chain: chain,
        suggested_focus: format!("Open {door} earlier or prevent alarm-triggered lockdown"),
    }
}

fn escalated_to_red(event: &EventRecord) -> bool {
    event.text("to") == Some(AlarmState::Red.as_str())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
