//! Mutable per-run simulation state.
//!
//! A [`SimulationState`] is built fresh from a [`LevelDefinition`] at the
//! start of every run. Devices are deep-copied into an id-keyed map in level
//! declaration order, so a run never aliases the level or another run.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::device::{Alarm, AlarmState, Device, DeviceKind};
use crate::geometry::Point;
use crate::level::LevelDefinition;

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    #[serde(flatten)]
    pub position: Point,
    /// Index into the level's player path of the cell currently occupied.
    pub path_index: usize,
    pub alive: bool,
    pub reached_exit: bool,
    /// Door currently preventing the next step, if any.
    pub blocked_by_door_id: Option<String>,
}

impl PlayerState {
    pub fn at_entry(level: &LevelDefinition) -> Self {
        Self {
            position: level.entry,
            path_index: 0,
            alive: true,
            reached_exit: false,
            blocked_by_door_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    #[default]
    Running,
    Success,
    Failure,
}

impl RunOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunOutcome::Running)
    }
}

// ---------------------------------------------------------------------------
// SimulationState
// ---------------------------------------------------------------------------

/// Working copy of everything that changes during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub tick: u64,
    pub player: PlayerState,
    pub devices: IndexMap<String, Device>,
    pub outcome: RunOutcome,
}

impl SimulationState {
    /// Initial state for `level`: tick 0, player on the entry cell, devices
    /// cloned from the level.
    pub fn from_level(level: &LevelDefinition) -> Self {
        let devices = level
            .devices
            .iter()
            .map(|d| (d.id.clone(), d.clone()))
            .collect();
        Self {
            tick: 0,
            player: PlayerState::at_entry(level),
            devices,
            outcome: RunOutcome::Running,
        }
    }

    /// The level's single alarm bus, if it has one.
    pub fn alarm(&self) -> Option<&Alarm> {
        self.devices.values().find_map(Device::as_alarm)
    }

    pub fn alarm_mut(&mut self) -> Option<&mut Alarm> {
        self.devices.values_mut().find_map(Device::as_alarm_mut)
    }

    /// Current alarm level; GREEN when the level has no alarm.
    pub fn alarm_state(&self) -> AlarmState {
        self.alarm().map(|a| a.state).unwrap_or_default()
    }

    /// The closed door occupying `cell`, if any.
    pub fn closed_door_at(&self, cell: Point) -> Option<&Device> {
        self.devices.values().find(|d| {
            d.position == cell && matches!(&d.kind, DeviceKind::Door(door) if !door.is_open)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Facing;
    use crate::level::{LevelConstraints, LevelMap};

    fn level() -> LevelDefinition {
        LevelDefinition {
            id: "l".to_owned(),
            name: String::new(),
            brief: String::new(),
            map: LevelMap {
                width: 8,
                height: 8,
                walls: Vec::new(),
            },
            entry: Point::new(1, 1),
            exit: Point::new(3, 1),
            player_path: vec![Point::new(1, 1), Point::new(2, 1), Point::new(3, 1)],
            devices: vec![
                Device::door("D1", Point::new(2, 1), false),
                Device::camera("C1", Point::new(0, 0), 3, Facing::Right),
                Device::alarm("A1", Point::new(7, 7), 4),
            ],
            network_scope: Vec::new(),
            constraints: LevelConstraints {
                max_lines: 1,
                max_commands: 1,
                max_delay_ticks: 1,
                tick_limit: 10,
            },
            suggested_script: None,
        }
    }

    #[test]
    fn initial_state_mirrors_level() {
        let level = level();
        let state = SimulationState::from_level(&level);

        assert_eq!(state.tick, 0);
        assert_eq!(state.player.position, level.entry);
        assert!(state.player.alive);
        assert_eq!(state.outcome, RunOutcome::Running);
        let ids: Vec<&str> = state.devices.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["D1", "C1", "A1"]);
    }

    #[test]
    fn working_copy_does_not_alias_level() {
        let level = level();
        let mut state = SimulationState::from_level(&level);
        if let Some(door) = state.devices.get_mut("D1").and_then(Device::as_door_mut) {
            door.is_open = true;
        }
        assert_eq!(level.devices[0].as_door().map(|d| d.is_open), Some(false));
    }

    #[test]
    fn closed_door_lookup_ignores_open_doors() {
        let level = level();
        let mut state = SimulationState::from_level(&level);
        assert!(state.closed_door_at(Point::new(2, 1)).is_some());
        if let Some(door) = state.devices.get_mut("D1").and_then(Device::as_door_mut) {
            door.is_open = true;
        }
        assert!(state.closed_door_at(Point::new(2, 1)).is_none());
    }

    #[test]
    fn alarm_state_defaults_to_green_without_alarm() {
        let mut level = level();
        level.devices.retain(|d| d.id != "A1");
        let state = SimulationState::from_level(&level);
        assert!(state.alarm().is_none());
        assert_eq!(state.alarm_state(), AlarmState::Green);
    }

    #[test]
    fn player_serializes_flat_position() {
        let player = PlayerState::at_entry(&level());
        let value = serde_json::to_value(&player).unwrap();
        assert_eq!(value["x"], 1);
        assert_eq!(value["pathIndex"], 0);
        assert!(value["blockedByDoorId"].is_null());
    }
}
