//! Static level definitions and script constraints.
//!
//! A [`LevelDefinition`] is supplied by the content layer and never mutated
//! during a run. Constraints may be widened by persistent upgrades; the caller
//! merges those as a [`ConstraintBonus`] into [`EffectiveConstraints`] before
//! compiling.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceType};
use crate::geometry::Point;
use crate::LevelError;

/// Hard ceiling on simulated ticks, regardless of a level's own limit.
pub const GLOBAL_TICK_LIMIT: u64 = 300;

// ---------------------------------------------------------------------------
// LevelMap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelMap {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub walls: Vec<Point>,
}

impl LevelMap {
    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Script budget and run length authored for a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConstraints {
    pub max_lines: u32,
    pub max_commands: u32,
    pub max_delay_ticks: u64,
    pub tick_limit: u64,
}

/// Non-negative widening deltas granted by upgrades outside the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintBonus {
    #[serde(default)]
    pub max_lines: u32,
    #[serde(default)]
    pub max_commands: u32,
    #[serde(default)]
    pub max_delay_ticks: u64,
}

/// Constraints after bonuses have been merged. This is what the validator
/// checks against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConstraints {
    pub max_lines: u32,
    pub max_commands: u32,
    pub max_delay_ticks: u64,
    pub tick_limit: u64,
}

impl LevelConstraints {
    /// Merge upgrade deltas. The tick limit is never widened.
    pub fn with_bonus(&self, bonus: &ConstraintBonus) -> EffectiveConstraints {
        EffectiveConstraints {
            max_lines: self.max_lines.saturating_add(bonus.max_lines),
            max_commands: self.max_commands.saturating_add(bonus.max_commands),
            max_delay_ticks: self.max_delay_ticks.saturating_add(bonus.max_delay_ticks),
            tick_limit: self.tick_limit,
        }
    }

    /// `min(tick_limit, ceiling)`: the exclusive upper bound on scheduled
    /// command ticks and the tick at which a run times out.
    pub fn effective_tick_limit(&self, ceiling: u64) -> u64 {
        self.tick_limit.min(ceiling)
    }
}

impl From<LevelConstraints> for EffectiveConstraints {
    fn from(c: LevelConstraints) -> Self {
        c.with_bonus(&ConstraintBonus::default())
    }
}

// ---------------------------------------------------------------------------
// LevelDefinition
// ---------------------------------------------------------------------------

/// Everything the compiler and engine need to know about a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brief: String,
    pub map: LevelMap,
    pub entry: Point,
    pub exit: Point,
    /// Precomputed route the player attempts, starting at `entry`.
    pub player_path: Vec<Point>,
    pub devices: Vec<Device>,
    /// Device ids the in-scope terminal may reference.
    pub network_scope: Vec<String>,
    pub constraints: LevelConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_script: Option<String>,
}

impl LevelDefinition {
    /// Parse a level from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        serde_json::from_str(json).map_err(|e| LevelError::Malformed {
            details: e.to_string(),
        })
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn in_scope(&self, id: &str) -> bool {
        self.network_scope.iter().any(|s| s == id)
    }

    /// Whether an alarm device is reachable from the terminal scope.
    pub fn alarm_in_scope(&self) -> bool {
        self.devices
            .iter()
            .any(|d| d.device_type() == DeviceType::Alarm && self.in_scope(&d.id))
    }

    /// Check structural invariants the engine relies on.
    ///
    /// Returns the first violation found, in this order: duplicate ids, more
    /// than one alarm, empty player path, drone paths, scope references,
    /// points outside the map.
    pub fn check(&self) -> Result<(), LevelError> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.id.as_str()) {
                return Err(LevelError::DuplicateDevice {
                    id: device.id.clone(),
                });
            }
        }

        let alarms = self
            .devices
            .iter()
            .filter(|d| d.device_type() == DeviceType::Alarm)
            .count();
        if alarms > 1 {
            return Err(LevelError::MultipleAlarms { count: alarms });
        }

        if self.player_path.is_empty() {
            return Err(LevelError::EmptyPlayerPath);
        }

        for device in &self.devices {
            if let Some(drone) = device.as_drone() {
                if drone.path.len() < 2 {
                    return Err(LevelError::ShortDronePath {
                        id: device.id.clone(),
                        len: drone.path.len(),
                    });
                }
            }
        }

        for id in &self.network_scope {
            if !seen.contains(id.as_str()) {
                return Err(LevelError::UnknownScopeDevice { id: id.clone() });
            }
        }

        let mut points = vec![("entry".to_owned(), self.entry), ("exit".to_owned(), self.exit)];
        points.extend(
            self.player_path
                .iter()
                .map(|p| ("player path".to_owned(), *p)),
        );
        for device in &self.devices {
            points.push((format!("device {}", device.id), device.position));
            if let Some(drone) = device.as_drone() {
                points.extend(
                    drone
                        .path
                        .iter()
                        .map(|p| (format!("drone {} path", device.id), *p)),
                );
            }
        }
        for (what, point) in points {
            if !self.map.contains(point) {
                return Err(LevelError::OutOfBounds {
                    what,
                    point,
                    width: self.map.width,
                    height: self.map.height,
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
