//! Security devices: the closed set of things a script can manipulate.
//!
//! A [`Device`] is a common header (id, position, enabled flag, free-text tag)
//! plus a [`DeviceKind`] payload carrying the variant-specific fields. The
//! JSON shape is flat and tagged by `"type"`, matching how level content is
//! authored:
//!
//! ```json
//! { "id": "C1", "type": "camera", "x": 4, "y": 1, "enabled": true,
//!   "range": 5, "facing": "down", "disabledUntilTick": null }
//! ```
//!
//! Engine code matches [`DeviceKind`] exhaustively, so adding a variant is a
//! compile error everywhere it is not yet handled.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Facing, Point};

// ---------------------------------------------------------------------------
// AlarmState / AlarmTrigger
// ---------------------------------------------------------------------------

/// Escalation level of the alarm bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmState {
    #[default]
    Green,
    Yellow,
    Red,
}

impl AlarmState {
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmState::Green => "GREEN",
            AlarmState::Yellow => "YELLOW",
            AlarmState::Red => "RED",
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a turret is allowed to engage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmTrigger {
    /// Engages whenever a target is in range.
    Always,
    /// Engages only while the alarm bus is RED.
    Red,
}

// ---------------------------------------------------------------------------
// Variant payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub range: u32,
    pub facing: Facing,
    /// Absolute tick at which a timed disable expires. `None` while enabled
    /// or while disabled indefinitely.
    #[serde(default)]
    pub disabled_until_tick: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turret {
    pub range: u32,
    /// Consecutive ticks the same target must be held before firing.
    pub lock_delay: u32,
    pub alarm_trigger: AlarmTrigger,
    /// Scripted preference set by `turret(..).retarget(..)`.
    #[serde(default)]
    pub desired_target_id: Option<String>,
    #[serde(default)]
    pub current_target_id: Option<String>,
    #[serde(default)]
    pub lock_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drone {
    /// Cyclic patrol route. The drone's position always equals
    /// `path[path_index]` once it has moved.
    pub path: Vec<Point>,
    #[serde(default)]
    pub path_index: usize,
    pub step_interval: u32,
    #[serde(default)]
    pub step_timer: u32,
    #[serde(default = "default_true")]
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Door {
    pub is_open: bool,
    /// Auto-lockdown: force-closed when the alarm reaches RED.
    #[serde(default)]
    pub closes_on_alarm_red: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    #[serde(default)]
    pub state: AlarmState,
    pub base_escalation_ticks: u64,
    #[serde(default)]
    pub red_at_tick: Option<u64>,
    /// Delay requested while still GREEN, consumed at the next escalation.
    #[serde(default)]
    pub manual_delay_buffer: u64,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// DeviceKind / DeviceType
// ---------------------------------------------------------------------------

/// Variant-specific device state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceKind {
    Camera(Camera),
    Turret(Turret),
    Drone(Drone),
    Door(Door),
    Alarm(Alarm),
    /// Passive scope anchor.
    Terminal,
}

/// Payload-free discriminant of [`DeviceKind`], used for diagnostics and
/// type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Camera,
    Turret,
    Drone,
    Door,
    Alarm,
    Terminal,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Camera => "camera",
            DeviceType::Turret => "turret",
            DeviceType::Drone => "drone",
            DeviceType::Door => "door",
            DeviceType::Alarm => "alarm",
            DeviceType::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

impl DeviceKind {
    pub fn device_type(&self) -> DeviceType {
        match self {
            DeviceKind::Camera(_) => DeviceType::Camera,
            DeviceKind::Turret(_) => DeviceType::Turret,
            DeviceKind::Drone(_) => DeviceType::Drone,
            DeviceKind::Door(_) => DeviceType::Door,
            DeviceKind::Alarm(_) => DeviceType::Alarm,
            DeviceKind::Terminal => DeviceType::Terminal,
        }
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// A device placed on the level grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    #[serde(flatten)]
    pub position: Point,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(flatten)]
    pub kind: DeviceKind,
}

impl Device {
    fn new(id: &str, position: Point, kind: DeviceKind) -> Self {
        Self {
            id: id.to_owned(),
            position,
            enabled: true,
            tag: None,
            kind,
        }
    }

    /// An enabled camera.
    pub fn camera(id: &str, position: Point, range: u32, facing: Facing) -> Self {
        Self::new(
            id,
            position,
            DeviceKind::Camera(Camera {
                range,
                facing,
                disabled_until_tick: None,
            }),
        )
    }

    /// An enabled turret with no scripted target.
    pub fn turret(
        id: &str,
        position: Point,
        range: u32,
        lock_delay: u32,
        alarm_trigger: AlarmTrigger,
    ) -> Self {
        Self::new(
            id,
            position,
            DeviceKind::Turret(Turret {
                range,
                lock_delay,
                alarm_trigger,
                desired_target_id: None,
                current_target_id: None,
                lock_ticks: 0,
            }),
        )
    }

    /// A live drone starting on the first cell of its patrol path.
    pub fn drone(id: &str, path: Vec<Point>, step_interval: u32) -> Self {
        let start = path.first().copied().unwrap_or_default();
        Self::new(
            id,
            start,
            DeviceKind::Drone(Drone {
                path,
                path_index: 0,
                step_interval,
                step_timer: 0,
                alive: true,
            }),
        )
    }

    /// A door that ignores alarm lockdown.
    pub fn door(id: &str, position: Point, is_open: bool) -> Self {
        Self::new(
            id,
            position,
            DeviceKind::Door(Door {
                is_open,
                closes_on_alarm_red: false,
            }),
        )
    }

    /// A GREEN alarm bus.
    pub fn alarm(id: &str, position: Point, base_escalation_ticks: u64) -> Self {
        Self::new(
            id,
            position,
            DeviceKind::Alarm(Alarm {
                state: AlarmState::Green,
                base_escalation_ticks,
                red_at_tick: None,
                manual_delay_buffer: 0,
            }),
        )
    }

    pub fn terminal(id: &str, position: Point) -> Self {
        Self::new(id, position, DeviceKind::Terminal)
    }

    /// Flag a door for forced closure when the alarm reaches RED. No effect
    /// on other device kinds.
    pub fn with_lockdown(mut self) -> Self {
        if let DeviceKind::Door(door) = &mut self.kind {
            door.closes_on_alarm_red = true;
        }
        self
    }

    pub fn device_type(&self) -> DeviceType {
        self.kind.device_type()
    }

    pub fn as_camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.kind {
            DeviceKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_turret_mut(&mut self) -> Option<&mut Turret> {
        match &mut self.kind {
            DeviceKind::Turret(turret) => Some(turret),
            _ => None,
        }
    }

    pub fn as_door(&self) -> Option<&Door> {
        match &self.kind {
            DeviceKind::Door(door) => Some(door),
            _ => None,
        }
    }

    pub fn as_door_mut(&mut self) -> Option<&mut Door> {
        match &mut self.kind {
            DeviceKind::Door(door) => Some(door),
            _ => None,
        }
    }

    pub fn as_drone(&self) -> Option<&Drone> {
        match &self.kind {
            DeviceKind::Drone(drone) => Some(drone),
            _ => None,
        }
    }

    pub fn as_alarm(&self) -> Option<&Alarm> {
        match &self.kind {
            DeviceKind::Alarm(alarm) => Some(alarm),
            _ => None,
        }
    }

    pub fn as_alarm_mut(&mut self) -> Option<&mut Alarm> {
        match &mut self.kind {
            DeviceKind::Alarm(alarm) => Some(alarm),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
