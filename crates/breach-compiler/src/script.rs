//! Typed script commands and compiler output.
//!
//! The command language is a closed set of verbs. Each verb is one variant of
//! [`Command`] carrying exactly the arguments its grammar accepts; the
//! line-tagged wrappers [`ParsedCommand`] and [`CompiledCommand`] add source
//! metadata and, after scheduling, the absolute tick.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One script verb with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum Command {
    /// `camera("ID").disable()` or `camera("ID").disable(N)`. A missing
    /// duration disables until re-enabled.
    #[serde(rename = "camera.disable")]
    CameraDisable {
        device_id: String,
        duration: Option<u64>,
    },
    /// `camera("ID").enable()`
    #[serde(rename = "camera.enable")]
    CameraEnable { device_id: String },
    /// `alarm().delay(N)`
    #[serde(rename = "alarm.delay")]
    AlarmDelay { ticks: u64 },
    /// `door("ID").open()`
    #[serde(rename = "door.open")]
    DoorOpen { device_id: String },
    /// `door("ID").close()`
    #[serde(rename = "door.close")]
    DoorClose { device_id: String },
    /// `turret("ID").retarget("TARGET")`
    #[serde(rename = "turret.retarget")]
    TurretRetarget { device_id: String, target_id: String },
    /// `device("ID").tag("TAG")`
    #[serde(rename = "device.tag")]
    DeviceTag { device_id: String, tag: String },
    /// `wait(N)`
    #[serde(rename = "wait")]
    Wait { ticks: u64 },
    /// `log("TEXT")`
    #[serde(rename = "log")]
    Log { message: String },
}

/// Payload-free discriminant of [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CameraDisable,
    CameraEnable,
    AlarmDelay,
    DoorOpen,
    DoorClose,
    TurretRetarget,
    DeviceTag,
    Wait,
    Log,
}

impl CommandKind {
    /// Stable dotted label, e.g. `"camera.disable"`.
    pub fn label(self) -> &'static str {
        match self {
            CommandKind::CameraDisable => "camera.disable",
            CommandKind::CameraEnable => "camera.enable",
            CommandKind::AlarmDelay => "alarm.delay",
            CommandKind::DoorOpen => "door.open",
            CommandKind::DoorClose => "door.close",
            CommandKind::TurretRetarget => "turret.retarget",
            CommandKind::DeviceTag => "device.tag",
            CommandKind::Wait => "wait",
            CommandKind::Log => "log",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CameraDisable { .. } => CommandKind::CameraDisable,
            Command::CameraEnable { .. } => CommandKind::CameraEnable,
            Command::AlarmDelay { .. } => CommandKind::AlarmDelay,
            Command::DoorOpen { .. } => CommandKind::DoorOpen,
            Command::DoorClose { .. } => CommandKind::DoorClose,
            Command::TurretRetarget { .. } => CommandKind::TurretRetarget,
            Command::DeviceTag { .. } => CommandKind::DeviceTag,
            Command::Wait { .. } => CommandKind::Wait,
            Command::Log { .. } => CommandKind::Log,
        }
    }

    /// The device the command acts on, if it names one.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Command::CameraDisable { device_id, .. }
            | Command::CameraEnable { device_id }
            | Command::DoorOpen { device_id }
            | Command::DoorClose { device_id }
            | Command::TurretRetarget { device_id, .. }
            | Command::DeviceTag { device_id, .. } => Some(device_id),
            Command::AlarmDelay { .. } | Command::Wait { .. } | Command::Log { .. } => None,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        match self {
            Command::TurretRetarget { target_id, .. } => Some(target_id),
            _ => None,
        }
    }

    /// Free-text argument: a tag or a log message.
    pub fn text_arg(&self) -> Option<&str> {
        match self {
            Command::DeviceTag { tag, .. } => Some(tag),
            Command::Log { message } => Some(message),
            _ => None,
        }
    }

    /// Numeric argument: a tick count or duration.
    pub fn value(&self) -> Option<u64> {
        match self {
            Command::CameraDisable { duration, .. } => *duration,
            Command::AlarmDelay { ticks } | Command::Wait { ticks } => Some(*ticks),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ParsedCommand / CompiledCommand
// ---------------------------------------------------------------------------

/// A command recognised on a single script line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// 1-based source line.
    pub line: u32,
    /// The trimmed source text of the line.
    pub raw: String,
    pub command: Command,
}

/// A validated command stamped with the absolute tick it executes on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledCommand {
    pub tick: u64,
    pub line: u32,
    pub raw: String,
    pub command: Command,
}

// ---------------------------------------------------------------------------
// CompileError / CompileResult
// ---------------------------------------------------------------------------

/// A syntax or semantic problem anchored to a script line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileError {
    pub line: u32,
    pub message: String,
}

impl CompileError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Output of the compiler stage. Exactly one of the two lists is non-empty
/// unless the script has no commands at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    pub commands: Vec<CompiledCommand>,
    pub errors: Vec<CompileError>,
}

impl CompileResult {
    pub fn failed(errors: Vec<CompileError>) -> Self {
        Self {
            commands: Vec::new(),
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
