//! Semantic checks against level topology and budget.
//!
//! All checks run and accumulate; nothing short-circuits except that a device
//! reference which is unknown or out of scope skips the remaining checks for
//! that line's device.

use breach_core::device::DeviceType;
use breach_core::level::{EffectiveConstraints, LevelDefinition};

use crate::script::{Command, CompileError, ParsedCommand};

/// Validate parsed commands. An empty result means the script may be
/// scheduled.
pub fn validate(
    level: &LevelDefinition,
    constraints: &EffectiveConstraints,
    commands: &[ParsedCommand],
) -> Vec<CompileError> {
    let mut errors = Vec::new();
    let count = commands.len();

    if count > constraints.max_lines as usize {
        errors.push(CompileError::new(
            1,
            format!(
                "Script uses {count} lines, max is {}",
                constraints.max_lines
            ),
        ));
    }
    if count > constraints.max_commands as usize {
        errors.push(CompileError::new(
            1,
            format!(
                "Script uses {count} commands, max is {}",
                constraints.max_commands
            ),
        ));
    }

    let alarm_visible = level.alarm_in_scope();

    for parsed in commands {
        let line = parsed.line;
        match &parsed.command {
            Command::Wait { ticks } => {
                check_delay("wait", Some(*ticks), constraints, line, &mut errors);
            }
            Command::AlarmDelay { ticks } => {
                if !alarm_visible {
                    errors.push(CompileError::new(
                        line,
                        "Alarm bus is not visible in this terminal scope",
                    ));
                }
                check_delay("delay", Some(*ticks), constraints, line, &mut errors);
            }
            Command::CameraDisable { duration, .. } => {
                check_delay("disable", *duration, constraints, line, &mut errors);
            }
            Command::CameraEnable { .. }
            | Command::DoorOpen { .. }
            | Command::DoorClose { .. }
            | Command::TurretRetarget { .. }
            | Command::DeviceTag { .. }
            | Command::Log { .. } => {}
        }

        if let Some(device_id) = parsed.command.device_id() {
            check_device_reference(level, &parsed.command, device_id, line, &mut errors);
        }
    }

    tracing::debug!(
        level = %level.id,
        commands = count,
        errors = errors.len(),
        "validated script"
    );
    errors
}

/// `n` must be positive and within the level's delay budget. `None` is only
/// passed for an indefinite camera disable, which is always legal.
fn check_delay(
    verb: &str,
    value: Option<u64>,
    constraints: &EffectiveConstraints,
    line: u32,
    errors: &mut Vec<CompileError>,
) {
    let Some(n) = value else {
        return;
    };
    if n == 0 {
        let qualifier = if verb == "disable" {
            " when provided"
        } else {
            ""
        };
        errors.push(CompileError::new(
            line,
            format!("{verb}(n) must be greater than 0{qualifier}"),
        ));
    }
    if n > constraints.max_delay_ticks {
        errors.push(CompileError::new(
            line,
            format!(
                "{verb}({n}) exceeds level max ({})",
                constraints.max_delay_ticks
            ),
        ));
    }
}

fn check_device_reference(
    level: &LevelDefinition,
    command: &Command,
    device_id: &str,
    line: u32,
    errors: &mut Vec<CompileError>,
) {
    let Some(device) = level.device(device_id) else {
        errors.push(CompileError::new(
            line,
            format!("Unknown device \"{device_id}\""),
        ));
        return;
    };

    if !level.in_scope(device_id) {
        errors.push(CompileError::new(
            line,
            format!("Device \"{device_id}\" is not in terminal network scope"),
        ));
        return;
    }

    let required = match command {
        Command::CameraDisable { .. } | Command::CameraEnable { .. } => Some(DeviceType::Camera),
        Command::DoorOpen { .. } | Command::DoorClose { .. } => Some(DeviceType::Door),
        Command::TurretRetarget { .. } => Some(DeviceType::Turret),
        Command::DeviceTag { .. }
        | Command::AlarmDelay { .. }
        | Command::Wait { .. }
        | Command::Log { .. } => None,
    };
    if let Some(required) = required {
        if device.device_type() != required {
            errors.push(CompileError::new(
                line,
                format!("Device \"{device_id}\" is not a {required}"),
            ));
        }
    }

    if let Command::TurretRetarget { target_id, .. } = command {
        match level.device(target_id) {
            None => errors.push(CompileError::new(
                line,
                format!("retarget target \"{target_id}\" does not exist"),
            )),
            Some(target) if target.device_type() != DeviceType::Drone => {
                errors.push(CompileError::new(
                    line,
                    format!("retarget target \"{target_id}\" is not a valid target"),
                ));
            }
            Some(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;
    use breach_core::prelude::*;

    fn level() -> LevelDefinition {
        LevelDefinition {
            id: "v".to_owned(),
            name: String::new(),
            brief: String::new(),
            map: LevelMap {
                width: 12,
                height: 8,
                walls: Vec::new(),
            },
            entry: Point::new(1, 4),
            exit: Point::new(10, 4),
            player_path: (1..=10).map(|x| Point::new(x, 4)).collect(),
            devices: vec![
                Device::camera("C1", Point::new(4, 1), 5, Facing::Down),
                Device::door("D1", Point::new(6, 4), false),
                Device::alarm("A1", Point::new(0, 0), 8),
                Device::turret("T1", Point::new(8, 2), 4, 2, AlarmTrigger::Red),
                Device::drone("DR1", vec![Point::new(2, 2), Point::new(3, 2)], 1),
                Device::camera("C9", Point::new(11, 0), 3, Facing::Left),
            ],
            network_scope: ["C1", "D1", "A1", "T1", "DR1"]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            constraints: LevelConstraints {
                max_lines: 4,
                max_commands: 4,
                max_delay_ticks: 20,
                tick_limit: 120,
            },
            suggested_script: None,
        }
    }

    fn check(level: &LevelDefinition, source: &str) -> Vec<CompileError> {
        let parsed = parse_script(source);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        validate(level, &level.constraints.into(), &parsed.commands)
    }

    #[test]
    fn clean_script_has_no_errors() {
        let errors = check(
            &level(),
            "camera(\"C1\").disable(20)\ndoor(\"D1\").open()\nturret(\"T1\").retarget(\"DR1\")",
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn budget_overrun_reports_both_limits() {
        let errors = check(&level(), "wait(1)\nwait(1)\nwait(1)\nwait(1)\nwait(1)");
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.line == 1));
        assert_eq!(errors[0].message, "Script uses 5 lines, max is 4");
        assert_eq!(errors[1].message, "Script uses 5 commands, max is 4");
    }

    #[test]
    fn bonus_lifts_budget() {
        let level = level();
        let parsed = parse_script("wait(1)\nwait(1)\nwait(1)\nwait(1)\nwait(25)");
        let constraints = level.constraints.with_bonus(&ConstraintBonus {
            max_lines: 1,
            max_commands: 1,
            max_delay_ticks: 10,
        });
        assert!(validate(&level, &constraints, &parsed.commands).is_empty());
    }

    #[test]
    fn zero_and_oversized_delays_are_rejected() {
        let errors = check(&level(), "wait(0)\nalarm().delay(21)\ncamera(\"C1\").disable(0)");
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "wait(n) must be greater than 0",
                "delay(21) exceeds level max (20)",
                "disable(n) must be greater than 0 when provided",
            ]
        );
        assert_eq!(errors.iter().map(|e| e.line).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn indefinite_disable_is_legal() {
        assert!(check(&level(), "camera(\"C1\").disable()").is_empty());
    }

    #[test]
    fn alarm_delay_needs_alarm_in_scope() {
        let mut level = level();
        level.network_scope.retain(|id| id != "A1");
        let errors = check(&level, "alarm().delay(5)");
        assert_eq!(
            errors,
            vec![CompileError::new(
                1,
                "Alarm bus is not visible in this terminal scope"
            )]
        );
    }

    #[test]
    fn unknown_device_is_reported() {
        let errors = check(&level(), "door(\"NOPE\").open()");
        assert_eq!(errors, vec![CompileError::new(1, "Unknown device \"NOPE\"")]);
    }

    #[test]
    fn out_of_scope_device_is_named() {
        let errors = check(&level(), "camera(\"C9\").disable(3)");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("C9"));
        assert!(errors[0].message.contains("not in terminal network scope"));
    }

    #[test]
    fn verb_must_match_device_type() {
        let errors = check(&level(), "door(\"C1\").open()\ncamera(\"D1\").enable()\nturret(\"C1\").retarget(\"DR1\")");
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Device \"C1\" is not a door",
                "Device \"D1\" is not a camera",
                "Device \"C1\" is not a turret",
            ]
        );
    }

    #[test]
    fn retarget_only_accepts_drones() {
        let errors = check(
            &level(),
            "turret(\"T1\").retarget(\"player\")\nturret(\"T1\").retarget(\"C1\")",
        );
        assert_eq!(
            errors,
            vec![
                CompileError::new(1, "retarget target \"player\" does not exist"),
                CompileError::new(2, "retarget target \"C1\" is not a valid target"),
            ]
        );
    }

    #[test]
    fn tag_accepts_any_scoped_device() {
        assert!(check(&level(), "device(\"A1\").tag(\"bus\")\ndevice(\"DR1\").tag(\"x\")").is_empty());
        let errors = check(&level(), "device(\"C9\").tag(\"x\")");
        assert_eq!(errors.len(), 1);
    }
}
