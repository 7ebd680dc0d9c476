//! Discrete-time tick engine.
//!
//! The [`TickEngine`] steps `tick = 0, 1, 2, ...` until the run is decided.
//! Each tick runs these phases in a fixed order:
//!
//! 1. Scheduled script actions for this tick.
//! 2. Device timers (timed camera disables expire).
//! 3. Drone patrol movement.
//! 4. Camera detection, edge-triggered per camera.
//! 5. Alarm bus escalation and door lockdown.
//! 6. Turret targeting, locking and firing.
//! 7. Player movement along the precomputed path.
//! 8. `RUN_TIMEOUT` once `tick >= tick_limit`.
//! 9. Frame capture.
//! 10. Outcome decision.
//!
//! Phase order decides which events a phase can see from earlier ones in the
//! same tick, so it is part of the engine's observable behavior. Devices are
//! visited in level declaration order and all arithmetic is integer, which
//! together make a run a pure function of `(level, commands, config)`.
//!
//! # Example
//!
//! ```
//! use breach_core::prelude::*;
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
//! let result = simulate(&level, &[], &EngineConfig::default());
//! assert_eq!(result.outcome, RunOutcome::Success);
//! assert_eq!(result.final_tick, 2);
//! assert_eq!(result.frames.len(), 3);
//! ```

use std::collections::{BTreeMap, HashMap};

use breach_compiler::script::{Command, CompiledCommand};
use breach_core::device::{AlarmState, AlarmTrigger, DeviceKind};
use breach_core::geometry::Point;
use breach_core::level::{LevelDefinition, GLOBAL_TICK_LIMIT};
use breach_core::state::{RunOutcome, SimulationState};

use crate::event::{payload, EventCategory, EventLog, EventRecord, EventType, Payload, PayloadValue};
use crate::failure::summarize_failure;
use crate::replay::ReplayRecorder;
use crate::result::SimulationResult;

/// Target id used for the player in turret events.
pub const PLAYER_TARGET_ID: &str = "player";

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Run-wide engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Hard ceiling on the run length, applied on top of the level's own
    /// tick limit.
    pub tick_ceiling: u64,
    /// Store a BLAKE3 digest in every recorded frame.
    pub hash_frames: bool,
}

impl Default for EngineConfig {
    /// Defaults to the global 300-tick ceiling with frame hashing on.
    fn default() -> Self {
        Self {
            tick_ceiling: GLOBAL_TICK_LIMIT,
            hash_frames: true,
        }
    }
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// Collects the current tick's events and hands out run-wide ids.
#[derive(Debug)]
struct EventSink {
    tick: u64,
    next_id: u64,
    events: Vec<EventRecord>,
}

impl EventSink {
    fn new() -> Self {
        Self {
            tick: 0,
            next_id: 1,
            events: Vec::new(),
        }
    }

    fn emit(
        &mut self,
        event_type: EventType,
        category: EventCategory,
        payload: Payload,
        line: Option<u32>,
    ) {
        let record = EventRecord {
            id: self.next_id,
            tick: self.tick,
            event_type,
            category,
            line,
            payload,
        };
        tracing::trace!(id = record.id, tick = record.tick, event = %record.event_type, "event");
        self.next_id += 1;
        self.events.push(record);
    }

    /// Start a new tick and return the previous tick's events.
    fn take(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }
}

// ---------------------------------------------------------------------------
// TickEngine
// ---------------------------------------------------------------------------

/// A single run in progress.
///
/// Most callers want [`simulate`]. The engine is exposed so a caller can step
/// a run tick by tick and inspect [`state`](Self::state) in between.
#[derive(Debug)]
pub struct TickEngine<'a> {
    level: &'a LevelDefinition,
    state: SimulationState,
    tick_limit: u64,
    commands_by_tick: BTreeMap<u64, Vec<&'a CompiledCommand>>,
    /// Whether each camera saw the player on the previous tick.
    detecting: HashMap<String, bool>,
    sink: EventSink,
    executed_lines: Vec<u32>,
    log: EventLog,
    recorder: ReplayRecorder,
}

impl<'a> TickEngine<'a> {
    pub fn new(
        level: &'a LevelDefinition,
        commands: &'a [CompiledCommand],
        config: &EngineConfig,
    ) -> Self {
        let mut commands_by_tick: BTreeMap<u64, Vec<&CompiledCommand>> = BTreeMap::new();
        for command in commands {
            commands_by_tick.entry(command.tick).or_default().push(command);
        }
        Self {
            level,
            state: SimulationState::from_level(level),
            tick_limit: level.constraints.effective_tick_limit(config.tick_ceiling),
            commands_by_tick,
            detecting: HashMap::new(),
            sink: EventSink::new(),
            executed_lines: Vec::new(),
            log: EventLog::new(),
            recorder: ReplayRecorder::new(config.hash_frames),
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn tick_limit(&self) -> u64 {
        self.tick_limit
    }

    pub fn events(&self) -> &EventLog {
        &self.log
    }

    pub fn is_finished(&self) -> bool {
        self.state.outcome.is_terminal()
    }

    /// Run one full tick. Returns `true` once the outcome is decided; further
    /// calls are then no-ops.
    pub fn step(&mut self) -> bool {
        if self.is_finished() {
            return true;
        }

        self.sink.tick = self.state.tick;
        self.apply_script_actions();
        self.update_device_timers();
        self.update_drones();
        let detected = self.update_camera_detection();
        self.update_alarm_bus(detected);
        self.update_turrets();
        self.update_player();
        if self.state.tick >= self.tick_limit {
            self.sink.emit(
                EventType::RunTimeout,
                EventCategory::System,
                payload([("tickLimit", self.tick_limit.into())]),
                None,
            );
        }

        let events = self.sink.take();
        let lines = std::mem::take(&mut self.executed_lines);
        let frame = self.recorder.record(&self.state, events, lines);
        self.log.extend(frame.events.iter().cloned());

        if self.decide_outcome() {
            return true;
        }
        self.state.tick += 1;
        false
    }

    /// Step until the run is decided and assemble the result.
    pub fn run(mut self) -> SimulationResult {
        tracing::debug!(
            level = %self.level.id,
            tick_limit = self.tick_limit,
            commands = self.commands_by_tick.values().map(Vec::len).sum::<usize>(),
            "simulation started"
        );

        while !self.step() {}

        let outcome = self.state.outcome;
        let failure_summary =
            (outcome == RunOutcome::Failure).then(|| summarize_failure(&self.log));

        tracing::debug!(
            level = %self.level.id,
            outcome = ?outcome,
            final_tick = self.state.tick,
            events = self.log.len(),
            "simulation finished"
        );

        SimulationResult {
            frames: self.recorder.finish(),
            events: self.log,
            outcome,
            final_tick: self.state.tick,
            tick_limit: self.tick_limit,
            failure_summary,
        }
    }

    // -- Phase 1: script actions --------------------------------------------

    fn apply_script_actions(&mut self) {
        let Some(commands) = self.commands_by_tick.get(&self.state.tick) else {
            return;
        };
        for compiled in commands {
            self.executed_lines.push(compiled.line);
            apply_command(&mut self.state, &mut self.sink, compiled);
        }
    }

    // -- Phase 2: device timers ---------------------------------------------

    fn update_device_timers(&mut self) {
        let tick = self.state.tick;
        for device in self.state.devices.values_mut() {
            let DeviceKind::Camera(camera) = &mut device.kind else {
                continue;
            };
            if device.enabled {
                continue;
            }
            let Some(until) = camera.disabled_until_tick else {
                continue;
            };
            if tick < until {
                continue;
            }
            device.enabled = true;
            camera.disabled_until_tick = None;
            self.sink.emit(
                EventType::DeviceEnabled,
                EventCategory::System,
                payload([("deviceId", device.id.as_str().into())]),
                None,
            );
        }
    }

    // -- Phase 3: drones ----------------------------------------------------

    fn update_drones(&mut self) {
        for device in self.state.devices.values_mut() {
            let DeviceKind::Drone(drone) = &mut device.kind else {
                continue;
            };
            if !device.enabled || !drone.alive || drone.path.len() < 2 {
                continue;
            }
            drone.step_timer += 1;
            if drone.step_timer < drone.step_interval {
                continue;
            }
            drone.step_timer = 0;
            drone.path_index = (drone.path_index + 1) % drone.path.len();
            if let Some(&point) = drone.path.get(drone.path_index) {
                device.position = point;
            }
        }
    }

    // -- Phase 4: cameras ---------------------------------------------------

    /// Returns whether any camera sees the player this tick.
    fn update_camera_detection(&mut self) -> bool {
        let player = &self.state.player;
        let mut detected = false;

        for device in self.state.devices.values() {
            let DeviceKind::Camera(camera) = &device.kind else {
                continue;
            };
            let now = player.alive
                && device.enabled
                && device.position.manhattan(player.position) <= camera.range
                && camera.facing.cone_contains(device.position, player.position);
            let was = self.detecting.insert(device.id.clone(), now).unwrap_or(false);
            if !now {
                continue;
            }
            detected = true;
            if !was {
                self.sink.emit(
                    EventType::CameraDetectedPlayer,
                    EventCategory::Detection,
                    payload([("cameraId", device.id.as_str().into())]),
                    None,
                );
            }
        }
        detected
    }

    // -- Phase 5: alarm bus -------------------------------------------------

    fn update_alarm_bus(&mut self, detected: bool) {
        let tick = self.state.tick;
        let Some(alarm) = self.state.alarm_mut() else {
            return;
        };

        if detected && alarm.state == AlarmState::Green {
            alarm.state = AlarmState::Yellow;
            alarm.red_at_tick = Some(
                tick.saturating_add(alarm.base_escalation_ticks)
                    .saturating_add(alarm.manual_delay_buffer),
            );
            alarm.manual_delay_buffer = 0;
            self.sink.emit(
                EventType::AlarmStateChanged,
                EventCategory::Alarm,
                transition(AlarmState::Green, AlarmState::Yellow),
                None,
            );
        }

        let escalate = alarm.state == AlarmState::Yellow
            && alarm.red_at_tick.is_some_and(|red| tick >= red);
        if !escalate {
            return;
        }
        alarm.state = AlarmState::Red;
        alarm.red_at_tick = None;
        self.sink.emit(
            EventType::AlarmStateChanged,
            EventCategory::Alarm,
            transition(AlarmState::Yellow, AlarmState::Red),
            None,
        );
        self.apply_lockdown();
    }

    fn apply_lockdown(&mut self) {
        for device in self.state.devices.values_mut() {
            let DeviceKind::Door(door) = &mut device.kind else {
                continue;
            };
            if !door.closes_on_alarm_red || !door.is_open {
                continue;
            }
            door.is_open = false;
            self.sink.emit(
                EventType::DoorClosed,
                EventCategory::Alarm,
                payload([
                    ("doorId", device.id.as_str().into()),
                    ("reason", "alarm_lockdown".into()),
                ]),
                None,
            );
        }
    }

    // -- Phase 6: turrets ---------------------------------------------------

    fn update_turrets(&mut self) {
        let alarm_red = self.state.alarm_state() == AlarmState::Red;

        for idx in 0..self.state.devices.len() {
            let Some((_, device)) = self.state.devices.get_index(idx) else {
                continue;
            };
            let DeviceKind::Turret(turret) = &device.kind else {
                continue;
            };
            if !device.enabled {
                continue;
            }
            let active = turret.alarm_trigger == AlarmTrigger::Always || alarm_red;
            let target = if active {
                resolve_target(
                    &self.state,
                    device.position,
                    turret.range,
                    turret.desired_target_id.as_deref(),
                )
            } else {
                None
            };

            let Some((turret_id, device)) = self.state.devices.get_index_mut(idx) else {
                continue;
            };
            let DeviceKind::Turret(turret) = &mut device.kind else {
                continue;
            };
            let turret_id = turret_id.clone();

            let Some(target) = target else {
                turret.current_target_id = None;
                turret.lock_ticks = 0;
                continue;
            };

            if turret.current_target_id.as_deref() == Some(target.id()) {
                turret.lock_ticks += 1;
            } else {
                turret.current_target_id = Some(target.id().to_owned());
                turret.lock_ticks = 1;
                self.sink.emit(
                    EventType::TurretTargetLock,
                    EventCategory::Combat,
                    turret_pair(&turret_id, target.id()),
                    None,
                );
            }

            if turret.lock_ticks < turret.lock_delay {
                continue;
            }
            turret.lock_ticks = 0;
            self.sink.emit(
                EventType::TurretFired,
                EventCategory::Combat,
                turret_pair(&turret_id, target.id()),
                None,
            );
            self.hit(&turret_id, &target);
        }
    }

    fn hit(&mut self, turret_id: &str, target: &Target) {
        match target {
            Target::Player => {
                if !self.state.player.alive {
                    return;
                }
                self.state.player.alive = false;
                self.sink.emit(
                    EventType::PlayerKilled,
                    EventCategory::Combat,
                    payload([("turretId", turret_id.into())]),
                    None,
                );
            }
            Target::Drone(drone_id) => {
                let Some(device) = self.state.devices.get_mut(drone_id) else {
                    return;
                };
                let DeviceKind::Drone(drone) = &mut device.kind else {
                    return;
                };
                if !drone.alive {
                    return;
                }
                drone.alive = false;
                device.enabled = false;
                self.sink.emit(
                    EventType::DroneDestroyed,
                    EventCategory::Combat,
                    payload([
                        ("droneId", drone_id.as_str().into()),
                        ("turretId", turret_id.into()),
                    ]),
                    None,
                );
            }
        }
    }

    // -- Phase 7: player ----------------------------------------------------

    fn update_player(&mut self) {
        let player = &self.state.player;
        if !player.alive || player.reached_exit {
            return;
        }

        let Some(&next) = self.level.player_path.get(player.path_index + 1) else {
            if player.position == self.level.exit {
                self.reach_exit();
            }
            return;
        };

        if let Some(door) = self.state.closed_door_at(next) {
            let door_id = door.id.clone();
            if player.blocked_by_door_id.as_deref() != Some(door_id.as_str()) {
                self.sink.emit(
                    EventType::PlayerBlockedByDoor,
                    EventCategory::Movement,
                    payload([("doorId", door_id.as_str().into())]),
                    None,
                );
            }
            self.state.player.blocked_by_door_id = Some(door_id);
            return;
        }

        let player = &mut self.state.player;
        player.blocked_by_door_id = None;
        player.position = next;
        player.path_index += 1;
        if player.position == self.level.exit {
            self.reach_exit();
        }
    }

    fn reach_exit(&mut self) {
        self.state.player.reached_exit = true;
        self.sink.emit(
            EventType::PlayerReachedExit,
            EventCategory::Movement,
            payload([("exit", "goal".into())]),
            None,
        );
    }

    // -- Phase 10: outcome --------------------------------------------------

    fn decide_outcome(&mut self) -> bool {
        let outcome = if self.state.player.reached_exit {
            RunOutcome::Success
        } else if !self.state.player.alive || self.state.tick >= self.tick_limit {
            RunOutcome::Failure
        } else {
            return false;
        };
        self.state.outcome = outcome;
        true
    }
}

// ---------------------------------------------------------------------------
// Script effects
// ---------------------------------------------------------------------------

/// Apply one scheduled command. References that do not resolve to a device
/// of the right type are skipped after `SCRIPT_LINE_EXECUTED` is emitted.
fn apply_command(state: &mut SimulationState, sink: &mut EventSink, compiled: &CompiledCommand) {
    let line = Some(compiled.line);
    let command = &compiled.command;
    sink.emit(
        EventType::ScriptLineExecuted,
        EventCategory::Script,
        payload([
            ("kind", command.kind().label().into()),
            ("line", compiled.line.into()),
            ("deviceId", command.device_id().into()),
        ]),
        line,
    );

    let tick = state.tick;
    let emit = |sink: &mut EventSink, event_type, payload| {
        sink.emit(event_type, EventCategory::Script, payload, line);
    };

    match command {
        Command::CameraDisable {
            device_id,
            duration,
        } => {
            let Some(device) = state.devices.get_mut(device_id) else {
                return skipped(compiled);
            };
            let DeviceKind::Camera(camera) = &mut device.kind else {
                return skipped(compiled);
            };
            device.enabled = false;
            camera.disabled_until_tick = duration.map(|n| tick.saturating_add(n));
            emit(
                sink,
                EventType::DeviceDisabled,
                payload([
                    ("deviceId", device_id.as_str().into()),
                    ("duration", PayloadValue::from(*duration)),
                ]),
            );
        }
        Command::CameraEnable { device_id } => {
            let Some(device) = state.devices.get_mut(device_id) else {
                return skipped(compiled);
            };
            let DeviceKind::Camera(camera) = &mut device.kind else {
                return skipped(compiled);
            };
            device.enabled = true;
            camera.disabled_until_tick = None;
            emit(
                sink,
                EventType::DeviceEnabled,
                payload([("deviceId", device_id.as_str().into())]),
            );
        }
        Command::AlarmDelay { ticks } => {
            let Some(alarm) = state.alarm_mut() else {
                return skipped(compiled);
            };
            match (alarm.state, alarm.red_at_tick.as_mut()) {
                (AlarmState::Yellow, Some(red_at)) => *red_at = red_at.saturating_add(*ticks),
                _ => alarm.manual_delay_buffer = alarm.manual_delay_buffer.saturating_add(*ticks),
            }
            emit(
                sink,
                EventType::AlarmDelayApplied,
                payload([("amount", (*ticks).into())]),
            );
        }
        Command::DoorOpen { device_id } | Command::DoorClose { device_id } => {
            let Some(door) = state.devices.get_mut(device_id).and_then(|d| d.as_door_mut()) else {
                return skipped(compiled);
            };
            let open = matches!(command, Command::DoorOpen { .. });
            door.is_open = open;
            let event_type = if open {
                EventType::DoorOpened
            } else {
                EventType::DoorClosed
            };
            emit(
                sink,
                event_type,
                payload([("doorId", device_id.as_str().into())]),
            );
        }
        Command::TurretRetarget {
            device_id,
            target_id,
        } => {
            let Some(turret) = state
                .devices
                .get_mut(device_id)
                .and_then(|d| d.as_turret_mut())
            else {
                return skipped(compiled);
            };
            turret.desired_target_id = Some(target_id.clone());
            turret.current_target_id = None;
            turret.lock_ticks = 0;
            emit(sink, EventType::TurretRetargeted, turret_pair(device_id, target_id));
        }
        Command::DeviceTag { device_id, tag } => {
            let Some(device) = state.devices.get_mut(device_id) else {
                return skipped(compiled);
            };
            device.tag = Some(tag.clone());
            emit(
                sink,
                EventType::DeviceTagged,
                payload([
                    ("deviceId", device_id.as_str().into()),
                    ("tag", tag.as_str().into()),
                ]),
            );
        }
        Command::Log { message } => {
            emit(
                sink,
                EventType::Log,
                payload([("message", message.as_str().into())]),
            );
        }
        Command::Wait { .. } => {}
    }
}

fn skipped(compiled: &CompiledCommand) {
    tracing::debug!(
        line = compiled.line,
        kind = %compiled.command.kind(),
        device = compiled.command.device_id().unwrap_or("-"),
        "script effect skipped: device missing or of the wrong type"
    );
}

// ---------------------------------------------------------------------------
// Targeting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Player,
    Drone(String),
}

impl Target {
    fn id(&self) -> &str {
        match self {
            Target::Player => PLAYER_TARGET_ID,
            Target::Drone(id) => id,
        }
    }
}

/// Prefer the scripted drone if it is alive, enabled and in range; otherwise
/// the living player if in range.
fn resolve_target(
    state: &SimulationState,
    turret_at: Point,
    range: u32,
    desired: Option<&str>,
) -> Option<Target> {
    let preferred = desired
        .and_then(|id| state.devices.get(id))
        .filter(|d| d.enabled && d.as_drone().is_some_and(|drone| drone.alive))
        .filter(|d| turret_at.manhattan(d.position) <= range);
    if let Some(drone) = preferred {
        return Some(Target::Drone(drone.id.clone()));
    }

    let player = &state.player;
    (player.alive && turret_at.manhattan(player.position) <= range).then_some(Target::Player)
}

fn turret_pair(turret_id: &str, target_id: &str) -> Payload {
    payload([("turretId", turret_id.into()), ("targetId", target_id.into())])
}

fn transition(from: AlarmState, to: AlarmState) -> Payload {
    payload([("from", from.as_str().into()), ("to", to.as_str().into())])
}

// ---------------------------------------------------------------------------
// simulate()
// ---------------------------------------------------------------------------

/// Run `commands` on a fresh copy of `level` until success, death or
/// timeout.
///
/// Total over validated input: it always terminates within
/// `min(level.tick_limit, config.tick_ceiling) + 1` frames and always
/// returns a well-formed result.
pub fn simulate(
    level: &LevelDefinition,
    commands: &[CompiledCommand],
    config: &EngineConfig,
) -> SimulationResult {
    TickEngine::new(level, commands, config).run()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use breach_core::prelude::*;

    fn corridor(devices: Vec<Device>, tick_limit: u64) -> LevelDefinition {
        LevelDefinition {
            id: "unit".to_owned(),
            name: String::new(),
            brief: String::new(),
            map: LevelMap {
                width: 10,
                height: 6,
                walls: Vec::new(),
            },
            entry: Point::new(0, 2),
            exit: Point::new(6, 2),
            player_path: (0..=6).map(|x| Point::new(x, 2)).collect(),
            network_scope: devices.iter().map(|d| d.id.clone()).collect(),
            devices,
            constraints: LevelConstraints {
                max_lines: 10,
                max_commands: 10,
                max_delay_ticks: 50,
                tick_limit,
            },
            suggested_script: None,
        }
    }

    fn at(tick: u64, line: u32, command: Command) -> CompiledCommand {
        CompiledCommand {
            tick,
            line,
            raw: String::new(),
            command,
        }
    }

    fn types_at(result: &SimulationResult, tick: u64) -> Vec<EventType> {
        result.events.at_tick(tick).map(|e| e.event_type).collect()
    }

    #[test]
    fn open_corridor_walks_to_exit() {
        let level = corridor(Vec::new(), 20);
        let result = simulate(&level, &[], &EngineConfig::default());

        assert_eq!(result.outcome, RunOutcome::Success);
        assert_eq!(result.final_tick, 5);
        assert_eq!(types_at(&result, 5), vec![EventType::PlayerReachedExit]);
        assert!(result.failure_summary.is_none());
    }

    #[test]
    fn event_ids_start_at_one_and_increase() {
        let level = corridor(vec![Device::door("D1", Point::new(3, 2), false)], 8);
        let commands = [at(
            0,
            1,
            Command::Log {
                message: "hi".to_owned(),
            },
        )];
        let result = simulate(&level, &commands, &EngineConfig::default());
        let ids: Vec<u64> = result.events.iter().map(|e| e.id).collect();
        assert_eq!(ids.first(), Some(&1));
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn script_line_event_precedes_effect() {
        let level = corridor(vec![Device::door("D1", Point::new(3, 2), false)], 20);
        let commands = [at(0, 3, Command::DoorOpen { device_id: "D1".to_owned() })];
        let result = simulate(&level, &commands, &EngineConfig::default());

        let first: Vec<&EventRecord> = result.events.at_tick(0).collect();
        assert_eq!(first[0].event_type, EventType::ScriptLineExecuted);
        assert_eq!(first[0].text("kind"), Some("door.open"));
        assert_eq!(first[0].get("line"), Some(&PayloadValue::Int(3)));
        assert_eq!(first[1].event_type, EventType::DoorOpened);
        assert_eq!(first[1].line, Some(3));
        assert_eq!(result.frames[0].executed_lines, vec![3]);
        assert_eq!(result.outcome, RunOutcome::Success);
    }

    #[test]
    fn blocked_event_fires_once_per_door() {
        let level = corridor(vec![Device::door("D1", Point::new(3, 2), false)], 10);
        let result = simulate(&level, &[], &EngineConfig::default());

        let blocks: Vec<u64> = result
            .events
            .of_type(EventType::PlayerBlockedByDoor)
            .map(|e| e.tick)
            .collect();
        assert_eq!(blocks, vec![2]);
        assert_eq!(result.outcome, RunOutcome::Failure);
        assert_eq!(result.final_tick, 10);
    }

    #[test]
    fn timed_disable_expires_through_system_event() {
        let level = corridor(vec![Device::camera("C1", Point::new(9, 0), 1, Facing::Left)], 12);
        let commands = [at(
            1,
            1,
            Command::CameraDisable {
                device_id: "C1".to_owned(),
                duration: Some(4),
            },
        )];
        let result = simulate(&level, &commands, &EngineConfig::default());

        let enabled: Vec<&EventRecord> = result.events.of_type(EventType::DeviceEnabled).collect();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].tick, 5);
        assert_eq!(enabled[0].category, EventCategory::System);
        assert_eq!(enabled[0].line, None);
    }

    #[test]
    fn indefinite_disable_never_expires() {
        let level = corridor(vec![Device::camera("C1", Point::new(9, 0), 1, Facing::Left)], 12);
        let commands = [at(
            0,
            1,
            Command::CameraDisable {
                device_id: "C1".to_owned(),
                duration: None,
            },
        )];
        let result = simulate(&level, &commands, &EngineConfig::default());

        assert_eq!(result.events.of_type(EventType::DeviceEnabled).count(), 0);
        let disabled = result.events.find_last(EventType::DeviceDisabled).unwrap();
        assert_eq!(disabled.get("duration"), Some(&PayloadValue::Null));
        let last = result.frames.last().unwrap();
        assert!(!last.snapshot.devices["C1"].enabled);
    }

    #[test]
    fn drone_patrols_cyclically() {
        let path = vec![Point::new(8, 0), Point::new(9, 0), Point::new(9, 1)];
        let mut level = corridor(vec![Device::drone("DR1", path, 2)], 7);
        level.player_path.truncate(1);
        let result = simulate(&level, &[], &EngineConfig::default());

        let positions: Vec<Point> = result
            .frames
            .iter()
            .map(|f| f.snapshot.devices["DR1"].position)
            .collect();
        assert_eq!(
            positions,
            vec![
                Point::new(8, 0),
                Point::new(9, 0),
                Point::new(9, 0),
                Point::new(9, 1),
                Point::new(9, 1),
                Point::new(8, 0),
                Point::new(8, 0),
                Point::new(9, 0),
            ]
        );
    }

    #[test]
    fn alarm_delay_while_green_is_buffered() {
        let level = corridor(
            vec![
                Device::camera("C1", Point::new(4, 0), 2, Facing::Down),
                Device::alarm("A1", Point::new(9, 5), 3),
            ],
            30,
        );
        let commands = [at(0, 1, Command::AlarmDelay { ticks: 5 })];
        let result = simulate(&level, &commands, &EngineConfig::default());

        // Detection runs before movement, so (4,2) is first seen on tick 4.
        let changes: Vec<(u64, Option<&str>)> = result
            .events
            .of_type(EventType::AlarmStateChanged)
            .map(|e| (e.tick, e.text("to")))
            .collect();
        assert_eq!(changes, vec![(4, Some("YELLOW"))]);
        let alarm = result.frames[4].snapshot.devices["A1"].as_alarm().cloned().unwrap();
        assert_eq!(alarm.red_at_tick, Some(4 + 3 + 5));
        assert_eq!(alarm.manual_delay_buffer, 0);
    }

    #[test]
    fn lockdown_closes_flagged_doors_on_red() {
        let level = corridor(
            vec![
                Device::camera("C1", Point::new(0, 0), 3, Facing::Down),
                Device::alarm("A1", Point::new(9, 5), 1),
                Device::door("D1", Point::new(5, 2), true).with_lockdown(),
                Device::door("D2", Point::new(9, 4), true),
            ],
            30,
        );
        let result = simulate(&level, &[], &EngineConfig::default());

        assert_eq!(
            types_at(&result, 1),
            vec![
                EventType::AlarmStateChanged,
                EventType::DoorClosed,
            ]
        );
        let closed = result.events.find_last(EventType::DoorClosed).unwrap();
        assert_eq!(closed.text("doorId"), Some("D1"));
        assert_eq!(closed.text("reason"), Some("alarm_lockdown"));
        assert_eq!(closed.category, EventCategory::Alarm);
        assert_eq!(result.outcome, RunOutcome::Failure);
        let summary = result.failure_summary.unwrap();
        assert_eq!(summary.primary_cause, "Player was stopped by door D1");
        assert_eq!(summary.cause_chain[0], "Alarm escalated to RED");
    }

    #[test]
    fn red_gated_turret_holds_fire_until_red() {
        let level = corridor(
            vec![Device::turret("T1", Point::new(3, 3), 3, 1, AlarmTrigger::Red)],
            20,
        );
        let result = simulate(&level, &[], &EngineConfig::default());
        assert_eq!(result.outcome, RunOutcome::Success);
        assert_eq!(result.events.of_type(EventType::TurretTargetLock).count(), 0);
    }

    #[test]
    fn retargeted_turret_destroys_drone_instead() {
        let level = corridor(
            vec![
                Device::turret("T1", Point::new(3, 4), 6, 2, AlarmTrigger::Always),
                Device::drone("DR1", vec![Point::new(4, 5), Point::new(5, 5)], 50),
            ],
            20,
        );
        let commands = [at(
            0,
            1,
            Command::TurretRetarget {
                device_id: "T1".to_owned(),
                target_id: "DR1".to_owned(),
            },
        )];
        let result = simulate(&level, &commands, &EngineConfig::default());

        let destroyed = result.events.find_last(EventType::DroneDestroyed).unwrap();
        assert_eq!(destroyed.tick, 1);
        assert_eq!(destroyed.text("droneId"), Some("DR1"));
        assert_eq!(destroyed.text("turretId"), Some("T1"));
        assert_eq!(result.outcome, RunOutcome::Failure);
        let killed = result.events.find_last(EventType::PlayerKilled).unwrap();
        assert!(killed.tick > 1);
    }

    #[test]
    fn turret_resets_lock_after_firing() {
        let level = corridor(
            vec![
                Device::turret("T1", Point::new(9, 0), 30, 2, AlarmTrigger::Always),
                Device::drone("DR1", vec![Point::new(9, 4), Point::new(9, 5)], 100),
                Device::drone("DR2", vec![Point::new(8, 4), Point::new(8, 5)], 100),
            ],
            20,
        );
        let retarget = |tick, line, id: &str| {
            at(
                tick,
                line,
                Command::TurretRetarget {
                    device_id: "T1".to_owned(),
                    target_id: id.to_owned(),
                },
            )
        };
        let commands = [retarget(0, 1, "DR1"), retarget(2, 2, "DR2")];
        let result = simulate(&level, &commands, &EngineConfig::default());

        let fired: Vec<(u64, Option<&str>)> = result
            .events
            .of_type(EventType::TurretFired)
            .map(|e| (e.tick, e.text("targetId")))
            .collect();
        assert_eq!(fired[0], (1, Some("DR1")));
        assert_eq!(fired[1], (3, Some("DR2")));
    }

    #[test]
    fn unknown_device_effect_is_a_no_op() {
        let level = corridor(Vec::new(), 20);
        let commands = [at(
            0,
            1,
            Command::DoorOpen {
                device_id: "GHOST".to_owned(),
            },
        )];
        let result = simulate(&level, &commands, &EngineConfig::default());

        assert_eq!(types_at(&result, 0), vec![EventType::ScriptLineExecuted]);
        assert_eq!(result.outcome, RunOutcome::Success);
    }

    #[test]
    fn stepping_manually_matches_simulate() {
        let level = corridor(vec![Device::door("D1", Point::new(4, 2), false)], 9);
        let commands = [at(4, 1, Command::DoorOpen { device_id: "D1".to_owned() })];
        let config = EngineConfig::default();

        let mut engine = TickEngine::new(&level, &commands, &config);
        let mut steps = 0;
        while !engine.step() {
            steps += 1;
        }
        assert!(engine.is_finished());
        assert!(engine.step());
        let stepped = engine.run();

        assert_eq!(steps, stepped.final_tick);
        assert_eq!(stepped, simulate(&level, &commands, &config));
    }

    #[test]
    fn zero_tick_limit_times_out_on_first_frame() {
        let level = corridor(Vec::new(), 0);
        let result = simulate(&level, &[], &EngineConfig::default());
        assert_eq!(result.frames.len(), 1);
        assert_eq!(result.final_tick, 0);
        assert_eq!(result.outcome, RunOutcome::Failure);
        assert_eq!(types_at(&result, 0), vec![EventType::RunTimeout]);
    }
}
