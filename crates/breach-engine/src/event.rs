//! Typed simulation events and the append-only event log.
//!
//! Every observable state change the engine makes is announced as an
//! [`EventRecord`]. Ids start at 1 and increase by one per event across the
//! whole run, so id order is emission order. Within a tick, events appear in
//! phase order and, inside a phase, in device declaration order.
//!
//! The [`EventLog`] is the single source the failure analyzer reads from. Its
//! reverse-scan helper [`EventLog::find_last_at_or_before`] answers "most
//! recent event of type X at or before tick T".

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EventType / EventCategory
// ---------------------------------------------------------------------------

/// Closed set of things that can happen during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ScriptLineExecuted,
    DeviceDisabled,
    DeviceEnabled,
    AlarmDelayApplied,
    DoorOpened,
    DoorClosed,
    TurretRetargeted,
    DeviceTagged,
    Log,
    CameraDetectedPlayer,
    AlarmStateChanged,
    TurretTargetLock,
    TurretFired,
    PlayerKilled,
    DroneDestroyed,
    PlayerBlockedByDoor,
    PlayerReachedExit,
    RunTimeout,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::ScriptLineExecuted => "SCRIPT_LINE_EXECUTED",
            EventType::DeviceDisabled => "DEVICE_DISABLED",
            EventType::DeviceEnabled => "DEVICE_ENABLED",
            EventType::AlarmDelayApplied => "ALARM_DELAY_APPLIED",
            EventType::DoorOpened => "DOOR_OPENED",
            EventType::DoorClosed => "DOOR_CLOSED",
            EventType::TurretRetargeted => "TURRET_RETARGETED",
            EventType::DeviceTagged => "DEVICE_TAGGED",
            EventType::Log => "LOG",
            EventType::CameraDetectedPlayer => "CAMERA_DETECTED_PLAYER",
            EventType::AlarmStateChanged => "ALARM_STATE_CHANGED",
            EventType::TurretTargetLock => "TURRET_TARGET_LOCK",
            EventType::TurretFired => "TURRET_FIRED",
            EventType::PlayerKilled => "PLAYER_KILLED",
            EventType::DroneDestroyed => "DRONE_DESTROYED",
            EventType::PlayerBlockedByDoor => "PLAYER_BLOCKED_BY_DOOR",
            EventType::PlayerReachedExit => "PLAYER_REACHED_EXIT",
            EventType::RunTimeout => "RUN_TIMEOUT",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping used by presentation filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Script,
    Detection,
    Alarm,
    Combat,
    Movement,
    System,
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// A flat payload value. Payloads never nest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(u64),
    Text(String),
}

impl PayloadValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PayloadValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            PayloadValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValue::Null => f.write_str("null"),
            PayloadValue::Bool(b) => write!(f, "{b}"),
            PayloadValue::Int(n) => write!(f, "{n}"),
            PayloadValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::Text(s.to_owned())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::Text(s)
    }
}

impl From<u64> for PayloadValue {
    fn from(n: u64) -> Self {
        PayloadValue::Int(n)
    }
}

impl From<u32> for PayloadValue {
    fn from(n: u32) -> Self {
        PayloadValue::Int(u64::from(n))
    }
}

impl From<bool> for PayloadValue {
    fn from(b: bool) -> Self {
        PayloadValue::Bool(b)
    }
}

impl<T: Into<PayloadValue>> From<Option<T>> for PayloadValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PayloadValue::Null, Into::into)
    }
}

/// Key-ordered event payload.
pub type Payload = BTreeMap<String, PayloadValue>;

/// Build a [`Payload`] from `(key, value)` pairs.
pub fn payload<const N: usize>(pairs: [(&str, PayloadValue); N]) -> Payload {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
}

// ---------------------------------------------------------------------------
// EventRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: u64,
    pub tick: u64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub category: EventCategory,
    /// Script line that caused the event, for script-driven events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub payload: Payload,
}

impl EventRecord {
    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.payload.get(key)
    }

    /// A text payload field, or `None` if missing or not text.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PayloadValue::as_text)
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[t={}] {}", self.tick, self.event_type)?;
        for (key, value) in &self.payload {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Ordered, append-only record of every event in a run.
///
/// Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one tick's events. Events must arrive in id order.
    pub fn extend(&mut self, events: impl IntoIterator<Item = EventRecord>) {
        for event in events {
            debug_assert!(
                self.events.last().map_or(true, |last| last.id < event.id),
                "event ids must increase"
            );
            self.events.push(event);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn as_slice(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &EventRecord> + '_ {
        self.events.iter()
    }

    pub fn of_type(&self, event_type: EventType) -> impl Iterator<Item = &EventRecord> + '_ {
        self.events
            .iter()
            .filter(move |e| e.event_type == event_type)
    }

    pub fn at_tick(&self, tick: u64) -> impl Iterator<Item = &EventRecord> + '_ {
        self.events.iter().filter(move |e| e.tick == tick)
    }

    /// Events caused by script `line`.
    pub fn for_line(&self, line: u32) -> impl Iterator<Item = &EventRecord> + '_ {
        self.events.iter().filter(move |e| e.line == Some(line))
    }

    /// The last event of `event_type` in the whole log.
    pub fn find_last(&self, event_type: EventType) -> Option<&EventRecord> {
        self.events.iter().rev().find(|e| e.event_type == event_type)
    }

    /// Scan backward from the end, skipping events after `tick`, and return
    /// the first event of `event_type`. Among same-tick events the later
    /// emitted one wins.
    pub fn find_last_at_or_before(&self, event_type: EventType, tick: u64) -> Option<&EventRecord> {
        self.events
            .iter()
            .rev()
            .filter(|e| e.tick <= tick)
            .find(|e| e.event_type == event_type)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a EventRecord;
    type IntoIter = std::slice::Iter<'a, EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl FromIterator<EventRecord> for EventLog {
    fn from_iter<I: IntoIterator<Item = EventRecord>>(iter: I) -> Self {
        let mut log = EventLog::new();
        log.extend(iter);
        log
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, tick: u64, event_type: EventType) -> EventRecord {
        EventRecord {
            id,
            tick,
            event_type,
            category: EventCategory::System,
            line: None,
            payload: Payload::new(),
        }
    }

    fn sample() -> EventLog {
        vec![
            record(1, 0, EventType::ScriptLineExecuted),
            record(2, 3, EventType::AlarmStateChanged),
            record(3, 5, EventType::AlarmStateChanged),
            record(4, 5, EventType::TurretTargetLock),
            record(5, 9, EventType::AlarmStateChanged),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn find_last_scans_whole_log() {
        let log = sample();
        assert_eq!(log.find_last(EventType::AlarmStateChanged).map(|e| e.id), Some(5));
        assert!(log.find_last(EventType::PlayerKilled).is_none());
    }

    #[test]
    fn find_last_at_or_before_skips_later_ticks() {
        let log = sample();
        let found = log.find_last_at_or_before(EventType::AlarmStateChanged, 5);
        assert_eq!(found.map(|e| e.id), Some(3));
        let found = log.find_last_at_or_before(EventType::AlarmStateChanged, 4);
        assert_eq!(found.map(|e| e.id), Some(2));
        assert!(log
            .find_last_at_or_before(EventType::AlarmStateChanged, 2)
            .is_none());
    }

    #[test]
    fn filters_select_matching_events() {
        let mut log = sample();
        let mut tagged = record(6, 9, EventType::Log);
        tagged.line = Some(4);
        log.extend([tagged]);

        assert_eq!(log.of_type(EventType::AlarmStateChanged).count(), 3);
        assert_eq!(log.at_tick(5).count(), 2);
        assert_eq!(log.for_line(4).map(|e| e.id).collect::<Vec<_>>(), vec![6]);
    }

    #[test]
    fn event_serializes_with_wire_names() {
        let mut event = record(7, 2, EventType::PlayerBlockedByDoor);
        event.category = EventCategory::Movement;
        event.payload = payload([("doorId", "D1".into())]);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "PLAYER_BLOCKED_BY_DOOR");
        assert_eq!(json["category"], "movement");
        assert_eq!(json["payload"]["doorId"], "D1");
        assert!(json.get("line").is_none());
    }

    #[test]
    fn payload_values_are_flat_json() {
        let p = payload([
            ("duration", PayloadValue::from(None::<u64>)),
            ("amount", 4u64.into()),
            ("ok", true.into()),
        ]);
        let json = serde_json::to_value(&p).unwrap();
        assert!(json["duration"].is_null());
        assert_eq!(json["amount"], 4);
        assert_eq!(json["ok"], true);

        let back: Payload = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn display_lists_payload() {
        let mut event = record(1, 12, EventType::TurretFired);
        event.payload = payload([("turretId", "T1".into()), ("targetId", "player".into())]);
        assert_eq!(
            event.to_string(),
            "[t=12] TURRET_FIRED targetId=player turretId=T1"
        );
    }
}
