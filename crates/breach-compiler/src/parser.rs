//! Line-oriented script parser.
//!
//! Each non-blank, non-comment line must match exactly one grammar in
//! [`GRAMMARS`], in full, case-sensitively, with no interior whitespace. A
//! line matching none is a syntax error carrying its 1-based line number.
//! There is no state shared between lines.
//!
//! # Example
//!
//! ```
//! use breach_compiler::parser::parse_script;
//! use breach_compiler::script::Command;
//!
//! let parsed = parse_script("# open up\ndoor(\"D1\").open()\nwait(3)");
//! assert!(parsed.errors.is_empty());
//! assert_eq!(parsed.commands.len(), 2);
//! assert_eq!(parsed.commands[0].line, 2);
//! assert_eq!(parsed.commands[1].command, Command::Wait { ticks: 3 });
//! ```

use serde::{Deserialize, Serialize};

use crate::script::{Command, CompileError, ParsedCommand};

/// Prefixes that mark a whole line as a comment.
pub const COMMENT_MARKERS: [&str; 2] = ["//", "#"];

// ---------------------------------------------------------------------------
// ParseResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    pub commands: Vec<ParsedCommand>,
    pub errors: Vec<CompileError>,
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Byte cursor over a single trimmed line.
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    fn eat(&mut self, literal: &str) -> Option<()> {
        self.rest = self.rest.strip_prefix(literal)?;
        Some(())
    }

    /// A double-quoted string whose characters all satisfy `allowed`.
    fn quoted(&mut self, allowed: fn(char) -> bool) -> Option<&'a str> {
        let body = self.rest.strip_prefix('"')?;
        let end = body.find('"')?;
        let (text, tail) = body.split_at(end);
        if !text.chars().all(allowed) {
            return None;
        }
        self.rest = &tail[1..];
        Some(text)
    }

    /// A quoted device id or tag: one or more of `[A-Za-z0-9_:-]`.
    fn ident(&mut self) -> Option<String> {
        self.quoted(is_ident_char)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }

    /// A run of ASCII digits that fits in a `u64`.
    fn number(&mut self) -> Option<u64> {
        let len = self
            .rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.rest.len());
        if len == 0 {
            return None;
        }
        let (digits, tail) = self.rest.split_at(len);
        let value = digits.parse().ok()?;
        self.rest = tail;
        Some(value)
    }

    fn finished(&self) -> bool {
        self.rest.is_empty()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-')
}

// ---------------------------------------------------------------------------
// Grammars
// ---------------------------------------------------------------------------

type Grammar = fn(&mut Cursor<'_>) -> Option<Command>;

/// Every accepted statement shape, tried in order. The shapes are
/// prefix-disjoint, so at most one can match a given line.
const GRAMMARS: [Grammar; 9] = [
    camera_disable,
    camera_enable,
    alarm_delay,
    door_open,
    door_close,
    turret_retarget,
    device_tag,
    wait,
    log,
];

fn camera_disable(cur: &mut Cursor<'_>) -> Option<Command> {
    cur.eat("camera(")?;
    let device_id = cur.ident()?;
    cur.eat(").disable(")?;
    let duration = if cur.eat(")").is_some() {
        None
    } else {
        let n = cur.number()?;
        cur.eat(")")?;
        Some(n)
    };
    Some(Command::CameraDisable {
        device_id,
        duration,
    })
}

fn camera_enable(cur: &mut Cursor<'_>) -> Option<Command> {
    cur.eat("camera(")?;
    let device_id = cur.ident()?;
    cur.eat(").enable()")?;
    Some(Command::CameraEnable { device_id })
}

fn alarm_delay(cur: &mut Cursor<'_>) -> Option<Command> {
    cur.eat("alarm().delay(")?;
    let ticks = cur.number()?;
    cur.eat(")")?;
    Some(Command::AlarmDelay { ticks })
}

fn door_open(cur: &mut Cursor<'_>) -> Option<Command> {
    cur.eat("door(")?;
    let device_id = cur.ident()?;
    cur.eat(").open()")?;
    Some(Command::DoorOpen { device_id })
}

fn door_close(cur: &mut Cursor<'_>) -> Option<Command> {
    cur.eat("door(")?;
    let device_id = cur.ident()?;
    cur.eat(").close()")?;
    Some(Command::DoorClose { device_id })
}

fn turret_retarget(cur: &mut Cursor<'_>) -> Option<Command> {
    cur.eat("turret(")?;
    let device_id = cur.ident()?;
    cur.eat(").retarget(")?;
    let target_id = cur.ident()?;
    cur.eat(")")?;
    Some(Command::TurretRetarget {
        device_id,
        target_id,
    })
}

fn device_tag(cur: &mut Cursor<'_>) -> Option<Command> {
    cur.eat("device(")?;
    let device_id = cur.ident()?;
    cur.eat(").tag(")?;
    let tag = cur.ident()?;
    cur.eat(")")?;
    Some(Command::DeviceTag { device_id, tag })
}

fn wait(cur: &mut Cursor<'_>) -> Option<Command> {
    cur.eat("wait(")?;
    let ticks = cur.number()?;
    cur.eat(")")?;
    Some(Command::Wait { ticks })
}

fn log(cur: &mut Cursor<'_>) -> Option<Command> {
    cur.eat("log(")?;
    let message = cur.quoted(|_| true)?.to_owned();
    cur.eat(")")?;
    Some(Command::Log { message })
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Whether a trimmed line produces no command.
pub fn is_skippable(trimmed: &str) -> bool {
    trimmed.is_empty() || COMMENT_MARKERS.iter().any(|m| trimmed.starts_with(m))
}

/// Parse one trimmed, non-skippable line.
pub fn parse_line(trimmed: &str) -> Option<Command> {
    GRAMMARS.iter().find_map(|grammar| {
        let mut cur = Cursor::new(trimmed);
        grammar(&mut cur).filter(|_| cur.finished())
    })
}

/// Parse a whole script. Lines are separated by `\n` (an optional trailing
/// `\r` is dropped by trimming).
pub fn parse_script(source: &str) -> ParseResult {
    let mut result = ParseResult::default();

    for (idx, text) in source.split('\n').enumerate() {
        let line = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        let raw = text.trim();
        if is_skippable(raw) {
            continue;
        }

        match parse_line(raw) {
            Some(command) => result.commands.push(ParsedCommand {
                line,
                raw: raw.to_owned(),
                command,
            }),
            None => result.errors.push(CompileError::new(
                line,
                format!("Unrecognized command syntax: {raw}"),
            )),
        }
    }

    tracing::debug!(
        commands = result.commands.len(),
        errors = result.errors.len(),
        "parsed script"
    );
    result
}

/// Number of lines that would be parsed as commands.
pub fn count_script_commands(source: &str) -> usize {
    source
        .split('\n')
        .filter(|text| !is_skippable(text.trim()))
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn one(line: &str) -> Command {
        parse_line(line).unwrap_or_else(|| panic!("{line:?} should parse"))
    }

    #[test]
    fn every_verb_parses() {
        assert_eq!(
            one("camera(\"C1\").disable(20)"),
            Command::CameraDisable {
                device_id: "C1".to_owned(),
                duration: Some(20)
            }
        );
        assert_eq!(
            one("camera(\"C1\").enable()"),
            Command::CameraEnable {
                device_id: "C1".to_owned()
            }
        );
        assert_eq!(one("alarm().delay(12)"), Command::AlarmDelay { ticks: 12 });
        assert_eq!(
            one("door(\"D1\").open()"),
            Command::DoorOpen {
                device_id: "D1".to_owned()
            }
        );
        assert_eq!(
            one("door(\"D1\").close()"),
            Command::DoorClose {
                device_id: "D1".to_owned()
            }
        );
        assert_eq!(
            one("turret(\"T4\").retarget(\"DR4\")"),
            Command::TurretRetarget {
                device_id: "T4".to_owned(),
                target_id: "DR4".to_owned()
            }
        );
        assert_eq!(
            one("device(\"net:cam-1\").tag(\"decoy_A\")"),
            Command::DeviceTag {
                device_id: "net:cam-1".to_owned(),
                tag: "decoy_A".to_owned()
            }
        );
        assert_eq!(one("wait(0)"), Command::Wait { ticks: 0 });
        assert_eq!(
            one("log(\"going in, now!\")"),
            Command::Log {
                message: "going in, now!".to_owned()
            }
        );
    }

    #[test]
    fn disable_without_duration_is_indefinite() {
        assert_eq!(
            one("camera(\"C1\").disable()"),
            Command::CameraDisable {
                device_id: "C1".to_owned(),
                duration: None
            }
        );
    }

    #[test]
    fn empty_log_message_is_allowed() {
        assert_eq!(
            one("log(\"\")"),
            Command::Log {
                message: String::new()
            }
        );
    }

    #[test]
    fn near_misses_are_rejected() {
        for line in [
            "Camera(\"C1\").disable(2)",
            "camera(\"C1\").disable(-2)",
            "camera(\"C1\") .enable()",
            "camera('C1').enable()",
            "camera(\"\").enable()",
            "camera(\"C 1\").enable()",
            "door(\"D1\").open();",
            "door(\"D1\").open() door(\"D2\").open()",
            "wait()",
            "wait(1.5)",
            "wait(99999999999999999999999)",
            "alarm(\"A1\").delay(3)",
            "log(\"unterminated)",
            "log(\"a\"b\")",
            "turret(\"T1\").retarget(player)",
        ] {
            assert!(parse_line(line).is_none(), "{line:?} should not parse");
        }
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let parsed = parse_script("\n   \n// note\n  # other\nwait(2)\n");
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.commands.len(), 1);
        assert_eq!(parsed.commands[0].line, 5);
        assert_eq!(parsed.commands[0].raw, "wait(2)");
    }

    #[test]
    fn crlf_and_indentation_are_trimmed() {
        let parsed = parse_script("  door(\"D1\").open()\r\n\twait(1)\r\n");
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.commands.len(), 2);
        assert_eq!(parsed.commands[0].raw, "door(\"D1\").open()");
    }

    #[test]
    fn syntax_errors_carry_line_and_text() {
        let parsed = parse_script("wait(1)\nhack the planet\nwait(2)");
        assert_eq!(parsed.commands.len(), 2);
        assert_eq!(
            parsed.errors,
            vec![CompileError::new(
                2,
                "Unrecognized command syntax: hack the planet"
            )]
        );
    }

    #[test]
    fn command_count_ignores_blanks_and_comments() {
        assert_eq!(count_script_commands(""), 0);
        assert_eq!(count_script_commands("wait(1)\n\n# x\n// y\nbogus"), 2);
    }
}
