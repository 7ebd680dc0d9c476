//! Sequential-to-absolute tick scheduling.
//!
//! Commands are folded left to right over a tick cursor starting at 0. Each
//! command is stamped with the cursor; `wait(n)` then advances the cursor by
//! `n`, so the wait occupies the tick it was issued on and the next command
//! lands `n` ticks later.

use crate::script::{Command, CompiledCommand, ParsedCommand};

/// Stamp every command with its absolute tick.
pub fn schedule(commands: Vec<ParsedCommand>) -> Vec<CompiledCommand> {
    let mut cursor: u64 = 0;
    commands
        .into_iter()
        .map(|parsed| {
            let tick = cursor;
            if let Command::Wait { ticks } = parsed.command {
                cursor = cursor.saturating_add(ticks);
            }
            CompiledCommand {
                tick,
                line: parsed.line,
                raw: parsed.raw,
                command: parsed.command,
            }
        })
        .collect()
}

/// Highest tick any command is stamped with (0 for an empty schedule).
pub fn last_tick(commands: &[CompiledCommand]) -> u64 {
    commands.iter().map(|c| c.tick).max().unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
