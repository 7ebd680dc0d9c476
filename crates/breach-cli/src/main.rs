//! `breach` -- compile and simulate a security script against a level file.
//!
//! ```text
//! breach --level demos/vault.json --script demos/vault.script
//! breach --level demos/vault.json --json > run.json
//! ```
//!
//! Exit status: `0` when the run succeeds, `1` when it fails, `2` when the
//! script does not compile.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use breach_engine::prelude::*;

const EXIT_RUN_FAILED: u8 = 1;
const EXIT_COMPILE_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "breach")]
#[command(about = "Compile a security script and simulate it against a level")]
#[command(version)]
struct Cli {
    /// Level definition (JSON).
    #[arg(long)]
    level: PathBuf,

    /// Script source. Runs the empty script when omitted.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Extra script lines on top of the level's budget.
    #[arg(long, default_value_t = 0)]
    bonus_lines: u32,

    /// Extra commands on top of the level's budget.
    #[arg(long, default_value_t = 0)]
    bonus_commands: u32,

    /// Extra delay ticks on top of the level's budget.
    #[arg(long, default_value_t = 0)]
    bonus_delay: u64,

    /// Hard ceiling on simulated ticks.
    #[arg(long, default_value_t = GLOBAL_TICK_LIMIT)]
    tick_ceiling: u64,

    /// Print the full simulation result as JSON.
    #[arg(long)]
    json: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            bonus: ConstraintBonus {
                max_lines: self.bonus_lines,
                max_commands: self.bonus_commands,
                max_delay_ticks: self.bonus_delay,
            },
            tick_ceiling: self.tick_ceiling,
        }
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_ceiling: self.tick_ceiling,
            ..EngineConfig::default()
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let level_json = fs::read_to_string(&cli.level)
        .with_context(|| format!("reading level {}", cli.level.display()))?;
    let level = LevelDefinition::from_json(&level_json)
        .with_context(|| format!("parsing level {}", cli.level.display()))?;

    let source = match &cli.script {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?,
        None => String::new(),
    };
    debug!(level = %level.id, bytes = source.len(), "loaded inputs");

    let result = match run_script(&level, &source, &cli.compile_options(), &cli.engine_config()) {
        Ok(result) => result,
        Err(RunError::Compile(failure)) => {
            for error in &failure.errors {
                eprintln!("error: {error}");
            }
            return Ok(ExitCode::from(EXIT_COMPILE_FAILED));
        }
        Err(err) => {
            return Err(err).with_context(|| format!("level {}", cli.level.display()));
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("serializing result")?;
        println!("{json}");
    } else {
        print_report(&level, &result);
    }

    Ok(if result.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_RUN_FAILED)
    })
}

fn print_report(level: &LevelDefinition, result: &SimulationResult) {
    println!(
        "{}: {:?} at tick {} (limit {})",
        level.id, result.outcome, result.final_tick, result.tick_limit
    );
    println!();
    for event in &result.events {
        match event.line {
            Some(line) => println!("  {event} (line {line})"),
            None => println!("  {event}"),
        }
    }

    if let Some(summary) = &result.failure_summary {
        println!();
        println!("cause: {}", summary.primary_cause);
        for (i, step) in summary.cause_chain.iter().enumerate() {
            println!("  {}. {step}", i + 1);
        }
        println!("focus: {}", summary.suggested_focus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bonus_flags_feed_compile_options() {
        let cli = Cli::try_parse_from([
            "breach",
            "--level",
            "vault.json",
            "--bonus-lines",
            "2",
            "--bonus-delay",
            "7",
            "--tick-ceiling",
            "50",
        ])
        .unwrap();

        let options = cli.compile_options();
        assert_eq!(options.bonus.max_lines, 2);
        assert_eq!(options.bonus.max_commands, 0);
        assert_eq!(options.bonus.max_delay_ticks, 7);
        assert_eq!(options.tick_ceiling, 50);
        assert_eq!(cli.engine_config().tick_ceiling, 50);
        assert!(cli.engine_config().hash_frames);
    }

    #[test]
    fn level_is_required() {
        assert!(Cli::try_parse_from(["breach", "--json"]).is_err());
    }
}
