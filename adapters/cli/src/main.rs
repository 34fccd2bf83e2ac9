#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays quest scenarios against an in-process host.

mod journal_transfer;
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use questline_session::Session;

use scenario::{Report, Scenario, ScenarioFile};

#[derive(Debug, Parser)]
#[command(
    name = "questline",
    version,
    about = "Plays quest scenarios against an in-process host"
)]
struct Cli {
    /// Scenario file with optional `[session]` and `[horde]` tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the session seed.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Gives up after this many ticks.
    #[arg(long, global = true, default_value_t = 6_000)]
    max_ticks: u32,

    /// Prints the journal as a transfer string once the run ends.
    #[arg(long, global = true)]
    export: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk up to a location picked by the host.
    Reach,
    /// Fight a horde until enough kills are credited.
    Horde {
        /// Kills needed, overriding the scenario file.
        #[arg(long)]
        kills: Option<u32>,
    },
    /// Call in a supply drop and wait next to it until it lands.
    AirDrop,
    /// Lists the quests stored in a journal transfer string.
    Inspect {
        /// String printed by `--export`.
        journal: String,
    },
}

/// Entry point for the Questline command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut file = match &cli.config {
        Some(path) => ScenarioFile::load(path)?,
        None => ScenarioFile::default(),
    };
    if let Some(seed) = cli.seed {
        file.session.seed = seed;
    }

    let scenario = match cli.command {
        Command::Reach => Scenario::Reach,
        Command::Horde { kills } => Scenario::horde(file.horde.take(), kills),
        Command::AirDrop => Scenario::AirDrop,
        Command::Inspect { journal } => return inspect(&journal),
    };

    let mut session = Session::new(file.session);
    let report = scenario::run(&mut session, &scenario, cli.max_ticks)?;
    print_report(&report);

    if cli.export {
        let snapshot = session
            .snapshot(report.player)
            .context("player journal disappeared")?;
        println!("{}", journal_transfer::encode(&snapshot)?);
    }
    Ok(())
}

fn print_report(report: &Report) {
    println!(
        "quest {} of player {}: {:?} after {} ticks",
        report.handle.get(),
        report.player.get(),
        report.state,
        report.ticks
    );
    if report.shots > 0 {
        println!("shots fired: {}", report.shots);
    }
    println!(
        "client -> host: {} messages, {} bytes",
        report.sent.messages, report.sent.bytes
    );
    println!(
        "host -> client: {} messages, {} bytes",
        report.answered.messages, report.answered.bytes
    );
}

fn inspect(journal: &str) -> Result<()> {
    let snapshot = journal_transfer::decode(journal).context("invalid journal string")?;
    println!(
        "journal of player {} with {} quests",
        snapshot.owner.get(),
        snapshot.quests.len()
    );
    for quest in &snapshot.quests {
        let position = quest
            .position
            .map_or_else(|| "unplaced".to_owned(), |position| position.to_string());
        println!(
            "  [{}] {} ({:?}, phase {}) at {position}",
            quest.handle.get(),
            quest.name,
            quest.state,
            quest.current_phase
        );
    }
    Ok(())
}
