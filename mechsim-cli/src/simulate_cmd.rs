//! Simulate and replay commands - a single engagement
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run(), run_replay() - orchestration
//! - Level 2: play(), report_outcome(), write_trace()
//! - Level 4: argument structs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use mechsim_core::{Board, Engagement, Outcome, Side, Trace, MAX_TURNS};

use crate::scenario::{Scenario, ScenarioArgs};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// RNG seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Turn cap
    #[arg(long, default_value_t = MAX_TURNS)]
    pub max_turns: u32,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// RNG seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Turn cap
    #[arg(long, default_value_t = MAX_TURNS)]
    pub max_turns: u32,

    /// Where to write the trace
    #[arg(long, value_name = "FILE", default_value = "trace.json")]
    pub out: PathBuf,
}

/// Machine-readable result of one engagement
#[derive(Serialize)]
struct SimulateReport<'a> {
    attacker: &'a str,
    defender: &'a str,
    seed: u64,
    outcome: Outcome,
    turns: u32,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run simulate command
pub fn run(args: SimulateArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let board = scenario.engagement_board();

    tracing::info!(
        "Simulating {} vs {} on {}x{} (seed {})",
        scenario.attacker.name,
        scenario.defender.name,
        board.width(),
        board.height(),
        args.seed
    );

    let (outcome, _) = play(&scenario, &board, args.seed, args.max_turns, false);
    report_outcome(&scenario, outcome, &args)
}

/// Run replay command: simulate and write the full trace
pub fn run_replay(args: ReplayArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let board = scenario.engagement_board();

    let (outcome, trace) = play(&scenario, &board, args.seed, args.max_turns, true);
    let trace = trace.context("Engagement finished without a trace")?;

    write_trace(&trace, &args.out)?;

    println!("{}", outcome);
    println!(
        "Damage dealt: {} {}, {} {}",
        scenario.attacker.name,
        trace.damage_dealt(Side::Attacker),
        scenario.defender.name,
        trace.damage_dealt(Side::Defender)
    );
    println!("Trace ({} turns) written to {}", trace.turns.len(), args.out.display());

    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn play(scenario: &Scenario, board: &Board, seed: u64, max_turns: u32, traced: bool) -> (Outcome, Option<Trace>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut engagement = Engagement::new(board, &scenario.attacker, &scenario.defender).with_max_turns(max_turns);
    if traced {
        engagement = engagement.with_trace();
    }
    let outcome = engagement.run(&mut rng);
    (outcome, engagement.into_trace())
}

fn report_outcome(scenario: &Scenario, outcome: Outcome, args: &SimulateArgs) -> Result<()> {
    let turns = outcome.turns_capped(args.max_turns);

    if args.json {
        let report = SimulateReport {
            attacker: &scenario.attacker.name,
            defender: &scenario.defender.name,
            seed: args.seed,
            outcome,
            turns,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} vs {}: {}", scenario.attacker.name, scenario.defender.name, outcome);
        println!("Turns to defeat: {}", turns);
    }

    Ok(())
}

fn write_trace(trace: &Trace, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(trace)?;
    fs::write(path, json).with_context(|| format!("Failed to write trace: {}", path.display()))
}
