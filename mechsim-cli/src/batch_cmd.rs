//! Batch command - median turns-to-defeat over many engagements
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_config(), play_batch(), report_results()
//! - Level 4: argument structs

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use mechsim_batch::{run_batch_with_progress, BatchConfig, BatchResult};
use mechsim_core::MAX_TURNS;

use crate::scenario::{Scenario, ScenarioArgs};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct BatchArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Total engagements, dealt round-robin over the board pairs
    #[arg(long, default_value = "100")]
    pub runs: usize,

    /// Number of board pairs drawn from the given boards
    #[arg(long, default_value = "50")]
    pub pairs: usize,

    /// Base RNG seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Turn cap per engagement
    #[arg(long, default_value_t = MAX_TURNS)]
    pub max_turns: u32,

    /// Run on the calling thread only
    #[arg(long)]
    pub sequential: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON report for one batch
#[derive(Serialize)]
struct BatchReport<'a> {
    attacker: &'a str,
    defender: &'a str,
    generated_at: DateTime<Utc>,
    seed: u64,
    board_pairs: usize,
    #[serde(flatten)]
    result: &'a BatchResult,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run batch command
///
/// 1. Load boards and units
/// 2. Play every engagement with a progress bar
/// 3. Report median turns and outcome counts
pub fn run(args: BatchArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let config = build_config(&args);

    let result = play_batch(&scenario, &config, !args.json)?;

    report_results(&scenario, &config, &result, &args)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn build_config(args: &BatchArgs) -> BatchConfig {
    let config = BatchConfig::default()
        .with_board_pairs(args.pairs.max(1))
        .with_runs(args.runs)
        .with_seed(args.seed)
        .with_max_turns(args.max_turns);
    if args.sequential {
        config.sequential()
    } else {
        config
    }
}

fn play_batch(scenario: &Scenario, config: &BatchConfig, show_progress: bool) -> Result<BatchResult> {
    let progress = if show_progress {
        ProgressBar::new(config.total_runs() as u64)
    } else {
        ProgressBar::hidden()
    };
    progress.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} runs [{elapsed_precise}] eta {eta}")?);

    let pool = scenario.board_pool();
    let result = run_batch_with_progress(&pool, &scenario.attacker, &scenario.defender, config, || progress.inc(1));

    progress.finish_and_clear();
    Ok(result)
}

fn report_results(scenario: &Scenario, config: &BatchConfig, result: &BatchResult, args: &BatchArgs) -> Result<()> {
    if args.json {
        let report = BatchReport {
            attacker: &scenario.attacker.name,
            defender: &scenario.defender.name,
            generated_at: Utc::now(),
            seed: config.base_seed,
            board_pairs: config.pairs_in_use(),
            result,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} vs {}", scenario.attacker.name, scenario.defender.name);
    println!("Runs:              {}", result.games_played());
    println!("Median turns:      {:.1}", result.median_turns);
    println!("Mean turns:        {:.2}", result.mean_turns);
    println!("Defender defeated: {:.1}%", result.defender_defeat_rate() * 100.0);
    println!(
        "  destroyed {}, withdrew {}, attacker destroyed {}, timeouts {}",
        result.defender_destroyed, result.defender_withdrew, result.attacker_destroyed, result.timeouts
    );

    Ok(())
}
