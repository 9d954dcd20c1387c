//! Batch play - many engagements of one matchup
//!
//! Level 1/2 - Orchestration and phases

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use mechsim_core::{Board, Engagement, Outcome, UnitState};

use crate::config::BatchConfig;

/// One finished engagement
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Index into the precomputed board pairs
    pub board_pair: usize,
    pub seed: u64,
    pub outcome: Outcome,
    /// Turns counted against the cap
    pub turns: u32,
}

/// Aggregate result of a batch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchResult {
    pub median_turns: f64,
    pub mean_turns: f64,
    pub defender_destroyed: u32,
    pub defender_withdrew: u32,
    pub attacker_destroyed: u32,
    pub timeouts: u32,
    pub runs: Vec<RunRecord>,
}

impl BatchResult {
    fn from_runs(mut runs: Vec<RunRecord>, max_turns: u32) -> Self {
        runs.sort_by_key(|r| (r.board_pair, r.seed));

        let mut turns: Vec<u32> = runs.iter().map(|r| r.turns).collect();
        let median_turns = median_turns(&mut turns, max_turns);
        let mean_turns = if turns.is_empty() {
            f64::from(max_turns)
        } else {
            turns.iter().map(|&t| f64::from(t)).sum::<f64>() / turns.len() as f64
        };

        let mut result = Self {
            median_turns,
            mean_turns,
            defender_destroyed: 0,
            defender_withdrew: 0,
            attacker_destroyed: 0,
            timeouts: 0,
            runs,
        };
        for run in &result.runs {
            match run.outcome {
                Outcome::DefenderDestroyed { .. } => result.defender_destroyed += 1,
                Outcome::DefenderWithdrew { .. } => result.defender_withdrew += 1,
                Outcome::AttackerDestroyed { .. } => result.attacker_destroyed += 1,
                Outcome::Timeout => result.timeouts += 1,
            }
        }
        result
    }

    pub fn games_played(&self) -> usize {
        self.runs.len()
    }

    /// Fraction of runs where the defender was destroyed or withdrew
    pub fn defender_defeat_rate(&self) -> f64 {
        if self.runs.is_empty() {
            0.0
        } else {
            f64::from(self.defender_destroyed + self.defender_withdrew) / self.runs.len() as f64
        }
    }
}

// ============================================================================
// Level 1 - Orchestration
// ============================================================================

/// Play the matchup `config.total_runs()` times and report the median turns
/// the attacker needed to defeat the defender.
pub fn run_batch(boards: &[Board], attacker: &UnitState, defender: &UnitState, config: &BatchConfig) -> BatchResult {
    run_batch_with_progress(boards, attacker, defender, config, || {})
}

/// Same as [`run_batch`], calling `on_run` after every finished engagement
pub fn run_batch_with_progress<F>(
    boards: &[Board],
    attacker: &UnitState,
    defender: &UnitState,
    config: &BatchConfig,
    on_run: F,
) -> BatchResult
where
    F: Fn() + Sync,
{
    let mut rng = ChaCha8Rng::seed_from_u64(config.base_seed);
    let pairs = precompute_board_pairs(boards, config.pairs_in_use(), &mut rng);

    tracing::info!(
        "Batch: {} vs {} ({} runs over {} board pairs, cap {})",
        attacker.name,
        defender.name,
        config.total_runs(),
        pairs.len(),
        config.max_turns
    );

    let jobs = prepare_jobs(pairs.len(), config);
    let runs = execute_runs(&pairs, attacker, defender, &jobs, config, &on_run);
    let result = BatchResult::from_runs(runs, config.max_turns);

    tracing::info!(
        "Batch done: median {:.1} turns over {} runs ({} destroyed, {} withdrew, {} timeouts)",
        result.median_turns,
        result.games_played(),
        result.defender_destroyed,
        result.defender_withdrew,
        result.timeouts
    );

    result
}

// ============================================================================
// Level 2 - Phases
// ============================================================================

/// Draw `n_pairs` board pairs uniformly from the pool and combine each pair
/// side by side. An empty pool yields no pairs.
pub fn precompute_board_pairs<R: Rng + ?Sized>(boards: &[Board], n_pairs: usize, rng: &mut R) -> Vec<Board> {
    if boards.is_empty() {
        return Vec::new();
    }
    (0..n_pairs)
        .map(|_| {
            let left = &boards[rng.gen_range(0..boards.len())];
            let right = &boards[rng.gen_range(0..boards.len())];
            Board::combine(left, right)
        })
        .collect()
}

/// A single engagement to play
#[derive(Clone, Copy)]
struct RunJob {
    board_pair: usize,
    seed: u64,
}

/// Deal exactly `config.total_runs()` jobs round-robin over the pairs.
/// No pairs means no jobs.
fn prepare_jobs(n_pairs: usize, config: &BatchConfig) -> Vec<RunJob> {
    if n_pairs == 0 {
        return Vec::new();
    }
    (0..config.total_runs())
        .map(|index| RunJob {
            board_pair: index % n_pairs,
            seed: config.base_seed.wrapping_add(1 + index as u64),
        })
        .collect()
}

fn execute_runs<F>(
    pairs: &[Board],
    attacker: &UnitState,
    defender: &UnitState,
    jobs: &[RunJob],
    config: &BatchConfig,
    on_run: &F,
) -> Vec<RunRecord>
where
    F: Fn() + Sync,
{
    let play = |job: &RunJob| {
        let record = play_single_run(&pairs[job.board_pair], attacker, defender, *job, config.max_turns);
        on_run();
        record
    };

    if config.parallel {
        jobs.par_iter().map(play).collect()
    } else {
        jobs.iter().map(play).collect()
    }
}

// ============================================================================
// Level 3 - Steps
// ============================================================================

fn play_single_run(board: &Board, attacker: &UnitState, defender: &UnitState, job: RunJob, max_turns: u32) -> RunRecord {
    let mut rng = ChaCha8Rng::seed_from_u64(job.seed);
    let outcome = Engagement::new(board, attacker, defender)
        .with_max_turns(max_turns)
        .run(&mut rng);

    tracing::debug!("Run {} on pair {}: {}", job.seed, job.board_pair, outcome);

    RunRecord {
        board_pair: job.board_pair,
        seed: job.seed,
        outcome,
        turns: outcome.turns_capped(max_turns),
    }
}

/// Median of `turns`; `cap` when empty, mean of the middle two when even
pub fn median_turns(turns: &mut [u32], cap: u32) -> f64 {
    if turns.is_empty() {
        return f64::from(cap);
    }
    turns.sort_unstable();
    let n = turns.len();
    if n % 2 == 0 {
        (f64::from(turns[n / 2 - 1]) + f64::from(turns[n / 2])) / 2.0
    } else {
        f64::from(turns[n / 2])
    }
}
