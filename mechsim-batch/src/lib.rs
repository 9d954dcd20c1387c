//! MECHSIM Batch - Monte Carlo driver over many engagements
//!
//! This crate runs the same attacker/defender matchup many times:
//! - Board pairs drawn from a board pool and combined side by side
//! - Independent seeded RNG stream per run
//! - Parallel execution on the rayon pool
//! - Median turns-to-defeat plus outcome counts
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run_batch (orchestration)
//! - Level 2: precompute_board_pairs, execute_runs (phases)
//! - Level 3: play_single_run, median_turns (steps)
//! - Level 4: configuration

mod batch;
mod config;

pub use batch::{median_turns, precompute_board_pairs, run_batch, run_batch_with_progress, BatchResult, RunRecord};
pub use config::BatchConfig;
