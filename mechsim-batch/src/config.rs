//! Configuration for batch runs
//!
//! Level 4 - Utilities and configuration

use mechsim_core::MAX_TURNS;

/// Batch driver configuration
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of combined board pairs drawn from the pool
    pub board_pairs: usize,
    /// Total engagements, dealt round-robin over the board pairs
    pub runs: usize,
    /// Seed for board drawing and per-run RNG streams
    pub base_seed: u64,
    /// Run engagements on the rayon pool
    pub parallel: bool,
    /// Turn cap for each engagement
    pub max_turns: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            board_pairs: 50,
            runs: 100,
            base_seed: 42,
            parallel: true,
            max_turns: MAX_TURNS,
        }
    }
}

impl BatchConfig {
    /// Total number of engagements
    pub fn total_runs(&self) -> usize {
        self.runs
    }

    /// Board pairs actually used; never more than there are runs to play on them
    pub fn pairs_in_use(&self) -> usize {
        self.board_pairs.min(self.runs)
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_board_pairs(mut self, board_pairs: usize) -> Self {
        self.board_pairs = board_pairs;
        self
    }

    /// Play `runs_per_board` engagements on each of the current board pairs
    pub fn with_runs_per_board(mut self, runs_per_board: usize) -> Self {
        self.runs = self.board_pairs * runs_per_board;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    /// Run sequentially on the calling thread
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.total_runs(), 100);
        assert_eq!(config.max_turns, MAX_TURNS);
        assert!(config.parallel);
    }

    #[test]
    fn test_with_runs_is_exact() {
        let config = BatchConfig::default().with_board_pairs(4).with_runs(10);
        assert_eq!(config.total_runs(), 10);
        assert_eq!(config.pairs_in_use(), 4);
    }

    #[test]
    fn test_fewer_runs_than_pairs() {
        let config = BatchConfig::default().with_runs(10);
        assert_eq!(config.board_pairs, 50);
        assert_eq!(config.total_runs(), 10);
        assert_eq!(config.pairs_in_use(), 10);
    }

    #[test]
    fn test_with_runs_per_board() {
        let config = BatchConfig::default().with_board_pairs(3).with_runs_per_board(2);
        assert_eq!(config.total_runs(), 6);
    }
}
