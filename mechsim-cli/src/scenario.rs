//! Scenario loading shared by every command
//!
//! Boards and units come from JSON files; anything not given falls back to
//! blank mapsheets and the stock Hunchback templates.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::de::DeserializeOwned;

use mechsim_core::{hunchback_4p, Board, UnitState};

#[derive(Args, Clone, Debug, Default)]
pub struct ScenarioArgs {
    /// Board JSON file (repeat for more than one)
    #[arg(long = "board", value_name = "FILE")]
    pub boards: Vec<PathBuf>,

    /// Attacker unit JSON file (default: HBK-4P)
    #[arg(long, value_name = "FILE")]
    pub attacker: Option<PathBuf>,

    /// Defender unit JSON file (default: HBK-4P)
    #[arg(long, value_name = "FILE")]
    pub defender: Option<PathBuf>,
}

/// Loaded boards and units
pub struct Scenario {
    pub boards: Vec<Board>,
    pub attacker: UnitState,
    pub defender: UnitState,
}

impl Scenario {
    pub fn load(args: &ScenarioArgs) -> Result<Self> {
        let boards = load_boards(&args.boards)?;
        let attacker = load_unit(args.attacker.as_deref(), "attacker")?;
        let defender = load_unit(args.defender.as_deref(), "defender")?;
        Ok(Self { boards, attacker, defender })
    }

    /// Single board for one engagement: given boards laid side by side,
    /// two blank mapsheets when none were given
    pub fn engagement_board(&self) -> Board {
        match self.boards.split_first() {
            None => Board::combine(&Board::mapsheet(), &Board::mapsheet()),
            Some((first, rest)) => rest.iter().fold(first.clone(), |acc, b| Board::combine(&acc, b)),
        }
    }

    /// Board pool for batch pairing; a blank mapsheet when none were given
    pub fn board_pool(&self) -> Vec<Board> {
        if self.boards.is_empty() {
            vec![Board::mapsheet()]
        } else {
            self.boards.clone()
        }
    }
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_boards(paths: &[PathBuf]) -> Result<Vec<Board>> {
    paths
        .iter()
        .map(|path| load_json::<Board>(path).with_context(|| format!("Failed to load board: {}", path.display())))
        .collect()
}

fn load_unit(path: Option<&Path>, role: &str) -> Result<UnitState> {
    let unit = match path {
        Some(path) => {
            load_json::<UnitState>(path).with_context(|| format!("Failed to load {} unit: {}", role, path.display()))?
        }
        None => hunchback_4p(),
    };

    if let Err(e) = unit.validate() {
        tracing::warn!("{} template rejected by validation: {}", role, e);
    }

    Ok(unit)
}
