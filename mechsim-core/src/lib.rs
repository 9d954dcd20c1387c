//! MECHSIM Core - Combat simulation engine
//!
//! This crate provides the simulation core for MECHSIM:
//! - Hex geometry (odd-q offset grid with cube math)
//! - Boards, terrain and line of sight
//! - Unit damage model with criticals, ammo explosions and falls
//! - Per-category weapon resolution and heat-budgeted fire selection
//! - Tactical movement AI (reactive and 1-ply minimax)
//! - The per-turn engagement engine with optional replay trace

pub mod board;
pub mod combat;
pub mod dice;
pub mod engine;
pub mod error;
pub mod heat;
pub mod hex;
pub mod los;
pub mod movement;
pub mod tactics;
pub mod templates;
pub mod trace;
pub mod unit;
pub mod weapon;

// Re-exports for convenient access
pub use board::{Board, Hex, Terrain, TerrainType, MAPSHEET_HEIGHT, MAPSHEET_WIDTH};
pub use combat::{resolve_weapon_fire, weapon_expected_damage, FireResult};
pub use engine::{simulate, simulate_with_trace, Engagement, Outcome, MAX_TURNS};
pub use error::{BoardError, TemplateError};
pub use heat::select_weapons_ev;
pub use hex::{distance, HexCoord};
pub use los::{check_los, LosCache, LosResult};
pub use movement::{collect_move_options, ReachableHex};
pub use tactics::{choose_movement, MoveRole, TacticalView};
pub use templates::{hunchback_4g, hunchback_4p};
pub use trace::{Side, Trace};
pub use unit::{Location, MoveMode, UnitState};
pub use weapon::{Weapon, WeaponCategory};
