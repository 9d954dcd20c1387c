//! Replay trace of one engagement
//!
//! Every turn records both units' end-of-turn state plus the events and
//! weapon fire that happened during it. The whole trace serializes to JSON
//! for replay rendering.

use serde::{Deserialize, Serialize};

use crate::board::{Board, Hex};
use crate::engine::Outcome;
use crate::hex::HexCoord;
use crate::unit::{Location, MoveMode, UnitState, NUM_LOCATIONS};

/// One side of the engagement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Attacker => 0,
            Side::Defender => 1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

/// Unit state at the end of a turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub name: String,
    pub position: HexCoord,
    pub facing: u8,
    pub torso_twist: i8,
    pub heat: i32,
    pub armor: [i32; NUM_LOCATIONS],
    pub rear_armor: [i32; 3],
    pub structure: [i32; NUM_LOCATIONS],
    pub max_structure: [i32; NUM_LOCATIONS],
    pub move_mode: MoveMode,
    pub hexes_moved: i32,
    pub engine_hits: i32,
    pub gyro_hits: i32,
    pub pilot_damage: i32,
    pub prone: bool,
    pub shutdown: bool,
    pub destroyed: bool,
    pub forced_withdrawal: bool,
}

impl From<&UnitState> for UnitSnapshot {
    fn from(u: &UnitState) -> Self {
        Self {
            name: u.name.clone(),
            position: u.position,
            facing: u.facing,
            torso_twist: u.torso_twist,
            heat: u.heat,
            armor: u.armor,
            rear_armor: u.rear_armor,
            structure: u.structure,
            max_structure: u.max_structure,
            move_mode: u.move_mode,
            hexes_moved: u.hexes_moved,
            engine_hits: u.engine_hits,
            gyro_hits: u.gyro_hits,
            pilot_damage: u.pilot_damage,
            prone: u.prone,
            shutdown: u.shutdown,
            destroyed: u.is_destroyed(),
            forced_withdrawal: u.is_forced_withdrawal(),
        }
    }
}

/// One weapon firing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponShot {
    pub side: Side,
    pub weapon: String,
    pub target_number: i32,
    pub hit: bool,
    pub damage: i32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub jammed: bool,
}

/// Something notable that happened during a turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Initiative { first_mover: Side },
    Moved { side: Side, to: HexCoord, facing: u8, mode: MoveMode, hexes: i32 },
    NoLineOfSight { side: Side },
    Kick { side: Side, hit: bool, damage: i32 },
    Fell { side: Side },
    StoodUp { side: Side },
    ShutDown { side: Side },
    StayedDown { side: Side },
    Restarted { side: Side },
    AmmoExplosion { side: Side, location: Location },
}

/// Everything recorded for one turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn: u32,
    pub attacker: UnitSnapshot,
    pub defender: UnitSnapshot,
    pub events: Vec<Event>,
    pub shots: Vec<WeaponShot>,
}

/// Full replay of an engagement
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub attacker_name: String,
    pub defender_name: String,
    pub board_width: i32,
    pub board_height: i32,
    pub hexes: Vec<Hex>,
    pub turns: Vec<TurnRecord>,
    pub outcome: Option<Outcome>,
}

impl Trace {
    pub fn new(board: &Board, attacker: &UnitState, defender: &UnitState) -> Self {
        Self {
            attacker_name: attacker.name.clone(),
            defender_name: defender.name.clone(),
            board_width: board.width(),
            board_height: board.height(),
            hexes: board.hexes().filter(|h| h.elevation != 0 || !h.terrain.is_empty()).cloned().collect(),
            turns: Vec::new(),
            outcome: None,
        }
    }

    /// Total damage dealt by one side over the whole engagement
    pub fn damage_dealt(&self, side: Side) -> i32 {
        self.turns
            .iter()
            .flat_map(|t| t.shots.iter())
            .filter(|s| s.side == side)
            .map(|s| s.damage)
            .sum()
    }
}

/// In-progress recording for the current turn
#[derive(Debug, Default)]
pub(crate) struct TurnLog {
    pub events: Vec<Event>,
    pub shots: Vec<WeaponShot>,
}

impl TurnLog {
    pub fn finish(&mut self, turn: u32, units: &[UnitState; 2]) -> TurnRecord {
        TurnRecord {
            turn,
            attacker: UnitSnapshot::from(&units[0]),
            defender: UnitSnapshot::from(&units[1]),
            events: std::mem::take(&mut self.events),
            shots: std::mem::take(&mut self.shots),
        }
    }
}
