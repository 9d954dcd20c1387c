//! Movement enumeration
//!
//! Ground movement is a cheapest-path search where each hex entered costs
//! 1 MP plus terrain and elevation change. Jumps ignore terrain and reach any
//! hex within jump MP.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::board::{Board, Hex, TerrainType};
use crate::hex::{distance, facing_towards, HexCoord};
use crate::tactics::TacticalView;
use crate::unit::MoveMode;

/// Largest elevation change a walking unit can climb or drop in one hex
pub const MAX_ELEVATION_CHANGE: i32 = 2;

/// One end position a unit could reach this turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachableHex {
    pub coord: HexCoord,
    pub facing: u8,
    pub mode: MoveMode,
    pub hexes_moved: i32,
    /// Heat generated by the move itself
    pub heat: i32,
}

impl ReachableHex {
    /// Staying in place
    pub fn stand(coord: HexCoord, facing: u8) -> Self {
        Self { coord, facing, mode: MoveMode::Stand, hexes_moved: 0, heat: 0 }
    }

    fn moved(from: HexCoord, coord: HexCoord, mode: MoveMode, hexes_moved: i32) -> Self {
        Self {
            coord,
            facing: facing_towards(from, coord),
            mode,
            hexes_moved,
            heat: mode.heat(hexes_moved),
        }
    }

    /// Same position turned to face `target`
    pub fn turned_toward(self, target: HexCoord) -> Self {
        Self { facing: facing_towards(self.coord, target), ..self }
    }
}

/// MP cost to step from `from` into `to`; `None` when the climb is too steep
pub fn entry_cost(from: &Hex, to: &Hex) -> Option<i32> {
    let climb = (to.elevation - from.elevation).abs();
    if climb > MAX_ELEVATION_CHANGE {
        return None;
    }

    let woods = match to.terrain_level(TerrainType::Woods) {
        0 => 0,
        1 => 1,
        _ => 2,
    };
    let water = match to.terrain_level(TerrainType::Water) {
        0 => 0,
        1 => 1,
        _ => 3,
    };
    let rough = i32::from(to.terrain_level(TerrainType::Rough) > 0);
    let building = to.terrain_level(TerrainType::Building);

    Some(1 + woods + water + rough + building + climb)
}

/// Cheapest (cost, hexes) to every hex reachable within `budget` MP
fn ground_paths(board: &Board, start: HexCoord, budget: i32, avoid: Option<HexCoord>) -> FxHashMap<HexCoord, (i32, i32)> {
    let mut best: FxHashMap<HexCoord, (i32, i32)> = FxHashMap::default();
    if budget <= 0 || board.get(start).is_none() {
        return best;
    }

    let mut frontier = BinaryHeap::new();
    best.insert(start, (0, 0));
    frontier.push(Reverse((0, 0, start)));

    while let Some(Reverse((cost, steps, at))) = frontier.pop() {
        if best.get(&at).is_some_and(|&known| known < (cost, steps)) {
            continue;
        }
        let Some(here) = board.get(at) else { continue };

        for dir in 0..6 {
            let next = at.neighbor(dir);
            if Some(next) == avoid {
                continue;
            }
            let Some(there) = board.get(next) else { continue };
            let Some(step) = entry_cost(here, there) else { continue };

            let candidate = (cost + step, steps + 1);
            if candidate.0 > budget {
                continue;
            }
            if best.get(&next).map_or(true, |&known| candidate < known) {
                best.insert(next, candidate);
                frontier.push(Reverse((candidate.0, candidate.1, next)));
            }
        }
    }

    best.remove(&start);
    best
}

/// Every end position for this turn: standing, walking, running and jumping.
///
/// Walk destinations cost at most walk MP; run destinations are the extra
/// hexes that only running reaches. The opponent's hex is never a destination.
pub fn collect_move_options(board: &Board, view: &TacticalView) -> Vec<ReachableHex> {
    let start = view.position;
    let mut options = vec![ReachableHex::stand(start, view.facing)];

    let mut ground: Vec<(HexCoord, (i32, i32))> = ground_paths(board, start, view.run_mp.max(view.walk_mp), view.avoid)
        .into_iter()
        .collect();
    ground.sort_unstable_by_key(|(coord, _)| *coord);

    for &(coord, (cost, hexes)) in &ground {
        if cost <= view.walk_mp {
            options.push(ReachableHex::moved(start, coord, MoveMode::Walk, hexes));
        }
    }
    for &(coord, (cost, hexes)) in &ground {
        if cost > view.walk_mp && cost <= view.run_mp {
            options.push(ReachableHex::moved(start, coord, MoveMode::Run, hexes));
        }
    }

    if view.jump_mp > 0 {
        for hex in board.hexes() {
            let d = distance(start, hex.coord);
            if d == 0 || d > view.jump_mp || Some(hex.coord) == view.avoid {
                continue;
            }
            options.push(ReachableHex::moved(start, hex.coord, MoveMode::Jump, d));
        }
    }

    options
}
