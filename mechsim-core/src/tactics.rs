//! Tactical movement AI
//!
//! Two decision modes, picked by initiative:
//!
//! - The second mover already knows where the opponent stands and simply
//!   maximises `position_score` against that position.
//! - The first mover does not, so it runs a 1-ply minimax: for each of its
//!   options it assumes the opponent's best reply and keeps the option whose
//!   worst case is best.

use crate::board::{Board, TerrainType};
use crate::combat::{can_weapon_fire, weapon_expected_damage};
use crate::heat::tmm_from_hexes_moved;
use crate::hex::{arc_of, best_torso_twist, distance, Arc, HexCoord};
use crate::los::{LosCache, LosResult};
use crate::movement::{collect_move_options, ReachableHex};
use crate::unit::{MoveMode, UnitState, GUNNERY_SKILL};

/// Options kept per side before the minimax cross product
pub const MINIMAX_CANDIDATES: usize = 40;

/// Weight of the opponent's own score in the first mover's net score
const OPPONENT_SCORE_WEIGHT: f64 = 0.3;

/// What the AI knows about one unit when planning movement
#[derive(Clone, Copy, Debug)]
pub struct TacticalView<'a> {
    pub unit: &'a UnitState,
    pub position: HexCoord,
    pub facing: u8,
    pub walk_mp: i32,
    pub run_mp: i32,
    pub jump_mp: i32,
    pub heat: i32,
    /// Hex the unit may not end in (the opponent's)
    pub avoid: Option<HexCoord>,
}

impl<'a> TacticalView<'a> {
    /// Current movement allowance; prone or shut-down units cannot move
    pub fn new(unit: &'a UnitState) -> Self {
        let grounded = unit.prone || unit.shutdown;
        Self {
            unit,
            position: unit.position,
            facing: unit.facing,
            walk_mp: if grounded { 0 } else { unit.effective_walk_mp() },
            run_mp: if grounded { 0 } else { unit.effective_run_mp() },
            jump_mp: if grounded { 0 } else { unit.jump_mp },
            heat: unit.heat,
            avoid: None,
        }
    }

    pub fn avoiding(mut self, hex: HexCoord) -> Self {
        self.avoid = Some(hex);
        self
    }
}

/// Which side of the initiative a unit is on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveRole {
    /// Lost initiative: moves blind
    FirstMover,
    /// Won initiative: sees the opponent's move
    SecondMover,
}

// ============================================================================
// SCORING
// ============================================================================

/// Expected damage `view` deals from `from` to a unit at `target`
pub fn expected_damage(view: &TacticalView, from: &ReachableHex, target: HexCoord, los: &LosResult) -> f64 {
    let dist = distance(from.coord, target);
    if dist == 0 {
        return 0.0;
    }
    let twist = best_torso_twist(from.coord, from.facing, target);
    let base = GUNNERY_SKILL + from.mode.attacker_modifier() + los.to_hit_mod();
    let unit = view.unit;

    unit.weapons
        .iter()
        .filter(|w| !w.destroyed && !w.jammed)
        .filter(|w| !w.needs_ammo() || unit.has_ammo(&w.ammo_key))
        .filter(|w| can_weapon_fire(w, from.coord, from.facing, twist, target))
        .map(|w| weapon_expected_damage(w, dist, base + unit.weapon_to_hit_adjustment(w)))
        .sum()
}

/// Score one (my position, opponent position) pairing from my side.
///
/// The opponent's fire is estimated as if it walked this turn.
pub fn position_score(
    board: &Board,
    me: &TacticalView,
    mine: &ReachableHex,
    op: &TacticalView,
    op_pos: HexCoord,
    op_facing: u8,
    cache: &mut LosCache,
) -> f64 {
    let dist = distance(mine.coord, op_pos);

    let los = cache.check(board, mine.coord, op_pos);
    let my_damage = if los.visible { expected_damage(me, mine, op_pos, &los) } else { 0.0 };

    let op_los = cache.check(board, op_pos, mine.coord);
    let op_damage = if op_los.visible {
        let theirs = ReachableHex { coord: op_pos, facing: op_facing, mode: MoveMode::Walk, hexes_moved: 0, heat: 0 };
        expected_damage(op, &theirs, mine.coord, &op_los)
    } else {
        0.0
    };

    let rear_shot = if arc_of(op_pos, op_facing, mine.coord) == Arc::Rear { my_damage * 0.6 } else { 0.0 };
    let rear_exposure = if arc_of(mine.coord, mine.facing, op_pos) == Arc::Rear { op_damage * 0.6 } else { 0.0 };

    let mut cover = board
        .get(mine.coord)
        .map(|h| h.terrain_level(TerrainType::Woods) as f64 * 3.5)
        .unwrap_or(0.0);

    let elevation = match los.elevation_mod {
        m if m < 0 => 2.5,
        m if m > 0 => -1.5,
        _ => 0.0,
    };

    let tmm = tmm_from_hexes_moved(mine.hexes_moved, mine.mode == MoveMode::Jump) as f64 * 2.5;

    let mut heat_penalty = 0.0;
    if me.heat > 8 {
        cover *= 1.5;
        if mine.mode == MoveMode::Run {
            heat_penalty = 3.0;
        }
    }

    let asymmetry = match (los.visible, op_los.visible) {
        (true, false) => my_damage * 0.5,
        (false, true) => -op_damage * 0.5,
        _ => 0.0,
    };

    if !los.visible {
        return -(dist as f64) * 2.0 + cover;
    }
    if my_damage == 0.0 {
        return -(dist as f64) + cover + tmm;
    }

    my_damage - op_damage * 0.7 + rear_shot - rear_exposure + cover + elevation + tmm + asymmetry - heat_penalty
}

// ============================================================================
// DECISIONS
// ============================================================================

/// Best option against a known opponent position, facing the opponent
pub fn choose_reactive(
    board: &Board,
    me: &TacticalView,
    options: &[ReachableHex],
    op: &TacticalView,
    op_pos: HexCoord,
    op_facing: u8,
) -> ReachableHex {
    let mut cache = LosCache::new();
    let mut best = ReachableHex::stand(me.position, me.facing);
    let mut best_score = f64::NEG_INFINITY;

    for option in options {
        let faced = option.turned_toward(op_pos);
        let score = position_score(board, me, &faced, op, op_pos, op_facing, &mut cache);
        if score > best_score {
            best_score = score;
            best = faced;
        }
    }
    best
}

/// Keep the `n` options that score best against the opponent standing still
fn preselect(
    board: &Board,
    me: &TacticalView,
    options: &[ReachableHex],
    op: &TacticalView,
    n: usize,
    cache: &mut LosCache,
) -> Vec<ReachableHex> {
    if options.len() <= n {
        return options.to_vec();
    }
    let mut scored: Vec<(f64, ReachableHex)> = options
        .iter()
        .map(|o| {
            let faced = o.turned_toward(op.position);
            (position_score(board, me, &faced, op, op.position, op.facing, cache), *o)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(n).map(|(_, o)| o).collect()
}

/// 1-ply minimax over my options and the opponent's replies.
///
/// Net score for a pairing is `mine - 0.3 * theirs`; each option is valued
/// at its worst-case reply.
pub fn choose_counter_position(
    board: &Board,
    me: &TacticalView,
    my_options: &[ReachableHex],
    op: &TacticalView,
    op_options: &[ReachableHex],
) -> ReachableHex {
    let mut cache = LosCache::new();
    let mine = preselect(board, me, my_options, op, MINIMAX_CANDIDATES, &mut cache);
    let theirs = preselect(board, op, op_options, me, MINIMAX_CANDIDATES, &mut cache);

    let mut best = ReachableHex::stand(me.position, me.facing);
    let mut best_score = f64::NEG_INFINITY;

    for option in &mine {
        let my_hex = option.turned_toward(op.position);

        let mut worst = f64::INFINITY;
        for reply in &theirs {
            let op_hex = reply.turned_toward(my_hex.coord);
            let my_score = position_score(board, me, &my_hex, op, op_hex.coord, op_hex.facing, &mut cache);
            let op_score = position_score(board, op, &op_hex, me, my_hex.coord, my_hex.facing, &mut cache);
            worst = worst.min(my_score - op_score * OPPONENT_SCORE_WEIGHT);
        }
        if theirs.is_empty() {
            worst = position_score(board, me, &my_hex, op, op.position, op.facing, &mut cache);
        }

        if worst > best_score {
            best_score = worst;
            best = my_hex;
        }
    }
    best
}

/// Pick this turn's movement for `me`.
///
/// A second mover reacts to `op_pos`/`op_facing`; a first mover plans
/// against `op_options`.
pub fn choose_movement(
    board: &Board,
    me: &TacticalView,
    op: &TacticalView,
    role: MoveRole,
    op_pos: HexCoord,
    op_facing: u8,
    op_options: &[ReachableHex],
) -> ReachableHex {
    let options = collect_move_options(board, me);
    match role {
        MoveRole::SecondMover => choose_reactive(board, me, &options, op, op_pos, op_facing),
        MoveRole::FirstMover => choose_counter_position(board, me, &options, op, op_options),
    }
}
