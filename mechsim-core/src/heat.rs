//! Heat scale effects and heat-budgeted weapon selection
//!
//! Heat effects are looked up from the standard heat scale; weapon selection
//! weighs each extra weapon's expected damage against the expected cost of
//! the heat it adds (shutdown, ammo explosion, lost mobility).

use crate::combat::{can_weapon_fire, weapon_expected_damage};
use crate::hex::HexCoord;
use crate::unit::UnitState;

/// P(2d6 >= n) for n in 0..=12; index 0 and 1 are certain
const P_HIT: [f64; 13] = [
    1.0,
    1.0,
    1.0,
    35.0 / 36.0,
    33.0 / 36.0,
    30.0 / 36.0,
    26.0 / 36.0,
    21.0 / 36.0,
    15.0 / 36.0,
    10.0 / 36.0,
    6.0 / 36.0,
    3.0 / 36.0,
    1.0 / 36.0,
];

/// Probability that 2d6 meets or beats `target`
pub fn hit_probability(target: i32) -> f64 {
    if target <= 2 {
        1.0
    } else if target > 12 {
        0.0
    } else {
        P_HIT[target as usize]
    }
}

/// Probability that 2d6 falls short of `target`
pub fn prob_2d6_fail(target: i32) -> f64 {
    1.0 - hit_probability(target)
}

/// Target movement modifier from a movement allowance
pub fn tmm_from_mp(mp: i32) -> i32 {
    match mp {
        ..=2 => 0,
        3..=4 => 1,
        5..=6 => 2,
        7..=9 => 3,
        10..=17 => 4,
        18..=24 => 5,
        _ => 6,
    }
}

/// Target movement modifier from hexes actually moved; jumping adds one
pub fn tmm_from_hexes_moved(hexes: i32, jumped: bool) -> i32 {
    if !jumped {
        return tmm_from_mp(hexes);
    }
    match hexes {
        ..=2 => 1,
        3..=4 => 2,
        5..=6 => 3,
        7..=9 => 4,
        _ => 5,
    }
}

pub fn heat_mp_reduction(heat: i32) -> i32 {
    match heat {
        25.. => 5,
        20.. => 4,
        15.. => 3,
        10.. => 2,
        5.. => 1,
        _ => 0,
    }
}

pub fn heat_to_hit_mod(heat: i32) -> i32 {
    match heat {
        24.. => 4,
        17.. => 3,
        13.. => 2,
        8.. => 1,
        _ => 0,
    }
}

/// Target number to avoid (or recover from) shutdown; 13 means automatic
pub fn heat_shutdown_target(heat: i32) -> i32 {
    match heat {
        30.. => 13,
        26.. => 10,
        22.. => 8,
        18.. => 6,
        14.. => 4,
        _ => 0,
    }
}

pub fn heat_shutdown_prob(heat: i32) -> f64 {
    match heat_shutdown_target(heat) {
        0 => 0.0,
        13 => 1.0,
        t => prob_2d6_fail(t),
    }
}

pub fn heat_ammo_explosion_prob(heat: i32) -> f64 {
    match heat {
        28.. => prob_2d6_fail(8),
        23.. => prob_2d6_fail(6),
        19.. => prob_2d6_fail(4),
        _ => 0.0,
    }
}

/// Expected damage-equivalent cost of sitting at `heat` next turn
pub fn heat_cost_ev(heat: i32, avg_turn_damage: f64, ammo_explosion_damage: f64, walk_mp: i32, capability: f64) -> f64 {
    let mut cost = 0.0;

    let shutdown = heat_shutdown_prob(heat);
    if shutdown > 0.0 {
        cost += shutdown * avg_turn_damage * 1.5;
    }

    let ammo = heat_ammo_explosion_prob(heat);
    if ammo > 0.0 {
        cost += ammo * ammo_explosion_damage;
    }

    let mp_loss = heat_mp_reduction(heat);
    if mp_loss > 0 && walk_mp > 0 {
        let reduced = (walk_mp - mp_loss).max(0);
        let run = |walk: i32| (walk * 3 + 1) / 2;
        let tmm_loss = tmm_from_mp(run(walk_mp)) - tmm_from_mp(run(reduced));
        if tmm_loss > 0 {
            cost += tmm_loss as f64 * 0.15 * capability;
        }
    }

    cost
}

// ============================================================================
// WEAPON SELECTION
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct Candidate {
    index: usize,
    expected: f64,
    heat: i32,
}

impl Candidate {
    fn efficiency(&self) -> f64 {
        self.expected / (self.heat as f64).max(0.1)
    }
}

/// Choose which weapons to fire this turn.
///
/// `base_target` is the to-hit number before per-weapon modifiers. Returns
/// the indices into `unit.weapons` and the total heat they generate.
pub fn select_weapons_ev(unit: &UnitState, target_pos: HexCoord, dist: i32, base_target: i32) -> (Vec<usize>, i32) {
    let mut candidates: Vec<Candidate> = unit
        .weapons
        .iter()
        .enumerate()
        .filter(|(_, w)| !w.destroyed && !w.jammed)
        .filter(|(_, w)| !w.needs_ammo() || unit.has_ammo(&w.ammo_key))
        .filter(|(_, w)| can_weapon_fire(w, unit.position, unit.facing, unit.torso_twist, target_pos))
        .map(|(index, w)| Candidate {
            index,
            expected: weapon_expected_damage(w, dist, base_target + unit.weapon_to_hit_adjustment(w)),
            heat: w.effective_heat(),
        })
        .filter(|c| c.expected > 0.0)
        .collect();

    candidates.sort_by(|a, b| b.efficiency().total_cmp(&a.efficiency()));

    let avg_turn_damage: f64 = candidates.iter().map(|c| c.expected).sum();
    let ammo_damage = unit.expected_ammo_explosion_damage();
    let heat_now_mod = heat_to_hit_mod(unit.heat);

    let expected_at = |index: usize, heat_mod: i32| {
        let w = &unit.weapons[index];
        weapon_expected_damage(w, dist, base_target + unit.weapon_to_hit_adjustment(w) + heat_mod - heat_now_mod)
    };

    let mut firing = Vec::new();
    let mut heat_total = 0;

    for c in candidates {
        if c.heat == 0 {
            firing.push(c.index);
            continue;
        }

        let old_heat = (unit.heat + heat_total - unit.dissipation).max(0);
        let new_heat = (unit.heat + heat_total + c.heat - unit.dissipation).max(0);

        let marginal_cost = heat_cost_ev(new_heat, avg_turn_damage, ammo_damage, unit.walk_mp, avg_turn_damage)
            - heat_cost_ev(old_heat, avg_turn_damage, ammo_damage, unit.walk_mp, avg_turn_damage);

        let old_mod = heat_to_hit_mod(old_heat);
        let new_mod = heat_to_hit_mod(new_heat);
        let bracket_loss: f64 = if new_mod > old_mod {
            firing
                .iter()
                .map(|&i| expected_at(i, old_mod) - expected_at(i, new_mod))
                .sum()
        } else {
            0.0
        };

        let marginal_ev = expected_at(c.index, new_mod) - marginal_cost - bracket_loss;
        if marginal_ev > 0.0 {
            firing.push(c.index);
            heat_total += c.heat;
        }
    }

    (firing, heat_total)
}
