//! Weapon fire resolution
//!
//! Each `WeaponCategory` has its own resolution rule: how many to-hit rolls,
//! whether a cluster roll decides the number of hits, and how damage is
//! split into hit-location groups.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dice::{roll_2d6, roll_d6};
use crate::heat::hit_probability;
use crate::hex::{arc_of, normalize_facing, Arc, HexCoord};
use crate::unit::{hit_location, Artemis, Equipment, UnitState};
use crate::weapon::{Weapon, WeaponCategory};

// ============================================================================
// CLUSTER TABLE
// ============================================================================

/// Rack-size columns of the cluster hits table
pub const CLUSTER_RACK_SIZES: [i32; 13] = [2, 3, 4, 5, 6, 8, 9, 10, 12, 15, 20, 30, 40];

/// Hits by 2d6 roll (row, roll - 2) and rack column
pub const CLUSTER_TABLE: [[i32; 13]; 11] = [
    [1, 1, 1, 1, 2, 3, 3, 3, 4, 5, 6, 10, 12],     // 2
    [1, 1, 2, 2, 2, 3, 3, 3, 4, 5, 6, 10, 12],     // 3
    [1, 1, 2, 2, 3, 4, 4, 4, 5, 6, 9, 12, 18],     // 4
    [1, 2, 2, 3, 3, 4, 5, 6, 8, 9, 12, 18, 24],    // 5
    [1, 2, 2, 3, 4, 5, 5, 6, 8, 9, 12, 18, 24],    // 6
    [1, 2, 3, 3, 4, 5, 5, 6, 8, 9, 12, 18, 24],    // 7
    [2, 2, 3, 3, 4, 5, 5, 6, 8, 9, 12, 18, 24],    // 8
    [2, 2, 3, 4, 5, 6, 7, 8, 10, 12, 16, 24, 32],  // 9
    [2, 3, 3, 4, 5, 6, 7, 8, 10, 12, 16, 24, 32],  // 10
    [2, 3, 4, 5, 6, 8, 9, 10, 12, 15, 20, 30, 40], // 11
    [2, 3, 4, 5, 6, 8, 9, 10, 12, 15, 20, 30, 40], // 12
];

/// 2d6 outcome weights for rolls 2..=12
const ROLL_WEIGHTS: [i32; 11] = [1, 2, 3, 4, 5, 6, 5, 4, 3, 2, 1];

/// Column for the largest listed rack not above `rack_size`
fn cluster_column(rack_size: i32) -> usize {
    CLUSTER_RACK_SIZES
        .iter()
        .rposition(|&r| r <= rack_size)
        .unwrap_or(0)
}

/// Table lookup; the roll is clamped into 2..=12
pub fn cluster_lookup(roll: i32, rack_size: i32) -> i32 {
    CLUSTER_TABLE[(roll.clamp(2, 12) - 2) as usize][cluster_column(rack_size)]
}

/// Roll on the cluster table with a roll modifier
pub fn cluster_hits<R: Rng + ?Sized>(rack_size: i32, bonus: i32, rng: &mut R) -> i32 {
    cluster_lookup(roll_2d6(rng) + bonus, rack_size)
}

/// Mean hits on the cluster table for a rack size
pub fn cluster_average(rack_size: i32) -> f64 {
    let col = cluster_column(rack_size);
    let weighted: i32 = CLUSTER_TABLE
        .iter()
        .zip(ROLL_WEIGHTS)
        .map(|(row, w)| row[col] * w)
        .sum();
    weighted as f64 / 36.0
}

// ============================================================================
// MODIFIERS
// ============================================================================

pub fn artemis_bonus(equipment: &Equipment) -> i32 {
    match equipment.artemis {
        Artemis::V => 3,
        Artemis::Iv => 2,
        Artemis::None => 0,
    }
}

/// Range bracket modifier; `None` when the target is out of range
pub fn range_modifier(w: &Weapon, dist: i32) -> Option<i32> {
    if w.category == WeaponCategory::ArrowIv {
        return (dist >= w.min_range && dist <= w.long_range).then_some(0);
    }
    if w.long_range == 0 || dist > w.long_range {
        None
    } else if dist <= w.short_range {
        Some(0)
    } else if dist <= w.medium_range {
        Some(2)
    } else {
        Some(4)
    }
}

/// Penalty for firing inside minimum range
pub fn min_range_modifier(w: &Weapon, dist: i32) -> i32 {
    if w.min_range > 0 && dist <= w.min_range {
        w.min_range - dist + 1
    } else {
        0
    }
}

fn vsp_to_hit_mod(w: &Weapon, dist: i32) -> i32 {
    if dist <= w.short_range {
        -3
    } else if dist <= w.medium_range {
        -2
    } else {
        -1
    }
}

fn vsp_damage(w: &Weapon, dist: i32) -> i32 {
    let (medium, long) = match w.damage {
        5 => (4, 3),
        9 => (7, 5),
        11 => (9, 7),
        d => (d, d),
    };
    if dist <= w.short_range {
        w.damage
    } else if dist <= w.medium_range {
        medium
    } else {
        long
    }
}

fn atm_damage_per_missile(dist: i32) -> i32 {
    match dist {
        ..=9 => 3,
        10..=15 => 2,
        _ => 1,
    }
}

/// Can a weapon bear on `target` given facing and torso twist?
///
/// Head and torso mounts need the front arc; arm mounts also cover the sides.
pub fn can_weapon_fire(w: &Weapon, pos: HexCoord, facing: u8, torso_twist: i8, target: HexCoord) -> bool {
    let effective = normalize_facing(facing as i32 + torso_twist as i32);
    let arc = arc_of(pos, effective, target);
    if w.location.is_arm() {
        arc != Arc::Rear
    } else {
        arc == Arc::Front
    }
}

impl UnitState {
    /// Unit-level to-hit adjustments for one weapon: actuator damage and fire control
    pub fn weapon_to_hit_adjustment(&self, w: &Weapon) -> i32 {
        let mut m = self.arm_actuator_hits[w.location.index()];
        if self.equipment.artemis == Artemis::V && w.category.uses_artemis() {
            m -= 1;
        }
        if self.equipment.targeting_computer && w.category.is_direct_fire() {
            m -= 1;
        }
        m
    }

    /// Anti-missile fire against an incoming salvo; at most once per turn
    pub fn ams_intercept<R: Rng + ?Sized>(&mut self, hits: i32, rng: &mut R) -> i32 {
        if self.ams_used || !(self.equipment.ams || self.equipment.laser_ams) {
            return hits;
        }
        if !self.equipment.laser_ams && !self.consume_ammo("ams") {
            return hits;
        }
        self.ams_used = true;
        let shot_down = roll_d6(rng);
        tracing::debug!("{}: AMS shoots down {} missiles", self.name, shot_down);
        (hits - shot_down).max(0)
    }
}

// ============================================================================
// EXPECTED DAMAGE
// ============================================================================

/// Expected damage of one weapon at `dist`.
///
/// `target` is the to-hit number before the weapon's own range and
/// minimum-range modifiers.
pub fn weapon_expected_damage(w: &Weapon, dist: i32, target: i32) -> f64 {
    if w.category == WeaponCategory::ArrowIv {
        if dist < w.min_range || dist > w.long_range {
            return 0.0;
        }
        let p = hit_probability(target + w.to_hit_mod);
        return w.rack_size as f64 * p + (w.rack_size - 10) as f64 / 6.0 * (1.0 - p);
    }

    let Some(range_mod) = range_modifier(w, dist) else {
        return 0.0;
    };
    let t = target + w.to_hit_mod + range_mod + min_range_modifier(w, dist);
    let p = hit_probability(t);
    let rack = w.rack_size as f64;
    let damage = w.damage as f64;
    let jam = 1.0 / 36.0;

    match w.category {
        WeaponCategory::StreakSrm => rack * 2.0 * p,
        WeaponCategory::StreakLrm => rack * p,
        WeaponCategory::UltraAc => damage * 2.0 * p * (1.0 - jam),
        WeaponCategory::RotaryAc => damage * cluster_average(6) * p * (1.0 - jam),
        WeaponCategory::RocketLauncher => rack * p * 0.58,
        WeaponCategory::PlasmaCannon => 3.5 * p,
        WeaponCategory::PlasmaRifle => (damage + 3.5) * p,
        WeaponCategory::Lbx => rack * p * 0.7,
        WeaponCategory::Lrm | WeaponCategory::Mrm | WeaponCategory::Hag => rack * p * 0.58,
        WeaponCategory::Srm => rack * 2.0 * p * 0.58,
        WeaponCategory::Atm => atm_expected(w, dist, target),
        WeaponCategory::Mml => mml_expected(w, dist, target),
        WeaponCategory::Vsp => vsp_damage(w, dist) as f64 * hit_probability(t + vsp_to_hit_mod(w, dist)),
        WeaponCategory::Standard | WeaponCategory::ArrowIv => damage * p,
    }
}

/// One ammo mode of a switchable launcher
struct AmmoMode {
    min: i32,
    max: i32,
    short: i32,
    medium: i32,
    damage_per_missile: f64,
}

impl AmmoMode {
    fn expected(&self, w: &Weapon, dist: i32, target: i32) -> f64 {
        if dist < self.min.max(0) || dist > self.max {
            return 0.0;
        }
        let range_mod = if dist <= self.short {
            0
        } else if dist <= self.medium {
            2
        } else {
            4
        };
        let min_mod = if self.min > 0 && dist <= self.min { self.min - dist + 1 } else { 0 };
        let p = hit_probability(target + w.to_hit_mod + range_mod + min_mod);
        w.rack_size as f64 * self.damage_per_missile * p * 0.58
    }
}

/// Best of extended-range, high-explosive and standard ammo
fn atm_expected(w: &Weapon, dist: i32, target: i32) -> f64 {
    [
        AmmoMode { min: 4, max: 15, short: 5, medium: 10, damage_per_missile: 2.0 },
        AmmoMode { min: 0, max: 9, short: 3, medium: 6, damage_per_missile: 3.0 },
        AmmoMode { min: 4, max: 27, short: 9, medium: 18, damage_per_missile: 1.0 },
    ]
    .iter()
    .map(|m| m.expected(w, dist, target))
    .fold(0.0, f64::max)
}

/// Best of LRM and SRM ammo
fn mml_expected(w: &Weapon, dist: i32, target: i32) -> f64 {
    [
        AmmoMode { min: 6, max: 21, short: 7, medium: 14, damage_per_missile: 1.0 },
        AmmoMode { min: 0, max: 9, short: 3, medium: 6, damage_per_missile: 2.0 },
    ]
    .iter()
    .map(|m| m.expected(w, dist, target))
    .fold(0.0, f64::max)
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Outcome of one weapon's fire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireResult {
    pub hit: bool,
    pub damage: i32,
    /// External heat added to the target
    pub heat_applied: i32,
    pub jammed: bool,
}

/// Damage to one rolled location; rear armor only applies to torsos
fn hit_one<R: Rng + ?Sized>(defender: &mut UnitState, damage: i32, is_rear: bool, rng: &mut R) -> i32 {
    let loc = hit_location(roll_2d6(rng), is_rear);
    defender.apply_damage(loc, damage, is_rear && loc.is_torso(), rng);
    damage
}

/// Split `total` into groups of `size`, each to its own location
fn hit_grouped<R: Rng + ?Sized>(defender: &mut UnitState, total: i32, size: i32, is_rear: bool, rng: &mut R) -> i32 {
    let mut remaining = total;
    let mut dealt = 0;
    while remaining > 0 {
        let group = remaining.min(size);
        dealt += hit_one(defender, group, is_rear, rng);
        remaining -= group;
    }
    dealt
}

/// `count` separate hits of `each` damage
fn hit_each<R: Rng + ?Sized>(defender: &mut UnitState, count: i32, each: i32, is_rear: bool, rng: &mut R) -> i32 {
    (0..count).map(|_| hit_one(defender, each, is_rear, rng)).sum()
}

/// Resolve one weapon firing at `defender`.
///
/// `target` is the full to-hit number including range modifiers; values
/// below 2 always hit, values above 12 never do.
pub fn resolve_weapon_fire<R: Rng + ?Sized>(
    w: &mut Weapon,
    attacker: &Equipment,
    target: i32,
    dist: i32,
    is_rear: bool,
    defender: &mut UnitState,
    rng: &mut R,
) -> FireResult {
    let target = target.max(2);
    let mut out = FireResult::default();

    let is_missile = w.category.is_missile();
    let missiles = |defender: &mut UnitState, hits: i32, rng: &mut R| {
        if is_missile {
            defender.ams_intercept(hits, rng)
        } else {
            hits
        }
    };

    match w.category {
        WeaponCategory::UltraAc => {
            for shot in 0..2 {
                let roll = roll_2d6(rng);
                if roll >= target {
                    out.hit = true;
                    out.damage += hit_one(defender, w.damage, is_rear, rng);
                }
                if shot == 1 && roll == 2 {
                    out.jammed = true;
                }
            }
        }
        WeaponCategory::RotaryAc => {
            let roll = roll_2d6(rng);
            if roll >= target {
                out.hit = true;
                let hits = cluster_hits(6, 0, rng);
                out.damage = hit_each(defender, hits, w.damage, is_rear, rng);
            }
            if roll == 2 {
                out.jammed = true;
            }
        }
        WeaponCategory::ArrowIv => {
            if roll_2d6(rng) >= target {
                out.hit = true;
                out.damage = hit_grouped(defender, w.rack_size, 5, false, rng);
            } else if roll_d6(rng) == 1 {
                out.damage = hit_grouped(defender, 10, 5, false, rng);
            }
        }
        WeaponCategory::Vsp => {
            if roll_2d6(rng) >= (target + vsp_to_hit_mod(w, dist)).max(2) {
                out.hit = true;
                out.damage = hit_one(defender, vsp_damage(w, dist), is_rear, rng);
            }
        }
        category => {
            if roll_2d6(rng) < target {
                if category == WeaponCategory::RocketLauncher {
                    w.destroyed = true;
                }
                return out;
            }
            out.hit = true;
            let artemis = if category.uses_artemis() { artemis_bonus(attacker) } else { 0 };

            match category {
                WeaponCategory::StreakSrm => {
                    let hits = missiles(defender, w.rack_size, rng);
                    out.damage = hit_each(defender, hits, 2, is_rear, rng);
                }
                WeaponCategory::StreakLrm => {
                    let hits = missiles(defender, w.rack_size, rng);
                    out.damage = hit_grouped(defender, hits, 5, is_rear, rng);
                }
                WeaponCategory::RocketLauncher => {
                    w.destroyed = true;
                    let hits = missiles(defender, cluster_hits(w.rack_size, 0, rng), rng);
                    out.damage = hit_grouped(defender, hits, 5, is_rear, rng);
                }
                WeaponCategory::Lbx => {
                    let hits = cluster_hits(w.rack_size, 0, rng);
                    out.damage = hit_each(defender, hits, 1, is_rear, rng);
                }
                WeaponCategory::Lrm => {
                    let hits = missiles(defender, cluster_hits(w.rack_size, artemis, rng), rng);
                    out.damage = hit_grouped(defender, hits, 5, is_rear, rng);
                }
                WeaponCategory::Srm => {
                    let hits = missiles(defender, cluster_hits(w.rack_size, artemis, rng), rng);
                    out.damage = hit_each(defender, hits, 2, is_rear, rng);
                }
                WeaponCategory::Mrm => {
                    let apollo = if attacker.apollo { -1 } else { 0 };
                    let hits = missiles(defender, cluster_hits(w.rack_size, apollo, rng), rng);
                    out.damage = hit_grouped(defender, hits, 5, is_rear, rng);
                }
                WeaponCategory::Hag => {
                    let bonus = if dist <= w.short_range {
                        2
                    } else if dist > w.medium_range {
                        -2
                    } else {
                        0
                    };
                    let hits = cluster_hits(w.rack_size, bonus, rng);
                    out.damage = hit_grouped(defender, hits, 5, is_rear, rng);
                }
                WeaponCategory::Atm => {
                    let hits = missiles(defender, cluster_hits(w.rack_size, artemis, rng), rng);
                    out.damage = hit_grouped(defender, hits * atm_damage_per_missile(dist), 5, is_rear, rng);
                }
                WeaponCategory::Mml => {
                    let hits = missiles(defender, cluster_hits(w.rack_size, artemis, rng), rng);
                    out.damage = if dist <= 9 {
                        hit_each(defender, hits, 2, is_rear, rng)
                    } else {
                        hit_grouped(defender, hits, 5, is_rear, rng)
                    };
                }
                WeaponCategory::PlasmaCannon => {
                    out.heat_applied = roll_2d6(rng);
                }
                WeaponCategory::PlasmaRifle => {
                    out.damage = hit_one(defender, w.damage, is_rear, rng);
                    out.heat_applied = roll_2d6(rng);
                }
                _ => {
                    out.damage = hit_one(defender, w.damage, is_rear, rng);
                }
            }
        }
    }

    if out.jammed {
        w.jammed = true;
    }
    defender.external_heat += out.heat_applied;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::hunchback_4p;
    use crate::unit::Location;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn laser() -> Weapon {
        Weapon::new("Medium Laser", Location::RightTorso, 5, 3, (0, 3, 6, 9))
    }

    fn lrm20() -> Weapon {
        Weapon::new("LRM 20", Location::LeftTorso, 1, 6, (6, 7, 14, 21))
            .with_rack(20)
            .with_ammo("IS Ammo LRM-20")
    }

    fn total_points(u: &UnitState) -> i32 {
        u.armor.iter().sum::<i32>() + u.rear_armor.iter().sum::<i32>() + u.structure.iter().sum::<i32>()
    }

    #[test]
    fn test_cluster_table_values() {
        assert_eq!(cluster_lookup(7, 10), 6);
        assert_eq!(cluster_lookup(12, 20), 20);
        assert_eq!(cluster_lookup(2, 2), 1);
        assert_eq!(cluster_lookup(11, 40), 40);
        // Off-table rack sizes use the largest column not above them
        assert_eq!(cluster_lookup(7, 7), cluster_lookup(7, 6));
        assert_eq!(cluster_lookup(7, 1), cluster_lookup(7, 2));
        // Rolls clamp
        assert_eq!(cluster_lookup(15, 10), 10);
        assert_eq!(cluster_lookup(-1, 10), 3);
    }

    #[test]
    fn test_cluster_average() {
        let avg2 = cluster_average(2);
        assert!((avg2 - 51.0 / 36.0).abs() < 1e-9);
        assert!(cluster_average(20) > cluster_average(10));
    }

    #[test]
    fn test_range_modifier() {
        let w = laser();
        assert_eq!(range_modifier(&w, 3), Some(0));
        assert_eq!(range_modifier(&w, 4), Some(2));
        assert_eq!(range_modifier(&w, 9), Some(4));
        assert_eq!(range_modifier(&w, 10), None);

        let l = lrm20();
        assert_eq!(min_range_modifier(&l, 3), 4);
        assert_eq!(min_range_modifier(&l, 6), 1);
        assert_eq!(min_range_modifier(&l, 7), 0);
    }

    #[test]
    fn test_arc_constraints() {
        let pos = HexCoord::new(5, 5);
        let arm = Weapon::new("Medium Laser", Location::LeftArm, 5, 3, (0, 3, 6, 9));
        let torso = laser();
        let side = pos.neighbor(2);
        assert!(can_weapon_fire(&arm, pos, 0, 0, side));
        assert!(!can_weapon_fire(&torso, pos, 0, 0, side));
        assert!(can_weapon_fire(&torso, pos, 0, 1, side));
        let behind = HexCoord::new(5, 9);
        assert!(!can_weapon_fire(&arm, pos, 0, 0, behind));
    }

    #[test]
    fn test_expected_damage() {
        let w = laser();
        assert!((weapon_expected_damage(&w, 3, 7) - 5.0 * 21.0 / 36.0).abs() < 1e-9);
        assert_eq!(weapon_expected_damage(&w, 10, 2), 0.0);
        assert_eq!(weapon_expected_damage(&w, 3, 13), 0.0);

        let l = lrm20();
        let inside = weapon_expected_damage(&l, 3, 4);
        let outside = weapon_expected_damage(&l, 7, 4);
        assert!(inside < outside, "minimum range hurts");
    }

    #[test]
    fn test_standard_hit_and_miss() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut w = laser();
        let mut target = hunchback_4p();
        let before = total_points(&target);
        let r = resolve_weapon_fire(&mut w, &Equipment::default(), -5, 3, false, &mut target, &mut rng);
        assert!(r.hit);
        assert_eq!(r.damage, 5);
        assert_eq!(before - total_points(&target), 5);

        let r = resolve_weapon_fire(&mut w, &Equipment::default(), 13, 3, false, &mut target, &mut rng);
        assert!(!r.hit);
        assert_eq!(r.damage, 0);
    }

    #[test]
    fn test_streak_all_or_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut w = Weapon::new("Streak SRM 6", Location::RightArm, 2, 4, (0, 3, 6, 9))
            .with_rack(6)
            .with_ammo("IS Ammo Streak SRM");
        let mut target = hunchback_4p();
        let r = resolve_weapon_fire(&mut w, &Equipment::default(), 2, 3, false, &mut target, &mut rng);
        assert_eq!(r.damage, 12);
    }

    #[test]
    fn test_ams_once_per_turn() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut target = hunchback_4p();
        target.equipment.laser_ams = true;
        let first = target.ams_intercept(20, &mut rng);
        assert!((14..=19).contains(&first));
        assert!(target.ams_used);
        assert_eq!(target.ams_intercept(20, &mut rng), 20);

        target.ams_used = false;
        assert_eq!(target.ams_intercept(0, &mut rng), 0, "never below zero");
    }

    #[test]
    fn test_ams_needs_ammo() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut target = hunchback_4p();
        target.equipment.ams = true;
        assert_eq!(target.ams_intercept(10, &mut rng), 10);
        assert!(!target.ams_used);

        target.ammo.insert("ams".to_string(), 1);
        assert!(target.ams_intercept(10, &mut rng) < 10);
        assert_eq!(target.ammo["ams"], 0);
    }

    #[test]
    fn test_plasma_cannon_heats_target() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut w = Weapon::new("Plasma Cannon", Location::RightTorso, 0, 7, (0, 6, 12, 18));
        let mut target = hunchback_4p();
        let before = total_points(&target);
        let r = resolve_weapon_fire(&mut w, &Equipment::default(), 2, 3, false, &mut target, &mut rng);
        assert_eq!(r.damage, 0);
        assert!((2..=12).contains(&r.heat_applied));
        assert_eq!(target.external_heat, r.heat_applied);
        assert_eq!(total_points(&target), before);
    }

    #[test]
    fn test_rocket_launcher_is_one_shot() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut w = Weapon::new("Rocket Launcher 10", Location::RightTorso, 1, 3, (0, 5, 11, 18)).with_rack(10);
        let mut target = hunchback_4p();
        resolve_weapon_fire(&mut w, &Equipment::default(), 13, 3, false, &mut target, &mut rng);
        assert!(w.destroyed);
    }

    #[test]
    fn test_rotary_jam_only_on_natural_two() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..200 {
            let mut w = Weapon::new("Rotary AC/5", Location::RightTorso, 5, 1, (0, 5, 10, 15));
            let mut target = hunchback_4p();
            let r = resolve_weapon_fire(&mut w, &Equipment::default(), 2, 3, false, &mut target, &mut rng);
            assert_eq!(w.jammed, r.jammed);
            if r.hit {
                assert_eq!(r.damage % 5, 0);
                assert!(r.damage <= 30);
            }
        }
    }

    /// Cluster hits a sure-hit shot from `rng` will roll: one to-hit roll, then the cluster roll
    fn next_cluster(rng: &ChaCha8Rng, rack: i32, bonus: i32) -> i32 {
        let mut preview = rng.clone();
        roll_2d6(&mut preview);
        cluster_lookup(roll_2d6(&mut preview) + bonus, rack)
    }

    #[test]
    fn test_ultra_jams_only_on_second_natural_two() {
        let (mut first_two, mut second_two) = (0, 0);
        for seed in 0..3000 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut preview = rng.clone();
            let (first, second) = (roll_2d6(&mut preview), roll_2d6(&mut preview));

            let mut w = Weapon::new("Ultra AC/5", Location::RightTorso, 5, 1, (0, 6, 13, 20));
            let mut target = hunchback_4p();
            // Never hits, so the only dice consumed are the two shots
            let r = resolve_weapon_fire(&mut w, &Equipment::default(), 13, 3, false, &mut target, &mut rng);

            assert!(!r.hit);
            assert_eq!(r.jammed, second == 2, "seed {} rolled {} then {}", seed, first, second);
            assert_eq!(w.jammed, r.jammed);
            if first == 2 && second != 2 {
                first_two += 1;
            }
            if second == 2 {
                second_two += 1;
            }
        }
        assert!(first_two > 0 && second_two > 0);
    }

    #[test]
    fn test_ultra_fires_two_shots() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut w = Weapon::new("Ultra AC/5", Location::RightTorso, 5, 1, (0, 6, 13, 20));
        let mut target = hunchback_4p();
        let r = resolve_weapon_fire(&mut w, &Equipment::default(), 2, 3, false, &mut target, &mut rng);
        assert!(r.hit);
        assert_eq!(r.damage, 10);
    }

    #[test]
    fn test_atm_damage_falls_with_range() {
        assert_eq!(atm_damage_per_missile(1), 3);
        assert_eq!(atm_damage_per_missile(9), 3);
        assert_eq!(atm_damage_per_missile(10), 2);
        assert_eq!(atm_damage_per_missile(15), 2);
        assert_eq!(atm_damage_per_missile(16), 1);

        for (seed, dist, per_missile) in [(20, 5, 3), (21, 12, 2), (22, 18, 1)] {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let hits = next_cluster(&rng, 12, 0);
            let mut w = Weapon::new("ATM 12", Location::RightTorso, 2, 8, (4, 5, 10, 15)).with_rack(12);
            let mut target = hunchback_4p();
            let r = resolve_weapon_fire(&mut w, &Equipment::default(), 2, dist, false, &mut target, &mut rng);
            assert_eq!(r.damage, hits * per_missile, "dist {}", dist);
        }
    }

    #[test]
    fn test_mml_switches_mode_at_nine_hexes() {
        for (seed, dist, per_missile) in [(30, 9, 2), (31, 10, 1)] {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let hits = next_cluster(&rng, 7, 0);
            let mut w = Weapon::new("MML 7", Location::LeftTorso, 1, 4, (6, 7, 14, 21)).with_rack(7);
            let mut target = hunchback_4p();
            let before = total_points(&target);
            let r = resolve_weapon_fire(&mut w, &Equipment::default(), 2, dist, false, &mut target, &mut rng);
            assert_eq!(r.damage, hits * per_missile, "dist {}", dist);
            assert_eq!(before - total_points(&target), r.damage);
        }
    }

    #[test]
    fn test_hag_cluster_bonus_by_range() {
        // short 2, medium 4: +2 inside short, -2 past medium
        for (seed, dist, bonus) in [(40, 2, 2), (41, 4, 0), (42, 7, -2)] {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let hits = next_cluster(&rng, 30, bonus);
            let mut w = Weapon::new("HAG 30", Location::RightTorso, 1, 6, (2, 2, 4, 8)).with_rack(30);
            let mut target = hunchback_4p();
            let r = resolve_weapon_fire(&mut w, &Equipment::default(), 2, dist, false, &mut target, &mut rng);
            assert_eq!(r.damage, hits, "dist {}", dist);
        }
    }

    #[test]
    fn test_lbx_cluster_one_point_pellets() {
        let mut rng = ChaCha8Rng::seed_from_u64(50);
        let hits = next_cluster(&rng, 10, 0);
        let mut w = Weapon::new("LB 10-X AC", Location::RightTorso, 10, 2, (0, 6, 12, 18)).with_rack(10);
        let mut target = hunchback_4p();
        let before = total_points(&target);
        let r = resolve_weapon_fire(&mut w, &Equipment::default(), 2, 3, false, &mut target, &mut rng);
        assert_eq!(r.damage, hits);
        assert_eq!(before - total_points(&target), hits);
    }

    #[test]
    fn test_arrow_iv_groups() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let mut w = Weapon::new("Arrow IV", Location::RightTorso, 20, 10, (0, 1, 2, 8)).with_rack(20);
        let mut target = hunchback_4p();
        let r = resolve_weapon_fire(&mut w, &Equipment::default(), 2, 5, false, &mut target, &mut rng);
        assert_eq!(r.damage, 20);
    }

    #[test]
    fn test_unit_adjustments() {
        let mut unit = hunchback_4p();
        let arm = Weapon::new("Medium Laser", Location::LeftArm, 5, 3, (0, 3, 6, 9));
        assert_eq!(unit.weapon_to_hit_adjustment(&arm), 0);
        unit.arm_actuator_hits[Location::LeftArm.index()] = 2;
        unit.equipment.targeting_computer = true;
        assert_eq!(unit.weapon_to_hit_adjustment(&arm), 1);

        unit.equipment.artemis = Artemis::V;
        assert_eq!(unit.weapon_to_hit_adjustment(&lrm20()), -1);
    }
}
