//! Engagement engine - one attacker against one defender
//!
//! Each turn runs the same fixed sequence of phases: start-of-turn checks,
//! shutdown recovery, standing up, initiative, movement, fire, physical
//! attacks, heat. The engagement ends as soon as either unit is destroyed,
//! the defender is forced to withdraw, or the turn cap is reached.

use std::ops::ControlFlow;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::combat::{min_range_modifier, range_modifier, resolve_weapon_fire};
use crate::dice::{roll_2d6, roll_d6};
use crate::heat::{
    heat_ammo_explosion_prob, heat_shutdown_prob, heat_shutdown_target, heat_to_hit_mod, select_weapons_ev,
    tmm_from_hexes_moved,
};
use crate::hex::{arc_of, best_torso_twist, distance, normalize_facing, Arc, HexCoord};
use crate::los::{check_los, LosResult};
use crate::movement::{collect_move_options, ReachableHex};
use crate::tactics::{choose_movement, MoveRole, TacticalView};
use crate::trace::{Event, Side, Trace, TurnLog, WeaponShot};
use crate::unit::{Location, MoveMode, UnitState, GUNNERY_SKILL, PILOTING_SKILL};
use crate::weapon::WeaponCategory;

/// Turn cap; reaching it is a result, not an error
pub const MAX_TURNS: u32 = 200;

/// External heat accepted per turn
pub const MAX_EXTERNAL_HEAT: i32 = 15;

/// Extra piloting modifier after restarting from a shutdown
const RESTART_PSR_MODIFIER: i32 = 3;

/// Damage in one phase that forces a stability check
const HEAVY_DAMAGE_THRESHOLD: i32 = 20;

/// How an engagement ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    DefenderDestroyed { turn: u32 },
    DefenderWithdrew { turn: u32 },
    AttackerDestroyed { turn: u32 },
    Timeout,
}

impl Outcome {
    /// Turns needed to defeat the defender; the cap when it never was
    pub fn turns(&self) -> u32 {
        self.turns_capped(MAX_TURNS)
    }

    /// As `turns`, against a custom cap
    pub fn turns_capped(&self, cap: u32) -> u32 {
        match *self {
            Outcome::DefenderDestroyed { turn } | Outcome::DefenderWithdrew { turn } => turn,
            Outcome::AttackerDestroyed { .. } | Outcome::Timeout => cap,
        }
    }

    pub fn defender_defeated(&self) -> bool {
        matches!(self, Outcome::DefenderDestroyed { .. } | Outcome::DefenderWithdrew { .. })
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::DefenderDestroyed { turn } => write!(f, "defender destroyed on turn {}", turn),
            Outcome::DefenderWithdrew { turn } => write!(f, "defender withdrew on turn {}", turn),
            Outcome::AttackerDestroyed { turn } => write!(f, "attacker destroyed on turn {}", turn),
            Outcome::Timeout => write!(f, "no result within the turn cap"),
        }
    }
}

type Phase = ControlFlow<Outcome>;

/// Split the pair into (acting unit, its opponent)
fn pair_mut(units: &mut [UnitState; 2], side: Side) -> (&mut UnitState, &mut UnitState) {
    let [attacker, defender] = units;
    match side {
        Side::Attacker => (attacker, defender),
        Side::Defender => (defender, attacker),
    }
}

/// To-hit number before per-weapon modifiers
fn base_to_hit(shooter: &UnitState, target: &UnitState, dist: i32, los: &LosResult) -> i32 {
    let mut number = GUNNERY_SKILL
        + shooter.sensor_hits * 2
        + heat_to_hit_mod(shooter.heat)
        + shooter.move_mode.attacker_modifier()
        + tmm_from_hexes_moved(target.hexes_moved, target.move_mode == MoveMode::Jump)
        + los.to_hit_mod();
    if shooter.prone {
        number += 2;
    }
    if target.prone {
        number += if dist <= 1 { -2 } else { 1 };
    }
    number
}

/// Engine heat, external heat and dissipation at the end of a turn
fn end_of_turn_heat(unit: &mut UnitState) {
    if !unit.shutdown {
        unit.heat += unit.engine_hits * 5;
    }
    unit.heat += unit.external_heat.min(MAX_EXTERNAL_HEAT);
    unit.external_heat = 0;
    unit.heat = (unit.heat - unit.dissipation).max(0);
}

/// One engagement between deep copies of two unit templates
pub struct Engagement<'a> {
    board: &'a Board,
    units: [UnitState; 2],
    max_turns: u32,
    trace: Option<Trace>,
    log: TurnLog,
}

impl<'a> Engagement<'a> {
    /// Clone both templates and deploy them at opposite ends of the board
    pub fn new(board: &'a Board, attacker: &UnitState, defender: &UnitState) -> Self {
        let mut units = [attacker.clone(), defender.clone()];
        let col = board.width() / 2 + 1;
        units[0].position = HexCoord::new(col, 2);
        units[0].facing = 3;
        units[1].position = HexCoord::new(col, board.height() - 1);
        units[1].facing = 0;

        Self { board, units, max_turns: MAX_TURNS, trace: None, log: TurnLog::default() }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Record a replay trace while running
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Trace::new(self.board, &self.units[0], &self.units[1]));
        self
    }

    pub fn attacker(&self) -> &UnitState {
        &self.units[0]
    }

    pub fn defender(&self) -> &UnitState {
        &self.units[1]
    }

    pub fn into_trace(self) -> Option<Trace> {
        self.trace
    }

    /// Play turns until the engagement is decided
    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Outcome {
        let mut outcome = Outcome::Timeout;
        for turn in 1..=self.max_turns {
            if let ControlFlow::Break(o) = self.start_of_turn(turn) {
                outcome = o;
                break;
            }
            let flow = self.play_turn(turn, rng);
            self.finish_turn(turn);
            if let ControlFlow::Break(o) = flow {
                outcome = o;
                break;
            }
        }

        tracing::debug!("{} vs {}: {}", self.units[0].name, self.units[1].name, outcome);
        if let Some(trace) = self.trace.as_mut() {
            trace.outcome = Some(outcome);
        }
        outcome
    }

    fn recording(&self) -> bool {
        self.trace.is_some()
    }

    fn event(&mut self, event: Event) {
        if self.recording() {
            self.log.events.push(event);
        }
    }

    fn finish_turn(&mut self, turn: u32) {
        if let Some(trace) = self.trace.as_mut() {
            trace.turns.push(self.log.finish(turn, &self.units));
        }
    }

    /// Destruction anywhere in the turn ends it on that turn
    fn check(&self, turn: u32) -> Phase {
        if self.units[1].is_destroyed() {
            ControlFlow::Break(Outcome::DefenderDestroyed { turn })
        } else if self.units[0].is_destroyed() {
            ControlFlow::Break(Outcome::AttackerDestroyed { turn })
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Destruction found here happened last turn; a unit that starts
    /// destroyed counts as turn 1
    fn start_of_turn(&self, turn: u32) -> Phase {
        self.check(turn.saturating_sub(1).max(1))?;
        if self.units[1].is_forced_withdrawal() {
            return ControlFlow::Break(Outcome::DefenderWithdrew { turn });
        }
        ControlFlow::Continue(())
    }

    fn play_turn<R: Rng + ?Sized>(&mut self, turn: u32, rng: &mut R) -> Phase {
        for unit in self.units.iter_mut() {
            unit.ams_used = false;
            for w in unit.weapons.iter_mut().filter(|w| w.category == WeaponCategory::RotaryAc) {
                w.jammed = false;
            }
        }

        let mut active = [true; 2];
        for side in [Side::Attacker, Side::Defender] {
            if self.units[side.index()].shutdown {
                active[side.index()] = self.try_restart(side, rng);
                self.check(turn)?;
            }
            if active[side.index()] && self.units[side.index()].prone {
                self.stand_up(side, rng);
                self.check(turn)?;
            }
        }

        let attacker_roll = roll_d6(rng);
        let defender_roll = roll_d6(rng);
        let attacker_first = attacker_roll < defender_roll || (attacker_roll == defender_roll && rng.gen_bool(0.5));
        let first = if attacker_first { Side::Attacker } else { Side::Defender };
        self.event(Event::Initiative { first_mover: first });

        self.movement(first, active);

        for side in [Side::Attacker, Side::Defender] {
            if active[side.index()] {
                self.fire(side, turn, rng)?;
            }
        }

        if distance(self.units[0].position, self.units[1].position) == 1 {
            for side in [Side::Attacker, Side::Defender] {
                if active[side.index()] {
                    self.kick(side, rng);
                    self.check(turn)?;
                }
            }
        }

        for unit in self.units.iter_mut() {
            end_of_turn_heat(unit);
        }
        for side in [Side::Attacker, Side::Defender] {
            self.heat_effects(side, rng);
        }
        self.check(turn)
    }

    // ------------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------------

    /// Restart roll for a shut-down unit; true when it can act this turn
    fn try_restart<R: Rng + ?Sized>(&mut self, side: Side, rng: &mut R) -> bool {
        let unit = &mut self.units[side.index()];
        let target = heat_shutdown_target(unit.heat);
        if target >= 13 || roll_2d6(rng) < target {
            self.event(Event::StayedDown { side });
            return false;
        }

        unit.shutdown = false;
        let fell = !unit.prone && !unit.roll_stability(RESTART_PSR_MODIFIER, rng);
        if fell {
            unit.apply_fall(rng);
        }
        self.event(Event::Restarted { side });
        if fell {
            self.event(Event::Fell { side });
        }
        true
    }

    fn stand_up<R: Rng + ?Sized>(&mut self, side: Side, rng: &mut R) {
        let unit = &mut self.units[side.index()];
        unit.heat += 1;
        if unit.roll_stand_up(rng) {
            unit.prone = false;
            self.event(Event::StoodUp { side });
        } else {
            unit.apply_fall(rng);
            self.event(Event::Fell { side });
        }
    }

    // ------------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------------

    fn movement(&mut self, first: Side, active: [bool; 2]) {
        let (f, s) = (first.index(), first.opponent().index());

        let choices = {
            let first_unit = &self.units[f];
            let second_unit = &self.units[s];
            let first_view = TacticalView::new(first_unit).avoiding(second_unit.position);
            let second_view = TacticalView::new(second_unit).avoiding(first_unit.position);

            let first_choice = if active[f] {
                let second_options = collect_move_options(self.board, &second_view);
                choose_movement(
                    self.board,
                    &first_view,
                    &second_view,
                    MoveRole::FirstMover,
                    second_unit.position,
                    second_unit.facing,
                    &second_options,
                )
            } else {
                ReachableHex::stand(first_unit.position, first_unit.facing)
            };

            let second_choice = if active[s] {
                let second_view = second_view.avoiding(first_choice.coord);
                choose_movement(
                    self.board,
                    &second_view,
                    &first_view,
                    MoveRole::SecondMover,
                    first_choice.coord,
                    first_choice.facing,
                    &[],
                )
            } else {
                ReachableHex::stand(second_unit.position, second_unit.facing)
            };

            let mut out = [first_choice; 2];
            out[s] = second_choice;
            out
        };

        for (i, choice) in choices.iter().enumerate() {
            let unit = &mut self.units[i];
            unit.position = choice.coord;
            unit.facing = choice.facing;
            unit.move_mode = choice.mode;
            unit.hexes_moved = choice.hexes_moved;
            unit.heat += choice.heat;
        }
        for side in [Side::Attacker, Side::Defender] {
            let choice = choices[side.index()];
            self.event(Event::Moved {
                side,
                to: choice.coord,
                facing: choice.facing,
                mode: choice.mode,
                hexes: choice.hexes_moved,
            });
        }

        let (a, d) = (self.units[0].position, self.units[1].position);
        self.units[0].torso_twist = best_torso_twist(a, self.units[0].facing, d);
        self.units[1].torso_twist = best_torso_twist(d, self.units[1].facing, a);
    }

    // ------------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------------

    /// Weapon fire from `side`, then the target's stability checks
    fn fire<R: Rng + ?Sized>(&mut self, side: Side, turn: u32, rng: &mut R) -> Phase {
        let recording = self.recording();
        let (shooter, target) = pair_mut(&mut self.units, side);
        if shooter.sensor_hits >= 2 {
            return ControlFlow::Continue(());
        }
        let dist = distance(shooter.position, target.position);
        if dist == 0 {
            return ControlFlow::Continue(());
        }
        let los = check_los(self.board, shooter.position, target.position);
        if !los.visible {
            self.event(Event::NoLineOfSight { side });
            return ControlFlow::Continue(());
        }

        let target_facing = normalize_facing(target.facing as i32 + target.torso_twist as i32);
        let is_rear = arc_of(target.position, target_facing, shooter.position) == Arc::Rear;
        let base = base_to_hit(shooter, target, dist, &los);

        let (firing, heat) = select_weapons_ev(shooter, target.position, dist, base);
        shooter.heat += heat;

        let mut dealt = 0;
        for idx in firing {
            let adjustment = shooter.weapon_to_hit_adjustment(&shooter.weapons[idx]);
            let w = &shooter.weapons[idx];
            let Some(range_mod) = range_modifier(w, dist) else { continue };
            let number = base + adjustment + w.to_hit_mod + range_mod + min_range_modifier(w, dist);
            if w.needs_ammo() {
                let key = w.ammo_key.clone();
                if !shooter.consume_ammo(&key) {
                    continue;
                }
            }

            let result = resolve_weapon_fire(&mut shooter.weapons[idx], &shooter.equipment, number, dist, is_rear, target, rng);
            dealt += result.damage;
            tracing::debug!(
                "turn {}: {} fires {} at {} (need {}): {}",
                turn,
                shooter.name,
                shooter.weapons[idx].name,
                target.name,
                number,
                if result.hit { format!("{} damage", result.damage) } else { "miss".to_string() }
            );
            if recording {
                self.log.shots.push(WeaponShot {
                    side,
                    weapon: shooter.weapons[idx].name.clone(),
                    target_number: number,
                    hit: result.hit,
                    damage: result.damage,
                    jammed: result.jammed,
                });
            }
            if target.is_destroyed() {
                break;
            }
        }

        if !target.is_destroyed() {
            let mut fell = false;
            if dealt >= HEAVY_DAMAGE_THRESHOLD && !target.prone && !target.roll_stability(1, rng) {
                target.apply_fall(rng);
                fell = true;
            }
            if target.needs_psr {
                target.needs_psr = false;
                if !target.roll_stability(0, rng) {
                    target.apply_fall(rng);
                    fell = true;
                }
            }
            if fell {
                self.event(Event::Fell { side: side.opponent() });
            }
        }
        self.check(turn)
    }

    /// Kick an adjacent opponent; returns (hit, damage)
    fn kick<R: Rng + ?Sized>(&mut self, side: Side, rng: &mut R) {
        let (kicker, target) = pair_mut(&mut self.units, side);
        if kicker.prone
            || kicker.is_location_destroyed(Location::LeftLeg)
            || kicker.is_location_destroyed(Location::RightLeg)
        {
            return;
        }

        let number = (PILOTING_SKILL - 2
            + kicker.move_mode.attacker_modifier()
            + tmm_from_hexes_moved(target.hexes_moved, target.move_mode == MoveMode::Jump))
        .max(2);
        let damage = kicker.tonnage / 5;
        let hit = roll_2d6(rng) >= number;
        let mut fell = false;
        if hit {
            let leg = if rng.gen_bool(0.5) { Location::LeftLeg } else { Location::RightLeg };
            target.apply_damage(leg, damage, false, rng);
            if !target.prone && !target.is_destroyed() && !target.roll_stability(0, rng) {
                target.apply_fall(rng);
                fell = true;
            }
        }

        let dealt = if hit { damage } else { 0 };
        self.event(Event::Kick { side, hit, damage: dealt });
        if fell {
            self.event(Event::Fell { side: side.opponent() });
        }
    }

    // ------------------------------------------------------------------------
    // Heat
    // ------------------------------------------------------------------------

    /// Shutdown and ammo explosion rolls after heat is settled
    fn heat_effects<R: Rng + ?Sized>(&mut self, side: Side, rng: &mut R) {
        let unit = &mut self.units[side.index()];

        let p = heat_shutdown_prob(unit.heat);
        let shut_down = !unit.shutdown && (p >= 1.0 || (p > 0.0 && rng.gen::<f64>() < p));
        if shut_down {
            unit.shutdown = true;
            tracing::debug!("{} shuts down at heat {}", unit.name, unit.heat);
        }

        let mut exploded = None;
        let p = heat_ammo_explosion_prob(unit.heat);
        if p > 0.0 && rng.gen::<f64>() < p {
            let bins = unit.explosive_ammo_bins();
            if !bins.is_empty() {
                let (loc, slot) = bins[rng.gen_range(0..bins.len())].clone();
                tracing::debug!("{} cooks off {} in {}", unit.name, slot, loc);
                unit.ammo_explosion(loc, &slot, rng);
                exploded = Some(loc);
            }
        }

        if shut_down {
            self.event(Event::ShutDown { side });
        }
        if let Some(location) = exploded {
            self.event(Event::AmmoExplosion { side, location });
        }
    }
}

/// Run one engagement and return how it ended
pub fn simulate<R: Rng + ?Sized>(board: &Board, attacker: &UnitState, defender: &UnitState, rng: &mut R) -> Outcome {
    Engagement::new(board, attacker, defender).run(rng)
}

/// Run one engagement, recording a replay trace
pub fn simulate_with_trace<R: Rng + ?Sized>(
    board: &Board,
    attacker: &UnitState,
    defender: &UnitState,
    rng: &mut R,
) -> (Outcome, Trace) {
    let mut engagement = Engagement::new(board, attacker, defender).with_trace();
    let outcome = engagement.run(rng);
    let trace = engagement
        .into_trace()
        .unwrap_or_else(|| Trace::new(board, attacker, defender));
    (outcome, trace)
}
