//! Unit state and the damage model
//!
//! A `UnitState` owns everything that can be destroyed: armor, internal
//! structure, critical slots, weapons, ammo and pilot. Templates are built
//! once and cloned per engagement; all mutation happens in place.

use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::dice::roll_2d6;
use crate::error::TemplateError;
use crate::heat::heat_mp_reduction;
use crate::hex::HexCoord;
use crate::weapon::Weapon;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const NUM_LOCATIONS: usize = 8;

/// Base piloting skill used for every stability check
pub const PILOTING_SKILL: i32 = 5;

/// Base gunnery skill
pub const GUNNERY_SKILL: i32 = 4;

/// Pilot damage at which the pilot is dead
pub const FATAL_PILOT_DAMAGE: i32 = 6;

/// Consciousness roll needed per point of pilot damage (1..=6)
pub const CONSCIOUSNESS_TARGETS: [i32; 6] = [3, 5, 7, 10, 11, 99];

/// 2d6 roll (index roll - 2) to hit location
pub const FRONT_HIT_TABLE: [Location; 11] = [
    Location::CenterTorso,
    Location::RightArm,
    Location::RightArm,
    Location::RightLeg,
    Location::RightTorso,
    Location::CenterTorso,
    Location::LeftTorso,
    Location::LeftLeg,
    Location::LeftArm,
    Location::LeftArm,
    Location::Head,
];

/// Rear hits use the same location spread as front hits
pub const REAR_HIT_TABLE: [Location; 11] = FRONT_HIT_TABLE;

/// Internal structure by tonnage: HD, CT, LT, RT, LA, RA, LL, RL
const STRUCTURE_TABLE: [(i32, [i32; NUM_LOCATIONS]); 17] = [
    (20, [3, 6, 5, 5, 3, 3, 4, 4]),
    (25, [3, 8, 6, 6, 4, 4, 6, 6]),
    (30, [3, 10, 7, 7, 5, 5, 7, 7]),
    (35, [3, 11, 8, 8, 6, 6, 8, 8]),
    (40, [3, 12, 10, 10, 6, 6, 10, 10]),
    (45, [3, 14, 11, 11, 7, 7, 11, 11]),
    (50, [3, 16, 12, 12, 8, 8, 12, 12]),
    (55, [3, 18, 13, 13, 9, 9, 13, 13]),
    (60, [3, 20, 14, 14, 10, 10, 14, 14]),
    (65, [3, 21, 15, 15, 10, 10, 15, 15]),
    (70, [3, 22, 15, 15, 11, 11, 15, 15]),
    (75, [3, 23, 16, 16, 12, 12, 16, 16]),
    (80, [3, 25, 17, 17, 13, 13, 17, 17]),
    (85, [3, 27, 18, 18, 14, 14, 18, 18]),
    (90, [3, 29, 19, 19, 15, 15, 19, 19]),
    (95, [3, 30, 20, 20, 16, 16, 20, 20]),
    (100, [3, 31, 21, 21, 17, 17, 21, 21]),
];

/// Internal structure for a tonnage (largest table row not above it)
pub fn internal_structure_for(tonnage: i32) -> [i32; NUM_LOCATIONS] {
    STRUCTURE_TABLE
        .iter()
        .rev()
        .find(|(t, _)| *t <= tonnage)
        .map(|(_, s)| *s)
        .unwrap_or(STRUCTURE_TABLE[0].1)
}

/// Hit location for a 2d6 roll, clamped into 2..=12
pub fn hit_location(roll: i32, rear: bool) -> Location {
    let table = if rear { &REAR_HIT_TABLE } else { &FRONT_HIT_TABLE };
    table[(roll.clamp(2, 12) - 2) as usize]
}

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    Head,
    #[default]
    CenterTorso,
    LeftTorso,
    RightTorso,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl Location {
    pub const ALL: [Location; NUM_LOCATIONS] = [
        Location::Head,
        Location::CenterTorso,
        Location::LeftTorso,
        Location::RightTorso,
        Location::LeftArm,
        Location::RightArm,
        Location::LeftLeg,
        Location::RightLeg,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Index into the rear armor array, torsos only
    pub fn rear_index(self) -> Option<usize> {
        match self {
            Location::CenterTorso => Some(0),
            Location::LeftTorso => Some(1),
            Location::RightTorso => Some(2),
            _ => None,
        }
    }

    pub fn abbrev(self) -> &'static str {
        match self {
            Location::Head => "HD",
            Location::CenterTorso => "CT",
            Location::LeftTorso => "LT",
            Location::RightTorso => "RT",
            Location::LeftArm => "LA",
            Location::RightArm => "RA",
            Location::LeftLeg => "LL",
            Location::RightLeg => "RL",
        }
    }

    pub fn is_torso(self) -> bool {
        self.rear_index().is_some()
    }

    pub fn is_arm(self) -> bool {
        matches!(self, Location::LeftArm | Location::RightArm)
    }

    pub fn is_leg(self) -> bool {
        matches!(self, Location::LeftLeg | Location::RightLeg)
    }

    /// Where overflow damage goes once this location is gone
    pub fn transfer_target(self) -> Option<Location> {
        match self {
            Location::LeftArm | Location::LeftLeg => Some(Location::LeftTorso),
            Location::RightArm | Location::RightLeg => Some(Location::RightTorso),
            Location::LeftTorso | Location::RightTorso => Some(Location::CenterTorso),
            Location::Head | Location::CenterTorso => None,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abbrev())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    #[default]
    Standard,
    Xl,
    ClanXl,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    #[default]
    Standard,
    /// Structure takes half damage, crit rolls at -1
    Reinforced,
    /// Structure takes double damage, no overflow transfer
    Composite,
}

impl StructureType {
    pub fn damage_multiplier(self) -> f64 {
        match self {
            StructureType::Standard => 1.0,
            StructureType::Reinforced => 0.5,
            StructureType::Composite => 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artemis {
    #[default]
    None,
    Iv,
    V,
}

/// Fire-control and defensive equipment flags
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Equipment {
    /// Ammo-fed anti-missile system (uses the "ams" ammo pool)
    pub ams: bool,
    /// Laser AMS, needs no ammo
    pub laser_ams: bool,
    pub artemis: Artemis,
    pub apollo: bool,
    pub targeting_computer: bool,
}

/// How a unit moved this turn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveMode {
    #[default]
    Stand,
    Walk,
    Run,
    Jump,
}

impl MoveMode {
    /// To-hit modifier for attacking after moving this way
    pub fn attacker_modifier(self) -> i32 {
        match self {
            MoveMode::Stand => 0,
            MoveMode::Walk => 1,
            MoveMode::Run => 2,
            MoveMode::Jump => 3,
        }
    }

    /// Movement heat for the turn; jumps pay per hex
    pub fn heat(self, hexes_moved: i32) -> i32 {
        match self {
            MoveMode::Stand => 0,
            MoveMode::Walk => 1,
            MoveMode::Run => 2,
            MoveMode::Jump => hexes_moved.max(3),
        }
    }
}

/// Accounting for one `apply_damage` call at one location.
///
/// `amount == armor + structure + transferred + discarded` holds for every
/// link; `next` is the report for the location that received the transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    pub location: Location,
    pub amount: i32,
    pub armor: i32,
    /// Incoming points consumed by internal structure
    pub structure: i32,
    pub transferred: i32,
    pub discarded: i32,
    pub location_destroyed: bool,
    pub next: Option<Box<DamageReport>>,
}

impl DamageReport {
    fn new(location: Location, amount: i32) -> Self {
        Self { location, amount, ..Default::default() }
    }

    /// Locations destroyed anywhere along the transfer chain
    pub fn destroyed_locations(&self) -> Vec<Location> {
        let mut out = Vec::new();
        let mut link = Some(self);
        while let Some(r) = link {
            if r.location_destroyed {
                out.push(r.location);
            }
            link = r.next.as_deref();
        }
        out
    }
}

/// Where structure overflow goes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Overflow {
    Transfer,
    Discard,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitState {
    pub name: String,
    pub tonnage: i32,
    pub walk_mp: i32,
    pub run_mp: i32,
    pub jump_mp: i32,
    pub heat_sinks: i32,
    pub dissipation: i32,
    pub engine: EngineType,
    pub structure_type: StructureType,

    pub armor: [i32; NUM_LOCATIONS],
    /// Rear armor for CT, LT, RT
    pub rear_armor: [i32; 3],
    pub structure: [i32; NUM_LOCATIONS],
    pub max_structure: [i32; NUM_LOCATIONS],
    pub crit_slots: [Vec<String>; NUM_LOCATIONS],
    pub case: [bool; NUM_LOCATIONS],
    pub case_ii: [bool; NUM_LOCATIONS],

    pub weapons: Vec<Weapon>,
    /// Shots remaining per canonical ammo key
    pub ammo: FxHashMap<String, i32>,
    pub equipment: Equipment,

    // Dynamic state
    pub heat: i32,
    pub external_heat: i32,
    pub engine_hits: i32,
    pub gyro_hits: i32,
    pub sensor_hits: i32,
    pub cockpit_hit: bool,
    pub arm_actuator_hits: [i32; NUM_LOCATIONS],
    pub leg_mp_penalty: i32,
    pub hip_hit: [bool; NUM_LOCATIONS],
    pub leg_foot_hits: [i32; NUM_LOCATIONS],
    pub structure_exposed: [bool; NUM_LOCATIONS],
    pub shutdown: bool,
    pub prone: bool,
    pub pilot_damage: i32,
    pub unconscious: bool,
    pub needs_psr: bool,
    pub ams_used: bool,
    pub position: HexCoord,
    pub facing: u8,
    pub torso_twist: i8,
    pub move_mode: MoveMode,
    pub hexes_moved: i32,
}

// ============================================================================
// AMMO KEYS
// ============================================================================

/// Normalize an ammo slot or weapon ammo name into a pool key
pub fn canonical_ammo_key(raw: &str) -> String {
    let mut s = raw.to_lowercase();
    for strip in [
        "(omnipod)",
        "- full",
        "- half",
        "cluster",
        "ammo",
        "clan ",
        "inner sphere ",
        "is ",
    ] {
        s = s.replace(strip, " ");
    }
    let s = s.split_whitespace().collect::<Vec<_>>().join(" ");

    if s.contains("heavy gauss") || s.contains("heavygauss") {
        "heavygauss".to_string()
    } else if s == "ams" || s.contains("anti-missile") || s.contains("antimissile") {
        "ams".to_string()
    } else if s.contains("long tom") || s.contains("longtom") {
        "longtom".to_string()
    } else if s.contains("sniper") {
        "sniper".to_string()
    } else if s.contains("thumper") {
        "thumper".to_string()
    } else {
        s
    }
}

/// Damage per shot of an exploding ammo bin
pub fn ammo_damage_per_shot(key: &str) -> i32 {
    if key.contains("ac/20") {
        20
    } else if key.contains("ac/10") {
        10
    } else if key.contains("ac/5") {
        5
    } else if key.contains("ac/2") {
        2
    } else if key.contains("gauss") {
        15
    } else if key.contains("lrm") || key.contains("mml") {
        1
    } else if key.contains("srm") || key.contains("streak") {
        2
    } else if key.contains("mrm") {
        1
    } else if key.contains("atm") {
        2
    } else {
        5
    }
}

fn is_gauss_ammo(key: &str) -> bool {
    key.contains("gauss")
}

fn is_ammo_slot(slot: &str) -> bool {
    slot.to_lowercase().contains("ammo")
}

fn is_filled_slot(slot: &str) -> bool {
    let s = slot.trim();
    !s.is_empty() && s != "-Empty-"
}

// ============================================================================
// UNIT STATE
// ============================================================================

/// Result of a critical-hit determination roll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CritRoll {
    NoCrit,
    /// Number of slots hit
    Slots(i32),
    LimbBlownOff,
    CockpitDestroyed,
}

/// Crit determination table: 8-9 one slot, 10-11 two, 12 three on a torso,
/// the whole limb on an arm or leg, the cockpit on the head
pub fn crit_roll_result(roll: i32, loc: Location) -> CritRoll {
    match roll {
        12.. if loc == Location::Head => CritRoll::CockpitDestroyed,
        12.. if loc.is_arm() || loc.is_leg() => CritRoll::LimbBlownOff,
        12.. => CritRoll::Slots(3),
        10..=11 => CritRoll::Slots(2),
        8..=9 => CritRoll::Slots(1),
        _ => CritRoll::NoCrit,
    }
}

impl UnitState {
    pub fn armor_at(&self, loc: Location) -> i32 {
        self.armor[loc.index()]
    }

    pub fn structure_at(&self, loc: Location) -> i32 {
        self.structure[loc.index()]
    }

    pub fn is_location_destroyed(&self, loc: Location) -> bool {
        self.structure[loc.index()] <= 0
    }

    fn destroy_weapons_in(&mut self, loc: Location) {
        for w in self.weapons.iter_mut().filter(|w| w.location == loc) {
            w.destroyed = true;
        }
    }

    fn destroy_location(&mut self, loc: Location) {
        self.structure[loc.index()] = 0;
        self.structure_exposed[loc.index()] = true;
        self.destroy_weapons_in(loc);
    }

    /// Apply `amount` damage to a location, transferring overflow inward.
    pub fn apply_damage<R: Rng + ?Sized>(
        &mut self,
        loc: Location,
        amount: i32,
        is_rear: bool,
        rng: &mut R,
    ) -> DamageReport {
        self.damage_location(loc, amount, is_rear, true, Overflow::Transfer, rng)
    }

    fn damage_location<R: Rng + ?Sized>(
        &mut self,
        loc: Location,
        amount: i32,
        is_rear: bool,
        use_armor: bool,
        overflow: Overflow,
        rng: &mut R,
    ) -> DamageReport {
        let mut report = DamageReport::new(loc, amount.max(0));
        if amount <= 0 {
            return report;
        }

        if self.is_location_destroyed(loc) {
            self.pass_overflow(&mut report, amount, is_rear, overflow, rng);
            return report;
        }

        let mut remaining = amount;
        if use_armor {
            let pool = match (is_rear, loc.rear_index()) {
                (true, Some(i)) => &mut self.rear_armor[i],
                _ => &mut self.armor[loc.index()],
            };
            let absorbed = remaining.min(*pool);
            *pool -= absorbed;
            remaining -= absorbed;
            report.armor = absorbed;
        }
        if remaining <= 0 {
            return report;
        }

        let mult = self.structure_type.damage_multiplier();
        let effective = (remaining as f64 * mult).ceil() as i32;
        let idx = loc.index();

        if self.structure[idx] > effective {
            self.structure[idx] -= effective;
            self.structure_exposed[idx] = true;
            report.structure = remaining;
            self.roll_crits(loc, rng);
            return report;
        }

        let excess = effective - self.structure[idx];
        self.destroy_location(loc);
        report.location_destroyed = true;

        if self.structure_type == StructureType::Composite {
            // Convert back to incoming points; composite overflow never transfers
            let lost = (excess as f64 / mult).floor() as i32;
            report.discarded = lost.min(remaining);
            report.structure = remaining - report.discarded;
            return report;
        }

        report.structure = remaining - excess;
        self.pass_overflow(&mut report, excess, is_rear, overflow, rng);
        report
    }

    fn pass_overflow<R: Rng + ?Sized>(
        &mut self,
        report: &mut DamageReport,
        excess: i32,
        is_rear: bool,
        overflow: Overflow,
        rng: &mut R,
    ) {
        if excess <= 0 {
            return;
        }
        match (overflow, report.location.transfer_target()) {
            (Overflow::Transfer, Some(next)) => {
                report.transferred = excess;
                let inner = self.damage_location(next, excess, is_rear, true, overflow, rng);
                report.next = Some(Box::new(inner));
            }
            _ => report.discarded = excess,
        }
    }

    // ------------------------------------------------------------------------
    // Critical hits
    // ------------------------------------------------------------------------

    /// Roll for critical hits after structure damage
    pub fn roll_crits<R: Rng + ?Sized>(&mut self, loc: Location, rng: &mut R) {
        self.roll_crits_filtered(loc, false, rng);
    }

    /// Crit roll where each result only lands if a 2d6 filter roll is below 8
    fn roll_crits_filtered<R: Rng + ?Sized>(&mut self, loc: Location, filtered: bool, rng: &mut R) {
        let mut roll = roll_2d6(rng);
        if self.structure_type == StructureType::Reinforced {
            roll -= 1;
        }
        self.resolve_crit_roll(loc, roll, filtered, rng);
    }

    /// Apply the result of an already-modified crit determination roll
    pub(crate) fn resolve_crit_roll<R: Rng + ?Sized>(&mut self, loc: Location, roll: i32, filtered: bool, rng: &mut R) {
        let lands = |rng: &mut R| !filtered || roll_2d6(rng) < 8;

        match crit_roll_result(roll, loc) {
            CritRoll::NoCrit => {}
            CritRoll::CockpitDestroyed => {
                if lands(rng) {
                    self.cockpit_hit = true;
                }
            }
            CritRoll::LimbBlownOff => {
                if lands(rng) {
                    tracing::debug!("{}: {} blown off", self.name, loc);
                    self.destroy_location(loc);
                }
            }
            CritRoll::Slots(n) => {
                for _ in 0..n {
                    if lands(rng) {
                        self.apply_crit(loc, rng);
                    }
                }
            }
        }
    }

    /// Resolve one critical hit against a random occupied slot
    pub fn apply_crit<R: Rng + ?Sized>(&mut self, loc: Location, rng: &mut R) {
        let idx = loc.index();
        let filled: Vec<usize> = self.crit_slots[idx]
            .iter()
            .enumerate()
            .filter(|(_, s)| is_filled_slot(s))
            .map(|(i, _)| i)
            .collect();
        if filled.is_empty() {
            return;
        }
        let slot = self.crit_slots[idx][filled[rng.gen_range(0..filled.len())]].clone();
        let lower = slot.to_lowercase();

        if lower.contains("ammo") {
            self.ammo_explosion(loc, &slot, rng);
        } else if lower.contains("engine") {
            self.engine_hits += 1;
        } else if lower.contains("gyro") {
            self.gyro_hits += 1;
            self.needs_psr = true;
        } else if lower.contains("cockpit") {
            self.cockpit_hit = true;
        } else if lower.contains("sensors") {
            self.sensor_hits += 1;
        } else if lower.contains("heat sink") {
            self.dissipation = (self.dissipation - 1).max(0);
            if (lower.contains("double") || lower.contains("laser")) && self.dissipation > 0 {
                self.dissipation -= 1;
            }
        } else if ["shoulder", "upper arm", "lower arm", "hand"].iter().any(|a| lower.contains(a)) {
            if loc.is_arm() {
                self.arm_actuator_hits[idx] += 1;
            }
        } else if lower.contains("hip") {
            if loc.is_leg() && !self.hip_hit[idx] {
                self.hip_hit[idx] = true;
                self.leg_mp_penalty += self.effective_walk_mp();
                self.needs_psr = true;
            }
        } else if ["upper leg", "lower leg", "foot"].iter().any(|a| lower.contains(a)) {
            self.leg_mp_penalty += 1;
            self.leg_foot_hits[idx] += 1;
            self.needs_psr = true;
        } else if lower.contains("jump jet") {
            self.jump_mp = (self.jump_mp - 1).max(0);
        } else if ["life support", "endo", "ferro", "case", "triple strength"]
            .iter()
            .any(|a| lower.contains(a))
        {
            // Hit, no combat effect
        } else {
            self.destroy_weapon_for_slot(loc, &lower);
        }
    }

    fn destroy_weapon_for_slot(&mut self, loc: Location, slot_lower: &str) {
        let named = self.weapons.iter().position(|w| {
            w.location == loc && !w.destroyed && slot_lower.contains(&w.name.to_lowercase())
        });
        let target = named.or_else(|| {
            self.weapons
                .iter()
                .position(|w| w.location == loc && !w.destroyed)
        });
        if let Some(i) = target {
            tracing::debug!("{}: {} destroyed by critical hit", self.name, self.weapons[i].name);
            self.weapons[i].destroyed = true;
        }
    }

    // ------------------------------------------------------------------------
    // Ammo explosions
    // ------------------------------------------------------------------------

    /// Detonate the ammo held in `slot` at `loc`
    pub fn ammo_explosion<R: Rng + ?Sized>(&mut self, loc: Location, slot: &str, rng: &mut R) {
        let key = canonical_ammo_key(slot);
        if is_gauss_ammo(&key) {
            return;
        }
        let shots = self.ammo.get(&key).copied().unwrap_or(0);
        if shots <= 0 {
            return;
        }

        let bins = self.ammo_bin_count(&key).max(1);
        let slot_shots = (shots / bins).max(1);
        if let Some(pool) = self.ammo.get_mut(&key) {
            *pool = (*pool - slot_shots).max(0);
        }
        let damage = slot_shots * ammo_damage_per_shot(&key);
        tracing::debug!("{}: {} ammo explodes in {} for {}", self.name, key, loc, damage);

        let idx = loc.index();
        if self.is_location_destroyed(loc) {
            return;
        }
        if self.case_ii[idx] {
            if self.structure[idx] > 1 {
                self.structure[idx] -= 1;
                self.structure_exposed[idx] = true;
                self.roll_crits_filtered(loc, true, rng);
            } else {
                self.destroy_location(loc);
            }
        } else if self.case[idx] {
            self.damage_location(loc, damage, false, false, Overflow::Discard, rng);
        } else {
            self.damage_location(loc, damage, false, false, Overflow::Transfer, rng);
        }
    }

    /// Number of locations holding ammo for `key`
    fn ammo_bin_count(&self, key: &str) -> i32 {
        self.crit_slots
            .iter()
            .filter(|slots| {
                slots
                    .iter()
                    .any(|s| is_ammo_slot(s) && canonical_ammo_key(s) == key)
            })
            .count() as i32
    }

    /// Every (location, slot) holding live, explosive ammo
    pub fn explosive_ammo_bins(&self) -> Vec<(Location, String)> {
        let mut out = Vec::new();
        for loc in Location::ALL {
            for slot in self.crit_slots[loc.index()].iter().filter(|s| is_ammo_slot(s)) {
                let key = canonical_ammo_key(slot);
                if is_gauss_ammo(&key) || self.ammo.get(&key).copied().unwrap_or(0) <= 0 {
                    continue;
                }
                out.push((loc, slot.clone()));
            }
        }
        out
    }

    /// Mean damage of one random bin exploding; CASE-protected bins count 10%
    pub fn expected_ammo_explosion_damage(&self) -> f64 {
        let bins = self.explosive_ammo_bins();
        if bins.is_empty() {
            return 0.0;
        }
        let total: f64 = bins
            .iter()
            .map(|(loc, slot)| {
                let key = canonical_ammo_key(slot);
                let shots = self.ammo.get(&key).copied().unwrap_or(0);
                let per_bin = (shots / self.ammo_bin_count(&key).max(1)).max(1);
                let dmg = (per_bin * ammo_damage_per_shot(&key)) as f64;
                if self.case[loc.index()] || self.case_ii[loc.index()] {
                    dmg * 0.1
                } else {
                    dmg
                }
            })
            .sum();
        total / bins.len() as f64
    }

    /// Take one shot from an ammo pool; false when empty
    pub fn consume_ammo(&mut self, key: &str) -> bool {
        match self.ammo.get_mut(key) {
            Some(shots) if *shots > 0 => {
                *shots -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn has_ammo(&self, key: &str) -> bool {
        self.ammo.get(key).copied().unwrap_or(0) > 0
    }

    // ------------------------------------------------------------------------
    // Destruction and withdrawal
    // ------------------------------------------------------------------------

    pub fn is_destroyed(&self) -> bool {
        if self.pilot_damage >= FATAL_PILOT_DAMAGE || self.cockpit_hit || self.engine_hits >= 3 {
            return true;
        }
        if self.is_location_destroyed(Location::Head) || self.is_location_destroyed(Location::CenterTorso) {
            return true;
        }
        let lt = self.is_location_destroyed(Location::LeftTorso);
        let rt = self.is_location_destroyed(Location::RightTorso);
        match self.engine {
            EngineType::Standard => false,
            EngineType::Xl => lt || rt,
            EngineType::ClanXl => lt && rt,
        }
    }

    pub fn is_forced_withdrawal(&self) -> bool {
        if self.is_destroyed() || self.pilot_damage >= 4 || self.engine_hits >= 2 {
            return true;
        }
        if self.gyro_hits >= 1 && self.engine_hits >= 1 {
            return true;
        }
        if self.is_location_destroyed(Location::LeftTorso) || self.is_location_destroyed(Location::RightTorso) {
            return true;
        }

        let exposed = |locs: &[Location]| locs.iter().filter(|l| self.structure_exposed[l.index()]).count();
        let limbs = [Location::LeftArm, Location::RightArm, Location::LeftLeg, Location::RightLeg];
        let torsos = [Location::CenterTorso, Location::LeftTorso, Location::RightTorso];
        if exposed(&limbs) >= 3 || exposed(&torsos) >= 2 {
            return true;
        }

        self.weapons.iter().all(|w| w.destroyed)
    }

    // ------------------------------------------------------------------------
    // Movement allowance
    // ------------------------------------------------------------------------

    pub fn effective_walk_mp(&self) -> i32 {
        if self.is_location_destroyed(Location::LeftLeg) || self.is_location_destroyed(Location::RightLeg) {
            return 0;
        }
        (self.walk_mp - self.leg_mp_penalty - heat_mp_reduction(self.heat)).max(0)
    }

    pub fn effective_run_mp(&self) -> i32 {
        let walk = self.effective_walk_mp();
        (walk * 3 + 1) / 2
    }

    // ------------------------------------------------------------------------
    // Stability and falling
    // ------------------------------------------------------------------------

    /// Standing modifier to every piloting roll from accumulated damage
    pub fn psr_modifier(&self) -> i32 {
        let mut m = self.gyro_hits * 3;
        for leg in [Location::LeftLeg, Location::RightLeg] {
            let i = leg.index();
            if self.is_location_destroyed(leg) {
                m += 5;
            } else if self.hip_hit[i] {
                m += 2;
            } else {
                m += self.leg_foot_hits[i];
            }
        }
        m
    }

    fn cannot_pilot(&self) -> bool {
        self.unconscious || self.pilot_damage >= FATAL_PILOT_DAMAGE || self.gyro_hits >= 2
    }

    /// Piloting check; true on success. A unit already down has nothing to fall from.
    pub fn roll_stability<R: Rng + ?Sized>(&self, extra_mod: i32, rng: &mut R) -> bool {
        if self.prone {
            return true;
        }
        self.roll_stand_up_with(extra_mod, rng)
    }

    /// Piloting check to get up from prone
    pub fn roll_stand_up<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.roll_stand_up_with(0, rng)
    }

    fn roll_stand_up_with<R: Rng + ?Sized>(&self, extra_mod: i32, rng: &mut R) -> bool {
        if self.cannot_pilot() {
            return false;
        }
        roll_2d6(rng) >= PILOTING_SKILL + self.psr_modifier() + extra_mod
    }

    /// Fall over: damage in 5-point groups, then a pilot injury check
    pub fn apply_fall<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.prone = true;

        let fall_facing = rng.gen_range(1..=6);
        let rear = fall_facing == 4;
        let mut remaining = (self.tonnage + 9) / 10;
        while remaining > 0 {
            let group = remaining.min(5);
            remaining -= group;
            let loc = hit_location(roll_2d6(rng), rear);
            self.apply_damage(loc, group, rear && loc.is_torso(), rng);
        }

        let avoided = !self.unconscious && self.roll_stand_up_with(0, rng);
        if !avoided {
            self.injure_pilot(rng);
        }
    }

    /// One point of pilot damage plus a consciousness roll
    pub fn injure_pilot<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.pilot_damage = (self.pilot_damage + 1).min(FATAL_PILOT_DAMAGE);
        if self.pilot_damage < FATAL_PILOT_DAMAGE {
            let target = CONSCIOUSNESS_TARGETS[(self.pilot_damage - 1) as usize];
            if roll_2d6(rng) < target {
                self.unconscious = true;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Sanity-check a template before simulating with it
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.tonnage <= 0 {
            return Err(TemplateError::NonPositiveTonnage { name: self.name.clone(), tonnage: self.tonnage });
        }
        for loc in Location::ALL {
            let i = loc.index();
            if self.structure[i] <= 0 || self.max_structure[i] <= 0 {
                return Err(TemplateError::NoStructure { name: self.name.clone(), location: loc });
            }
            let cap = if loc == Location::Head { 9 } else { self.max_structure[i] * 2 };
            let armor = self.armor[i] + loc.rear_index().map(|r| self.rear_armor[r]).unwrap_or(0);
            if armor > cap {
                return Err(TemplateError::ArmorAboveCap { name: self.name.clone(), location: loc, armor, cap });
            }
        }
        for w in &self.weapons {
            let ordered = w.min_range <= w.short_range
                && w.short_range <= w.medium_range
                && w.medium_range <= w.long_range;
            if !ordered {
                return Err(TemplateError::BadRanges { name: self.name.clone(), weapon: w.name.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{hunchback_4g, hunchback_4p};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn total_points(u: &UnitState) -> i32 {
        u.armor.iter().sum::<i32>() + u.rear_armor.iter().sum::<i32>() + u.structure.iter().sum::<i32>()
    }

    fn check_conservation(r: &DamageReport) {
        assert_eq!(r.amount, r.armor + r.structure + r.transferred + r.discarded, "{:?}", r);
        if let Some(next) = &r.next {
            assert_eq!(next.amount, r.transferred);
            check_conservation(next);
        }
    }

    #[test]
    fn test_structure_table_lookup() {
        assert_eq!(internal_structure_for(50)[Location::CenterTorso.index()], 16);
        assert_eq!(internal_structure_for(52)[Location::CenterTorso.index()], 16);
        assert_eq!(internal_structure_for(100)[Location::LeftLeg.index()], 21);
        assert_eq!(internal_structure_for(10), internal_structure_for(20));
    }

    #[test]
    fn test_hit_tables() {
        assert_eq!(hit_location(2, false), Location::CenterTorso);
        assert_eq!(hit_location(7, false), Location::CenterTorso);
        assert_eq!(hit_location(12, false), Location::Head);
        assert_eq!(hit_location(12, true), Location::Head);
        assert_eq!(hit_location(1, false), Location::CenterTorso);
    }

    #[test]
    fn test_armor_absorbs_first() {
        let mut unit = hunchback_4p();
        let before = unit.structure;
        let r = unit.apply_damage(Location::CenterTorso, 5, false, &mut rng());
        assert_eq!(r.armor, 5);
        assert_eq!(unit.structure, before);
        check_conservation(&r);
    }

    #[test]
    fn test_rear_armor_pool() {
        let mut unit = hunchback_4p();
        let front = unit.armor_at(Location::CenterTorso);
        let rear = unit.rear_armor[0];
        unit.apply_damage(Location::CenterTorso, 3, true, &mut rng());
        assert_eq!(unit.armor_at(Location::CenterTorso), front);
        assert_eq!(unit.rear_armor[0], rear - 3);
    }

    #[test]
    fn test_overflow_transfers_inward() {
        let mut unit = hunchback_4p();
        unit.armor[Location::LeftArm.index()] = 0;
        let la = unit.structure_at(Location::LeftArm);
        let r = unit.apply_damage(Location::LeftArm, la + 4, false, &mut rng());
        assert!(unit.is_location_destroyed(Location::LeftArm));
        assert!(r.location_destroyed);
        assert_eq!(r.transferred, 4);
        assert_eq!(r.next.as_ref().map(|n| n.location), Some(Location::LeftTorso));
        assert!(unit
            .weapons
            .iter()
            .filter(|w| w.location == Location::LeftArm)
            .all(|w| w.destroyed));
        check_conservation(&r);
    }

    #[test]
    fn test_damage_to_destroyed_location_transfers_in_full() {
        let mut unit = hunchback_4p();
        unit.structure[Location::RightArm.index()] = 0;
        let r = unit.apply_damage(Location::RightArm, 7, false, &mut rng());
        assert_eq!(r.transferred, 7);
        check_conservation(&r);
    }

    #[test]
    fn test_never_negative_and_conserved() {
        let mut r = rng();
        for seed in 0..20u64 {
            let mut unit = hunchback_4g();
            let mut dice = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..30 {
                let loc = Location::ALL[dice.gen_range(0..NUM_LOCATIONS)];
                let report = unit.apply_damage(loc, dice.gen_range(1..25), dice.gen_bool(0.3), &mut r);
                check_conservation(&report);
                assert!(unit.armor.iter().all(|&a| a >= 0));
                assert!(unit.rear_armor.iter().all(|&a| a >= 0));
                assert!(unit.structure.iter().all(|&s| s >= 0));
                for loc in Location::ALL {
                    if unit.is_location_destroyed(loc) {
                        assert!(unit.weapons.iter().filter(|w| w.location == loc).all(|w| w.destroyed));
                    }
                }
            }
        }
    }

    #[test]
    fn test_composite_discards_overflow() {
        let mut unit = hunchback_4p();
        unit.structure_type = StructureType::Composite;
        unit.armor[Location::LeftArm.index()] = 0;
        let before_lt = total_points(&unit) - unit.structure_at(Location::LeftArm);
        let r = unit.apply_damage(Location::LeftArm, 30, false, &mut rng());
        assert!(r.next.is_none());
        assert!(r.discarded > 0);
        check_conservation(&r);
        assert_eq!(total_points(&unit), before_lt);
    }

    #[test]
    fn test_reinforced_halves_structure_damage() {
        let mut unit = hunchback_4p();
        unit.structure_type = StructureType::Reinforced;
        unit.armor[Location::CenterTorso.index()] = 0;
        let ct = unit.structure_at(Location::CenterTorso);
        unit.apply_damage(Location::CenterTorso, 5, false, &mut rng());
        assert_eq!(unit.structure_at(Location::CenterTorso), ct - 3);
    }

    #[test]
    fn test_destruction_rules() {
        let mut unit = hunchback_4p();
        assert!(!unit.is_destroyed());
        unit.structure[Location::LeftTorso.index()] = 0;
        assert!(!unit.is_destroyed(), "standard engine survives a side torso");
        assert!(unit.is_forced_withdrawal());

        unit.engine = EngineType::Xl;
        assert!(unit.is_destroyed());

        unit.engine = EngineType::ClanXl;
        assert!(!unit.is_destroyed());
        unit.structure[Location::RightTorso.index()] = 0;
        assert!(unit.is_destroyed());

        let mut unit = hunchback_4p();
        unit.structure[Location::CenterTorso.index()] = 0;
        assert!(unit.is_destroyed());

        let mut unit = hunchback_4p();
        unit.engine_hits = 3;
        assert!(unit.is_destroyed());
    }

    #[test]
    fn test_forced_withdrawal_rules() {
        let mut unit = hunchback_4p();
        assert!(!unit.is_forced_withdrawal());
        unit.engine_hits = 1;
        assert!(!unit.is_forced_withdrawal());
        unit.gyro_hits = 1;
        assert!(unit.is_forced_withdrawal());

        let mut unit = hunchback_4p();
        for loc in [Location::LeftArm, Location::RightArm, Location::LeftLeg] {
            unit.structure_exposed[loc.index()] = true;
        }
        assert!(unit.is_forced_withdrawal());

        let mut unit = hunchback_4p();
        unit.weapons.clear();
        assert!(unit.is_forced_withdrawal(), "no weapons counts as all destroyed");
    }

    #[test]
    fn test_canonical_ammo_keys() {
        assert_eq!(canonical_ammo_key("IS Ammo AC/20"), "ac/20");
        assert_eq!(canonical_ammo_key("Clan Ammo LRM-20 (OmniPod)"), "lrm-20");
        assert_eq!(canonical_ammo_key("Inner Sphere Heavy Gauss Ammo"), "heavygauss");
        assert_eq!(canonical_ammo_key("IS Ammo AMS"), "ams");
        assert_eq!(canonical_ammo_key("LRM 10 Ammo - Half"), "lrm 10");
    }

    #[test]
    fn test_ammo_explosion_without_case_transfers() {
        let mut unit = hunchback_4g();
        let ct_before = unit.structure_at(Location::CenterTorso);
        let slot = unit.crit_slots[Location::LeftTorso.index()]
            .iter()
            .find(|s| s.contains("Ammo"))
            .cloned()
            .unwrap();
        unit.ammo_explosion(Location::LeftTorso, &slot, &mut rng());
        assert!(unit.is_location_destroyed(Location::LeftTorso));
        assert!(unit.structure_at(Location::CenterTorso) < ct_before);
    }

    #[test]
    fn test_ammo_explosion_with_case_discards() {
        let mut unit = hunchback_4g();
        unit.case[Location::LeftTorso.index()] = true;
        let ct_before = unit.structure_at(Location::CenterTorso);
        let armor_before = unit.armor_at(Location::LeftTorso);
        let slot = unit.crit_slots[Location::LeftTorso.index()]
            .iter()
            .find(|s| s.contains("Ammo"))
            .cloned()
            .unwrap();
        unit.ammo_explosion(Location::LeftTorso, &slot, &mut rng());
        assert!(unit.is_location_destroyed(Location::LeftTorso));
        assert_eq!(unit.structure_at(Location::CenterTorso), ct_before);
        assert_eq!(unit.armor_at(Location::LeftTorso), armor_before, "explosions bypass armor");
    }

    #[test]
    fn test_case_ii_costs_one_structure() {
        let mut unit = hunchback_4g();
        unit.case_ii[Location::LeftTorso.index()] = true;
        let lt = unit.structure_at(Location::LeftTorso);
        let slot = unit.crit_slots[Location::LeftTorso.index()]
            .iter()
            .find(|s| s.contains("Ammo"))
            .cloned()
            .unwrap();
        unit.ammo_explosion(Location::LeftTorso, &slot, &mut rng());
        assert!(unit.structure_at(Location::LeftTorso) <= lt - 1);
        assert!(!unit.is_location_destroyed(Location::LeftTorso) || lt <= 2);
    }

    #[test]
    fn test_gauss_ammo_never_explodes() {
        let mut unit = hunchback_4g();
        unit.crit_slots[Location::RightTorso.index()].push("IS Gauss Ammo".to_string());
        unit.ammo.insert("gauss".to_string(), 16);
        let before = unit.clone();
        unit.ammo_explosion(Location::RightTorso, "IS Gauss Ammo", &mut rng());
        assert_eq!(unit, before);
    }

    #[test]
    fn test_crit_dispatch() {
        let mut unit = hunchback_4p();
        unit.crit_slots[Location::CenterTorso.index()] = vec!["Gyro".to_string()];
        unit.apply_crit(Location::CenterTorso, &mut rng());
        assert_eq!(unit.gyro_hits, 1);
        assert!(unit.needs_psr);

        unit.crit_slots[Location::LeftArm.index()] = vec!["Lower Arm Actuator".to_string()];
        unit.apply_crit(Location::LeftArm, &mut rng());
        assert_eq!(unit.arm_actuator_hits[Location::LeftArm.index()], 1);

        let dissipation = unit.dissipation;
        unit.crit_slots[Location::RightArm.index()] = vec!["Heat Sink".to_string()];
        unit.apply_crit(Location::RightArm, &mut rng());
        assert_eq!(unit.dissipation, dissipation - 1);

        unit.crit_slots[Location::LeftLeg.index()] = vec!["Hip".to_string()];
        let walk = unit.effective_walk_mp();
        unit.apply_crit(Location::LeftLeg, &mut rng());
        unit.apply_crit(Location::LeftLeg, &mut rng());
        assert_eq!(unit.leg_mp_penalty, walk, "hip penalty applies once");
        assert_eq!(unit.effective_walk_mp(), 0);
    }

    #[test]
    fn test_crit_destroys_named_weapon() {
        let mut unit = hunchback_4p();
        unit.crit_slots[Location::Head.index()] = vec!["Small Laser".to_string(), "-Empty-".to_string()];
        unit.apply_crit(Location::Head, &mut rng());
        assert!(unit.weapons.iter().find(|w| w.name == "Small Laser").unwrap().destroyed);
    }

    /// Unit whose center torso holds nothing but engine slots
    fn engine_only_ct() -> UnitState {
        let mut unit = hunchback_4p();
        unit.crit_slots[Location::CenterTorso.index()] = vec!["Fusion Engine".to_string(); 6];
        unit
    }

    #[test]
    fn test_crit_roll_table() {
        let ct = Location::CenterTorso;
        assert_eq!(crit_roll_result(2, ct), CritRoll::NoCrit);
        assert_eq!(crit_roll_result(7, ct), CritRoll::NoCrit);
        assert_eq!(crit_roll_result(8, ct), CritRoll::Slots(1));
        assert_eq!(crit_roll_result(9, Location::LeftArm), CritRoll::Slots(1));
        assert_eq!(crit_roll_result(10, ct), CritRoll::Slots(2));
        assert_eq!(crit_roll_result(11, Location::Head), CritRoll::Slots(2));
        assert_eq!(crit_roll_result(12, Location::RightTorso), CritRoll::Slots(3));
        assert_eq!(crit_roll_result(12, Location::LeftArm), CritRoll::LimbBlownOff);
        assert_eq!(crit_roll_result(12, Location::RightLeg), CritRoll::LimbBlownOff);
        assert_eq!(crit_roll_result(12, Location::Head), CritRoll::CockpitDestroyed);
    }

    #[test]
    fn test_crit_count_applied_per_roll() {
        for (roll, hits) in [(7, 0), (8, 1), (9, 1), (10, 2), (11, 2), (12, 3)] {
            let mut unit = engine_only_ct();
            unit.resolve_crit_roll(Location::CenterTorso, roll, false, &mut rng());
            assert_eq!(unit.engine_hits, hits, "roll {}", roll);
        }
    }

    #[test]
    fn test_crit_twelve_blows_off_limb() {
        let mut unit = hunchback_4p();
        unit.resolve_crit_roll(Location::LeftArm, 12, false, &mut rng());
        assert!(unit.is_location_destroyed(Location::LeftArm));
        assert!(unit
            .weapons
            .iter()
            .filter(|w| w.location == Location::LeftArm)
            .all(|w| w.destroyed));
        assert!(!unit.is_location_destroyed(Location::RightArm));
    }

    #[test]
    fn test_crit_twelve_on_head_kills_cockpit() {
        let mut unit = hunchback_4p();
        unit.resolve_crit_roll(Location::Head, 12, false, &mut rng());
        assert!(unit.cockpit_hit);
        assert!(unit.is_destroyed());
    }

    #[test]
    fn test_reinforced_structure_lowers_crit_roll() {
        for seed in 0..200 {
            let mut roller = ChaCha8Rng::seed_from_u64(seed);
            let raw = roll_2d6(&mut roller.clone());

            let mut unit = engine_only_ct();
            unit.structure_type = StructureType::Reinforced;
            unit.roll_crits(Location::CenterTorso, &mut roller);

            let expected = match crit_roll_result(raw - 1, Location::CenterTorso) {
                CritRoll::Slots(n) => n,
                _ => 0,
            };
            assert_eq!(unit.engine_hits, expected, "seed {} raw roll {}", seed, raw);
        }
    }

    #[test]
    fn test_filtered_crits_land_below_eight() {
        // Each of the two crits from a 10 survives the filter with p = 21/36
        let trials = 2000;
        let mut landed = 0;
        let mut rng = rng();
        for _ in 0..trials {
            let mut unit = engine_only_ct();
            unit.resolve_crit_roll(Location::CenterTorso, 10, true, &mut rng);
            assert!(unit.engine_hits <= 2);
            landed += unit.engine_hits;
        }
        let mean = landed as f64 / trials as f64;
        assert!((mean - 2.0 * 21.0 / 36.0).abs() < 0.1, "mean {}", mean);
    }

    #[test]
    fn test_fall_knocks_prone_and_damages() {
        let mut unit = hunchback_4p();
        let before = total_points(&unit);
        unit.apply_fall(&mut rng());
        assert!(unit.prone);
        assert_eq!(before - total_points(&unit), (unit.tonnage + 9) / 10);
    }

    #[test]
    fn test_stability_auto_results() {
        let mut unit = hunchback_4p();
        unit.prone = true;
        assert!(unit.roll_stability(20, &mut rng()));
        unit.prone = false;
        unit.gyro_hits = 2;
        assert!(!unit.roll_stability(-20, &mut rng()));
    }

    #[test]
    fn test_psr_modifier() {
        let mut unit = hunchback_4p();
        unit.gyro_hits = 1;
        unit.hip_hit[Location::LeftLeg.index()] = true;
        unit.leg_foot_hits[Location::RightLeg.index()] = 1;
        assert_eq!(unit.psr_modifier(), 3 + 2 + 1);
    }

    #[test]
    fn test_validate() {
        let unit = hunchback_4p();
        assert!(unit.validate().is_ok());

        let mut bad = unit.clone();
        bad.tonnage = 0;
        assert!(matches!(bad.validate(), Err(TemplateError::NonPositiveTonnage { .. })));

        let mut bad = unit.clone();
        bad.armor[Location::Head.index()] = 12;
        assert!(matches!(bad.validate(), Err(TemplateError::ArmorAboveCap { .. })));
    }

    #[test]
    fn test_effective_mp() {
        let mut unit = hunchback_4p();
        assert_eq!(unit.effective_walk_mp(), 4);
        assert_eq!(unit.effective_run_mp(), 6);
        unit.heat = 10;
        assert_eq!(unit.effective_walk_mp(), 2);
        unit.structure[Location::LeftLeg.index()] = 0;
        assert_eq!(unit.effective_walk_mp(), 0);
    }
}
