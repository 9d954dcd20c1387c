//! Weapon definitions and category classification

use serde::{Deserialize, Serialize};

use crate::unit::Location;

/// Resolution family of a weapon; each family has its own firing rules
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponCategory {
    #[default]
    Standard,
    Lrm,
    Srm,
    Mrm,
    StreakSrm,
    StreakLrm,
    UltraAc,
    RotaryAc,
    Lbx,
    Hag,
    Atm,
    Mml,
    ArrowIv,
    RocketLauncher,
    PlasmaCannon,
    PlasmaRifle,
    Vsp,
}

impl WeaponCategory {
    /// Classify a weapon by its name
    pub fn from_name(name: &str) -> Self {
        let n = name.to_uppercase();
        if n.contains("STREAK LRM") {
            Self::StreakLrm
        } else if n.contains("STREAK SRM") {
            Self::StreakSrm
        } else if n.contains("ROCKET LAUNCHER") {
            Self::RocketLauncher
        } else if n.contains("PLASMA CANNON") {
            Self::PlasmaCannon
        } else if n.contains("PLASMA RIFLE") {
            Self::PlasmaRifle
        } else if n.contains("MML") {
            Self::Mml
        } else if n.contains("ATM") && !n.contains("ANTI") {
            Self::Atm
        } else if n.contains("ARROW IV") {
            Self::ArrowIv
        } else if n.contains("HAG") {
            Self::Hag
        } else if n.contains("ROTARY AC") || n.contains("RAC/") {
            Self::RotaryAc
        } else if n.contains("ULTRA AC") || n.contains("UAC/") {
            Self::UltraAc
        } else if n.contains("LB") && n.contains("AC") {
            Self::Lbx
        } else if n.contains("MRM") {
            Self::Mrm
        } else if n.contains("SRM") {
            Self::Srm
        } else if n.contains("LRM") {
            Self::Lrm
        } else if n.contains("VSP") {
            Self::Vsp
        } else {
            Self::Standard
        }
    }

    /// Weapons that fire a single slug/beam rather than missiles
    pub fn is_direct_fire(self) -> bool {
        matches!(
            self,
            Self::Standard | Self::UltraAc | Self::RotaryAc | Self::Lbx | Self::Hag
        )
    }

    /// Missile families that AMS can engage
    pub fn is_missile(self) -> bool {
        matches!(
            self,
            Self::Lrm
                | Self::Srm
                | Self::Mrm
                | Self::StreakSrm
                | Self::StreakLrm
                | Self::Atm
                | Self::Mml
                | Self::RocketLauncher
        )
    }

    /// Families that benefit from Artemis fire control
    pub fn uses_artemis(self) -> bool {
        matches!(self, Self::Lrm | Self::Srm | Self::Mml | Self::Atm)
    }

    /// Heat multiplier for rapid-fire autocannons
    pub fn heat_multiplier(self) -> i32 {
        match self {
            Self::UltraAc => 2,
            Self::RotaryAc => 4,
            _ => 1,
        }
    }
}

/// One mounted weapon
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    #[serde(default)]
    pub category: WeaponCategory,
    pub location: Location,
    pub damage: i32,
    pub heat: i32,
    #[serde(default)]
    pub min_range: i32,
    pub short_range: i32,
    pub medium_range: i32,
    pub long_range: i32,
    #[serde(default)]
    pub rack_size: i32,
    #[serde(default)]
    pub to_hit_mod: i32,
    /// Canonical ammo key; empty for weapons that need no ammo
    #[serde(default)]
    pub ammo_key: String,
    #[serde(default)]
    pub destroyed: bool,
    #[serde(default)]
    pub jammed: bool,
}

impl Weapon {
    /// New weapon, category classified from the name
    pub fn new(name: &str, location: Location, damage: i32, heat: i32, ranges: (i32, i32, i32, i32)) -> Self {
        let (min_range, short_range, medium_range, long_range) = ranges;
        Self {
            name: name.to_string(),
            category: WeaponCategory::from_name(name),
            location,
            damage,
            heat,
            min_range,
            short_range,
            medium_range,
            long_range,
            rack_size: 0,
            to_hit_mod: 0,
            ammo_key: String::new(),
            destroyed: false,
            jammed: false,
        }
    }

    pub fn with_rack(mut self, rack_size: i32) -> Self {
        self.rack_size = rack_size;
        self
    }

    pub fn with_ammo(mut self, key: &str) -> Self {
        self.ammo_key = crate::unit::canonical_ammo_key(key);
        self
    }

    pub fn with_to_hit(mut self, modifier: i32) -> Self {
        self.to_hit_mod = modifier;
        self
    }

    pub fn needs_ammo(&self) -> bool {
        !self.ammo_key.is_empty()
    }

    /// Heat generated per firing, including rapid-fire multipliers
    pub fn effective_heat(&self) -> i32 {
        self.heat * self.category.heat_multiplier()
    }
}
