//! Reference unit templates and template builders

use crate::unit::{canonical_ammo_key, internal_structure_for, Location, UnitState, NUM_LOCATIONS};
use crate::weapon::Weapon;

/// Standard armor spread shared by the Hunchback variants
const HUNCHBACK_ARMOR: [i32; NUM_LOCATIONS] = [9, 26, 20, 20, 16, 16, 20, 20];
const HUNCHBACK_REAR: [i32; 3] = [5, 4, 4];

const ARM_ACTUATORS: [&str; 4] = ["Shoulder", "Upper Arm Actuator", "Lower Arm Actuator", "Hand Actuator"];
const LEG_ACTUATORS: [&str; 4] = ["Hip", "Upper Leg Actuator", "Lower Leg Actuator", "Foot Actuator"];

fn slots(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn with_actuators(actuators: &[&str], extra: &[&str]) -> Vec<String> {
    let mut out = slots(actuators);
    out.extend(extra.iter().map(|s| s.to_string()));
    out
}

impl UnitState {
    /// Bare template: structure from the tonnage table, no armor or weapons
    pub fn template(name: &str, tonnage: i32, walk_mp: i32, jump_mp: i32, heat_sinks: i32, dissipation: i32) -> Self {
        let structure = internal_structure_for(tonnage);
        Self {
            name: name.to_string(),
            tonnage,
            walk_mp,
            run_mp: (walk_mp * 3 + 1) / 2,
            jump_mp,
            heat_sinks,
            dissipation,
            structure,
            max_structure: structure,
            ..Default::default()
        }
    }

    pub fn with_armor(mut self, front: [i32; NUM_LOCATIONS], rear: [i32; 3]) -> Self {
        self.armor = front;
        self.rear_armor = rear;
        self
    }

    pub fn with_weapon(mut self, weapon: Weapon) -> Self {
        self.weapons.push(weapon);
        self
    }

    pub fn with_slots(mut self, loc: Location, names: Vec<String>) -> Self {
        self.crit_slots[loc.index()] = names;
        self
    }

    /// Add shots to an ammo pool; the key is canonicalized
    pub fn with_ammo(mut self, name: &str, shots: i32) -> Self {
        *self.ammo.entry(canonical_ammo_key(name)).or_insert(0) += shots;
        self
    }

    /// Standard head, center torso and leg slots
    fn with_standard_frame(self) -> Self {
        self.with_slots(
            Location::Head,
            slots(&["Life Support", "Sensors", "Cockpit", "Small Laser", "Sensors", "Life Support"]),
        )
        .with_slots(
            Location::CenterTorso,
            slots(&[
                "Fusion Engine", "Fusion Engine", "Fusion Engine", "Gyro", "Gyro", "Gyro", "Gyro",
                "Fusion Engine", "Fusion Engine", "Fusion Engine", "-Empty-", "-Empty-",
            ]),
        )
        .with_slots(Location::LeftLeg, with_actuators(&LEG_ACTUATORS, &["-Empty-", "-Empty-"]))
        .with_slots(Location::RightLeg, with_actuators(&LEG_ACTUATORS, &["-Empty-", "-Empty-"]))
    }
}

/// Hunchback HBK-4G: AC/20 in the right torso, ammo in the left
pub fn hunchback_4g() -> UnitState {
    UnitState::template("Hunchback HBK-4G", 50, 4, 0, 13, 13)
        .with_armor(HUNCHBACK_ARMOR, HUNCHBACK_REAR)
        .with_standard_frame()
        .with_slots(
            Location::LeftTorso,
            slots(&["IS Ammo AC/20", "IS Ammo AC/20", "Heat Sink", "-Empty-", "-Empty-", "-Empty-"]),
        )
        .with_slots(
            Location::RightTorso,
            {
                let mut s = vec!["Autocannon/20".to_string(); 10];
                s.push("Heat Sink".to_string());
                s.push("Heat Sink".to_string());
                s
            },
        )
        .with_slots(Location::LeftArm, with_actuators(&ARM_ACTUATORS, &["Medium Laser"]))
        .with_slots(Location::RightArm, with_actuators(&ARM_ACTUATORS, &["Medium Laser"]))
        .with_weapon(
            Weapon::new("Autocannon/20", Location::RightTorso, 20, 7, (0, 3, 6, 9)).with_ammo("IS Ammo AC/20"),
        )
        .with_weapon(Weapon::new("Medium Laser", Location::LeftArm, 5, 3, (0, 3, 6, 9)))
        .with_weapon(Weapon::new("Medium Laser", Location::RightArm, 5, 3, (0, 3, 6, 9)))
        .with_weapon(Weapon::new("Small Laser", Location::Head, 3, 1, (0, 1, 2, 3)))
        .with_ammo("IS Ammo AC/20", 10)
}

/// Hunchback HBK-4P: six medium lasers in the right torso, no ammo
pub fn hunchback_4p() -> UnitState {
    let mut rt = vec!["Medium Laser".to_string(); 6];
    rt.extend(std::iter::repeat("Heat Sink".to_string()).take(6));

    let mut unit = UnitState::template("Hunchback HBK-4P", 50, 4, 0, 23, 23)
        .with_armor(HUNCHBACK_ARMOR, HUNCHBACK_REAR)
        .with_standard_frame()
        .with_slots(
            Location::LeftTorso,
            slots(&["Heat Sink", "Heat Sink", "Heat Sink", "Heat Sink", "-Empty-", "-Empty-"]),
        )
        .with_slots(Location::RightTorso, rt)
        .with_slots(Location::LeftArm, with_actuators(&ARM_ACTUATORS, &["Medium Laser", "Heat Sink"]))
        .with_slots(Location::RightArm, with_actuators(&ARM_ACTUATORS, &["Medium Laser", "Heat Sink"]));

    for _ in 0..6 {
        unit = unit.with_weapon(Weapon::new("Medium Laser", Location::RightTorso, 5, 3, (0, 3, 6, 9)));
    }
    unit.with_weapon(Weapon::new("Medium Laser", Location::LeftArm, 5, 3, (0, 3, 6, 9)))
        .with_weapon(Weapon::new("Medium Laser", Location::RightArm, 5, 3, (0, 3, 6, 9)))
        .with_weapon(Weapon::new("Small Laser", Location::Head, 3, 1, (0, 1, 2, 3)))
}
