//! Hex grid geometry with 1-indexed odd-q offset coordinates
//!
//! Columns are numbered from 1; even columns sit half a hex lower than odd
//! columns. All distance and direction math goes through cube coordinates.

use serde::{Deserialize, Serialize};

/// Direction names, index 0-5 clockwise from north
pub const DIRECTION_NAMES: [&str; 6] = ["N", "NE", "SE", "S", "SW", "NW"];

/// Cube unit vectors (q, r, s) for each facing
/// Index: 0=N, 1=NE, 2=SE, 3=S, 4=SW, 5=NW
pub const FACING_VECTORS: [(i32, i32, i32); 6] = [
    (0, 1, -1),  // N
    (1, 0, -1),  // NE
    (1, -1, 0),  // SE
    (0, -1, 1),  // S
    (-1, 0, 1),  // SW
    (-1, 1, 0),  // NW
];

/// Offset steps (dcol, drow) for odd columns, same order as FACING_VECTORS
const ODD_COLUMN_STEPS: [(i32, i32); 6] = [(0, -1), (1, -1), (1, 0), (0, 1), (-1, 0), (-1, -1)];

/// Offset steps (dcol, drow) for even columns, which sit half a hex lower
const EVEN_COLUMN_STEPS: [(i32, i32); 6] = [(0, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0)];

/// Offset hex coordinate (1-indexed, odd-q layout)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HexCoord {
    pub col: i32,
    pub row: i32,
}

/// Cube coordinate, q + r + s == 0
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeCoord {
    pub q: i32,
    pub r: i32,
    pub s: i32,
}

/// Firing arc of a target relative to a unit's facing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arc {
    Front,
    Left,
    Right,
    Rear,
}

impl HexCoord {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub fn to_cube(self) -> CubeCoord {
        offset_to_cube(self)
    }

    pub fn distance_to(self, other: HexCoord) -> i32 {
        distance(self, other)
    }

    /// Neighbor in direction (0-5), may be off-board
    pub fn neighbor(self, direction: u8) -> HexCoord {
        let steps = if self.col.rem_euclid(2) == 1 {
            &ODD_COLUMN_STEPS
        } else {
            &EVEN_COLUMN_STEPS
        };
        let (dc, dr) = steps[direction as usize % 6];
        HexCoord::new(self.col + dc, self.row + dr)
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}{:02}", self.col, self.row)
    }
}

impl CubeCoord {
    pub const fn new(q: i32, r: i32, s: i32) -> Self {
        Self { q, r, s }
    }

    pub fn to_offset(self) -> HexCoord {
        cube_to_offset(self)
    }
}

// ============================================================================
// CONVERSION AND DISTANCE
// ============================================================================

pub fn offset_to_cube(h: HexCoord) -> CubeCoord {
    let q = h.col - 1;
    let r0 = h.row - 1;
    let s = r0 - (q - (q & 1)) / 2;
    CubeCoord::new(q, -q - s, s)
}

pub fn cube_to_offset(c: CubeCoord) -> HexCoord {
    let col = c.q + 1;
    let row = c.s + (c.q - (c.q & 1)) / 2 + 1;
    HexCoord::new(col, row)
}

pub fn cube_distance(a: CubeCoord, b: CubeCoord) -> i32 {
    ((a.q - b.q).abs() + (a.r - b.r).abs() + (a.s - b.s).abs()) / 2
}

pub fn distance(a: HexCoord, b: HexCoord) -> i32 {
    cube_distance(offset_to_cube(a), offset_to_cube(b))
}

/// All six neighbors in direction order, including off-board ones
pub fn neighbors(h: HexCoord) -> [HexCoord; 6] {
    std::array::from_fn(|d| h.neighbor(d as u8))
}

/// Round fractional cube coordinates to the nearest hex.
///
/// The axis with the largest rounding error is rebuilt from the other two.
pub fn cube_round(q: f64, r: f64, s: f64) -> CubeCoord {
    let mut rq = q.round();
    let mut rr = r.round();
    let mut rs = s.round();
    let dq = (rq - q).abs();
    let dr = (rr - r).abs();
    let ds = (rs - s).abs();

    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    } else {
        rs = -rq - rr;
    }
    CubeCoord::new(rq as i32, rr as i32, rs as i32)
}

/// Hexes strictly between `a` and `b`, sampled at unit steps along the cube line
pub fn hex_line(a: HexCoord, b: HexCoord) -> Vec<HexCoord> {
    let ca = offset_to_cube(a);
    let cb = offset_to_cube(b);
    let dist = cube_distance(ca, cb);
    if dist <= 1 {
        return Vec::new();
    }

    let lerp = |x: i32, y: i32, t: f64| x as f64 + (y - x) as f64 * t;
    (1..dist)
        .map(|i| {
            let t = i as f64 / dist as f64;
            cube_round(lerp(ca.q, cb.q, t), lerp(ca.r, cb.r, t), lerp(ca.s, cb.s, t)).to_offset()
        })
        .collect()
}

// ============================================================================
// FACING AND ARCS
// ============================================================================

/// Normalize any integer direction into 0-5
pub fn normalize_facing(f: i32) -> u8 {
    f.rem_euclid(6) as u8
}

/// Direction whose unit vector best matches the displacement; same hex gives 0
pub fn facing_towards(from: HexCoord, to: HexCoord) -> u8 {
    let a = offset_to_cube(from);
    let b = offset_to_cube(to);
    let (dq, dr, ds) = (b.q - a.q, b.r - a.r, b.s - a.s);
    if dq == 0 && dr == 0 && ds == 0 {
        return 0;
    }

    let mut best = 0;
    let mut best_dot = i32::MIN;
    for (i, &(vq, vr, vs)) in FACING_VECTORS.iter().enumerate() {
        let dot = dq * vq + dr * vr + ds * vs;
        if dot > best_dot {
            best_dot = dot;
            best = i as u8;
        }
    }
    best
}

/// Arc of `target` as seen from `origin` facing `facing`
pub fn arc_of(origin: HexCoord, facing: u8, target: HexCoord) -> Arc {
    let dir = facing_towards(origin, target) as i32;
    match (dir - facing as i32).rem_euclid(6) {
        0 | 1 | 5 => Arc::Front,
        2 => Arc::Right,
        4 => Arc::Left,
        _ => Arc::Rear,
    }
}

/// Torso twist (-1, 0, +1) that best brings `target` to bear.
///
/// Prefers a twist that puts the target in the front arc, then one that at
/// least keeps it out of the rear arc.
pub fn best_torso_twist(pos: HexCoord, facing: u8, target: HexCoord) -> i8 {
    let twisted = |t: i8| normalize_facing(facing as i32 + t as i32);

    for t in [0i8, -1, 1] {
        if arc_of(pos, twisted(t), target) == Arc::Front {
            return t;
        }
    }
    for t in [-1i8, 1] {
        if arc_of(pos, twisted(t), target) != Arc::Rear {
            return t;
        }
    }
    0
}
