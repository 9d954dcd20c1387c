//! Line of sight with woods, buildings and elevation

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::board::{Board, TerrainType};
use crate::hex::{hex_line, HexCoord};

/// Result of a line-of-sight check
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LosResult {
    pub visible: bool,
    /// +1 for a single intervening light woods hex
    pub woods_mod: i32,
    /// Woods level of the target's own hex
    pub target_cover: i32,
    /// -1 when shooting down, +1 when shooting up
    pub elevation_mod: i32,
}

impl LosResult {
    /// Total to-hit modifier from terrain
    pub fn to_hit_mod(&self) -> i32 {
        self.woods_mod + self.target_cover + self.elevation_mod
    }
}

pub fn check_los(board: &Board, from: HexCoord, to: HexCoord) -> LosResult {
    let (Some(from_hex), Some(to_hex)) = (board.get(from), board.get(to)) else {
        return LosResult::default();
    };

    let from_level = from_hex.elevation + 1;
    let to_level = to_hex.elevation + 1;
    let min_elevation = from_hex.elevation.min(to_hex.elevation);

    let elevation_mod = match from_hex.elevation.cmp(&to_hex.elevation) {
        std::cmp::Ordering::Greater => -1,
        std::cmp::Ordering::Less => 1,
        std::cmp::Ordering::Equal => 0,
    };
    let target_cover = to_hex.terrain_level(TerrainType::Woods);

    let blocked = LosResult { visible: false, woods_mod: 0, target_cover, elevation_mod };

    let mut woods_count = 0;
    for h in hex_line(from, to) {
        let Some(hex) = board.get(h) else { continue };
        let woods = hex.terrain_level(TerrainType::Woods);
        let building = hex.terrain_level(TerrainType::Building);

        let mut level = hex.elevation + building;
        if woods > 0 {
            level += 2;
        }
        if level > from_level && level > to_level {
            return blocked;
        }
        if building >= 3 && hex.elevation >= min_elevation {
            return blocked;
        }
        if woods > 0 && hex.elevation >= min_elevation {
            woods_count += woods;
        }
    }

    if woods_count >= 2 {
        return blocked;
    }
    LosResult { visible: true, woods_mod: woods_count, target_cover, elevation_mod }
}

/// Memoised LOS results for one tactical decision.
///
/// Keys are order-sensitive since cover and elevation depend on direction.
#[derive(Debug, Default)]
pub struct LosCache {
    entries: FxHashMap<u64, LosResult>,
}

impl LosCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(from: HexCoord, to: HexCoord) -> u64 {
        let part = |v: i32| (v as u16) as u64;
        part(from.col) << 48 | part(from.row) << 32 | part(to.col) << 16 | part(to.row)
    }

    pub fn check(&mut self, board: &Board, from: HexCoord, to: HexCoord) -> LosResult {
        *self
            .entries
            .entry(Self::key(from, to))
            .or_insert_with(|| check_los(board, from, to))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_board() -> Board {
        Board::new(10, 12)
    }

    #[test]
    fn test_clear_los() {
        let board = open_board();
        let los = check_los(&board, HexCoord::new(5, 2), HexCoord::new(5, 10));
        assert!(los.visible);
        assert_eq!(los.to_hit_mod(), 0);
    }

    #[test]
    fn test_off_board_not_visible() {
        let board = open_board();
        assert!(!check_los(&board, HexCoord::new(5, 2), HexCoord::new(50, 2)).visible);
        assert!(!check_los(&board, HexCoord::new(0, 0), HexCoord::new(5, 2)).visible);
    }

    #[test]
    fn test_woods_between_ground_units_block() {
        let board = open_board().with_terrain(HexCoord::new(5, 5), TerrainType::Woods, 1);
        let los = check_los(&board, HexCoord::new(5, 2), HexCoord::new(5, 8));
        assert!(!los.visible);
    }

    #[test]
    fn test_light_woods_adds_modifier() {
        let board = open_board()
            .with_elevation(HexCoord::new(5, 8), 1)
            .with_terrain(HexCoord::new(5, 5), TerrainType::Woods, 1);
        let los = check_los(&board, HexCoord::new(5, 2), HexCoord::new(5, 8));
        assert!(los.visible);
        assert_eq!(los.woods_mod, 1);

        let heavy = board.with_terrain(HexCoord::new(5, 5), TerrainType::Woods, 2);
        assert!(!check_los(&heavy, HexCoord::new(5, 2), HexCoord::new(5, 8)).visible);
    }

    #[test]
    fn test_woods_counting_from_elevated_shooter() {
        // Raised endpoints keep woods below sight height, so only the count matters
        let board = open_board()
            .with_elevation(HexCoord::new(5, 2), 2)
            .with_elevation(HexCoord::new(5, 8), 2)
            .with_elevation(HexCoord::new(5, 5), 2)
            .with_terrain(HexCoord::new(5, 5), TerrainType::Woods, 1);
        let los = check_los(&board, HexCoord::new(5, 2), HexCoord::new(5, 8));
        assert!(!los.visible, "woods at elevation 2 rise to 4, above both sight lines");

        let board = open_board()
            .with_elevation(HexCoord::new(5, 2), 2)
            .with_elevation(HexCoord::new(5, 8), 2)
            .with_terrain(HexCoord::new(5, 5), TerrainType::Woods, 1);
        let los = check_los(&board, HexCoord::new(5, 2), HexCoord::new(5, 8));
        assert!(los.visible);
        assert_eq!(los.woods_mod, 0, "woods below the lower endpoint elevation don't count");
    }

    #[test]
    fn test_target_cover_and_elevation() {
        let board = open_board()
            .with_terrain(HexCoord::new(5, 8), TerrainType::Woods, 2)
            .with_elevation(HexCoord::new(5, 2), 1);
        let los = check_los(&board, HexCoord::new(5, 2), HexCoord::new(5, 8));
        assert!(los.visible);
        assert_eq!(los.target_cover, 2);
        assert_eq!(los.elevation_mod, -1);

        let back = check_los(&board, HexCoord::new(5, 8), HexCoord::new(5, 2));
        assert_eq!(back.target_cover, 0);
        assert_eq!(back.elevation_mod, 1);
    }

    #[test]
    fn test_tall_building_blocks() {
        let board = open_board().with_terrain(HexCoord::new(5, 5), TerrainType::Building, 3);
        assert!(!check_los(&board, HexCoord::new(5, 2), HexCoord::new(5, 8)).visible);
    }

    #[test]
    fn test_hill_blocks() {
        let board = open_board().with_elevation(HexCoord::new(5, 5), 2);
        assert!(!check_los(&board, HexCoord::new(5, 2), HexCoord::new(5, 8)).visible);
        let board = open_board().with_elevation(HexCoord::new(5, 5), 1);
        assert!(check_los(&board, HexCoord::new(5, 2), HexCoord::new(5, 8)).visible);
    }

    #[test]
    fn test_cache_is_order_sensitive() {
        let board = open_board().with_terrain(HexCoord::new(5, 8), TerrainType::Woods, 1);
        let mut cache = LosCache::new();
        let a = cache.check(&board, HexCoord::new(5, 2), HexCoord::new(5, 8));
        let b = cache.check(&board, HexCoord::new(5, 8), HexCoord::new(5, 2));
        assert_eq!(cache.len(), 2);
        assert_eq!(a.target_cover, 1);
        assert_eq!(b.target_cover, 0);
        assert_eq!(cache.check(&board, HexCoord::new(5, 2), HexCoord::new(5, 8)), a);
        assert_eq!(cache.len(), 2);
    }
}
