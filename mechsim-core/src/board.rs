//! Battlefield boards: a column-major grid of hexes with terrain

use serde::{Deserialize, Serialize};

use crate::error::BoardError;
use crate::hex::HexCoord;

/// Width and height of a standard mapsheet
pub const MAPSHEET_WIDTH: i32 = 16;
pub const MAPSHEET_HEIGHT: i32 = 17;

/// Terrain feature kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainType {
    /// Level 1 light, level 2 heavy
    Woods,
    /// Level is depth
    Water,
    Rough,
    Pavement,
    Road,
    /// Level is building height
    Building,
    Sand,
    Swamp,
    Mud,
}

/// One terrain feature on a hex
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terrain {
    pub kind: TerrainType,
    pub level: i32,
}

impl Terrain {
    pub const fn new(kind: TerrainType, level: i32) -> Self {
        Self { kind, level }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hex {
    pub coord: HexCoord,
    #[serde(default)]
    pub elevation: i32,
    #[serde(default)]
    pub terrain: Vec<Terrain>,
}

impl Hex {
    pub fn clear(coord: HexCoord) -> Self {
        Self { coord, elevation: 0, terrain: Vec::new() }
    }

    /// Level of the given terrain kind, 0 if absent
    pub fn terrain_level(&self, kind: TerrainType) -> i32 {
        self.terrain
            .iter()
            .find(|t| t.kind == kind)
            .map(|t| t.level)
            .unwrap_or(0)
    }

    pub fn has_woods(&self) -> bool {
        self.terrain_level(TerrainType::Woods) > 0
    }

    /// Replace (or add) a terrain feature
    pub fn set_terrain(&mut self, kind: TerrainType, level: i32) {
        self.terrain.retain(|t| t.kind != kind);
        if level > 0 {
            self.terrain.push(Terrain::new(kind, level));
        }
    }
}

/// Serialized board layout; converted through `Board::from_hexes`
#[derive(Clone, Debug, Serialize, Deserialize)]
struct BoardData {
    width: i32,
    height: i32,
    hexes: Vec<Hex>,
}

/// Rectangular hex board, immutable once built
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BoardData", into = "BoardData")]
pub struct Board {
    width: i32,
    height: i32,
    /// Column-major: index = (col - 1) * height + (row - 1)
    hexes: Vec<Hex>,
}

impl TryFrom<BoardData> for Board {
    type Error = BoardError;

    fn try_from(data: BoardData) -> Result<Self, Self::Error> {
        Board::from_hexes(data.width, data.height, data.hexes)
    }
}

impl From<Board> for BoardData {
    fn from(board: Board) -> Self {
        BoardData { width: board.width, height: board.height, hexes: board.hexes }
    }
}

impl Board {
    /// Open board with no terrain and flat elevation
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut hexes = Vec::with_capacity((width * height) as usize);
        for col in 1..=width {
            for row in 1..=height {
                hexes.push(Hex::clear(HexCoord::new(col, row)));
            }
        }
        Self { width, height, hexes }
    }

    /// Standard 16x17 mapsheet with no terrain
    pub fn mapsheet() -> Self {
        Self::new(MAPSHEET_WIDTH, MAPSHEET_HEIGHT)
    }

    /// Build a board from an unordered list of hexes.
    ///
    /// Every coordinate in the grid must be covered exactly once.
    pub fn from_hexes(width: i32, height: i32, hexes: Vec<Hex>) -> Result<Self, BoardError> {
        if width <= 0 || height <= 0 {
            return Err(BoardError::InvalidDimensions { width, height });
        }
        let mut board = Self::new(width, height);
        let mut seen = vec![false; board.hexes.len()];
        for hex in hexes {
            let idx = board
                .index(hex.coord)
                .ok_or(BoardError::OutOfBounds { coord: hex.coord, width, height })?;
            if seen[idx] {
                return Err(BoardError::DuplicateHex(hex.coord));
            }
            seen[idx] = true;
            board.hexes[idx] = hex;
        }
        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(BoardError::MissingHex(board.hexes[missing].coord));
        }
        Ok(board)
    }

    /// Place `b` to the right of `a`; height is the taller of the two
    pub fn combine(a: &Board, b: &Board) -> Board {
        let mut out = Board::new(a.width + b.width, a.height.max(b.height));
        for hex in a.hexes.iter() {
            if let Some(idx) = out.index(hex.coord) {
                out.hexes[idx] = hex.clone();
            }
        }
        for hex in b.hexes.iter() {
            let coord = HexCoord::new(hex.coord.col + a.width, hex.coord.row);
            if let Some(idx) = out.index(coord) {
                out.hexes[idx] = Hex { coord, ..hex.clone() };
            }
        }
        out
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, h: HexCoord) -> bool {
        h.col >= 1 && h.col <= self.width && h.row >= 1 && h.row <= self.height
    }

    fn index(&self, h: HexCoord) -> Option<usize> {
        self.in_bounds(h)
            .then(|| ((h.col - 1) * self.height + (h.row - 1)) as usize)
    }

    pub fn get(&self, h: HexCoord) -> Option<&Hex> {
        self.index(h).map(|i| &self.hexes[i])
    }

    pub fn hexes(&self) -> impl Iterator<Item = &Hex> {
        self.hexes.iter()
    }

    /// Builder for tests and scenario setup
    pub fn with_terrain(mut self, h: HexCoord, kind: TerrainType, level: i32) -> Self {
        if let Some(i) = self.index(h) {
            self.hexes[i].set_terrain(kind, level);
        }
        self
    }

    /// Builder for tests and scenario setup
    pub fn with_elevation(mut self, h: HexCoord, elevation: i32) -> Self {
        if let Some(i) = self.index(h) {
            self.hexes[i].elevation = elevation;
        }
        self
    }
}
