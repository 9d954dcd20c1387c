//! Construction-boundary errors
//!
//! The simulation itself never fails; these only come out of building or
//! validating boards and unit templates.

use thiserror::Error;

use crate::hex::HexCoord;
use crate::unit::Location;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("board dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("hex {coord} lies outside a {width}x{height} board")]
    OutOfBounds { coord: HexCoord, width: i32, height: i32 },
    #[error("hex {0} listed more than once")]
    DuplicateHex(HexCoord),
    #[error("hex {0} missing from board")]
    MissingHex(HexCoord),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unit '{name}' has non-positive tonnage {tonnage}")]
    NonPositiveTonnage { name: String, tonnage: i32 },
    #[error("unit '{name}' has no internal structure in {location}")]
    NoStructure { name: String, location: Location },
    #[error("unit '{name}' carries {armor} armor in {location}, cap is {cap}")]
    ArmorAboveCap { name: String, location: Location, armor: i32, cap: i32 },
    #[error("unit '{name}' weapon '{weapon}' has inverted ranges")]
    BadRanges { name: String, weapon: String },
}
