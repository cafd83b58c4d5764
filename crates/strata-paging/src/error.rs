use crate::direction::Direction;
use crate::tile::{TileId, TileState};

#[derive(Clone, Debug, PartialEq)]
pub enum TileError {
    /// The tile was asked to do something its current state forbids.
    InvalidState {
        tile: TileId,
        expected: &'static str,
        found: TileState,
    },
    /// The height source has no data for the page.
    MissingHeightData { page_x: i32, page_z: i32 },
    /// A ray left the tile through an edge with no linked neighbour.
    NoNeighbor { tile: TileId, direction: Direction },
    /// Zero-length or non-finite ray direction.
    InvalidDirection,
    /// The ray marched `steps` times inside one tile without leaving it.
    StepLimit { tile: TileId, steps: u32 },
    UnknownTile(TileId),
    /// No loaded page covers the world position.
    NoTileAt { x: f32, z: f32 },
}

impl std::fmt::Display for TileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TileError::InvalidState {
                tile,
                expected,
                found,
            } => write!(f, "tile {} is {:?}, expected {}", tile, found, expected),
            TileError::MissingHeightData { page_x, page_z } => {
                write!(f, "no height data for page ({}, {})", page_x, page_z)
            }
            TileError::NoNeighbor { tile, direction } => {
                write!(f, "tile {} has no {:?} neighbor", tile, direction)
            }
            TileError::InvalidDirection => write!(f, "ray direction must be finite and non-zero"),
            TileError::StepLimit { tile, steps } => {
                write!(f, "ray did not leave tile {} after {} steps", tile, steps)
            }
            TileError::UnknownTile(tile) => write!(f, "unknown tile {}", tile),
            TileError::NoTileAt { x, z } => write!(f, "no loaded tile at ({:.1}, {:.1})", x, z),
        }
    }
}

impl std::error::Error for TileError {}
