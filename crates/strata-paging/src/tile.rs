//! Per-cell tile state. The operations that touch neighbours or
//! collaborators live on [`TileManager`](crate::TileManager), split across
//! `lifecycle` and `intersect`.

mod intersect;
mod lifecycle;

use std::fmt;

use strata_geom::Aabb;

use crate::collab::{MaterialId, NodeId, RenderableId};
use crate::direction::Direction;
use crate::tile_info::TileInfo;

pub use lifecycle::NotifyOutcome;

/// Stable arena index; survives the tile being freed and reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u32);

impl TileId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TileState {
    /// In the pool, not bound to any page.
    #[default]
    Free,
    /// Bound to grid coordinates, no renderable.
    Unloaded,
    /// Renderable acquired, geometry build in flight.
    Loading,
    Loaded,
}

#[derive(Clone, Debug)]
pub struct Tile {
    pub(crate) id: TileId,
    pub(crate) state: TileState,
    pub(crate) info: TileInfo,
    pub(crate) node: Option<NodeId>,
    pub(crate) bounds: Aabb,
    pub(crate) bounds_ext: Aabb,
    pub(crate) world_bounds: Aabb,
    pub(crate) neighbors: [Option<TileId>; 4],
    pub(crate) renderable: Option<RenderableId>,
    pub(crate) material: Option<MaterialId>,
    pub(crate) queued_free: bool,
}

impl Tile {
    pub(crate) fn new(id: TileId) -> Self {
        Self {
            id,
            state: TileState::Free,
            info: TileInfo::default(),
            node: None,
            bounds: Aabb::default(),
            bounds_ext: Aabb::default(),
            world_bounds: Aabb::default(),
            neighbors: [None; 4],
            renderable: None,
            material: None,
            queued_free: false,
        }
    }

    #[inline]
    pub fn id(&self) -> TileId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> TileState {
        self.state
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state != TileState::Free
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.state == TileState::Loaded
    }

    /// Coordinates; only meaningful while initialised.
    #[inline]
    pub fn info(&self) -> &TileInfo {
        &self.info
    }

    /// Local content box: tile footprint by page max height.
    #[inline]
    pub fn bounding_box(&self) -> &Aabb {
        &self.bounds
    }

    /// Influence box, 1.5x the content box about its centre.
    #[inline]
    pub fn extended_bounds(&self) -> &Aabb {
        &self.bounds_ext
    }

    #[inline]
    pub fn world_bounds(&self) -> &Aabb {
        &self.world_bounds
    }

    #[inline]
    pub fn neighbor(&self, dir: Direction) -> Option<TileId> {
        self.neighbors[dir.index()]
    }

    #[inline]
    pub fn renderable(&self) -> Option<RenderableId> {
        self.renderable
    }

    #[inline]
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    #[inline]
    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    pub(crate) fn reset(&mut self) {
        let id = self.id;
        let queued_free = self.queued_free;
        *self = Tile::new(id);
        self.queued_free = queued_free;
    }
}
