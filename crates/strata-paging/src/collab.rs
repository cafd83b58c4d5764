//! Contracts of the services the paging core drives but does not own.

use std::fmt;

use strata_geom::{Aabb, Frustum, Vec3};

use crate::config::PagingConfig;
use crate::direction::Direction;
use crate::tile::TileId;
use crate::tile_info::TileInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Generational handle; a recycled slot gets a new generation so late
/// build results for its previous owner can be recognised and dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderableId {
    pub slot: u32,
    pub generation: u32,
}

impl fmt::Display for RenderableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "renderable#{}.{}", self.slot, self.generation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// A finished geometry build reported back to the update pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadCompletion {
    pub renderable: RenderableId,
    pub tile: TileId,
}

pub trait SceneGraph {
    /// New node under `parent`, positioned at `offset` relative to it.
    fn create_child(&mut self, parent: NodeId, offset: Vec3) -> NodeId;
    /// Destroys `node` and its whole subtree.
    fn destroy_node(&mut self, node: NodeId);
    /// Drops every renderable attached to `node`.
    fn detach_all(&mut self, node: NodeId);
    fn attach(&mut self, node: NodeId, renderable: RenderableId);
    fn detach(&mut self, node: NodeId, renderable: RenderableId);
    fn world_position(&self, node: NodeId) -> Option<Vec3>;
    fn mark_dirty(&mut self, node: NodeId);
}

pub trait Visibility {
    fn is_visible(&self, bounds: &Aabb) -> bool;
}

impl Visibility for Frustum {
    fn is_visible(&self, bounds: &Aabb) -> bool {
        self.intersects_aabb(bounds)
    }
}

/// Visibility that accepts everything; used by pick-only setups and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysVisible;

impl Visibility for AlwaysVisible {
    fn is_visible(&self, _bounds: &Aabb) -> bool {
        true
    }
}

/// Heightfield samples in source units; `PagingConfig::world_height`
/// turns them into world heights.
pub trait HeightSource {
    /// Height at world `(x, z)` as seen by the tile `info`, which owns the
    /// point (its far edges included).
    fn height_at(&self, x: f32, z: f32, info: &TileInfo) -> Option<f32>;
    fn max_height(&self, page_x: i32, page_z: i32) -> Option<f32>;
}

pub trait RenderableManager {
    fn acquire(&mut self) -> RenderableId;
    fn initialize(&mut self, id: RenderableId, info: &TileInfo, material: Option<MaterialId>);
    /// Hands the renderable to the geometry build queue on behalf of `tile`.
    fn queue_loading(&mut self, id: RenderableId, tile: TileId);
    /// Returns the renderable to the pool. Pending builds for it are dropped.
    fn release(&mut self, id: RenderableId);
    fn set_neighbor(&mut self, id: RenderableId, dir: Direction, other: Option<RenderableId>);
    fn neighbor(&self, id: RenderableId, dir: Direction) -> Option<RenderableId>;
    /// Highest vertex of the built geometry; `None` until the build lands.
    fn max_height(&self, id: RenderableId) -> Option<f32>;
    fn drain_completed(&mut self) -> Vec<LoadCompletion>;
}

/// Everything a tile operation may touch besides the pool itself.
pub struct PagingContext<'a> {
    pub config: &'a PagingConfig,
    pub scene: &'a mut dyn SceneGraph,
    pub heights: &'a dyn HeightSource,
    pub renderables: &'a mut dyn RenderableManager,
}

impl<'a> PagingContext<'a> {
    pub fn new(
        config: &'a PagingConfig,
        scene: &'a mut dyn SceneGraph,
        heights: &'a dyn HeightSource,
        renderables: &'a mut dyn RenderableManager,
    ) -> Self {
        Self {
            config,
            scene,
            heights,
            renderables,
        }
    }
}

impl PagingContext<'_> {
    /// Read-only view for queries.
    pub fn query(&self) -> QueryContext<'_> {
        QueryContext {
            config: self.config,
            heights: self.heights,
            renderables: &*self.renderables,
        }
    }
}

/// What a ray query reads: config, height data and built renderables.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    pub config: &'a PagingConfig,
    pub heights: &'a dyn HeightSource,
    pub renderables: &'a dyn RenderableManager,
}

impl<'a> QueryContext<'a> {
    pub fn new(
        config: &'a PagingConfig,
        heights: &'a dyn HeightSource,
        renderables: &'a dyn RenderableManager,
    ) -> Self {
        Self {
            config,
            heights,
            renderables,
        }
    }
}
