use strata_geom::{Aabb, Vec3};

use crate::collab::{
    MaterialId, NodeId, PagingContext, RenderableId, RenderableManager, SceneGraph, Visibility,
};
use crate::direction::Direction;
use crate::error::TileError;
use crate::manager::TileManager;
use crate::tile::{TileId, TileState};
use crate::tile_info::TileInfo;

/// What a [`TileManager::notify`] call did to the tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    Unchanged,
    /// A renderable was acquired and queued for building.
    LoadQueued,
    /// The renderable was detached and released.
    Unloaded,
}

impl TileManager {
    /// Binds a tile taken from [`get_tile`](Self::get_tile) to grid
    /// coordinates under `parent`.
    pub fn init_tile(
        &mut self,
        id: TileId,
        ctx: &mut PagingContext<'_>,
        parent: NodeId,
        page_x: i32,
        page_z: i32,
        tile_x: i32,
        tile_z: i32,
    ) -> Result<(), TileError> {
        {
            let tile = self.tile_ref(id)?;
            if tile.is_initialized() || tile.queued_free {
                return Err(TileError::InvalidState {
                    tile: id,
                    expected: "taken from the pool and not initialized",
                    found: tile.state,
                });
            }
        }
        let max_height = ctx
            .heights
            .max_height(page_x, page_z)
            .ok_or(TileError::MissingHeightData { page_x, page_z })?;

        let (size_x, size_z) = ctx.config.tile_world_size();
        let offset = Vec3::new(tile_x as f32 * size_x, 0.0, tile_z as f32 * size_z);
        let node = ctx.scene.create_child(parent, offset);
        let world = ctx.scene.world_position(node).unwrap_or(offset);
        ctx.scene.mark_dirty(node);

        let top = ctx.config.world_height(max_height).max(0.0);
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(size_x, top, size_z));

        let tile = self.tile_mut(id)?;
        tile.info = TileInfo::new(page_x, page_z, tile_x, tile_z, world.x, world.z);
        tile.node = Some(node);
        tile.bounds = bounds;
        tile.bounds_ext = bounds.scaled_about_center(1.5);
        tile.world_bounds = bounds.translated(world);
        tile.neighbors = [None; 4];
        tile.renderable = None;
        tile.state = TileState::Unloaded;
        log::debug!(target: "paging", "tile {} init {}", id, tile.info);
        Ok(())
    }

    /// Per-frame activation check against the camera.
    ///
    /// Inside the activation radius and visible, an unloaded tile queues a
    /// renderable build and becomes `Loading`. Outside the radius a loading
    /// or loaded tile drops its renderable. There is no hysteresis band.
    pub fn notify(
        &mut self,
        id: TileId,
        ctx: &mut PagingContext<'_>,
        position: Vec3,
        camera: &dyn Visibility,
    ) -> Result<NotifyOutcome, TileError> {
        let tile = self.tile_ref(id)?;
        let Some(node) = tile.node.filter(|_| tile.is_initialized()) else {
            return Err(TileError::InvalidState {
                tile: id,
                expected: "initialized",
                found: tile.state,
            });
        };
        let state = tile.state;
        let world_bounds = tile.world_bounds;
        let info = tile.info;
        let material = tile.material;

        let anchor = ctx
            .scene
            .world_position(node)
            .unwrap_or(Vec3::new(info.pos_x, 0.0, info.pos_z));
        let d2 = position.planar_distance_sq(anchor);
        let r2 = ctx.config.activation_radius * ctx.config.activation_radius;

        if d2 <= r2 {
            if state != TileState::Unloaded || !camera.is_visible(&world_bounds) {
                return Ok(NotifyOutcome::Unchanged);
            }
            let renderable = ctx.renderables.acquire();
            ctx.renderables.initialize(renderable, &info, material);
            ctx.scene.detach_all(node);
            ctx.scene.attach(node, renderable);
            ctx.renderables.queue_loading(renderable, id);

            let tile = self.tile_mut(id)?;
            tile.renderable = Some(renderable);
            tile.state = TileState::Loading;
            log::debug!(target: "paging", "tile {} queued {} (d2={:.1})", id, renderable, d2);
            Ok(NotifyOutcome::LoadQueued)
        } else if matches!(state, TileState::Loading | TileState::Loaded) {
            self.drop_renderable(id, ctx.scene, ctx.renderables)?;
            log::debug!(target: "paging", "tile {} unloaded (d2={:.1})", id, d2);
            Ok(NotifyOutcome::Unloaded)
        } else {
            Ok(NotifyOutcome::Unchanged)
        }
    }

    /// Resolves a finished build. Returns `false` for stale completions:
    /// the tile was unloaded, released or reloaded with another renderable.
    pub fn finish_loading(
        &mut self,
        id: TileId,
        renderable: RenderableId,
        renderables: &mut dyn RenderableManager,
    ) -> Result<bool, TileError> {
        let tile = self.tile_mut(id)?;
        if tile.state != TileState::Loading || tile.renderable != Some(renderable) {
            log::trace!(target: "paging", "tile {} ignores stale build {}", id, renderable);
            return Ok(false);
        }
        tile.state = TileState::Loaded;
        self.link_renderable_neighbors(id, renderables)?;
        Ok(true)
    }

    /// Applies every completed build; returns how many tiles became loaded.
    pub fn pump_loads(&mut self, renderables: &mut dyn RenderableManager) -> usize {
        let mut loaded = 0;
        for done in renderables.drain_completed() {
            match self.finish_loading(done.tile, done.renderable, renderables) {
                Ok(true) => loaded += 1,
                Ok(false) => {}
                Err(e) => log::warn!(target: "paging", "dropping build result: {}", e),
            }
        }
        loaded
    }

    /// Points this tile's renderable and each loaded neighbour's renderable at
    /// each other for seam stitching. Returns the number of links made; a
    /// tile that is not loaded makes none.
    pub fn link_renderable_neighbors(
        &self,
        id: TileId,
        renderables: &mut dyn RenderableManager,
    ) -> Result<usize, TileError> {
        let tile = self.tile_ref(id)?;
        let Some(mine) = tile.renderable.filter(|_| tile.is_loaded()) else {
            return Ok(0);
        };
        let mut linked = 0;
        for dir in Direction::ALL {
            let Some(nid) = tile.neighbor(dir) else {
                continue;
            };
            let Some(other) = self.tile(nid).filter(|n| n.is_loaded()).and_then(|n| n.renderable)
            else {
                continue;
            };
            renderables.set_neighbor(mine, dir, Some(other));
            renderables.set_neighbor(other, dir.opposite(), Some(mine));
            linked += 1;
        }
        Ok(linked)
    }

    /// Writes one neighbour slot of `id`. Pair with the reciprocal call on
    /// the other tile, or use [`link_neighbors`](Self::link_neighbors).
    pub fn set_neighbor(
        &mut self,
        id: TileId,
        dir: Direction,
        other: Option<TileId>,
    ) -> Result<(), TileError> {
        if let Some(o) = other {
            self.tile_ref(o)?;
        }
        let tile = self.tile_mut(id)?;
        if !tile.is_initialized() && other.is_some() {
            return Err(TileError::InvalidState {
                tile: id,
                expected: "initialized",
                found: tile.state,
            });
        }
        tile.neighbors[dir.index()] = other;
        Ok(())
    }

    #[inline]
    pub fn neighbor(&self, id: TileId, dir: Direction) -> Option<TileId> {
        self.tile(id).and_then(|t| t.neighbor(dir))
    }

    /// Links `a` and `b` both ways: `b` is `a`'s `dir` neighbour.
    pub fn link_neighbors(&mut self, a: TileId, dir: Direction, b: TileId) -> Result<(), TileError> {
        self.set_neighbor(a, dir, Some(b))?;
        self.set_neighbor(b, dir.opposite(), Some(a))
    }

    pub fn set_material(&mut self, id: TileId, material: Option<MaterialId>) -> Result<(), TileError> {
        self.tile_mut(id)?.material = material;
        Ok(())
    }

    /// Returns the tile to the pool. A tile that is not initialised is left
    /// alone.
    ///
    /// Order matters: renderable links and the renderable go first, then the
    /// neighbour links, then the scene node, and the pool last.
    pub fn release_tile(&mut self, id: TileId, ctx: &mut PagingContext<'_>) -> Result<(), TileError> {
        if !self.tile_ref(id)?.is_initialized() {
            return Ok(());
        }
        self.drop_renderable(id, ctx.scene, ctx.renderables)?;

        let neighbors = self.tile_ref(id)?.neighbors;
        for dir in Direction::ALL {
            let Some(nid) = neighbors[dir.index()] else {
                continue;
            };
            if let Ok(n) = self.tile_mut(nid) {
                if n.neighbors[dir.opposite().index()] == Some(id) {
                    n.neighbors[dir.opposite().index()] = None;
                }
            }
        }

        let tile = self.tile_mut(id)?;
        if let Some(node) = tile.node.take() {
            ctx.scene.destroy_node(node);
        }
        tile.reset();
        log::trace!(target: "paging", "tile {} released", id);
        self.free_tile(id)
    }

    fn drop_renderable(
        &mut self,
        id: TileId,
        scene: &mut dyn SceneGraph,
        renderables: &mut dyn RenderableManager,
    ) -> Result<(), TileError> {
        let tile = self.tile_ref(id)?;
        let Some(mine) = tile.renderable else {
            return Ok(());
        };
        for dir in Direction::ALL {
            if let Some(other) = renderables.neighbor(mine, dir) {
                if renderables.neighbor(other, dir.opposite()) == Some(mine) {
                    renderables.set_neighbor(other, dir.opposite(), None);
                }
                renderables.set_neighbor(mine, dir, None);
            }
        }
        if let Some(node) = tile.node {
            scene.detach(node, mine);
        }
        renderables.release(mine);

        let tile = self.tile_mut(id)?;
        tile.renderable = None;
        tile.state = TileState::Unloaded;
        Ok(())
    }
}
