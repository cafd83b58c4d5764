use hashbrown::HashMap;
use strata_geom::Vec3;

use crate::collab::{NodeId, PagingContext, QueryContext, Visibility};
use crate::config::PagingConfig;
use crate::direction::Direction;
use crate::error::TileError;
use crate::manager::TileManager;
use crate::tile::{NotifyOutcome, TileId};

/// A square block of `tiles_per_page²` tiles sharing one scene node.
#[derive(Clone, Debug)]
pub struct Page {
    page_x: i32,
    page_z: i32,
    node: NodeId,
    per_side: u32,
    // row-major, z outer
    tiles: Vec<TileId>,
}

impl Page {
    #[inline]
    pub fn coord(&self) -> (i32, i32) {
        (self.page_x, self.page_z)
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn tiles(&self) -> &[TileId] {
        &self.tiles
    }

    pub fn tile(&self, tile_x: i32, tile_z: i32) -> Option<TileId> {
        let n = self.per_side as i32;
        if tile_x < 0 || tile_z < 0 || tile_x >= n || tile_z >= n {
            return None;
        }
        self.tiles.get((tile_z * n + tile_x) as usize).copied()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub notified: usize,
    pub load_queued: usize,
    pub unloaded: usize,
    /// Builds that completed and turned their tile `Loaded` this frame.
    pub loaded: usize,
    pub errors: usize,
}

/// Loaded pages keyed by page coordinate. Owns the tiles it takes from the
/// pool and keeps their neighbour links, including across page borders.
pub struct PageGrid {
    root: NodeId,
    pages: HashMap<(i32, i32), Page>,
}

impl PageGrid {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            pages: HashMap::new(),
        }
    }

    #[inline]
    pub fn page(&self, page_x: i32, page_z: i32) -> Option<&Page> {
        self.pages.get(&(page_x, page_z))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn page_coord_at(config: &PagingConfig, x: f32, z: f32) -> (i32, i32) {
        let (pw, pd) = config.page_world_size();
        ((x / pw).floor() as i32, (z / pd).floor() as i32)
    }

    /// Tile covering world position `(x, z)`, if its page is loaded.
    pub fn tile_at(&self, config: &PagingConfig, x: f32, z: f32) -> Option<TileId> {
        let (page_x, page_z) = Self::page_coord_at(config, x, z);
        let page = self.page(page_x, page_z)?;
        let (pw, pd) = config.page_world_size();
        let (tw, td) = config.tile_world_size();
        let last = config.tiles_per_page as i32 - 1;
        let tile_x = (((x - page_x as f32 * pw) / tw).floor() as i32).clamp(0, last);
        let tile_z = (((z - page_z as f32 * pd) / td).floor() as i32).clamp(0, last);
        page.tile(tile_x, tile_z)
    }

    /// Creates the page node, binds a full page of pool tiles to it and
    /// links them to each other and to adjacent loaded pages.
    pub fn load_page(
        &mut self,
        tiles: &mut TileManager,
        ctx: &mut PagingContext<'_>,
        page_x: i32,
        page_z: i32,
    ) -> Result<(), TileError> {
        if self.pages.contains_key(&(page_x, page_z)) {
            return Ok(());
        }
        if ctx.heights.max_height(page_x, page_z).is_none() {
            return Err(TileError::MissingHeightData { page_x, page_z });
        }
        let (pw, pd) = ctx.config.page_world_size();
        let node = ctx
            .scene
            .create_child(self.root, Vec3::new(page_x as f32 * pw, 0.0, page_z as f32 * pd));
        let per_side = ctx.config.tiles_per_page;
        let n = per_side as i32;

        let mut ids = Vec::with_capacity((per_side * per_side) as usize);
        for tile_z in 0..n {
            for tile_x in 0..n {
                let id = tiles.get_tile();
                if let Err(e) = tiles.init_tile(id, ctx, node, page_x, page_z, tile_x, tile_z) {
                    tiles.free_tile(id)?;
                    for done in ids {
                        tiles.release_tile(done, ctx)?;
                    }
                    ctx.scene.destroy_node(node);
                    return Err(e);
                }
                ids.push(id);
            }
        }

        self.pages.insert(
            (page_x, page_z),
            Page {
                page_x,
                page_z,
                node,
                per_side,
                tiles: ids,
            },
        );
        self.link_tile_neighbors(tiles, page_x, page_z)?;
        log::info!(
            target: "paging",
            "page ({}, {}) loaded; pool {} tiles, {} free",
            page_x,
            page_z,
            tiles.num_tiles(),
            tiles.num_free()
        );
        Ok(())
    }

    /// Releases every tile of the page back to the pool. Returns `false` if
    /// the page was not loaded.
    pub fn unload_page(
        &mut self,
        tiles: &mut TileManager,
        ctx: &mut PagingContext<'_>,
        page_x: i32,
        page_z: i32,
    ) -> Result<bool, TileError> {
        let Some(page) = self.pages.remove(&(page_x, page_z)) else {
            return Ok(false);
        };
        for id in page.tiles {
            tiles.release_tile(id, ctx)?;
        }
        ctx.scene.destroy_node(page.node);
        log::info!(target: "paging", "page ({}, {}) unloaded", page_x, page_z);
        Ok(true)
    }

    /// Links every tile of the page to its grid neighbours, reaching into
    /// adjacent pages that are loaded. Safe to call repeatedly.
    pub fn link_tile_neighbors(
        &self,
        tiles: &mut TileManager,
        page_x: i32,
        page_z: i32,
    ) -> Result<(), TileError> {
        let Some(page) = self.page(page_x, page_z) else {
            return Ok(());
        };
        let n = page.per_side as i32;
        for tile_z in 0..n {
            for tile_x in 0..n {
                let Some(id) = page.tile(tile_x, tile_z) else {
                    continue;
                };
                for dir in Direction::ALL {
                    let (dx, dz) = dir.offset();
                    let (nx, nz) = (tile_x + dx, tile_z + dz);
                    let other = if (0..n).contains(&nx) && (0..n).contains(&nz) {
                        page.tile(nx, nz)
                    } else {
                        self.page(page_x + dx, page_z + dz)
                            .and_then(|p| p.tile(nx.rem_euclid(n), nz.rem_euclid(n)))
                    };
                    if let Some(other) = other {
                        tiles.link_neighbors(id, dir, other)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs the activation check on every tile, then applies finished builds.
    pub fn update(
        &self,
        tiles: &mut TileManager,
        ctx: &mut PagingContext<'_>,
        position: Vec3,
        camera: &dyn Visibility,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        for page in self.pages.values() {
            for &id in &page.tiles {
                stats.notified += 1;
                match tiles.notify(id, ctx, position, camera) {
                    Ok(NotifyOutcome::LoadQueued) => stats.load_queued += 1,
                    Ok(NotifyOutcome::Unloaded) => stats.unloaded += 1,
                    Ok(NotifyOutcome::Unchanged) => {}
                    Err(e) => {
                        stats.errors += 1;
                        log::warn!(target: "paging", "notify failed: {}", e);
                    }
                }
            }
        }
        stats.loaded = tiles.pump_loads(ctx.renderables);
        stats
    }

    /// Streams pages in around `position` and drops those beyond
    /// `page_radius`. Pages without height data are skipped. Returns
    /// `(loaded, unloaded)` page counts.
    pub fn ensure_pages_around(
        &mut self,
        tiles: &mut TileManager,
        ctx: &mut PagingContext<'_>,
        position: Vec3,
    ) -> Result<(usize, usize), TileError> {
        let (cx, cz) = Self::page_coord_at(ctx.config, position.x, position.z);
        let radius = ctx.config.page_radius;

        let stale: Vec<(i32, i32)> = self
            .pages
            .keys()
            .copied()
            .filter(|&(px, pz)| (px - cx).abs() > radius || (pz - cz).abs() > radius)
            .collect();
        let mut unloaded = 0;
        for (px, pz) in stale {
            if self.unload_page(tiles, ctx, px, pz)? {
                unloaded += 1;
            }
        }

        let mut loaded = 0;
        for pz in cz - radius..=cz + radius {
            for px in cx - radius..=cx + radius {
                if self.pages.contains_key(&(px, pz)) {
                    continue;
                }
                match self.load_page(tiles, ctx, px, pz) {
                    Ok(()) => loaded += 1,
                    Err(TileError::MissingHeightData { .. }) => {
                        log::debug!(target: "paging", "page ({}, {}) has no height data", px, pz);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok((loaded, unloaded))
    }

    /// Ray query from an arbitrary world position.
    pub fn intersect(
        &self,
        tiles: &TileManager,
        ctx: &QueryContext<'_>,
        start: Vec3,
        direction: Vec3,
    ) -> Result<Vec3, TileError> {
        let id = self
            .tile_at(ctx.config, start.x, start.z)
            .ok_or(TileError::NoTileAt {
                x: start.x,
                z: start.z,
            })?;
        tiles.intersect_segment(id, start, direction, ctx)
    }

    /// Unloads every page.
    pub fn clear(
        &mut self,
        tiles: &mut TileManager,
        ctx: &mut PagingContext<'_>,
    ) -> Result<(), TileError> {
        let keys: Vec<(i32, i32)> = self.pages.keys().copied().collect();
        for (px, pz) in keys {
            self.unload_page(tiles, ctx, px, pz)?;
        }
        Ok(())
    }
}
