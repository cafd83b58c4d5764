use std::time::Duration;

use strata_geom::{Frustum, Vec3};
use strata_paging::{
    FrameStats, PageGrid, PagingConfig, PagingContext, QueryContext, SceneTree, TileError,
    TileManager,
};
use strata_runtime::{RenderablePool, SharedHeights, ThreadPoolBuildError};

/// Camera that cruises at a fixed altitude along a slowly turning heading.
#[derive(Clone, Copy, Debug)]
pub struct FlyCamera {
    pub position: Vec3,
    /// Radians, 0 = +x, increasing towards +z.
    pub heading: f32,
    pub speed: f32,
    pub turn_rate: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub far: f32,
}

impl FlyCamera {
    pub fn new(position: Vec3, speed: f32, far: f32) -> Self {
        Self {
            position,
            heading: 0.0,
            speed,
            turn_rate: 0.01,
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            far,
        }
    }

    /// Looks ahead and slightly down, so the ground in front is in view.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.heading.cos(), -0.35, self.heading.sin()).normalized()
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view(
            self.position,
            self.forward(),
            Vec3::UP,
            self.fov_y,
            self.aspect,
            0.1,
            self.far,
        )
    }

    pub fn advance(&mut self) {
        self.position += Vec3::new(self.heading.cos(), 0.0, self.heading.sin()) * self.speed;
        self.heading += self.turn_rate;
    }
}

/// Everything the headless driver owns: paging state, scene and workers.
pub struct Simulation {
    cfg: PagingConfig,
    heights: SharedHeights,
    scene: SceneTree,
    tiles: TileManager,
    grid: PageGrid,
    renderables: RenderablePool,
    pub camera: FlyCamera,
    frame: u64,
}

impl Simulation {
    pub fn new(
        cfg: PagingConfig,
        heights: SharedHeights,
        camera: FlyCamera,
        workers: usize,
    ) -> Result<Self, ThreadPoolBuildError> {
        let scene = SceneTree::new();
        let grid = PageGrid::new(scene.root());
        let renderables = RenderablePool::new(heights.clone(), &cfg, workers)?;
        Ok(Self {
            tiles: TileManager::new(&cfg),
            cfg,
            heights,
            scene,
            grid,
            renderables,
            camera,
            frame: 0,
        })
    }

    /// One update pass at the current camera pose; the camera moves after.
    pub fn step(&mut self) -> Result<FrameStats, TileError> {
        let pos = self.camera.position;
        let frustum = self.camera.frustum();
        let mut ctx = PagingContext::new(
            &self.cfg,
            &mut self.scene,
            self.heights.as_ref(),
            &mut self.renderables,
        );
        let (pages_in, pages_out) = self.grid.ensure_pages_around(&mut self.tiles, &mut ctx, pos)?;
        let stats = self.grid.update(&mut self.tiles, &mut ctx, pos, &frustum);
        let dirty = self.scene.flush_dirty();

        log::debug!(
            target: "paging",
            "frame {}: cam ({:.1}, {:.1}) pages +{} -{}; {:?}; {} nodes dirty",
            self.frame,
            pos.x,
            pos.z,
            pages_in,
            pages_out,
            stats,
            dirty
        );
        self.frame += 1;
        self.camera.advance();
        Ok(stats)
    }

    /// Waits for outstanding builds, then applies them without moving.
    pub fn settle(&mut self, timeout: Duration) -> FrameStats {
        if !self.renderables.wait_idle(timeout) {
            log::warn!(target: "runtime", "builds still pending after {:?}", timeout);
        }
        let pos = self.camera.position;
        let frustum = self.camera.frustum();
        let mut ctx = PagingContext::new(
            &self.cfg,
            &mut self.scene,
            self.heights.as_ref(),
            &mut self.renderables,
        );
        self.grid.update(&mut self.tiles, &mut ctx, pos, &frustum)
    }

    /// Casts a ray straight down from the camera.
    pub fn pick_below(&self, step: f32) -> Result<Vec3, TileError> {
        let ctx = QueryContext::new(&self.cfg, self.heights.as_ref(), &self.renderables);
        self.grid.intersect(
            &self.tiles,
            &ctx,
            self.camera.position,
            Vec3::new(0.0, -step.abs().max(f32::EPSILON), 0.0),
        )
    }

    pub fn log_summary(&self) {
        let pool = self.tiles.stats();
        let rt = self.renderables.stats();
        let loaded = self
            .tiles
            .active()
            .filter(|&id| self.tiles.tile(id).is_some_and(|t| t.is_loaded()))
            .count();
        log::info!(
            target: "paging",
            "frame {}: {} pages, {} active tiles ({} loaded); pool {}/{} free, next increment {}, grown {}x",
            self.frame,
            self.grid.len(),
            pool.tiles - pool.free,
            loaded,
            pool.free,
            pool.tiles,
            pool.increment,
            pool.grow_events
        );
        log::info!(
            target: "runtime",
            "renderables: {} live in {} slots; builds {} done, {} stale, {} queued, {} in flight",
            rt.live,
            rt.slots,
            rt.completed,
            rt.stale,
            rt.queued,
            rt.inflight
        );
    }

    /// Releases every page back to the pool.
    pub fn shutdown(&mut self) -> Result<(), TileError> {
        let mut ctx = PagingContext::new(
            &self.cfg,
            &mut self.scene,
            self.heights.as_ref(),
            &mut self.renderables,
        );
        self.grid.clear(&mut self.tiles, &mut ctx)?;
        log::info!(
            target: "paging",
            "shutdown: {} tiles back in the pool, {} scene nodes left",
            self.tiles.num_free(),
            self.scene.node_count()
        );
        Ok(())
    }
}
