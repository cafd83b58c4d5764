#![allow(dead_code)]

use std::collections::HashMap;

use strata_geom::Vec3;
use strata_paging::{
    Direction, FlatHeightfield, HeightSource, LoadCompletion, MaterialId, NodeId, PagingConfig,
    PagingContext, QueryContext, RenderableId, RenderableManager, SceneTree, TileId, TileInfo, TileManager,
};

#[derive(Default)]
struct Slot {
    neighbors: [Option<RenderableId>; 4],
    built: bool,
}

/// Renderable pool whose builds finish on the next drain.
#[derive(Default)]
pub struct TestRenderables {
    next: u32,
    live: HashMap<RenderableId, Slot>,
    pending: Vec<LoadCompletion>,
    pub released: Vec<RenderableId>,
    pub initialized: Vec<(RenderableId, TileInfo, Option<MaterialId>)>,
    /// Max height reported by built renderables.
    pub built_height: Option<f32>,
}

impl TestRenderables {
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, id: RenderableId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl RenderableManager for TestRenderables {
    fn acquire(&mut self) -> RenderableId {
        self.next += 1;
        let id = RenderableId {
            slot: self.next,
            generation: 1,
        };
        self.live.insert(id, Slot::default());
        id
    }

    fn initialize(&mut self, id: RenderableId, info: &TileInfo, material: Option<MaterialId>) {
        self.initialized.push((id, *info, material));
    }

    fn queue_loading(&mut self, id: RenderableId, tile: TileId) {
        self.pending.push(LoadCompletion {
            renderable: id,
            tile,
        });
    }

    fn release(&mut self, id: RenderableId) {
        if self.live.remove(&id).is_some() {
            self.released.push(id);
        }
    }

    fn set_neighbor(&mut self, id: RenderableId, dir: Direction, other: Option<RenderableId>) {
        if let Some(slot) = self.live.get_mut(&id) {
            slot.neighbors[dir.index()] = other;
        }
    }

    fn neighbor(&self, id: RenderableId, dir: Direction) -> Option<RenderableId> {
        self.live.get(&id).and_then(|s| s.neighbors[dir.index()])
    }

    fn max_height(&self, id: RenderableId) -> Option<f32> {
        self.live
            .get(&id)
            .filter(|s| s.built)
            .and(self.built_height)
    }

    fn drain_completed(&mut self) -> Vec<LoadCompletion> {
        let mut out = Vec::new();
        for done in self.pending.drain(..) {
            if let Some(slot) = self.live.get_mut(&done.renderable) {
                slot.built = true;
                out.push(done);
            }
        }
        out
    }
}

/// Height source that only knows the listed pages.
pub struct PatchyHeights {
    pub height: f32,
    pub pages: Vec<(i32, i32)>,
}

impl HeightSource for PatchyHeights {
    fn height_at(&self, _x: f32, _z: f32, info: &TileInfo) -> Option<f32> {
        self.pages.contains(&info.page()).then_some(self.height)
    }

    fn max_height(&self, page_x: i32, page_z: i32) -> Option<f32> {
        self.pages.contains(&(page_x, page_z)).then_some(self.height)
    }
}

pub fn config_32(radius: f32) -> PagingConfig {
    PagingConfig {
        tile_size: 32,
        scale: Vec3::ONE,
        tiles_per_page: 2,
        initial_pool_size: 4,
        pool_increment: 4,
        activation_radius: radius,
        page_radius: 1,
        max_steps_per_tile: 4096,
    }
}

pub struct Fixture<H: HeightSource> {
    pub config: PagingConfig,
    pub scene: SceneTree,
    pub heights: H,
    pub renderables: TestRenderables,
    pub tiles: TileManager,
}

impl Fixture<FlatHeightfield> {
    pub fn flat(height: f32, radius: f32) -> Self {
        Fixture::new(config_32(radius), FlatHeightfield::new(height))
    }
}

impl<H: HeightSource> Fixture<H> {
    pub fn new(config: PagingConfig, heights: H) -> Self {
        let tiles = TileManager::new(&config);
        Self {
            config,
            scene: SceneTree::new(),
            heights,
            renderables: TestRenderables::default(),
            tiles,
        }
    }

    pub fn root(&self) -> NodeId {
        self.scene.root()
    }

    pub fn split(&mut self) -> (&mut TileManager, PagingContext<'_>) {
        let ctx = PagingContext::new(
            &self.config,
            &mut self.scene,
            &self.heights,
            &mut self.renderables,
        );
        (&mut self.tiles, ctx)
    }

    pub fn query(&self) -> (&TileManager, QueryContext<'_>) {
        let ctx = QueryContext::new(&self.config, &self.heights, &self.renderables);
        (&self.tiles, ctx)
    }

    /// Takes a tile from the pool and initialises it under the root.
    pub fn tile_at(&mut self, page: (i32, i32), tile: (i32, i32)) -> TileId {
        let root = self.root();
        let (tiles, mut ctx) = self.split();
        let id = tiles.get_tile();
        tiles
            .init_tile(id, &mut ctx, root, page.0, page.1, tile.0, tile.1)
            .expect("init");
        id
    }

    /// Notifies from `position` with everything visible, then drains builds.
    pub fn notify_and_pump(&mut self, id: TileId, position: Vec3) {
        let (tiles, mut ctx) = self.split();
        tiles
            .notify(id, &mut ctx, position, &strata_paging::AlwaysVisible)
            .expect("notify");
        tiles.pump_loads(ctx.renderables);
    }
}
