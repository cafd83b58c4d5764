mod common;

use common::{Fixture, PatchyHeights, config_32};
use strata_geom::{Aabb, Vec3};
use strata_paging::{
    AlwaysVisible, Direction, MaterialId, NotifyOutcome, SceneGraph, TileError, TileState,
    Visibility,
};

struct NeverVisible;

impl Visibility for NeverVisible {
    fn is_visible(&self, _bounds: &Aabb) -> bool {
        false
    }
}

#[test]
fn init_binds_coordinates_and_bounds() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let id = fx.tile_at((1, 0), (1, 1));
    let tile = fx.tiles.tile(id).unwrap();

    assert_eq!(tile.state(), TileState::Unloaded);
    assert!(tile.is_initialized());
    assert!(!tile.is_loaded());
    assert_eq!(tile.info().page(), (1, 0));
    assert_eq!(tile.info().tile(), (1, 1));
    // Parent is the root, so the offset comes from the tile index only.
    assert_eq!(tile.info().position(), (32.0, 32.0));

    assert_eq!(
        *tile.bounding_box(),
        Aabb::new(Vec3::ZERO, Vec3::new(32.0, 10.0, 32.0))
    );
    assert_eq!(
        *tile.extended_bounds(),
        Aabb::new(Vec3::new(-8.0, -2.5, -8.0), Vec3::new(40.0, 12.5, 40.0))
    );
    assert_eq!(
        *tile.world_bounds(),
        Aabb::new(Vec3::new(32.0, 0.0, 32.0), Vec3::new(64.0, 10.0, 64.0))
    );
    for dir in Direction::ALL {
        assert_eq!(tile.neighbor(dir), None);
    }
    let node = tile.node().unwrap();
    assert_eq!(fx.scene.world_position(node), Some(Vec3::new(32.0, 0.0, 32.0)));
}

#[test]
fn init_uses_parent_offset_and_scale() {
    let mut cfg = config_32(100.0);
    cfg.scale = Vec3::new(2.0, 1.0, 0.5);
    let mut fx = Fixture::new(cfg, strata_paging::FlatHeightfield::new(4.0));
    let parent = fx
        .scene
        .create_child(fx.scene.root(), Vec3::new(1000.0, 0.0, -1000.0));
    let (tiles, mut ctx) = fx.split();
    let id = tiles.get_tile();
    tiles.init_tile(id, &mut ctx, parent, 0, 0, 1, 2).unwrap();

    let tile = tiles.tile(id).unwrap();
    assert_eq!(tile.info().position(), (1064.0, -968.0));
    assert_eq!(tile.bounding_box().max, Vec3::new(64.0, 4.0, 16.0));
}

#[test]
fn vertical_scale_stretches_bounds_and_ground() {
    let mut cfg = config_32(100.0);
    cfg.scale = Vec3::new(1.0, 2.0, 1.0);
    let mut fx = Fixture::new(cfg, strata_paging::FlatHeightfield::new(10.0));
    let id = fx.tile_at((0, 0), (0, 0));
    let tile = fx.tiles.tile(id).unwrap();
    assert_eq!(tile.bounding_box().max.y, 20.0);
    assert_eq!(tile.world_bounds().max.y, 20.0);

    let (tiles, ctx) = fx.query();
    let down = Vec3::new(0.0, -1.0, 0.0);
    let hit = tiles
        .intersect_segment(id, Vec3::new(5.0, 100.0, 5.0), down, &ctx)
        .unwrap();
    assert_eq!(hit, Vec3::new(5.0, 20.0, 5.0));
    // above the raw sample, below the scaled ground
    let start = Vec3::new(5.0, 15.0, 5.0);
    assert_eq!(tiles.intersect_segment(id, start, down, &ctx), Ok(start));
}

#[test]
fn init_rejects_pooled_or_active_tiles() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let root = fx.root();
    let (tiles, mut ctx) = fx.split();

    let id = tiles.get_tile();
    tiles.init_tile(id, &mut ctx, root, 0, 0, 0, 0).unwrap();
    assert!(matches!(
        tiles.init_tile(id, &mut ctx, root, 0, 0, 0, 0),
        Err(TileError::InvalidState { .. })
    ));

    // Still sitting in the free queue.
    let pooled = strata_paging::TileId(3);
    assert!(tiles.is_free(pooled));
    assert!(matches!(
        tiles.init_tile(pooled, &mut ctx, root, 0, 0, 1, 1),
        Err(TileError::InvalidState { .. })
    ));
}

#[test]
fn init_without_height_data_fails_cleanly() {
    let heights = PatchyHeights {
        height: 5.0,
        pages: vec![(0, 0)],
    };
    let mut fx = Fixture::new(config_32(100.0), heights);
    let root = fx.root();
    let nodes_before = fx.scene.node_count();
    let (tiles, mut ctx) = fx.split();
    let id = tiles.get_tile();
    assert_eq!(
        tiles.init_tile(id, &mut ctx, root, 3, 3, 0, 0),
        Err(TileError::MissingHeightData {
            page_x: 3,
            page_z: 3
        })
    );
    assert_eq!(tiles.tile(id).unwrap().state(), TileState::Free);
    assert_eq!(fx.scene.node_count(), nodes_before);
}

#[test]
fn notify_in_range_loads_once() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let id = fx.tile_at((0, 0), (0, 0));
    let camera = Vec3::new(3.0, 50.0, 4.0);

    let (tiles, mut ctx) = fx.split();
    assert_eq!(
        tiles.notify(id, &mut ctx, camera, &AlwaysVisible),
        Ok(NotifyOutcome::LoadQueued)
    );
    assert_eq!(tiles.tile(id).unwrap().state(), TileState::Loading);
    assert!(!tiles.tile(id).unwrap().is_loaded());
    assert!(tiles.tile(id).unwrap().renderable().is_some());

    // Repeated notifies while the build is in flight change nothing.
    assert_eq!(
        tiles.notify(id, &mut ctx, camera, &AlwaysVisible),
        Ok(NotifyOutcome::Unchanged)
    );
    assert_eq!(tiles.pump_loads(ctx.renderables), 1);
    assert!(tiles.tile(id).unwrap().is_loaded());

    for _ in 0..3 {
        assert_eq!(
            tiles.notify(id, &mut ctx, camera, &AlwaysVisible),
            Ok(NotifyOutcome::Unchanged)
        );
    }
    assert!(tiles.tile(id).unwrap().is_loaded());
    assert_eq!(fx.renderables.live_count(), 1);
    assert_eq!(fx.renderables.initialized.len(), 1);

    let tile = fx.tiles.tile(id).unwrap();
    let r = tile.renderable().unwrap();
    assert_eq!(fx.scene.attached(tile.node().unwrap()), &[r]);
}

#[test]
fn notify_passes_info_and_material_to_renderable() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let id = fx.tile_at((0, 0), (1, 0));
    fx.tiles.set_material(id, Some(MaterialId(7))).unwrap();
    fx.notify_and_pump(id, Vec3::new(40.0, 0.0, 0.0));

    let (_, info, material) = fx.renderables.initialized[0];
    assert_eq!(info.tile(), (1, 0));
    assert_eq!(material, Some(MaterialId(7)));
}

#[test]
fn notify_requires_visibility() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let id = fx.tile_at((0, 0), (0, 0));
    let (tiles, mut ctx) = fx.split();
    assert_eq!(
        tiles.notify(id, &mut ctx, Vec3::new(1.0, 0.0, 1.0), &NeverVisible),
        Ok(NotifyOutcome::Unchanged)
    );
    assert_eq!(tiles.tile(id).unwrap().state(), TileState::Unloaded);
    assert_eq!(fx.renderables.live_count(), 0);
}

#[test]
fn radius_boundary_is_inclusive() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let id = fx.tile_at((0, 0), (0, 0));
    let (tiles, mut ctx) = fx.split();
    // exactly on the radius: loads
    assert_eq!(
        tiles.notify(id, &mut ctx, Vec3::new(60.0, 999.0, 80.0), &AlwaysVisible),
        Ok(NotifyOutcome::LoadQueued)
    );
    // just outside: unloads
    assert_eq!(
        tiles.notify(id, &mut ctx, Vec3::new(60.0, 0.0, 80.5), &AlwaysVisible),
        Ok(NotifyOutcome::Unloaded)
    );
}

#[test]
fn notify_out_of_range_unloads_and_releases() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let id = fx.tile_at((0, 0), (0, 0));
    fx.notify_and_pump(id, Vec3::new(5.0, 0.0, 0.0));
    let r = fx.tiles.tile(id).unwrap().renderable().unwrap();
    let node = fx.tiles.tile(id).unwrap().node().unwrap();

    let (tiles, mut ctx) = fx.split();
    assert_eq!(
        tiles.notify(id, &mut ctx, Vec3::new(500.0, 0.0, 0.0), &AlwaysVisible),
        Ok(NotifyOutcome::Unloaded)
    );
    assert_eq!(
        tiles.notify(id, &mut ctx, Vec3::new(500.0, 0.0, 0.0), &AlwaysVisible),
        Ok(NotifyOutcome::Unchanged)
    );
    let tile = fx.tiles.tile(id).unwrap();
    assert_eq!(tile.state(), TileState::Unloaded);
    assert_eq!(tile.renderable(), None);
    assert_eq!(fx.renderables.released, vec![r]);
    assert!(fx.scene.attached(node).is_empty());
}

#[test]
fn unload_before_build_completes_discards_result() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let id = fx.tile_at((0, 0), (0, 0));
    let (tiles, mut ctx) = fx.split();
    tiles
        .notify(id, &mut ctx, Vec3::ZERO, &AlwaysVisible)
        .unwrap();
    let first = tiles.tile(id).unwrap().renderable().unwrap();
    tiles
        .notify(id, &mut ctx, Vec3::new(1000.0, 0.0, 0.0), &AlwaysVisible)
        .unwrap();
    // Back in range before anything was drained: a second build is queued.
    tiles
        .notify(id, &mut ctx, Vec3::ZERO, &AlwaysVisible)
        .unwrap();
    let second = tiles.tile(id).unwrap().renderable().unwrap();
    assert_ne!(first, second);

    // A late completion for the first renderable must not flip the tile.
    assert_eq!(tiles.finish_loading(id, first, ctx.renderables), Ok(false));
    assert_eq!(tiles.tile(id).unwrap().state(), TileState::Loading);

    assert_eq!(tiles.pump_loads(ctx.renderables), 1);
    let tile = tiles.tile(id).unwrap();
    assert!(tile.is_loaded());
    assert_eq!(tile.renderable(), Some(second));
}

#[test]
fn release_returns_tile_to_pool_exactly_once() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let free_before = fx.tiles.num_free();
    let a = fx.tile_at((0, 0), (0, 0));
    let b = fx.tile_at((0, 0), (1, 0));
    fx.tiles.link_neighbors(a, Direction::East, b).unwrap();
    fx.notify_and_pump(a, Vec3::ZERO);
    let node = fx.tiles.tile(a).unwrap().node().unwrap();

    let (tiles, mut ctx) = fx.split();
    tiles.release_tile(a, &mut ctx).unwrap();
    tiles.release_tile(a, &mut ctx).unwrap();

    let tile = tiles.tile(a).unwrap();
    assert!(!tile.is_loaded());
    assert!(!tile.is_initialized());
    assert_eq!(tile.renderable(), None);
    assert_eq!(tile.node(), None);
    for dir in Direction::ALL {
        assert_eq!(tile.neighbor(dir), None);
    }
    // reciprocal slot on the survivor is cleared
    assert_eq!(tiles.neighbor(b, Direction::West), None);
    assert!(tiles.is_free(a));
    assert_eq!(tiles.num_free(), free_before - 1);

    assert_eq!(fx.renderables.live_count(), 0);
    assert!(!fx.scene.contains(node));
}

#[test]
fn released_tile_is_reused_last() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let a = fx.tile_at((0, 0), (0, 0));
    {
        let (tiles, mut ctx) = fx.split();
        tiles.release_tile(a, &mut ctx).unwrap();
    }
    let mut issued = Vec::new();
    for _ in 0..fx.tiles.num_free() {
        issued.push(fx.tiles.get_tile());
    }
    assert_eq!(issued.last(), Some(&a));
    assert_eq!(issued.iter().filter(|t| **t == a).count(), 1);
}

#[test]
fn notify_on_free_tile_is_an_error() {
    let mut fx = Fixture::flat(10.0, 100.0);
    let (tiles, mut ctx) = fx.split();
    let id = tiles.get_tile();
    assert!(matches!(
        tiles.notify(id, &mut ctx, Vec3::ZERO, &AlwaysVisible),
        Err(TileError::InvalidState { .. })
    ));
}

#[test]
fn concrete_load_and_pick_scenario() {
    // tile size 32, unit scale, flat ground at 10, tile (0,0,0,0) under the root
    let mut fx = Fixture::flat(10.0, 100.0);
    let id = fx.tile_at((0, 0), (0, 0));
    fx.notify_and_pump(id, Vec3::new(3.0, 20.0, 4.0));
    assert!(fx.tiles.tile(id).unwrap().is_loaded());

    let (tiles, ctx) = fx.query();
    let hit = tiles
        .intersect_segment(id, Vec3::new(5.0, 100.0, 5.0), Vec3::new(0.0, -1.0, 0.0), &ctx)
        .unwrap();
    assert!((hit.y - 10.0).abs() <= 1.0, "hit={hit:?}");
    assert_eq!((hit.x, hit.z), (5.0, 5.0));
}
