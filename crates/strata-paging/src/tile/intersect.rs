use strata_geom::Vec3;

use crate::collab::QueryContext;
use crate::direction::Direction;
use crate::error::TileError;
use crate::manager::TileManager;
use crate::tile::TileId;

impl TileManager {
    /// Marches from `start` in steps of `direction` until the point drops to
    /// or below the terrain, following neighbour links across tile edges.
    ///
    /// The step length is the length of `direction`; the hit is the first
    /// sample at or under the surface, so it lies within one step of it.
    /// Heights are compared in world units (samples times `scale.y`).
    /// Fails with [`TileError::NoNeighbor`] when the ray leaves through an
    /// unlinked edge, and with [`TileError::StepLimit`] when a single tile
    /// takes more than `max_steps_per_tile` samples.
    pub fn intersect_segment(
        &self,
        id: TileId,
        start: Vec3,
        direction: Vec3,
        ctx: &QueryContext<'_>,
    ) -> Result<Vec3, TileError> {
        if !direction.is_finite() || direction.length_sq() == 0.0 || !start.is_finite() {
            return Err(TileError::InvalidDirection);
        }
        let max_steps = ctx.config.max_steps_per_tile;
        let mut current = id;
        let mut ray = start;
        // Each axis moves monotonically, so no tile is entered twice.
        let mut hops = 0usize;

        loop {
            let tile = self.tile_ref(current)?;
            if !tile.is_initialized() {
                return Err(TileError::InvalidState {
                    tile: current,
                    expected: "initialized",
                    found: tile.state,
                });
            }
            let bounds = *tile.world_bounds();
            let info = tile.info;
            let max_height = tile
                .renderable
                .filter(|_| tile.is_loaded())
                .and_then(|r| ctx.renderables.max_height(r))
                .or_else(|| {
                    ctx.heights
                        .max_height(info.page_x, info.page_z)
                        .map(|h| ctx.config.world_height(h))
                })
                .ok_or(TileError::MissingHeightData {
                    page_x: info.page_x,
                    page_z: info.page_z,
                })?;

            let mut steps = 0u32;
            while bounds.contains_xz(ray) {
                if ray.y <= max_height {
                    let ground = ctx
                        .heights
                        .height_at(ray.x, ray.z, &info)
                        .map(|h| ctx.config.world_height(h))
                        .ok_or(TileError::MissingHeightData {
                            page_x: info.page_x,
                            page_z: info.page_z,
                        })?;
                    if ray.y <= ground {
                        log::trace!(
                            target: "paging",
                            "ray hit tile {} at ({:.2}, {:.2}, {:.2}) after {} hops",
                            current, ray.x, ray.y, ray.z, hops
                        );
                        return Ok(ray);
                    }
                }
                if steps >= max_steps {
                    return Err(TileError::StepLimit {
                        tile: current,
                        steps,
                    });
                }
                ray += direction;
                steps += 1;
            }

            let exit = if ray.x < bounds.min.x {
                Direction::West
            } else if ray.z < bounds.min.z {
                Direction::North
            } else if ray.x > bounds.max.x {
                Direction::East
            } else {
                Direction::South
            };
            let Some(next) = tile.neighbor(exit) else {
                return Err(TileError::NoNeighbor {
                    tile: current,
                    direction: exit,
                });
            };
            hops += 1;
            if hops > self.num_tiles() {
                return Err(TileError::StepLimit {
                    tile: current,
                    steps,
                });
            }
            current = next;
        }
    }
}
