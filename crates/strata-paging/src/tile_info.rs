use std::fmt;

/// Grid and world coordinates of an initialised tile.
///
/// Built once by [`TileManager::init_tile`](crate::TileManager::init_tile) and
/// handed to height sources and renderables instead of six loose scalars.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TileInfo {
    pub page_x: i32,
    pub page_z: i32,
    pub tile_x: i32,
    pub tile_z: i32,
    /// World-space x of the tile corner.
    pub pos_x: f32,
    /// World-space z of the tile corner.
    pub pos_z: f32,
}

impl TileInfo {
    #[inline]
    pub const fn new(
        page_x: i32,
        page_z: i32,
        tile_x: i32,
        tile_z: i32,
        pos_x: f32,
        pos_z: f32,
    ) -> Self {
        Self {
            page_x,
            page_z,
            tile_x,
            tile_z,
            pos_x,
            pos_z,
        }
    }

    #[inline]
    pub fn page(&self) -> (i32, i32) {
        (self.page_x, self.page_z)
    }

    #[inline]
    pub fn tile(&self) -> (i32, i32) {
        (self.tile_x, self.tile_z)
    }

    #[inline]
    pub fn position(&self) -> (f32, f32) {
        (self.pos_x, self.pos_z)
    }
}

impl fmt::Display for TileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page({}, {}) tile({}, {}) @ ({:.1}, {:.1})",
            self.page_x, self.page_z, self.tile_x, self.tile_z, self.pos_x, self.pos_z
        )
    }
}
