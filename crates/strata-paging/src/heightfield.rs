use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

use crate::collab::HeightSource;
use crate::tile_info::TileInfo;

/// Constant-height terrain.
#[derive(Clone, Copy, Debug)]
pub struct FlatHeightfield {
    pub height: f32,
}

impl FlatHeightfield {
    pub fn new(height: f32) -> Self {
        Self { height }
    }
}

impl HeightSource for FlatHeightfield {
    fn height_at(&self, _x: f32, _z: f32, _info: &TileInfo) -> Option<f32> {
        Some(self.height)
    }

    fn max_height(&self, _page_x: i32, _page_z: i32) -> Option<f32> {
        Some(self.height)
    }
}

/// Inclusive page rectangle a height source has data for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageExtent {
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl PageExtent {
    #[inline]
    pub fn contains(&self, page_x: i32, page_z: i32) -> bool {
        page_x >= self.min_x && page_x <= self.max_x && page_z >= self.min_z && page_z <= self.max_z
    }
}

/// Rolling terrain from fractal OpenSimplex2 noise: `base + amplitude * n`
/// with `n` remapped to `[0, 1]`.
pub struct NoiseHeightfield {
    noise: FastNoiseLite,
    base: f32,
    amplitude: f32,
    extent: Option<PageExtent>,
}

impl NoiseHeightfield {
    pub fn new(seed: i32, frequency: f32, base: f32, amplitude: f32) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(frequency));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(4));
        Self {
            noise,
            base,
            amplitude: amplitude.abs(),
            extent: None,
        }
    }

    /// Restricts data to `extent`. A sample has data when the page of the
    /// tile asking for it is inside the extent.
    pub fn with_extent(mut self, extent: PageExtent) -> Self {
        self.extent = Some(extent);
        self
    }

    fn has_page(&self, page_x: i32, page_z: i32) -> bool {
        self.extent.map_or(true, |e| e.contains(page_x, page_z))
    }
}

impl HeightSource for NoiseHeightfield {
    fn height_at(&self, x: f32, z: f32, info: &TileInfo) -> Option<f32> {
        // the tile owns its far edge, which floor() would give to the next page
        if !self.has_page(info.page_x, info.page_z) {
            return None;
        }
        let n = self.noise.get_noise_2d(x, z).clamp(-1.0, 1.0);
        Some(self.base + self.amplitude * (n * 0.5 + 0.5))
    }

    fn max_height(&self, page_x: i32, page_z: i32) -> Option<f32> {
        if !self.has_page(page_x, page_z) {
            return None;
        }
        Some(self.base + self.amplitude)
    }
}
