use strata_paging::{HeightSource, TileInfo};

/// Height grid of one tile, sampled at `resolution²` evenly spaced
/// vertices from the tile origin to its far edge.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMesh {
    pub resolution: u32,
    pub spacing: (f32, f32),
    pub origin: (f32, f32),
    // row-major, z outer
    pub heights: Vec<f32>,
    pub min_height: f32,
    pub max_height: f32,
    /// Vertices the source had no data for; they sit at `min_height`.
    pub missing: usize,
}

impl TileMesh {
    /// Samples `source` over the tile described by `info`. `size` is the
    /// world-space edge length on x and z; `resolution` is clamped to 2.
    /// Stored heights are world heights, `height_scale` times the samples.
    pub fn build(
        source: &dyn HeightSource,
        info: &TileInfo,
        size: (f32, f32),
        resolution: u32,
        height_scale: f32,
    ) -> Self {
        let resolution = resolution.max(2);
        let n = resolution as usize;
        let spacing = (
            size.0 / (resolution - 1) as f32,
            size.1 / (resolution - 1) as f32,
        );
        let origin = info.position();

        let mut samples = Vec::with_capacity(n * n);
        for j in 0..n {
            let z = origin.1 + j as f32 * spacing.1;
            for i in 0..n {
                let x = origin.0 + i as f32 * spacing.0;
                samples.push(source.height_at(x, z, info).map(|h| h * height_scale));
            }
        }

        let (mut min_height, mut max_height) = (f32::INFINITY, f32::NEG_INFINITY);
        for h in samples.iter().flatten() {
            min_height = min_height.min(*h);
            max_height = max_height.max(*h);
        }
        if !min_height.is_finite() {
            min_height = 0.0;
            max_height = 0.0;
        }
        let missing = samples.iter().filter(|s| s.is_none()).count();
        let heights = samples
            .into_iter()
            .map(|s| s.unwrap_or(min_height))
            .collect();

        Self {
            resolution,
            spacing,
            origin,
            heights,
            min_height,
            max_height,
            missing,
        }
    }

    #[inline]
    pub fn idx(&self, i: u32, j: u32) -> usize {
        (j * self.resolution + i) as usize
    }

    #[inline]
    pub fn height(&self, i: u32, j: u32) -> Option<f32> {
        if i >= self.resolution || j >= self.resolution {
            return None;
        }
        self.heights.get(self.idx(i, j)).copied()
    }

    /// Bilinear height at world `(x, z)`, or `None` outside the tile.
    pub fn sample(&self, x: f32, z: f32) -> Option<f32> {
        let fx = (x - self.origin.0) / self.spacing.0;
        let fz = (z - self.origin.1) / self.spacing.1;
        let last = (self.resolution - 1) as f32;
        if !(0.0..=last).contains(&fx) || !(0.0..=last).contains(&fz) {
            return None;
        }
        let i0 = (fx.floor() as u32).min(self.resolution - 2);
        let j0 = (fz.floor() as u32).min(self.resolution - 2);
        let (tx, tz) = (fx - i0 as f32, fz - j0 as f32);
        let h00 = self.height(i0, j0)?;
        let h10 = self.height(i0 + 1, j0)?;
        let h01 = self.height(i0, j0 + 1)?;
        let h11 = self.height(i0 + 1, j0 + 1)?;
        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        Some(top + (bottom - top) * tz)
    }
}
