use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use strata_geom::Vec3;

/// On-disk layout of `paging.toml`. Every section and field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PagingConfigFile {
    #[serde(default)]
    pub tiles: Tiles,
    #[serde(default)]
    pub pool: Pool,
    #[serde(default)]
    pub streaming: Streaming,
    #[serde(default)]
    pub query: Query,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Tiles {
    #[serde(default = "default_tile_size")]
    pub size: u32,
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    #[serde(default = "default_tiles_per_page")]
    pub per_page: u32,
}
fn default_tile_size() -> u32 {
    32
}
fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}
fn default_tiles_per_page() -> u32 {
    4
}
impl Default for Tiles {
    fn default() -> Self {
        Self {
            size: default_tile_size(),
            scale: default_scale(),
            per_page: default_tiles_per_page(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Pool {
    #[serde(default = "default_initial_tiles")]
    pub initial_tiles: usize,
    #[serde(default = "default_increment")]
    pub increment: usize,
}
fn default_initial_tiles() -> usize {
    64
}
fn default_increment() -> usize {
    16
}
impl Default for Pool {
    fn default() -> Self {
        Self {
            initial_tiles: default_initial_tiles(),
            increment: default_increment(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Streaming {
    #[serde(default = "default_activation_radius")]
    pub activation_radius: f32,
    #[serde(default = "default_page_radius")]
    pub page_radius: i32,
}
fn default_activation_radius() -> f32 {
    160.0
}
fn default_page_radius() -> i32 {
    1
}
impl Default for Streaming {
    fn default() -> Self {
        Self {
            activation_radius: default_activation_radius(),
            page_radius: default_page_radius(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Query {
    #[serde(default = "default_max_steps")]
    pub max_steps_per_tile: u32,
}
fn default_max_steps() -> u32 {
    4096
}
impl Default for Query {
    fn default() -> Self {
        Self {
            max_steps_per_tile: default_max_steps(),
        }
    }
}

/// Flattened runtime parameters shared by the pool, tiles and pages.
#[derive(Clone, Debug, PartialEq)]
pub struct PagingConfig {
    /// Tile edge length in height samples.
    pub tile_size: u32,
    /// x/z: world units per sample step; y: world units per height unit.
    pub scale: Vec3,
    pub tiles_per_page: u32,
    pub initial_pool_size: usize,
    pub pool_increment: usize,
    pub activation_radius: f32,
    /// Pages kept around the camera, in pages (Chebyshev distance).
    pub page_radius: i32,
    pub max_steps_per_tile: u32,
}

impl PagingConfig {
    pub fn from_config(cfg: &PagingConfigFile) -> Self {
        let [sx, sy, sz] = cfg.tiles.scale;
        Self {
            tile_size: cfg.tiles.size,
            scale: Vec3::new(sx, sy, sz),
            tiles_per_page: cfg.tiles.per_page,
            initial_pool_size: cfg.pool.initial_tiles,
            pool_increment: cfg.pool.increment,
            activation_radius: cfg.streaming.activation_radius,
            page_radius: cfg.streaming.page_radius,
            max_steps_per_tile: cfg.query.max_steps_per_tile,
        }
    }

    /// World-space edge lengths of one tile on x and z.
    #[inline]
    pub fn tile_world_size(&self) -> (f32, f32) {
        let s = self.tile_size as f32;
        (s * self.scale.x, s * self.scale.z)
    }

    /// World-space edge lengths of one page on x and z.
    #[inline]
    pub fn page_world_size(&self) -> (f32, f32) {
        let (tx, tz) = self.tile_world_size();
        let n = self.tiles_per_page as f32;
        (tx * n, tz * n)
    }

    /// Converts a height sample to world units (`scale.y`).
    #[inline]
    pub fn world_height(&self, sample: f32) -> f32 {
        sample * self.scale.y
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 {
            return Err("tiles.size must be positive".into());
        }
        if !(self.scale.x > 0.0 && self.scale.y > 0.0 && self.scale.z > 0.0) {
            return Err(format!("tiles.scale must be positive, got {:?}", self.scale));
        }
        if self.tiles_per_page == 0 {
            return Err("tiles.per_page must be positive".into());
        }
        if self.pool_increment == 0 {
            return Err("pool.increment must be positive".into());
        }
        if !(self.activation_radius >= 0.0) {
            return Err("streaming.activation_radius must be non-negative".into());
        }
        if self.page_radius < 0 {
            return Err("streaming.page_radius must be non-negative".into());
        }
        if self.max_steps_per_tile == 0 {
            return Err("query.max_steps_per_tile must be positive".into());
        }
        Ok(())
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self::from_config(&PagingConfigFile::default())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<PagingConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let file: PagingConfigFile = toml::from_str(&s)?;
    let cfg = PagingConfig::from_config(&file);
    cfg.validate()?;
    Ok(cfg)
}
