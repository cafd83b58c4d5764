//! Terrain tile paging: a pooled arena of tiles that stream renderables in
//! and out around the camera, keep symmetric neighbour links for seam
//! stitching, and answer ray queries across tile borders.
#![forbid(unsafe_code)]

pub mod collab;
pub mod config;
mod direction;
mod error;
pub mod heightfield;
mod manager;
pub mod page;
pub mod scene;
pub mod tile;
mod tile_info;

pub use collab::{
    AlwaysVisible, HeightSource, LoadCompletion, MaterialId, NodeId, PagingContext, QueryContext,
    RenderableId, RenderableManager, SceneGraph, Visibility,
};
pub use config::{PagingConfig, load_config_from_path};
pub use direction::Direction;
pub use error::TileError;
pub use heightfield::{FlatHeightfield, NoiseHeightfield, PageExtent};
pub use manager::{TileManager, TilePoolStats};
pub use page::{FrameStats, Page, PageGrid};
pub use scene::SceneTree;
pub use tile::{NotifyOutcome, Tile, TileId, TileState};
pub use tile_info::TileInfo;
