//! Tiled raster image payloads.

use kurbo::Size;
use serde::{Deserialize, Serialize};

/// One resolution tier of a tiled image. Level `z` has `1 / 2^z` of the
/// intrinsic resolution on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLevel {
    pub z: u32,
    pub columns: u32,
    pub rows: u32,
}

/// Image metadata supplied by the asset/tile provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDefinition {
    pub asset_id: String,
    /// Full-resolution size in source pixels.
    pub intrinsic_size: Size,
    /// Edge length of a square tile, in pixels of its own level.
    pub tile_size: u32,
    /// Ordered by `z`, finest first.
    pub tile_levels: Vec<TileLevel>,
    pub max_tile_level: u32,
}

impl ImageDefinition {
    pub fn new(asset_id: impl Into<String>, intrinsic_size: Size, tile_size: u32, mut tile_levels: Vec<TileLevel>) -> Self {
        tile_levels.sort_by_key(|level| level.z);
        let max_tile_level = tile_levels.last().map(|level| level.z).unwrap_or(0);
        Self {
            asset_id: asset_id.into(),
            intrinsic_size,
            tile_size: tile_size.max(1),
            tile_levels,
            max_tile_level,
        }
    }

    /// Metadata for an image whose asset has not arrived yet.
    pub fn placeholder(intrinsic_size: Size) -> Self {
        Self {
            asset_id: String::new(),
            intrinsic_size,
            tile_size: 256,
            tile_levels: Vec::new(),
            max_tile_level: 0,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.asset_id.is_empty()
    }

    pub fn level(&self, z: u32) -> Option<&TileLevel> {
        self.tile_levels.iter().find(|level| level.z == z)
    }

    /// Source-pixel size of the image at level `z`.
    pub fn level_size(&self, z: u32) -> Size {
        let divisor = 2f64.powi(z as i32);
        Size::new(self.intrinsic_size.width / divisor, self.intrinsic_size.height / divisor)
    }

    /// Tile grid `(columns, rows)` at level `z`, computed from the level size
    /// when the provider did not list that level.
    pub fn grid_for(&self, z: u32) -> (u32, u32) {
        if let Some(level) = self.level(z) {
            return (level.columns, level.rows);
        }
        let size = self.level_size(z);
        let tile = self.tile_size.max(1) as f64;
        let columns = (size.width / tile).ceil().max(1.0) as u32;
        let rows = (size.height / tile).ceil().max(1.0) as u32;
        (columns, rows)
    }
}
