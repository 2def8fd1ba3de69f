//! Resolution tier selection for tiled images.

use crate::shapes::{ImageDefinition, SceneNode};
use kurbo::Size;

/// Default minimum acceptable rendered-pixels-per-source-pixel.
pub const DEFAULT_MIN_TILE_DENSITY: f64 = 0.85;

/// Pick the coarsest tile level that still meets [`DEFAULT_MIN_TILE_DENSITY`].
pub fn pick_tile_level(base_density: f64, max_level: u32) -> u32 {
    pick_tile_level_with(base_density, max_level, DEFAULT_MIN_TILE_DENSITY)
}

/// Pick the coarsest tile level whose native resolution still meets `min_density`.
///
/// `base_density` is rendered pixels per level-0 source pixel. Each level
/// halves the resolution, doubling its density; so the level is
/// `ceil(log2(min_density / base_density))`, clamped to `[0, max_level]`.
/// Degenerate densities resolve to level 0.
pub fn pick_tile_level_with(base_density: f64, max_level: u32, min_density: f64) -> u32 {
    if !base_density.is_finite() || base_density <= 0.0 {
        return 0;
    }
    let min_density = if min_density.is_finite() && min_density > 0.0 {
        min_density
    } else {
        DEFAULT_MIN_TILE_DENSITY
    };
    if base_density >= min_density {
        return 0;
    }
    let level = (min_density / base_density).log2().ceil();
    if level >= max_level as f64 {
        max_level
    } else {
        level.max(0.0) as u32
    }
}

/// Rendered pixels per source pixel for an image drawn at `node_size` scene
/// units under `scene_scale`. The more demanding axis wins.
pub fn display_density(image: &ImageDefinition, node_size: Size, scene_scale: f64) -> f64 {
    let intrinsic = image.intrinsic_size;
    if intrinsic.width <= 0.0 || intrinsic.height <= 0.0 {
        return 0.0;
    }
    let dx = node_size.width * scene_scale / intrinsic.width;
    let dy = node_size.height * scene_scale / intrinsic.height;
    dx.max(dy)
}

/// Tile level the renderer should request for an image node this frame.
///
/// Returns `None` for non-image nodes and images still waiting on their asset.
pub fn tile_level_for_node(node: &SceneNode, scene_scale: f64, min_density: f64) -> Option<u32> {
    let image = node.as_image()?;
    if image.is_placeholder() {
        return None;
    }
    let density = display_density(image, node.size, scene_scale);
    let level = pick_tile_level_with(density, image.max_tile_level, min_density);
    log::trace!("node {} density {:.4} -> tile level {}", node.id(), density, level);
    Some(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{NodePayload, ShapeDefinition, TileLevel};
    use kurbo::Point;

    #[test]
    fn test_full_detail_when_dense_enough() {
        assert_eq!(pick_tile_level(1.2, 5), 0);
        assert_eq!(pick_tile_level(0.85, 5), 0);
    }

    #[test]
    fn test_coarser_levels() {
        assert_eq!(pick_tile_level(0.4, 5), 2);
        assert_eq!(pick_tile_level(0.5, 5), 1);
    }

    #[test]
    fn test_capped_at_max_level() {
        assert_eq!(pick_tile_level(0.001, 2), 2);
        assert_eq!(pick_tile_level(1e-12, 0), 0);
    }

    #[test]
    fn test_degenerate_density() {
        assert_eq!(pick_tile_level(0.0, 5), 0);
        assert_eq!(pick_tile_level(-1.0, 5), 0);
        assert_eq!(pick_tile_level(f64::NAN, 5), 0);
        assert_eq!(pick_tile_level(f64::INFINITY, 5), 0);
    }

    #[test]
    fn test_node_level_follows_zoom() {
        let image = ImageDefinition::new(
            "photo",
            Size::new(8000.0, 4000.0),
            256,
            (0..=5).map(|z| TileLevel { z, columns: 1, rows: 1 }).collect(),
        );
        let node = SceneNode::new(Point::ZERO, Size::new(800.0, 400.0), NodePayload::Image(image));
        // 800 scene units at scale 1 over 8000 source px -> density 0.1 -> ceil(log2(8.5)) = 4.
        assert_eq!(tile_level_for_node(&node, 1.0, DEFAULT_MIN_TILE_DENSITY), Some(4));
        assert_eq!(tile_level_for_node(&node, 10.0, DEFAULT_MIN_TILE_DENSITY), Some(0));
        assert_eq!(tile_level_for_node(&node, 1e-6, DEFAULT_MIN_TILE_DENSITY), Some(5));
    }

    #[test]
    fn test_non_image_has_no_level() {
        let node = SceneNode::new(
            Point::ZERO,
            Size::new(10.0, 10.0),
            NodePayload::Shape(ShapeDefinition::Ellipse),
        );
        assert_eq!(tile_level_for_node(&node, 1.0, DEFAULT_MIN_TILE_DENSITY), None);
    }
}
