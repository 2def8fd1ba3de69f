//! Selection overlay geometry and manipulation handles.

use crate::camera::CoordinateNormalizer;
use crate::config::HandleConfig;
use crate::shapes::SceneNode;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::TopLeft, Corner::TopRight, Corner::BottomRight, Corner::BottomLeft];

    pub fn opposite(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomRight => Corner::TopLeft,
            Corner::BottomLeft => Corner::TopRight,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Right, Edge::Bottom, Edge::Left];

    pub fn opposite(self) -> Edge {
        match self {
            Edge::Top => Edge::Bottom,
            Edge::Right => Edge::Left,
            Edge::Bottom => Edge::Top,
            Edge::Left => Edge::Right,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    Corner(Corner),
    Edge(Edge),
    Rotate,
}

/// A selection handle with its position in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub kind: HandleKind,
    pub position: Point,
}

/// Oriented bounding box around a selection, with handle offsets.
///
/// `corners`, `edges` and `rotation_handle` are offsets from `center` in
/// scene space, already rotated by `rotation`. Corners run top-left,
/// top-right, bottom-right, bottom-left; edges run top, right, bottom, left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionOverlay {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub corners: [Vec2; 4],
    pub edges: [Vec2; 4],
    pub rotation_handle: Vec2,
}

/// Handle radii and stroke width in scene units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandleSizing {
    pub stroke_width: f64,
    pub corner_radius: f64,
    pub edge_radius: f64,
    pub rotate_radius: f64,
}

impl HandleSizing {
    pub fn radius_for(&self, kind: HandleKind) -> f64 {
        match kind {
            HandleKind::Corner(_) => self.corner_radius,
            HandleKind::Edge(_) => self.edge_radius,
            HandleKind::Rotate => self.rotate_radius,
        }
    }
}

fn rotate(v: Vec2, angle: f64) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Circular mean of the node rotations.
///
/// A uniformly rotated group keeps its rotation; mixed rotations blend
/// continuously toward zero.
pub fn representative_rotation<'a>(nodes: impl IntoIterator<Item = &'a SceneNode>) -> f64 {
    let (sin, cos) = nodes
        .into_iter()
        .fold((0.0, 0.0), |(s, c), node| (s + node.rotation.sin(), c + node.rotation.cos()));
    sin.atan2(cos)
}

/// Compute the oriented selection box for one or more nodes.
///
/// Returns `None` for an empty selection.
pub fn calculate_group_selection_overlay(nodes: &[&SceneNode], config: &HandleConfig) -> Option<SelectionOverlay> {
    if nodes.is_empty() {
        return None;
    }
    let rotation = representative_rotation(nodes.iter().copied());

    // Axis-aligned extents in the frame rotated by -rotation.
    let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for node in nodes {
        for corner in node.corners() {
            let local = rotate(corner.to_vec2(), -rotation);
            min = Vec2::new(min.x.min(local.x), min.y.min(local.y));
            max = Vec2::new(max.x.max(local.x), max.y.max(local.y));
        }
    }

    let width = max.x - min.x;
    let height = max.y - min.y;
    let center = rotate((min + max) / 2.0, rotation).to_point();

    let hw = width / 2.0;
    let hh = height / 2.0;
    let corners = [
        Vec2::new(-hw, -hh),
        Vec2::new(hw, -hh),
        Vec2::new(hw, hh),
        Vec2::new(-hw, hh),
    ]
    .map(|v| rotate(v, rotation));
    let edges = [
        Vec2::new(0.0, -hh),
        Vec2::new(hw, 0.0),
        Vec2::new(0.0, hh),
        Vec2::new(-hw, 0.0),
    ]
    .map(|v| rotate(v, rotation));
    let offset = config.rotate_offset_min.max(config.rotate_offset_ratio * width.max(height));
    let rotation_handle = rotate(Vec2::new(0.0, -hh - offset), rotation);

    Some(SelectionOverlay {
        center,
        width,
        height,
        rotation,
        corners,
        edges,
        rotation_handle,
    })
}

/// Handle sizes that stay a constant apparent size on screen when zoomed
/// out and never shrink below `base_size` when zoomed in.
pub fn calculate_selection_handle_sizing(scale: f64, config: &HandleConfig) -> HandleSizing {
    let scale = crate::validate::scale_multiplier(scale).into_value();
    let sized = |base: f64| base.max(base / scale);
    let base = config.base_size;
    HandleSizing {
        stroke_width: sized(base / 8.0),
        corner_radius: sized(base),
        edge_radius: sized(base * 0.75),
        rotate_radius: sized(base),
    }
}

impl SelectionOverlay {
    pub fn corner(&self, corner: Corner) -> Point {
        self.center + self.corners[corner.index()]
    }

    pub fn edge(&self, edge: Edge) -> Point {
        self.center + self.edges[edge.index()]
    }

    pub fn rotation_handle_position(&self) -> Point {
        self.center + self.rotation_handle
    }

    pub fn handle_position(&self, kind: HandleKind) -> Point {
        match kind {
            HandleKind::Corner(c) => self.corner(c),
            HandleKind::Edge(e) => self.edge(e),
            HandleKind::Rotate => self.rotation_handle_position(),
        }
    }

    /// All handles: corners, then edges, then rotation.
    pub fn handles(&self) -> Vec<Handle> {
        let corners = Corner::ALL.iter().map(|&c| HandleKind::Corner(c));
        let edges = Edge::ALL.iter().map(|&e| HandleKind::Edge(e));
        corners
            .chain(edges)
            .chain(std::iter::once(HandleKind::Rotate))
            .map(|kind| Handle {
                kind,
                position: self.handle_position(kind),
            })
            .collect()
    }

    /// Fixed point for a scale drag from `kind`: the opposite corner or edge.
    /// Rotation pivots around the center.
    pub fn anchor_for(&self, kind: HandleKind) -> Point {
        match kind {
            HandleKind::Corner(c) => self.corner(c.opposite()),
            HandleKind::Edge(e) => self.edge(e.opposite()),
            HandleKind::Rotate => self.center,
        }
    }

    /// Whether a scene point lies inside the oriented box.
    pub fn contains(&self, point: Point) -> bool {
        let local = rotate(point - self.center, -self.rotation);
        local.x.abs() <= self.width / 2.0 && local.y.abs() <= self.height / 2.0
    }

    /// Find the handle hit by a scene-space point at the given scene scale.
    ///
    /// A handle is hit when the distance is within
    /// `max(radius * hit_padding, min_pixel_threshold / scale)`; the nearest
    /// hit handle wins.
    pub fn hit_test_handles(&self, point: Point, scale: f64, config: &HandleConfig) -> Option<HandleKind> {
        let scale = crate::validate::scale_multiplier(scale).into_value();
        let sizing = calculate_selection_handle_sizing(scale, config);
        let min_distance = config.min_pixel_threshold / scale;
        self.handles()
            .into_iter()
            .filter_map(|handle| {
                let threshold = (sizing.radius_for(handle.kind) * config.hit_padding).max(min_distance);
                let distance = handle.position.distance(point);
                (distance <= threshold).then_some((distance, handle.kind))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, kind)| kind)
    }

    /// Screen-space variant of [`hit_test_handles`](Self::hit_test_handles).
    pub fn hit_test_handles_screen(
        &self,
        screen_point: Point,
        camera: &CoordinateNormalizer,
        config: &HandleConfig,
    ) -> Option<HandleKind> {
        self.hit_test_handles(camera.screen_to_scene(screen_point), camera.scene_scale(), config)
    }
}
