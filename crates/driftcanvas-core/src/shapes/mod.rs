//! Scene node definitions.

mod image;
mod shape;
mod text;

pub use image::{ImageDefinition, TileLevel};
pub use shape::{ShapeDefinition, default_triangle};
pub use text::{
    ApproximateTextMeasurer, FontStyle, FontWeight, TextAlign, TextBounds, TextDefinition, TextMeasureInput,
    TextMeasurer, TextStyle,
};

use crate::loading::PendingLoad;
use kurbo::{Affine, BezPath, Point, Rect, Size, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for scene nodes.
pub type NodeId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Outline style of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: SerializableColor,
    pub width: f64,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: SerializableColor::black(),
            width: 2.0,
        }
    }
}

impl Stroke {
    pub fn none() -> Self {
        Self {
            color: SerializableColor::transparent(),
            width: 0.0,
        }
    }

    pub fn color(&self) -> Color {
        self.color.into()
    }
}

/// Discriminant of [`NodePayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Shape,
    Image,
    Text,
}

/// Kind-specific node content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodePayload {
    Shape(ShapeDefinition),
    Image(ImageDefinition),
    Text(TextDefinition),
}

impl NodePayload {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodePayload::Shape(_) => NodeKind::Shape,
            NodePayload::Image(_) => NodeKind::Image,
            NodePayload::Text(_) => NodeKind::Text,
        }
    }
}

/// A node on the design surface.
///
/// `position` is the center of the node; `rotation` turns the node's box
/// around that center (radians, clockwise in screen space since y points down).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub(crate) id: NodeId,
    pub position: Point,
    pub size: Size,
    pub rotation: f64,
    pub locked: bool,
    pub aspect_ratio_locked: bool,
    pub fill: Option<SerializableColor>,
    pub stroke: Stroke,
    pub payload: NodePayload,
    /// Outstanding async load, if any.
    #[serde(skip)]
    pub(crate) pending: Option<PendingLoad>,
}

impl SceneNode {
    /// Create a node centered at `position`.
    pub fn new(position: Point, size: Size, payload: NodePayload) -> Self {
        let (fill, stroke, aspect_ratio_locked) = match &payload {
            NodePayload::Shape(_) => (Some(SerializableColor::white()), Stroke::default(), false),
            NodePayload::Image(_) => (None, Stroke::none(), true),
            NodePayload::Text(_) => (Some(SerializableColor::black()), Stroke::none(), false),
        };
        Self {
            id: Uuid::new_v4(),
            position,
            size,
            rotation: 0.0,
            locked: false,
            aspect_ratio_locked,
            fill,
            stroke,
            payload,
            pending: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    pub fn pending_load(&self) -> Option<&PendingLoad> {
        self.pending.as_ref()
    }

    /// Builder-style rotation setter.
    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_aspect_ratio_locked(mut self, locked: bool) -> Self {
        self.aspect_ratio_locked = locked;
        self
    }

    pub fn as_shape(&self) -> Option<&ShapeDefinition> {
        match &self.payload {
            NodePayload::Shape(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageDefinition> {
        match &self.payload {
            NodePayload::Image(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextDefinition> {
        match &self.payload {
            NodePayload::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextDefinition> {
        match &mut self.payload {
            NodePayload::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.payload, NodePayload::Text(_))
    }

    /// Transform from node-local space (origin at center, unrotated) to scene space.
    pub fn local_to_scene(&self) -> Affine {
        Affine::translate(self.position.to_vec2()) * Affine::rotate(self.rotation)
    }

    /// Corners in scene space: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point; 4] {
        let hw = self.size.width / 2.0;
        let hh = self.size.height / 2.0;
        let xf = self.local_to_scene();
        [
            xf * Point::new(-hw, -hh),
            xf * Point::new(hw, -hh),
            xf * Point::new(hw, hh),
            xf * Point::new(-hw, hh),
        ]
    }

    /// Axis-aligned bounding box of the rotated node.
    pub fn bounds(&self) -> Rect {
        let [a, b, c, d] = self.corners();
        Rect::from_points(a, b).union_pt(c).union_pt(d)
    }

    /// Check if a scene point hits this node's rotated box.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let local = self.local_to_scene().inverse() * point;
        local.x.abs() <= self.size.width / 2.0 + tolerance && local.y.abs() <= self.size.height / 2.0 + tolerance
    }

    /// Outline path in scene space, for renderers and export.
    pub fn to_path(&self) -> BezPath {
        let local = match &self.payload {
            NodePayload::Shape(shape) => shape.local_path(self.size),
            NodePayload::Image(_) | NodePayload::Text(_) => {
                let half = Vec2::new(self.size.width / 2.0, self.size.height / 2.0);
                let rect = Rect::from_points((-half).to_point(), half.to_point());
                kurbo::Shape::to_path(&rect, 0.1)
            }
        };
        self.local_to_scene() * local
    }
}
