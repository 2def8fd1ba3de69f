//! Translate, scale and rotate operations on scene nodes.
//!
//! Every operation takes a node by reference and returns the transformed
//! copy; callers assemble the new node list and swap it in atomically.

use crate::shapes::{NodePayload, SceneNode, ShapeDefinition, TextMeasurer};
use crate::validate;
use kurbo::{Point, Size, Vec2};
use std::f64::consts::{PI, TAU};

/// Normalize an angle into `(-PI, PI]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a > PI { a - TAU } else { a }
}

fn rotate_vec(v: Vec2, angle: f64) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Applies geometric operations under the engine's node constraints.
pub struct TransformEngine<'m> {
    min_node_size: f64,
    measurer: &'m dyn TextMeasurer,
}

impl<'m> TransformEngine<'m> {
    pub fn new(min_node_size: f64, measurer: &'m dyn TextMeasurer) -> Self {
        Self {
            min_node_size,
            measurer,
        }
    }

    /// Move a node by `delta`.
    pub fn translate(&self, node: &SceneNode, delta: Vec2) -> SceneNode {
        let mut node = node.clone();
        node.position += delta;
        node
    }

    /// Scale a node about `anchor`.
    ///
    /// Each axis factor is clamped so the result never drops below the
    /// minimum node size; aspect-locked nodes take the larger factor on both
    /// axes. Text reflows from a scaled font size instead of stretching.
    pub fn scale(&self, node: &SceneNode, anchor: Point, scale_x: f64, scale_y: f64) -> SceneNode {
        let sx = validate::axis_scale(scale_x).into_value();
        let sy = validate::axis_scale(scale_y).into_value();

        let mut eff_x = sx.max(self.min_node_size / node.size.width.max(f64::MIN_POSITIVE));
        let mut eff_y = sy.max(self.min_node_size / node.size.height.max(f64::MIN_POSITIVE));
        if node.aspect_ratio_locked {
            let uniform = eff_x.max(eff_y);
            eff_x = uniform;
            eff_y = uniform;
        }

        let mut out = node.clone();
        let offset = node.position - anchor;
        out.position = anchor + Vec2::new(offset.x * eff_x, offset.y * eff_y);

        match &mut out.payload {
            NodePayload::Text(text) => {
                text.font_size *= eff_x.max(eff_y);
                let bounds = self.measurer.measure(&text.measure_input());
                out.size = self.clamp_size(Size::new(bounds.width, bounds.height));
                // A layout still in flight was computed for the old font size.
                out.pending = None;
            }
            payload => {
                out.size = self.clamp_size(Size::new(node.size.width * eff_x, node.size.height * eff_y));
                // Area-equivalent linear factor keeps borders proportional under non-uniform scale.
                let linear = (eff_x * eff_y).sqrt();
                out.stroke.width *= linear;
                if let NodePayload::Shape(ShapeDefinition::Rectangle { corner_radius }) = payload {
                    *corner_radius *= linear;
                }
            }
        }
        log::trace!(
            "scaled node {} by ({:.4}, {:.4}) -> size {:?}",
            node.id(),
            eff_x,
            eff_y,
            out.size
        );
        out
    }

    /// Rotate a node's position around `anchor` and add `delta` to its rotation.
    pub fn rotate(&self, node: &SceneNode, anchor: Point, delta: f64) -> SceneNode {
        let delta = validate::angle(delta).into_value();
        let mut out = node.clone();
        out.position = anchor + rotate_vec(node.position - anchor, delta);
        out.rotation = normalize_angle(node.rotation + delta);
        out
    }

    /// Re-measure a text node at its current layout inputs, dropping any
    /// outstanding async layout. Other kinds are returned unchanged.
    pub fn remeasure(&self, node: &SceneNode) -> SceneNode {
        let mut out = node.clone();
        if let NodePayload::Text(text) = &out.payload {
            let bounds = self.measurer.measure(&text.measure_input());
            out.size = self.clamp_size(Size::new(bounds.width, bounds.height));
            out.pending = None;
        }
        out
    }

    pub fn clamp_size(&self, size: Size) -> Size {
        validate::size(size, self.min_node_size).into_value()
    }
}

/// Nodes captured at the start of an interactive gesture.
///
/// Each pointer move recomputes the result from this fixed state rather
/// than compounding the previous frame's output, so repeated small updates
/// cannot accumulate rounding drift.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformBaseline {
    nodes: Vec<SceneNode>,
}

impl TransformBaseline {
    pub fn capture<'a>(nodes: impl IntoIterator<Item = &'a SceneNode>) -> Self {
        Self {
            nodes: nodes.into_iter().cloned().collect(),
        }
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The baseline scaled by the gesture's total factors.
    pub fn scaled(&self, engine: &TransformEngine<'_>, anchor: Point, scale_x: f64, scale_y: f64) -> Vec<SceneNode> {
        self.nodes
            .iter()
            .map(|node| engine.scale(node, anchor, scale_x, scale_y))
            .collect()
    }

    /// The baseline rotated by the gesture's total angle.
    pub fn rotated(&self, engine: &TransformEngine<'_>, anchor: Point, total_delta: f64) -> Vec<SceneNode> {
        self.nodes
            .iter()
            .map(|node| engine.rotate(node, anchor, total_delta))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{ApproximateTextMeasurer, ImageDefinition, TextDefinition};
    use std::f64::consts::FRAC_PI_2;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> SceneNode {
        SceneNode::new(Point::new(x, y), Size::new(w, h), NodePayload::Shape(ShapeDefinition::rectangle(4.0)))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_normalize_angle() {
        assert!(approx(normalize_angle(0.0), 0.0));
        assert!(approx(normalize_angle(PI), PI));
        assert!(approx(normalize_angle(-PI), PI));
        assert!(approx(normalize_angle(3.0 * PI / 2.0), -FRAC_PI_2));
        assert!(approx(normalize_angle(-5.0 * TAU + 0.25), 0.25));
    }

    #[test]
    fn test_translate() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let moved = engine.translate(&rect(1.0, 2.0, 10.0, 10.0), Vec2::new(3.0, -4.0));
        assert_eq!(moved.position, Point::new(4.0, -2.0));
    }

    #[test]
    fn test_aspect_locked_scale_is_uniform() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let node = rect(0.0, 0.0, 100.0, 50.0).with_aspect_ratio_locked(true);
        let scaled = engine.scale(&node, node.position, 2.0, 0.5);
        assert!(approx(scaled.size.width, 200.0));
        assert!(approx(scaled.size.height, 100.0));
        assert_eq!(scaled.position, node.position);
    }

    #[test]
    fn test_scale_about_anchor_moves_position() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let node = rect(10.0, 20.0, 10.0, 10.0);
        let scaled = engine.scale(&node, Point::ZERO, 3.0, 0.5);
        assert!(approx(scaled.position.x, 30.0));
        assert!(approx(scaled.position.y, 10.0));
        assert!(approx(scaled.size.width, 30.0));
        assert!(approx(scaled.size.height, 5.0));
    }

    #[test]
    fn test_scale_respects_min_size() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let node = rect(0.0, 0.0, 10.0, 10.0);
        let scaled = engine.scale(&node, Point::ZERO, 0.0, -3.0);
        assert!(approx(scaled.size.width, 1.0));
        assert!(approx(scaled.size.height, 1.0));
    }

    #[test]
    fn test_stroke_and_radius_scale_by_area_factor() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let node = rect(0.0, 0.0, 10.0, 10.0);
        let scaled = engine.scale(&node, Point::ZERO, 4.0, 1.0);
        assert!(approx(scaled.stroke.width, 2.0 * 2.0));
        assert!(approx(scaled.as_shape().and_then(|s| s.corner_radius()).unwrap(), 8.0));
    }

    #[test]
    fn test_image_scale_keeps_stroke_free() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let node = SceneNode::new(
            Point::ZERO,
            Size::new(40.0, 20.0),
            NodePayload::Image(ImageDefinition::placeholder(Size::new(400.0, 200.0))),
        );
        let scaled = engine.scale(&node, Point::ZERO, 0.5, 3.0);
        // Images are aspect locked by default.
        assert!(approx(scaled.size.width, 120.0));
        assert!(approx(scaled.size.height, 60.0));
        assert!(approx(scaled.stroke.width, 0.0));
    }

    #[test]
    fn test_text_scale_reflows_font() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let node = engine.remeasure(&SceneNode::new(
            Point::ZERO,
            Size::new(1.0, 1.0),
            NodePayload::Text(TextDefinition::new("abcd", 10.0)),
        ));
        assert!(approx(node.size.width, 4.0 * 10.0 * 0.55));

        let scaled = engine.scale(&node, Point::ZERO, 1.5, 3.0);
        let text = scaled.as_text().unwrap();
        assert!(approx(text.font_size, 30.0));
        assert!(approx(scaled.size.width, 4.0 * 30.0 * 0.55));
        assert!(approx(scaled.size.height, 30.0 * 1.2));
    }

    #[test]
    fn test_rotate_about_anchor() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let node = rect(10.0, 0.0, 4.0, 4.0).with_rotation(PI - 0.1);
        let rotated = engine.rotate(&node, Point::ZERO, FRAC_PI_2);
        assert!(approx(rotated.position.x, 0.0));
        assert!(approx(rotated.position.y, 10.0));
        assert!(approx(rotated.rotation, -PI + FRAC_PI_2 - 0.1));
        assert!(rotated.rotation > -PI && rotated.rotation <= PI);
    }

    #[test]
    fn test_invalid_inputs_are_identity() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let node = rect(5.0, 5.0, 10.0, 10.0);
        assert_eq!(engine.scale(&node, Point::ZERO, f64::NAN, f64::INFINITY), node);
        assert_eq!(engine.rotate(&node, Point::ZERO, f64::NAN), node);
    }

    #[test]
    fn test_baseline_replay_matches_single_step() {
        let measurer = ApproximateTextMeasurer::default();
        let engine = TransformEngine::new(1.0, &measurer);
        let baseline = TransformBaseline::capture([&rect(3.0, 7.0, 13.0, 17.0)]);
        let anchor = Point::new(-1.0, 2.0);

        // Simulate a drag: every frame reuses the baseline with the running total.
        let total_at = |step: u32| 1.0 + step as f64 * 0.013;
        let mut frame = Vec::new();
        for step in 1..=100 {
            frame = baseline.scaled(&engine, anchor, total_at(step), total_at(step));
        }
        let direct = engine.scale(&baseline.nodes()[0], anchor, total_at(100), total_at(100));
        assert_eq!(frame[0], direct);
    }
}
