//! Vector shape payloads.

use crate::validate::{InputIssue, Validated};
use kurbo::{BezPath, Ellipse, Point, Rect, RoundedRect, Shape as KurboShape, Size};
use serde::{Deserialize, Serialize};

/// Geometry of a shape node, expressed independently of the node's size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeDefinition {
    Rectangle { corner_radius: f64 },
    Ellipse,
    /// Points are relative to the unit square: (0, 0) is the node's top-left
    /// corner, (1, 1) its bottom-right.
    Polygon { points: Vec<Point> },
}

/// Substituted for polygons with fewer than three points.
pub fn default_triangle() -> Vec<Point> {
    vec![Point::new(0.5, 0.0), Point::new(1.0, 1.0), Point::new(0.0, 1.0)]
}

impl ShapeDefinition {
    pub fn rectangle(corner_radius: f64) -> Self {
        ShapeDefinition::Rectangle {
            corner_radius: crate::validate::length(corner_radius, "corner radius").into_value(),
        }
    }

    /// Build a polygon, substituting the default triangle for degenerate input.
    pub fn polygon(points: Vec<Point>) -> Validated<Self> {
        let finite = points.iter().all(|p| p.x.is_finite() && p.y.is_finite());
        if points.len() >= 3 && finite {
            Validated::ok(ShapeDefinition::Polygon { points })
        } else {
            Validated::replaced(
                ShapeDefinition::Polygon {
                    points: default_triangle(),
                },
                InputIssue::DegeneratePolygon(points.len()),
            )
        }
    }

    /// Regular polygon inscribed in the unit square, first vertex at top-center.
    pub fn regular_polygon(sides: usize) -> Self {
        let sides = sides.max(3);
        let points = (0..sides)
            .map(|i| {
                let angle = -std::f64::consts::FRAC_PI_2 + i as f64 * std::f64::consts::TAU / sides as f64;
                Point::new(0.5 + 0.5 * angle.cos(), 0.5 + 0.5 * angle.sin())
            })
            .collect();
        ShapeDefinition::Polygon { points }
    }

    /// Re-establish invariants on a definition that bypassed the constructors
    /// (e.g. deserialized input).
    pub fn sanitized(self) -> Self {
        match self {
            ShapeDefinition::Polygon { points } => ShapeDefinition::polygon(points).into_value(),
            ShapeDefinition::Rectangle { corner_radius } => ShapeDefinition::rectangle(corner_radius),
            ShapeDefinition::Ellipse => ShapeDefinition::Ellipse,
        }
    }

    pub fn corner_radius(&self) -> Option<f64> {
        match self {
            ShapeDefinition::Rectangle { corner_radius } => Some(*corner_radius),
            _ => None,
        }
    }

    /// Outline in node-local space (origin at the node center).
    pub fn local_path(&self, size: Size) -> BezPath {
        let rect = Rect::new(-size.width / 2.0, -size.height / 2.0, size.width / 2.0, size.height / 2.0);
        match self {
            ShapeDefinition::Rectangle { corner_radius } if *corner_radius > 0.0 => {
                let radius = corner_radius.min(size.width.min(size.height) / 2.0);
                RoundedRect::from_rect(rect, radius).to_path(0.1)
            }
            ShapeDefinition::Rectangle { .. } => rect.to_path(0.1),
            ShapeDefinition::Ellipse => Ellipse::from_rect(rect).to_path(0.1),
            ShapeDefinition::Polygon { points } => {
                let mut path = BezPath::new();
                let to_local = |p: &Point| Point::new(rect.x0 + p.x * size.width, rect.y0 + p.y * size.height);
                let mut iter = points.iter();
                if let Some(first) = iter.next() {
                    path.move_to(to_local(first));
                    for p in iter {
                        path.line_to(to_local(p));
                    }
                    path.close_path();
                }
                path
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_polygon_gets_triangle() {
        let result = ShapeDefinition::polygon(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        assert_eq!(result.issue, Some(InputIssue::DegeneratePolygon(2)));
        assert_eq!(
            result.value,
            ShapeDefinition::Polygon {
                points: default_triangle()
            }
        );
    }

    #[test]
    fn test_valid_polygon_kept() {
        let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0), Point::new(0.0, 1.0)];
        let result = ShapeDefinition::polygon(points.clone());
        assert!(!result.was_replaced());
        assert_eq!(result.value, ShapeDefinition::Polygon { points });
    }

    #[test]
    fn test_sanitized_repairs_deserialized_polygon() {
        let json = r#"{"Polygon":{"points":[{"x":0.0,"y":0.0}]}}"#;
        let shape: ShapeDefinition = serde_json::from_str(json).unwrap();
        match shape.sanitized() {
            ShapeDefinition::Polygon { points } => assert_eq!(points.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_regular_polygon_in_unit_square() {
        let ShapeDefinition::Polygon { points } = ShapeDefinition::regular_polygon(6) else {
            panic!("expected polygon");
        };
        assert_eq!(points.len(), 6);
        assert!((points[0].x - 0.5).abs() < 1e-12);
        assert!(points[0].y.abs() < 1e-12);
        assert!(points.iter().all(|p| (0.0..=1.0 + 1e-12).contains(&p.x) && (-1e-12..=1.0 + 1e-12).contains(&p.y)));
    }

    #[test]
    fn test_polygon_path_spans_node() {
        let shape = ShapeDefinition::Polygon {
            points: default_triangle(),
        };
        let bbox = shape.local_path(Size::new(40.0, 20.0)).bounding_box();
        assert!((bbox.width() - 40.0).abs() < 1e-9);
        assert!((bbox.height() - 20.0).abs() < 1e-9);
    }
}
