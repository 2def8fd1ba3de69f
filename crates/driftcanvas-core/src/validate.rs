//! Input sanitizing for the mutation API.
//!
//! Mutations never fail. Each helper returns the value the engine will
//! actually use plus an optional [`InputIssue`] describing what was replaced.

use kurbo::{Point, Size, Vec2};
use thiserror::Error;

/// A problem found in caller-supplied input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputIssue {
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
    #[error("non-positive value {value} for {what}")]
    NonPositive { what: &'static str, value: f64 },
    #[error("{what} clamped from {from} to {to}")]
    Clamped { what: &'static str, from: f64, to: f64 },
    #[error("polygon has {0} points, substituted default triangle")]
    DegeneratePolygon(usize),
}

/// A sanitized value together with the issue that caused any substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    pub value: T,
    pub issue: Option<InputIssue>,
}

impl<T> Validated<T> {
    pub fn ok(value: T) -> Self {
        Self { value, issue: None }
    }

    pub fn replaced(value: T, issue: InputIssue) -> Self {
        log::debug!("input replaced: {}", issue);
        Self {
            value,
            issue: Some(issue),
        }
    }

    /// Discard the diagnostic.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn was_replaced(&self) -> bool {
        self.issue.is_some()
    }
}

/// A multiplicative factor: must be finite and strictly positive, identity otherwise.
pub fn scale_multiplier(m: f64) -> Validated<f64> {
    if !m.is_finite() {
        Validated::replaced(1.0, InputIssue::NonFinite("scale multiplier"))
    } else if m <= 0.0 {
        Validated::replaced(1.0, InputIssue::NonPositive { what: "scale multiplier", value: m })
    } else {
        Validated::ok(m)
    }
}

/// A per-axis scale factor for node transforms. Negative factors are allowed
/// through here and clamped later against the minimum node size.
pub fn axis_scale(s: f64) -> Validated<f64> {
    if s.is_finite() {
        Validated::ok(s)
    } else {
        Validated::replaced(1.0, InputIssue::NonFinite("axis scale"))
    }
}

/// A translation delta; any non-finite component zeroes the whole delta.
pub fn delta(v: Vec2) -> Validated<Vec2> {
    if v.x.is_finite() && v.y.is_finite() {
        Validated::ok(v)
    } else {
        Validated::replaced(Vec2::ZERO, InputIssue::NonFinite("translation delta"))
    }
}

/// An angle in radians; non-finite angles become zero.
pub fn angle(radians: f64) -> Validated<f64> {
    if radians.is_finite() {
        Validated::ok(radians)
    } else {
        Validated::replaced(0.0, InputIssue::NonFinite("angle"))
    }
}

/// A point; non-finite components fall back to `fallback`.
pub fn point(p: Point, fallback: Point) -> Validated<Point> {
    if p.x.is_finite() && p.y.is_finite() {
        Validated::ok(p)
    } else {
        Validated::replaced(fallback, InputIssue::NonFinite("point"))
    }
}

/// A size; each axis is clamped to at least `min`.
pub fn size(s: Size, min: f64) -> Validated<Size> {
    let clamp_axis = |v: f64| if v.is_finite() { v.max(min) } else { min };
    let out = Size::new(clamp_axis(s.width), clamp_axis(s.height));
    if out == s {
        Validated::ok(s)
    } else if !(s.width.is_finite() && s.height.is_finite()) {
        Validated::replaced(out, InputIssue::NonFinite("size"))
    } else {
        let from = s.width.min(s.height);
        Validated::replaced(out, InputIssue::Clamped { what: "size", from, to: min })
    }
}

/// A non-negative length such as a stroke width or corner radius.
pub fn length(v: f64, what: &'static str) -> Validated<f64> {
    if !v.is_finite() {
        Validated::replaced(0.0, InputIssue::NonFinite(what))
    } else if v < 0.0 {
        Validated::replaced(0.0, InputIssue::Clamped { what, from: v, to: 0.0 })
    } else {
        Validated::ok(v)
    }
}

/// A strictly positive quantity such as a font size; falls back to `fallback`.
pub fn positive(v: f64, fallback: f64, what: &'static str) -> Validated<f64> {
    if !v.is_finite() {
        Validated::replaced(fallback, InputIssue::NonFinite(what))
    } else if v <= 0.0 {
        Validated::replaced(fallback, InputIssue::NonPositive { what, value: v })
    } else {
        Validated::ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_multiplier() {
        assert_eq!(scale_multiplier(2.0), Validated::ok(2.0));
        assert_eq!(scale_multiplier(f64::NAN).value, 1.0);
        assert_eq!(scale_multiplier(f64::INFINITY).value, 1.0);
        let zero = scale_multiplier(0.0);
        assert_eq!(zero.value, 1.0);
        assert!(matches!(zero.issue, Some(InputIssue::NonPositive { .. })));
    }

    #[test]
    fn test_delta() {
        assert_eq!(delta(Vec2::new(1.0, 2.0)).value, Vec2::new(1.0, 2.0));
        let bad = delta(Vec2::new(1.0, f64::NAN));
        assert_eq!(bad.value, Vec2::ZERO);
        assert!(bad.was_replaced());
    }

    #[test]
    fn test_size_clamped() {
        let s = size(Size::new(0.2, 50.0), 1.0);
        assert_eq!(s.value, Size::new(1.0, 50.0));
        assert!(matches!(s.issue, Some(InputIssue::Clamped { .. })));
        assert!(!size(Size::new(3.0, 4.0), 1.0).was_replaced());
    }

    #[test]
    fn test_length() {
        assert_eq!(length(-3.0, "stroke width").value, 0.0);
        assert_eq!(length(2.5, "stroke width").value, 2.5);
    }
}
