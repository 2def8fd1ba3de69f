//! Camera module: pan/zoom with normalized precision.
//!
//! The scene scale is stored as `mantissa * factor^exponent` with the
//! mantissa held in a narrow band, and the translation is split between a
//! scene-space `origin` and the true `scene_position`. Render space is the
//! scene translated by `-origin` and multiplied by `factor^exponent` only, so
//! neither render coordinates nor the renderer's outer translation grow with
//! absolute zoom or pan distance.

use crate::config::NormalizerConfig;
use crate::validate;
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Camera state as seen by the rest of the system.
///
/// `screen = scene * scale + position`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldTransform {
    pub position: Vec2,
    pub scale: f64,
}

/// Internal representation of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub mantissa: f64,
    pub exponent: i32,
    /// Scene-space offset subtracted before scaling into render space.
    pub origin: Point,
    /// True camera translation in screen pixels.
    pub scene_position: Vec2,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            mantissa: 1.0,
            exponent: 0,
            origin: Point::ZERO,
            scene_position: Vec2::ZERO,
        }
    }
}

/// Camera with bounded numeric precision across the whole zoom range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateNormalizer {
    state: CameraState,
    config: NormalizerConfig,
}

impl Default for CoordinateNormalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl CoordinateNormalizer {
    /// Create a camera at scale 1 with no translation. An inconsistent
    /// config is replaced by the defaults.
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            state: CameraState::default(),
            config: config.or_default(),
        }
    }

    /// Repair a camera restored from outside the engine: an inconsistent
    /// config is replaced by the defaults and the mantissa is brought back
    /// into its band.
    pub fn sanitized(mut self) -> Self {
        if self.config.validate().is_err() {
            self.config = NormalizerConfig::default();
        }
        let s = &mut self.state;
        if !(s.mantissa.is_finite() && s.mantissa > 0.0) {
            s.mantissa = 1.0;
            s.exponent = 0;
        }
        if !(s.origin.x.is_finite() && s.origin.y.is_finite()) {
            s.origin = Point::ZERO;
        }
        s.scene_position = validate::delta(s.scene_position).into_value();
        self.normalize();
        self.recenter();
        self
    }

    /// Internal mantissa/exponent state.
    pub fn state(&self) -> &CameraState {
        &self.state
    }

    /// The configuration in effect.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// `mantissa * factor^exponent`.
    pub fn scene_scale(&self) -> f64 {
        self.state.mantissa * self.scale_factor()
    }

    /// `factor^exponent`, the part of the scale baked into render coordinates.
    pub fn scale_factor(&self) -> f64 {
        self.config.factor.powi(self.state.exponent)
    }

    /// The residual scale the renderer applies on top of render coordinates.
    pub fn render_scale(&self) -> f64 {
        self.state.mantissa
    }

    /// The translation the renderer applies after [`render_scale`](Self::render_scale).
    pub fn render_translation(&self) -> Vec2 {
        self.state.scene_position + self.state.origin.to_vec2() * self.scene_scale()
    }

    /// True camera translation in screen pixels.
    pub fn scene_position(&self) -> Vec2 {
        self.state.scene_position
    }

    /// Camera position and total scale as one transform.
    pub fn world(&self) -> WorldTransform {
        WorldTransform {
            position: self.state.scene_position,
            scale: self.scene_scale(),
        }
    }

    /// Multiply the scene scale by `m`.
    ///
    /// Invalid multipliers are treated as identity. The resulting scale is
    /// clamped to `[min_scale, max_scale]`, so the final scale equals the
    /// initial scale times the product of all multipliers only while every
    /// intermediate result stays inside that range. Returns the multiplier
    /// actually applied.
    pub fn multiply_scene_scale(&mut self, m: f64) -> f64 {
        let m = validate::scale_multiplier(m).into_value();
        let current = self.scene_scale();
        let target = (current * m).clamp(self.config.min_scale, self.config.max_scale);
        let applied = target / current;
        self.state.mantissa *= applied;
        self.normalize();
        self.recenter();
        applied
    }

    /// Replace the scene scale outright.
    pub fn set_scene_scale(&mut self, scale: f64) {
        let scale = validate::positive(scale, self.scene_scale(), "scene scale")
            .into_value()
            .clamp(self.config.min_scale, self.config.max_scale);
        self.state.mantissa = scale;
        self.state.exponent = 0;
        self.normalize();
        self.recenter();
    }

    /// Replace the camera translation (screen pixels).
    pub fn set_scene_position(&mut self, position: Vec2) {
        self.state.scene_position = validate::delta(position).into_value();
        self.recenter();
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        let delta = validate::delta(delta).into_value();
        if delta == Vec2::ZERO {
            return;
        }
        self.state.scene_position += delta;
        self.recenter();
    }

    /// Zoom the camera, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let Some(anchor) = finite_point(screen_point) else {
            return;
        };
        let scene_point = self.screen_to_scene(anchor);
        self.multiply_scene_scale(factor);
        let moved = self.scene_to_screen(scene_point);
        self.pan(anchor - moved);
    }

    /// Fit the camera to show the given bounding box.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            return;
        }

        let padded = Size::new(
            (viewport.width - padding * 2.0).max(1.0),
            (viewport.height - padding * 2.0).max(1.0),
        );
        let scale = (padded.width / bounds.width()).min(padded.height / bounds.height());
        self.set_scene_scale(scale);

        let viewport_center = Vec2::new(viewport.width / 2.0, viewport.height / 2.0);
        let s = self.scene_scale();
        self.set_scene_position(viewport_center - bounds.center().to_vec2() * s);
    }

    /// Reset camera to scale 1 at the scene origin.
    pub fn reset(&mut self) {
        self.state = CameraState::default();
    }

    /// `(point - origin) * factor^exponent`.
    pub fn scene_to_render(&self, point: Point) -> Point {
        ((point - self.state.origin) * self.scale_factor()).to_point()
    }

    /// Exact inverse of [`scene_to_render`](Self::scene_to_render).
    pub fn render_to_scene(&self, point: Point) -> Point {
        self.state.origin + point.to_vec2() / self.scale_factor()
    }

    /// Scale a scalar extent (stroke width, radius) into render space.
    pub fn length_to_render(&self, v: f64) -> f64 {
        v * self.scale_factor()
    }

    /// Scene point to screen pixels, routed through render space.
    pub fn scene_to_screen(&self, point: Point) -> Point {
        let render = self.scene_to_render(point);
        (render.to_vec2() * self.state.mantissa + self.render_translation()).to_point()
    }

    /// Screen pixels to scene point, routed through render space.
    pub fn screen_to_scene(&self, point: Point) -> Point {
        let render = (point.to_vec2() - self.render_translation()) / self.state.mantissa;
        self.render_to_scene(render.to_point())
    }

    /// Convert a screen-space distance to scene units.
    pub fn screen_length_to_scene(&self, v: f64) -> f64 {
        v / self.scene_scale()
    }

    /// The scene-space rectangle covered by a viewport.
    pub fn visible_scene_rect(&self, viewport: Size) -> Rect {
        let p0 = self.screen_to_scene(Point::ZERO);
        let p1 = self.screen_to_scene(Point::new(viewport.width, viewport.height));
        Rect::from_points(p0, p1)
    }

    fn normalize(&mut self) {
        let factor = self.config.factor;
        while self.state.mantissa >= self.config.max_mantissa {
            self.state.mantissa /= factor;
            self.state.exponent += 1;
        }
        while self.state.mantissa < self.config.min_mantissa {
            self.state.mantissa *= factor;
            self.state.exponent -= 1;
        }
    }

    /// Shift `origin` so the render translation stays within half the limit on each axis.
    fn recenter(&mut self) {
        let limit = self.config.translation_limit;
        let half = limit / 2.0;
        let scale = self.scene_scale();
        let t = self.render_translation();

        if t.x.abs() > half {
            let k = (t.x / limit).round();
            self.state.origin.x -= k * limit / scale;
        }
        if t.y.abs() > half {
            let k = (t.y / limit).round();
            self.state.origin.y -= k * limit / scale;
        }
        log::trace!(
            "camera recentered: origin=({:.3}, {:.3}) translation=({:.3}, {:.3})",
            self.state.origin.x,
            self.state.origin.y,
            self.render_translation().x,
            self.render_translation().y
        );
    }
}

fn finite_point(p: Point) -> Option<Point> {
    (p.x.is_finite() && p.y.is_finite()).then_some(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_point_eq(a: Point, b: Point, tol: f64) {
        assert!((a.x - b.x).abs() <= tol, "x: {} vs {}", a.x, b.x);
        assert!((a.y - b.y).abs() <= tol, "y: {} vs {}", a.y, b.y);
    }

    fn assert_mantissa_in_band(camera: &CoordinateNormalizer) {
        let m = camera.state().mantissa;
        assert!(m >= 0.5 && m < 4.0, "mantissa {} out of band", m);
    }

    #[test]
    fn test_default_camera() {
        let camera = CoordinateNormalizer::default();
        assert!((camera.scene_scale() - 1.0).abs() < f64::EPSILON);
        assert_eq!(camera.world().position, Vec2::ZERO);
        assert_eq!(camera.state().exponent, 0);
    }

    #[test]
    fn test_scale_product_is_exact() {
        let mut camera = CoordinateNormalizer::default();
        let factors = [3.7, 0.01, 12.5, 1.0e6, 1.0e-4, 0.333, 42.0, 0.9];
        let mut expected = 1.0;
        for m in factors {
            camera.multiply_scene_scale(m);
            expected *= m;
            assert_mantissa_in_band(&camera);
            let rel = (camera.scene_scale() - expected).abs() / expected;
            assert!(rel < 1e-6, "scale {} vs {}", camera.scene_scale(), expected);
        }
    }

    #[test]
    fn test_extreme_zoom_range() {
        let mut camera = CoordinateNormalizer::default();
        for _ in 0..12 {
            camera.multiply_scene_scale(10.0);
        }
        assert_mantissa_in_band(&camera);
        assert!((camera.scene_scale() / 1e12 - 1.0).abs() < 1e-6);

        camera.reset();
        for _ in 0..9 {
            camera.multiply_scene_scale(0.1);
        }
        assert_mantissa_in_band(&camera);
        assert!((camera.scene_scale() / 1e-9 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scale_clamped_to_range() {
        let mut camera = CoordinateNormalizer::default();
        camera.multiply_scene_scale(1e20);
        assert!((camera.scene_scale() - 1e12).abs() / 1e12 < 1e-9);
        camera.multiply_scene_scale(1e-30);
        assert!((camera.scene_scale() - 1e-9).abs() / 1e-9 < 1e-9);
    }

    #[test]
    fn test_invalid_multiplier_is_identity() {
        let mut camera = CoordinateNormalizer::default();
        camera.multiply_scene_scale(3.0);
        let before = camera.clone();
        assert!((camera.multiply_scene_scale(f64::NAN) - 1.0).abs() < f64::EPSILON);
        camera.multiply_scene_scale(0.0);
        camera.multiply_scene_scale(-2.0);
        camera.multiply_scene_scale(f64::INFINITY);
        assert_eq!(camera, before);
    }

    #[test]
    fn test_render_roundtrip() {
        let mut camera = CoordinateNormalizer::default();
        let points = [
            Point::new(0.0, 0.0),
            Point::new(123.456, -789.25),
            Point::new(-4999.0, 4999.0),
        ];
        let steps: [(f64, Vec2); 5] = [
            (1.0, Vec2::ZERO),
            (0.25, Vec2::new(7000.0, -300.0)),
            (37.0, Vec2::new(-12_000.0, 9000.0)),
            (1e-3, Vec2::new(50.0, 50.0)),
            (5e4, Vec2::new(-6000.0, -6000.0)),
        ];
        for (m, pan) in steps {
            camera.multiply_scene_scale(m);
            camera.pan(pan);
            for p in points {
                let back = camera.render_to_scene(camera.scene_to_render(p));
                assert_point_eq(back, p, 1e-9);
            }
        }
    }

    #[test]
    fn test_recenter_bounds_render_translation() {
        let mut camera = CoordinateNormalizer::default();
        camera.multiply_scene_scale(0.5);
        for _ in 0..50 {
            camera.pan(Vec2::new(3_333.0, -2_777.0));
            let t = camera.render_translation();
            assert!(t.x.abs() <= 5_000.0 + 1e-6);
            assert!(t.y.abs() <= 5_000.0 + 1e-6);
        }
        // World translation itself is unbounded.
        assert!((camera.scene_position().x - 166_650.0).abs() < 1e-6);
    }

    #[test]
    fn test_screen_mapping_matches_world_transform() {
        let mut camera = CoordinateNormalizer::default();
        camera.multiply_scene_scale(3.0);
        camera.pan(Vec2::new(8_000.0, 120.0));
        let world = camera.world();
        let p = Point::new(10.0, -20.0);
        let expected = (p.to_vec2() * world.scale + world.position).to_point();
        assert_point_eq(camera.scene_to_screen(p), expected, 1e-9);
        assert_point_eq(camera.screen_to_scene(expected), p, 1e-9);
    }

    #[test]
    fn test_zoom_at_keeps_point_fixed() {
        let mut camera = CoordinateNormalizer::default();
        camera.pan(Vec2::new(30.0, -20.0));
        let screen = Point::new(400.0, 300.0);
        let scene_before = camera.screen_to_scene(screen);
        camera.zoom_at(screen, 2.5);
        assert!((camera.scene_scale() - 2.5).abs() < 1e-12);
        assert_point_eq(camera.screen_to_scene(screen), scene_before, 1e-9);
    }

    #[test]
    fn test_length_to_render() {
        let mut camera = CoordinateNormalizer::default();
        camera.multiply_scene_scale(8.0);
        // 8 = 2 * 2^2 once the mantissa is back inside [0.5, 4).
        assert_eq!(camera.state().exponent, 2);
        assert!((camera.render_scale() - 2.0).abs() < f64::EPSILON);
        assert!((camera.length_to_render(3.0) - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_to_bounds() {
        let mut camera = CoordinateNormalizer::default();
        let bounds = Rect::new(0.0, 0.0, 200.0, 100.0);
        camera.fit_to_bounds(bounds, Size::new(500.0, 300.0), 50.0);
        assert!((camera.scene_scale() - 2.0).abs() < 1e-12);
        assert_point_eq(camera.scene_to_screen(bounds.center()), Point::new(250.0, 150.0), 1e-9);
    }

    #[test]
    fn test_unit_factor_config_replaced() {
        let config = NormalizerConfig {
            factor: 1.0,
            ..Default::default()
        };
        let mut camera = CoordinateNormalizer::new(config);
        assert_eq!(camera.config(), &NormalizerConfig::default());
        assert!((camera.multiply_scene_scale(8.0) - 8.0).abs() < f64::EPSILON);
        assert_mantissa_in_band(&camera);
    }

    #[test]
    fn test_sanitized_repairs_restored_camera() {
        let restored = CoordinateNormalizer {
            state: CameraState {
                mantissa: 100.0,
                ..Default::default()
            },
            config: NormalizerConfig {
                factor: 1.0,
                ..Default::default()
            },
        };
        let camera = restored.sanitized();
        assert_eq!(camera.config(), &NormalizerConfig::default());
        assert_mantissa_in_band(&camera);
        assert_eq!(camera.state().exponent, 5);
        assert!((camera.scene_scale() - 100.0).abs() < 1e-9);
    }
}
