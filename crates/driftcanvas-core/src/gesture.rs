//! Multi-pointer camera gestures.
//!
//! Pointers are tracked per id. One active pointer pans; two or more pinch,
//! using the first two pointers pressed. The pinch reference frame is
//! disposable: it is rebuilt from the current camera scale every time the
//! number of active pointers changes.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Host-assigned pointer identifier (touch id, pen id, mouse = 0).
pub type PointerId = u64;

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { id: PointerId, position: Point },
    Move { id: PointerId, position: Point },
    Up { id: PointerId, position: Point },
    Cancel { id: PointerId },
}

/// Camera change derived from pointer motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraGesture {
    /// Translate the camera by a screen-space delta.
    Pan { delta: Vec2 },
    /// Move the camera with the pinch midpoint, then zoom about it to `target_scale`.
    Pinch {
        center: Point,
        target_scale: f64,
        pan: Vec2,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PinchReference {
    initial_scale: f64,
    initial_distance: f64,
    initial_midpoint: Point,
    last_midpoint: Point,
}

/// Tracks active pointers and turns their motion into camera gestures.
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    /// Active pointers in press order.
    pointers: Vec<(PointerId, Point)>,
    pinch: Option<PinchReference>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }

    /// Midpoint the current pinch started from, if pinching.
    pub fn pinch_origin(&self) -> Option<Point> {
        self.pinch.map(|p| p.initial_midpoint)
    }

    /// Feed one event. `current_scale` is the camera's scene scale right now;
    /// it seeds the pinch reference whenever the pointer set changes.
    pub fn handle_event(&mut self, event: PointerEvent, current_scale: f64) -> Option<CameraGesture> {
        match event {
            PointerEvent::Down { id, position } => {
                if !finite(position) {
                    return None;
                }
                match self.pointers.iter_mut().find(|(pid, _)| *pid == id) {
                    Some(entry) => entry.1 = position,
                    None => self.pointers.push((id, position)),
                }
                self.rebuild_reference(current_scale);
                None
            }
            PointerEvent::Up { id, .. } | PointerEvent::Cancel { id } => {
                let before = self.pointers.len();
                self.pointers.retain(|(pid, _)| *pid != id);
                if self.pointers.len() != before {
                    self.rebuild_reference(current_scale);
                }
                None
            }
            PointerEvent::Move { id, position } => {
                if !finite(position) {
                    return None;
                }
                let entry = self.pointers.iter_mut().find(|(pid, _)| *pid == id)?;
                let previous = entry.1;
                entry.1 = position;

                if self.pointers.len() == 1 {
                    let delta = position - previous;
                    return (delta != Vec2::ZERO).then_some(CameraGesture::Pan { delta });
                }
                self.pinch_update()
            }
        }
    }

    fn pinch_update(&mut self) -> Option<CameraGesture> {
        let (a, b) = (self.pointers[0].1, self.pointers[1].1);
        let reference = self.pinch.as_mut()?;
        let distance = a.distance(b);
        let midpoint = a.midpoint(b);
        let pan = midpoint - reference.last_midpoint;
        reference.last_midpoint = midpoint;
        Some(CameraGesture::Pinch {
            center: midpoint,
            target_scale: reference.initial_scale * distance / reference.initial_distance,
            pan,
        })
    }

    fn rebuild_reference(&mut self, current_scale: f64) {
        self.pinch = None;
        if self.pointers.len() < 2 || !(current_scale.is_finite() && current_scale > 0.0) {
            return;
        }
        let (a, b) = (self.pointers[0].1, self.pointers[1].1);
        let distance = a.distance(b);
        if distance <= f64::EPSILON {
            return;
        }
        let midpoint = a.midpoint(b);
        log::trace!(
            "pinch reference rebuilt: {} pointers, scale {}, distance {:.2}",
            self.pointers.len(),
            current_scale,
            distance
        );
        self.pinch = Some(PinchReference {
            initial_scale: current_scale,
            initial_distance: distance,
            initial_midpoint: midpoint,
            last_midpoint: midpoint,
        });
    }
}

fn finite(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}
