//! Upcoming footsteps and their timings.

use nalgebra::{Isometry2, Point2};

use crate::polygon::ConvexPolygon2;
use crate::types::RobotSide;

/// A planned foot placement.
///
/// `pose` is the sole pose in world. `contact_points` is the support polygon
/// in the sole frame; `None` means the default foot polygon for `side`.
#[derive(Debug, Clone, PartialEq)]
pub struct Footstep {
    pub side: RobotSide,
    pub pose: Isometry2<f64>,
    pub contact_points: Option<ConvexPolygon2>,
}

impl Footstep {
    pub const fn new(side: RobotSide, pose: Isometry2<f64>) -> Self {
        Self {
            side,
            pose,
            contact_points: None,
        }
    }

    /// Footstep at `(x, y)` in world with heading `yaw`.
    pub fn at(side: RobotSide, x: f64, y: f64, yaw: f64) -> Self {
        Self::new(side, Isometry2::new(nalgebra::Vector2::new(x, y), yaw))
    }

    #[must_use]
    pub fn with_contact_points(mut self, polygon: ConvexPolygon2) -> Self {
        self.contact_points = Some(polygon);
        self
    }

    /// Sole origin in world.
    pub fn position(&self) -> Point2<f64> {
        Point2::from(self.pose.translation.vector)
    }

    /// Contact polygon in the sole frame, or `default` when none was given.
    pub fn polygon_or<'a>(&'a self, default: &'a ConvexPolygon2) -> &'a ConvexPolygon2 {
        self.contact_points.as_ref().unwrap_or(default)
    }

    pub fn is_finite(&self) -> bool {
        let t = self.pose.translation.vector;
        t.x.is_finite() && t.y.is_finite() && self.pose.rotation.angle().is_finite()
    }
}

/// Swing and transfer durations of one queued footstep (seconds).
///
/// `transfer_time` is the double support preceding the swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootstepTiming {
    pub swing_time: f64,
    pub transfer_time: f64,
}

impl FootstepTiming {
    pub const fn new(swing_time: f64, transfer_time: f64) -> Self {
        Self {
            swing_time,
            transfer_time,
        }
    }

    /// Undefined timing, used for empty plan slots.
    pub const fn nan() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }

    pub fn step_time(&self) -> f64 {
        self.swing_time + self.transfer_time
    }
}

impl Default for FootstepTiming {
    fn default() -> Self {
        Self::nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_polygon_used_without_contact_points() {
        let default = ConvexPolygon2::rectangle(Point2::origin(), 0.2, 0.1);
        let step = Footstep::at(RobotSide::Left, 0.3, 0.1, 0.0);
        assert_eq!(step.polygon_or(&default), &default);

        let small = ConvexPolygon2::rectangle(Point2::origin(), 0.1, 0.05);
        let step = step.with_contact_points(small.clone());
        assert_eq!(step.polygon_or(&default), &small);
    }

    #[test]
    fn position_is_translation() {
        let step = Footstep::at(RobotSide::Right, 0.4, -0.1, 0.3);
        assert_relative_eq!(step.position(), Point2::new(0.4, -0.1), epsilon = 1e-12);
        assert!(step.is_finite());
        assert!(!Footstep::at(RobotSide::Right, f64::NAN, 0.0, 0.0).is_finite());
    }

    #[test]
    fn timing_defaults_to_nan() {
        let timing = FootstepTiming::default();
        assert!(timing.swing_time.is_nan());
        assert!(timing.transfer_time.is_nan());
        assert_relative_eq!(FootstepTiming::new(0.6, 0.2).step_time(), 0.8);
    }
}
