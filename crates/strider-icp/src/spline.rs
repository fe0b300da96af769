//! Cubic Hermite splines and the double support capture point trajectory.
//!
//! A cubic from `(p0, v0)` to `(p1, v1)` over `T`:
//!
//! ```text
//! a0 = p0
//! a1 = v0
//! a2 = (3 (p1 - p0) - (2 v0 + v1) T) / T^2
//! a3 = (2 (p0 - p1) + (v0 + v1) T) / T^3
//! ```
//!
//! When the capture point follows this cubic, the companion center of mass
//! has a closed form: with `x_p = xi - xi'/w0 + xi''/w0^2 - xi'''/w0^3`,
//! `x(t) = x_p(t) + (x0 - x_p(0)) e^{-w0 t}`.

use nalgebra::{Point2, Vector2};
use strider_core::{FrameError, FrameId, FramePoint2, FrameProvider, FrameVector2};

use crate::capture_point::IcpSample;

const MIN_DURATION: f64 = 1e-9;

// ---------------------------------------------------------------------------
// CubicSpline2
// ---------------------------------------------------------------------------

/// Planar cubic polynomial over `[0, duration]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicSpline2 {
    coefficients: [Vector2<f64>; 4],
    duration: f64,
}

impl CubicSpline2 {
    /// Cubic matching position and velocity at both ends.
    ///
    /// A duration too short to fit a cubic yields a constant spline at `p1`.
    pub fn hermite(
        p0: &Point2<f64>,
        v0: &Vector2<f64>,
        p1: &Point2<f64>,
        v1: &Vector2<f64>,
        duration: f64,
    ) -> Self {
        if duration.is_nan() || duration <= MIN_DURATION {
            return Self {
                coefficients: [p1.coords, Vector2::zeros(), Vector2::zeros(), Vector2::zeros()],
                duration: 0.0,
            };
        }
        let t = duration;
        let dp = p1 - p0;
        let a2 = (dp * 3.0 - (v0 * 2.0 + v1) * t) / (t * t);
        let a3 = ((-dp) * 2.0 + (v0 + v1) * t) / (t * t * t);
        Self {
            coefficients: [p0.coords, *v0, a2, a3],
            duration,
        }
    }

    pub const fn duration(&self) -> f64 {
        self.duration
    }

    fn clamp_time(&self, t: f64) -> f64 {
        t.clamp(0.0, self.duration)
    }

    pub fn position(&self, t: f64) -> Point2<f64> {
        let t = self.clamp_time(t);
        let [a0, a1, a2, a3] = self.coefficients;
        Point2::from(a0 + (a1 + (a2 + a3 * t) * t) * t)
    }

    pub fn velocity(&self, t: f64) -> Vector2<f64> {
        let t = self.clamp_time(t);
        let [_, a1, a2, a3] = self.coefficients;
        a1 + (a2 * 2.0 + a3 * (3.0 * t)) * t
    }

    pub fn acceleration(&self, t: f64) -> Vector2<f64> {
        let t = self.clamp_time(t);
        let [_, _, a2, a3] = self.coefficients;
        a2 * 2.0 + a3 * (6.0 * t)
    }

    /// Third derivative, constant over the spline.
    pub fn jerk(&self) -> Vector2<f64> {
        self.coefficients[3] * 6.0
    }

    pub fn sample(&self, t: f64) -> IcpSample {
        IcpSample {
            position: self.position(t),
            velocity: self.velocity(t),
            acceleration: self.acceleration(t),
        }
    }

    /// Center of mass `t` seconds into the spline when the capture point
    /// follows it, starting from `com0`.
    pub fn com_position(&self, omega0: f64, t: f64, com0: &Point2<f64>) -> Point2<f64> {
        let t = self.clamp_time(t);
        let particular_at_start = self.particular_com(omega0, 0.0);
        let particular = self.particular_com(omega0, t);
        particular + (com0 - particular_at_start) * (-omega0 * t).exp()
    }

    fn particular_com(&self, omega0: f64, t: f64) -> Point2<f64> {
        self.position(t) - self.velocity(t) / omega0 + self.acceleration(t) / (omega0 * omega0)
            - self.jerk() / (omega0 * omega0 * omega0)
    }
}

// ---------------------------------------------------------------------------
// DoubleSupportTrajectory
// ---------------------------------------------------------------------------

/// Capture point cubic for a transfer phase.
///
/// The start is stored in the frame the weight leaves, the end in the frame
/// it moves to. The cubic is rebuilt in world at every query so the plan
/// follows the feet if they slip.
#[derive(Debug, Clone)]
pub struct DoubleSupportTrajectory {
    initial_position: FramePoint2,
    initial_velocity: FrameVector2,
    final_position: FramePoint2,
    final_velocity: FrameVector2,
    duration: f64,
}

impl Default for DoubleSupportTrajectory {
    fn default() -> Self {
        Self {
            initial_position: FramePoint2::nan(FrameId::WORLD),
            initial_velocity: FrameVector2::zero(FrameId::WORLD),
            final_position: FramePoint2::nan(FrameId::WORLD),
            final_velocity: FrameVector2::zero(FrameId::WORLD),
            duration: f64::NAN,
        }
    }
}

impl DoubleSupportTrajectory {
    pub fn set_trajectory_time(&mut self, duration: f64) {
        self.duration = duration;
    }

    pub const fn trajectory_time(&self) -> f64 {
        self.duration
    }

    /// Store the start, re-expressed in `frame`.
    pub fn set_initial_conditions(
        &mut self,
        position: &FramePoint2,
        velocity: &FrameVector2,
        frame: FrameId,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.initial_position = position.change_frame(frame, frames)?;
        self.initial_velocity = velocity.change_frame(frame, frames)?;
        Ok(())
    }

    /// Store the end, re-expressed in `frame`.
    pub fn set_final_conditions(
        &mut self,
        position: &FramePoint2,
        velocity: &FrameVector2,
        frame: FrameId,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.final_position = position.change_frame(frame, frames)?;
        self.final_velocity = velocity.change_frame(frame, frames)?;
        Ok(())
    }

    /// The cubic in world for the current frame poses.
    pub fn spline_in_world(&self, frames: &dyn FrameProvider) -> Result<CubicSpline2, FrameError> {
        let p0 = self.initial_position.in_world(frames)?;
        let v0 = self.initial_velocity.in_world(frames)?;
        let p1 = self.final_position.in_world(frames)?;
        let v1 = self.final_velocity.in_world(frames)?;
        Ok(CubicSpline2::hermite(&p0, &v0, &p1, &v1, self.duration))
    }

    /// World sample `t` seconds into the transfer.
    pub fn compute(&self, t: f64, frames: &dyn FrameProvider) -> Result<IcpSample, FrameError> {
        Ok(self.spline_in_world(frames)?.sample(t))
    }

    pub fn is_done(&self, t: f64) -> bool {
        t >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Isometry2;
    use strider_core::FrameTree;

    fn spline() -> CubicSpline2 {
        CubicSpline2::hermite(
            &Point2::new(0.0, 0.0),
            &Vector2::new(0.1, 0.0),
            &Point2::new(0.2, 0.05),
            &Vector2::new(0.0, -0.1),
            0.4,
        )
    }

    #[test]
    fn hermite_matches_boundaries() {
        let s = spline();
        assert_relative_eq!(s.position(0.0), Point2::new(0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(s.velocity(0.0), Vector2::new(0.1, 0.0), epsilon = 1e-12);
        assert_relative_eq!(s.position(0.4), Point2::new(0.2, 0.05), epsilon = 1e-12);
        assert_relative_eq!(s.velocity(0.4), Vector2::new(0.0, -0.1), epsilon = 1e-12);
    }

    #[test]
    fn evaluation_is_clamped() {
        let s = spline();
        assert_eq!(s.position(-1.0), s.position(0.0));
        assert_eq!(s.position(5.0), s.position(0.4));
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let s = spline();
        let h = 1e-6;
        let t = 0.17;
        let numeric = (s.position(t + h) - s.position(t - h)) / (2.0 * h);
        assert_relative_eq!(numeric, s.velocity(t), epsilon = 1e-8);
        let numeric = (s.velocity(t + h) - s.velocity(t - h)) / (2.0 * h);
        assert_relative_eq!(numeric, s.acceleration(t), epsilon = 1e-6);
    }

    #[test]
    fn zero_duration_is_constant_at_end() {
        let s = CubicSpline2::hermite(
            &Point2::new(0.0, 0.0),
            &Vector2::zeros(),
            &Point2::new(1.0, 1.0),
            &Vector2::zeros(),
            0.0,
        );
        assert_eq!(s.position(0.0), Point2::new(1.0, 1.0));
        assert_eq!(s.velocity(0.0), Vector2::zeros());
    }

    #[test]
    fn com_follows_pendulum_dynamics() {
        let s = spline();
        let omega0 = 3.2;
        let com0 = Point2::new(-0.02, 0.01);
        assert_relative_eq!(s.com_position(omega0, 0.0, &com0), com0, epsilon = 1e-12);

        let h = 1e-6;
        let t = 0.21;
        let com_velocity = (s.com_position(omega0, t + h, &com0)
            - s.com_position(omega0, t - h, &com0))
            / (2.0 * h);
        let expected = (s.position(t) - s.com_position(omega0, t, &com0)) * omega0;
        assert_relative_eq!(com_velocity, expected, epsilon = 1e-6);
    }

    #[test]
    fn double_support_follows_moving_frame() {
        let mut frames = FrameTree::new();
        let sole = frames.add_frame(Isometry2::translation(0.3, 0.0));
        let mut trajectory = DoubleSupportTrajectory::default();
        trajectory.set_trajectory_time(0.5);
        trajectory
            .set_initial_conditions(
                &FramePoint2::world(Point2::origin()),
                &FrameVector2::world(Vector2::zeros()),
                FrameId::WORLD,
                &frames,
            )
            .unwrap();
        trajectory
            .set_final_conditions(
                &FramePoint2::world(Point2::new(0.3, 0.0)),
                &FrameVector2::world(Vector2::zeros()),
                sole,
                &frames,
            )
            .unwrap();
        let end = trajectory.compute(0.5, &frames).unwrap();
        assert_relative_eq!(end.position, Point2::new(0.3, 0.0), epsilon = 1e-12);

        frames.set_pose(sole, Isometry2::translation(0.32, 0.0)).unwrap();
        let end = trajectory.compute(0.5, &frames).unwrap();
        assert_relative_eq!(end.position, Point2::new(0.32, 0.0), epsilon = 1e-12);
        assert!(trajectory.is_done(0.5));
        assert!(!trajectory.is_done(0.2));
    }
}
