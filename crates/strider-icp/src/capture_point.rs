//! Linear inverted pendulum relations between the capture point and the CMP.
//!
//! With a constant pivot `p` the capture point diverges exponentially:
//!
//! ```text
//! icp(t)      = p + (icp0 - p) e^{w0 t}
//! icp_dot(t)  = w0 (icp(t) - p)
//! icp_ddot(t) = w0 icp_dot(t)
//! cmp         = icp - icp_dot / w0
//! ```
//!
//! Corner points are the capture point values at the instants the pivot
//! switches. They are found backwards from the last pivot of the window, where
//! the robot comes to rest.
//!
//! All functions are frame agnostic: callers pass coordinates that share a
//! frame. `omega0` is assumed positive, which setters enforce upstream.

use nalgebra::{Point2, Vector2};
use strider_core::FootstepTiming;

/// Capture point after `t` seconds on a constant pivot.
pub fn icp_position(omega0: f64, t: f64, icp0: &Point2<f64>, pivot: &Point2<f64>) -> Point2<f64> {
    pivot + (icp0 - pivot) * (omega0 * t).exp()
}

/// Capture point velocity after `t` seconds on a constant pivot.
pub fn icp_velocity(omega0: f64, t: f64, icp0: &Point2<f64>, pivot: &Point2<f64>) -> Vector2<f64> {
    (icp0 - pivot) * (omega0 * (omega0 * t).exp())
}

/// Capture point acceleration after `t` seconds on a constant pivot.
pub fn icp_acceleration(
    omega0: f64,
    t: f64,
    icp0: &Point2<f64>,
    pivot: &Point2<f64>,
) -> Vector2<f64> {
    icp_velocity(omega0, t, icp0, pivot) * omega0
}

/// Pivot that produces `icp_velocity` at `icp`.
pub fn cmp_from_icp(omega0: f64, icp: &Point2<f64>, icp_velocity: &Vector2<f64>) -> Point2<f64> {
    icp - icp_velocity / omega0
}

/// Rate of change of the pivot given the capture point velocity and acceleration.
pub fn cmp_velocity_from_icp(
    omega0: f64,
    icp_velocity: &Vector2<f64>,
    icp_acceleration: &Vector2<f64>,
) -> Vector2<f64> {
    icp_velocity - icp_acceleration / omega0
}

/// Capture point `duration` seconds before reaching `icp_end` on `pivot`.
///
/// A NaN duration marks a slot without timing; the capture point then rests
/// on the pivot.
pub fn icp_before(
    omega0: f64,
    duration: f64,
    icp_end: &Point2<f64>,
    pivot: &Point2<f64>,
) -> Point2<f64> {
    if duration.is_nan() {
        return *pivot;
    }
    pivot + (icp_end - pivot) * (-omega0 * duration).exp()
}

/// Center of mass after `t` seconds on a constant pivot, starting at `com0`
/// with the capture point at `icp0`.
///
/// ```text
/// x(t) = p + (x0 - p) e^{-w0 t} + (icp0 - p) (e^{w0 t} - e^{-w0 t}) / 2
/// ```
pub fn com_position_constant_cmp(
    omega0: f64,
    t: f64,
    com0: &Point2<f64>,
    icp0: &Point2<f64>,
    pivot: &Point2<f64>,
) -> Point2<f64> {
    let grow = (omega0 * t).exp();
    let decay = (-omega0 * t).exp();
    pivot + (com0 - pivot) * decay + (icp0 - pivot) * (0.5 * (grow - decay))
}

// ---------------------------------------------------------------------------
// IcpSample
// ---------------------------------------------------------------------------

/// Capture point position and derivatives at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpSample {
    pub position: Point2<f64>,
    pub velocity: Vector2<f64>,
    pub acceleration: Vector2<f64>,
}

impl IcpSample {
    /// Stationary capture point.
    pub fn at_rest(position: Point2<f64>) -> Self {
        Self {
            position,
            velocity: Vector2::zeros(),
            acceleration: Vector2::zeros(),
        }
    }

    pub fn nan() -> Self {
        Self {
            position: Point2::new(f64::NAN, f64::NAN),
            velocity: Vector2::new(f64::NAN, f64::NAN),
            acceleration: Vector2::new(f64::NAN, f64::NAN),
        }
    }

    /// Sample `t` seconds after leaving `icp0` on a constant pivot.
    pub fn on_constant_cmp(omega0: f64, t: f64, icp0: &Point2<f64>, pivot: &Point2<f64>) -> Self {
        let velocity = icp_velocity(omega0, t, icp0, pivot);
        Self {
            position: icp_position(omega0, t, icp0, pivot),
            velocity,
            acceleration: velocity * omega0,
        }
    }

    /// Blend two samples: `self + alpha * (other - self)`.
    #[must_use]
    pub fn interpolate(&self, other: &Self, alpha: f64) -> Self {
        Self {
            position: self.position + (other.position - self.position) * alpha,
            velocity: self.velocity + (other.velocity - self.velocity) * alpha,
            acceleration: self.acceleration + (other.acceleration - self.acceleration) * alpha,
        }
    }

    /// Scale velocity and acceleration, keeping the position.
    #[must_use]
    pub fn with_derivatives_scaled(mut self, factor: f64) -> Self {
        self.velocity *= factor;
        self.acceleration *= factor;
        self
    }

    pub fn contains_nan(&self) -> bool {
        self.position.x.is_nan()
            || self.position.y.is_nan()
            || self.velocity.x.is_nan()
            || self.velocity.y.is_nan()
    }
}

// ---------------------------------------------------------------------------
// Corner points
// ---------------------------------------------------------------------------

/// Where the pivot window starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStart {
    /// Slot 0 is the foot the weight is leaving.
    DoubleSupport,
    /// Slot 0 is the current support foot.
    SingleSupport,
}

impl WindowStart {
    /// Index of the timing owning `slot`, or `None` for the trailing foot of
    /// double support.
    const fn timing_index(self, slot: usize) -> Option<usize> {
        match self {
            Self::DoubleSupport => slot.checked_sub(1),
            Self::SingleSupport => Some(slot),
        }
    }
}

/// How time is split between the pivots of each support.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSplit {
    pub transfer: f64,
    pub swing: f64,
}

fn transfer_time(timings: &[FootstepTiming], index: usize) -> f64 {
    timings.get(index).map_or(f64::NAN, |t| t.transfer_time)
}

fn swing_time(timings: &[FootstepTiming], index: usize) -> f64 {
    timings.get(index).map_or(f64::NAN, |t| t.swing_time)
}

/// Corner points with an entry and an exit pivot per support.
///
/// `entry_corners[i]` is the capture point when the pivot moves onto
/// `entry_cmps[i]`, `exit_corners[i]` when it moves onto `exit_cmps[i]`.
#[allow(clippy::too_many_arguments)]
pub fn compute_corner_points_two_cmps(
    omega0: f64,
    start: WindowStart,
    split: TimeSplit,
    timings: &[FootstepTiming],
    entry_cmps: &[Point2<f64>],
    exit_cmps: &[Point2<f64>],
    entry_corners: &mut [Point2<f64>],
    exit_corners: &mut [Point2<f64>],
) {
    let n = entry_corners.len().min(exit_corners.len());
    if n == 0 {
        return;
    }
    let mut next_corner = entry_cmps[n - 1];
    for slot in (0..n).rev() {
        let (entry_duration, exit_duration) = match start.timing_index(slot) {
            None => (0.0, transfer_time(timings, 0) * split.transfer),
            Some(k) => (
                transfer_time(timings, k) * (1.0 - split.transfer)
                    + swing_time(timings, k) * split.swing,
                swing_time(timings, k) * (1.0 - split.swing)
                    + transfer_time(timings, k + 1) * split.transfer,
            ),
        };
        exit_corners[slot] = icp_before(omega0, exit_duration, &next_corner, &exit_cmps[slot]);
        entry_corners[slot] =
            icp_before(omega0, entry_duration, &exit_corners[slot], &entry_cmps[slot]);
        next_corner = entry_corners[slot];
    }
}

/// Corner points with a single pivot per support.
pub fn compute_corner_points_one_cmp(
    omega0: f64,
    start: WindowStart,
    transfer_split: f64,
    timings: &[FootstepTiming],
    entry_cmps: &[Point2<f64>],
    entry_corners: &mut [Point2<f64>],
) {
    let n = entry_corners.len();
    if n == 0 {
        return;
    }
    let mut next_corner = entry_cmps[n - 1];
    for slot in (0..n).rev() {
        let duration = match start.timing_index(slot) {
            None => transfer_time(timings, 0) * transfer_split,
            Some(k) => {
                transfer_time(timings, k) * (1.0 - transfer_split)
                    + swing_time(timings, k)
                    + transfer_time(timings, k + 1) * transfer_split
            }
        };
        entry_corners[slot] = icp_before(omega0, duration, &next_corner, &entry_cmps[slot]);
        next_corner = entry_corners[slot];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;
    use strider_test_utils::{random_in, random_point, seeded_rng};

    #[test]
    fn velocity_matches_position_offset() {
        let mut rng = seeded_rng(11);
        for _ in 0..200 {
            let omega0 = random_in(&mut rng, 0.5, 6.0);
            let t = random_in(&mut rng, 0.0, 1.5);
            let pivot = random_point(&mut rng, 1.0, 1.0);
            let icp0 = random_point(&mut rng, 1.0, 1.0);
            let position = icp_position(omega0, t, &icp0, &pivot);
            let velocity = icp_velocity(omega0, t, &icp0, &pivot);
            let expected = (position - pivot) * omega0;
            assert_relative_eq!(velocity, expected, epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    #[test]
    fn cmp_inverse_recovers_pivot() {
        let mut rng = seeded_rng(5);
        for _ in 0..50 {
            let omega0 = random_in(&mut rng, 1.0, 4.0);
            let t: f64 = rng.gen_range(0.0..1.0);
            let pivot = random_point(&mut rng, 0.5, 0.5);
            let icp0 = random_point(&mut rng, 0.5, 0.5);
            let position = icp_position(omega0, t, &icp0, &pivot);
            let velocity = icp_velocity(omega0, t, &icp0, &pivot);
            let acceleration = icp_acceleration(omega0, t, &icp0, &pivot);
            assert_relative_eq!(cmp_from_icp(omega0, &position, &velocity), pivot, epsilon = 1e-9);
            let cmp_velocity = cmp_velocity_from_icp(omega0, &velocity, &acceleration);
            assert_relative_eq!(cmp_velocity.norm(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn sample_interpolation_and_scaling() {
        let a = IcpSample::at_rest(Point2::new(0.0, 0.0));
        let b = IcpSample::on_constant_cmp(3.0, 0.0, &Point2::new(0.1, 0.0), &Point2::origin());
        let mid = a.interpolate(&b, 0.5);
        assert_relative_eq!(mid.position, Point2::new(0.05, 0.0), epsilon = 1e-12);
        assert_relative_eq!(mid.velocity, Vector2::new(0.15, 0.0), epsilon = 1e-12);
        let slowed = b.with_derivatives_scaled(0.0);
        assert_eq!(slowed.position, b.position);
        assert_relative_eq!(slowed.velocity.norm(), 0.0);
        assert!(IcpSample::nan().contains_nan());
        assert!(!a.contains_nan());
    }

    #[test]
    fn icp_before_inverts_forward_evolution() {
        let pivot = Point2::new(0.1, -0.05);
        let icp0 = Point2::new(0.12, 0.0);
        let end = icp_position(3.0, 0.4, &icp0, &pivot);
        assert_relative_eq!(icp_before(3.0, 0.4, &end, &pivot), icp0, epsilon = 1e-12);
        assert_eq!(icp_before(3.0, f64::NAN, &end, &pivot), pivot);
    }

    #[test]
    fn com_converges_towards_icp_dynamics() {
        // com_dot = w0 (icp - com): check with a central difference.
        let omega0 = 3.0;
        let pivot = Point2::new(0.0, 0.0);
        let icp0 = Point2::new(0.05, 0.02);
        let com0 = Point2::new(0.02, 0.01);
        let t = 0.3;
        let h = 1e-6;
        let ahead = com_position_constant_cmp(omega0, t + h, &com0, &icp0, &pivot);
        let behind = com_position_constant_cmp(omega0, t - h, &com0, &icp0, &pivot);
        let com_velocity = (ahead - behind) / (2.0 * h);
        let com = com_position_constant_cmp(omega0, t, &com0, &icp0, &pivot);
        let icp = icp_position(omega0, t, &icp0, &pivot);
        assert_relative_eq!(com_velocity, (icp - com) * omega0, epsilon = 1e-6);
        assert_relative_eq!(
            com_position_constant_cmp(omega0, 0.0, &com0, &icp0, &pivot),
            com0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn last_slot_rests_on_its_pivot() {
        let timings = [FootstepTiming::new(0.6, 0.2), FootstepTiming::nan()];
        let entry = [Point2::new(0.0, 0.1), Point2::new(0.3, -0.1)];
        let exit = [Point2::new(0.05, 0.1), Point2::new(0.35, -0.1)];
        let mut entry_corners = [Point2::origin(); 2];
        let mut exit_corners = [Point2::origin(); 2];
        compute_corner_points_two_cmps(
            3.0,
            WindowStart::SingleSupport,
            TimeSplit { transfer: 0.5, swing: 0.5 },
            &timings,
            &entry,
            &exit,
            &mut entry_corners,
            &mut exit_corners,
        );
        assert_eq!(exit_corners[1], exit[1]);
        assert_eq!(entry_corners[1], entry[1]);

        // Slot 0 corners lead into slot 1 through the exponential law.
        let exit_duration = 0.6 * 0.5;
        let from_exit = icp_position(3.0, exit_duration, &exit_corners[0], &exit[0]);
        // transfer_time(1) is NaN so the exit phase of slot 0 also rests.
        assert_eq!(exit_corners[0], exit[0]);
        assert_relative_eq!(from_exit, exit[0], epsilon = 1e-12);
        let entry_duration = 0.2 * 0.5 + 0.6 * 0.5;
        let reached = icp_position(3.0, entry_duration, &entry_corners[0], &entry[0]);
        assert_relative_eq!(reached, exit_corners[0], epsilon = 1e-12);
    }

    #[test]
    fn double_support_first_slot_has_no_entry_phase() {
        let timings = [FootstepTiming::new(0.6, 0.2), FootstepTiming::new(0.6, 0.2)];
        let entry = [
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 0.12),
            Point2::new(0.3, -0.12),
        ];
        let exit = [
            Point2::new(0.02, 0.0),
            Point2::new(0.05, 0.12),
            Point2::new(0.35, -0.12),
        ];
        let mut entry_corners = [Point2::origin(); 3];
        let mut exit_corners = [Point2::origin(); 3];
        compute_corner_points_two_cmps(
            3.0,
            WindowStart::DoubleSupport,
            TimeSplit { transfer: 0.5, swing: 0.5 },
            &timings,
            &entry,
            &exit,
            &mut entry_corners,
            &mut exit_corners,
        );
        assert_relative_eq!(entry_corners[0], exit_corners[0], epsilon = 1e-15);
        let reached = icp_position(3.0, 0.1, &exit_corners[0], &exit[0]);
        assert_relative_eq!(reached, entry_corners[1], epsilon = 1e-12);
        let exit_duration = 0.6 * 0.5 + 0.2 * 0.5;
        let reached = icp_position(3.0, exit_duration, &exit_corners[1], &exit[1]);
        assert_relative_eq!(reached, entry_corners[2], epsilon = 1e-12);
    }

    #[test]
    fn one_cmp_corners_chain() {
        let timings = [FootstepTiming::new(0.5, 0.3), FootstepTiming::new(0.5, 0.3)];
        let entry = [Point2::new(0.0, 0.1), Point2::new(0.25, -0.1), Point2::new(0.5, 0.1)];
        let mut corners = [Point2::origin(); 3];
        compute_corner_points_one_cmp(
            3.0,
            WindowStart::SingleSupport,
            0.5,
            &timings,
            &entry,
            &mut corners,
        );
        let duration = 0.3 * 0.5 + 0.5 + 0.3 * 0.5;
        let reached = icp_position(3.0, duration, &corners[0], &entry[0]);
        assert_relative_eq!(reached, corners[1], epsilon = 1e-12);
        assert_eq!(corners[2], entry[2]);
    }
}
