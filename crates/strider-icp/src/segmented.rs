//! Three-segment capture point trajectory for single support.
//!
//! ```text
//!  0            start          t_entry          end                 total
//!  |-- entry pivot --|------ spline ------|------- exit pivot -------|
//! ```
//!
//! Segments 1 and 3 follow the exponential law on a constant pivot. The
//! spline is a cubic matching position and velocity of both neighbours, so
//! the trajectory is C1 across the pivot switch.
//!
//! Every boundary point is kept twice: in the support sole frame and in
//! world. Both versions are evaluated and blended by the progress through the
//! phase, which lets the plan follow a slipping support foot early on and
//! settle in world by the end.

use nalgebra::Point2;
use strider_core::config::SegmentedConfig;
use strider_core::{ConfigError, FrameError, FrameId, FramePoint2, FrameProvider};

use crate::capture_point::{IcpSample, com_position_constant_cmp};
use crate::spline::CubicSpline2;

/// Shortest spline considered when reserving time on the exit pivot.
const MIN_SPLINE_DURATION: f64 = 0.1;
/// Below this the minimum time on the exit pivot is ignored.
const MIN_EXIT_TIME_EPSILON: f64 = 1.0e-5;

/// Which part of the single support trajectory is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Segment {
    #[default]
    EntryPivot,
    Spline,
    ExitPivot,
}

/// A point stored in the initial and in the final frame.
#[derive(Debug, Clone, Copy)]
struct DualFramePoint {
    in_initial: FramePoint2,
    in_final: FramePoint2,
}

impl DualFramePoint {
    fn nan() -> Self {
        Self {
            in_initial: FramePoint2::nan(FrameId::WORLD),
            in_final: FramePoint2::nan(FrameId::WORLD),
        }
    }

    fn new(
        point: &FramePoint2,
        initial_frame: FrameId,
        final_frame: FrameId,
        frames: &dyn FrameProvider,
    ) -> Result<Self, FrameError> {
        Ok(Self {
            in_initial: point.change_frame(initial_frame, frames)?,
            in_final: point.change_frame(final_frame, frames)?,
        })
    }
}

/// Boundary points of the phase, all in world.
#[derive(Debug, Clone, Copy)]
struct Boundary {
    initial_icp: Point2<f64>,
    entry_cmp: Point2<f64>,
    exit_corner: Point2<f64>,
    exit_cmp: Point2<f64>,
}

/// Single support capture point trajectory with a spline across the pivot switch.
#[derive(Debug, Clone)]
pub struct SegmentedTrajectory {
    config: SegmentedConfig,
    omega0: f64,
    initial_frame: FrameId,
    final_frame: FrameId,

    time_on_entry_cmp: f64,
    time_on_exit_cmp: f64,
    total_duration: f64,
    start_of_spline_time: f64,
    end_of_spline_time: f64,

    initial_icp: DualFramePoint,
    entry_cmp: DualFramePoint,
    exit_corner: DualFramePoint,
    exit_cmp: DualFramePoint,
    initial_com: Option<Point2<f64>>,

    progress: f64,
    segment: Segment,
    desired: IcpSample,
    desired_com: Point2<f64>,
}

impl SegmentedTrajectory {
    pub fn new(config: SegmentedConfig, omega0: f64) -> Self {
        Self {
            config,
            omega0,
            initial_frame: FrameId::WORLD,
            final_frame: FrameId::WORLD,
            time_on_entry_cmp: f64::NAN,
            time_on_exit_cmp: f64::NAN,
            total_duration: f64::NAN,
            start_of_spline_time: f64::NAN,
            end_of_spline_time: f64::NAN,
            initial_icp: DualFramePoint::nan(),
            entry_cmp: DualFramePoint::nan(),
            exit_corner: DualFramePoint::nan(),
            exit_cmp: DualFramePoint::nan(),
            initial_com: None,
            progress: 0.0,
            segment: Segment::default(),
            desired: IcpSample::nan(),
            desired_com: Point2::new(f64::NAN, f64::NAN),
        }
    }

    pub fn set_omega0(&mut self, omega0: f64) {
        self.omega0 = omega0;
    }

    pub fn set_maximum_spline_duration(&mut self, duration: f64) -> Result<(), ConfigError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConfigError::invalid(
                "segmented.max_spline_duration",
                format!("{duration} (must be >= 0)"),
            ));
        }
        self.config.max_spline_duration = duration;
        Ok(())
    }

    pub fn set_minimum_time_on_exit_cmp(&mut self, duration: f64) -> Result<(), ConfigError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(ConfigError::invalid(
                "segmented.min_time_on_exit_cmp",
                format!("{duration} (must be >= 0)"),
            ));
        }
        self.config.min_time_on_exit_cmp = duration;
        Ok(())
    }

    /// Frame the trajectory starts attached to, and the one it ends in.
    pub fn set_reference_frames(&mut self, initial_frame: FrameId, final_frame: FrameId) {
        self.initial_frame = initial_frame;
        self.final_frame = final_frame;
    }

    pub fn set_trajectory_time(&mut self, time_on_entry_cmp: f64, time_on_exit_cmp: f64) {
        self.time_on_entry_cmp = time_on_entry_cmp;
        self.time_on_exit_cmp = time_on_exit_cmp;
        self.total_duration = time_on_entry_cmp + time_on_exit_cmp;
    }

    /// Capture point at the start of the phase, both pivots, and the capture
    /// point when the exit pivot takes over.
    pub fn set_boundary_conditions(
        &mut self,
        initial_icp: &FramePoint2,
        entry_cmp: &FramePoint2,
        exit_corner: &FramePoint2,
        exit_cmp: &FramePoint2,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        let (a, b) = (self.initial_frame, self.final_frame);
        self.initial_icp = DualFramePoint::new(initial_icp, a, b, frames)?;
        self.entry_cmp = DualFramePoint::new(entry_cmp, a, b, frames)?;
        self.exit_corner = DualFramePoint::new(exit_corner, a, b, frames)?;
        self.exit_cmp = DualFramePoint::new(exit_cmp, a, b, frames)?;
        Ok(())
    }

    /// Center of mass at the start of the phase. Defaults to the initial
    /// capture point.
    pub fn set_initial_com_position(
        &mut self,
        com: &FramePoint2,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.initial_com = Some(com.in_world(frames)?);
        Ok(())
    }

    pub fn clear_initial_com_position(&mut self) {
        self.initial_com = None;
    }

    /// Place the spline window. Call after the times are set.
    pub fn initialize(&mut self) {
        let half_window = 0.5 * self.config.max_spline_duration;
        let t_entry = self.time_on_entry_cmp;
        let total = self.total_duration;

        let mut start = (t_entry - half_window).max(0.0);
        let nominal_end = t_entry + half_window;
        let mut end = nominal_end;

        let min_exit = self.config.min_time_on_exit_cmp;
        if min_exit <= MIN_EXIT_TIME_EPSILON {
            end = end.min(total);
        } else {
            let min_exit = min_exit.min(self.time_on_exit_cmp - 0.5 * MIN_SPLINE_DURATION);
            end = end.min(total - min_exit).min(total);
            if end < nominal_end {
                // Keep the window centered on the switch.
                start = (t_entry - (end - t_entry)).max(0.0);
            }
        }

        self.start_of_spline_time = start;
        self.end_of_spline_time = end;
        self.progress = 0.0;
        self.segment = Segment::EntryPivot;
    }

    fn boundary(&self, frames: &dyn FrameProvider, initial: bool) -> Result<Boundary, FrameError> {
        let pick = |p: &DualFramePoint| -> Result<Point2<f64>, FrameError> {
            if initial {
                p.in_initial.in_world(frames)
            } else {
                p.in_final.in_world(frames)
            }
        };
        Ok(Boundary {
            initial_icp: pick(&self.initial_icp)?,
            entry_cmp: pick(&self.entry_cmp)?,
            exit_corner: pick(&self.exit_corner)?,
            exit_cmp: pick(&self.exit_cmp)?,
        })
    }

    fn fraction_of_total(&self, t: f64) -> f64 {
        if self.total_duration > 0.0 {
            t / self.total_duration
        } else {
            1.0
        }
    }

    fn start_of_spline(&self, b: &Boundary) -> IcpSample {
        IcpSample::on_constant_cmp(
            self.omega0,
            self.start_of_spline_time,
            &b.initial_icp,
            &b.entry_cmp,
        )
    }

    fn end_of_spline(&self, b: &Boundary) -> IcpSample {
        let dt = self.end_of_spline_time - self.time_on_entry_cmp;
        IcpSample::on_constant_cmp(self.omega0, dt, &b.exit_corner, &b.exit_cmp)
    }

    /// The bridging spline, in world, for the current frame poses.
    fn spline(&self, initial: &Boundary, fin: &Boundary) -> CubicSpline2 {
        let start = self.start_of_spline(initial).interpolate(
            &self.start_of_spline(fin),
            self.fraction_of_total(self.start_of_spline_time),
        );
        let end = self
            .end_of_spline(initial)
            .interpolate(&self.end_of_spline(fin), self.fraction_of_total(self.end_of_spline_time));
        CubicSpline2::hermite(
            &start.position,
            &start.velocity,
            &end.position,
            &end.velocity,
            self.end_of_spline_time - self.start_of_spline_time,
        )
    }

    /// Evaluate at `time` seconds into the phase. Returns the world sample.
    pub fn compute(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<IcpSample, FrameError> {
        let time = time.clamp(0.0, self.total_duration.max(0.0));
        self.progress = self.fraction_of_total(time);

        let initial = self.boundary(frames, true)?;
        let fin = self.boundary(frames, false)?;
        let spline = self.spline(&initial, &fin);
        let initial_com = self.initial_com.unwrap_or(fin.initial_icp);
        let start_of_spline_com = com_position_constant_cmp(
            self.omega0,
            self.start_of_spline_time,
            &initial_com,
            &fin.initial_icp,
            &fin.entry_cmp,
        );

        if time <= self.start_of_spline_time {
            self.segment = Segment::EntryPivot;
            let a = IcpSample::on_constant_cmp(
                self.omega0,
                time,
                &initial.initial_icp,
                &initial.entry_cmp,
            );
            let b = IcpSample::on_constant_cmp(self.omega0, time, &fin.initial_icp, &fin.entry_cmp);
            self.desired = a.interpolate(&b, self.progress);
            self.desired_com = com_position_constant_cmp(
                self.omega0,
                time,
                &initial_com,
                &fin.initial_icp,
                &fin.entry_cmp,
            );
        } else if time >= self.end_of_spline_time {
            self.segment = Segment::ExitPivot;
            let dt = time - self.end_of_spline_time;
            let end_a = self.end_of_spline(&initial).position;
            let end_b = self.end_of_spline(&fin).position;
            let a = IcpSample::on_constant_cmp(self.omega0, dt, &end_a, &initial.exit_cmp);
            let b = IcpSample::on_constant_cmp(self.omega0, dt, &end_b, &fin.exit_cmp);
            self.desired = a.interpolate(&b, self.progress);
            let end_of_spline_com =
                spline.com_position(self.omega0, spline.duration(), &start_of_spline_com);
            self.desired_com = com_position_constant_cmp(
                self.omega0,
                dt,
                &end_of_spline_com,
                &end_b,
                &fin.exit_cmp,
            );
        } else {
            self.segment = Segment::Spline;
            let dt = time - self.start_of_spline_time;
            self.desired = spline.sample(dt);
            self.desired_com = spline.com_position(self.omega0, dt, &start_of_spline_com);
        }
        Ok(self.desired)
    }

    /// Center of mass at the end of the phase.
    pub fn final_com_position(
        &self,
        frames: &dyn FrameProvider,
    ) -> Result<Point2<f64>, FrameError> {
        let initial = self.boundary(frames, true)?;
        let fin = self.boundary(frames, false)?;
        let spline = self.spline(&initial, &fin);
        let initial_com = self.initial_com.unwrap_or(fin.initial_icp);
        let start_of_spline_com = com_position_constant_cmp(
            self.omega0,
            self.start_of_spline_time,
            &initial_com,
            &fin.initial_icp,
            &fin.entry_cmp,
        );
        let end_of_spline_com =
            spline.com_position(self.omega0, spline.duration(), &start_of_spline_com);
        let end_icp = self.end_of_spline(&fin).position;
        Ok(com_position_constant_cmp(
            self.omega0,
            self.total_duration - self.end_of_spline_time,
            &end_of_spline_com,
            &end_icp,
            &fin.exit_cmp,
        ))
    }

    pub const fn desired(&self) -> &IcpSample {
        &self.desired
    }

    pub const fn desired_com_position(&self) -> Point2<f64> {
        self.desired_com
    }

    /// True once the last evaluated time is past the end of the spline.
    pub fn is_on_exit_cmp(&self) -> bool {
        self.progress * self.total_duration > self.end_of_spline_time
    }

    pub fn is_done(&self, time: f64) -> bool {
        time >= self.total_duration
    }

    pub const fn current_segment(&self) -> Segment {
        self.segment
    }

    pub const fn start_of_spline_time(&self) -> f64 {
        self.start_of_spline_time
    }

    pub const fn end_of_spline_time(&self) -> f64 {
        self.end_of_spline_time
    }

    pub const fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub const fn progress(&self) -> f64 {
        self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Isometry2;
    use strider_core::FrameTree;

    const OMEGA0: f64 = 3.0;

    fn trajectory(frames: &FrameTree, sole: FrameId, max_spline: f64) -> SegmentedTrajectory {
        let config = SegmentedConfig {
            max_spline_duration: max_spline,
            ..SegmentedConfig::default()
        };
        let mut trajectory = SegmentedTrajectory::new(config, OMEGA0);
        trajectory.set_reference_frames(sole, FrameId::WORLD);
        trajectory.set_trajectory_time(0.4, 0.4);

        let entry = FramePoint2::world(Point2::new(0.0, 0.0));
        let exit = FramePoint2::world(Point2::new(0.2, 0.0));
        // Exit corner reached on the exit pivot after resting there.
        let exit_corner = FramePoint2::world(Point2::new(0.15, 0.0));
        let initial_icp = FramePoint2::world(Point2::new(0.02, 0.0));
        trajectory
            .set_boundary_conditions(&initial_icp, &entry, &exit_corner, &exit, frames)
            .unwrap();
        trajectory.initialize();
        trajectory
    }

    fn frames_with_sole() -> (FrameTree, FrameId) {
        let mut frames = FrameTree::new();
        let sole = frames.add_frame(Isometry2::identity());
        (frames, sole)
    }

    #[test]
    fn spline_window_is_centered_on_switch() {
        let (frames, sole) = frames_with_sole();
        let t = trajectory(&frames, sole, 0.2);
        assert_relative_eq!(t.start_of_spline_time(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(t.end_of_spline_time(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn window_pulled_back_to_keep_time_on_exit() {
        let (frames, sole) = frames_with_sole();
        let mut t = trajectory(&frames, sole, 0.6);
        t.set_minimum_time_on_exit_cmp(0.2).unwrap();
        t.initialize();
        // end limited to 0.8 - 0.2, start mirrored around 0.4
        assert_relative_eq!(t.end_of_spline_time(), 0.6, epsilon = 1e-12);
        assert_relative_eq!(t.start_of_spline_time(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn window_never_starts_before_zero() {
        let (frames, sole) = frames_with_sole();
        let mut t = trajectory(&frames, sole, 0.2);
        t.set_trajectory_time(0.05, 0.75);
        t.initialize();
        assert_relative_eq!(t.start_of_spline_time(), 0.0);
        assert_relative_eq!(t.end_of_spline_time(), 0.15, epsilon = 1e-12);
    }

    #[test]
    fn continuous_across_segment_boundaries() {
        let (frames, sole) = frames_with_sole();
        let mut t = trajectory(&frames, sole, 0.2);
        let eps = 1e-7;
        for boundary in [t.start_of_spline_time(), t.end_of_spline_time()] {
            let before = t.compute(boundary - eps, &frames).unwrap();
            let after = t.compute(boundary + eps, &frames).unwrap();
            assert!((after.position - before.position).norm() < 1e-5);
            assert!((after.velocity - before.velocity).norm() < 1e-5);
        }
    }

    #[test]
    fn switch_instant_lies_on_spline() {
        let (frames, sole) = frames_with_sole();
        let mut t = trajectory(&frames, sole, 0.2);
        let sample = t.compute(0.4, &frames).unwrap();
        assert_eq!(t.current_segment(), Segment::Spline);
        assert!(sample.position.x > 0.0 && sample.position.x < 0.2);
        assert!(!t.is_on_exit_cmp());

        t.compute(t.end_of_spline_time(), &frames).unwrap();
        assert!(!t.is_on_exit_cmp());
        t.compute(t.end_of_spline_time() + 1e-3, &frames).unwrap();
        assert!(t.is_on_exit_cmp());
        assert_eq!(t.current_segment(), Segment::ExitPivot);
    }

    #[test]
    fn first_segment_is_exponential() {
        let (frames, sole) = frames_with_sole();
        let mut t = trajectory(&frames, sole, 0.2);
        let sample = t.compute(0.1, &frames).unwrap();
        let expected =
            IcpSample::on_constant_cmp(OMEGA0, 0.1, &Point2::new(0.02, 0.0), &Point2::origin());
        assert_relative_eq!(sample.position, expected.position, epsilon = 1e-12);
        assert_relative_eq!(sample.velocity, expected.velocity, epsilon = 1e-12);
    }

    #[test]
    fn time_is_clamped_to_phase() {
        let (frames, sole) = frames_with_sole();
        let mut t = trajectory(&frames, sole, 0.2);
        let end = t.compute(0.8, &frames).unwrap();
        let past = t.compute(2.0, &frames).unwrap();
        assert_eq!(end, past);
        assert!(t.is_done(0.8));
        assert_relative_eq!(t.progress(), 1.0);
    }

    #[test]
    fn slip_early_in_phase_moves_plan() {
        let (mut frames, sole) = frames_with_sole();
        let mut t = trajectory(&frames, sole, 0.2);
        let before = t.compute(0.0, &frames).unwrap();
        frames.set_pose(sole, Isometry2::translation(0.01, 0.0)).unwrap();
        let after = t.compute(0.0, &frames).unwrap();
        // At zero progress the sole frame version is used entirely.
        assert_relative_eq!(after.position.x - before.position.x, 0.01, epsilon = 1e-12);
        // At the end the world version is used entirely.
        let end = t.compute(0.8, &frames).unwrap();
        frames.set_pose(sole, Isometry2::identity()).unwrap();
        let end_before_slip = t.compute(0.8, &frames).unwrap();
        assert_relative_eq!(end.position, end_before_slip.position, epsilon = 1e-12);
    }

    #[test]
    fn com_is_continuous_and_lags_icp() {
        let (frames, sole) = frames_with_sole();
        let mut t = trajectory(&frames, sole, 0.2);
        t.set_initial_com_position(&FramePoint2::world(Point2::new(0.0, 0.0)), &frames)
            .unwrap();
        let eps = 1e-7;
        for boundary in [t.start_of_spline_time(), t.end_of_spline_time()] {
            t.compute(boundary - eps, &frames).unwrap();
            let before = t.desired_com_position();
            t.compute(boundary + eps, &frames).unwrap();
            let after = t.desired_com_position();
            assert!((after - before).norm() < 1e-5);
        }
        t.compute(0.8, &frames).unwrap();
        let final_com = t.final_com_position(&frames).unwrap();
        assert_relative_eq!(t.desired_com_position(), final_com, epsilon = 1e-9);
    }

    #[test]
    fn negative_durations_rejected() {
        let (frames, sole) = frames_with_sole();
        let mut t = trajectory(&frames, sole, 0.2);
        assert!(t.set_maximum_spline_duration(-0.1).is_err());
        assert!(t.set_minimum_time_on_exit_cmp(f64::NAN).is_err());
    }
}
