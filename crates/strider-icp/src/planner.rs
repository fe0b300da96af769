//! Capture point planner state machine.
//!
//! ```text
//! Standing -> InitialTransfer -> SingleSupport -> Transfer -> SingleSupport -> ... -> Standing
//! ```
//!
//! Double support plans a cubic from the current desired capture point to the
//! capture point at the start of the next single support. Single support
//! follows either the segmented trajectory (two pivots per support) or the
//! exponential law on the entry pivot (one pivot per support). Corner points
//! are recomputed on every `initialize_for_*` call from the pivot window and
//! the footstep timings.
//!
//! All buffers are sized to the plan window at construction; `compute` does
//! not allocate.

use nalgebra::{Point2, Vector2};
use strider_core::config::PlannerConfig;
use strider_core::{
    ConfigError, ConvexPolygon2, FrameError, FrameId, FramePoint2, FrameProvider, FrameVector2,
    Footstep, FootstepTiming, RobotSide, SideDependent, StriderConfig, SupportFrames,
};

use crate::capture_point::{
    IcpSample, TimeSplit, WindowStart, cmp_from_icp, cmp_velocity_from_icp,
    compute_corner_points_one_cmp, compute_corner_points_two_cmps, icp_position, icp_velocity,
};
use crate::pivots::PivotSequencer;
use crate::segmented::SegmentedTrajectory;
use crate::spline::DoubleSupportTrajectory;

/// Distance below which the desired and final capture points coincide.
const SAME_POINT_EPSILON: f64 = 1.0e-10;
/// Distance ratios this close to 1 (or to 0) yield no time shift.
const RATIO_EPSILON: f64 = 1.0e-3;

/// Operations shared by the planner and its decorators.
///
/// Times are absolute controller times in seconds. Positions handed in and
/// out are in world.
pub trait IcpPlanning {
    fn omega0(&self) -> f64;

    /// Rejects NaN and non-positive values.
    fn set_omega0(&mut self, omega0: f64) -> Result<(), ConfigError>;

    /// Drop the footstep queue and reset every timing to NaN.
    fn clear_plan(&mut self);

    fn add_footstep_to_plan(&mut self, footstep: Footstep, timing: FootstepTiming);

    fn set_support_leg(&mut self, side: RobotSide);

    fn set_transfer_to_side(&mut self, side: RobotSide);

    fn set_transfer_from_side(&mut self, side: RobotSide) {
        self.set_transfer_to_side(side.opposite());
    }

    /// Overwrite the desired capture point state the next transfer starts from.
    fn set_desired_icp_state(&mut self, position: Point2<f64>, velocity: Vector2<f64>);

    /// Center of mass seeding the next single support companion trajectory.
    fn set_initial_com_position(&mut self, com: Option<Point2<f64>>);

    /// Hold `actual_icp` on the next transfer plan update. Consumed once.
    fn hold_current_icp(&mut self, actual_icp: Point2<f64>);

    fn initialize_for_standing(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError>;

    fn initialize_for_transfer(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError>;

    fn initialize_for_single_support(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError>;

    /// Re-derive the plan of the active phase from the current frame poses.
    fn update_current_plan(&mut self, frames: &dyn FrameProvider) -> Result<(), FrameError>;

    /// Advance to `time`. `actual_icp` is the measured capture point; the
    /// core planner ignores it, decorators react to it.
    fn compute(
        &mut self,
        time: f64,
        actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError>;

    /// Shift the single support start so the plan matches a disturbed capture point.
    fn update_plan_for_single_support_disturbances(
        &mut self,
        actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError>;

    fn estimate_time_remaining_for_state_under_disturbance(
        &self,
        actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<f64, FrameError>;

    fn desired_icp(&self) -> &IcpSample;

    fn desired_cmp_position(&self) -> Point2<f64>;

    fn desired_cmp_velocity(&self) -> Vector2<f64>;

    /// Companion center of mass, when the active phase provides one.
    fn desired_com_position(&self) -> Option<Point2<f64>>;

    fn final_desired_icp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError>;

    fn single_support_initial_icp(
        &self,
        frames: &dyn FrameProvider,
    ) -> Result<Point2<f64>, FrameError>;

    fn next_entry_cmp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError>;

    fn next_exit_cmp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError>;

    fn time_in_current_state(&self) -> f64;

    fn time_in_current_state_remaining(&self) -> f64;

    fn current_state_duration(&self) -> f64;

    fn is_done(&self) -> bool;

    fn is_in_double_support(&self) -> bool;

    fn is_in_standing(&self) -> bool;

    fn is_in_initial_transfer(&self) -> bool;

    fn is_on_exit_cmp(&self) -> bool;

    fn is_done_walking(&self) -> bool;

    fn is_holding_position(&self) -> bool;
}

// ---------------------------------------------------------------------------
// IcpPlanner
// ---------------------------------------------------------------------------

/// Plans the desired capture point across standing, transfer and single support.
#[derive(Debug, Clone)]
pub struct IcpPlanner {
    config: PlannerConfig,
    omega0: f64,
    support: SupportFrames,

    pivots: PivotSequencer,
    double_support: DoubleSupportTrajectory,
    single_support: SegmentedTrajectory,

    timings: Vec<FootstepTiming>,
    entry_cmps: Vec<Point2<f64>>,
    exit_cmps: Vec<Point2<f64>>,
    entry_corners: Vec<Point2<f64>>,
    exit_corners: Vec<Point2<f64>>,

    support_side: RobotSide,
    transfer_to_side: Option<RobotSide>,
    is_standing: bool,
    is_initial_transfer: bool,
    is_double_support: bool,
    is_holding: bool,
    hold_requested: bool,
    icp_to_hold: Point2<f64>,
    initial_com: Option<Point2<f64>>,

    initial_time: f64,
    time_in_state: f64,
    time_remaining: f64,

    desired: IcpSample,
    desired_cmp: Point2<f64>,
    desired_cmp_velocity: Vector2<f64>,
    velocity_reduction_factor: f64,

    single_support_initial_icp: FramePoint2,
    single_support_initial_icp_velocity: FrameVector2,
    single_support_final_icp: FramePoint2,
    next_entry_corner: FramePoint2,
}

impl IcpPlanner {
    /// Build a planner from the `planner`, `pivots` and `segmented` sections.
    ///
    /// `default_foot_polygons` are in sole frames.
    pub fn new(
        config: &StriderConfig,
        omega0: f64,
        support: SupportFrames,
        default_foot_polygons: SideDependent<ConvexPolygon2>,
    ) -> Result<Self, ConfigError> {
        config.planner.validate()?;
        config.pivots.validate()?;
        config.segmented.validate()?;
        check_omega0(omega0)?;

        let window = config.planner.number_of_footsteps_to_consider;
        let pivots = PivotSequencer::new(
            config.pivots.clone(),
            window,
            config.planner.use_two_cmps_per_support,
            support.soles,
            default_foot_polygons,
        );
        let nan_point = Point2::new(f64::NAN, f64::NAN);

        Ok(Self {
            config: config.planner.clone(),
            omega0,
            support,
            pivots,
            double_support: DoubleSupportTrajectory::default(),
            single_support: SegmentedTrajectory::new(config.segmented.clone(), omega0),
            timings: vec![FootstepTiming::nan(); window],
            entry_cmps: vec![nan_point; window],
            exit_cmps: vec![nan_point; window],
            entry_corners: vec![nan_point; window],
            exit_corners: vec![nan_point; window],
            support_side: RobotSide::Left,
            transfer_to_side: None,
            is_standing: true,
            is_initial_transfer: false,
            is_double_support: true,
            is_holding: false,
            hold_requested: false,
            icp_to_hold: nan_point,
            initial_com: None,
            initial_time: 0.0,
            time_in_state: 0.0,
            time_remaining: 0.0,
            desired: IcpSample::nan(),
            desired_cmp: nan_point,
            desired_cmp_velocity: Vector2::new(f64::NAN, f64::NAN),
            velocity_reduction_factor: f64::NAN,
            single_support_initial_icp: FramePoint2::nan(FrameId::WORLD),
            single_support_initial_icp_velocity: FrameVector2::zero(FrameId::WORLD),
            single_support_final_icp: FramePoint2::nan(FrameId::WORLD),
            next_entry_corner: FramePoint2::nan(FrameId::WORLD),
        })
    }

    // -- configuration --------------------------------------------------------

    pub fn set_final_transfer_time(&mut self, time: f64) -> Result<(), ConfigError> {
        if !time.is_finite() || time <= 0.0 {
            return Err(ConfigError::invalid(
                "planner.final_transfer_time",
                format!("{time} (must be > 0)"),
            ));
        }
        self.config.final_transfer_time = time;
        Ok(())
    }

    pub fn set_minimum_single_support_time(&mut self, time: f64) -> Result<(), ConfigError> {
        if !time.is_finite() || time < 0.0 {
            return Err(ConfigError::invalid(
                "planner.min_swing_time",
                format!("{time} (must be >= 0)"),
            ));
        }
        self.config.min_swing_time = time;
        Ok(())
    }

    pub fn set_transfer_time_split_fraction(&mut self, fraction: f64) -> Result<(), ConfigError> {
        self.config.transfer_split_fraction =
            check_split("planner.transfer_split_fraction", fraction)?;
        Ok(())
    }

    pub fn set_swing_time_split_fraction(&mut self, fraction: f64) -> Result<(), ConfigError> {
        self.config.swing_split_fraction = check_split("planner.swing_split_fraction", fraction)?;
        Ok(())
    }

    pub fn set_use_two_cmps_per_support(&mut self, use_two_cmps: bool) {
        self.config.use_two_cmps_per_support = use_two_cmps;
    }

    /// `None` disables the velocity decay.
    pub fn set_velocity_decay_duration_when_done(
        &mut self,
        duration: Option<f64>,
    ) -> Result<(), ConfigError> {
        if let Some(d) = duration.filter(|d| !d.is_finite() || *d <= 0.0) {
            return Err(ConfigError::invalid(
                "planner.velocity_decay_duration_when_done",
                format!("{d} (must be > 0)"),
            ));
        }
        self.config.velocity_decay_duration_when_done = duration;
        Ok(())
    }

    pub fn set_maximum_spline_duration(&mut self, duration: f64) -> Result<(), ConfigError> {
        self.single_support.set_maximum_spline_duration(duration)
    }

    pub fn set_minimum_time_on_exit_cmp(&mut self, duration: f64) -> Result<(), ConfigError> {
        self.single_support.set_minimum_time_on_exit_cmp(duration)
    }

    /// Pivot offsets, margins and support polygons.
    pub fn pivots_mut(&mut self) -> &mut PivotSequencer {
        &mut self.pivots
    }

    pub const fn pivots(&self) -> &PivotSequencer {
        &self.pivots
    }

    pub const fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub const fn support_frames(&self) -> &SupportFrames {
        &self.support
    }

    // -- accessors ------------------------------------------------------------

    pub const fn initial_time(&self) -> f64 {
        self.initial_time
    }

    pub fn footstep_timings(&self) -> &[FootstepTiming] {
        &self.timings
    }

    pub const fn support_side(&self) -> RobotSide {
        self.support_side
    }

    pub fn transfer_to_side(&self) -> RobotSide {
        self.transfer_to_side.unwrap_or(RobotSide::Left)
    }

    /// Factor applied to the desired velocity on the last `compute`, NaN when
    /// no decay was active.
    pub const fn velocity_reduction_factor(&self) -> f64 {
        self.velocity_reduction_factor
    }

    /// Capture point at the end of the current single support, in world.
    pub fn single_support_final_icp(
        &self,
        frames: &dyn FrameProvider,
    ) -> Result<Point2<f64>, FrameError> {
        self.single_support_final_icp.in_world(frames)
    }

    /// Time shift that would bring the plan to `actual_icp`.
    ///
    /// The actual capture point is projected on the segment from the desired
    /// to the final capture point (or its backward extension) and its
    /// distance to the desired pivot compared to the planned one:
    /// `dt = ln(actual / expected) / w0`. NaN when the desired and final
    /// capture points coincide.
    pub fn estimate_delta_time_between_desired_and_actual_icp(
        &self,
        actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<f64, FrameError> {
        let desired = self.desired.position;
        let final_icp = self.single_support_final_icp.in_world(frames)?;
        let direction = final_icp - desired;
        let length_squared = direction.norm_squared();
        if length_squared.is_nan() || length_squared.sqrt() < SAME_POINT_EPSILON {
            return Ok(f64::NAN);
        }

        let percentage = (actual_icp - desired).dot(&direction) / length_squared;
        let along = if percentage < 0.0 {
            percentage
        } else {
            percentage.min(1.0)
        };
        let projected = desired + direction * along;

        let actual_distance = (projected - self.desired_cmp).norm();
        let expected_distance = (desired - self.desired_cmp).norm();
        if expected_distance < SAME_POINT_EPSILON {
            return Ok(f64::NAN);
        }
        let ratio = actual_distance / expected_distance;
        if ratio < RATIO_EPSILON || (ratio - 1.0).abs() < RATIO_EPSILON {
            return Ok(0.0);
        }
        Ok(ratio.ln() / self.omega0)
    }

    // -- plan updates ---------------------------------------------------------

    fn load_pivots_in_world(&mut self, frames: &dyn FrameProvider) -> Result<(), FrameError> {
        self.pivots.entry_cmps_in_world(frames, &mut self.entry_cmps)?;
        self.pivots.exit_cmps_in_world(frames, &mut self.exit_cmps)
    }

    fn time_split(&self) -> TimeSplit {
        TimeSplit {
            transfer: self.config.transfer_split_fraction,
            swing: self.config.swing_split_fraction,
        }
    }

    fn set_corner_points_to_nan(&mut self) {
        let nan_point = Point2::new(f64::NAN, f64::NAN);
        self.entry_corners.fill(nan_point);
        self.exit_corners.fill(nan_point);
        self.next_entry_corner = FramePoint2::nan(FrameId::WORLD);
    }

    /// Let the final transfer of the plan use the configured duration.
    fn set_final_transfer_timing(&mut self) {
        let registered = self.pivots.number_of_footsteps_registered();
        if let Some(timing) = self.timings.get_mut(registered) {
            timing.transfer_time = self.config.final_transfer_time;
        }
    }

    fn update_transfer_plan(&mut self, frames: &dyn FrameProvider) -> Result<(), FrameError> {
        let transfer_to_side = self.transfer_to_side();
        let transfer_from_sole = self.support.sole(transfer_to_side.opposite());
        let transfer_to_sole = self.support.sole(transfer_to_side);

        self.pivots
            .set_use_two_cmps_per_support(self.config.use_two_cmps_per_support);
        self.pivots
            .compute_starting_from_double_support(self.is_standing, transfer_to_side, frames)?;
        self.load_pivots_in_world(frames)?;
        let mut is_done_walking = self.pivots.is_done_walking();

        let initial_frame = if self.is_standing {
            self.support.mid_feet
        } else {
            let mid_feet = FramePoint2::origin(self.support.mid_feet).in_world(frames)?;
            let from_sole = FramePoint2::origin(transfer_from_sole).in_world(frames)?;
            let desired = self.desired.position;
            if (mid_feet - desired).norm() < (from_sole - desired).norm() {
                self.support.mid_feet
            } else {
                transfer_from_sole
            }
        };
        let final_frame = if is_done_walking {
            self.support.mid_feet
        } else {
            transfer_to_sole
        };

        let omega0 = self.omega0;
        let (initial_icp, initial_velocity, final_icp) = if self.hold_requested {
            let hold = self.icp_to_hold;
            self.desired = IcpSample::at_rest(hold);
            self.set_corner_points_to_nan();
            self.icp_to_hold = Point2::new(f64::NAN, f64::NAN);
            self.hold_requested = false;
            self.is_holding = true;
            is_done_walking = true;
            log::debug!("holding capture point at ({:.3}, {:.3})", hold.x, hold.y);
            (hold, Vector2::zeros(), hold)
        } else if is_done_walking {
            let entry = self.entry_cmps[0];
            self.set_corner_points_to_nan();
            self.is_holding = false;
            (entry, Vector2::zeros(), entry)
        } else {
            let timing = self.timings[0];
            let after_entry_corner =
                timing.transfer_time * (1.0 - self.config.transfer_split_fraction);
            let on_exit_cmp = timing.swing_time * (1.0 - self.config.swing_split_fraction);

            let final_icp = if self.config.use_two_cmps_per_support {
                compute_corner_points_two_cmps(
                    omega0,
                    WindowStart::DoubleSupport,
                    self.time_split(),
                    &self.timings,
                    &self.entry_cmps,
                    &self.exit_cmps,
                    &mut self.entry_corners,
                    &mut self.exit_corners,
                );
                icp_position(omega0, on_exit_cmp, &self.exit_corners[1], &self.exit_cmps[1])
            } else {
                compute_corner_points_one_cmp(
                    omega0,
                    WindowStart::DoubleSupport,
                    self.config.transfer_split_fraction,
                    &self.timings,
                    &self.entry_cmps,
                    &mut self.entry_corners,
                );
                icp_position(
                    omega0,
                    after_entry_corner + timing.swing_time,
                    &self.entry_corners[1],
                    &self.entry_cmps[1],
                )
            };
            let initial_icp = icp_position(
                omega0,
                after_entry_corner,
                &self.entry_corners[1],
                &self.entry_cmps[1],
            );
            let initial_velocity = icp_velocity(omega0, 0.0, &initial_icp, &self.entry_cmps[1]);
            self.next_entry_corner =
                FramePoint2::world(self.entry_corners[1]).change_frame(final_frame, frames)?;
            self.is_holding = false;
            (initial_icp, initial_velocity, final_icp)
        };

        self.single_support_initial_icp =
            FramePoint2::world(initial_icp).change_frame(final_frame, frames)?;
        self.single_support_initial_icp_velocity = FrameVector2::world(initial_velocity);
        self.single_support_final_icp = FramePoint2::world(final_icp);

        if self.desired.contains_nan() {
            // Nothing tracked yet: start at rest where the transfer ends.
            log::debug!("no desired capture point state, starting at rest on the plan");
            self.desired = IcpSample::at_rest(initial_icp);
        }

        if self.is_standing && !is_done_walking {
            self.is_initial_transfer = true;
            self.is_standing = false;
        }

        self.double_support
            .set_trajectory_time(self.timings[0].transfer_time);
        self.double_support.set_initial_conditions(
            &FramePoint2::world(self.desired.position),
            &FrameVector2::world(self.desired.velocity),
            initial_frame,
            frames,
        )?;
        self.double_support.set_final_conditions(
            &self.single_support_initial_icp,
            &self.single_support_initial_icp_velocity,
            final_frame,
            frames,
        )
    }

    fn update_single_support_plan(&mut self, frames: &dyn FrameProvider) -> Result<(), FrameError> {
        let support_sole = self.support.sole(self.support_side);

        self.pivots
            .set_use_two_cmps_per_support(self.config.use_two_cmps_per_support);
        self.pivots
            .compute_starting_from_single_support(self.support_side, frames)?;
        self.load_pivots_in_world(frames)?;

        let omega0 = self.omega0;
        let timing = self.timings[0];
        let after_entry_corner = timing.transfer_time * (1.0 - self.config.transfer_split_fraction);
        let on_entry_cmp = timing.swing_time * self.config.swing_split_fraction;
        let on_exit_cmp = timing.swing_time * (1.0 - self.config.swing_split_fraction);

        let (initial, final_icp) = if self.config.use_two_cmps_per_support {
            compute_corner_points_two_cmps(
                omega0,
                WindowStart::SingleSupport,
                self.time_split(),
                &self.timings,
                &self.entry_cmps,
                &self.exit_cmps,
                &mut self.entry_corners,
                &mut self.exit_corners,
            );
            let initial = IcpSample::on_constant_cmp(
                omega0,
                after_entry_corner,
                &self.entry_corners[0],
                &self.entry_cmps[0],
            );
            let final_icp =
                icp_position(omega0, on_exit_cmp, &self.exit_corners[0], &self.exit_cmps[0]);

            let segmented = &mut self.single_support;
            segmented.set_omega0(omega0);
            segmented.set_reference_frames(support_sole, FrameId::WORLD);
            segmented.set_trajectory_time(on_entry_cmp, on_exit_cmp);
            segmented.set_boundary_conditions(
                &FramePoint2::world(initial.position),
                &FramePoint2::world(self.entry_cmps[0]),
                &FramePoint2::world(self.exit_corners[0]),
                &FramePoint2::world(self.exit_cmps[0]),
                frames,
            )?;
            match self.initial_com {
                Some(com) => segmented.set_initial_com_position(&FramePoint2::world(com), frames)?,
                None => segmented.clear_initial_com_position(),
            }
            segmented.initialize();
            (initial, final_icp)
        } else {
            compute_corner_points_one_cmp(
                omega0,
                WindowStart::SingleSupport,
                self.config.transfer_split_fraction,
                &self.timings,
                &self.entry_cmps,
                &mut self.entry_corners,
            );
            let initial = IcpSample::on_constant_cmp(
                omega0,
                after_entry_corner,
                &self.entry_corners[0],
                &self.entry_cmps[0],
            );
            let final_icp = icp_position(
                omega0,
                after_entry_corner + timing.swing_time,
                &self.entry_corners[0],
                &self.entry_cmps[0],
            );
            (initial, final_icp)
        };

        self.single_support_initial_icp =
            FramePoint2::world(initial.position).change_frame(support_sole, frames)?;
        self.single_support_initial_icp_velocity =
            FrameVector2::world(initial.velocity).change_frame(support_sole, frames)?;
        self.single_support_final_icp = FramePoint2::world(final_icp);
        self.next_entry_corner = FramePoint2::world(self.entry_corners[1]);
        Ok(())
    }

    fn decay_desired_velocity_if_needed(&mut self) {
        self.velocity_reduction_factor = f64::NAN;
        let Some(decay_duration) = self.config.velocity_decay_duration_when_done else {
            return;
        };
        if self.is_standing {
            return;
        }
        let overrun = self.time_in_state - self.current_state_duration();
        if overrun > 0.0 {
            let factor = (1.0 - overrun / decay_duration).clamp(0.0, 1.0);
            self.velocity_reduction_factor = factor;
            self.desired.velocity *= factor;
        }
    }
}

fn check_omega0(omega0: f64) -> Result<(), ConfigError> {
    if omega0.is_finite() && omega0 > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidOmega0(omega0))
    }
}

fn check_split(field: &str, fraction: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&fraction) {
        Ok(fraction)
    } else {
        Err(ConfigError::invalid(field, format!("{fraction} (must be in [0, 1])")))
    }
}

impl IcpPlanning for IcpPlanner {
    fn omega0(&self) -> f64 {
        self.omega0
    }

    fn set_omega0(&mut self, omega0: f64) -> Result<(), ConfigError> {
        check_omega0(omega0)?;
        self.omega0 = omega0;
        self.single_support.set_omega0(omega0);
        Ok(())
    }

    fn clear_plan(&mut self) {
        self.pivots.clear();
        self.timings.fill(FootstepTiming::nan());
    }

    fn add_footstep_to_plan(&mut self, footstep: Footstep, timing: FootstepTiming) {
        if self.pivots.add_upcoming_footstep(footstep) {
            let index = self.pivots.number_of_footsteps_registered() - 1;
            self.timings[index] = timing;
        }
    }

    fn set_support_leg(&mut self, side: RobotSide) {
        self.support_side = side;
    }

    fn set_transfer_to_side(&mut self, side: RobotSide) {
        self.transfer_to_side = Some(side);
    }

    fn set_desired_icp_state(&mut self, position: Point2<f64>, velocity: Vector2<f64>) {
        self.desired.position = position;
        self.desired.velocity = velocity;
    }

    fn set_initial_com_position(&mut self, com: Option<Point2<f64>>) {
        self.initial_com = com;
    }

    fn hold_current_icp(&mut self, actual_icp: Point2<f64>) {
        self.icp_to_hold = actual_icp;
        self.hold_requested = true;
    }

    fn initialize_for_standing(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.clear_plan();
        self.is_standing = true;
        self.is_double_support = true;
        self.initial_time = time;
        self.timings[0].transfer_time = self.config.final_transfer_time;
        log::debug!("planner: standing at t = {time:.3}");
        self.update_transfer_plan(frames)
    }

    fn initialize_for_transfer(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.is_double_support = true;
        self.initial_time = time;
        self.set_final_transfer_timing();
        log::debug!(
            "planner: transfer to {} at t = {time:.3}",
            self.transfer_to_side()
        );
        self.update_transfer_plan(frames)
    }

    fn initialize_for_single_support(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.is_holding = false;
        self.is_standing = false;
        self.is_initial_transfer = false;
        self.is_double_support = false;
        self.initial_time = time;
        self.set_final_transfer_timing();
        log::debug!(
            "planner: single support on {} at t = {time:.3}",
            self.support_side
        );
        self.update_single_support_plan(frames)
    }

    fn update_current_plan(&mut self, frames: &dyn FrameProvider) -> Result<(), FrameError> {
        if self.is_double_support {
            if self.is_holding {
                self.hold_requested = true;
                self.icp_to_hold = self.desired.position;
            }
            self.update_transfer_plan(frames)
        } else {
            self.update_single_support_plan(frames)
        }
    }

    fn compute(
        &mut self,
        time: f64,
        _actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.time_in_state = time - self.initial_time;
        self.time_remaining = self.current_state_duration() - self.time_in_state;
        let t = self.time_in_state;
        let omega0 = self.omega0;

        self.desired = if self.is_double_support {
            self.double_support.compute(t, frames)?
        } else if self.config.use_two_cmps_per_support {
            self.single_support.compute(t, frames)?
        } else {
            let cmp = self.pivots.next_entry_cmp().in_world(frames)?;
            let icp0 = self.single_support_initial_icp.in_world(frames)?;
            // min() keeps t when the swing time is undefined.
            let t = t.max(0.0).min(self.timings[0].swing_time);
            IcpSample::on_constant_cmp(omega0, t, &icp0, &cmp)
        };

        self.decay_desired_velocity_if_needed();

        self.desired_cmp = cmp_from_icp(omega0, &self.desired.position, &self.desired.velocity);
        self.desired_cmp_velocity =
            cmp_velocity_from_icp(omega0, &self.desired.velocity, &self.desired.acceleration);
        Ok(())
    }

    fn update_plan_for_single_support_disturbances(
        &mut self,
        actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.initialize_for_single_support(self.initial_time, frames)?;
        if self.is_done() {
            return Ok(());
        }
        let delta = self.estimate_delta_time_between_desired_and_actual_icp(actual_icp, frames)?;
        if delta.is_nan() {
            return Ok(());
        }
        let delta = delta
            .min(self.time_remaining)
            .min(self.timings[0].swing_time - self.config.min_swing_time);
        self.initial_time -= delta;
        Ok(())
    }

    fn estimate_time_remaining_for_state_under_disturbance(
        &self,
        actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<f64, FrameError> {
        if self.is_done() {
            return Ok(0.0);
        }
        let delta = self.estimate_delta_time_between_desired_and_actual_icp(actual_icp, frames)?;
        if delta.is_nan() {
            return Ok(0.0);
        }
        Ok((self.time_remaining - delta).max(0.0))
    }

    fn desired_icp(&self) -> &IcpSample {
        &self.desired
    }

    fn desired_cmp_position(&self) -> Point2<f64> {
        self.desired_cmp
    }

    fn desired_cmp_velocity(&self) -> Vector2<f64> {
        self.desired_cmp_velocity
    }

    fn desired_com_position(&self) -> Option<Point2<f64>> {
        (!self.is_double_support && self.config.use_two_cmps_per_support)
            .then(|| self.single_support.desired_com_position())
    }

    fn final_desired_icp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError> {
        if self.is_standing {
            return self.pivots.next_entry_cmp().in_world(frames);
        }
        if self.next_entry_corner.contains_nan() {
            return self.single_support_final_icp.in_world(frames);
        }
        self.next_entry_corner.in_world(frames)
    }

    fn single_support_initial_icp(
        &self,
        frames: &dyn FrameProvider,
    ) -> Result<Point2<f64>, FrameError> {
        self.single_support_initial_icp.in_world(frames)
    }

    fn next_entry_cmp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError> {
        self.pivots.next_entry_cmp().in_world(frames)
    }

    fn next_exit_cmp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError> {
        self.pivots.next_exit_cmp().in_world(frames)
    }

    fn time_in_current_state(&self) -> f64 {
        self.time_in_state
    }

    fn time_in_current_state_remaining(&self) -> f64 {
        self.time_remaining
    }

    fn current_state_duration(&self) -> f64 {
        if self.is_double_support {
            self.timings[0].transfer_time
        } else {
            self.timings[0].swing_time
        }
    }

    fn is_done(&self) -> bool {
        self.time_remaining <= 0.0
    }

    fn is_in_double_support(&self) -> bool {
        self.is_double_support
    }

    fn is_in_standing(&self) -> bool {
        self.is_standing
    }

    fn is_in_initial_transfer(&self) -> bool {
        self.is_initial_transfer
    }

    fn is_on_exit_cmp(&self) -> bool {
        !self.is_double_support
            && self.config.use_two_cmps_per_support
            && self.single_support.is_on_exit_cmp()
    }

    fn is_done_walking(&self) -> bool {
        self.pivots.is_done_walking()
    }

    fn is_holding_position(&self) -> bool {
        self.is_holding
    }
}
