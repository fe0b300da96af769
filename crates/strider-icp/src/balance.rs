//! Balance manager: the walking controller's single entry point.
//!
//! Wires the capture point planner (usually wrapped in the time freezer) to
//! the momentum controller, keeps the last measurements, and answers the
//! safety questions the gait state machine asks before changing phase.

use nalgebra::{Point2, Point3, Vector2, Vector3};
use strider_core::config::BalanceConfig;
use strider_core::{
    ConfigError, ConvexPolygon2, FrameError, FrameProvider, FrameVector2, Footstep, FootstepTiming,
    RobotSide, SideDependent, StriderConfig, SupportFrames,
};

use crate::capture_point::{IcpSample, cmp_from_icp};
use crate::freezer::TimeFreezer;
use crate::momentum::{AngularState, MomentumControlInput, MomentumController, MomentumRateCommand};
use crate::planner::{IcpPlanner, IcpPlanning};

/// Measurements refreshed once per control tick, world frame.
#[derive(Debug, Clone)]
pub struct BalanceMeasurements {
    pub time: f64,
    pub capture_point: Point2<f64>,
    pub center_of_mass: Point3<f64>,
    /// Polygon of each foot in contact.
    pub foot_polygons: SideDependent<Option<ConvexPolygon2>>,
    /// Current support polygon (one foot, or the hull of both).
    pub support_polygon: ConvexPolygon2,
}

/// Diagnostics snapshot for safety monitors.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturabilityStatus {
    pub capture_point: Point2<f64>,
    pub desired_capture_point: Point2<f64>,
    pub center_of_mass: Point3<f64>,
    pub support_polygons: SideDependent<Option<ConvexPolygon2>>,
}

/// Per-tick commands from the gait state machine.
#[derive(Debug, Clone, Copy)]
pub struct BalanceCommand {
    /// Support leg in single support, `None` in double support.
    pub support_leg: Option<RobotSide>,
    pub desired_com_height_acceleration: f64,
    pub keep_cmp_inside_support_polygon: bool,
    pub angular: AngularState,
}

/// Planner plus momentum controller.
#[derive(Debug, Clone)]
pub struct BalanceManager<P = TimeFreezer<IcpPlanner>> {
    planner: P,
    momentum: MomentumController,
    config: BalanceConfig,
    support: SupportFrames,
    measurements: BalanceMeasurements,
    desired_icp: IcpSample,
    final_desired_icp: Point2<f64>,
    perfect_cmp: Point2<f64>,
    achieved_cmp: Point2<f64>,
    hold_com_in_next_double_support: bool,
    use_high_momentum_weight: bool,
}

impl BalanceManager {
    /// Planner wrapped in the time freezer, with the configured momentum strategy.
    ///
    /// `default_foot_polygons` are in sole frames.
    pub fn new(
        config: &StriderConfig,
        omega0: f64,
        support: SupportFrames,
        default_foot_polygons: SideDependent<ConvexPolygon2>,
    ) -> Result<Self, ConfigError> {
        let planner = IcpPlanner::new(config, omega0, support, default_foot_polygons)?;
        let planner = TimeFreezer::new(planner, config.freezer.clone())?;
        let momentum = MomentumController::new(config, omega0)?;
        Self::with_planner(planner, momentum, config.balance.clone(), support)
    }
}

impl<P: IcpPlanning> BalanceManager<P> {
    pub fn with_planner(
        planner: P,
        momentum: MomentumController,
        config: BalanceConfig,
        support: SupportFrames,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let nan = Point2::new(f64::NAN, f64::NAN);
        Ok(Self {
            planner,
            momentum,
            config,
            support,
            measurements: BalanceMeasurements {
                time: 0.0,
                capture_point: nan,
                center_of_mass: Point3::new(f64::NAN, f64::NAN, f64::NAN),
                foot_polygons: SideDependent::new(None, None),
                support_polygon: ConvexPolygon2::rectangle(Point2::origin(), 0.0, 0.0),
            },
            desired_icp: IcpSample::nan(),
            final_desired_icp: nan,
            perfect_cmp: nan,
            achieved_cmp: nan,
            hold_com_in_next_double_support: false,
            use_high_momentum_weight: false,
        })
    }

    pub const fn planner(&self) -> &P {
        &self.planner
    }

    pub fn planner_mut(&mut self) -> &mut P {
        &mut self.planner
    }

    pub const fn momentum(&self) -> &MomentumController {
        &self.momentum
    }

    pub fn momentum_mut(&mut self) -> &mut MomentumController {
        &mut self.momentum
    }

    pub const fn config(&self) -> &BalanceConfig {
        &self.config
    }

    pub const fn measurements(&self) -> &BalanceMeasurements {
        &self.measurements
    }

    /// Update omega0 on the planner and the momentum controller.
    pub fn set_omega0(&mut self, omega0: f64) -> Result<(), ConfigError> {
        self.momentum.set_omega0(omega0)?;
        self.planner.set_omega0(omega0)
    }

    // -- measurements ---------------------------------------------------------

    /// Store this tick's measurements and refresh the CMP implied by the
    /// current desired capture point.
    pub fn update(&mut self, measurements: BalanceMeasurements) {
        self.measurements = measurements;
        self.perfect_cmp = cmp_from_icp(
            self.planner.omega0(),
            &self.desired_icp.position,
            &self.desired_icp.velocity,
        );
    }

    // -- plan management ------------------------------------------------------

    pub fn add_footstep_to_plan(&mut self, footstep: Footstep, timing: FootstepTiming) {
        self.planner.add_footstep_to_plan(footstep, timing);
    }

    pub fn clear_icp_plan(&mut self) {
        self.planner.clear_plan();
    }

    pub fn set_icp_plan_support_side(&mut self, side: RobotSide) {
        self.planner.set_support_leg(side);
    }

    pub fn set_icp_plan_transfer_to_side(&mut self, side: RobotSide) {
        self.planner.set_transfer_to_side(side);
    }

    pub fn set_icp_plan_transfer_from_side(&mut self, side: RobotSide) {
        self.planner.set_transfer_from_side(side);
    }

    /// Hold the measured capture point and start standing.
    pub fn initialize(&mut self, frames: &dyn FrameProvider) -> Result<(), FrameError> {
        self.final_desired_icp = Point2::new(f64::NAN, f64::NAN);
        let capture_point = self.measurements.capture_point;
        self.desired_icp = IcpSample::at_rest(capture_point);
        self.planner.hold_current_icp(capture_point);
        self.planner
            .initialize_for_standing(self.measurements.time, frames)
    }

    pub fn initialize_for_standing(
        &mut self,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.consume_hold_request();
        self.planner
            .initialize_for_standing(self.measurements.time, frames)?;
        self.refresh_final_desired_icp(frames)
    }

    pub fn initialize_for_transfer(
        &mut self,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.consume_hold_request();
        self.planner
            .initialize_for_transfer(self.measurements.time, frames)?;
        self.refresh_final_desired_icp(frames)
    }

    pub fn initialize_for_single_support(
        &mut self,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.planner
            .initialize_for_single_support(self.measurements.time, frames)?;
        self.refresh_final_desired_icp(frames)
    }

    /// Ask the planner to hold the CoM, projected into the support polygon
    /// shrunk by the configured distance.
    pub fn request_hold_current_com(&mut self) {
        let com = self.measurements.center_of_mass.xy();
        let shrunk = self
            .measurements
            .support_polygon
            .shrink(self.config.distance_to_shrink_support_polygon_when_holding);
        let target = if shrunk.is_empty() {
            com
        } else {
            shrunk.orthogonal_projection(&com)
        };
        self.planner.hold_current_icp(target);
    }

    /// Hold the CoM when the next double support (or standing) starts.
    pub fn request_hold_current_com_in_next_double_support(&mut self) {
        self.hold_com_in_next_double_support = true;
    }

    pub fn update_current_plan(&mut self, frames: &dyn FrameProvider) -> Result<(), FrameError> {
        self.planner.update_current_plan(frames)?;
        self.refresh_final_desired_icp(frames)
    }

    pub fn update_plan_for_single_support_disturbances(
        &mut self,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        let capture_point = self.measurements.capture_point;
        self.planner
            .update_plan_for_single_support_disturbances(&capture_point, frames)?;
        self.refresh_final_desired_icp(frames)
    }

    pub fn estimate_time_remaining_for_swing_under_disturbance(
        &self,
        frames: &dyn FrameProvider,
    ) -> Result<f64, FrameError> {
        self.planner.estimate_time_remaining_for_state_under_disturbance(
            &self.measurements.capture_point,
            frames,
        )
    }

    // -- control --------------------------------------------------------------

    /// Keep the recovery momentum weight until the ICP error is small again
    /// in double support.
    pub fn set_use_high_momentum_weight_for_recovery(&mut self) {
        self.use_high_momentum_weight = true;
    }

    /// Advance the plan and produce the momentum rate command for this tick.
    pub fn compute(
        &mut self,
        command: &BalanceCommand,
        frames: &dyn FrameProvider,
    ) -> Result<MomentumRateCommand, FrameError> {
        let capture_point = self.measurements.capture_point;
        self.planner
            .compute(self.measurements.time, &capture_point, frames)?;
        self.desired_icp = *self.planner.desired_icp();

        if command.support_leg.is_none() {
            let allowed = self.config.allowed_icp_error_for_default_weight;
            if self.icp_error().norm_squared() < allowed * allowed {
                self.use_high_momentum_weight = false;
            }
        }
        if self.use_high_momentum_weight {
            self.momentum.set_high_momentum_weight();
        } else {
            self.momentum.set_default_momentum_weight();
        }
        self.momentum
            .set_keep_cmp_inside_support_polygon(command.keep_cmp_inside_support_polygon);

        let time_remaining_in_swing = command
            .support_leg
            .map(|_| self.planner.time_in_current_state_remaining());
        let input = MomentumControlInput {
            desired_icp: &self.desired_icp,
            reference_cmp: self.planner.desired_cmp_position(),
            actual_icp: capture_point,
            center_of_mass: self.measurements.center_of_mass,
            support_polygon: &self.measurements.support_polygon,
            support_side: command.support_leg,
            time_remaining_in_swing,
            desired_com_height_acceleration: command.desired_com_height_acceleration,
            angular: command.angular,
        };
        Ok(*self.momentum.compute(&input))
    }

    /// Store and return the CMP the whole-body solver achieved.
    pub fn compute_achieved_cmp(
        &mut self,
        achieved_linear_momentum_rate: &Vector3<f64>,
    ) -> Option<Point2<f64>> {
        let achieved = self.momentum.compute_achieved_cmp(
            achieved_linear_momentum_rate,
            &self.measurements.center_of_mass.xy(),
        )?;
        self.achieved_cmp = achieved;
        Some(achieved)
    }

    // -- queries --------------------------------------------------------------

    /// Desired minus measured capture point.
    pub fn icp_error(&self) -> Vector2<f64> {
        self.desired_icp.position - self.measurements.capture_point
    }

    pub fn icp_error_magnitude(&self) -> f64 {
        self.icp_error().norm()
    }

    /// True when the ICP error, seen from the leading sole, fits inside the
    /// single support error ellipse.
    pub fn is_transition_to_single_support_safe(
        &self,
        transfer_to_side: RobotSide,
        frames: &dyn FrameProvider,
    ) -> Result<bool, FrameError> {
        let error = FrameVector2::world(self.icp_error())
            .change_frame(self.support.sole(transfer_to_side), frames)?
            .vector;
        let x = error.x / self.config.max_icp_error_before_single_support_x;
        let y = error.y / self.config.max_icp_error_before_single_support_y;
        Ok(x * x + y * y < 1.0)
    }

    /// True when the measured capture point is deep enough inside the
    /// support polygon to stop.
    pub fn is_transition_to_standing_safe(&self) -> bool {
        self.measurements
            .support_polygon
            .distance_inside(&self.measurements.capture_point)
            > self.config.safe_distance_from_support_edges_to_stop
    }

    pub fn is_icp_plan_done(&self) -> bool {
        self.planner.is_done()
    }

    pub fn is_on_exit_cmp(&self) -> bool {
        self.planner.is_on_exit_cmp()
    }

    pub fn time_remaining_in_current_state(&self) -> f64 {
        self.planner.time_in_current_state_remaining()
    }

    pub const fn desired_icp(&self) -> &IcpSample {
        &self.desired_icp
    }

    /// Desired CMP sent to the momentum controller on the last tick.
    pub const fn desired_cmp(&self) -> Point2<f64> {
        self.momentum.desired_cmp()
    }

    pub const fn final_desired_icp(&self) -> Point2<f64> {
        self.final_desired_icp
    }

    /// CMP that would exactly track the desired capture point.
    pub const fn perfect_cmp(&self) -> Point2<f64> {
        self.perfect_cmp
    }

    pub const fn achieved_cmp(&self) -> Point2<f64> {
        self.achieved_cmp
    }

    pub fn next_exit_cmp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError> {
        self.planner.next_exit_cmp(frames)
    }

    pub fn capturability_status(&self) -> CapturabilityStatus {
        CapturabilityStatus {
            capture_point: self.measurements.capture_point,
            desired_capture_point: self.desired_icp.position,
            center_of_mass: self.measurements.center_of_mass,
            support_polygons: self.measurements.foot_polygons.clone(),
        }
    }

    fn consume_hold_request(&mut self) {
        if self.hold_com_in_next_double_support {
            self.request_hold_current_com();
            self.hold_com_in_next_double_support = false;
        }
    }

    fn refresh_final_desired_icp(&mut self, frames: &dyn FrameProvider) -> Result<(), FrameError> {
        self.final_desired_icp = self.planner.final_desired_icp(frames)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strider_test_utils::{Stance, default_foot_polygons, straight_walk};

    const OMEGA0: f64 = 3.0;

    fn manager(stance: &Stance) -> BalanceManager {
        BalanceManager::new(
            &StriderConfig::default(),
            OMEGA0,
            stance.support,
            default_foot_polygons(),
        )
        .unwrap()
    }

    fn measurements(stance: &Stance, time: f64, capture_point: Point2<f64>) -> BalanceMeasurements {
        BalanceMeasurements {
            time,
            capture_point,
            center_of_mass: Point3::new(capture_point.x, capture_point.y, 0.9),
            foot_polygons: SideDependent::from_fn(|side| Some(stance.foot_polygon_in_world(side))),
            support_polygon: stance.double_support_polygon(),
        }
    }

    fn double_support() -> BalanceCommand {
        BalanceCommand {
            support_leg: None,
            desired_com_height_acceleration: 0.0,
            keep_cmp_inside_support_polygon: true,
            angular: AngularState::default(),
        }
    }

    #[test]
    fn initialize_holds_measured_capture_point() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        let held = Point2::new(0.02, -0.01);
        m.update(measurements(&stance, 0.0, held));
        m.initialize(&stance.frames).unwrap();
        m.compute(&double_support(), &stance.frames).unwrap();

        assert_relative_eq!(m.desired_icp().position, held, epsilon = 1e-9);
        assert_relative_eq!(m.icp_error_magnitude(), 0.0, epsilon = 1e-9);
        assert!(m.planner().is_in_standing());
    }

    #[test]
    fn standing_command_supports_weight() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        m.update(measurements(&stance, 0.0, Point2::origin()));
        m.initialize_for_standing(&stance.frames).unwrap();
        let command = m.compute(&double_support(), &stance.frames).unwrap();
        assert_relative_eq!(m.desired_cmp(), Point2::origin(), epsilon = 1e-9);
        assert_relative_eq!(command.linear.norm(), 0.0, epsilon = 1e-6);
        assert_relative_eq!(m.final_desired_icp(), Point2::origin(), epsilon = 1e-9);
    }

    #[test]
    fn icp_error_is_desired_minus_actual() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        m.update(measurements(&stance, 0.0, Point2::origin()));
        m.initialize_for_standing(&stance.frames).unwrap();
        m.update(measurements(&stance, 0.0, Point2::new(0.01, 0.0)));
        m.compute(&double_support(), &stance.frames).unwrap();
        assert_relative_eq!(m.icp_error(), Vector2::new(-0.01, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn single_support_gate_is_elliptic() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        m.update(measurements(&stance, 0.0, Point2::origin()));
        m.initialize_for_standing(&stance.frames).unwrap();
        m.compute(&double_support(), &stance.frames).unwrap();

        // 3 cm forward error fits the 3.5 cm axis, 3 cm lateral does not fit 1.5 cm.
        m.update(measurements(&stance, 0.0, Point2::new(-0.03, 0.0)));
        assert!(m.is_transition_to_single_support_safe(RobotSide::Left, &stance.frames).unwrap());
        m.update(measurements(&stance, 0.0, Point2::new(0.0, -0.03)));
        assert!(!m.is_transition_to_single_support_safe(RobotSide::Left, &stance.frames).unwrap());
    }

    #[test]
    fn standing_gate_needs_depth_inside_support() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        m.update(measurements(&stance, 0.0, Point2::origin()));
        assert!(m.is_transition_to_standing_safe());
        // The feet end at x = 0.11.
        m.update(measurements(&stance, 0.0, Point2::new(0.08, 0.0)));
        assert!(!m.is_transition_to_standing_safe());
    }

    #[test]
    fn hold_com_request_is_consumed_once() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        let mut state = measurements(&stance, 0.0, Point2::origin());
        // CoM far forward: held at the edge of the shrunk polygon.
        state.center_of_mass = Point3::new(0.3, 0.0, 0.9);
        m.update(state);
        m.request_hold_current_com_in_next_double_support();
        m.initialize_for_standing(&stance.frames).unwrap();
        m.compute(&double_support(), &stance.frames).unwrap();
        assert_relative_eq!(m.desired_icp().position.x, 0.11 - 0.08, epsilon = 1e-9);
        assert!(m.planner().is_holding_position());

        m.initialize_for_standing(&stance.frames).unwrap();
        m.compute(&double_support(), &stance.frames).unwrap();
        assert!(!m.planner().is_holding_position());
    }

    #[test]
    fn high_weight_released_once_error_is_small() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        m.update(measurements(&stance, 0.0, Point2::origin()));
        m.initialize_for_standing(&stance.frames).unwrap();

        m.set_use_high_momentum_weight_for_recovery();
        m.update(measurements(&stance, 0.0, Point2::new(0.03, 0.0)));
        m.compute(&double_support(), &stance.frames).unwrap();
        assert!(m.momentum().is_using_high_momentum_weight());

        m.update(measurements(&stance, 0.0, Point2::new(0.005, 0.0)));
        m.compute(&double_support(), &stance.frames).unwrap();
        assert!(!m.momentum().is_using_high_momentum_weight());
    }

    #[test]
    fn walking_start_moves_final_icp_onto_first_step() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        m.update(measurements(&stance, 0.0, Point2::origin()));
        m.initialize_for_standing(&stance.frames).unwrap();
        m.compute(&double_support(), &stance.frames).unwrap();

        for footstep in straight_walk(RobotSide::Left, 3, 0.25) {
            m.add_footstep_to_plan(footstep, FootstepTiming::new(0.8, 0.4));
        }
        m.set_icp_plan_transfer_to_side(RobotSide::Right);
        m.update(measurements(&stance, 1.0, Point2::origin()));
        m.initialize_for_transfer(&stance.frames).unwrap();

        assert!(m.final_desired_icp().y < 0.0);
        assert!(!m.is_icp_plan_done());
        m.compute(&double_support(), &stance.frames).unwrap();
        assert!(m.time_remaining_in_current_state() > 0.0);
    }

    #[test]
    fn achieved_cmp_and_status() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        m.update(measurements(&stance, 0.0, Point2::origin()));
        m.initialize_for_standing(&stance.frames).unwrap();
        let command = m.compute(&double_support(), &stance.frames).unwrap();

        let achieved = m.compute_achieved_cmp(&command.linear).unwrap();
        assert_relative_eq!(achieved, m.desired_cmp(), epsilon = 1e-9);
        assert_relative_eq!(m.achieved_cmp(), achieved);

        let status = m.capturability_status();
        assert_eq!(status.capture_point, Point2::origin());
        assert!(status.support_polygons.left.is_some());
        assert!(status.support_polygons.right.is_some());
    }

    #[test]
    fn invalid_omega0_rejected() {
        let stance = Stance::standing();
        let mut m = manager(&stance);
        assert!(m.set_omega0(0.0).is_err());
        assert!(m.set_omega0(3.3).is_ok());
        assert_relative_eq!(m.planner().omega0(), 3.3);
        assert_relative_eq!(m.momentum().omega0(), 3.3);
    }
}
