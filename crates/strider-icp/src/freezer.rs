//! Time freezing around a planner.
//!
//! The wrapped planner is queried at `time - time_delay`. After every
//! `compute`, the delay grows when the measured capture point lags behind the
//! desired one along the planned direction of motion:
//!
//! ```text
//! d = -v_hat . (actual - desired)        (> 0 when lagging)
//!
//! done, or double support ending with d > max_error_to_begin_swing:
//!     delay += dt
//! d > max_allowed_error_without_partial_time_freeze:
//!     delay += factor * dt
//! ```
//!
//! The delay never decreases within a phase and resets on every
//! `initialize_for_*`.

use nalgebra::{Point2, Vector2};
use strider_core::config::FreezerConfig;
use strider_core::{ConfigError, FrameError, FrameProvider, Footstep, FootstepTiming, RobotSide};

use crate::capture_point::IcpSample;
use crate::planner::IcpPlanning;

/// Double support time left below which a lagging capture point stops the clock.
const END_OF_DOUBLE_SUPPORT_WINDOW: f64 = 0.1;

/// Planner decorator that slows the plan down while the robot lags behind it.
#[derive(Debug, Clone)]
pub struct TimeFreezer<P> {
    inner: P,
    config: FreezerConfig,
    time_delay: f64,
    previous_time: f64,
    distance_from_freeze_line: f64,
    is_time_frozen: bool,
}

impl<P: IcpPlanning> TimeFreezer<P> {
    pub fn new(inner: P, config: FreezerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner,
            config,
            time_delay: 0.0,
            previous_time: f64::NAN,
            distance_from_freeze_line: f64::NAN,
            is_time_frozen: false,
        })
    }

    pub const fn inner(&self) -> &P {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    pub const fn config(&self) -> &FreezerConfig {
        &self.config
    }

    pub fn set_do_time_freezing(&mut self, enabled: bool) {
        self.config.do_time_freezing = enabled;
    }

    pub fn set_freeze_time_factor(&mut self, factor: f64) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&factor) {
            return Err(ConfigError::invalid(
                "freezer.freeze_time_factor",
                format!("{factor} (must be in [0, 1])"),
            ));
        }
        self.config.freeze_time_factor = factor;
        Ok(())
    }

    /// Accumulated time withheld from the wrapped planner (seconds).
    pub const fn time_delay(&self) -> f64 {
        self.time_delay
    }

    /// Signed lag of the measured capture point on the last `compute`, NaN
    /// when the desired capture point was not moving.
    pub const fn distance_from_freeze_line(&self) -> f64 {
        self.distance_from_freeze_line
    }

    /// Whether the last `compute` withheld time.
    pub const fn is_time_frozen(&self) -> bool {
        self.is_time_frozen
    }

    fn reset(&mut self, time: f64) {
        self.time_delay = 0.0;
        self.previous_time = time;
        self.distance_from_freeze_line = f64::NAN;
        self.is_time_frozen = false;
    }

    fn freeze_line_distance(&self, actual_icp: &Point2<f64>) -> f64 {
        let desired = self.inner.desired_icp();
        let direction = desired.velocity;
        let norm = direction.norm();
        if norm <= 0.0 || norm.is_nan() {
            return f64::NAN;
        }
        let direction: Vector2<f64> = direction / norm;
        -direction.dot(&(actual_icp - desired.position))
    }

    fn do_time_freeze_if_needed(&mut self, time: f64, actual_icp: &Point2<f64>) {
        self.is_time_frozen = false;
        self.distance_from_freeze_line = self.freeze_line_distance(actual_icp);
        let dt = if self.previous_time.is_nan() {
            0.0
        } else {
            (time - self.previous_time).max(0.0)
        };
        self.previous_time = time;
        if !self.config.do_time_freezing {
            return;
        }

        let distance = self.distance_from_freeze_line;
        let ending_double_support = self.inner.is_in_double_support()
            && self.inner.time_in_current_state_remaining() < END_OF_DOUBLE_SUPPORT_WINDOW
            && distance > self.config.max_error_to_begin_swing;

        if self.inner.is_done() || ending_double_support {
            self.time_delay += dt;
            self.is_time_frozen = true;
            log::trace!("time frozen, delay {:.3}", self.time_delay);
        } else if distance > self.config.max_allowed_error_without_partial_time_freeze {
            self.time_delay += self.config.freeze_time_factor * dt;
            self.is_time_frozen = true;
            log::trace!(
                "time partially frozen ({distance:.3} m behind), delay {:.3}",
                self.time_delay
            );
        }
    }
}

impl<P: IcpPlanning> IcpPlanning for TimeFreezer<P> {
    fn omega0(&self) -> f64 {
        self.inner.omega0()
    }

    fn set_omega0(&mut self, omega0: f64) -> Result<(), ConfigError> {
        self.inner.set_omega0(omega0)
    }

    fn clear_plan(&mut self) {
        self.inner.clear_plan();
    }

    fn add_footstep_to_plan(&mut self, footstep: Footstep, timing: FootstepTiming) {
        self.inner.add_footstep_to_plan(footstep, timing);
    }

    fn set_support_leg(&mut self, side: RobotSide) {
        self.inner.set_support_leg(side);
    }

    fn set_transfer_to_side(&mut self, side: RobotSide) {
        self.inner.set_transfer_to_side(side);
    }

    fn set_desired_icp_state(&mut self, position: Point2<f64>, velocity: Vector2<f64>) {
        self.inner.set_desired_icp_state(position, velocity);
    }

    fn set_initial_com_position(&mut self, com: Option<Point2<f64>>) {
        self.inner.set_initial_com_position(com);
    }

    fn hold_current_icp(&mut self, actual_icp: Point2<f64>) {
        self.inner.hold_current_icp(actual_icp);
    }

    fn initialize_for_standing(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.reset(time);
        self.inner.initialize_for_standing(time, frames)
    }

    fn initialize_for_transfer(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.reset(time);
        self.inner.initialize_for_transfer(time, frames)
    }

    fn initialize_for_single_support(
        &mut self,
        time: f64,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.reset(time);
        self.inner.initialize_for_single_support(time, frames)
    }

    fn update_current_plan(&mut self, frames: &dyn FrameProvider) -> Result<(), FrameError> {
        self.inner.update_current_plan(frames)
    }

    fn compute(
        &mut self,
        time: f64,
        actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.inner.compute(time - self.time_delay, actual_icp, frames)?;
        self.do_time_freeze_if_needed(time, actual_icp);
        Ok(())
    }

    fn update_plan_for_single_support_disturbances(
        &mut self,
        actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        self.inner
            .update_plan_for_single_support_disturbances(actual_icp, frames)
    }

    fn estimate_time_remaining_for_state_under_disturbance(
        &self,
        actual_icp: &Point2<f64>,
        frames: &dyn FrameProvider,
    ) -> Result<f64, FrameError> {
        self.inner
            .estimate_time_remaining_for_state_under_disturbance(actual_icp, frames)
    }

    fn desired_icp(&self) -> &IcpSample {
        self.inner.desired_icp()
    }

    fn desired_cmp_position(&self) -> Point2<f64> {
        self.inner.desired_cmp_position()
    }

    fn desired_cmp_velocity(&self) -> Vector2<f64> {
        self.inner.desired_cmp_velocity()
    }

    fn desired_com_position(&self) -> Option<Point2<f64>> {
        self.inner.desired_com_position()
    }

    fn final_desired_icp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError> {
        self.inner.final_desired_icp(frames)
    }

    fn single_support_initial_icp(
        &self,
        frames: &dyn FrameProvider,
    ) -> Result<Point2<f64>, FrameError> {
        self.inner.single_support_initial_icp(frames)
    }

    fn next_entry_cmp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError> {
        self.inner.next_entry_cmp(frames)
    }

    fn next_exit_cmp(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError> {
        self.inner.next_exit_cmp(frames)
    }

    fn time_in_current_state(&self) -> f64 {
        self.inner.time_in_current_state()
    }

    fn time_in_current_state_remaining(&self) -> f64 {
        self.inner.time_in_current_state_remaining()
    }

    fn current_state_duration(&self) -> f64 {
        self.inner.current_state_duration()
    }

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    fn is_in_double_support(&self) -> bool {
        self.inner.is_in_double_support()
    }

    fn is_in_standing(&self) -> bool {
        self.inner.is_in_standing()
    }

    fn is_in_initial_transfer(&self) -> bool {
        self.inner.is_in_initial_transfer()
    }

    fn is_on_exit_cmp(&self) -> bool {
        self.inner.is_on_exit_cmp()
    }

    fn is_done_walking(&self) -> bool {
        self.inner.is_done_walking()
    }

    fn is_holding_position(&self) -> bool {
        self.inner.is_holding_position()
    }
}
