//! Momentum-rate command from the capture point error.
//!
//! Each tick:
//!
//! 1. The selected strategy turns the ICP error into an unprojected desired
//!    CMP (proportional-integral law, QP with footstep adjustment, or the
//!    proportional law plus a CoP offset from angular momentum).
//! 2. The CMP is projected into the support polygon.
//! 3. A NaN CMP is replaced by the measured ICP.
//! 4. The pendulum force relation gives the linear momentum rate:
//!
//! ```text
//! Fz    = m (g + z_ddot)
//! F_xy  = m w0^2 (com_xy - cmp)
//! p_dot = F - m g z
//! ```

use nalgebra::{Point2, Point3, Vector2, Vector3};
use strider_core::config::MomentumStrategyKind;
use strider_core::{ConfigError, ConvexPolygon2, RobotSide, StriderConfig};

use crate::capture_point::IcpSample;
use crate::feedback::IcpProportionalController;
use crate::optimization::{CmpOptimizationController, CmpOptimizationInput, CmpOptimizationSolution};
use crate::projector::SmartCmpProjector;

/// Largest CMP/CoP offset produced from angular momentum (m).
const MAX_CMP_COP_OFFSET: f64 = 0.02;

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

/// Which momentum components the whole-body solver should track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentumSelection {
    pub angular: [bool; 3],
    pub linear: [bool; 3],
}

impl MomentumSelection {
    pub const fn from_flags(
        control_height_with_momentum: bool,
        minimize_angular_momentum_rate_z: bool,
    ) -> Self {
        Self {
            angular: [false, false, minimize_angular_momentum_rate_z],
            linear: [true, true, control_height_with_momentum],
        }
    }
}

/// Centroidal momentum rate objective, world frame, about the CoM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumRateCommand {
    /// Rate of change of linear momentum with gravity removed (N).
    pub linear: Vector3<f64>,
    /// Rate of change of angular momentum (N·m).
    pub angular: Vector3<f64>,
    pub selection: MomentumSelection,
    pub linear_weight: Vector3<f64>,
    pub angular_weight: Vector3<f64>,
}

impl Default for MomentumRateCommand {
    fn default() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
            selection: MomentumSelection::from_flags(true, true),
            linear_weight: Vector3::zeros(),
            angular_weight: Vector3::zeros(),
        }
    }
}

/// Rotational state used by the angular-momentum-aware strategy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngularState {
    /// Centroidal angular momentum, world frame.
    pub angular_momentum: Vector3<f64>,
    /// Pelvis orientation error as a rotation vector (axis times angle), world frame.
    pub pelvis_rotation_error: Vector3<f64>,
    /// Desired minus actual pelvis yaw (rad).
    pub yaw_error: f64,
    /// Desired minus actual pelvis yaw rate (rad/s).
    pub yaw_rate_error: f64,
}

/// Per-tick inputs of the momentum controller.
#[derive(Debug, Clone, Copy)]
pub struct MomentumControlInput<'a> {
    pub desired_icp: &'a IcpSample,
    /// Feedforward CMP from the planner.
    pub reference_cmp: Point2<f64>,
    pub actual_icp: Point2<f64>,
    pub center_of_mass: Point3<f64>,
    pub support_polygon: &'a ConvexPolygon2,
    /// Support leg in single support, `None` in double support.
    pub support_side: Option<RobotSide>,
    /// Time until touchdown, `None` in double support.
    pub time_remaining_in_swing: Option<f64>,
    pub desired_com_height_acceleration: f64,
    pub angular: AngularState,
}

// ---------------------------------------------------------------------------
// MomentumController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum CmpStrategy {
    Feedback(IcpProportionalController),
    /// The only strategy that allocates per tick: the QP matrices and the
    /// Clarabel solver are rebuilt on every call.
    Optimization(CmpOptimizationController),
    AngularMomentumAware(IcpProportionalController),
}

/// Linear momentum rate controller driven by the ICP error.
#[derive(Debug, Clone)]
pub struct MomentumController {
    mass: f64,
    gravity: f64,
    omega0: f64,
    strategy: CmpStrategy,
    projector: SmartCmpProjector,
    keep_cmp_inside_support_polygon: bool,
    control_height_with_momentum: bool,
    minimize_angular_momentum_rate_z: bool,
    default_linear_weight: Vector3<f64>,
    high_linear_weight: Vector3<f64>,
    angular_weight: Vector3<f64>,
    use_high_weight: bool,
    k_angular_momentum_xy: f64,
    k_pelvis_axis_angle: f64,
    kp_yaw: f64,
    kd_yaw: f64,
    nan_cmp_reported: bool,
    unprojected_cmp: Point2<f64>,
    desired_cmp: Point2<f64>,
    desired_cop: Point2<f64>,
    command: MomentumRateCommand,
}

impl MomentumController {
    pub fn new(config: &StriderConfig, omega0: f64) -> Result<Self, ConfigError> {
        let momentum = &config.momentum;
        momentum.validate()?;
        let strategy = match momentum.strategy {
            MomentumStrategyKind::IcpFeedback => {
                CmpStrategy::Feedback(IcpProportionalController::new(config.feedback.clone())?)
            }
            MomentumStrategyKind::Optimization => {
                CmpStrategy::Optimization(CmpOptimizationController::new(
                    config.optimization.clone(),
                    config.feedback.clone(),
                    momentum.keep_cmp_inside_support_polygon,
                    omega0,
                )?)
            }
            MomentumStrategyKind::AngularMomentumAware => CmpStrategy::AngularMomentumAware(
                IcpProportionalController::new(config.feedback.clone())?,
            ),
        };

        let mut controller = Self {
            mass: momentum.mass,
            gravity: momentum.gravity,
            omega0: 0.0,
            strategy,
            projector: SmartCmpProjector::new(momentum.projector_safe_margin)?,
            keep_cmp_inside_support_polygon: momentum.keep_cmp_inside_support_polygon,
            control_height_with_momentum: momentum.control_height_with_momentum,
            minimize_angular_momentum_rate_z: momentum.minimize_angular_momentum_rate_z,
            default_linear_weight: Vector3::from(momentum.linear_momentum_weight),
            high_linear_weight: Vector3::from(momentum.high_linear_momentum_weight),
            angular_weight: Vector3::from(momentum.angular_momentum_weight),
            use_high_weight: false,
            k_angular_momentum_xy: momentum.k_angular_momentum_xy,
            k_pelvis_axis_angle: momentum.k_pelvis_axis_angle,
            kp_yaw: momentum.kp_yaw,
            kd_yaw: momentum.kd_yaw,
            nan_cmp_reported: false,
            unprojected_cmp: Point2::origin(),
            desired_cmp: Point2::origin(),
            desired_cop: Point2::origin(),
            command: MomentumRateCommand::default(),
        };
        controller.set_omega0(omega0)?;
        Ok(controller)
    }

    pub fn strategy_kind(&self) -> MomentumStrategyKind {
        match self.strategy {
            CmpStrategy::Feedback(_) => MomentumStrategyKind::IcpFeedback,
            CmpStrategy::Optimization(_) => MomentumStrategyKind::Optimization,
            CmpStrategy::AngularMomentumAware(_) => MomentumStrategyKind::AngularMomentumAware,
        }
    }

    pub const fn omega0(&self) -> f64 {
        self.omega0
    }

    pub fn set_omega0(&mut self, omega0: f64) -> Result<(), ConfigError> {
        if !omega0.is_finite() || omega0 <= 0.0 {
            return Err(ConfigError::InvalidOmega0(omega0));
        }
        if let CmpStrategy::Optimization(optimizer) = &mut self.strategy {
            optimizer.set_omega0(omega0)?;
        }
        self.omega0 = omega0;
        Ok(())
    }

    pub const fn mass(&self) -> f64 {
        self.mass
    }

    pub const fn gravity(&self) -> f64 {
        self.gravity
    }

    pub fn set_keep_cmp_inside_support_polygon(&mut self, keep_inside: bool) {
        self.keep_cmp_inside_support_polygon = keep_inside;
        if let CmpStrategy::Optimization(optimizer) = &mut self.strategy {
            optimizer.set_keep_cmp_inside_support_polygon(keep_inside);
        }
    }

    pub fn set_control_height_with_momentum(&mut self, enable: bool) {
        self.control_height_with_momentum = enable;
    }

    pub fn set_minimize_angular_momentum_rate_z(&mut self, enable: bool) {
        self.minimize_angular_momentum_rate_z = enable;
    }

    /// Track the linear momentum rate with the recovery weight.
    pub fn set_high_momentum_weight(&mut self) {
        self.use_high_weight = true;
    }

    pub fn set_default_momentum_weight(&mut self) {
        self.use_high_weight = false;
    }

    pub const fn is_using_high_momentum_weight(&self) -> bool {
        self.use_high_weight
    }

    /// Clear the integral term, the projector state and the QP warm start.
    pub fn reset(&mut self) {
        match &mut self.strategy {
            CmpStrategy::Feedback(pi) | CmpStrategy::AngularMomentumAware(pi) => pi.reset(),
            CmpStrategy::Optimization(optimizer) => optimizer.reset(),
        }
        self.projector.reset();
    }

    pub const fn projector(&self) -> &SmartCmpProjector {
        &self.projector
    }

    pub const fn command(&self) -> &MomentumRateCommand {
        &self.command
    }

    /// Desired CMP after projection and NaN substitution.
    pub const fn desired_cmp(&self) -> Point2<f64> {
        self.desired_cmp
    }

    pub const fn unprojected_desired_cmp(&self) -> Point2<f64> {
        self.unprojected_cmp
    }

    /// Desired CoP; equal to the CMP unless angular momentum offsets it.
    pub const fn desired_cop(&self) -> Point2<f64> {
        self.desired_cop
    }

    /// True while a NaN desired CMP is being replaced by the measured ICP.
    pub const fn is_substituting_nan_cmp(&self) -> bool {
        self.nan_cmp_reported
    }

    /// Last QP solution, when the optimization strategy is selected.
    pub fn optimization_solution(&self) -> Option<&CmpOptimizationSolution> {
        match &self.strategy {
            CmpStrategy::Optimization(optimizer) => Some(optimizer.solution()),
            _ => None,
        }
    }

    pub fn was_footstep_adjusted(&self) -> bool {
        match &self.strategy {
            CmpStrategy::Optimization(optimizer) => optimizer.was_footstep_adjusted(),
            _ => false,
        }
    }

    /// `nominal` moved by the QP footstep adjustment, if any.
    pub fn adjusted_footstep_position(&self, nominal: &Point2<f64>) -> Point2<f64> {
        match &self.strategy {
            CmpStrategy::Optimization(optimizer) => optimizer.adjusted_footstep_position(nominal),
            _ => *nominal,
        }
    }

    /// CoM acceleration implied by the last command.
    pub fn controlled_com_acceleration(&self) -> Vector3<f64> {
        self.command.linear / self.mass
    }

    /// Run one control tick.
    pub fn compute(&mut self, input: &MomentumControlInput<'_>) -> &MomentumRateCommand {
        let integrate = !self.projector.is_active();
        self.unprojected_cmp = match &mut self.strategy {
            CmpStrategy::Feedback(pi) | CmpStrategy::AngularMomentumAware(pi) => pi.compute(
                input.desired_icp,
                &input.reference_cmp,
                &input.actual_icp,
                input.support_side,
                integrate,
            ),
            CmpStrategy::Optimization(optimizer) => {
                optimizer
                    .compute(&CmpOptimizationInput {
                        desired_icp: input.desired_icp,
                        reference_cmp: input.reference_cmp,
                        actual_icp: input.actual_icp,
                        support_polygon: input.support_polygon,
                        time_remaining_in_swing: input.time_remaining_in_swing,
                    })
                    .desired_cmp
            }
        };

        let mut cmp = if self.keep_cmp_inside_support_polygon {
            self.projector.project(&self.unprojected_cmp, input.support_polygon)
        } else {
            self.unprojected_cmp
        };

        if cmp.x.is_nan() || cmp.y.is_nan() {
            if !self.nan_cmp_reported {
                log::warn!(
                    "Desired CMP contains NaN, using the measured ICP instead (reported once)"
                );
            }
            self.nan_cmp_reported = true;
            cmp = input.actual_icp;
        } else {
            self.nan_cmp_reported = false;
        }
        self.desired_cmp = cmp;

        let fz = self.mass * (self.gravity + input.desired_com_height_acceleration);
        let com_xy = input.center_of_mass.xy();
        let force_xy = (com_xy - cmp) * (self.mass * self.omega0 * self.omega0);
        let force = Vector3::new(force_xy.x, force_xy.y, fz);

        let angular = if matches!(self.strategy, CmpStrategy::AngularMomentumAware(_)) {
            self.desired_cop =
                self.cop_from_angular_momentum(&cmp, &input.angular, input.support_polygon);
            self.ground_reaction_moment(&force, &input.center_of_mass, &input.angular)
        } else {
            self.desired_cop = cmp;
            Vector3::zeros()
        };

        let linear_weight = if self.use_high_weight {
            self.high_linear_weight
        } else {
            self.default_linear_weight
        };
        self.command = MomentumRateCommand {
            linear: Vector3::new(force.x, force.y, force.z - self.mass * self.gravity),
            angular,
            selection: MomentumSelection::from_flags(
                self.control_height_with_momentum,
                self.minimize_angular_momentum_rate_z,
            ),
            linear_weight,
            angular_weight: self.angular_weight,
        };
        &self.command
    }

    /// CMP the whole-body solver actually achieved, from its linear momentum
    /// rate. `None` when the rate contains NaN.
    pub fn compute_achieved_cmp(
        &self,
        achieved_linear_momentum_rate: &Vector3<f64>,
        center_of_mass: &Point2<f64>,
    ) -> Option<Point2<f64>> {
        if achieved_linear_momentum_rate.iter().any(|v| v.is_nan()) {
            return None;
        }
        let com_acceleration = achieved_linear_momentum_rate.xy() / self.mass;
        Some(center_of_mass - com_acceleration / (self.omega0 * self.omega0))
    }

    fn cop_from_angular_momentum(
        &self,
        cmp: &Point2<f64>,
        angular: &AngularState,
        polygon: &ConvexPolygon2,
    ) -> Point2<f64> {
        let z = Vector3::z();
        let momentum_part = -angular.angular_momentum.cross(&z) * self.k_angular_momentum_xy;
        let tilt = Vector3::new(
            angular.pelvis_rotation_error.x,
            angular.pelvis_rotation_error.y,
            0.0,
        );
        let tilt_part = tilt.cross(&z) * self.k_pelvis_axis_angle;
        let mut delta: Vector2<f64> = (momentum_part + tilt_part).xy();
        if delta.iter().any(|v| !v.is_finite()) {
            delta = Vector2::zeros();
        }
        let norm = delta.norm();
        if norm > MAX_CMP_COP_OFFSET {
            delta *= MAX_CMP_COP_OFFSET / norm;
        }

        let cop = cmp - delta;
        if polygon.is_empty() {
            cop
        } else {
            polygon.orthogonal_projection(&cop)
        }
    }

    /// Moment of the ground reaction force applied at the CoP about the CoM,
    /// plus a yaw PD term.
    fn ground_reaction_moment(
        &self,
        force: &Vector3<f64>,
        center_of_mass: &Point3<f64>,
        angular: &AngularState,
    ) -> Vector3<f64> {
        // The force line passes through the pseudo CMP, w0^-2 Fz / m below the CoM.
        let depth = force.z / (self.mass * self.omega0 * self.omega0);
        let arm = Vector3::new(
            self.desired_cop.x - center_of_mass.x,
            self.desired_cop.y - center_of_mass.y,
            -depth,
        );
        let yaw = self.kp_yaw * angular.yaw_error + self.kd_yaw * angular.yaw_rate_error;
        let yaw = if yaw.is_finite() { yaw } else { 0.0 };
        arm.cross(force) + Vector3::new(0.0, 0.0, yaw)
    }
}
