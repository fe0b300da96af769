//! Proportional-integral ICP feedback.
//!
//! The capture point diverges from the CMP: `xi' = w0 (xi - cmp)`. Placing
//! the CMP at `cmp_ref + K e`, with `e = xi - xi_d`, gives error dynamics
//! `e' = w0 (I - K) e`, which converge for gains above one.
//!
//! `K` is expressed in a basis aligned with the planned ICP motion so that
//! errors along the motion and across it can be corrected at different
//! rates. The integral term decays every tick (bleed-off) and is clamped.

use nalgebra::{Matrix2, Point2, Vector2};
use strider_core::config::FeedbackConfig;
use strider_core::{ConfigError, RobotSide};

use crate::capture_point::IcpSample;

/// Below this planned ICP speed the gain matrix is isotropic.
const MIN_MOTION_SPEED: f64 = 1e-3;

/// Gain matrix aligned with `desired_velocity`.
///
/// When the planned ICP is (nearly) at rest there is no motion direction and
/// the orthogonal gain is applied on both axes.
pub fn motion_aligned_gains(
    kp_parallel: f64,
    kp_orthogonal: f64,
    desired_velocity: &Vector2<f64>,
) -> Matrix2<f64> {
    let speed = desired_velocity.norm();
    if !speed.is_finite() || speed < MIN_MOTION_SPEED {
        return Matrix2::identity() * kp_orthogonal;
    }
    let direction = desired_velocity / speed;
    let along = direction * direction.transpose();
    along * kp_parallel + (Matrix2::identity() - along) * kp_orthogonal
}

/// ICP feedback law producing an unprojected desired CMP.
#[derive(Debug, Clone)]
pub struct IcpProportionalController {
    config: FeedbackConfig,
    integral: Vector2<f64>,
    feedback: Vector2<f64>,
    support_side: Option<RobotSide>,
}

impl IcpProportionalController {
    pub fn new(config: FeedbackConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            integral: Vector2::zeros(),
            feedback: Vector2::zeros(),
            support_side: None,
        })
    }

    pub const fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    /// Update the gains. Nothing changes when any value is rejected.
    pub fn set_gains(
        &mut self,
        kp_parallel: f64,
        kp_orthogonal: f64,
        ki: f64,
        ki_bleed_off: f64,
    ) -> Result<(), ConfigError> {
        let config = FeedbackConfig {
            kp_parallel,
            kp_orthogonal,
            ki,
            ki_bleed_off,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Integrated ICP error (m·s).
    pub const fn integral(&self) -> Vector2<f64> {
        self.integral
    }

    /// CMP offset added to the reference on the last call.
    pub const fn feedback(&self) -> Vector2<f64> {
        self.feedback
    }

    pub fn reset(&mut self) {
        self.integral = Vector2::zeros();
        self.feedback = Vector2::zeros();
        self.support_side = None;
    }

    /// Gain matrix for the current planned ICP velocity.
    pub fn gain_matrix(&self, desired_velocity: &Vector2<f64>) -> Matrix2<f64> {
        motion_aligned_gains(
            self.config.kp_parallel,
            self.config.kp_orthogonal,
            desired_velocity,
        )
    }

    /// Desired CMP for one control tick.
    ///
    /// `support_side` is the current support leg (`None` in double support);
    /// a change resets the integral. `integrate` is false while the CMP
    /// projector is active so the integral does not wind up against the
    /// polygon edge.
    pub fn compute(
        &mut self,
        desired_icp: &IcpSample,
        reference_cmp: &Point2<f64>,
        actual_icp: &Point2<f64>,
        support_side: Option<RobotSide>,
        integrate: bool,
    ) -> Point2<f64> {
        if support_side != self.support_side {
            self.integral = Vector2::zeros();
            self.support_side = support_side;
        }

        let error = actual_icp - desired_icp.position;
        if integrate && self.config.ki > 0.0 {
            self.integral =
                self.integral * self.config.ki_bleed_off + error * self.config.control_dt;
            let norm = self.integral.norm();
            if norm > self.config.max_integral_error {
                self.integral *= self.config.max_integral_error / norm;
            }
        }

        self.feedback =
            self.gain_matrix(&desired_icp.velocity) * error + self.integral * self.config.ki;
        reference_cmp + self.feedback
    }
}
