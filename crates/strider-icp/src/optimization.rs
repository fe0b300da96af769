//! QP-based CMP feedback with next-footstep adjustment.
//!
//! Uses Clarabel to trade CMP feedback against moving the upcoming footstep
//! when the CMP alone cannot correct the ICP error inside the support
//! polygon.
//!
//! # QP Formulation
//!
//! Decision variables: `z = [dc, ds, sigma]`, each planar, where `dc` is the
//! CMP feedback, `ds` the footstep adjustment and `sigma` a dynamics slack.
//!
//! Cost:
//!
//! ```text
//! w_fb |dc|^2 + w_step |ds|^2 + w_slack |sigma|^2
//!     + w_reg (|dc - dc_prev|^2 + |ds - ds_prev|^2)
//! ```
//!
//! Subject to:
//! - Dynamics: `dc + phi G ds + G sigma = G e` with `phi = exp(-w0 T_remaining)`
//!   and `G` the motion-aligned feedback gain matrix (equality)
//! - CMP inside the support polygon: `n_i . (c_ref + dc) <= b_i` (inequality)
//! - Step box: `|ds_x|, |ds_y| <= max_step_adjustment` (inequality)
//! - No adjustment in double support: `ds = 0` (equality)
//!
//! With step adjustment disabled and a heavy slack weight the solution is
//! the proportional law `dc = G e`.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector, Matrix2, Point2, Vector2};
use strider_core::config::{FeedbackConfig, OptimizationConfig};
use strider_core::{ConfigError, ConvexPolygon2, SolverError};

use crate::capture_point::IcpSample;
use crate::feedback::motion_aligned_gains;

const N_VARS: usize = 6;
const CMP: usize = 0;
const STEP: usize = 2;
const SLACK: usize = 4;

/// Per-tick inputs of the optimization.
#[derive(Debug, Clone, Copy)]
pub struct CmpOptimizationInput<'a> {
    pub desired_icp: &'a IcpSample,
    /// Feedforward CMP the feedback is added to.
    pub reference_cmp: Point2<f64>,
    pub actual_icp: Point2<f64>,
    pub support_polygon: &'a ConvexPolygon2,
    /// Time left until touchdown; `None` in double support.
    pub time_remaining_in_swing: Option<f64>,
}

/// Result of one optimization tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmpOptimizationSolution {
    pub desired_cmp: Point2<f64>,
    pub cmp_feedback: Vector2<f64>,
    pub footstep_adjustment: Vector2<f64>,
    pub dynamic_relaxation: Vector2<f64>,
    /// False when the solver failed and the proportional law was used.
    pub converged: bool,
}

impl Default for CmpOptimizationSolution {
    fn default() -> Self {
        Self {
            desired_cmp: Point2::origin(),
            cmp_feedback: Vector2::zeros(),
            footstep_adjustment: Vector2::zeros(),
            dynamic_relaxation: Vector2::zeros(),
            converged: true,
        }
    }
}

/// CMP feedback and footstep adjustment controller.
#[derive(Debug, Clone)]
pub struct CmpOptimizationController {
    config: OptimizationConfig,
    gains: FeedbackConfig,
    keep_cmp_inside_support_polygon: bool,
    omega0: f64,
    solution: CmpOptimizationSolution,
}

impl CmpOptimizationController {
    pub fn new(
        config: OptimizationConfig,
        gains: FeedbackConfig,
        keep_cmp_inside_support_polygon: bool,
        omega0: f64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        gains.validate()?;
        let mut controller = Self {
            config,
            gains,
            keep_cmp_inside_support_polygon,
            omega0: 0.0,
            solution: CmpOptimizationSolution::default(),
        };
        controller.set_omega0(omega0)?;
        Ok(controller)
    }

    pub const fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    pub fn set_omega0(&mut self, omega0: f64) -> Result<(), ConfigError> {
        if !omega0.is_finite() || omega0 <= 0.0 {
            return Err(ConfigError::InvalidOmega0(omega0));
        }
        self.omega0 = omega0;
        Ok(())
    }

    pub fn set_use_step_adjustment(&mut self, use_step_adjustment: bool) {
        self.config.use_step_adjustment = use_step_adjustment;
    }

    pub fn set_keep_cmp_inside_support_polygon(&mut self, keep_inside: bool) {
        self.keep_cmp_inside_support_polygon = keep_inside;
    }

    pub const fn solution(&self) -> &CmpOptimizationSolution {
        &self.solution
    }

    pub fn was_footstep_adjusted(&self) -> bool {
        self.solution.footstep_adjustment.norm() > self.config.footstep_adjusted_threshold
    }

    /// `nominal` moved by the current adjustment.
    pub fn adjusted_footstep_position(&self, nominal: &Point2<f64>) -> Point2<f64> {
        nominal + self.solution.footstep_adjustment
    }

    /// Forget the previous solution used by the regularization.
    pub fn reset(&mut self) {
        self.solution = CmpOptimizationSolution::default();
    }

    /// Solve one tick. Falls back to the proportional law on solver failure.
    pub fn compute(&mut self, input: &CmpOptimizationInput<'_>) -> &CmpOptimizationSolution {
        let error = input.actual_icp - input.desired_icp.position;
        let gains = motion_aligned_gains(
            self.gains.kp_parallel,
            self.gains.kp_orthogonal,
            &input.desired_icp.velocity,
        );

        self.solution = match self.solve(input, &gains, &error) {
            Ok(solution) => solution,
            Err(err) => {
                log::warn!("CMP optimization failed, using proportional feedback: {err}");
                let feedback = gains * error;
                CmpOptimizationSolution {
                    desired_cmp: input.reference_cmp + feedback,
                    cmp_feedback: feedback,
                    footstep_adjustment: Vector2::zeros(),
                    dynamic_relaxation: Vector2::zeros(),
                    converged: false,
                }
            }
        };
        &self.solution
    }

    fn solve(
        &self,
        input: &CmpOptimizationInput<'_>,
        gains: &Matrix2<f64>,
        error: &Vector2<f64>,
    ) -> Result<CmpOptimizationSolution, SolverError> {
        if !error.iter().all(|v| v.is_finite())
            || !input.reference_cmp.iter().all(|v| v.is_finite())
            || !gains.iter().all(|v| v.is_finite())
        {
            return Err(SolverError::Setup("non-finite problem data".into()));
        }

        let adjust_step = self.config.use_step_adjustment
            && input.time_remaining_in_swing.is_some();
        let phi = input
            .time_remaining_in_swing
            .map_or(0.0, |t| (-self.omega0 * t.max(0.0)).exp());

        let (p_diag, q) = self.build_cost();
        let (a_all, b_all, n_eq, n_ineq) =
            self.build_constraints(input, gains, error, phi, adjust_step);

        let p_csc = diagonal_csc(&p_diag);
        let a_csc = dense_csc(&a_all);
        let mut cones = vec![ZeroConeT(n_eq)];
        if n_ineq > 0 {
            cones.push(NonnegativeConeT(n_ineq));
        }

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.config.max_solver_iters)
            .verbose(false)
            .build()
            .map_err(|e| SolverError::Setup(format!("{e:?}")))?;

        let mut solver =
            DefaultSolver::new(&p_csc, &q, &a_csc, b_all.as_slice(), &cones, settings)
                .map_err(|e| SolverError::Setup(format!("{e:?}")))?;
        solver.solve();

        let sol = &solver.solution;
        if !matches!(sol.status, SolverStatus::Solved | SolverStatus::AlmostSolved) {
            return Err(SolverError::NotConverged(format!("{:?}", sol.status)));
        }

        let cmp_feedback = Vector2::new(sol.x[CMP], sol.x[CMP + 1]);
        let footstep_adjustment = if adjust_step {
            Vector2::new(sol.x[STEP], sol.x[STEP + 1])
        } else {
            Vector2::zeros()
        };
        Ok(CmpOptimizationSolution {
            desired_cmp: input.reference_cmp + cmp_feedback,
            cmp_feedback,
            footstep_adjustment,
            dynamic_relaxation: Vector2::new(sol.x[SLACK], sol.x[SLACK + 1]),
            converged: true,
        })
    }

    /// Cost in Clarabel's `1/2 z^T P z + q^T z` form. `P` is diagonal and
    /// returned as its diagonal.
    fn build_cost(&self) -> ([f64; N_VARS], [f64; N_VARS]) {
        let c = &self.config;
        let mut p_diag = [0.0; N_VARS];
        let mut q = [0.0; N_VARS];
        let previous_cmp = self.solution.cmp_feedback;
        let previous_step = self.solution.footstep_adjustment;
        for axis in 0..2 {
            p_diag[CMP + axis] = 2.0 * (c.feedback_weight + c.regularization_weight);
            p_diag[STEP + axis] = 2.0 * (c.footstep_weight + c.regularization_weight);
            p_diag[SLACK + axis] = 2.0 * c.dynamic_relaxation_weight;
            q[CMP + axis] = -2.0 * c.regularization_weight * previous_cmp[axis];
            q[STEP + axis] = -2.0 * c.regularization_weight * previous_step[axis];
        }
        (p_diag, q)
    }

    /// Stacked `A z + s = b`: equalities first, then inequalities.
    fn build_constraints(
        &self,
        input: &CmpOptimizationInput<'_>,
        gains: &Matrix2<f64>,
        error: &Vector2<f64>,
        phi: f64,
        adjust_step: bool,
    ) -> (DMatrix<f64>, DVector<f64>, usize, usize) {
        let keep_inside =
            self.keep_cmp_inside_support_polygon && input.support_polygon.len() >= 3;
        let half_planes = if keep_inside {
            input.support_polygon.half_planes()
        } else {
            Vec::new()
        };

        let n_eq = if adjust_step { 2 } else { 4 };
        let n_ineq = half_planes.len() + if adjust_step { 4 } else { 0 };
        let mut a_all = DMatrix::zeros(n_eq + n_ineq, N_VARS);
        let mut b_all = DVector::zeros(n_eq + n_ineq);

        // Dynamics
        let target = gains * error;
        let step_gain = gains * phi;
        for row in 0..2 {
            a_all[(row, CMP + row)] = 1.0;
            for col in 0..2 {
                a_all[(row, STEP + col)] = step_gain[(row, col)];
                a_all[(row, SLACK + col)] = gains[(row, col)];
            }
            b_all[row] = target[row];
        }
        let mut row = 2;

        if !adjust_step {
            for axis in 0..2 {
                a_all[(row, STEP + axis)] = 1.0;
                row += 1;
            }
        }

        for (normal, offset) in &half_planes {
            a_all[(row, CMP)] = normal.x;
            a_all[(row, CMP + 1)] = normal.y;
            b_all[row] = offset - normal.dot(&input.reference_cmp.coords);
            row += 1;
        }

        if adjust_step {
            for axis in 0..2 {
                for sign in [1.0, -1.0] {
                    a_all[(row, STEP + axis)] = sign;
                    b_all[row] = self.config.max_step_adjustment;
                    row += 1;
                }
            }
        }

        (a_all, b_all, n_eq, n_ineq)
    }
}

/// Diagonal cost matrix. Every diagonal entry is stored, zeros included,
/// so the sparsity pattern does not depend on the weights.
fn diagonal_csc(diagonal: &[f64; N_VARS]) -> CscMatrix<f64> {
    CscMatrix::new(
        N_VARS,
        N_VARS,
        (0..=N_VARS).collect(),
        (0..N_VARS).collect(),
        diagonal.to_vec(),
    )
}

/// Constraint matrix in compressed columns, structural zeros dropped.
fn dense_csc(a: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(a.ncols() + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for column in a.column_iter() {
        for (row, value) in column.iter().enumerate() {
            if value.abs() > 0.0 {
                rowval.push(row);
                nzval.push(*value);
            }
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(a.nrows(), a.ncols(), colptr, rowval, nzval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn controller(use_step_adjustment: bool) -> CmpOptimizationController {
        CmpOptimizationController::new(
            OptimizationConfig {
                use_step_adjustment,
                regularization_weight: 0.0,
                ..OptimizationConfig::default()
            },
            FeedbackConfig::default(),
            true,
            3.0,
        )
        .unwrap()
    }

    fn forward_motion() -> IcpSample {
        IcpSample {
            position: Point2::new(0.0, 0.0),
            velocity: Vector2::new(0.2, 0.0),
            acceleration: Vector2::zeros(),
        }
    }

    #[test]
    fn unconstrained_solution_is_proportional_law() {
        let mut c = controller(false);
        let polygon = ConvexPolygon2::rectangle(Point2::origin(), 1.0, 1.0);
        let desired = forward_motion();
        let input = CmpOptimizationInput {
            desired_icp: &desired,
            reference_cmp: Point2::origin(),
            actual_icp: Point2::new(0.02, 0.01),
            support_polygon: &polygon,
            time_remaining_in_swing: None,
        };
        let solution = *c.compute(&input);
        assert!(solution.converged);
        // kp_parallel 2.5 along x, kp_orthogonal 1.5 along y.
        assert_relative_eq!(solution.desired_cmp, Point2::new(0.05, 0.015), epsilon = 1e-4);
        assert_relative_eq!(solution.footstep_adjustment, Vector2::zeros());
        assert!(!c.was_footstep_adjusted());
    }

    #[test]
    fn cmp_stays_inside_support_polygon() {
        let mut c = controller(false);
        let polygon = ConvexPolygon2::rectangle(Point2::origin(), 0.2, 0.1);
        let desired = forward_motion();
        let input = CmpOptimizationInput {
            desired_icp: &desired,
            reference_cmp: Point2::origin(),
            actual_icp: Point2::new(0.1, 0.0),
            support_polygon: &polygon,
            time_remaining_in_swing: None,
        };
        let solution = *c.compute(&input);
        assert!(solution.converged);
        assert!(solution.desired_cmp.x <= 0.1 + 1e-6);
        assert!(solution.desired_cmp.x > 0.09);
        assert!(solution.dynamic_relaxation.x > 0.0);
    }

    #[test]
    fn large_error_in_swing_moves_the_footstep() {
        let mut c = controller(true);
        let polygon = ConvexPolygon2::rectangle(Point2::origin(), 0.2, 0.1);
        let desired = forward_motion();
        let input = CmpOptimizationInput {
            desired_icp: &desired,
            reference_cmp: Point2::origin(),
            actual_icp: Point2::new(0.1, 0.0),
            support_polygon: &polygon,
            time_remaining_in_swing: Some(0.3),
        };
        let solution = *c.compute(&input);
        assert!(solution.converged);
        assert!(solution.footstep_adjustment.x > 0.0);
        assert!(solution.footstep_adjustment.x <= 0.1 + 1e-6);
        assert!(c.was_footstep_adjusted());
        let nominal = Point2::new(0.4, 0.1);
        assert_relative_eq!(
            c.adjusted_footstep_position(&nominal),
            nominal + solution.footstep_adjustment
        );
    }

    #[test]
    fn double_support_never_adjusts() {
        let mut c = controller(true);
        let polygon = ConvexPolygon2::rectangle(Point2::origin(), 0.2, 0.1);
        let desired = forward_motion();
        let input = CmpOptimizationInput {
            desired_icp: &desired,
            reference_cmp: Point2::origin(),
            actual_icp: Point2::new(0.1, 0.0),
            support_polygon: &polygon,
            time_remaining_in_swing: None,
        };
        let solution = *c.compute(&input);
        assert_eq!(solution.footstep_adjustment, Vector2::zeros());
        assert!(!c.was_footstep_adjusted());
    }

    #[test]
    fn solver_failure_falls_back_to_proportional_law() {
        let mut c = CmpOptimizationController::new(
            OptimizationConfig {
                max_solver_iters: 1,
                ..OptimizationConfig::default()
            },
            FeedbackConfig::default(),
            true,
            3.0,
        )
        .unwrap();
        let polygon = ConvexPolygon2::rectangle(Point2::origin(), 0.2, 0.1);
        let desired = forward_motion();
        let input = CmpOptimizationInput {
            desired_icp: &desired,
            reference_cmp: Point2::origin(),
            actual_icp: Point2::new(0.1, 0.0),
            support_polygon: &polygon,
            time_remaining_in_swing: Some(0.3),
        };
        let solution = *c.compute(&input);
        assert!(!solution.converged);
        assert_relative_eq!(solution.desired_cmp, Point2::new(0.25, 0.0), epsilon = 1e-12);
        assert_eq!(solution.footstep_adjustment, Vector2::zeros());
    }

    #[test]
    fn nan_error_is_a_setup_failure() {
        let mut c = controller(true);
        let polygon = ConvexPolygon2::rectangle(Point2::origin(), 0.2, 0.1);
        let desired = forward_motion();
        let input = CmpOptimizationInput {
            desired_icp: &desired,
            reference_cmp: Point2::origin(),
            actual_icp: Point2::new(f64::NAN, 0.0),
            support_polygon: &polygon,
            time_remaining_in_swing: None,
        };
        assert!(!c.compute(&input).converged);
    }

    #[test]
    fn sparse_matrices_match_dense_layout() {
        let p = diagonal_csc(&[1.0, 2.0, 0.0, 0.0, 5.0, 6.0]);
        assert_eq!(p.colptr, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(p.rowval, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(p.nzval[4], 5.0);

        let a = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, -2.0, 0.0, 0.0, 3.0]);
        let csc = dense_csc(&a);
        assert_eq!(csc.colptr, vec![0, 1, 1, 3]);
        assert_eq!(csc.rowval, vec![0, 0, 1]);
        assert_eq!(csc.nzval, vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn invalid_omega0_rejected() {
        let mut c = controller(false);
        assert!(matches!(c.set_omega0(0.0), Err(ConfigError::InvalidOmega0(_))));
        assert!(c.set_omega0(3.5).is_ok());
    }
}
