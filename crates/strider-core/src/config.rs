use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_true() -> bool {
    true
}
const fn default_footsteps_to_consider() -> usize {
    3
}
const fn default_half() -> f64 {
    0.5
}
const fn default_final_transfer_time() -> f64 {
    1.0
}
const fn default_min_swing_time() -> f64 {
    0.3
}
const fn default_cmp_inside_offset() -> f64 {
    0.006
}
const fn default_min_forward_cmp_offset() -> f64 {
    -0.04
}
const fn default_max_forward_cmp_offset() -> f64 {
    0.06
}
const fn default_safe_distance_from_support_edges() -> f64 {
    0.03
}
const fn default_max_spline_duration() -> f64 {
    0.5
}
const fn default_min_time_on_exit_cmp() -> f64 {
    0.1
}
const fn default_freeze_time_factor() -> f64 {
    0.9
}
const fn default_max_error_without_partial_freeze() -> f64 {
    0.03
}
const fn default_max_error_to_begin_swing() -> f64 {
    0.1
}
const fn default_kp_parallel() -> f64 {
    2.5
}
const fn default_kp_orthogonal() -> f64 {
    1.5
}
const fn default_ki_bleed_off() -> f64 {
    0.9
}
const fn default_max_integral_error() -> f64 {
    0.05
}
const fn default_control_dt() -> f64 {
    0.004
}
const fn default_projector_safe_margin() -> f64 {
    0.01
}
const fn default_feedback_weight() -> f64 {
    1.0
}
const fn default_footstep_weight() -> f64 {
    20.0
}
const fn default_slack_weight() -> f64 {
    1.0e4
}
const fn default_regularization_weight() -> f64 {
    1.0e-3
}
const fn default_max_step_adjustment() -> f64 {
    0.1
}
const fn default_footstep_adjusted_threshold() -> f64 {
    1.0e-3
}
const fn default_max_solver_iters() -> u32 {
    100
}
const fn default_mass() -> f64 {
    30.0
}
const fn default_gravity() -> f64 {
    9.81
}
const fn default_linear_momentum_weight() -> [f64; 3] {
    [0.05, 0.05, 0.01]
}
const fn default_high_linear_momentum_weight() -> [f64; 3] {
    [0.5, 0.5, 0.01]
}
const fn default_angular_momentum_weight() -> [f64; 3] {
    [0.0, 0.0, 0.01]
}
const fn default_k_angular_momentum_xy() -> f64 {
    0.2
}
const fn default_k_pelvis_axis_angle() -> f64 {
    1.0
}
const fn default_kp_yaw() -> f64 {
    10.0
}
const fn default_kd_yaw() -> f64 {
    1.0
}
const fn default_max_icp_error_x() -> f64 {
    0.035
}
const fn default_max_icp_error_y() -> f64 {
    0.015
}
const fn default_safe_distance_to_stop() -> f64 {
    0.05
}
const fn default_hold_shrink_distance() -> f64 {
    0.08
}
const fn default_allowed_icp_error() -> f64 {
    0.015
}

// ---------------------------------------------------------------------------
// StriderConfig
// ---------------------------------------------------------------------------

/// Complete balance controller configuration.
///
/// Every section falls back to its defaults when omitted from the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StriderConfig {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub pivots: PivotConfig,
    #[serde(default)]
    pub segmented: SegmentedConfig,
    #[serde(default)]
    pub freezer: FreezerConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub optimization: OptimizationConfig,
    #[serde(default)]
    pub momentum: MomentumConfig,
    #[serde(default)]
    pub balance: BalanceConfig,
}

impl StriderConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.planner.validate()?;
        self.pivots.validate()?;
        self.segmented.validate()?;
        self.freezer.validate()?;
        self.feedback.validate()?;
        self.optimization.validate()?;
        self.momentum.validate()?;
        self.balance.validate()
    }
}

// ---------------------------------------------------------------------------
// PlannerConfig
// ---------------------------------------------------------------------------

/// ICP planner state machine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Plan window: number of pivot slots (and footstep timings) kept.
    #[serde(default = "default_footsteps_to_consider")]
    pub number_of_footsteps_to_consider: usize,

    /// Use an entry and an exit pivot per support instead of a single one.
    #[serde(default = "default_true")]
    pub use_two_cmps_per_support: bool,

    /// Fraction of each transfer spent before the entry corner point.
    #[serde(default = "default_half")]
    pub transfer_split_fraction: f64,

    /// Fraction of each swing spent on the entry pivot.
    #[serde(default = "default_half")]
    pub swing_split_fraction: f64,

    /// Transfer duration used when coming to a stop (seconds).
    #[serde(default = "default_final_transfer_time")]
    pub final_transfer_time: f64,

    /// Shortest swing the disturbance re-planning may produce (seconds).
    #[serde(default = "default_min_swing_time")]
    pub min_swing_time: f64,

    /// Duration of the linear velocity decay once a phase overruns.
    /// `None` disables the decay.
    #[serde(default)]
    pub velocity_decay_duration_when_done: Option<f64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            number_of_footsteps_to_consider: default_footsteps_to_consider(),
            use_two_cmps_per_support: default_true(),
            transfer_split_fraction: default_half(),
            swing_split_fraction: default_half(),
            final_transfer_time: default_final_transfer_time(),
            min_swing_time: default_min_swing_time(),
            velocity_decay_duration_when_done: None,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.number_of_footsteps_to_consider < 2 {
            return Err(ConfigError::invalid(
                "planner.number_of_footsteps_to_consider",
                format!("{} (must be >= 2)", self.number_of_footsteps_to_consider),
            ));
        }
        check_fraction("planner.transfer_split_fraction", self.transfer_split_fraction)?;
        check_fraction("planner.swing_split_fraction", self.swing_split_fraction)?;
        check_positive("planner.final_transfer_time", self.final_transfer_time)?;
        check_non_negative("planner.min_swing_time", self.min_swing_time)?;
        if let Some(decay) = self.velocity_decay_duration_when_done {
            check_positive("planner.velocity_decay_duration_when_done", decay)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PivotConfig
// ---------------------------------------------------------------------------

/// Reference pivot (entry/exit CMP) placement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotConfig {
    /// Forward offset of the pivot from the foot centroid (single-pivot mode).
    #[serde(default)]
    pub cmp_forward_offset: f64,

    /// Offset towards the inside of the foot, applied per side.
    #[serde(default = "default_cmp_inside_offset")]
    pub cmp_inside_offset: f64,

    /// Smallest forward pivot coordinate in the sole frame.
    #[serde(default = "default_min_forward_cmp_offset")]
    pub min_forward_cmp_offset: f64,

    /// Largest forward pivot coordinate in the sole frame.
    #[serde(default = "default_max_forward_cmp_offset")]
    pub max_forward_cmp_offset: f64,

    /// Margin kept between a pivot and the foot polygon edges.
    #[serde(default = "default_safe_distance_from_support_edges")]
    pub safe_distance_from_support_edges: f64,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            cmp_forward_offset: 0.0,
            cmp_inside_offset: default_cmp_inside_offset(),
            min_forward_cmp_offset: default_min_forward_cmp_offset(),
            max_forward_cmp_offset: default_max_forward_cmp_offset(),
            safe_distance_from_support_edges: default_safe_distance_from_support_edges(),
        }
    }
}

impl PivotConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("pivots.cmp_forward_offset", self.cmp_forward_offset)?;
        check_finite("pivots.cmp_inside_offset", self.cmp_inside_offset)?;
        check_finite("pivots.min_forward_cmp_offset", self.min_forward_cmp_offset)?;
        check_finite("pivots.max_forward_cmp_offset", self.max_forward_cmp_offset)?;
        if self.min_forward_cmp_offset > self.max_forward_cmp_offset {
            return Err(ConfigError::Incompatible(format!(
                "pivots.min_forward_cmp_offset ({}) > pivots.max_forward_cmp_offset ({})",
                self.min_forward_cmp_offset, self.max_forward_cmp_offset
            )));
        }
        check_non_negative(
            "pivots.safe_distance_from_support_edges",
            self.safe_distance_from_support_edges,
        )
    }
}

// ---------------------------------------------------------------------------
// SegmentedConfig
// ---------------------------------------------------------------------------

/// Single-support segmented trajectory settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedConfig {
    /// Longest spline bridging the entry-to-exit pivot switch (seconds).
    #[serde(default = "default_max_spline_duration")]
    pub max_spline_duration: f64,

    /// Minimum time spent on the exit pivot after the spline (seconds).
    #[serde(default = "default_min_time_on_exit_cmp")]
    pub min_time_on_exit_cmp: f64,
}

impl Default for SegmentedConfig {
    fn default() -> Self {
        Self {
            max_spline_duration: default_max_spline_duration(),
            min_time_on_exit_cmp: default_min_time_on_exit_cmp(),
        }
    }
}

impl SegmentedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("segmented.max_spline_duration", self.max_spline_duration)?;
        check_non_negative("segmented.min_time_on_exit_cmp", self.min_time_on_exit_cmp)
    }
}

// ---------------------------------------------------------------------------
// FreezerConfig
// ---------------------------------------------------------------------------

/// Time-freezing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreezerConfig {
    #[serde(default = "default_true")]
    pub do_time_freezing: bool,

    /// Fraction of elapsed time withheld from the plan during a partial freeze.
    #[serde(default = "default_freeze_time_factor")]
    pub freeze_time_factor: f64,

    /// Lag behind the freeze line above which time is partially frozen (m).
    #[serde(default = "default_max_error_without_partial_freeze")]
    pub max_allowed_error_without_partial_time_freeze: f64,

    /// Lag above which the end of double support is fully frozen (m).
    #[serde(default = "default_max_error_to_begin_swing")]
    pub max_error_to_begin_swing: f64,
}

impl Default for FreezerConfig {
    fn default() -> Self {
        Self {
            do_time_freezing: default_true(),
            freeze_time_factor: default_freeze_time_factor(),
            max_allowed_error_without_partial_time_freeze:
                default_max_error_without_partial_freeze(),
            max_error_to_begin_swing: default_max_error_to_begin_swing(),
        }
    }
}

impl FreezerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fraction("freezer.freeze_time_factor", self.freeze_time_factor)?;
        check_non_negative(
            "freezer.max_allowed_error_without_partial_time_freeze",
            self.max_allowed_error_without_partial_time_freeze,
        )?;
        check_non_negative(
            "freezer.max_error_to_begin_swing",
            self.max_error_to_begin_swing,
        )
    }
}

// ---------------------------------------------------------------------------
// FeedbackConfig
// ---------------------------------------------------------------------------

/// ICP proportional-integral feedback gains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Gain along the direction of planned ICP motion.
    #[serde(default = "default_kp_parallel")]
    pub kp_parallel: f64,

    /// Gain orthogonal to the direction of planned ICP motion.
    #[serde(default = "default_kp_orthogonal")]
    pub kp_orthogonal: f64,

    /// Integral gain (0 disables the integral term).
    #[serde(default)]
    pub ki: f64,

    /// Per-tick decay applied to the integrated error, in [0, 1].
    #[serde(default = "default_ki_bleed_off")]
    pub ki_bleed_off: f64,

    /// Clamp on the integrated error magnitude (m·s).
    #[serde(default = "default_max_integral_error")]
    pub max_integral_error: f64,

    /// Control loop period (seconds).
    #[serde(default = "default_control_dt")]
    pub control_dt: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            kp_parallel: default_kp_parallel(),
            kp_orthogonal: default_kp_orthogonal(),
            ki: 0.0,
            ki_bleed_off: default_ki_bleed_off(),
            max_integral_error: default_max_integral_error(),
            control_dt: default_control_dt(),
        }
    }
}

impl FeedbackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("feedback.kp_parallel", self.kp_parallel)?;
        check_non_negative("feedback.kp_orthogonal", self.kp_orthogonal)?;
        check_non_negative("feedback.ki", self.ki)?;
        check_fraction("feedback.ki_bleed_off", self.ki_bleed_off)?;
        check_non_negative("feedback.max_integral_error", self.max_integral_error)?;
        check_positive("feedback.control_dt", self.control_dt)
    }
}

// ---------------------------------------------------------------------------
// OptimizationConfig
// ---------------------------------------------------------------------------

/// Weights for the QP-based CMP and footstep adjustment strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Allow the next footstep to move during single support.
    #[serde(default = "default_true")]
    pub use_step_adjustment: bool,

    #[serde(default = "default_feedback_weight")]
    pub feedback_weight: f64,

    #[serde(default = "default_footstep_weight")]
    pub footstep_weight: f64,

    /// Weight on the dynamics relaxation slack.
    #[serde(default = "default_slack_weight")]
    pub dynamic_relaxation_weight: f64,

    /// Weight on tick-to-tick changes of the solution.
    #[serde(default = "default_regularization_weight")]
    pub regularization_weight: f64,

    /// Largest footstep adjustment per axis (m).
    #[serde(default = "default_max_step_adjustment")]
    pub max_step_adjustment: f64,

    /// Adjustment norm above which the footstep counts as adjusted (m).
    #[serde(default = "default_footstep_adjusted_threshold")]
    pub footstep_adjusted_threshold: f64,

    #[serde(default = "default_max_solver_iters")]
    pub max_solver_iters: u32,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            use_step_adjustment: default_true(),
            feedback_weight: default_feedback_weight(),
            footstep_weight: default_footstep_weight(),
            dynamic_relaxation_weight: default_slack_weight(),
            regularization_weight: default_regularization_weight(),
            max_step_adjustment: default_max_step_adjustment(),
            footstep_adjusted_threshold: default_footstep_adjusted_threshold(),
            max_solver_iters: default_max_solver_iters(),
        }
    }
}

impl OptimizationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("optimization.feedback_weight", self.feedback_weight)?;
        check_positive("optimization.footstep_weight", self.footstep_weight)?;
        check_positive(
            "optimization.dynamic_relaxation_weight",
            self.dynamic_relaxation_weight,
        )?;
        check_non_negative("optimization.regularization_weight", self.regularization_weight)?;
        check_non_negative("optimization.max_step_adjustment", self.max_step_adjustment)?;
        check_non_negative(
            "optimization.footstep_adjusted_threshold",
            self.footstep_adjusted_threshold,
        )?;
        if self.max_solver_iters == 0 {
            return Err(ConfigError::invalid(
                "optimization.max_solver_iters",
                "must be > 0",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MomentumConfig
// ---------------------------------------------------------------------------

/// How the desired CMP is produced from the ICP error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumStrategyKind {
    /// Proportional-integral ICP feedback.
    #[default]
    IcpFeedback,
    /// QP over CMP feedback and next-footstep adjustment.
    Optimization,
    /// ICP feedback plus a CoP/CMP offset from angular momentum.
    AngularMomentumAware,
}

/// Momentum-rate command settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumConfig {
    #[serde(default)]
    pub strategy: MomentumStrategyKind,

    /// Total robot mass (kg).
    #[serde(default = "default_mass")]
    pub mass: f64,

    /// Gravity magnitude (m/s^2), must be >= 0.
    #[serde(default = "default_gravity")]
    pub gravity: f64,

    /// Include the vertical linear component in the command.
    #[serde(default = "default_true")]
    pub control_height_with_momentum: bool,

    /// Include (and drive to zero) the angular momentum rate about z.
    #[serde(default = "default_true")]
    pub minimize_angular_momentum_rate_z: bool,

    /// Project the desired CMP into the support polygon.
    #[serde(default = "default_true")]
    pub keep_cmp_inside_support_polygon: bool,

    /// Margin of the safe region inside which the CMP is never projected.
    #[serde(default = "default_projector_safe_margin")]
    pub projector_safe_margin: f64,

    #[serde(default = "default_linear_momentum_weight")]
    pub linear_momentum_weight: [f64; 3],

    #[serde(default = "default_high_linear_momentum_weight")]
    pub high_linear_momentum_weight: [f64; 3],

    #[serde(default = "default_angular_momentum_weight")]
    pub angular_momentum_weight: [f64; 3],

    /// Gain from horizontal angular momentum to the CMP/CoP offset.
    #[serde(default = "default_k_angular_momentum_xy")]
    pub k_angular_momentum_xy: f64,

    /// Gain from pelvis tilt error to the CMP/CoP offset.
    #[serde(default = "default_k_pelvis_axis_angle")]
    pub k_pelvis_axis_angle: f64,

    #[serde(default = "default_kp_yaw")]
    pub kp_yaw: f64,

    #[serde(default = "default_kd_yaw")]
    pub kd_yaw: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            strategy: MomentumStrategyKind::default(),
            mass: default_mass(),
            gravity: default_gravity(),
            control_height_with_momentum: default_true(),
            minimize_angular_momentum_rate_z: default_true(),
            keep_cmp_inside_support_polygon: default_true(),
            projector_safe_margin: default_projector_safe_margin(),
            linear_momentum_weight: default_linear_momentum_weight(),
            high_linear_momentum_weight: default_high_linear_momentum_weight(),
            angular_momentum_weight: default_angular_momentum_weight(),
            k_angular_momentum_xy: default_k_angular_momentum_xy(),
            k_pelvis_axis_angle: default_k_pelvis_axis_angle(),
            kp_yaw: default_kp_yaw(),
            kd_yaw: default_kd_yaw(),
        }
    }
}

impl MomentumConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(ConfigError::InvalidMass(self.mass));
        }
        if !self.gravity.is_finite() || self.gravity < 0.0 {
            return Err(ConfigError::InvalidGravity(self.gravity));
        }
        check_non_negative("momentum.projector_safe_margin", self.projector_safe_margin)?;
        for (field, weights) in [
            ("momentum.linear_momentum_weight", &self.linear_momentum_weight),
            (
                "momentum.high_linear_momentum_weight",
                &self.high_linear_momentum_weight,
            ),
            ("momentum.angular_momentum_weight", &self.angular_momentum_weight),
        ] {
            for w in weights {
                check_non_negative(field, *w)?;
            }
        }
        check_non_negative("momentum.k_angular_momentum_xy", self.k_angular_momentum_xy)?;
        check_non_negative("momentum.k_pelvis_axis_angle", self.k_pelvis_axis_angle)?;
        check_non_negative("momentum.kp_yaw", self.kp_yaw)?;
        check_non_negative("momentum.kd_yaw", self.kd_yaw)
    }
}

// ---------------------------------------------------------------------------
// BalanceConfig
// ---------------------------------------------------------------------------

/// Balance manager thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// Forward half-axis of the ICP error ellipse gating single support (m).
    #[serde(default = "default_max_icp_error_x")]
    pub max_icp_error_before_single_support_x: f64,

    /// Lateral half-axis of the ICP error ellipse gating single support (m).
    #[serde(default = "default_max_icp_error_y")]
    pub max_icp_error_before_single_support_y: f64,

    /// ICP depth inside the support polygon required to stop walking (m).
    #[serde(default = "default_safe_distance_to_stop")]
    pub safe_distance_from_support_edges_to_stop: f64,

    /// Shrink applied to the support polygon before holding the CoM (m).
    #[serde(default = "default_hold_shrink_distance")]
    pub distance_to_shrink_support_polygon_when_holding: f64,

    /// ICP error below which the high momentum weight is released (m).
    #[serde(default = "default_allowed_icp_error")]
    pub allowed_icp_error_for_default_weight: f64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            max_icp_error_before_single_support_x: default_max_icp_error_x(),
            max_icp_error_before_single_support_y: default_max_icp_error_y(),
            safe_distance_from_support_edges_to_stop: default_safe_distance_to_stop(),
            distance_to_shrink_support_polygon_when_holding: default_hold_shrink_distance(),
            allowed_icp_error_for_default_weight: default_allowed_icp_error(),
        }
    }
}

impl BalanceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive(
            "balance.max_icp_error_before_single_support_x",
            self.max_icp_error_before_single_support_x,
        )?;
        check_positive(
            "balance.max_icp_error_before_single_support_y",
            self.max_icp_error_before_single_support_y,
        )?;
        check_non_negative(
            "balance.safe_distance_from_support_edges_to_stop",
            self.safe_distance_from_support_edges_to_stop,
        )?;
        check_non_negative(
            "balance.distance_to_shrink_support_polygon_when_holding",
            self.distance_to_shrink_support_polygon_when_holding,
        )?;
        check_non_negative(
            "balance.allowed_icp_error_for_default_weight",
            self.allowed_icp_error_for_default_weight,
        )
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn check_finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} (must be finite)")))
    }
}

fn check_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} (must be > 0)")))
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} (must be >= 0)")))
    }
}

fn check_fraction(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} (must be in [0, 1])")))
    }
}
