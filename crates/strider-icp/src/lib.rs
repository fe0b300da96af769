//! Instantaneous capture point planning and momentum-rate control for
//! bipedal balance.
//!
//! The pipeline, run once per control tick:
//!
//! 1. **Pivot sequencer**: turns queued footsteps into entry/exit CMP pivots
//! 2. **Capture point planner**: corner points, a cubic in double support and
//!    the segmented exponential/spline trajectory in single support
//! 3. **Time freezer**: slows or stops plan time while the measured capture
//!    point lags behind
//! 4. **Momentum controller**: ICP feedback (proportional law or QP with
//!    footstep adjustment), CMP projection, then the linear momentum rate
//! 5. **Balance manager**: wires it all together and answers phase safety
//!    queries
//!
//! # Model
//!
//! Linear inverted pendulum with natural frequency `w0 = sqrt(g / z_com)`.
//! The capture point `xi = x + x_dot / w0` obeys `xi_dot = w0 (xi - cmp)`,
//! so on a constant CMP it diverges exponentially away from it.

pub mod balance;
pub mod capture_point;
pub mod feedback;
pub mod freezer;
pub mod momentum;
pub mod optimization;
pub mod pivots;
pub mod planner;
pub mod projector;
pub mod segmented;
pub mod spline;

pub use balance::{BalanceCommand, BalanceManager, BalanceMeasurements, CapturabilityStatus};
pub use capture_point::IcpSample;
pub use feedback::{IcpProportionalController, motion_aligned_gains};
pub use freezer::TimeFreezer;
pub use momentum::{
    AngularState, MomentumControlInput, MomentumController, MomentumRateCommand, MomentumSelection,
};
pub use optimization::{CmpOptimizationController, CmpOptimizationInput, CmpOptimizationSolution};
pub use pivots::PivotSequencer;
pub use planner::{IcpPlanner, IcpPlanning};
pub use projector::{ProjectionState, SmartCmpProjector};
pub use segmented::{Segment, SegmentedTrajectory};
pub use spline::{CubicSpline2, DoubleSupportTrajectory};
