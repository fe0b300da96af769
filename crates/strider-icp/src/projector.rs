//! Support polygon projection for the desired CMP.
//!
//! The projector keeps a two-state classification of the raw CMP:
//!
//! - `Free`: the CMP is used as is while it stays inside the polygon. Leaving
//!   the polygon switches to `Projected`.
//! - `Projected`: the CMP is clamped to the polygon and the classification
//!   only returns to `Free` once the raw CMP is back inside the polygon shrunk
//!   by the safe margin.
//!
//! The output is always the orthogonal projection onto the polygon, so it is
//! continuous across state changes. The hysteresis band is what consumers
//! (the integral term, diagnostics) see through [`SmartCmpProjector::is_active`].

use nalgebra::Point2;
use strider_core::{ConfigError, ConvexPolygon2};

/// Classification of the last projected CMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionState {
    #[default]
    Free,
    Projected,
}

/// Desired CMP projector with a safe-region hysteresis.
#[derive(Debug, Clone)]
pub struct SmartCmpProjector {
    safe_margin: f64,
    state: ProjectionState,
    was_clamped: bool,
}

impl SmartCmpProjector {
    pub fn new(safe_margin: f64) -> Result<Self, ConfigError> {
        let mut projector = Self {
            safe_margin: 0.0,
            state: ProjectionState::Free,
            was_clamped: false,
        };
        projector.set_safe_margin(safe_margin)?;
        Ok(projector)
    }

    pub fn set_safe_margin(&mut self, margin: f64) -> Result<(), ConfigError> {
        if !margin.is_finite() || margin < 0.0 {
            return Err(ConfigError::invalid(
                "momentum.projector_safe_margin",
                format!("{margin} (must be >= 0)"),
            ));
        }
        self.safe_margin = margin;
        Ok(())
    }

    pub const fn safe_margin(&self) -> f64 {
        self.safe_margin
    }

    pub const fn state(&self) -> ProjectionState {
        self.state
    }

    /// True while the CMP is classified as projected.
    pub fn is_active(&self) -> bool {
        self.state == ProjectionState::Projected
    }

    /// True when the last call moved the CMP.
    pub const fn was_clamped(&self) -> bool {
        self.was_clamped
    }

    pub fn reset(&mut self) {
        self.state = ProjectionState::Free;
        self.was_clamped = false;
    }

    /// Project `cmp` into `polygon` and update the classification.
    ///
    /// A NaN input is returned unchanged; the caller decides the fallback.
    pub fn project(&mut self, cmp: &Point2<f64>, polygon: &ConvexPolygon2) -> Point2<f64> {
        if cmp.x.is_nan() || cmp.y.is_nan() || polygon.is_empty() {
            self.was_clamped = false;
            return *cmp;
        }

        let inside = polygon.contains(cmp);
        self.state = match self.state {
            ProjectionState::Free if inside => ProjectionState::Free,
            ProjectionState::Free => ProjectionState::Projected,
            // Inside the polygon shrunk by the margin, without building it.
            ProjectionState::Projected if polygon.distance_inside(cmp) >= self.safe_margin => {
                ProjectionState::Free
            }
            ProjectionState::Projected => ProjectionState::Projected,
        };

        if inside {
            self.was_clamped = false;
            *cmp
        } else {
            self.was_clamped = true;
            polygon.orthogonal_projection(cmp)
        }
    }
}
