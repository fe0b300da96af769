use thiserror::Error;

use crate::frame::FrameId;

/// Top-level error type for strider.
#[derive(Debug, Error)]
pub enum StriderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
}

/// Configuration errors.
///
/// Returned by setters and by [`crate::config::StriderConfig::validate`]. A
/// rejected value is never stored.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid omega0: {0} (must be finite and > 0)")]
    InvalidOmega0(f64),

    #[error("Invalid gravity: {0} (must be finite and >= 0)")]
    InvalidGravity(f64),

    #[error("Invalid mass: {0} (must be finite and > 0)")]
    InvalidMass(f64),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Incompatible configuration: {0}")]
    Incompatible(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

/// Reference frame errors.
///
/// Copy + static messages for cheap propagation in the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Unknown reference frame: {0}")]
    UnknownFrame(FrameId),

    #[error("Reference frame mismatch: expected {expected}, got {got}")]
    Mismatch { expected: FrameId, got: FrameId },

    #[error("The world frame cannot be moved or removed")]
    WorldFrameImmutable,
}

/// Planar geometry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("Polygon needs at least one vertex")]
    EmptyPolygon,

    #[error("Polygon vertex {0} is not finite")]
    NonFiniteVertex(usize),
}

/// Quadratic program errors.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("Solver setup failed: {0}")]
    Setup(String),

    #[error("Solver did not converge: {0}")]
    NotConverged(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidOmega0(f64::NAN);
        assert_eq!(
            err.to_string(),
            "Invalid omega0: NaN (must be finite and > 0)"
        );

        let err = ConfigError::invalid("planner.swing_split_fraction", "must be in [0, 1]");
        assert_eq!(
            err.to_string(),
            "Invalid value for planner.swing_split_fraction: must be in [0, 1]"
        );
    }

    #[test]
    fn frame_error_display() {
        let err = FrameError::UnknownFrame(FrameId::new(7));
        assert_eq!(err.to_string(), "Unknown reference frame: frame#7");

        let err = FrameError::Mismatch {
            expected: FrameId::WORLD,
            got: FrameId::new(2),
        };
        assert_eq!(
            err.to_string(),
            "Reference frame mismatch: expected world, got frame#2"
        );
    }

    #[test]
    fn frame_error_is_copy() {
        let err = FrameError::WorldFrameImmutable;
        let copy = err;
        assert_eq!(err, copy);
    }

    #[test]
    fn strider_error_from_sub_errors() {
        let err: StriderError = ConfigError::InvalidGravity(-1.0).into();
        assert!(matches!(err, StriderError::Config(_)));
        assert!(err.to_string().contains("Invalid gravity"));

        let err: StriderError = FrameError::UnknownFrame(FrameId::new(3)).into();
        assert!(matches!(err, StriderError::Frame(_)));

        let err: StriderError = GeometryError::EmptyPolygon.into();
        assert!(matches!(err, StriderError::Geometry(_)));

        let err: StriderError = SolverError::NotConverged("MaxIterations".into()).into();
        assert_eq!(
            err.to_string(),
            "Solver error: Solver did not converge: MaxIterations"
        );
    }

    #[test]
    fn toml_error_converts() {
        let parse: Result<toml::Value, _> = toml::from_str("not = [valid");
        let err: ConfigError = parse.unwrap_err().into();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
