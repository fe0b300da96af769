// strider-core: frames, planar geometry, footsteps, config and errors for the
// strider balance controller.

pub mod config;
pub mod error;
pub mod footstep;
pub mod frame;
pub mod polygon;
pub mod types;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use config::StriderConfig;
pub use error::{ConfigError, FrameError, GeometryError, SolverError, StriderError};
pub use footstep::{Footstep, FootstepTiming};
pub use frame::{FrameId, FramePoint2, FrameProvider, FrameTree, FrameVector2, SupportFrames};
pub use polygon::ConvexPolygon2;
pub use types::{RobotSide, SideDependent};
