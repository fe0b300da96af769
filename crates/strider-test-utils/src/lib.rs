//! Shared test fixtures and utilities for strider crates.
//!
//! Provides deterministic RNG setup, default foot polygons, a frame tree
//! with both sole frames and the mid-feet frame, and straight-line walking
//! plans.

pub mod fixtures;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use fixtures::{
    Stance, default_foot_polygons, foot_polygon, sole_pose, straight_walk, uniform_timings,
};
pub use rng::{random_in, random_point, seeded_rng};
