//! Frame-tagged planar geometry.
//!
//! Every position the balance controller stores is paired with the reference
//! frame it is expressed in. Frames are owned by an external frame graph (the
//! robot model / state estimator) that exposes the current pose of each frame
//! relative to world through [`FrameProvider`]. Sole frames move when a foot
//! slips, so anything stored in a sole frame follows the foot automatically.
//!
//! Mixing frames is never implicit: arithmetic helpers check frames and
//! [`FramePoint2::change_frame`] is the only way to re-express a point.
//!
//! ```text
//! p_world  = T_frame * p_frame
//! p_target = T_target^-1 * T_frame * p_frame
//! ```

use std::collections::HashMap;

use nalgebra::{Isometry2, Point2, Vector2};

use crate::error::FrameError;
use crate::types::{RobotSide, SideDependent};

// ---------------------------------------------------------------------------
// FrameId
// ---------------------------------------------------------------------------

/// Opaque handle to a reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u32);

impl FrameId {
    /// The inertial world frame. Always known to every provider.
    pub const WORLD: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_world(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_world() {
            f.write_str("world")
        } else {
            write!(f, "frame#{}", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// FrameProvider
// ---------------------------------------------------------------------------

/// Source of frame poses, relative to world.
pub trait FrameProvider {
    /// Current pose of `frame` expressed in world.
    fn pose_in_world(&self, frame: FrameId) -> Result<Isometry2<f64>, FrameError>;

    /// Transform taking coordinates in `from` to coordinates in `to`.
    fn transform_between(&self, from: FrameId, to: FrameId) -> Result<Isometry2<f64>, FrameError> {
        if from == to {
            return Ok(Isometry2::identity());
        }
        let from_in_world = self.pose_in_world(from)?;
        let to_in_world = self.pose_in_world(to)?;
        Ok(to_in_world.inverse() * from_in_world)
    }
}

/// Flat frame graph: each frame stores its pose relative to world.
#[derive(Debug, Clone)]
pub struct FrameTree {
    poses: HashMap<FrameId, Isometry2<f64>>,
    next_id: u32,
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTree {
    pub fn new() -> Self {
        let mut poses = HashMap::new();
        poses.insert(FrameId::WORLD, Isometry2::identity());
        Self { poses, next_id: 1 }
    }

    /// Register a new frame at `pose` (in world) and return its id.
    pub fn add_frame(&mut self, pose: Isometry2<f64>) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        self.poses.insert(id, pose);
        id
    }

    /// Move an existing frame.
    pub fn set_pose(&mut self, frame: FrameId, pose: Isometry2<f64>) -> Result<(), FrameError> {
        if frame.is_world() {
            return Err(FrameError::WorldFrameImmutable);
        }
        let slot = self
            .poses
            .get_mut(&frame)
            .ok_or(FrameError::UnknownFrame(frame))?;
        *slot = pose;
        Ok(())
    }

    pub fn remove_frame(&mut self, frame: FrameId) -> Result<(), FrameError> {
        if frame.is_world() {
            return Err(FrameError::WorldFrameImmutable);
        }
        self.poses
            .remove(&frame)
            .map(|_| ())
            .ok_or(FrameError::UnknownFrame(frame))
    }

    pub fn contains(&self, frame: FrameId) -> bool {
        self.poses.contains_key(&frame)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

impl FrameProvider for FrameTree {
    fn pose_in_world(&self, frame: FrameId) -> Result<Isometry2<f64>, FrameError> {
        self.poses
            .get(&frame)
            .copied()
            .ok_or(FrameError::UnknownFrame(frame))
    }
}

// ---------------------------------------------------------------------------
// SupportFrames
// ---------------------------------------------------------------------------

/// Frames attached to the feet, updated by the caller every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportFrames {
    pub soles: SideDependent<FrameId>,
    /// Frame halfway between the soles, heading averaged.
    pub mid_feet: FrameId,
}

impl SupportFrames {
    pub const fn new(soles: SideDependent<FrameId>, mid_feet: FrameId) -> Self {
        Self { soles, mid_feet }
    }

    pub const fn sole(&self, side: RobotSide) -> FrameId {
        *self.soles.get(side)
    }
}

// ---------------------------------------------------------------------------
// FramePoint2
// ---------------------------------------------------------------------------

/// A 2D point expressed in a named frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePoint2 {
    pub position: Point2<f64>,
    pub frame: FrameId,
}

impl FramePoint2 {
    pub const fn new(frame: FrameId, position: Point2<f64>) -> Self {
        Self { position, frame }
    }

    pub fn from_xy(frame: FrameId, x: f64, y: f64) -> Self {
        Self::new(frame, Point2::new(x, y))
    }

    /// Origin of `frame`.
    pub fn origin(frame: FrameId) -> Self {
        Self::new(frame, Point2::origin())
    }

    /// A point whose coordinates are undefined.
    pub fn nan(frame: FrameId) -> Self {
        Self::from_xy(frame, f64::NAN, f64::NAN)
    }

    pub fn world(position: Point2<f64>) -> Self {
        Self::new(FrameId::WORLD, position)
    }

    pub fn contains_nan(&self) -> bool {
        self.position.x.is_nan() || self.position.y.is_nan()
    }

    /// Re-express this point in `target`.
    pub fn change_frame(
        &self,
        target: FrameId,
        frames: &dyn FrameProvider,
    ) -> Result<Self, FrameError> {
        if target == self.frame {
            return Ok(*self);
        }
        let transform = frames.transform_between(self.frame, target)?;
        Ok(Self::new(target, transform * self.position))
    }

    /// Coordinates of this point in world.
    pub fn in_world(&self, frames: &dyn FrameProvider) -> Result<Point2<f64>, FrameError> {
        Ok(self.change_frame(FrameId::WORLD, frames)?.position)
    }

    /// Fail unless `other` is expressed in the same frame.
    pub fn check_frame(&self, other: FrameId) -> Result<(), FrameError> {
        if self.frame == other {
            Ok(())
        } else {
            Err(FrameError::Mismatch {
                expected: self.frame,
                got: other,
            })
        }
    }

    /// `self + alpha * (other - self)`; both points must share a frame.
    pub fn interpolate(&self, other: &Self, alpha: f64) -> Result<Self, FrameError> {
        self.check_frame(other.frame)?;
        let position = self.position + (other.position - self.position) * alpha;
        Ok(Self::new(self.frame, position))
    }

    pub fn distance(&self, other: &Self) -> Result<f64, FrameError> {
        self.check_frame(other.frame)?;
        Ok((other.position - self.position).norm())
    }
}

// ---------------------------------------------------------------------------
// FrameVector2
// ---------------------------------------------------------------------------

/// A 2D free vector expressed in a named frame. Changing frame only rotates it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameVector2 {
    pub vector: Vector2<f64>,
    pub frame: FrameId,
}

impl FrameVector2 {
    pub const fn new(frame: FrameId, vector: Vector2<f64>) -> Self {
        Self { vector, frame }
    }

    pub fn zero(frame: FrameId) -> Self {
        Self::new(frame, Vector2::zeros())
    }

    pub fn world(vector: Vector2<f64>) -> Self {
        Self::new(FrameId::WORLD, vector)
    }

    pub fn change_frame(
        &self,
        target: FrameId,
        frames: &dyn FrameProvider,
    ) -> Result<Self, FrameError> {
        if target == self.frame {
            return Ok(*self);
        }
        let transform = frames.transform_between(self.frame, target)?;
        Ok(Self::new(target, transform.rotation * self.vector))
    }

    pub fn in_world(&self, frames: &dyn FrameProvider) -> Result<Vector2<f64>, FrameError> {
        Ok(self.change_frame(FrameId::WORLD, frames)?.vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn tree_with_rotated_frame() -> (FrameTree, FrameId) {
        let mut tree = FrameTree::new();
        let id = tree.add_frame(Isometry2::new(Vector2::new(1.0, 2.0), FRAC_PI_2));
        (tree, id)
    }

    #[test]
    fn world_frame_always_present() {
        let tree = FrameTree::new();
        assert!(tree.contains(FrameId::WORLD));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.pose_in_world(FrameId::WORLD).unwrap(), Isometry2::identity());
    }

    #[test]
    fn point_to_world_applies_pose() {
        let (tree, id) = tree_with_rotated_frame();
        let p = FramePoint2::from_xy(id, 1.0, 0.0);
        let w = p.in_world(&tree).unwrap();
        // Rotated by 90 degrees then translated.
        assert_relative_eq!(w.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(w.y, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn point_round_trip_between_frames() {
        let (mut tree, a) = tree_with_rotated_frame();
        let b = tree.add_frame(Isometry2::new(Vector2::new(-0.5, 0.3), 0.4));
        let p = FramePoint2::from_xy(a, 0.2, -0.7);
        let back = p.change_frame(b, &tree).unwrap().change_frame(a, &tree).unwrap();
        assert_eq!(back.frame, a);
        assert_relative_eq!(back.position, p.position, epsilon = 1e-12);
    }

    #[test]
    fn vector_change_frame_ignores_translation() {
        let (tree, id) = tree_with_rotated_frame();
        let v = FrameVector2::new(id, Vector2::new(1.0, 0.0));
        let w = v.in_world(&tree).unwrap();
        assert_relative_eq!(w, Vector2::new(0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn moving_a_frame_moves_its_points() {
        let (mut tree, id) = tree_with_rotated_frame();
        let p = FramePoint2::origin(id);
        let before = p.in_world(&tree).unwrap();
        tree.set_pose(id, Isometry2::new(Vector2::new(1.05, 2.0), FRAC_PI_2))
            .unwrap();
        let after = p.in_world(&tree).unwrap();
        assert_relative_eq!(after.x - before.x, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn unknown_frame_is_an_error() {
        let tree = FrameTree::new();
        let p = FramePoint2::origin(FrameId::new(42));
        assert_eq!(
            p.in_world(&tree),
            Err(FrameError::UnknownFrame(FrameId::new(42)))
        );
    }

    #[test]
    fn world_frame_is_immutable() {
        let mut tree = FrameTree::new();
        assert_eq!(
            tree.set_pose(FrameId::WORLD, Isometry2::identity()),
            Err(FrameError::WorldFrameImmutable)
        );
        assert_eq!(
            tree.remove_frame(FrameId::WORLD),
            Err(FrameError::WorldFrameImmutable)
        );
    }

    #[test]
    fn interpolate_rejects_mixed_frames() {
        let (tree, id) = tree_with_rotated_frame();
        let a = FramePoint2::origin(FrameId::WORLD);
        let b = FramePoint2::origin(id);
        assert!(a.interpolate(&b, 0.5).is_err());

        let b_world = b.change_frame(FrameId::WORLD, &tree).unwrap();
        let mid = a.interpolate(&b_world, 0.5).unwrap();
        assert_relative_eq!(mid.position, Point2::new(0.5, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn nan_point_is_detected() {
        assert!(FramePoint2::nan(FrameId::WORLD).contains_nan());
        assert!(!FramePoint2::origin(FrameId::WORLD).contains_nan());
    }
}
