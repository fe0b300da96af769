//! Feet, stances and footstep plans shared by strider tests.

use nalgebra::{Isometry2, Point2, Translation2, Vector2};
use strider_core::{
    ConvexPolygon2, FrameId, FrameTree, Footstep, FootstepTiming, RobotSide, SideDependent,
    SupportFrames,
};

pub const FOOT_LENGTH: f64 = 0.22;
pub const FOOT_WIDTH: f64 = 0.11;
/// Lateral distance from the mid-feet frame to each sole.
pub const HALF_STANCE_WIDTH: f64 = 0.125;

/// Rectangular foot polygon centered on the sole origin.
pub fn foot_polygon() -> ConvexPolygon2 {
    ConvexPolygon2::rectangle(Point2::origin(), FOOT_LENGTH, FOOT_WIDTH)
}

pub fn default_foot_polygons() -> SideDependent<ConvexPolygon2> {
    SideDependent::from_fn(|_| foot_polygon())
}

/// Nominal sole pose for `side` when standing at `x`.
pub fn sole_pose(side: RobotSide, x: f64) -> Isometry2<f64> {
    let y = match side {
        RobotSide::Left => HALF_STANCE_WIDTH,
        RobotSide::Right => -HALF_STANCE_WIDTH,
    };
    Isometry2::new(Vector2::new(x, y), 0.0)
}

// ---------------------------------------------------------------------------
// Stance
// ---------------------------------------------------------------------------

/// A frame tree holding both sole frames and the mid-feet frame.
#[derive(Debug, Clone)]
pub struct Stance {
    pub frames: FrameTree,
    pub support: SupportFrames,
}

impl Stance {
    /// Both feet side by side at `x = 0`.
    pub fn standing() -> Self {
        let mut frames = FrameTree::new();
        let left = frames.add_frame(sole_pose(RobotSide::Left, 0.0));
        let right = frames.add_frame(sole_pose(RobotSide::Right, 0.0));
        let mid_feet = frames.add_frame(Isometry2::identity());
        Self {
            frames,
            support: SupportFrames::new(SideDependent::new(left, right), mid_feet),
        }
    }

    pub fn sole(&self, side: RobotSide) -> FrameId {
        self.support.sole(side)
    }

    /// Move one foot and refresh the mid-feet frame.
    pub fn place_foot(&mut self, side: RobotSide, pose: Isometry2<f64>) {
        self.frames
            .set_pose(self.support.sole(side), pose)
            .expect("sole frame registered");
        self.refresh_mid_feet();
    }

    /// Sole pose in world.
    pub fn sole_pose(&self, side: RobotSide) -> Isometry2<f64> {
        use strider_core::FrameProvider;
        self.frames
            .pose_in_world(self.support.sole(side))
            .expect("sole frame registered")
    }

    /// Foot polygon of `side` in world.
    pub fn foot_polygon_in_world(&self, side: RobotSide) -> ConvexPolygon2 {
        foot_polygon().transform(&self.sole_pose(side))
    }

    /// Convex hull of both feet in world.
    pub fn double_support_polygon(&self) -> ConvexPolygon2 {
        self.foot_polygon_in_world(RobotSide::Left)
            .combine(&self.foot_polygon_in_world(RobotSide::Right))
            .expect("non-empty feet")
    }

    fn refresh_mid_feet(&mut self) {
        let left = self.sole_pose(RobotSide::Left);
        let right = self.sole_pose(RobotSide::Right);
        let center = (left.translation.vector + right.translation.vector) * 0.5;
        let rotation = left.rotation.slerp(&right.rotation, 0.5);
        self.frames
            .set_pose(
                self.support.mid_feet,
                Isometry2::from_parts(Translation2::from(center), rotation),
            )
            .expect("mid-feet frame registered");
    }
}

// ---------------------------------------------------------------------------
// Footstep plans
// ---------------------------------------------------------------------------

/// `count` alternating footsteps walking forward along x, first one on `first_side`.
pub fn straight_walk(first_side: RobotSide, count: usize, step_length: f64) -> Vec<Footstep> {
    let mut side = first_side;
    (0..count)
        .map(|i| {
            let pose = sole_pose(side, step_length * (i + 1) as f64);
            let step = Footstep::new(side, pose);
            side = side.opposite();
            step
        })
        .collect()
}

pub fn uniform_timings(count: usize, swing_time: f64, transfer_time: f64) -> Vec<FootstepTiming> {
    vec![FootstepTiming::new(swing_time, transfer_time); count]
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_core::FrameProvider;

    #[test]
    fn standing_mid_feet_at_origin() {
        let stance = Stance::standing();
        let mid = stance
            .frames
            .pose_in_world(stance.support.mid_feet)
            .unwrap();
        assert!(mid.translation.vector.norm() < 1e-12);
    }

    #[test]
    fn placing_a_foot_moves_mid_feet() {
        let mut stance = Stance::standing();
        stance.place_foot(RobotSide::Left, sole_pose(RobotSide::Left, 0.3));
        let mid = stance
            .frames
            .pose_in_world(stance.support.mid_feet)
            .unwrap();
        assert!((mid.translation.vector.x - 0.15).abs() < 1e-12);
        assert!(mid.translation.vector.y.abs() < 1e-12);
    }

    #[test]
    fn straight_walk_alternates_sides() {
        let steps = straight_walk(RobotSide::Left, 3, 0.25);
        let sides: Vec<_> = steps.iter().map(|s| s.side).collect();
        assert_eq!(
            sides,
            vec![RobotSide::Left, RobotSide::Right, RobotSide::Left]
        );
        assert!((steps[2].position().x - 0.75).abs() < 1e-12);
        assert!((steps[1].position().y + HALF_STANCE_WIDTH).abs() < 1e-12);
    }

    #[test]
    fn double_support_polygon_contains_mid_feet() {
        let stance = Stance::standing();
        assert!(stance.double_support_polygon().contains(&Point2::origin()));
    }
}
