//! Reference pivot (entry/exit CMP) sequencing.
//!
//! Turns the queue of upcoming footsteps into one entry and one exit pivot
//! per plan slot. Slot 0 is the foot carrying the weight at the start of the
//! phase. Pivots of feet on the ground are stored in their own sole frame and
//! pivots of planned footsteps in the sole frame of the first support foot,
//! so the whole sequence follows the feet when they slip.
//!
//! With two pivots per support, a candidate pivot is anchored on the sole
//! origin of the neighbouring foot (previous foot for the entry, next foot for
//! the exit), expressed in the current sole frame, then constrained:
//!
//! ```text
//! x = clamp(candidate.x, min_forward, max_forward)
//! y = centroid.y + offset.y
//! pivot = project(shrink(polygon, safe_margin), (x, y))
//! ```
//!
//! With a single pivot per support the pivot is the polygon centroid plus the
//! per-side offset and the exit pivot is undefined.

use nalgebra::{Isometry2, Point2, Vector2};
use strider_core::config::PivotConfig;
use strider_core::{
    ConfigError, ConvexPolygon2, FrameError, FrameId, FramePoint2, FrameProvider, Footstep,
    RobotSide, SideDependent,
};

/// A sole frame: either a foot on the ground or a planned footstep.
#[derive(Clone, Copy)]
enum Sole<'a> {
    Ground(FrameId),
    Planned(&'a Isometry2<f64>),
}

impl Sole<'_> {
    fn pose(self, frames: &dyn FrameProvider) -> Result<Isometry2<f64>, FrameError> {
        match self {
            Self::Ground(frame) => frames.pose_in_world(frame),
            Self::Planned(pose) => Ok(*pose),
        }
    }
}

/// Computes the entry and exit pivots of the plan window.
#[derive(Debug, Clone)]
pub struct PivotSequencer {
    config: PivotConfig,
    use_two_cmps_per_support: bool,
    offsets: SideDependent<Vector2<f64>>,
    soles: SideDependent<FrameId>,
    default_foot_polygons: SideDependent<ConvexPolygon2>,
    support_foot_polygons: SideDependent<ConvexPolygon2>,
    upcoming_footsteps: Vec<Footstep>,
    entry_cmps: Vec<FramePoint2>,
    exit_cmps: Vec<FramePoint2>,
    first_entry_cmp_for_single_support: FramePoint2,
    is_done_walking: bool,
}

impl PivotSequencer {
    /// `window` is the number of slots kept. `default_foot_polygons` are in
    /// sole frames and serve both as the current support polygons and as the
    /// polygons of planned footsteps without contact points.
    pub fn new(
        config: PivotConfig,
        window: usize,
        use_two_cmps_per_support: bool,
        soles: SideDependent<FrameId>,
        default_foot_polygons: SideDependent<ConvexPolygon2>,
    ) -> Self {
        let offsets = symmetric_offsets(config.cmp_forward_offset, config.cmp_inside_offset);
        Self {
            config,
            use_two_cmps_per_support,
            offsets,
            soles,
            support_foot_polygons: default_foot_polygons.clone(),
            default_foot_polygons,
            upcoming_footsteps: Vec::with_capacity(window),
            entry_cmps: vec![FramePoint2::nan(FrameId::WORLD); window],
            exit_cmps: vec![FramePoint2::nan(FrameId::WORLD); window],
            first_entry_cmp_for_single_support: FramePoint2::nan(FrameId::WORLD),
            is_done_walking: false,
        }
    }

    // -- configuration --------------------------------------------------------

    pub fn set_use_two_cmps_per_support(&mut self, use_two_cmps: bool) {
        self.use_two_cmps_per_support = use_two_cmps;
    }

    pub const fn use_two_cmps_per_support(&self) -> bool {
        self.use_two_cmps_per_support
    }

    pub fn set_safe_distance_from_support_edges(
        &mut self,
        distance: f64,
    ) -> Result<(), ConfigError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(ConfigError::invalid(
                "pivots.safe_distance_from_support_edges",
                format!("{distance} (must be >= 0)"),
            ));
        }
        self.config.safe_distance_from_support_edges = distance;
        Ok(())
    }

    pub fn set_min_max_forward_cmp_offset(
        &mut self,
        min: f64,
        max: f64,
    ) -> Result<(), ConfigError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ConfigError::Incompatible(format!(
                "forward pivot offsets [{min}, {max}] do not form an interval"
            )));
        }
        self.config.min_forward_cmp_offset = min;
        self.config.max_forward_cmp_offset = max;
        Ok(())
    }

    /// Same forward offset on both feet, inside offset mirrored per side.
    pub fn set_symmetric_cmp_offsets(&mut self, forward: f64, inside: f64) {
        self.config.cmp_forward_offset = forward;
        self.config.cmp_inside_offset = inside;
        self.offsets = symmetric_offsets(forward, inside);
    }

    /// Current contact polygon of the foot on `side`, in its sole frame.
    pub fn set_support_foot_polygon(&mut self, side: RobotSide, polygon: ConvexPolygon2) {
        self.support_foot_polygons[side] = polygon;
    }

    pub const fn config(&self) -> &PivotConfig {
        &self.config
    }

    // -- footstep queue -------------------------------------------------------

    pub fn clear(&mut self) {
        self.upcoming_footsteps.clear();
    }

    /// Queue a footstep. Footsteps past the window or with a non-finite pose
    /// are dropped; returns whether it was queued.
    pub fn add_upcoming_footstep(&mut self, footstep: Footstep) -> bool {
        if !footstep.is_finite() || self.upcoming_footsteps.len() >= self.window() {
            log::debug!("ignoring footstep for {} side", footstep.side);
            return false;
        }
        self.upcoming_footsteps.push(footstep);
        true
    }

    pub fn number_of_footsteps_registered(&self) -> usize {
        self.upcoming_footsteps.len()
    }

    pub fn upcoming_footsteps(&self) -> &[Footstep] {
        &self.upcoming_footsteps
    }

    pub fn window(&self) -> usize {
        self.entry_cmps.len()
    }

    // -- outputs --------------------------------------------------------------

    pub fn entry_cmps(&self) -> &[FramePoint2] {
        &self.entry_cmps
    }

    pub fn exit_cmps(&self) -> &[FramePoint2] {
        &self.exit_cmps
    }

    pub fn next_entry_cmp(&self) -> FramePoint2 {
        self.entry_cmps[0]
    }

    pub fn next_exit_cmp(&self) -> FramePoint2 {
        self.exit_cmps[0]
    }

    pub const fn is_done_walking(&self) -> bool {
        self.is_done_walking
    }

    /// Write every entry pivot in world into `out`.
    pub fn entry_cmps_in_world(
        &self,
        frames: &dyn FrameProvider,
        out: &mut [Point2<f64>],
    ) -> Result<(), FrameError> {
        for (dst, cmp) in out.iter_mut().zip(&self.entry_cmps) {
            *dst = cmp.in_world(frames)?;
        }
        Ok(())
    }

    /// Write every exit pivot in world into `out`.
    pub fn exit_cmps_in_world(
        &self,
        frames: &dyn FrameProvider,
        out: &mut [Point2<f64>],
    ) -> Result<(), FrameError> {
        for (dst, cmp) in out.iter_mut().zip(&self.exit_cmps) {
            *dst = cmp.in_world(frames)?;
        }
        Ok(())
    }

    // -- sequencing -----------------------------------------------------------

    /// Fill the window for a transfer onto `transfer_to_side`.
    ///
    /// `at_a_stop` (standing) or an empty queue puts slot 0 halfway between
    /// the feet. An empty queue marks the plan done walking.
    pub fn compute_starting_from_double_support(
        &mut self,
        at_a_stop: bool,
        transfer_to_side: RobotSide,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        let transfer_from_side = transfer_to_side.opposite();
        let from_sole = self.soles[transfer_from_side];
        let to_sole = self.soles[transfer_to_side];
        let no_upcoming_footsteps = self.upcoming_footsteps.is_empty();
        self.is_done_walking = no_upcoming_footsteps;

        if at_a_stop || no_upcoming_footsteps {
            let mid = self.mid_stance_cmp(from_sole, frames)?;
            self.entry_cmps[0] = mid;
            self.exit_cmps[0] = mid;
            if no_upcoming_footsteps {
                self.duplicate_from(0);
                return Ok(());
            }
        } else {
            self.entry_cmps[0] = self.support_entry_cmp(transfer_from_side, None, frames)?;
            self.exit_cmps[0] =
                self.support_exit_cmp(transfer_from_side, Some(Sole::Ground(to_sole)), frames)?;
        }

        let previous_exit = self.exit_cmps[0];
        let entry = self.support_entry_cmp(
            transfer_to_side,
            Some((Sole::Ground(from_sole), Some(previous_exit))),
            frames,
        )?;
        self.entry_cmps[1] = entry;
        self.first_entry_cmp_for_single_support = entry;
        let first_pose = self.upcoming_footsteps[0].pose;
        self.exit_cmps[1] =
            self.support_exit_cmp(transfer_to_side, Some(Sole::Planned(&first_pose)), frames)?;

        self.compute_with_upcoming_footsteps(transfer_to_side, 2, frames)
    }

    /// Fill the window while standing on `support_side`.
    ///
    /// A single queued footstep (or none) marks the plan done walking.
    pub fn compute_starting_from_single_support(
        &mut self,
        support_side: RobotSide,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        let support_sole = self.soles[support_side];
        let count = self.upcoming_footsteps.len();
        self.is_done_walking = count <= 1;

        let entry = if self.first_entry_cmp_for_single_support.contains_nan() {
            self.support_entry_cmp(support_side, None, frames)?
        } else {
            self.first_entry_cmp_for_single_support
                .change_frame(support_sole, frames)?
        };
        self.entry_cmps[0] = entry;

        let next_pose = self.upcoming_footsteps.first().map(|f| f.pose);
        let next_sole = next_pose.as_ref().map(Sole::Planned);
        self.exit_cmps[0] = self.support_exit_cmp(support_side, next_sole, frames)?;

        if count <= 1 {
            let support_entry = self.support_entry_cmp(support_side, None, frames)?;
            let final_cmp = match self.upcoming_footsteps.first() {
                Some(footstep) => {
                    let footstep_entry = self.footstep_entry_cmp(footstep, None, frames)?;
                    let footstep_entry = footstep_entry.change_frame(support_sole, frames)?;
                    support_entry
                        .interpolate(&footstep_entry, 0.5)
                        .unwrap_or(support_entry)
                }
                None => support_entry,
            };
            self.entry_cmps[1] = final_cmp;
            self.exit_cmps[1] = final_cmp;
            self.duplicate_from(1);
            return Ok(());
        }

        self.compute_with_upcoming_footsteps(support_side, 1, frames)
    }

    fn compute_with_upcoming_footsteps(
        &mut self,
        first_support_side: RobotSide,
        mut index: usize,
        frames: &dyn FrameProvider,
    ) -> Result<(), FrameError> {
        let first_sole = self.soles[first_support_side];
        let mut previous_pose = frames.pose_in_world(first_sole)?;
        let count = self.upcoming_footsteps.len();

        for i in 0..count {
            if index >= self.window() {
                break;
            }
            let footstep = &self.upcoming_footsteps[i];
            let next_sole = self
                .upcoming_footsteps
                .get(i + 1)
                .map(|next| Sole::Planned(&next.pose));

            let exit = self.footstep_exit_cmp(footstep, next_sole, frames)?;
            let previous_exit = self.exit_cmps[index - 1];
            let entry = self.footstep_entry_cmp(
                footstep,
                Some((Sole::Planned(&previous_pose), Some(previous_exit))),
                frames,
            )?;
            let exit = exit.change_frame(first_sole, frames)?;
            let entry = entry.change_frame(first_sole, frames)?;
            previous_pose = footstep.pose;

            self.exit_cmps[index] = exit;
            self.entry_cmps[index] = entry;
            index += 1;
        }
        self.duplicate_from(index - 1);
        Ok(())
    }

    fn duplicate_from(&mut self, last_computed: usize) {
        let entry = self.entry_cmps[last_computed];
        let exit = self.exit_cmps[last_computed];
        for slot in last_computed + 1..self.window() {
            self.entry_cmps[slot] = entry;
            self.exit_cmps[slot] = exit;
        }
    }

    /// Halfway between both feet's standalone entry pivots, in `frame`.
    fn mid_stance_cmp(
        &self,
        frame: FrameId,
        frames: &dyn FrameProvider,
    ) -> Result<FramePoint2, FrameError> {
        let left = self
            .support_entry_cmp(RobotSide::Left, None, frames)?
            .change_frame(frame, frames)?;
        let right = self
            .support_entry_cmp(RobotSide::Right, None, frames)?
            .change_frame(frame, frames)?;
        left.interpolate(&right, 0.5)
    }

    // -- per-foot pivots ------------------------------------------------------

    fn support_entry_cmp(
        &self,
        side: RobotSide,
        previous: Option<(Sole<'_>, Option<FramePoint2>)>,
        frames: &dyn FrameProvider,
    ) -> Result<FramePoint2, FrameError> {
        let sole = self.soles[side];
        let pose = frames.pose_in_world(sole)?;
        let local =
            self.entry_cmp(side, &pose, &self.support_foot_polygons[side], previous, frames)?;
        Ok(FramePoint2::new(sole, local))
    }

    fn support_exit_cmp(
        &self,
        side: RobotSide,
        next: Option<Sole<'_>>,
        frames: &dyn FrameProvider,
    ) -> Result<FramePoint2, FrameError> {
        let sole = self.soles[side];
        let pose = frames.pose_in_world(sole)?;
        let local = self.exit_cmp(side, &pose, &self.support_foot_polygons[side], next, frames)?;
        Ok(FramePoint2::new(sole, local))
    }

    /// Entry pivot of a planned footstep, in world.
    fn footstep_entry_cmp(
        &self,
        footstep: &Footstep,
        previous: Option<(Sole<'_>, Option<FramePoint2>)>,
        frames: &dyn FrameProvider,
    ) -> Result<FramePoint2, FrameError> {
        let polygon = footstep.polygon_or(&self.default_foot_polygons[footstep.side]);
        let local = self.entry_cmp(footstep.side, &footstep.pose, polygon, previous, frames)?;
        Ok(FramePoint2::world(footstep.pose * local))
    }

    /// Exit pivot of a planned footstep, in world.
    fn footstep_exit_cmp(
        &self,
        footstep: &Footstep,
        next: Option<Sole<'_>>,
        frames: &dyn FrameProvider,
    ) -> Result<FramePoint2, FrameError> {
        let polygon = footstep.polygon_or(&self.default_foot_polygons[footstep.side]);
        let local = self.exit_cmp(footstep.side, &footstep.pose, polygon, next, frames)?;
        Ok(FramePoint2::world(footstep.pose * local))
    }

    /// Entry pivot in the coordinates of the sole at `pose`.
    fn entry_cmp(
        &self,
        side: RobotSide,
        pose: &Isometry2<f64>,
        polygon: &ConvexPolygon2,
        previous: Option<(Sole<'_>, Option<FramePoint2>)>,
        frames: &dyn FrameProvider,
    ) -> Result<Point2<f64>, FrameError> {
        if !self.use_two_cmps_per_support {
            return Ok(polygon.centroid() + self.offsets[side]);
        }

        let (mut candidate, previous_exit) = match previous {
            Some((sole, previous_exit)) => {
                let origin = Point2::from(sole.pose(frames)?.translation.vector);
                (pose.inverse_transform_point(&origin), previous_exit)
            }
            None => (Point2::origin(), None),
        };

        if let Some(previous_exit) = previous_exit.filter(|p| !p.contains_nan()) {
            let previous_exit = pose.inverse_transform_point(&previous_exit.in_world(frames)?);
            // Laziest option: keep the pivot that moves least along the foot.
            if previous_exit.x.abs() < candidate.x.abs() {
                candidate = previous_exit;
            }
        }

        Ok(self.constrain(candidate, side, polygon))
    }

    /// Exit pivot in the coordinates of the sole at `pose`.
    fn exit_cmp(
        &self,
        side: RobotSide,
        pose: &Isometry2<f64>,
        polygon: &ConvexPolygon2,
        next: Option<Sole<'_>>,
        frames: &dyn FrameProvider,
    ) -> Result<Point2<f64>, FrameError> {
        if !self.use_two_cmps_per_support {
            return Ok(Point2::new(f64::NAN, f64::NAN));
        }
        let candidate = match next {
            Some(sole) => {
                let origin = Point2::from(sole.pose(frames)?.translation.vector);
                pose.inverse_transform_point(&origin)
            }
            None => Point2::origin(),
        };
        Ok(self.constrain(candidate, side, polygon))
    }

    fn constrain(
        &self,
        candidate: Point2<f64>,
        side: RobotSide,
        polygon: &ConvexPolygon2,
    ) -> Point2<f64> {
        let x = candidate
            .x
            .clamp(self.config.min_forward_cmp_offset, self.config.max_forward_cmp_offset);
        let y = polygon.centroid().y + self.offsets[side].y;
        polygon
            .shrink(self.config.safe_distance_from_support_edges)
            .orthogonal_projection(&Point2::new(x, y))
    }
}

fn symmetric_offsets(forward: f64, inside: f64) -> SideDependent<Vector2<f64>> {
    SideDependent::from_fn(|side| Vector2::new(forward, side.negate_if_left(inside)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strider_test_utils::fixtures::HALF_STANCE_WIDTH;
    use strider_test_utils::{
        Stance, default_foot_polygons, foot_polygon, random_in, seeded_rng, sole_pose,
        straight_walk,
    };

    fn sequencer(stance: &Stance, window: usize) -> PivotSequencer {
        PivotSequencer::new(
            PivotConfig::default(),
            window,
            true,
            stance.support.soles,
            default_foot_polygons(),
        )
    }

    fn in_world(stance: &Stance, p: &FramePoint2) -> Point2<f64> {
        p.in_world(&stance.frames).unwrap()
    }

    #[test]
    fn standing_without_footsteps_is_mid_feet() {
        let stance = Stance::standing();
        let mut pivots = sequencer(&stance, 3);
        pivots
            .compute_starting_from_double_support(true, RobotSide::Left, &stance.frames)
            .unwrap();
        assert!(pivots.is_done_walking());
        for slot in 0..3 {
            let entry = in_world(&stance, &pivots.entry_cmps()[slot]);
            assert_relative_eq!(entry.y, 0.0, epsilon = 1e-12);
            assert_eq!(pivots.entry_cmps()[slot], pivots.entry_cmps()[0]);
            assert_eq!(pivots.exit_cmps()[slot], pivots.exit_cmps()[0]);
        }
    }

    #[test]
    fn single_pivot_mode_uses_centroid_and_offset() {
        let stance = Stance::standing();
        let mut pivots = sequencer(&stance, 3);
        pivots.set_use_two_cmps_per_support(false);
        pivots.set_symmetric_cmp_offsets(0.01, 0.02);
        for step in straight_walk(RobotSide::Left, 2, 0.3) {
            pivots.add_upcoming_footstep(step);
        }
        pivots
            .compute_starting_from_single_support(RobotSide::Right, &stance.frames)
            .unwrap();
        let entry = in_world(&stance, &pivots.entry_cmps()[0]);
        assert_relative_eq!(entry, Point2::new(0.01, -HALF_STANCE_WIDTH + 0.02), epsilon = 1e-12);
        assert!(pivots.exit_cmps()[0].contains_nan());
        // Left footstep: inside is -y.
        let entry = in_world(&stance, &pivots.entry_cmps()[1]);
        assert_relative_eq!(entry, Point2::new(0.31, HALF_STANCE_WIDTH - 0.02), epsilon = 1e-12);
    }

    #[test]
    fn exit_pivot_moves_towards_next_foot() {
        let stance = Stance::standing();
        let mut pivots = sequencer(&stance, 4);
        for step in straight_walk(RobotSide::Left, 3, 0.3) {
            pivots.add_upcoming_footstep(step);
        }
        pivots
            .compute_starting_from_double_support(false, RobotSide::Right, &stance.frames)
            .unwrap();
        assert!(!pivots.is_done_walking());
        let config = PivotConfig::default();

        // Slot 1 is the right foot, next foot lands 0.3 ahead: exit clipped to max.
        let exit = pivots.exit_cmps()[1];
        assert_eq!(exit.frame, stance.sole(RobotSide::Right));
        assert_relative_eq!(exit.position.x, config.max_forward_cmp_offset, epsilon = 1e-12);
        // Entry of the right foot: previous (left) sole origin is at x = 0, so
        // the candidate stays at 0 forward.
        let entry = pivots.entry_cmps()[1];
        assert_relative_eq!(entry.position.x, 0.0, epsilon = 1e-12);

        // Upcoming slots are stored in the first support sole frame.
        for slot in 2..4 {
            assert_eq!(pivots.entry_cmps()[slot].frame, stance.sole(RobotSide::Right));
        }
        // Entry of the first footstep comes from behind: the laziest option
        // picks the smaller backwards move, clipped to min.
        let entry = in_world(&stance, &pivots.entry_cmps()[2]);
        assert_relative_eq!(entry.x, 0.3 + config.min_forward_cmp_offset, epsilon = 1e-12);
    }

    #[test]
    fn pivots_stay_in_shrunk_polygon() {
        let mut rng = seeded_rng(2024);
        for _ in 0..50 {
            let mut stance = Stance::standing();
            let left_x = random_in(&mut rng, -0.1, 0.1);
            stance.place_foot(RobotSide::Left, sole_pose(RobotSide::Left, left_x));
            let mut pivots = sequencer(&stance, 4);
            let step_length = random_in(&mut rng, -0.2, 0.5);
            for step in straight_walk(RobotSide::Right, 3, step_length) {
                pivots.add_upcoming_footstep(step);
            }
            pivots
                .compute_starting_from_double_support(false, RobotSide::Left, &stance.frames)
                .unwrap();

            let shrunk =
                foot_polygon().shrink(PivotConfig::default().safe_distance_from_support_edges);
            // Slots 0 and 1 live in their own sole frames.
            for slot in 0..2 {
                for cmp in [pivots.entry_cmps()[slot], pivots.exit_cmps()[slot]] {
                    assert!(shrunk.contains(&cmp.position));
                }
            }
            // Later slots: bring them into the footstep's sole frame.
            for (slot, step) in (2..4).zip(pivots.upcoming_footsteps().iter()) {
                for cmp in [pivots.entry_cmps()[slot], pivots.exit_cmps()[slot]] {
                    let world = in_world(&stance, &cmp);
                    let local = step.pose.inverse_transform_point(&world);
                    assert!(shrunk.contains(&local), "slot {slot} pivot {local} outside");
                }
            }
        }
    }

    #[test]
    fn window_duplicates_last_computed_slot() {
        let stance = Stance::standing();
        let mut pivots = sequencer(&stance, 3);
        // Only one slot left for the two footsteps after the support feet.
        for step in straight_walk(RobotSide::Left, 3, 0.25) {
            pivots.add_upcoming_footstep(step);
        }
        assert_eq!(pivots.number_of_footsteps_registered(), 3);
        pivots
            .compute_starting_from_single_support(RobotSide::Right, &stance.frames)
            .unwrap();
        assert!(!pivots.is_done_walking());

        let mut short = sequencer(&stance, 3);
        short.add_upcoming_footstep(straight_walk(RobotSide::Left, 1, 0.25).remove(0));
        short
            .compute_starting_from_single_support(RobotSide::Right, &stance.frames)
            .unwrap();
        assert!(short.is_done_walking());
        assert_eq!(short.exit_cmps()[2], short.exit_cmps()[1]);
        assert_eq!(short.entry_cmps()[2], short.entry_cmps()[1]);
        // Final pivot halfway between the support foot and the last footstep.
        let final_cmp = in_world(&stance, &short.entry_cmps()[1]);
        assert_relative_eq!(final_cmp.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn footsteps_past_window_are_ignored() {
        let stance = Stance::standing();
        let mut pivots = sequencer(&stance, 2);
        let steps = straight_walk(RobotSide::Left, 3, 0.25);
        assert!(pivots.add_upcoming_footstep(steps[0].clone()));
        assert!(pivots.add_upcoming_footstep(steps[1].clone()));
        assert!(!pivots.add_upcoming_footstep(steps[2].clone()));
        assert!(!pivots.add_upcoming_footstep(Footstep::at(RobotSide::Left, f64::NAN, 0.0, 0.0)));
        pivots.clear();
        assert_eq!(pivots.number_of_footsteps_registered(), 0);
    }

    #[test]
    fn pivots_follow_slipping_foot() {
        let mut stance = Stance::standing();
        let mut pivots = sequencer(&stance, 3);
        for step in straight_walk(RobotSide::Left, 2, 0.3) {
            pivots.add_upcoming_footstep(step);
        }
        pivots
            .compute_starting_from_single_support(RobotSide::Right, &stance.frames)
            .unwrap();
        let before = in_world(&stance, &pivots.entry_cmps()[0]);
        stance.place_foot(RobotSide::Right, sole_pose(RobotSide::Right, 0.02));
        let after = in_world(&stance, &pivots.entry_cmps()[0]);
        assert_relative_eq!(after.x - before.x, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn invalid_offsets_rejected() {
        let stance = Stance::standing();
        let mut pivots = sequencer(&stance, 3);
        assert!(pivots.set_min_max_forward_cmp_offset(0.1, -0.1).is_err());
        assert!(pivots.set_safe_distance_from_support_edges(-0.01).is_err());
        assert!(pivots.set_min_max_forward_cmp_offset(-0.02, 0.05).is_ok());
        assert_relative_eq!(pivots.config().max_forward_cmp_offset, 0.05);
    }
}
