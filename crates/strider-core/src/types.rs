//! Small shared value types.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RobotSide
// ---------------------------------------------------------------------------

/// Left or right leg of a biped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotSide {
    Left,
    Right,
}

impl RobotSide {
    /// Both sides, left first.
    pub const ALL: [Self; 2] = [Self::Left, Self::Right];

    /// The other leg.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Negate `value` when this is the left side.
    ///
    /// Used for lateral offsets expressed as "towards the inside of the foot":
    /// inside is `-y` for the left foot and `+y` for the right foot.
    #[must_use]
    pub fn negate_if_left(self, value: f64) -> f64 {
        match self {
            Self::Left => -value,
            Self::Right => value,
        }
    }

    /// Negate `value` when this is the right side.
    #[must_use]
    pub fn negate_if_right(self, value: f64) -> f64 {
        -self.negate_if_left(value)
    }
}

impl std::fmt::Display for RobotSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

// ---------------------------------------------------------------------------
// SideDependent
// ---------------------------------------------------------------------------

/// One value per leg, indexable by [`RobotSide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SideDependent<T> {
    pub left: T,
    pub right: T,
}

impl<T> SideDependent<T> {
    pub const fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    /// Build both entries from a per-side closure.
    pub fn from_fn(mut f: impl FnMut(RobotSide) -> T) -> Self {
        Self {
            left: f(RobotSide::Left),
            right: f(RobotSide::Right),
        }
    }

    pub const fn get(&self, side: RobotSide) -> &T {
        match side {
            RobotSide::Left => &self.left,
            RobotSide::Right => &self.right,
        }
    }

    pub const fn get_mut(&mut self, side: RobotSide) -> &mut T {
        match side {
            RobotSide::Left => &mut self.left,
            RobotSide::Right => &mut self.right,
        }
    }

    /// Iterate `(side, value)` pairs, left first.
    pub fn iter(&self) -> impl Iterator<Item = (RobotSide, &T)> {
        RobotSide::ALL.into_iter().map(move |side| (side, self.get(side)))
    }
}

impl<T> Index<RobotSide> for SideDependent<T> {
    type Output = T;

    fn index(&self, side: RobotSide) -> &T {
        self.get(side)
    }
}

impl<T> IndexMut<RobotSide> for SideDependent<T> {
    fn index_mut(&mut self, side: RobotSide) -> &mut T {
        self.get_mut(side)
    }
}
