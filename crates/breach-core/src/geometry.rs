//! Integer grid geometry.
//!
//! Every position in a level is a grid cell addressed by signed integer
//! coordinates, with `y` growing downward. Distances are Manhattan distances;
//! nothing in the simulation uses floating point.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A single grid cell.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(self, other: Point) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Facing
// ---------------------------------------------------------------------------

/// One of the four cardinal directions a camera can face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    /// Whether `target` lies inside the 90-degree cone projected from
    /// `origin` in this direction.
    ///
    /// The offset along the facing axis must have the correct sign and must
    /// be at least as large as the perpendicular offset. The origin cell
    /// itself is never inside the cone.
    pub fn cone_contains(self, origin: Point, target: Point) -> bool {
        let dx = i64::from(target.x) - i64::from(origin.x);
        let dy = i64::from(target.y) - i64::from(origin.y);
        match self {
            Facing::Up => dy < 0 && dx.abs() <= dy.abs(),
            Facing::Down => dy > 0 && dx.abs() <= dy.abs(),
            Facing::Left => dx < 0 && dy.abs() <= dx.abs(),
            Facing::Right => dx > 0 && dy.abs() <= dx.abs(),
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left => "left",
            Facing::Right => "right",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
