//! 2D Points and Tile Coordinates
//!
//! `Point` is a continuous world position, `Coordinate` addresses a tile in
//! the level grid. Both encode as two positional fields (x then y).

use std::fmt;
use serde::{Serialize, Deserialize};

/// Continuous position in world space (tile units).
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Point {
    /// Origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new point.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Add another point component-wise.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Tile containing this point.
    #[inline]
    pub fn to_coordinate(self) -> Coordinate {
        Coordinate::new(self.x.floor() as i32, self.y.floor() as i32)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

/// Integer tile address in the level grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Coordinate {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl Coordinate {
    /// Create a new coordinate.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World position of the tile's lower-left corner.
    #[inline]
    pub fn to_point(self) -> Point {
        Point::new(self.x as f32, self.y as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_to_coordinate_floors() {
        assert_eq!(Point::new(2.7, 3.1).to_coordinate(), Coordinate::new(2, 3));
        assert_eq!(Point::new(-0.5, 0.0).to_coordinate(), Coordinate::new(-1, 0));
    }

    #[test]
    fn test_coordinate_to_point() {
        assert_eq!(Coordinate::new(4, -2).to_point(), Point::new(4.0, -2.0));
    }

    #[test]
    fn test_distance_squared() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_squared(b), 25.0);
        assert_eq!(a.add(b), b);
    }
}
