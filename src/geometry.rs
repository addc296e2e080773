//! Cell addressing on the road.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell on the road, addressed by its offset along the road
/// and its physical sub-lane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// The longitudinal offset, in cells.
    pub x: i32,
    /// The physical sub-lane.
    pub lane: i32,
}

impl Position {
    /// Creates a new position.
    pub const fn new(x: i32, lane: i32) -> Self {
        Self { x, lane }
    }

    /// Returns the position shifted by `dx` cells forward and `dlane` sub-lanes sideways.
    pub const fn shifted(self, dx: i32, dlane: i32) -> Self {
        Self {
            x: self.x + dx,
            lane: self.lane + dlane,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.lane)
    }
}

/// The rectangle of cells covered by a vehicle.
///
/// `position` is the front cell on the lowest sub-lane; the vehicle extends
/// `length` cells backwards and `width` sub-lanes upwards from there.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Footprint {
    pub position: Position,
    pub length: i32,
    pub width: i32,
}

impl Footprint {
    /// Creates a new footprint.
    pub const fn new(position: Position, length: i32, width: i32) -> Self {
        Self {
            position,
            length,
            width,
        }
    }

    /// The offset of the rearmost cell.
    pub const fn rear(&self) -> i32 {
        self.position.x - self.length + 1
    }

    /// The sub-lanes covered by the footprint.
    pub fn sublanes(&self) -> impl Iterator<Item = i32> {
        let lane = self.position.lane;
        lane..lane + self.width
    }

    /// The positions of the front cells, one per covered sub-lane.
    pub fn front(&self) -> impl Iterator<Item = Position> {
        let x = self.position.x;
        self.sublanes().map(move |lane| Position::new(x, lane))
    }

    /// Every cell covered by the footprint.
    pub fn cells(&self) -> impl Iterator<Item = Position> {
        let Self {
            position,
            length,
            width,
        } = *self;
        (0..length).flat_map(move |i| (0..width).map(move |w| position.shifted(-i, w)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn footprint_cells() {
        let footprint = Footprint::new(Position::new(3, 1), 3, 2);
        let cells = footprint.cells().collect::<Vec<_>>();
        assert_eq!(cells.len(), 6);
        assert!(cells.contains(&Position::new(3, 1)));
        assert!(cells.contains(&Position::new(1, 2)));
        assert!(!cells.contains(&Position::new(0, 1)));
        assert_eq!(footprint.rear(), 1);
        assert_eq!(footprint.sublanes().collect::<Vec<_>>(), vec![1, 2]);
    }
}
