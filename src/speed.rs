use crate::util::Interval;
use crate::Position;
use std::collections::BTreeMap;

/// The default maximum speed, in cells per step.
pub const DEFAULT_MAX_SPEED: i32 = 5;

/// Speed limits on the road: a default maximum speed plus
/// per sub-lane zones overriding it.
#[derive(Clone, Debug)]
pub struct SpeedController {
    /// The maximum speed outside of any zone.
    max_speed: i32,
    /// The zones on each sub-lane, with their limits.
    limits: BTreeMap<i32, Vec<(Interval<i32>, i32)>>,
}

impl Default for SpeedController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SPEED)
    }
}

impl SpeedController {
    /// Creates a speed controller with no zones.
    pub fn new(max_speed: i32) -> Self {
        Self {
            max_speed,
            limits: BTreeMap::new(),
        }
    }

    /// The maximum speed outside of any zone.
    pub fn default_max_speed(&self) -> i32 {
        self.max_speed
    }

    /// Adds a zone covering offsets `begin..=end` of a sub-lane.
    /// Zones may overlap; the lowest applicable limit wins.
    pub fn add_limit(&mut self, lane: i32, begin: i32, end: i32, limit: i32) {
        self.limits
            .entry(lane)
            .or_default()
            .push((Interval::new(begin, end), limit));
    }

    /// Gets the maximum speed for a vehicle `width` sub-lanes wide
    /// whose front is at `position`.
    pub fn max_speed(&self, position: Position, width: i32) -> i32 {
        (position.lane..position.lane + width.max(1))
            .filter_map(|lane| self.limits.get(&lane))
            .flatten()
            .filter(|(zone, _)| zone.contains(position.x))
            .map(|(_, limit)| *limit)
            .fold(self.max_speed, i32::min)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_max_speed() {
        let controller = SpeedController::default();
        assert_eq!(controller.max_speed(Position::new(10, 0), 1), 5);
        assert_eq!(controller.max_speed(Position::new(42, 1), 1), 5);

        let controller = SpeedController::new(10);
        assert_eq!(controller.max_speed(Position::new(10, 0), 1), 10);
        assert_eq!(controller.max_speed(Position::new(42, 1), 1), 10);
    }

    #[test]
    fn partial_limit() {
        let mut controller = SpeedController::new(10);
        controller.add_limit(0, 10, 20, 5);
        assert_eq!(controller.max_speed(Position::new(9, 0), 1), 10);
        assert_eq!(controller.max_speed(Position::new(10, 0), 1), 5);
        assert_eq!(controller.max_speed(Position::new(15, 0), 1), 5);
        assert_eq!(controller.max_speed(Position::new(20, 0), 1), 5);
        assert_eq!(controller.max_speed(Position::new(21, 0), 1), 10);
        assert_eq!(controller.max_speed(Position::new(15, 1), 1), 10);
    }

    #[test]
    fn overlapping_limits_take_the_lowest() {
        let mut controller = SpeedController::new(10);
        controller.add_limit(0, 15, 25, 3);
        controller.add_limit(0, 10, 20, 5);
        assert_eq!(controller.max_speed(Position::new(9, 0), 1), 10);
        assert_eq!(controller.max_speed(Position::new(14, 0), 1), 5);
        assert_eq!(controller.max_speed(Position::new(15, 0), 1), 3);
        assert_eq!(controller.max_speed(Position::new(25, 0), 1), 3);
        assert_eq!(controller.max_speed(Position::new(26, 0), 1), 10);
    }

    #[test]
    fn limit_across_vehicle_width() {
        let mut controller = SpeedController::new(10);
        controller.add_limit(2, 0, 50, 4);
        assert_eq!(controller.max_speed(Position::new(5, 0), 2), 10);
        assert_eq!(controller.max_speed(Position::new(5, 1), 2), 4);
        assert_eq!(controller.max_speed(Position::new(5, 2), 1), 4);
    }
}
