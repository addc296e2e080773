//! Car-following, lane-changing and corridor rules of the cellular automaton.

use super::{Action, Vehicle, VehicleKind, Zip};
use crate::{Position, Road, VehicleId};
use rand::seq::SliceRandom;
use rand::RngCore;
use smallvec::SmallVec;

/// How far behind an emergency vehicle may be for others to form a corridor, in cells.
const CORRIDOR_RADIUS: i32 = 10;

/// The fastest a vehicle may be going to move sideways into a corridor.
const CORRIDOR_SPEED: i32 = 2;

/// Evaluates the rules for one vehicle against the committed state of the road.
pub(super) struct Rules<'a> {
    vehicle: &'a Vehicle,
    road: &'a Road,
}

/// The result of checking the gap behind a lane change destination.
enum Gap {
    Safe,
    /// Too short; these vehicles would have to make room.
    Short(SmallVec<[VehicleId; 2]>),
    /// Directly in front of a vehicle which cannot make room.
    Blocked,
}

impl<'a> Rules<'a> {
    pub fn new(vehicle: &'a Vehicle, road: &'a Road) -> Self {
        Self { vehicle, road }
    }

    pub fn before_move(&self, rng: &mut dyn RngCore) -> Action {
        let mut action = Action {
            yielding: false,
            ..self.vehicle.stay()
        };
        let half = self.road.lane_width() / 2;
        let emergency = half > 0 && self.is_emergency_near();

        if !self.road.is_single_lane(&self.vehicle.footprint()) {
            if emergency {
                self.give_way(&mut action);
            } else if let Some(position) = self.corridor_return(half) {
                log::trace!("{:?} leaves the corridor", self.vehicle.id());
                action.position = position;
            }
            return action;
        }

        if let Some(avoid) = self.avoid_obstacle(rng) {
            return avoid;
        }
        if emergency {
            if self.give_way(&mut action) {
                if let Some(position) = self.corridor_enter(half) {
                    log::trace!("{:?} enters the corridor", self.vehicle.id());
                    action.position = position;
                }
            }
            return action;
        }
        if let Some(position) = self.change_lane(rng) {
            action.position = position;
        }
        action
    }

    pub fn move_forward(&self, rng: &mut dyn RngCore) -> Action {
        let vehicle = self.vehicle;
        if !self.road.is_single_lane(&vehicle.footprint()) {
            return Action {
                velocity: 0,
                ..vehicle.stay()
            };
        }
        let max_speed = self.max_speed(vehicle.position());
        let velocity = match vehicle.kind() {
            _ if vehicle.is_yielding() => vehicle.velocity(),
            VehicleKind::Conventional(driver) if vehicle.velocity() > 0 && driver.will_slow(rng) => {
                vehicle.velocity() - 1
            }
            _ => vehicle.velocity() + 1,
        };
        self.advance(velocity.min(max_speed))
    }

    /// Accelerates towards the maximum speed without any randomness.
    pub fn accelerate(&self) -> Action {
        let max_speed = self.max_speed(self.vehicle.position());
        self.advance((self.vehicle.velocity() + 1).min(max_speed))
    }

    fn advance(&self, velocity: i32) -> Action {
        Action {
            position: self.vehicle.position().shifted(velocity, 0),
            velocity,
            ..self.vehicle.stay()
        }
    }

    /// The highest velocity the vehicle could take with its front at `position`
    /// without running into anything ahead.
    pub fn max_speed(&self, position: Position) -> i32 {
        let vehicle = self.vehicle;
        let limit = self.road.controller().max_speed(position, vehicle.width()) + vehicle.limit();
        vehicle
            .footprint_at(position)
            .front()
            .filter_map(|front| {
                let (x, next) = self.road.next_vehicle(front);
                let next = self.road.vehicle(next?)?;
                Some(x - position.x - 1 + self.speed_bonus(next))
            })
            .fold(limit, i32::min)
            .max(0)
    }

    /// Extra room granted by the vehicle ahead, which is known to move
    /// by its velocity before this one does.
    fn speed_bonus(&self, next: &Vehicle) -> i32 {
        if self.vehicle.is_autonomous() && next.is_autonomous() {
            next.velocity()
        } else {
            0
        }
    }

    /// Whether every destination cell is free.
    fn is_possible(&self, destination: Position) -> bool {
        let footprint = self.vehicle.footprint_at(destination);
        self.road
            .is_footprint_safe(&footprint, Some(self.vehicle.id()))
    }

    /// Whether the vehicle cannot reach its desired speed where it is.
    fn is_required(&self) -> bool {
        self.max_speed(self.vehicle.position()) < self.vehicle.velocity() + 1
    }

    fn is_beneficial(&self, destination: Position) -> bool {
        self.max_speed(destination) > self.vehicle.velocity() + 1
    }

    fn is_safe(&self, destination: Position) -> bool {
        matches!(self.gap(destination), Gap::Safe)
    }

    /// Checks the room between the destination and the vehicles behind it.
    fn gap(&self, destination: Position) -> Gap {
        let vehicle = self.vehicle;
        let footprint = vehicle.footprint_at(destination);
        let mut short = SmallVec::new();
        for front in footprint.front() {
            let (mut x, mut previous) = self.road.previous_vehicle(front);
            if previous == Some(vehicle.id()) {
                let rear = Position::new(vehicle.footprint().rear(), front.lane);
                (x, previous) = self.road.previous_vehicle(rear);
            }
            let Some(previous) = previous.and_then(|id| self.road.vehicle(id)) else {
                continue;
            };
            let distance = self.safe_distance(previous, Position::new(x, front.lane));
            if destination.x - x > vehicle.length() - 1 + distance {
                continue;
            }
            if previous.is_emergency() {
                return Gap::Blocked;
            }
            if !short.contains(&previous.id()) {
                short.push(previous.id());
            }
        }
        if short.is_empty() {
            Gap::Safe
        } else {
            Gap::Short(short)
        }
    }

    /// The room a vehicle behind needs to be left to avoid running into this one.
    fn safe_distance(&self, previous: &Vehicle, position: Position) -> i32 {
        if previous.is_obstacle() {
            0
        } else if self.vehicle.is_autonomous() && previous.is_autonomous() {
            previous.velocity()
        } else {
            self.road.controller().max_speed(position, 1) + previous.limit()
        }
    }

    /// The candidate lateral moves to another logical lane, in random order.
    fn directions(&self, rng: &mut dyn RngCore) -> [i32; 2] {
        let width = self.road.lane_width();
        let mut directions = [-width, width];
        directions.shuffle(rng);
        directions
    }

    /// Finds an obstacle close ahead of the vehicle.
    fn obstacle_ahead(&self) -> Option<VehicleId> {
        let vehicle = self.vehicle;
        let reach = vehicle.velocity().max(1);
        vehicle.footprint().front().find_map(|front| {
            let (x, next) = self.road.next_vehicle(front);
            let next = self.road.vehicle(next?)?;
            (next.is_obstacle() && x - front.x <= reach).then(|| next.id())
        })
    }

    /// Changes lane around an obstacle ahead, asking the vehicles behind
    /// the destination to make room when the gap is short.
    fn avoid_obstacle(&self, rng: &mut dyn RngCore) -> Option<Action> {
        let obstacle = self.obstacle_ahead()?;
        let position = self.vehicle.position();
        let candidates = self
            .directions(rng)
            .into_iter()
            .map(|dlane| position.shifted(0, dlane))
            .filter(|destination| self.is_possible(*destination))
            .filter_map(|destination| {
                let followers = match self.gap(destination) {
                    Gap::Safe => SmallVec::new(),
                    Gap::Short(followers) if self.can_zip(&followers, obstacle) => followers,
                    _ => return None,
                };
                Some((destination, followers))
            });

        let (destination, followers) = if self.vehicle.is_autonomous() {
            let current = self.max_speed(position);
            candidates
                .map(|(destination, followers)| (self.max_speed(destination), destination, followers))
                .filter(|(speed, _, _)| *speed > current)
                .max_by_key(|(speed, _, _)| *speed)
                .map(|(_, destination, followers)| (destination, followers))?
        } else {
            candidates.into_iter().next()?
        };

        log::trace!("{:?} avoids {:?} at {}", self.vehicle.id(), obstacle, destination);
        Some(Action {
            position: destination,
            yielding: false,
            zip: (!followers.is_empty()).then(|| Zip {
                followers,
                obstacle,
            }),
            ..self.vehicle.stay()
        })
    }

    /// Whether the vehicles behind can make room for this one to avoid `obstacle`.
    /// Each can do so only once per obstacle.
    fn can_zip(&self, followers: &[VehicleId], obstacle: VehicleId) -> bool {
        followers.iter().all(|id| {
            self.road
                .vehicle(*id)
                .map_or(false, |follower| follower.is_car() && !follower.zipped().contains(&obstacle))
        })
    }

    /// Makes an ordinary lane change if one is eligible.
    fn change_lane(&self, rng: &mut dyn RngCore) -> Option<Position> {
        let vehicle = self.vehicle;
        let position = vehicle.position();
        let required = self.is_required();
        let eligible = |dlane: i32| {
            let destination = position.shifted(0, dlane);
            let forced = vehicle.driver().map_or(false, |driver| driver.is_forced(dlane));
            self.is_possible(destination)
                && (required || forced)
                && self.is_beneficial(destination)
                && self.is_safe(destination)
        };

        let directions = self.directions(rng);
        let dlane = match vehicle.kind() {
            VehicleKind::Autonomous => directions
                .into_iter()
                .filter(|dlane| eligible(*dlane))
                .max_by_key(|dlane| self.max_speed(position.shifted(0, *dlane)))?,
            VehicleKind::Conventional(driver) => directions
                .into_iter()
                .find(|dlane| eligible(*dlane) && driver.will_change(rng))?,
            _ => directions.into_iter().find(|dlane| eligible(*dlane))?,
        };
        log::trace!("{:?} changes lane by {}", vehicle.id(), dlane);
        Some(position.shifted(0, dlane))
    }

    /// Whether an emergency vehicle is approaching from behind.
    fn is_emergency_near(&self) -> bool {
        let vehicle = self.vehicle;
        let x = vehicle.position().x;
        self.road.emergency_vehicles().any(|emergency| {
            emergency.id() != vehicle.id() && (0..=CORRIDOR_RADIUS).contains(&(x - emergency.position().x))
        })
    }

    /// Slows down for an emergency vehicle, never below a crawl so the
    /// emergency vehicle is not held up when there is no room to move aside.
    /// Returns whether the vehicle is slow enough to move aside.
    fn give_way(&self, action: &mut Action) -> bool {
        let velocity = self.vehicle.velocity();
        action.velocity = (velocity - 1).max(1);
        action.yielding = true;
        velocity <= CORRIDOR_SPEED
    }

    /// Moves half a lane towards the nearer shoulder, if those cells are free.
    fn corridor_enter(&self, half: i32) -> Option<Position> {
        let position = self.vehicle.position();
        let lane = self.road.absolute_position(position).lane;
        let dlane = if lane == 0 { -half } else { half };
        let destination = position.shifted(0, dlane);
        self.is_possible(destination).then_some(destination)
    }

    /// Moves back into a single lane once the emergency vehicle has passed.
    fn corridor_return(&self, half: i32) -> Option<Position> {
        let position = self.vehicle.position();
        let dlane = if position.lane < self.road.emergency_lane() {
            half
        } else {
            -half
        };
        let destination = position.shifted(0, dlane);
        self.is_possible(destination).then_some(destination)
    }
}
