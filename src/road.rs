use self::dense::DenseLanes;
use self::sparse::SparseLanes;
use crate::error::{ConfigError, RoadError};
use crate::vehicle::{Action, Vehicle, VehicleAttributes};
use crate::{Footprint, Position, SpeedController, VehicleId, VehicleSet};
use itertools::Itertools;
use rand::RngCore;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::HashSet;

mod dense;
mod sparse;

/// Storage of the cell occupancy of a road.
///
/// Positions passed in are always proper; bounds are checked by the [Road].
pub(crate) trait LaneStorage {
    /// Gets the vehicle occupying a cell.
    fn get(&self, position: Position) -> Option<VehicleId>;
    /// Marks a cell as occupied by the vehicle.
    fn insert(&mut self, position: Position, id: VehicleId);
    /// Finds the nearest occupied cell strictly ahead on the same sub-lane.
    fn next(&self, position: Position) -> Option<(i32, VehicleId)>;
    /// Finds the nearest occupied cell strictly behind on the same sub-lane.
    fn previous(&self, position: Position) -> Option<(i32, VehicleId)>;
    /// Empties every cell.
    fn clear(&mut self);
    /// Whether no cell is occupied.
    fn is_empty(&self) -> bool;
}

/// The occupancy storage used by a road.
/// Both produce identical simulations; the choice only affects performance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    /// Fixed-size arrays, constant time lookups. Best for congested roads.
    #[default]
    Dense,
    /// Ordered maps, logarithmic neighbour queries. Best for light traffic.
    Sparse,
}

/// The attributes of a road.
#[derive(Clone, Copy, Debug)]
pub struct RoadAttributes {
    /// The length of the road in cells.
    pub length: i32,
    /// The number of logical lanes.
    pub lanes_count: i32,
    /// The number of sub-lanes making up one logical lane.
    pub lane_width: i32,
    /// The occupancy storage.
    pub backend: Backend,
}

impl Default for RoadAttributes {
    fn default() -> Self {
        Self {
            length: 100,
            lanes_count: 1,
            lane_width: 1,
            backend: Backend::Dense,
        }
    }
}

fn sublanes_count(lanes_count: i32, lane_width: i32) -> i32 {
    lanes_count * lane_width + lane_width / 2 * 2
}

/// The step phase being run over every vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    BeforeMove,
    Move,
}

/// A straight multi-lane road divided into cells.
pub struct Road {
    /// The length of the road in cells.
    length: i32,
    /// The number of logical lanes.
    lanes_count: i32,
    /// The number of sub-lanes per logical lane.
    lane_width: i32,
    /// The speed limits.
    controller: SpeedController,
    /// The storage kind of `lanes` and `pending`.
    backend: Backend,
    /// The vehicles currently on the road.
    vehicles: VehicleSet,
    /// The committed occupancy.
    lanes: Box<dyn LaneStorage>,
    /// The occupancy being built during a step phase.
    pending: Box<dyn LaneStorage>,
    /// The emergency vehicles on the road.
    emergency: Vec<VehicleId>,
    /// The vehicles which left the road in the most recent step.
    removed: Vec<Vehicle>,
    /// The vehicles leaving the road once the current phase is committed.
    leaving: Vec<VehicleId>,
}

impl Road {
    /// Creates a new, empty road.
    pub fn new(attributes: &RoadAttributes, controller: SpeedController) -> Result<Self, ConfigError> {
        let min = |field, value: i32| {
            if value < 1 {
                Err(ConfigError::MinViolation {
                    field,
                    min: 1,
                    value: value as i64,
                })
            } else {
                Ok(())
            }
        };
        min("length", attributes.length)?;
        min("lanes_count", attributes.lanes_count)?;
        min("lane_width", attributes.lane_width)?;

        let sublanes = sublanes_count(attributes.lanes_count, attributes.lane_width);
        let empty_lanes = || -> Box<dyn LaneStorage> {
            match attributes.backend {
                Backend::Dense => Box::new(DenseLanes::new(attributes.length, sublanes)),
                Backend::Sparse => Box::new(SparseLanes::new(sublanes)),
            }
        };
        Ok(Self {
            length: attributes.length,
            lanes_count: attributes.lanes_count,
            lane_width: attributes.lane_width,
            controller,
            backend: attributes.backend,
            vehicles: VehicleSet::with_key(),
            lanes: empty_lanes(),
            pending: empty_lanes(),
            emergency: vec![],
            removed: vec![],
            leaving: vec![],
        })
    }

    /// The length of the road in cells.
    pub fn length(&self) -> i32 {
        self.length
    }

    /// The number of logical lanes.
    pub fn lanes_count(&self) -> i32 {
        self.lanes_count
    }

    /// The number of sub-lanes per logical lane.
    pub fn lane_width(&self) -> i32 {
        self.lane_width
    }

    /// The occupancy storage in use.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// The number of physical sub-lanes, including the shoulder
    /// of `lane_width / 2` sub-lanes on either edge.
    pub fn sublanes_count(&self) -> i32 {
        sublanes_count(self.lanes_count, self.lane_width)
    }

    /// The sub-lane emergency vehicles are dispatched on.
    pub fn emergency_lane(&self) -> i32 {
        self.lane_width
    }

    /// The speed limits of the road.
    pub fn controller(&self) -> &SpeedController {
        &self.controller
    }

    /// Converts a logical `(offset, lane)` position into a physical one,
    /// addressing the first sub-lane of the logical lane.
    pub fn relative_position(&self, position: Position) -> Position {
        Position::new(
            position.x,
            position.lane * self.lane_width + self.lane_width / 2,
        )
    }

    /// Converts a physical position into the logical lane containing it.
    /// Shoulder sub-lanes map to lanes `-1` and `lanes_count`.
    pub fn absolute_position(&self, position: Position) -> Position {
        Position::new(
            position.x,
            (position.lane - self.lane_width / 2).div_euclid(self.lane_width),
        )
    }

    /// Whether the full width of the footprint lies within one logical lane.
    pub fn is_single_lane(&self, footprint: &Footprint) -> bool {
        let start = self.absolute_position(footprint.position).lane;
        let end = self
            .absolute_position(footprint.position.shifted(0, footprint.width - 1))
            .lane;
        start == end
    }

    /// Places a vehicle on the road.
    pub fn add_vehicle(&mut self, attributes: &VehicleAttributes) -> Result<VehicleId, RoadError> {
        let footprint = attributes.footprint();
        for position in footprint.cells() {
            if !self.is_proper_position(position) {
                return Err(RoadError::OutOfBounds { position });
            }
            if self.lanes.get(position).is_some() {
                return Err(RoadError::Collision { position });
            }
        }
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, attributes));
        for position in footprint.cells() {
            self.lanes.insert(position, id);
        }
        Ok(id)
    }

    /// Places an emergency vehicle on the road and tracks it
    /// for corridor formation.
    pub fn add_emergency_vehicle(
        &mut self,
        attributes: &VehicleAttributes,
    ) -> Result<VehicleId, RoadError> {
        if !attributes.kind.is_emergency() {
            return Err(RoadError::NotEmergency);
        }
        let id = self.add_vehicle(attributes)?;
        self.emergency.push(id);
        Ok(id)
    }

    /// Gets a vehicle on the road by its ID.
    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    /// Gets the vehicle occupying a cell.
    ///
    /// # Panics
    /// If the position is not on the road.
    pub fn get_vehicle(&self, position: Position) -> Option<VehicleId> {
        self.check_position(position);
        self.lanes.get(position)
    }

    /// Returns every vehicle on the road exactly once,
    /// front of the road first, then by sub-lane.
    pub fn get_all_vehicles(&self) -> impl Iterator<Item = &Vehicle> + '_ {
        self.vehicles
            .values()
            .sorted_by_key(|vehicle| (Reverse(vehicle.position().x), vehicle.position().lane))
    }

    /// The number of vehicles on the road.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// The vehicles which left the road during the most recent step.
    pub fn removed(&self) -> &[Vehicle] {
        &self.removed
    }

    /// The emergency vehicles on the road.
    pub fn emergency_vehicles(&self) -> impl Iterator<Item = &Vehicle> + '_ {
        self.emergency.iter().filter_map(|id| self.vehicles.get(*id))
    }

    /// Places a vehicle already on the road into the pending occupancy,
    /// at its current position.
    pub fn add_pending_vehicle(&mut self, id: VehicleId) -> Result<(), RoadError> {
        let Some(vehicle) = self.vehicles.get(id) else {
            return Ok(());
        };
        let footprint = vehicle.footprint();
        for position in footprint.cells() {
            if !self.is_proper_position(position) {
                return Err(RoadError::OutOfBounds { position });
            }
            if self.pending.get(position).is_some() {
                return Err(RoadError::Collision { position });
            }
        }
        for position in footprint.cells() {
            self.pending.insert(position, id);
        }
        Ok(())
    }

    /// Gets the vehicle occupying a cell in the pending occupancy.
    ///
    /// # Panics
    /// If the position is not on the road.
    pub fn get_pending_vehicle(&self, position: Position) -> Option<VehicleId> {
        self.check_position(position);
        self.pending.get(position)
    }

    /// Finds the nearest vehicle strictly ahead of the position on its sub-lane.
    /// Returns `(length, None)` if there is none.
    ///
    /// # Panics
    /// If the position is not on the road.
    pub fn next_vehicle(&self, position: Position) -> (i32, Option<VehicleId>) {
        self.check_position(position);
        match self.lanes.next(position) {
            Some((x, id)) => (x, Some(id)),
            None => (self.length, None),
        }
    }

    /// Finds the nearest vehicle strictly behind the position on its sub-lane.
    /// Returns `(-1, None)` if there is none.
    ///
    /// # Panics
    /// If the position is not on the road.
    pub fn previous_vehicle(&self, position: Position) -> (i32, Option<VehicleId>) {
        self.check_position(position);
        match self.lanes.previous(position) {
            Some((x, id)) => (x, Some(id)),
            None => (-1, None),
        }
    }

    /// Whether the position lies on the road.
    pub fn is_proper_position(&self, position: Position) -> bool {
        (0..self.length).contains(&position.x) && (0..self.sublanes_count()).contains(&position.lane)
    }

    /// Whether the position is on the road and free in both the committed
    /// and pending occupancy, disregarding the `ignore` vehicle.
    pub fn is_safe_position(&self, position: Position, ignore: Option<VehicleId>) -> bool {
        if !self.is_proper_position(position) {
            return false;
        }
        let free = |occupant: Option<VehicleId>| occupant.is_none() || occupant == ignore;
        free(self.lanes.get(position)) && free(self.pending.get(position))
    }

    /// Whether every cell of the footprint is safe.
    pub fn is_footprint_safe(&self, footprint: &Footprint, ignore: Option<VehicleId>) -> bool {
        footprint
            .cells()
            .all(|position| self.is_safe_position(position, ignore))
    }

    /// Whether the vehicle described can be placed on the road.
    pub fn can_place_vehicle(&self, attributes: &VehicleAttributes) -> bool {
        self.is_footprint_safe(&attributes.footprint(), None)
    }

    /// Advances every vehicle on the road by one step.
    pub fn step(&mut self, rng: &mut dyn RngCore) -> Result<(), RoadError> {
        self.removed.clear();
        self.update_lanes(Phase::BeforeMove, rng)?;
        self.update_lanes(Phase::Move, rng)
    }

    /// Mutable access to the vehicles, for adjusting per-vehicle parameters.
    pub(crate) fn vehicles_mut(&mut self) -> impl Iterator<Item = &mut Vehicle> + '_ {
        self.vehicles.values_mut()
    }

    /// Makes the pending occupancy the committed one.
    pub(crate) fn commit_lanes(&mut self) {
        std::mem::swap(&mut self.lanes, &mut self.pending);
        self.pending.clear();
    }

    /// Runs one phase over every vehicle. All decisions are made against the
    /// occupancy committed at the start of the phase; results are only
    /// written to the pending occupancy, which is committed at the end.
    fn update_lanes(&mut self, phase: Phase, rng: &mut dyn RngCore) -> Result<(), RoadError> {
        debug_assert!(self.pending.is_empty());
        let order = self.get_all_vehicles().map(Vehicle::id).collect::<Vec<_>>();
        let mut visited = HashSet::with_capacity(order.len());

        for id in order {
            if !visited.insert(id) {
                continue;
            }
            let vehicle = &self.vehicles[id];
            let action = match phase {
                Phase::BeforeMove => vehicle.before_move(self, rng),
                Phase::Move => vehicle.move_forward(self, rng),
            };
            self.apply(id, phase, action);

            if self.vehicles[id].position().x < self.length {
                self.add_pending_vehicle(id)?;
            } else {
                self.leaving.push(id);
            }
        }

        self.commit_lanes();
        for id in std::mem::take(&mut self.leaving) {
            self.remove_vehicle(id);
        }
        Ok(())
    }

    /// Applies the outcome of a vehicle's decision.
    fn apply(&mut self, id: VehicleId, phase: Phase, mut action: Action) {
        if let Some(zip) = action.zip.take() {
            for follower_id in zip.followers {
                if let Some(follower) = self.vehicles.get_mut(follower_id) {
                    log::trace!("{:?} lets {:?} merge ahead of {:?}", follower_id, id, zip.obstacle);
                    #[cfg(feature = "debug")]
                    crate::debug::debug_zip(follower_id, id, zip.obstacle);
                    follower.promise_zip(zip.obstacle);
                }
            }
        }
        if phase == Phase::BeforeMove {
            self.expire_zips(id);
        }
        #[cfg(feature = "debug")]
        let lane_width = self.lane_width;
        let vehicle = &mut self.vehicles[id];
        if phase == Phase::BeforeMove {
            vehicle.begin_step();
        }
        #[cfg(feature = "debug")]
        {
            match action.position.lane - vehicle.position().lane {
                0 => {}
                dlane if dlane.abs() == lane_width => {
                    crate::debug::debug_lane_change(id, vehicle.position(), action.position)
                }
                _ => crate::debug::debug_corridor(id, action.position),
            }
        }
        vehicle.apply(action);
    }

    /// Drops the zipping promises a vehicle made for obstacles it has passed or which are gone.
    fn expire_zips(&mut self, id: VehicleId) {
        let x = self.vehicles[id].position().x;
        let expired = self.vehicles[id]
            .zipped()
            .iter()
            .copied()
            .filter(|obstacle| {
                self.vehicles
                    .get(*obstacle)
                    .map_or(true, |obstacle| obstacle.position().x < x)
            })
            .collect::<SmallVec<[VehicleId; 2]>>();
        if !expired.is_empty() {
            self.vehicles[id].retain_zips(|obstacle| !expired.contains(obstacle));
        }
    }

    /// Takes a vehicle off the road, keeping it in `removed` until the next step.
    fn remove_vehicle(&mut self, id: VehicleId) {
        if let Some(vehicle) = self.vehicles.remove(id) {
            log::debug!("{:?} left the road at {}", id, vehicle.position());
            self.emergency.retain(|other| *other != id);
            self.removed.push(vehicle);
        }
    }

    fn check_position(&self, position: Position) {
        assert!(
            self.is_proper_position(position),
            "position {} is not on the road",
            position
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::VehicleKind;
    use rand::rngs::mock::StepRng;

    const BACKENDS: [Backend; 2] = [Backend::Dense, Backend::Sparse];

    fn road(backend: Backend, length: i32, lanes_count: i32) -> Road {
        let attributes = RoadAttributes {
            length,
            lanes_count,
            lane_width: 1,
            backend,
        };
        Road::new(&attributes, SpeedController::default()).unwrap()
    }

    fn obstacle(x: i32, lane: i32, length: i32) -> VehicleAttributes {
        VehicleAttributes::new(VehicleKind::Obstacle, Position::new(x, lane)).with_size(length, 1)
    }

    #[test]
    fn rejects_empty_geometry() {
        let attributes = RoadAttributes {
            length: 0,
            ..Default::default()
        };
        let result = Road::new(&attributes, SpeedController::default());
        assert!(matches!(result, Err(ConfigError::MinViolation { field: "length", .. })));
    }

    #[test]
    fn add_vehicle() {
        for backend in BACKENDS {
            let mut road = road(backend, 100, 1);
            assert!(road.add_vehicle(&obstacle(0, 0, 1)).is_ok());

            let result = road.add_vehicle(&obstacle(100, 0, 1));
            assert!(matches!(result, Err(RoadError::OutOfBounds { .. })));
            let result = road.add_vehicle(&obstacle(5, 1, 1));
            assert!(matches!(result, Err(RoadError::OutOfBounds { .. })));
            let result = road.add_vehicle(&obstacle(0, 0, 1));
            assert_eq!(
                result,
                Err(RoadError::Collision {
                    position: Position::new(0, 0)
                })
            );
            // A long vehicle whose rear overlaps another vehicle.
            let result = road.add_vehicle(&obstacle(2, 0, 3));
            assert!(matches!(result, Err(RoadError::Collision { .. })));
            assert_eq!(road.vehicle_count(), 1);
        }
    }

    #[test]
    fn get_vehicle() {
        for backend in BACKENDS {
            let mut road = road(backend, 100, 1);
            let id = road.add_vehicle(&obstacle(1, 0, 2)).unwrap();
            assert_eq!(road.get_vehicle(Position::new(1, 0)), Some(id));
            assert_eq!(road.get_vehicle(Position::new(0, 0)), Some(id));
            assert_eq!(road.get_vehicle(Position::new(2, 0)), None);
        }
    }

    #[test]
    #[should_panic]
    fn get_vehicle_out_of_bounds() {
        road(Backend::Sparse, 100, 1).get_vehicle(Position::new(100, 0));
    }

    #[test]
    #[should_panic]
    fn next_vehicle_out_of_bounds() {
        road(Backend::Dense, 100, 1).next_vehicle(Position::new(0, -1));
    }

    #[test]
    fn all_vehicles_front_first() {
        for backend in BACKENDS {
            let mut road = road(backend, 100, 2);
            let mut ids = vec![];
            for x in 0..100 {
                for lane in 0..2 {
                    ids.push(road.add_vehicle(&obstacle(x, lane, 1)).unwrap());
                }
            }
            let result = road.get_all_vehicles().map(Vehicle::id).collect::<Vec<_>>();
            let expected = ids
                .chunks(2)
                .rev()
                .flatten()
                .copied()
                .collect::<Vec<_>>();
            assert_eq!(result, expected);
        }
    }

    #[test]
    fn long_vehicles_listed_once() {
        for backend in BACKENDS {
            let mut road = road(backend, 100, 1);
            for x in (1..100).step_by(2) {
                road.add_vehicle(&obstacle(x, 0, 2)).unwrap();
            }
            assert_eq!(road.get_all_vehicles().count(), 50);
        }
    }

    #[test]
    fn pending_vehicles() {
        for backend in BACKENDS {
            let mut road = road(backend, 100, 1);
            let a = road.add_vehicle(&obstacle(1, 0, 2)).unwrap();
            let b = road.add_vehicle(&obstacle(5, 0, 1)).unwrap();
            road.add_pending_vehicle(a).unwrap();
            assert_eq!(road.get_pending_vehicle(Position::new(0, 0)), Some(a));
            assert_eq!(road.get_pending_vehicle(Position::new(1, 0)), Some(a));
            assert_eq!(road.get_pending_vehicle(Position::new(5, 0)), None);

            // Overlapping pending placement.
            road.vehicles[b].set_position(Position::new(1, 0));
            let result = road.add_pending_vehicle(b);
            assert!(matches!(result, Err(RoadError::Collision { .. })));
        }
    }

    #[test]
    fn commit_lanes() {
        for backend in BACKENDS {
            let mut road = road(backend, 100, 1);
            let ids = (0..100)
                .map(|x| road.add_vehicle(&obstacle(x, 0, 1)).unwrap())
                .collect::<Vec<_>>();
            for id in &ids {
                road.add_pending_vehicle(*id).unwrap();
            }
            road.commit_lanes();
            for (x, id) in ids.iter().enumerate() {
                assert_eq!(road.get_vehicle(Position::new(x as i32, 0)), Some(*id));
                assert_eq!(road.get_pending_vehicle(Position::new(x as i32, 0)), None);
            }
        }
    }

    #[test]
    fn next_vehicle() {
        for backend in BACKENDS {
            let mut road = road(backend, 100, 2);
            let id = road.add_vehicle(&obstacle(10, 0, 1)).unwrap();
            for x in 0..10 {
                assert_eq!(road.next_vehicle(Position::new(x, 0)), (10, Some(id)));
            }
            for x in 10..100 {
                assert_eq!(road.next_vehicle(Position::new(x, 0)), (100, None));
            }
            for x in 0..100 {
                assert_eq!(road.next_vehicle(Position::new(x, 1)), (100, None));
            }
        }
    }

    #[test]
    fn previous_vehicle() {
        for backend in BACKENDS {
            let mut road = road(backend, 100, 2);
            let id = road.add_vehicle(&obstacle(90, 0, 1)).unwrap();
            for x in 0..91 {
                assert_eq!(road.previous_vehicle(Position::new(x, 0)), (-1, None));
            }
            for x in 91..100 {
                assert_eq!(road.previous_vehicle(Position::new(x, 0)), (90, Some(id)));
            }
            for x in 0..100 {
                assert_eq!(road.previous_vehicle(Position::new(x, 1)), (-1, None));
            }
        }
    }

    #[test]
    fn safe_positions() {
        let mut road = road(Backend::Dense, 100, 2);
        let a = road.add_vehicle(&obstacle(3, 0, 1)).unwrap();
        assert!(road.is_safe_position(Position::new(4, 0), None));
        assert!(!road.is_safe_position(Position::new(3, 0), None));
        assert!(road.is_safe_position(Position::new(3, 0), Some(a)));
        assert!(!road.is_safe_position(Position::new(-1, 0), None));
        assert!(!road.is_safe_position(Position::new(0, 2), None));

        road.add_pending_vehicle(a).unwrap();
        road.vehicles[a].set_position(Position::new(3, 1));
        assert!(!road.is_safe_position(Position::new(3, 0), None));

        let long = VehicleAttributes::new(VehicleKind::Car, Position::new(5, 0)).with_size(3, 1);
        assert!(!road.can_place_vehicle(&long));
        let long = VehicleAttributes::new(VehicleKind::Car, Position::new(6, 0)).with_size(3, 1);
        assert!(road.can_place_vehicle(&long));
    }

    #[test]
    fn sublane_geometry() {
        let attributes = RoadAttributes {
            length: 10,
            lanes_count: 3,
            lane_width: 2,
            backend: Backend::Dense,
        };
        let road = Road::new(&attributes, SpeedController::default()).unwrap();
        assert_eq!(road.sublanes_count(), 8);
        assert_eq!(road.emergency_lane(), 2);
        for lane in 0..3 {
            let relative = road.relative_position(Position::new(4, lane));
            assert_eq!(relative, Position::new(4, 2 * lane + 1));
            assert_eq!(road.absolute_position(relative), Position::new(4, lane));
            let second = relative.shifted(0, 1);
            assert_eq!(road.absolute_position(second), Position::new(4, lane));
        }
        assert_eq!(road.absolute_position(Position::new(0, 0)).lane, -1);
        assert_eq!(road.absolute_position(Position::new(0, 7)).lane, 3);

        let single = Footprint::new(Position::new(0, 1), 1, 2);
        assert!(road.is_single_lane(&single));
        let straddling = Footprint::new(Position::new(0, 2), 1, 2);
        assert!(!road.is_single_lane(&straddling));
    }

    #[test]
    fn emergency_vehicles() {
        let mut road = road(Backend::Sparse, 10, 1);
        let result = road.add_emergency_vehicle(&obstacle(0, 0, 1));
        assert_eq!(result, Err(RoadError::NotEmergency));

        let attributes = VehicleAttributes::new(VehicleKind::Emergency, Position::new(9, 0))
            .with_velocity(5);
        let id = road.add_emergency_vehicle(&attributes).unwrap();
        assert_eq!(road.emergency_vehicles().map(Vehicle::id).collect::<Vec<_>>(), vec![id]);

        road.step(&mut StepRng::new(0, 0)).unwrap();
        assert_eq!(road.emergency_vehicles().count(), 0);
        assert_eq!(road.removed().len(), 1);
        assert_eq!(road.removed()[0].id(), id);
    }

    #[test]
    fn zip_promise_expires_past_obstacle() {
        for backend in BACKENDS {
            let mut road = road(backend, 100, 2);
            let obstacle = road.add_vehicle(&obstacle(10, 0, 1)).unwrap();
            let car = |x, lane| {
                VehicleAttributes::new(VehicleKind::Car, Position::new(x, lane)).with_velocity(1)
            };
            let merging = road.add_vehicle(&car(9, 0)).unwrap();
            let follower = road.add_vehicle(&car(8, 1)).unwrap();

            let mut rng = StepRng::new(0, 0);
            road.step(&mut rng).unwrap();
            assert_eq!(road.vehicle(merging).unwrap().position().lane, 1);
            assert_eq!(road.vehicle(follower).unwrap().zipped(), &[obstacle]);

            while road.vehicle(follower).unwrap().position().x <= 10 {
                assert_eq!(road.vehicle(follower).unwrap().zipped(), &[obstacle]);
                road.step(&mut rng).unwrap();
            }
            road.step(&mut rng).unwrap();
            assert!(road.vehicle(follower).unwrap().zipped().is_empty());
        }
    }

    #[test]
    fn step_visits_each_vehicle_once() {
        for backend in BACKENDS {
            let mut road = road(backend, 10, 1);
            for x in (1..10).step_by(2) {
                road.add_vehicle(&obstacle(x, 0, 2)).unwrap();
            }
            road.step(&mut StepRng::new(0, 0)).unwrap();
            assert_eq!(road.vehicle_count(), 5);
            assert!(road.removed().is_empty());
        }
    }

    #[test]
    fn step_removes_vehicles_leaving_the_road() {
        for backend in BACKENDS {
            let mut road = road(backend, 10, 1);
            for x in [0, 2, 4, 6, 8] {
                let attributes = VehicleAttributes::new(VehicleKind::Car, Position::new(x, 0))
                    .with_velocity(1);
                road.add_vehicle(&attributes).unwrap();
            }
            road.step(&mut StepRng::new(0, 0)).unwrap();
            // The front car reaches offset 10 and leaves.
            assert_eq!(road.vehicle_count(), 4);
            assert_eq!(road.removed().len(), 1);
            assert_eq!(road.removed()[0].position().x, 10);

            road.step(&mut StepRng::new(0, 0)).unwrap();
            assert!(road.removed().iter().all(|v| v.position().x >= 10));
        }
    }
}
