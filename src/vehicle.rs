use self::car::Rules;
use crate::{Footprint, Position, Road, VehicleId};
use rand::RngCore;
use smallvec::SmallVec;

pub use self::driver::Driver;

mod car;
mod driver;

/// The behaviour of a vehicle, fixed when the vehicle is created.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VehicleKind {
    /// A stationary blockage.
    Obstacle,
    /// A car following the base car-following and lane-changing rules.
    Car,
    /// A car cooperating with other autonomous cars, free of randomness.
    Autonomous,
    /// A car driven by a human with the given driver parameters.
    Conventional(Driver),
    /// A vehicle others form a corridor for. Never changes lane.
    Emergency,
}

impl VehicleKind {
    /// Whether vehicles of this kind follow the car rules and can yield space.
    pub fn is_car(&self) -> bool {
        matches!(self, Self::Car | Self::Autonomous | Self::Conventional(_))
    }

    pub fn is_autonomous(&self) -> bool {
        matches!(self, Self::Autonomous)
    }

    pub fn is_conventional(&self) -> bool {
        matches!(self, Self::Conventional(_))
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, Self::Emergency)
    }

    pub fn is_obstacle(&self) -> bool {
        matches!(self, Self::Obstacle)
    }
}

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID.
    id: VehicleId,
    /// The vehicle's behaviour.
    kind: VehicleKind,
    /// The cell of the front of the vehicle on its first sub-lane.
    position: Position,
    /// The position at the start of the current step.
    last_position: Position,
    /// The velocity in cells per step.
    velocity: i32,
    /// The velocity at the start of the current step.
    last_velocity: i32,
    /// The number of cells the vehicle covers along the road.
    length: i32,
    /// The number of sub-lanes the vehicle covers.
    width: i32,
    /// A signed offset added to the speed limit for this vehicle.
    limit: i32,
    /// The obstacles this vehicle has promised to let another vehicle merge in front of.
    zipped: SmallVec<[VehicleId; 2]>,
    /// Whether the vehicle is giving way to an emergency vehicle.
    yielding: bool,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
pub struct VehicleAttributes {
    /// The vehicle's behaviour.
    pub kind: VehicleKind,
    /// The cell of the front of the vehicle on its first sub-lane.
    pub position: Position,
    /// The initial velocity in cells per step.
    pub velocity: i32,
    /// The number of cells the vehicle covers along the road.
    pub length: i32,
    /// The number of sub-lanes the vehicle covers.
    pub width: i32,
    /// A signed offset added to the speed limit for this vehicle.
    pub limit: i32,
}

/// The outcome of a vehicle's decision for one step phase.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Action {
    pub position: Position,
    pub velocity: i32,
    pub yielding: bool,
    /// Vehicles which let this one merge in front of them to avoid an obstacle.
    pub zip: Option<Zip>,
}

/// A promise by the vehicles behind a merge point to make room for an obstacle-avoiding vehicle.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Zip {
    pub followers: SmallVec<[VehicleId; 2]>,
    pub obstacle: VehicleId,
}

impl VehicleAttributes {
    /// A stationary vehicle one cell in size.
    pub fn new(kind: VehicleKind, position: Position) -> Self {
        Self {
            kind,
            position,
            velocity: 0,
            length: 1,
            width: 1,
            limit: 0,
        }
    }

    pub fn with_velocity(mut self, velocity: i32) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_size(mut self, length: i32, width: i32) -> Self {
        self.length = length;
        self.width = width;
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    /// The cells the vehicle would cover.
    pub fn footprint(&self) -> Footprint {
        Footprint::new(self.position, self.length, self.width)
    }
}

impl Vehicle {
    /// Creates a new vehicle.
    pub(crate) fn new(id: VehicleId, attributes: &VehicleAttributes) -> Self {
        Self {
            id,
            kind: attributes.kind,
            position: attributes.position,
            last_position: attributes.position,
            velocity: attributes.velocity,
            last_velocity: attributes.velocity,
            length: attributes.length,
            width: attributes.width,
            limit: attributes.limit,
            zipped: SmallVec::new(),
            yielding: false,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn kind(&self) -> VehicleKind {
        self.kind
    }

    /// The cell of the front of the vehicle on its first sub-lane.
    pub fn position(&self) -> Position {
        self.position
    }

    /// The position at the start of the most recent step.
    pub fn last_position(&self) -> Position {
        self.last_position
    }

    /// The velocity in cells per step.
    pub fn velocity(&self) -> i32 {
        self.velocity
    }

    /// The velocity at the start of the most recent step.
    pub fn last_velocity(&self) -> i32 {
        self.last_velocity
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    /// The signed offset added to the speed limit for this vehicle.
    pub fn limit(&self) -> i32 {
        self.limit
    }

    /// The driver parameters of a conventional vehicle.
    pub fn driver(&self) -> Option<Driver> {
        match self.kind {
            VehicleKind::Conventional(driver) => Some(driver),
            _ => None,
        }
    }

    /// Whether the vehicle is giving way to an emergency vehicle.
    pub fn is_yielding(&self) -> bool {
        self.yielding
    }

    /// The obstacles this vehicle has let another vehicle merge in front of.
    pub fn zipped(&self) -> &[VehicleId] {
        &self.zipped
    }

    pub fn is_car(&self) -> bool {
        self.kind.is_car()
    }

    pub fn is_autonomous(&self) -> bool {
        self.kind.is_autonomous()
    }

    pub fn is_conventional(&self) -> bool {
        self.kind.is_conventional()
    }

    pub fn is_emergency(&self) -> bool {
        self.kind.is_emergency()
    }

    pub fn is_obstacle(&self) -> bool {
        self.kind.is_obstacle()
    }

    /// The cells the vehicle covers.
    pub fn footprint(&self) -> Footprint {
        self.footprint_at(self.position)
    }

    /// The cells the vehicle would cover if it were at `position`.
    pub fn footprint_at(&self, position: Position) -> Footprint {
        Footprint::new(position, self.length, self.width)
    }

    /// Decides the vehicle's lateral move for the step.
    pub(crate) fn before_move(&self, road: &Road, rng: &mut dyn RngCore) -> Action {
        match self.kind {
            VehicleKind::Obstacle | VehicleKind::Emergency => self.stay(),
            _ => Rules::new(self, road).before_move(rng),
        }
    }

    /// Decides the vehicle's velocity and forward move for the step.
    pub(crate) fn move_forward(&self, road: &Road, rng: &mut dyn RngCore) -> Action {
        match self.kind {
            VehicleKind::Obstacle => Action {
                velocity: 0,
                ..self.stay()
            },
            VehicleKind::Emergency => Rules::new(self, road).accelerate(),
            _ => Rules::new(self, road).move_forward(rng),
        }
    }

    /// An action leaving the vehicle where it is.
    pub(crate) fn stay(&self) -> Action {
        Action {
            position: self.position,
            velocity: self.velocity,
            yielding: self.yielding,
            zip: None,
        }
    }

    /// Records the state at the start of a step.
    pub(crate) fn begin_step(&mut self) {
        self.last_position = self.position;
        self.last_velocity = self.velocity;
    }

    pub(crate) fn apply(&mut self, action: Action) {
        self.position = action.position;
        self.velocity = action.velocity;
        self.yielding = action.yielding;
    }

    /// Promises to make room in front of this vehicle for a vehicle avoiding `obstacle`.
    pub(crate) fn promise_zip(&mut self, obstacle: VehicleId) {
        if !self.zipped.contains(&obstacle) {
            self.zipped.push(obstacle);
        }
    }

    /// Drops promises for which `keep` returns false.
    pub(crate) fn retain_zips(&mut self, mut keep: impl FnMut(&VehicleId) -> bool) {
        self.zipped.retain(|id| keep(id));
    }

    pub(crate) fn set_limit(&mut self, limit: i32) {
        self.limit = limit;
    }

    #[cfg(test)]
    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}
