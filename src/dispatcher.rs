use crate::error::RoadError;
use crate::{Driver, Position, Road, VehicleAttributes, VehicleKind};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

/// The kinds of cars a dispatcher creates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fleet {
    /// Plain cars only.
    Plain,
    /// Autonomous cars only.
    Autonomous,
    /// Conventional cars driven by the given driver.
    Conventional(Driver),
    /// Autonomous cars with probability `penetration`, otherwise conventional ones.
    Mixed { penetration: f64, driver: Driver },
}

/// Periodically sends an emergency vehicle onto the road.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmergencySchedule {
    /// The number of steps between emergency vehicles.
    frequency: u32,
    /// The steps since the last emergency vehicle, modulo `frequency`.
    steps: u32,
}

impl EmergencySchedule {
    /// Creates a schedule sending an emergency vehicle every `frequency` steps,
    /// or `None` if `frequency` is zero.
    pub fn new(frequency: u32) -> Option<Self> {
        (frequency > 0).then_some(Self {
            frequency,
            steps: 0,
        })
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Advances by one step, returning whether an emergency vehicle is due.
    fn tick(&mut self) -> bool {
        self.steps = (self.steps + 1) % self.frequency;
        self.steps == 0
    }

    /// Makes the emergency vehicle due again on the next step.
    fn retry(&mut self) {
        self.steps = self.frequency - 1;
    }
}

/// Creates new vehicles at the start of the road.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    /// The maximum number of vehicles added to the backlog each step.
    count: u32,
    /// The vehicles waiting to enter the road.
    remaining: u32,
    /// The length of dispatched vehicles, in cells.
    car_length: i32,
    /// The speed limit offset of dispatched cars.
    limit: i32,
    /// The kinds of cars dispatched.
    fleet: Fleet,
    /// The emergency vehicle schedule, if any.
    emergency: Option<EmergencySchedule>,
}

impl Dispatcher {
    /// Creates a dispatcher adding up to `count` vehicles to its backlog each step.
    pub fn new(count: u32, fleet: Fleet) -> Self {
        Self {
            count,
            remaining: 0,
            car_length: 1,
            limit: 0,
            fleet,
            emergency: None,
        }
    }

    pub fn with_car_length(mut self, car_length: i32) -> Self {
        self.car_length = car_length.max(1);
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_emergency(mut self, schedule: Option<EmergencySchedule>) -> Self {
        self.emergency = schedule;
        self
    }

    /// The number of vehicles waiting to enter the road.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn fleet(&self) -> Fleet {
        self.fleet
    }

    pub fn car_length(&self) -> i32 {
        self.car_length
    }

    /// Places waiting vehicles at the start of the road, at most one per lane.
    pub fn dispatch(&mut self, road: &mut Road, rng: &mut dyn RngCore) -> Result<(), RoadError> {
        self.dispatch_emergency(road)?;

        self.remaining += rng.gen_range(0..=self.count);
        let mut lanes = (0..road.lanes_count()).collect::<Vec<_>>();
        lanes.shuffle(rng);
        for lane in lanes {
            if self.remaining == 0 {
                break;
            }
            let position = road.relative_position(Position::new(self.car_length - 1, lane));
            let attributes = self.new_vehicle(road, position, rng);
            if !road.can_place_vehicle(&attributes) {
                continue;
            }
            let id = road.add_vehicle(&attributes)?;
            log::debug!("dispatched {:?} ({:?}) on lane {}", id, attributes.kind, lane);
            self.remaining -= 1;
        }
        Ok(())
    }

    fn dispatch_emergency(&mut self, road: &mut Road) -> Result<(), RoadError> {
        let car_length = self.car_length;
        let Some(schedule) = self.emergency.as_mut() else {
            return Ok(());
        };
        if !schedule.tick() {
            return Ok(());
        }
        let position = Position::new(car_length - 1, road.emergency_lane());
        let attributes = VehicleAttributes::new(VehicleKind::Emergency, position)
            .with_velocity(road.controller().max_speed(position, 1))
            .with_size(car_length, 1);
        if road.can_place_vehicle(&attributes) {
            let id = road.add_emergency_vehicle(&attributes)?;
            log::debug!("dispatched emergency vehicle {:?}", id);
        } else {
            log::debug!("emergency lane blocked, retrying next step");
            schedule.retry();
        }
        Ok(())
    }

    /// Builds a new car of the fleet with its front at `position`,
    /// entering at the speed limit.
    pub fn new_vehicle(
        &self,
        road: &Road,
        position: Position,
        rng: &mut dyn RngCore,
    ) -> VehicleAttributes {
        let kind = match self.fleet {
            Fleet::Plain => VehicleKind::Car,
            Fleet::Autonomous => VehicleKind::Autonomous,
            Fleet::Conventional(driver) => VehicleKind::Conventional(driver),
            Fleet::Mixed {
                penetration,
                driver,
            } => {
                if rng.gen::<f64>() < penetration {
                    VehicleKind::Autonomous
                } else {
                    VehicleKind::Conventional(driver)
                }
            }
        };
        let width = road.lane_width();
        VehicleAttributes::new(kind, position)
            .with_velocity(road.controller().max_speed(position, width))
            .with_size(self.car_length, width)
            .with_limit(self.limit)
    }
}
