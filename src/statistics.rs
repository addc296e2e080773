//! Aggregates over the state of a road, collected by hooks after every step.

use crate::{Road, Vehicle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

pub use self::collector::{Collector, Statistics};
pub use self::tracker::{StepRecord, Tracker};

mod collector;
mod tracker;

/// A sum of values with the number of values summed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageResult {
    pub value: i64,
    pub count: i64,
}

impl AverageResult {
    pub const fn new(value: i64, count: i64) -> Self {
        Self { value, count }
    }

    /// The average, or `None` if nothing was summed.
    pub fn as_f64(&self) -> Option<f64> {
        (self.count != 0).then(|| self.value as f64 / self.count as f64)
    }

    pub fn as_f64_or_zero(&self) -> f64 {
        self.as_f64().unwrap_or(0.0)
    }
}

impl Add for AverageResult {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.value + other.value, self.count + other.count)
    }
}

impl AddAssign for AverageResult {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for AverageResult {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.value - other.value, self.count - other.count)
    }
}

impl fmt::Display for AverageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.count)
    }
}

/// Selects the cars a statistic is collected over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Autonomous,
    Conventional,
    /// Every car; obstacles and emergency vehicles are excluded.
    Any,
}

impl VehicleType {
    pub const ALL: [VehicleType; 3] = [Self::Any, Self::Conventional, Self::Autonomous];

    pub fn matches(&self, vehicle: &Vehicle) -> bool {
        match self {
            Self::Autonomous => vehicle.is_autonomous(),
            Self::Conventional => vehicle.is_conventional(),
            Self::Any => vehicle.is_car(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Autonomous => "autonomous",
            Self::Conventional => "conventional",
            Self::Any => "all",
        }
    }
}

/// A filter keeping vehicles whose front is on the given sub-lane.
pub fn filter_lane(lane: i32) -> impl Fn(&Vehicle) -> bool {
    move |vehicle| vehicle.position().lane == lane
}

/// Every vehicle which took part in the most recent step,
/// including those which left the road.
pub fn stepped_vehicles(road: &Road) -> impl Iterator<Item = &Vehicle> + '_ {
    road.get_all_vehicles().chain(road.removed())
}

/// The average velocity of the matching vehicles.
pub fn average_velocity(road: &Road, filter: impl Fn(&Vehicle) -> bool) -> AverageResult {
    stepped_vehicles(road)
        .filter(|vehicle| filter(vehicle))
        .fold(AverageResult::default(), |sum, vehicle| {
            sum + AverageResult::new(vehicle.velocity() as i64, 1)
        })
}

/// The number of matching vehicles which moved sideways in the most recent step.
pub fn lane_changes(road: &Road, filter: impl Fn(&Vehicle) -> bool) -> usize {
    stepped_vehicles(road)
        .filter(|vehicle| filter(vehicle))
        .filter(|vehicle| vehicle.position().lane != vehicle.last_position().lane)
        .count()
}

/// The number of matching cars which braked harder than by one cell per step.
pub fn decelerations(road: &Road, filter: impl Fn(&Vehicle) -> bool) -> usize {
    stepped_vehicles(road)
        .filter(|vehicle| vehicle.is_car() && filter(vehicle))
        .filter(|vehicle| vehicle.last_velocity() - vehicle.velocity() > 1)
        .count()
}

/// The number of matching vehicles which did not move in the most recent step.
pub fn waiting(road: &Road, filter: impl Fn(&Vehicle) -> bool) -> usize {
    stepped_vehicles(road)
        .filter(|vehicle| filter(vehicle))
        .filter(|vehicle| vehicle.position() == vehicle.last_position())
        .count()
}
