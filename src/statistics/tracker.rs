use super::{average_velocity, decelerations, lane_changes, waiting, AverageResult, VehicleType};
use crate::{Hook, Simulator};
use serde::Serialize;
use std::collections::VecDeque;

/// A moving sum over the most recent `size` values.
#[derive(Clone, Debug)]
struct Window {
    size: usize,
    /// Running totals; the front is the total just before the window.
    totals: VecDeque<AverageResult>,
}

impl Window {
    fn new(size: usize) -> Self {
        let mut totals = VecDeque::with_capacity(size + 1);
        totals.push_back(AverageResult::default());
        Self { size, totals }
    }

    fn push(&mut self, value: AverageResult) {
        let total = self.totals.back().copied().unwrap_or_default() + value;
        self.totals.push_back(total);
        if self.totals.len() > self.size + 1 {
            self.totals.pop_front();
        }
    }

    fn value(&self) -> AverageResult {
        match (self.totals.front(), self.totals.back()) {
            (Some(first), Some(last)) => *last - *first,
            _ => AverageResult::default(),
        }
    }
}

/// The statistics of a single step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: usize,
    /// The average velocity of all cars.
    pub velocity: Option<f64>,
    pub conventional_velocity: Option<f64>,
    pub autonomous_velocity: Option<f64>,
    /// The percentage of cars which braked harder than by one cell per step.
    pub decelerations: f64,
    /// The percentage of cars which moved sideways.
    pub lane_changes: f64,
    /// The percentage of cars which did not move.
    pub waiting: f64,
    /// The number of vehicles which left the road.
    pub throughput: usize,
}

/// A hook tracking the average velocity over a moving window of steps,
/// and recording the statistics of every step.
#[derive(Clone, Debug)]
pub struct Tracker {
    steps: usize,
    velocity: Window,
    velocity_autonomous: Window,
    velocity_conventional: Window,
    records: Vec<StepRecord>,
}

impl Tracker {
    /// Creates a tracker averaging over the most recent `buffer` steps.
    pub fn new(buffer: usize) -> Self {
        let buffer = buffer.max(1);
        Self {
            steps: 0,
            velocity: Window::new(buffer),
            velocity_autonomous: Window::new(buffer),
            velocity_conventional: Window::new(buffer),
            records: vec![],
        }
    }

    /// The number of steps tracked.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The velocity of the given cars, summed over the window.
    pub fn velocity(&self, vehicle_type: VehicleType) -> AverageResult {
        match vehicle_type {
            VehicleType::Any => self.velocity.value(),
            VehicleType::Autonomous => self.velocity_autonomous.value(),
            VehicleType::Conventional => self.velocity_conventional.value(),
        }
    }

    /// The statistics of every tracked step, in order.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }
}

impl Hook for Tracker {
    fn run(&mut self, simulator: &Simulator) {
        let road = simulator.road();
        self.steps += 1;

        let velocity = average_velocity(road, |v| VehicleType::Any.matches(v));
        let autonomous = average_velocity(road, |v| VehicleType::Autonomous.matches(v));
        let conventional = average_velocity(road, |v| VehicleType::Conventional.matches(v));
        self.velocity.push(velocity);
        self.velocity_autonomous.push(autonomous);
        self.velocity_conventional.push(conventional);

        let percentage = |count: usize| {
            if velocity.count == 0 {
                0.0
            } else {
                100.0 * count as f64 / velocity.count as f64
            }
        };
        let is_car = |v: &crate::Vehicle| v.is_car();
        self.records.push(StepRecord {
            step: simulator.steps(),
            velocity: velocity.as_f64(),
            conventional_velocity: conventional.as_f64(),
            autonomous_velocity: autonomous.as_f64(),
            decelerations: percentage(decelerations(road, is_car)),
            lane_changes: percentage(lane_changes(road, is_car)),
            waiting: percentage(waiting(road, is_car)),
            throughput: road.removed().len(),
        });
    }
}
