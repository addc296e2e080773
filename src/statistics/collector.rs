use super::{stepped_vehicles, AverageResult, VehicleType};
use crate::{Hook, Road, Simulator};

/// The groups of statistics a [Collector] gathers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Statistics {
    pub velocity: bool,
    pub throughput: bool,
    pub heat_map: bool,
}

impl Statistics {
    pub const ALL: Self = Self {
        velocity: true,
        throughput: true,
        heat_map: true,
    };
}

impl Default for Statistics {
    fn default() -> Self {
        Self::ALL
    }
}

/// A grid of values indexed by logical lane, then offset.
type Grid<T> = Vec<Vec<T>>;

/// A hook collecting per-cell statistics over every logical lane of the road.
#[derive(Clone, Debug)]
pub struct Collector {
    statistics: Statistics,
    /// The number of initial steps to ignore while traffic builds up.
    skip: usize,
    steps: usize,
    length: usize,
    lanes_count: usize,
    velocity: Grid<AverageResult>,
    velocity_autonomous: Grid<AverageResult>,
    velocity_conventional: Grid<AverageResult>,
    throughput: Grid<i64>,
    heat_map: Grid<f64>,
}

fn grid<T: Clone>(lanes_count: usize, length: usize, value: T) -> Grid<T> {
    vec![vec![value; length]; lanes_count]
}

impl Collector {
    /// Creates a collector for the given road.
    pub fn new(road: &Road, statistics: Statistics, skip: usize) -> Self {
        let length = road.length() as usize;
        let lanes_count = road.lanes_count() as usize;
        let sized = |enabled: bool| if enabled { (lanes_count, length) } else { (0, 0) };
        let (vl, vx) = sized(statistics.velocity);
        let (tl, tx) = sized(statistics.throughput);
        let (hl, hx) = sized(statistics.heat_map);
        Self {
            statistics,
            skip,
            steps: 0,
            length,
            lanes_count,
            velocity: grid(vl, vx, AverageResult::default()),
            velocity_autonomous: grid(vl, vx, AverageResult::default()),
            velocity_conventional: grid(vl, vx, AverageResult::default()),
            throughput: grid(tl, tx, 0),
            heat_map: grid(hl, hx, 0.0),
        }
    }

    /// The number of steps observed, including skipped ones.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The number of steps statistics were collected for.
    pub fn collected_steps(&self) -> usize {
        self.steps.saturating_sub(self.skip)
    }

    /// The velocities of the given cars as they passed each cell.
    pub fn velocity(&self, vehicle_type: VehicleType) -> &Grid<AverageResult> {
        match vehicle_type {
            VehicleType::Any => &self.velocity,
            VehicleType::Autonomous => &self.velocity_autonomous,
            VehicleType::Conventional => &self.velocity_conventional,
        }
    }

    /// The average number of vehicles passing each cell in a step.
    pub fn throughput(&self) -> Grid<f64> {
        self.normalise(&self.throughput, |value| *value as f64)
    }

    /// The average traffic in each cell in a step.
    pub fn heat_map(&self) -> Grid<f64> {
        self.normalise(&self.heat_map, |value| *value)
    }

    fn normalise<T>(&self, grid: &Grid<T>, value: impl Fn(&T) -> f64) -> Grid<f64> {
        let steps = self.collected_steps().max(1) as f64;
        grid.iter()
            .map(|lane| lane.iter().map(|cell| value(cell) / steps).collect())
            .collect()
    }

    /// Visits each cell a vehicle passed during the most recent step,
    /// with the vehicle and the number of cells it moved.
    fn for_each_passed(
        &self,
        road: &Road,
        mut f: impl FnMut(&crate::Vehicle, usize, usize, i32),
    ) {
        for vehicle in stepped_vehicles(road) {
            let last = road.absolute_position(vehicle.last_position());
            let current = road.absolute_position(vehicle.position());
            if current.lane < 0 || current.lane as usize >= self.lanes_count {
                continue;
            }
            let moved = current.x - last.x;
            for x in last.x.max(0)..current.x.min(self.length as i32) {
                f(vehicle, current.lane as usize, x as usize, moved);
            }
        }
    }
}

impl Hook for Collector {
    fn run(&mut self, simulator: &Simulator) {
        self.steps += 1;
        if self.steps <= self.skip {
            return;
        }
        let road = simulator.road();
        let mut velocity = std::mem::take(&mut self.velocity);
        let mut autonomous = std::mem::take(&mut self.velocity_autonomous);
        let mut conventional = std::mem::take(&mut self.velocity_conventional);
        let mut throughput = std::mem::take(&mut self.throughput);
        let mut heat_map = std::mem::take(&mut self.heat_map);
        let statistics = self.statistics;

        self.for_each_passed(road, |vehicle, lane, x, moved| {
            if statistics.velocity {
                let value = AverageResult::new(vehicle.velocity() as i64, 1);
                if VehicleType::Any.matches(vehicle) {
                    velocity[lane][x] += value;
                }
                if VehicleType::Autonomous.matches(vehicle) {
                    autonomous[lane][x] += value;
                }
                if VehicleType::Conventional.matches(vehicle) {
                    conventional[lane][x] += value;
                }
            }
            if statistics.throughput {
                throughput[lane][x] += 1;
            }
            if statistics.heat_map {
                heat_map[lane][x] += 1.0 / (moved + 1) as f64;
            }
        });

        self.velocity = velocity;
        self.velocity_autonomous = autonomous;
        self.velocity_conventional = conventional;
        self.throughput = throughput;
        self.heat_map = heat_map;
    }
}
