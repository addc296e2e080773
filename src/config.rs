//! Configuration of a simulation, loaded from JSON.

use crate::error::{ConfigError, RoadError};
use crate::{
    Backend, Dispatcher, Driver, EmergencySchedule, Fleet, Interval, Position, Road,
    RoadAttributes, Simulator, SpeedController, VehicleAttributes, VehicleKind,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The parameters of the human drivers of conventional cars.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// The probability of braking instead of accelerating in a step.
    pub slow: f64,
    /// The probability of taking an otherwise eligible lane change.
    pub change: f64,
    /// When false, drivers always return to the right when they can.
    pub symmetry: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            slow: 0.2,
            change: 0.5,
            symmetry: false,
        }
    }
}

impl From<DriverConfig> for Driver {
    fn from(config: DriverConfig) -> Self {
        Self {
            change: config.change,
            slow: config.slow,
            symmetry: config.symmetry,
        }
    }
}

/// A zone with a lower speed limit, on a logical lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedLimitConfig {
    pub lane: i32,
    pub begin: i32,
    pub end: i32,
    pub limit: i32,
}

/// A stationary obstacle covering offsets `begin..=end` of a logical lane.
///
/// Deserializes from either a `{lane, begin, end}` record or a `"LANE:BEGIN-END"` string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawObstacle")]
pub struct ObstacleConfig {
    pub lane: i32,
    pub begin: i32,
    pub end: i32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawObstacle {
    Text(String),
    Record { lane: i32, begin: i32, end: i32 },
}

impl TryFrom<RawObstacle> for ObstacleConfig {
    type Error = ConfigError;

    fn try_from(raw: RawObstacle) -> Result<Self, Self::Error> {
        match raw {
            RawObstacle::Text(text) => text.parse(),
            RawObstacle::Record { lane, begin, end } => Ok(Self { lane, begin, end }),
        }
    }
}

impl ObstacleConfig {
    /// The offsets covered by the obstacle.
    pub fn span(&self) -> Interval<i32> {
        Interval::new(self.begin, self.end)
    }
}

impl FromStr for ObstacleConfig {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::ObstacleFormat(value.to_string());
        let (lane, range) = value.split_once(':').ok_or_else(invalid)?;
        let (begin, end) = range.split_once('-').ok_or_else(invalid)?;
        let parse = |part: &str| part.trim().parse::<i32>().map_err(|_| invalid());
        Ok(Self {
            lane: parse(lane)?,
            begin: parse(begin)?,
            end: parse(end)?,
        })
    }
}

impl fmt::Display for ObstacleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.lane, self.begin, self.end)
    }
}

/// The configuration of a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// The road length in cells.
    pub length: i32,
    /// The number of logical lanes.
    pub lanes: i32,
    /// The number of sub-lanes per logical lane.
    pub lane_width: i32,
    /// The speed limit outside of any zone.
    pub max_speed: i32,
    pub speed_limits: Vec<SpeedLimitConfig>,
    pub obstacles: Vec<ObstacleConfig>,
    /// The maximum number of cars added to the dispatch backlog each step.
    pub dispatch: u32,
    /// The fraction of dispatched cars which are autonomous.
    pub penetration: f64,
    /// The length of dispatched cars in cells.
    pub car_length: i32,
    pub driver: DriverConfig,
    /// The speed limit offset of dispatched cars.
    pub limit: i32,
    /// The number of steps between emergency vehicles, or 0 for none.
    pub emergency: u32,
    /// The random seed; runs with the same seed are identical.
    pub seed: Option<u64>,
    /// Whether to use the sparse road storage.
    pub sparse: bool,
    /// The number of steps statistics are averaged over.
    pub buffer: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            length: 100,
            lanes: 6,
            lane_width: 1,
            max_speed: 5,
            speed_limits: vec![],
            obstacles: vec![],
            dispatch: 6,
            penetration: 0.5,
            car_length: 1,
            driver: DriverConfig::default(),
            limit: 0,
            emergency: 0,
            seed: None,
            sparse: false,
            buffer: 10,
        }
    }
}

fn check_min(field: &'static str, min: i64, value: i64) -> Result<(), ConfigError> {
    if value < min {
        Err(ConfigError::MinViolation { field, min, value })
    } else {
        Ok(())
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { field, value })
    }
}

impl SimulationConfig {
    /// Parses a configuration from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks that every value is within its bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_min("length", 1, self.length as i64)?;
        check_min("lanes", 1, self.lanes as i64)?;
        check_min("lane_width", 1, self.lane_width as i64)?;
        check_min("max_speed", 0, self.max_speed as i64)?;
        check_min("car_length", 1, self.car_length as i64)?;
        check_min("buffer", 1, self.buffer as i64)?;
        if self.car_length > self.length {
            return Err(ConfigError::MinViolation {
                field: "length",
                min: self.car_length as i64,
                value: self.length as i64,
            });
        }
        check_probability("penetration", self.penetration)?;
        check_probability("driver.slow", self.driver.slow)?;
        check_probability("driver.change", self.driver.change)?;

        let on_road = |x: i32| (0..self.length).contains(&x);
        for zone in &self.speed_limits {
            if !(0..self.lanes).contains(&zone.lane)
                || !on_road(zone.begin)
                || !on_road(zone.end)
                || Interval::new(zone.begin, zone.end).is_empty()
                || zone.limit < 0
            {
                return Err(ConfigError::SpeedLimit {
                    lane: zone.lane,
                    begin: zone.begin,
                    end: zone.end,
                });
            }
        }
        for obstacle in &self.obstacles {
            if !(0..self.lanes).contains(&obstacle.lane) {
                return Err(ConfigError::ObstacleLane {
                    lane: obstacle.lane,
                });
            }
            if !on_road(obstacle.begin) || !on_road(obstacle.end) || obstacle.span().is_empty() {
                return Err(ConfigError::ObstaclePosition {
                    begin: obstacle.begin,
                    end: obstacle.end,
                });
            }
        }
        for (i, a) in self.obstacles.iter().enumerate() {
            for b in &self.obstacles[i + 1..] {
                if a.lane == b.lane && a.span().overlaps(&b.span()) {
                    let x = a.begin.max(b.begin);
                    return Err(ConfigError::ObstacleOverlap(Position::new(x, a.lane)));
                }
            }
        }
        Ok(())
    }

    /// Builds the road described, with its speed limits and obstacles.
    pub fn build_road(&self) -> Result<Road, ConfigError> {
        self.validate()?;
        let width = self.lane_width;
        let mut controller = SpeedController::new(self.max_speed);
        for zone in &self.speed_limits {
            let first = zone.lane * width + width / 2;
            for lane in first..first + width {
                controller.add_limit(lane, zone.begin, zone.end, zone.limit);
            }
        }

        let attributes = RoadAttributes {
            length: self.length,
            lanes_count: self.lanes,
            lane_width: width,
            backend: if self.sparse {
                Backend::Sparse
            } else {
                Backend::Dense
            },
        };
        let mut road = Road::new(&attributes, controller)?;
        for obstacle in &self.obstacles {
            let position = road.relative_position(Position::new(obstacle.end, obstacle.lane));
            let attributes = VehicleAttributes::new(VehicleKind::Obstacle, position)
                .with_size(obstacle.end - obstacle.begin + 1, width);
            road.add_vehicle(&attributes).map_err(|err| match err {
                RoadError::Collision { position } => ConfigError::ObstacleOverlap(position),
                err => err.into(),
            })?;
        }
        Ok(road)
    }

    /// Builds the dispatcher described.
    pub fn build_dispatcher(&self) -> Dispatcher {
        let fleet = Fleet::Mixed {
            penetration: self.penetration,
            driver: self.driver.into(),
        };
        Dispatcher::new(self.dispatch, fleet)
            .with_car_length(self.car_length)
            .with_limit(self.limit)
            .with_emergency(EmergencySchedule::new(self.emergency))
    }

    /// Builds the simulation described.
    pub fn build(&self) -> Result<Simulator, ConfigError> {
        let road = self.build_road()?;
        log::debug!(
            "built a {}x{} road with {} obstacles",
            self.length,
            self.lanes,
            self.obstacles.len()
        );
        Ok(Simulator::new(road, self.build_dispatcher(), self.seed))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = SimulationConfig::from_json("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.lanes, 6);
        assert_eq!(config.driver, DriverConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_obstacles() {
        assert_eq!(
            "1:10-15".parse::<ObstacleConfig>(),
            Ok(ObstacleConfig {
                lane: 1,
                begin: 10,
                end: 15
            })
        );
        for invalid in ["1-10-15", "1:10", "a:1-2", "1:2:3-4", ""] {
            assert_eq!(
                invalid.parse::<ObstacleConfig>(),
                Err(ConfigError::ObstacleFormat(invalid.to_string()))
            );
        }

        let json = r#"{"obstacles": ["0:10-15", {"lane": 1, "begin": 3, "end": 3}]}"#;
        let config = SimulationConfig::from_json(json).unwrap();
        assert_eq!(config.obstacles.len(), 2);
        assert_eq!(config.obstacles[0].to_string(), "0:10-15");
        assert_eq!(config.obstacles[1].end, 3);

        let json = r#"{"obstacles": ["nonsense"]}"#;
        assert!(matches!(SimulationConfig::from_json(json), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_invalid_values() {
        let config = SimulationConfig {
            lanes: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MinViolation { field: "lanes", .. })));

        let config = SimulationConfig {
            penetration: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Probability { .. })));

        let config = SimulationConfig {
            obstacles: vec!["6:1-2".parse().unwrap()],
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ObstacleLane { lane: 6 }));

        let config = SimulationConfig {
            obstacles: vec!["0:90-100".parse().unwrap()],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ObstaclePosition { begin: 90, end: 100 })
        );

        let config = SimulationConfig {
            speed_limits: vec![SpeedLimitConfig {
                lane: 0,
                begin: 20,
                end: 10,
                limit: 2,
            }],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::SpeedLimit { .. })));
    }

    #[test]
    fn build_road() {
        let config = SimulationConfig {
            length: 50,
            lanes: 2,
            lane_width: 2,
            speed_limits: vec![SpeedLimitConfig {
                lane: 1,
                begin: 10,
                end: 20,
                limit: 2,
            }],
            obstacles: vec!["0:10-15".parse().unwrap()],
            ..Default::default()
        };
        let road = config.build_road().unwrap();
        assert_eq!(road.sublanes_count(), 6);
        assert_eq!(road.controller().max_speed(Position::new(15, 3), 1), 2);
        assert_eq!(road.controller().max_speed(Position::new(15, 4), 1), 2);
        assert_eq!(road.controller().max_speed(Position::new(15, 2), 1), 5);

        let obstacle = road.get_vehicle(Position::new(10, 1)).unwrap();
        assert_eq!(road.get_vehicle(Position::new(15, 2)), Some(obstacle));
        assert_eq!(road.get_vehicle(Position::new(9, 1)), None);
        assert_eq!(road.get_vehicle(Position::new(16, 1)), None);
        let obstacle = road.vehicle(obstacle).unwrap();
        assert!(obstacle.is_obstacle());
        assert_eq!(obstacle.length(), 6);
    }

    #[test]
    fn overlapping_obstacles() {
        let config = SimulationConfig {
            obstacles: vec!["0:10-15".parse().unwrap(), "0:15-20".parse().unwrap()],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ObstacleOverlap(Position::new(15, 0)))
        );
        assert!(matches!(config.build(), Err(ConfigError::ObstacleOverlap(_))));
    }

    #[test]
    fn build_simulator() {
        let json = r#"{"length": 30, "lanes": 2, "dispatch": 2, "emergency": 5, "seed": 1}"#;
        let mut sim = SimulationConfig::from_json(json).unwrap().build().unwrap();
        for _ in 0..10 {
            sim.step().unwrap();
        }
        assert_eq!(sim.steps(), 10);
        assert!(sim.road().vehicle_count() > 0);
    }
}
