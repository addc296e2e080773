use crate::Position;
use thiserror::Error;

/// Errors raised by the road while placing vehicles.
///
/// Any of these during a step indicates a logic defect in the engine;
/// the step is aborted and the error propagated to the caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RoadError {
    /// A vehicle's footprint overlaps an occupied cell.
    #[error("collision at {position}")]
    Collision { position: Position },
    /// A vehicle's footprint leaves the road.
    #[error("position {position} is not on the road")]
    OutOfBounds { position: Position },
    /// A non-emergency vehicle was registered as an emergency vehicle.
    #[error("emergency vehicle expected")]
    NotEmergency,
}

/// Errors raised while building a simulation from its configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: i64,
        value: i64,
    },
    #[error("{field} must be between 0 and 1 (got {value:.3})")]
    Probability { field: &'static str, value: f64 },
    #[error("invalid obstacle, lane {lane} is not on the road")]
    ObstacleLane { lane: i32 },
    #[error("invalid obstacle, position ({begin}, {end}) is not on the road")]
    ObstaclePosition { begin: i32, end: i32 },
    #[error("invalid speed limit on lane {lane} between {begin} and {end}")]
    SpeedLimit { lane: i32, begin: i32, end: i32 },
    #[error("expected obstacle to be of format LANE:BEGIN-END, got \"{0}\" instead")]
    ObstacleFormat(String),
    #[error("obstacles overlap at {0}")]
    ObstacleOverlap(Position),
    #[error("standard deviation must be finite and non-negative (got {0})")]
    StandardDeviation(f64),
    #[error("cannot place vehicle: {0}")]
    Placement(#[from] RoadError),
    #[error("invalid configuration file: {0}")]
    Parse(String),
}
