pub use config::{DriverConfig, ObstacleConfig, SimulationConfig, SpeedLimitConfig};
pub use dispatcher::{Dispatcher, EmergencySchedule, Fleet};
pub use error::{ConfigError, RoadError};
pub use geometry::{Footprint, Position};
pub use road::{Backend, Road, RoadAttributes};
use slotmap::new_key_type;
pub use slotmap::{Key, KeyData};
pub use simulation::{Hook, Simulator};
pub use speed::SpeedController;
pub use util::Interval;
pub use vehicle::{Driver, Vehicle, VehicleAttributes, VehicleKind};

mod config;
#[cfg(feature = "debug")]
mod debug;
mod dispatcher;
mod error;
mod geometry;
mod road;
mod simulation;
mod speed;
pub mod statistics;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
    /// Unique ID of a registered [Hook].
    pub struct HookId;
}

type VehicleSet = slotmap::SlotMap<VehicleId, Vehicle>;
