use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// The behaviour of a human driver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Driver {
    /// The probability of taking an otherwise eligible lane change.
    pub change: f64,
    /// The probability of braking instead of accelerating in a step.
    pub slow: f64,
    /// When false, the driver always returns to the right when it can.
    pub symmetry: bool,
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            change: 0.1,
            slow: 0.05,
            symmetry: true,
        }
    }
}

impl Driver {
    /// Decides whether to take an eligible lane change.
    pub(crate) fn will_change(&self, rng: &mut dyn RngCore) -> bool {
        rng.gen::<f64>() < self.change
    }

    /// Decides whether to brake this step.
    pub(crate) fn will_slow(&self, rng: &mut dyn RngCore) -> bool {
        rng.gen::<f64>() < self.slow
    }

    /// Whether a change in direction `dlane` skips the "required" gate.
    pub(crate) fn is_forced(&self, dlane: i32) -> bool {
        !self.symmetry && dlane > 0
    }
}
