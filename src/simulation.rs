#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::error::{ConfigError, RoadError};
use crate::{Dispatcher, HookId, Position, Road};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;
use slotmap::SlotMap;
use std::cell::RefCell;
use std::rc::Rc;

/// The largest speed limit offset assigned by [Simulator::randomise_limits].
const MAX_LIMIT_OFFSET: i32 = 2;

/// An observer run after every step of a [Simulator].
///
/// The simulator and its vehicles are only valid for the duration of the call;
/// vehicle IDs may be reused after they leave the road.
pub trait Hook {
    fn run(&mut self, simulator: &Simulator);
}

type SharedHook = Rc<RefCell<dyn Hook>>;

/// A traffic simulation on a single road.
pub struct Simulator {
    /// The road being simulated.
    road: Road,
    /// Creates new vehicles each step.
    dispatcher: Dispatcher,
    /// The source of all randomness in the simulation.
    rng: StdRng,
    /// The number of steps simulated so far.
    steps: usize,
    /// The IDs of the registered observers.
    hook_ids: SlotMap<HookId, ()>,
    /// The registered observers, in registration order.
    hooks: Vec<(HookId, SharedHook)>,
    /// Debugging information from the previously simulated step.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulator {
    /// Creates a new simulation. Runs with the same `seed` are identical;
    /// without one the generator is seeded from the operating system.
    pub fn new(road: Road, dispatcher: Dispatcher, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            road,
            dispatcher,
            rng,
            steps: 0,
            hook_ids: SlotMap::with_key(),
            hooks: vec![],
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// The road being simulated.
    pub fn road(&self) -> &Road {
        &self.road
    }

    /// The road being simulated, for placing vehicles.
    pub fn road_mut(&mut self) -> &mut Road {
        &mut self.road
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Gets the number of steps simulated so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Registers a hook to run after every step. Registering a hook
    /// which is already registered returns its existing ID.
    pub fn add_hook<H: Hook + 'static>(&mut self, hook: Rc<RefCell<H>>) -> HookId {
        if let Some(id) = self.find_hook(&hook) {
            return id;
        }
        let hook: SharedHook = hook;
        let id = self.hook_ids.insert(());
        self.hooks.push((id, hook));
        id
    }

    /// Unregisters a hook. Returns false if it was not registered.
    pub fn remove_hook(&mut self, id: HookId) -> bool {
        if self.hook_ids.remove(id).is_none() {
            return false;
        }
        self.hooks.retain(|(other, _)| *other != id);
        true
    }

    /// Registers a hook for the duration of `f`.
    pub fn with_hook<H: Hook + 'static, R>(
        &mut self,
        hook: Rc<RefCell<H>>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let registered = self.find_hook(&hook).is_some();
        let id = self.add_hook(hook);
        let result = f(self);
        if !registered {
            self.remove_hook(id);
        }
        result
    }

    fn find_hook<H: Hook + 'static>(&self, hook: &Rc<RefCell<H>>) -> Option<HookId> {
        let ptr = Rc::as_ptr(hook) as *const ();
        self.hooks
            .iter()
            .find(|(_, other)| Rc::as_ptr(other) as *const () == ptr)
            .map(|(id, _)| *id)
    }

    /// Advances the simulation by one step: dispatches new vehicles,
    /// moves every vehicle, then runs the hooks.
    pub fn step(&mut self) -> Result<(), RoadError> {
        self.dispatcher.dispatch(&mut self.road, &mut self.rng)?;
        self.road.step(&mut self.rng)?;
        self.steps += 1;

        let hooks = self
            .hooks
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect::<Vec<_>>();
        for hook in hooks {
            hook.borrow_mut().run(self);
        }

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
        Ok(())
    }

    /// Fills the road with vehicles of the dispatcher's fleet,
    /// each free spot being taken with probability `density`.
    pub fn scatter_vehicles(&mut self, density: f64) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&density) {
            return Err(ConfigError::Probability {
                field: "density",
                value: density,
            });
        }
        let first = self.dispatcher.car_length() - 1;
        for lane in 0..self.road.lanes_count() {
            for x in first..self.road.length() {
                let position = self.road.relative_position(Position::new(x, lane));
                let attributes = self
                    .dispatcher
                    .new_vehicle(&self.road, position, &mut self.rng);
                if self.road.can_place_vehicle(&attributes) && self.rng.gen::<f64>() < density {
                    self.road.add_vehicle(&attributes)?;
                }
            }
        }
        log::debug!("scattered {} vehicles", self.road.vehicle_count());
        Ok(())
    }

    /// Randomly assigns a speed limit offset to each car, sampled from
    /// a normal distribution with a mean of 0 and standard deviation of `stddev`.
    pub fn randomise_limits(&mut self, stddev: f64) -> Result<(), ConfigError> {
        if !stddev.is_finite() || stddev < 0.0 {
            return Err(ConfigError::StandardDeviation(stddev));
        }
        let distr = rand_distr::Normal::new(0.0, stddev)
            .map_err(|_| ConfigError::StandardDeviation(stddev))?;
        for vehicle in self.road.vehicles_mut().filter(|vehicle| vehicle.is_car()) {
            let limit = distr.sample(&mut self.rng).round() as i32;
            vehicle.set_limit(limit.clamp(-MAX_LIMIT_OFFSET, MAX_LIMIT_OFFSET));
        }
        Ok(())
    }

    /// Gets the debugging information for the previously simulated step as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&self) -> serde_json::Value {
        self.debug.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Backend, Fleet, RoadAttributes, SpeedController, Vehicle};

    fn simulator(dispatch: u32, seed: u64) -> Simulator {
        let attributes = RoadAttributes {
            length: 50,
            lanes_count: 2,
            lane_width: 1,
            backend: Backend::Dense,
        };
        let road = Road::new(&attributes, SpeedController::default()).unwrap();
        Simulator::new(road, Dispatcher::new(dispatch, Fleet::Plain), Some(seed))
    }

    #[derive(Default)]
    struct Counter {
        runs: usize,
        last_step: usize,
    }

    impl Hook for Counter {
        fn run(&mut self, simulator: &Simulator) {
            self.runs += 1;
            self.last_step = simulator.steps();
        }
    }

    #[test]
    fn hooks_run_after_each_step() {
        let mut sim = simulator(2, 0);
        let counter = Rc::new(RefCell::new(Counter::default()));
        let id = sim.add_hook(counter.clone());
        assert_eq!(sim.add_hook(counter.clone()), id);

        for _ in 0..3 {
            sim.step().unwrap();
        }
        assert_eq!(counter.borrow().runs, 3);
        assert_eq!(counter.borrow().last_step, 3);

        assert!(sim.remove_hook(id));
        assert!(!sim.remove_hook(id));
        sim.step().unwrap();
        assert_eq!(counter.borrow().runs, 3);
    }

    #[test]
    fn scoped_hook() {
        let mut sim = simulator(2, 0);
        let counter = Rc::new(RefCell::new(Counter::default()));
        sim.with_hook(counter.clone(), |sim| {
            sim.step().unwrap();
            sim.step().unwrap();
        });
        sim.step().unwrap();
        assert_eq!(counter.borrow().runs, 2);

        // Already registered hooks stay registered.
        let id = sim.add_hook(counter.clone());
        sim.with_hook(counter.clone(), |sim| sim.step().unwrap());
        sim.step().unwrap();
        assert_eq!(counter.borrow().runs, 4);
        assert!(sim.remove_hook(id));
    }

    #[test]
    fn scatter_vehicles() {
        let mut sim = simulator(0, 1);
        sim.scatter_vehicles(0.0).unwrap();
        assert_eq!(sim.road().vehicle_count(), 0);
        sim.scatter_vehicles(1.0).unwrap();
        assert_eq!(sim.road().vehicle_count(), 100);
        assert!(sim.scatter_vehicles(1.5).is_err());
    }

    #[test]
    fn randomise_limits() {
        let mut sim = simulator(0, 2);
        sim.scatter_vehicles(0.5).unwrap();
        sim.randomise_limits(10.0).unwrap();
        let limits = sim
            .road()
            .get_all_vehicles()
            .map(Vehicle::limit)
            .collect::<Vec<_>>();
        assert!(limits.iter().all(|limit| (-2..=2).contains(limit)));
        assert!(limits.iter().any(|limit| *limit != 0));
        assert_eq!(
            sim.randomise_limits(-1.0),
            Err(ConfigError::StandardDeviation(-1.0))
        );
        assert!(sim.randomise_limits(f64::NAN).is_err());
        assert!(sim.randomise_limits(0.0).is_ok());
    }

    #[test]
    fn deterministic_with_seed() {
        let run = |seed| {
            let mut sim = simulator(3, seed);
            for _ in 0..50 {
                sim.step().unwrap();
            }
            sim.road()
                .get_all_vehicles()
                .map(|vehicle| (vehicle.position(), vehicle.velocity()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
    }
}
