use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;
use std::time::Instant;

use traffic_ca::statistics::{Tracker, VehicleType};
use traffic_ca::SimulationConfig;

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SimulationConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => SimulationConfig::default(),
    };
    let steps = match args.next() {
        Some(steps) => steps.parse::<usize>()?,
        None => 1000,
    };

    let mut sim = config.build()?;
    let tracker = Rc::new(RefCell::new(Tracker::new(config.buffer)));
    sim.add_hook(tracker.clone());

    println!("Simulating...");
    let start = Instant::now();
    for step in 1..=steps {
        sim.step()?;
        if step % config.buffer == 0 {
            let tracker = tracker.borrow();
            let velocities = VehicleType::ALL
                .iter()
                .map(|ty| match tracker.velocity(*ty).as_f64() {
                    Some(velocity) => format!("{} {:.2}", ty.name(), velocity),
                    None => format!("{} -", ty.name()),
                })
                .collect::<Vec<_>>();
            println!(
                "step {:>6}: {} vehs, velocity {}",
                step,
                sim.road().vehicle_count(),
                velocities.join(", "),
            );
        }
    }

    let tracker = tracker.borrow();
    let throughput = tracker.records().iter().map(|r| r.throughput).sum::<usize>();
    let elapsed = start.elapsed();
    println!(
        "Avg. step: {:?}, throughput: {:.3} vehs/step",
        elapsed / steps.max(1) as u32,
        throughput as f64 / steps.max(1) as f64,
    );
    Ok(())
}
