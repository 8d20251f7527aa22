//! Print every parameter of the first device.
//!
//! Falls back to the simulated dummy device when libopenhmd is not installed.

use openhmd::sim::SimulatedBackend;
use openhmd::{Context, FloatParam, IntParam, StringField};

fn main() {
    env_logger::init();

    let ctx = Context::create().unwrap_or_else(|e| {
        eprintln!("{} (using simulated backend)", e);
        Context::with_backend(Box::new(SimulatedBackend::with_dummy()))
    });

    if let Err(e) = ctx.update() {
        eprintln!("Update error: {}", e);
    }

    let count = match ctx.probe() {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Probe error: {}", e);
            std::process::exit(1);
        }
    };
    println!("num devices: {}", count);

    for idx in 0..count {
        for field in StringField::ALL {
            match ctx.list_gets(idx, field) {
                Ok(s) => println!("[{}] {}: {}", idx, field, s),
                Err(e) => eprintln!("[{}] {}: {}", idx, field, e),
            }
        }
    }

    // Default device is normally 0
    let device = match ctx.list_open_device(0) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to open device: {}", e);
            std::process::exit(1);
        }
    };

    for param in IntParam::ALL {
        match device.get_ints(param) {
            Ok(v) => println!("{}: {:?}", param, v),
            Err(e) => eprintln!("{}: {}", param, e),
        }
    }
    for param in FloatParam::ALL {
        match device.get_floats(param) {
            Ok(v) => println!("{}: {:?}", param, v),
            Err(e) => eprintln!("{}: {}", param, e),
        }
    }
}
