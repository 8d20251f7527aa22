//! List all devices OpenHMD can see.
//!
//! Usage: cargo run --example enumerate
//! Set OPENHMD_LIBRARY to pick a specific libopenhmd build.

fn main() {
    env_logger::init();

    let ctx = match openhmd::Context::create() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match ctx.devices() {
        Ok(devices) => {
            println!("Found {} device(s):", devices.len());
            for dev in &devices {
                println!(
                    "  [{}] vendor={}  product={}  path={}",
                    dev.index, dev.vendor, dev.product, dev.path
                );
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
