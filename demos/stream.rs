//! Pump events and print the head rotation, once per simulated frame.
//!
//! Usage: cargo run --example stream
//! Press Ctrl+C to stop.

use openhmd::sim::SimulatedBackend;
use openhmd::Context;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(11);

fn main() {
    env_logger::init();

    let ctx = Context::create().unwrap_or_else(|e| {
        eprintln!("{} (using simulated backend)", e);
        Context::with_backend(Box::new(SimulatedBackend::with_dummy()))
    });

    if let Err(e) = ctx.probe() {
        eprintln!("Probe error: {}", e);
        std::process::exit(1);
    }

    let device = match ctx.list_open_device(0) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to open device: {}", e);
            std::process::exit(1);
        }
    };

    match device.screen_resolution() {
        Ok((w, h)) => println!("Resolution: {}x{}", w, h),
        Err(e) => eprintln!("Resolution: {}", e),
    }
    println!("Streaming rotation (Ctrl+C to stop)...");

    let start = Instant::now();
    let mut frames: u64 = 0;

    loop {
        let frame_start = Instant::now();
        if let Err(e) = ctx.update() {
            eprintln!("Update error: {}", e);
            break;
        }

        match device.rotation_quat() {
            Ok(q) => {
                frames += 1;
                // Print every ~90th frame to avoid flooding the terminal
                if frames % 90 == 1 {
                    println!(
                        "t={:>7.2}s  quat=[{:+.3}, {:+.3}, {:+.3}, {:+.3}]",
                        start.elapsed().as_secs_f64(),
                        q[0], q[1], q[2], q[3],
                    );
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }

        if let Some(rest) = FRAME.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    println!("\nTotal: {} frames in {:.1}s", frames, start.elapsed().as_secs_f64());
}
