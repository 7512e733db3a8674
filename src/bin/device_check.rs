// src/bin/device_check.rs
//! Opens the configured device, takes one capture and reports the tracked bodies.

use anyhow::{Context, Result};
use body_com_tracker::config::AppConfig;
use body_com_tracker::replay::ReplayBackend;
use body_com_tracker::sensor::{BodyTracker, SensorBackend, SensorDevice};
use std::path::PathBuf;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())?;
    let mut backend =
        ReplayBackend::from_path(config.replay.path.as_deref(), config.calibration.clone())?;

    println!("Testing device access...\n");
    println!("Found {} device(s)", backend.installed_count());

    let mut device = match backend.open(0) {
        Ok(device) => device,
        Err(e) => {
            println!("✗ Failed to open device: {}", e);
            println!("\nPossible causes:");
            println!("1. No recording configured under [replay]");
            println!("2. Device is being used by another app");
            return Ok(());
        }
    };
    println!("✓ Device opened ({})", device.serial_number().unwrap_or_default());

    device.start_cameras(&config.device).context("failed to start cameras")?;
    println!("✓ Cameras started");

    let calibration = device.calibration(&config.device)?;
    let mut tracker = backend.create_tracker(&calibration, &config.tracker)?;

    match device.capture(config.device.capture_timeout()) {
        Ok(capture) => {
            tracker.enqueue_capture(&capture, config.tracker.enqueue_timeout())?;
            let frame = tracker.pop_result(config.tracker.pop_timeout())?;
            println!("✓ Capture processed: {} bodies tracked", frame.num_bodies());
        }
        Err(e) => println!("✗ Failed to capture: {}", e),
    }

    tracker.shutdown();
    device.stop_cameras();
    Ok(())
}
