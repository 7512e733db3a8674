// src/session.rs
use crate::config::AppConfig;
use crate::error::SetupError;
use crate::sensor::{BodyTracker, KeyInput, SensorBackend, SensorDevice};
use crate::tracking::{FramePipeline, RunSummary};
use tracing::info;

type DeviceCalibration<B> = <<B as SensorBackend>::Device as SensorDevice>::Calibration;

/// Device, calibration and body tracker of one tracking run.
///
/// Resources are acquired in order and released in reverse by [`Session::release`],
/// which also runs on drop. A session that failed halfway through [`Session::open`]
/// releases exactly what it had acquired.
pub struct Session<B: SensorBackend> {
    device: Option<B::Device>,
    calibration: Option<DeviceCalibration<B>>,
    tracker: Option<B::Tracker>,
    cameras_started: bool,
}

impl<B: SensorBackend> Session<B> {
    pub fn open(backend: &mut B, config: &AppConfig) -> Result<Self, SetupError> {
        let mut session = Self {
            device: None,
            calibration: None,
            tracker: None,
            cameras_started: false,
        };

        let count = backend.installed_count();
        info!("Found {} connected devices", count);
        if count == 0 {
            return Err(SetupError::NoDevice);
        }

        let device = session.device.insert(backend.open(0)?);
        match device.serial_number() {
            Some(serial) => info!("Opened device: {}", serial),
            None => info!("Opened device 0"),
        }

        device.start_cameras(&config.device)?;
        session.cameras_started = true;
        info!(
            "Cameras started: {} fps, {:?}, {:?}",
            config.device.fps, config.device.color_resolution, config.device.depth_mode
        );

        let calibration = device.calibration(&config.device)?;
        info!("Got calibration");

        let tracker = backend.create_tracker(&calibration, &config.tracker)?;
        info!("Body tracker created");

        session.calibration = Some(calibration);
        session.tracker = Some(tracker);
        Ok(session)
    }

    pub fn is_released(&self) -> bool {
        self.device.is_none() && self.tracker.is_none()
    }

    /// Runs the frame loop on this session's resources.
    pub fn run(
        &mut self,
        pipeline: &mut FramePipeline,
        keys: &mut dyn KeyInput,
    ) -> Result<RunSummary, SetupError> {
        match (self.device.as_mut(), self.tracker.as_mut(), self.calibration.as_ref()) {
            (Some(device), Some(tracker), Some(calibration)) => {
                Ok(pipeline.run(device, tracker, calibration, keys))
            }
            _ => Err(SetupError::Released),
        }
    }

    /// Shuts the tracker down, stops the cameras and closes the device.
    /// Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(mut tracker) = self.tracker.take() {
            tracker.shutdown();
            drop(tracker);
            info!("Body tracker shut down");
        }
        self.calibration = None;

        if let Some(mut device) = self.device.take() {
            if self.cameras_started {
                device.stop_cameras();
                self.cameras_started = false;
                info!("Cameras stopped");
            }
            drop(device);
            info!("Device closed");
        }
    }
}

impl<B: SensorBackend> Drop for Session<B> {
    fn drop(&mut self) {
        self.release();
    }
}
