// src/sensor.rs
//! Capability contracts for the sensor, the body tracker, calibration and
//! keyboard input. The frame pipeline only talks to hardware through these.

use crate::config::{DeviceConfig, TrackerConfig};
use crate::error::{CaptureError, InferenceQueueError, Result, SetupError, TrackingError};
use crate::skeleton::BodyFrame;
use image::RgbaImage;
use nalgebra::{Point2, Point3};
use std::time::Duration;

/// Coordinate systems known to the calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSpace {
    Depth,
    Color,
}

/// Result of a 3-D to 2-D projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub point: Point2<f32>,
    /// False when the point is behind the camera or outside the calibrated range.
    pub valid: bool,
}

/// Enumerates and opens devices, and creates body trackers for them.
pub trait SensorBackend {
    type Device: SensorDevice;
    type Tracker: BodyTracker<Capture = <Self::Device as SensorDevice>::Capture>;

    fn installed_count(&self) -> usize;

    fn open(&mut self, index: usize) -> std::result::Result<Self::Device, SetupError>;

    fn create_tracker(
        &mut self,
        calibration: &<Self::Device as SensorDevice>::Calibration,
        config: &TrackerConfig,
    ) -> std::result::Result<Self::Tracker, SetupError>;
}

/// An opened device. Dropping it closes the device.
pub trait SensorDevice {
    type Capture: Capture;
    type Calibration: Calibration;

    fn serial_number(&self) -> Option<String> {
        None
    }

    fn start_cameras(&mut self, config: &DeviceConfig) -> std::result::Result<(), SetupError>;

    fn stop_cameras(&mut self);

    fn calibration(
        &self,
        config: &DeviceConfig,
    ) -> std::result::Result<Self::Calibration, SetupError>;

    /// Blocks for at most `timeout`. Dropping the capture releases it.
    fn capture(&mut self, timeout: Duration) -> std::result::Result<Self::Capture, CaptureError>;
}

/// One synchronized set of sensor images.
pub trait Capture {
    /// BGRA color image, if the device captured one.
    fn color_image(&self) -> Option<&RgbaImage> {
        None
    }
}

/// Asynchronous pose inference: captures go in, body frames come out.
/// `None` timeouts wait forever.
pub trait BodyTracker {
    type Capture;

    fn enqueue_capture(
        &mut self,
        capture: &Self::Capture,
        timeout: Option<Duration>,
    ) -> std::result::Result<(), InferenceQueueError>;

    fn pop_result(
        &mut self,
        timeout: Option<Duration>,
    ) -> std::result::Result<BodyFrame, InferenceQueueError>;

    fn shutdown(&mut self);
}

pub trait Calibration {
    fn project_3d_to_2d(
        &self,
        point: &Point3<f32>,
        from: CameraSpace,
        to: CameraSpace,
    ) -> Result<Projection>;

    /// Color image size the projections refer to.
    fn color_size(&self) -> (u32, u32);
}

/// Projects a depth-space point into the color image, turning an invalid
/// projection into [`TrackingError::ProjectionInvalid`].
pub fn project_to_color<C: Calibration + ?Sized>(
    calibration: &C,
    point: &Point3<f32>,
) -> Result<Point2<f32>> {
    let projection = calibration.project_3d_to_2d(point, CameraSpace::Depth, CameraSpace::Color)?;
    if projection.valid {
        Ok(projection.point)
    } else {
        Err(TrackingError::ProjectionInvalid {
            x: point.x,
            y: point.y,
            z: point.z,
        })
    }
}

/// Key bindings polled once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    /// Escape: stop tracking.
    pub quit: bool,
    /// Space: take the current center of mass as the reference.
    pub set_reference: bool,
}

pub trait KeyInput {
    fn poll(&mut self) -> KeyState;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCalibration {
        valid: bool,
    }

    impl Calibration for FixedCalibration {
        fn project_3d_to_2d(
            &self,
            point: &Point3<f32>,
            _from: CameraSpace,
            _to: CameraSpace,
        ) -> Result<Projection> {
            Ok(Projection {
                point: Point2::new(point.x, point.y),
                valid: self.valid,
            })
        }

        fn color_size(&self) -> (u32, u32) {
            (1920, 1080)
        }
    }

    #[test]
    fn test_project_to_color_valid() {
        let calibration = FixedCalibration { valid: true };
        let point = project_to_color(&calibration, &Point3::new(3.0, 4.0, 5.0)).unwrap();
        assert_eq!(point, Point2::new(3.0, 4.0));
    }

    #[test]
    fn test_project_to_color_invalid() {
        let calibration = FixedCalibration { valid: false };
        let err = project_to_color(&calibration, &Point3::new(3.0, 4.0, -5.0)).unwrap_err();
        assert!(matches!(err, TrackingError::ProjectionInvalid { z, .. } if z == -5.0));
        assert!(!err.is_fatal());
    }
}
