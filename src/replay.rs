// src/replay.rs
//! Sensor backend that plays back recorded body frames from a JSON-lines file.
//!
//! Each line holds one frame:
//!
//! ```text
//! {"timestamp_usec": 0, "bodies": [{"id": 1, "joints": [
//!     {"position": [x, y, z], "confidence": "high"}, ...]}]}
//! ```
//!
//! with exactly 32 joints per body in tracker order, positions in millimeters.

use crate::config::{CalibrationConfig, DeviceConfig, TrackerConfig};
use crate::error::{CaptureError, InferenceQueueError, Result, SetupError, TrackingError};
use crate::sensor::{
    BodyTracker, Calibration, CameraSpace, Capture, Projection, SensorBackend, SensorDevice,
};
use crate::skeleton::{Body, BodyFrame, ConfidenceLevel, Joint, Skeleton, JOINT_COUNT};
use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JointRecord {
    position: [f32; 3],
    confidence: ConfidenceLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BodyRecord {
    id: u32,
    joints: Vec<JointRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FrameRecord {
    #[serde(default)]
    timestamp_usec: u64,
    #[serde(default)]
    bodies: Vec<BodyRecord>,
}

impl FrameRecord {
    fn from_frame(frame: &BodyFrame) -> Self {
        Self {
            timestamp_usec: frame.timestamp_usec,
            bodies: frame
                .bodies
                .iter()
                .map(|body| BodyRecord {
                    id: body.id,
                    joints: body
                        .skeleton
                        .iter()
                        .map(|(_, joint)| JointRecord {
                            position: [joint.position.x, joint.position.y, joint.position.z],
                            confidence: joint.confidence,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn into_frame(self, line: usize) -> Result<BodyFrame> {
        let mut bodies = Vec::with_capacity(self.bodies.len());
        for body in self.bodies {
            if body.joints.len() != JOINT_COUNT {
                return Err(TrackingError::Recording(format!(
                    "line {}: body {} has {} joints, expected {}",
                    line,
                    body.id,
                    body.joints.len(),
                    JOINT_COUNT
                )));
            }
            let skeleton = Skeleton::from_fn(|id| {
                let record = &body.joints[id.index()];
                let [x, y, z] = record.position;
                Joint::new(x, y, z, record.confidence)
            });
            bodies.push(Body { id: body.id, skeleton });
        }

        Ok(BodyFrame {
            timestamp_usec: self.timestamp_usec,
            bodies,
        })
    }
}

/// Body frames in capture order.
#[derive(Debug, Clone, Default)]
pub struct ReplayRecording {
    frames: Vec<BodyFrame>,
}

impl ReplayRecording {
    pub fn from_frames(frames: Vec<BodyFrame>) -> Self {
        Self { frames }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);

        let mut frames = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: FrameRecord = serde_json::from_str(&line)?;
            frames.push(record.into_frame(i + 1)?);
        }

        info!("Loaded {} recorded frames from {}", frames.len(), path.display());
        Ok(Self { frames })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        for frame in &self.frames {
            serde_json::to_writer(&mut writer, &FrameRecord::from_frame(frame))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn frames(&self) -> &[BodyFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Ideal pinhole color camera placed at a fixed offset from the depth camera.
#[derive(Debug, Clone, PartialEq)]
pub struct PinholeCalibration {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
    pub depth_to_color: Vector3<f32>,
}

impl PinholeCalibration {
    pub fn new(config: &CalibrationConfig, color_size: (u32, u32)) -> Self {
        let [tx, ty, tz] = config.depth_to_color_mm;
        Self {
            fx: config.fx,
            fy: config.fy,
            cx: config.cx,
            cy: config.cy,
            width: color_size.0,
            height: color_size.1,
            depth_to_color: Vector3::new(tx, ty, tz),
        }
    }
}

impl Calibration for PinholeCalibration {
    fn project_3d_to_2d(
        &self,
        point: &Point3<f32>,
        from: CameraSpace,
        to: CameraSpace,
    ) -> Result<Projection> {
        if to != CameraSpace::Color {
            return Err(TrackingError::Projection(
                "only color camera intrinsics are known".to_string(),
            ));
        }

        let p = match from {
            CameraSpace::Depth => *point + self.depth_to_color,
            CameraSpace::Color => *point,
        };
        if p.z <= 0.0 {
            return Ok(Projection {
                point: Point2::origin(),
                valid: false,
            });
        }

        let u = self.fx * p.x / p.z + self.cx;
        let v = self.fy * p.y / p.z + self.cy;
        let valid = u >= 0.0 && v >= 0.0 && u < self.width as f32 && v < self.height as f32;

        Ok(Projection {
            point: Point2::new(u, v),
            valid,
        })
    }

    fn color_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A recording exposed as a single installed device; without one no device is found.
pub struct ReplayBackend {
    recording: Option<ReplayRecording>,
    calibration: CalibrationConfig,
}

impl ReplayBackend {
    pub fn new(recording: Option<ReplayRecording>, calibration: CalibrationConfig) -> Self {
        Self {
            recording,
            calibration,
        }
    }

    pub fn from_path(path: Option<&Path>, calibration: CalibrationConfig) -> Result<Self> {
        let recording = path.map(ReplayRecording::load).transpose()?;
        Ok(Self::new(recording, calibration))
    }
}

impl SensorBackend for ReplayBackend {
    type Device = ReplayDevice;
    type Tracker = ReplayTracker;

    fn installed_count(&self) -> usize {
        usize::from(self.recording.is_some())
    }

    fn open(&mut self, index: usize) -> std::result::Result<ReplayDevice, SetupError> {
        if index >= self.installed_count() {
            return Err(SetupError::Open {
                index,
                reason: "no such recording".to_string(),
            });
        }
        let recording = self.recording.take().ok_or(SetupError::Open {
            index,
            reason: "recording already opened".to_string(),
        })?;

        Ok(ReplayDevice {
            frames: recording.frames.into(),
            calibration: self.calibration.clone(),
            running: false,
        })
    }

    fn create_tracker(
        &mut self,
        _calibration: &PinholeCalibration,
        _config: &TrackerConfig,
    ) -> std::result::Result<ReplayTracker, SetupError> {
        Ok(ReplayTracker {
            queue: VecDeque::new(),
        })
    }
}

pub struct ReplayDevice {
    frames: VecDeque<BodyFrame>,
    calibration: CalibrationConfig,
    running: bool,
}

impl ReplayDevice {
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl SensorDevice for ReplayDevice {
    type Capture = ReplayCapture;
    type Calibration = PinholeCalibration;

    fn serial_number(&self) -> Option<String> {
        Some("replay".to_string())
    }

    fn start_cameras(&mut self, config: &DeviceConfig) -> std::result::Result<(), SetupError> {
        debug!(
            "Replay cameras started at {} fps, {:?}, {:?}",
            config.fps, config.color_resolution, config.depth_mode
        );
        self.running = true;
        Ok(())
    }

    fn stop_cameras(&mut self) {
        self.running = false;
    }

    fn calibration(
        &self,
        config: &DeviceConfig,
    ) -> std::result::Result<PinholeCalibration, SetupError> {
        Ok(PinholeCalibration::new(
            &self.calibration,
            config.color_resolution.dimensions(),
        ))
    }

    fn capture(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<ReplayCapture, CaptureError> {
        if !self.running {
            return Err(CaptureError::Failed("cameras are not running".to_string()));
        }
        // An exhausted recording behaves like a sensor that stopped delivering.
        let frame = self.frames.pop_front().ok_or(CaptureError::Timeout(timeout))?;
        Ok(ReplayCapture { frame })
    }
}

pub struct ReplayCapture {
    frame: BodyFrame,
}

impl Capture for ReplayCapture {}

pub struct ReplayTracker {
    queue: VecDeque<BodyFrame>,
}

impl BodyTracker for ReplayTracker {
    type Capture = ReplayCapture;

    fn enqueue_capture(
        &mut self,
        capture: &ReplayCapture,
        _timeout: Option<Duration>,
    ) -> std::result::Result<(), InferenceQueueError> {
        self.queue.push_back(capture.frame.clone());
        Ok(())
    }

    fn pop_result(
        &mut self,
        timeout: Option<Duration>,
    ) -> std::result::Result<BodyFrame, InferenceQueueError> {
        match (self.queue.pop_front(), timeout) {
            (Some(frame), _) => Ok(frame),
            (None, Some(timeout)) => Err(InferenceQueueError::Timeout(timeout)),
            (None, None) => Err(InferenceQueueError::Pop("no capture was queued".to_string())),
        }
    }

    fn shutdown(&mut self) {
        self.queue.clear();
    }
}
