// src/error.rs
//! Error types shared by the tracking library.
//!
//! Setup failures abort before the frame loop, capture and inference-queue
//! failures end the loop, and an invalid projection only drops one overlay point.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Failures while acquiring the device, camera, calibration or body tracker.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no device found")]
    NoDevice,
    #[error("failed to open device {index}: {reason}")]
    Open { index: usize, reason: String },
    #[error("failed to start cameras: {0}")]
    Start(String),
    #[error("failed to get calibration: {0}")]
    Calibration(String),
    #[error("failed to create tracker: {0}")]
    Tracker(String),
    #[error("session resources have already been released")]
    Released,
}

/// Failures while reading one capture from the sensor.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("timed out waiting for a capture after {0:?}")]
    Timeout(Duration),
    #[error("failed to read a capture: {0}")]
    Failed(String),
}

/// Failures while handing a capture to the body tracker or reading its result.
#[derive(Debug, Error)]
pub enum InferenceQueueError {
    #[error("failed to add capture to tracker process queue: {0}")]
    Enqueue(String),
    #[error("failed to pop result from tracker process queue: {0}")]
    Pop(String),
    #[error("timed out waiting for a body frame after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    InferenceQueue(#[from] InferenceQueueError),
    /// The calibration reported the projected point as outside its valid range.
    #[error("projection of ({x:.1}, {y:.1}, {z:.1}) is not valid")]
    ProjectionInvalid { x: f32, y: f32, z: f32 },
    #[error("failed to transform point: {0}")]
    Projection(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("recording error: {0}")]
    Recording(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl TrackingError {
    /// Whether the error should end the frame loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ProjectionInvalid { .. } | Self::Projection(_)
        )
    }
}
