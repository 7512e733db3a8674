// src/lib.rs
//! Whole-body center of mass tracking from body-tracking sensor skeletons.
//!
//! Each tracked skeleton is split into anthropometric segments, a center of
//! mass is estimated per segment and combined into a mass-weighted body
//! center. Its displacement from an operator-set reference pose is logged to
//! CSV and drawn on overlay snapshots.

pub mod com;
pub mod config;
pub mod data;
pub mod error;
pub mod input;
pub mod overlay;
pub mod reference;
pub mod replay;
pub mod segments;
pub mod sensor;
pub mod session;
pub mod skeleton;
pub mod tracking;

pub use com::{ComEstimator, ComResult, ExistencePolicy, SegmentExistence};
pub use config::{AppConfig, Program};
pub use error::{CaptureError, InferenceQueueError, Result, SetupError, TrackingError};
pub use reference::{Displacement, DisplacementMode, ReferenceTracker};
pub use segments::{BodySegment, SegmentModel, SegmentPreset};
pub use session::Session;
pub use skeleton::{Body, BodyFrame, ConfidenceLevel, Joint, JointId, Skeleton};
pub use tracking::{FramePipeline, RunSummary, Termination};
