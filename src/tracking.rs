// src/tracking.rs
//! Per-frame tracking loop: capture, pose inference, center of mass,
//! displacement from the reference pose, logging and overlay output.

use crate::com::{ComEstimator, ComResult, ExistencePolicy};
use crate::config::{AppConfig, Program};
use crate::data::DisplacementLog;
use crate::error::{CaptureError, InferenceQueueError, Result, TrackingError};
use crate::overlay::{FrameSink, Overlay, SnapshotSink};
use crate::reference::{Displacement, ReferenceTracker};
use crate::segments::BodySegment;
use crate::sensor::{project_to_color, BodyTracker, Calibration, Capture, KeyInput, SensorDevice};
use crate::skeleton::{Body, BodyFrame};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const METRICS_WINDOW: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub existence: ExistencePolicy,
    /// False only counts bodies.
    pub compute_com: bool,
    pub capture_timeout: Duration,
    pub enqueue_timeout: Option<Duration>,
    pub pop_timeout: Option<Duration>,
    pub draw_skeleton: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            existence: ExistencePolicy::Confidence,
            compute_com: true,
            capture_timeout: Duration::from_millis(1000),
            enqueue_timeout: None,
            pop_timeout: None,
            draw_skeleton: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig, program: Program) -> Self {
        Self {
            existence: config.com.existence,
            compute_com: program.computes_com(),
            capture_timeout: config.device.capture_timeout(),
            enqueue_timeout: config.tracker.enqueue_timeout(),
            pop_timeout: config.tracker.pop_timeout(),
            draw_skeleton: config.overlay.draw_skeleton,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyReport {
    pub body_id: u32,
    pub result: Option<ComResult>,
    pub displacement: Option<Displacement>,
}

/// What was computed for one body frame. The first body is the primary one:
/// it drives the reference pose, the displacement log and the labels.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub timestamp_usec: u64,
    pub bodies: Vec<BodyReport>,
}

impl FrameReport {
    pub fn primary(&self) -> Option<&BodyReport> {
        self.bodies.first()
    }
}

/// Why the frame loop stopped.
#[derive(Debug)]
pub enum Termination {
    Cancelled,
    Capture(CaptureError),
    Inference(InferenceQueueError),
    Output(TrackingError),
}

impl Termination {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PerformanceMetrics {
    pub avg_fps: f32,
    pub avg_processing_time: f32,
    frame_times: VecDeque<f32>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            avg_fps: 0.0,
            avg_processing_time: 0.0,
            frame_times: VecDeque::with_capacity(METRICS_WINDOW),
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.frame_times.push_front(elapsed.as_secs_f32());
        if self.frame_times.len() > METRICS_WINDOW {
            self.frame_times.pop_back();
        }

        self.avg_processing_time =
            self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > 0.0 {
            1.0 / self.avg_processing_time
        } else {
            0.0
        };
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub frames: u64,
    pub skeletons: u64,
    pub log_rows: u64,
    pub last_displacement: Option<Displacement>,
    pub metrics: PerformanceMetrics,
    pub termination: Termination,
}

pub struct FramePipeline {
    estimator: ComEstimator,
    reference: ReferenceTracker,
    options: PipelineOptions,
    log: Option<DisplacementLog>,
    sink: Option<Box<dyn FrameSink>>,
    frames: u64,
    skeletons: u64,
    last_displacement: Option<Displacement>,
}

impl FramePipeline {
    pub fn new(
        estimator: ComEstimator,
        reference: ReferenceTracker,
        options: PipelineOptions,
    ) -> Self {
        Self {
            estimator,
            reference,
            options,
            log: None,
            sink: None,
            frames: 0,
            skeletons: 0,
            last_displacement: None,
        }
    }

    /// Builds the pipeline, the displacement log and the snapshot sink the config asks for.
    pub fn from_config(config: &AppConfig, program: Program) -> Result<Self> {
        let estimator = ComEstimator::with_preset(config.com.preset);
        let reference = ReferenceTracker::new(config.com.displacement);
        let options = PipelineOptions::from_config(config, program);
        let mut pipeline = Self::new(estimator, reference, options);

        if config.log.enabled {
            pipeline = pipeline.with_log(DisplacementLog::create(&config.log.path)?);
        }
        if config.overlay.enabled {
            let sink = SnapshotSink::new(
                &config.overlay.output_dir,
                config.overlay.save_every,
                config.overlay.marker_radius,
            )?;
            pipeline = pipeline.with_sink(Box::new(sink));
        }

        info!(
            "Tracking with {} segments ({}), {:?} existence, {:?} displacement",
            pipeline.estimator.model().len(),
            pipeline.estimator.model().preset_kind().name(),
            pipeline.options.existence,
            pipeline.reference.mode()
        );
        Ok(pipeline)
    }

    pub fn with_log(mut self, log: DisplacementLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn reference(&self) -> &ReferenceTracker {
        &self.reference
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn skeletons(&self) -> u64 {
        self.skeletons
    }

    pub fn log_rows(&self) -> u64 {
        self.log.as_ref().map_or(0, DisplacementLog::rows)
    }

    /// Center of mass and displacement of every body in `frame`.
    pub fn process_frame(&mut self, frame: &BodyFrame) -> FrameReport {
        let frame_index = self.frames;
        self.frames += 1;
        self.skeletons += frame.num_bodies() as u64;

        if self.options.compute_com {
            debug!("Frame {}: {} bodies", frame_index, frame.num_bodies());
        } else {
            info!("{} bodies are detected", frame.num_bodies());
        }

        let bodies = frame
            .bodies
            .iter()
            .map(|body| {
                if !self.options.compute_com {
                    return BodyReport {
                        body_id: body.id,
                        result: None,
                        displacement: None,
                    };
                }

                let result = self.estimator.evaluate(&body.skeleton, self.options.existence);
                self.log_exclusions(body);
                let displacement = self.reference.displacement(&result.com);
                debug!(
                    "Body {}: COM ({:.2}, {:.2}, {:.2}) from {} segments",
                    body.id,
                    result.com.x,
                    result.com.y,
                    result.com.z,
                    result.existence.count()
                );

                BodyReport {
                    body_id: body.id,
                    result: Some(result),
                    displacement,
                }
            })
            .collect();

        FrameReport {
            frame_index,
            timestamp_usec: frame.timestamp_usec,
            bodies,
        }
    }

    fn log_exclusions(&self, body: &Body) {
        let model = self.estimator.model();
        for joint in self.estimator.excluded_joints(&body.skeleton, self.options.existence) {
            let dropped: Vec<_> = model.segments_for_joint(joint).map(BodySegment::name).collect();
            debug!(
                "Body {}: {} below confidence threshold, dropping {}",
                body.id,
                joint.name(),
                dropped.join(", ")
            );
        }
    }

    /// Appends the primary body's displacement to the log once a reference exists.
    pub fn record(&mut self, report: &FrameReport) -> Result<()> {
        let Some(displacement) = report.primary().and_then(|b| b.displacement) else {
            return Ok(());
        };
        self.last_displacement = Some(displacement);
        debug!("Displacement {}", displacement);

        if !self.reference.is_set() {
            return Ok(());
        }
        if let Some(log) = self.log.as_mut() {
            log.append(&displacement)?;
        }
        Ok(())
    }

    /// Takes the primary body's center of mass as the new reference pose.
    pub fn set_reference<C: Calibration + ?Sized>(
        &mut self,
        report: &FrameReport,
        calibration: &C,
    ) -> bool {
        let Some(result) = report.primary().and_then(|b| b.result.as_ref()) else {
            warn!("No body tracked in frame {}, reference not set", report.frame_index);
            return false;
        };

        let projected = match project_to_color(calibration, &result.com) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!("Reference marker unavailable: {}", e);
                None
            }
        };
        self.reference.set_reference(result.com, projected);
        true
    }

    pub fn build_overlay<C: Calibration + ?Sized>(
        &self,
        calibration: &C,
        frame: &BodyFrame,
        report: &FrameReport,
    ) -> Overlay {
        let mut overlay = Overlay::new();

        for (i, (body, body_report)) in frame.bodies.iter().zip(&report.bodies).enumerate() {
            if self.options.draw_skeleton {
                overlay.add_skeleton(calibration, &body.skeleton);
            }
            let Some(result) = body_report.result.as_ref() else {
                continue;
            };
            let center = overlay.add_com(calibration, result);

            if i == 0 {
                if let (Some(center), Some(displacement)) = (center, body_report.displacement) {
                    overlay.add_displacement(center, &displacement);
                }
            }
        }

        if let Some(reference) = self.reference.reference_2d() {
            overlay.add_reference(reference);
        }
        overlay
    }

    fn present<C: Calibration + ?Sized>(
        &mut self,
        calibration: &C,
        image: Option<&image::RgbaImage>,
        frame: &BodyFrame,
        report: &FrameReport,
    ) -> Result<()> {
        if self.sink.is_none() {
            return Ok(());
        }
        let overlay = self.build_overlay(calibration, frame, report);
        let color_size = calibration.color_size();
        match self.sink.as_mut() {
            Some(sink) => sink.present(report.frame_index, image, color_size, &overlay),
            None => Ok(()),
        }
    }

    /// Runs frames until cancelled or a step fails. Output errors that are not
    /// fatal only skip the rest of that frame's output. The log is flushed on every exit.
    pub fn run<D, T, C>(
        &mut self,
        device: &mut D,
        tracker: &mut T,
        calibration: &C,
        keys: &mut dyn KeyInput,
    ) -> RunSummary
    where
        D: SensorDevice,
        T: BodyTracker<Capture = D::Capture>,
        C: Calibration + ?Sized,
    {
        let started_at = Local::now();
        let mut metrics = PerformanceMetrics::new();
        info!("Tracking started at {}", started_at.format("%Y-%m-%d %H:%M:%S"));

        let termination = loop {
            let capture = match device.capture(self.options.capture_timeout) {
                Ok(capture) => capture,
                Err(e) => break Termination::Capture(e),
            };
            let start = Instant::now();

            if let Err(e) = tracker.enqueue_capture(&capture, self.options.enqueue_timeout) {
                break Termination::Inference(e);
            }
            let frame = match tracker.pop_result(self.options.pop_timeout) {
                Ok(frame) => frame,
                Err(e) => break Termination::Inference(e),
            };

            let report = self.process_frame(&frame);
            let output = self
                .record(&report)
                .and_then(|_| self.present(calibration, capture.color_image(), &frame, &report));
            match output {
                Err(e) if e.is_fatal() => break Termination::Output(e),
                Err(e) => warn!("Frame {}: {}", report.frame_index, e),
                Ok(()) => {}
            }
            metrics.record(start.elapsed());

            drop(frame);
            drop(capture);

            let pressed = keys.poll();
            if pressed.quit {
                break Termination::Cancelled;
            }
            if pressed.set_reference && self.options.compute_com {
                self.set_reference(&report, calibration);
            }
        };

        match &termination {
            Termination::Cancelled => info!("Tracking cancelled"),
            Termination::Capture(e) => warn!("Tracking stopped: {}", e),
            Termination::Inference(e) => warn!("Tracking stopped: {}", e),
            Termination::Output(e) => warn!("Tracking stopped: {}", e),
        }

        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.flush() {
                warn!("Failed to flush {}: {}", log.path().display(), e);
            }
        }

        RunSummary {
            started_at,
            finished_at: Local::now(),
            frames: self.frames,
            skeletons: self.skeletons,
            log_rows: self.log_rows(),
            last_displacement: self.last_displacement,
            metrics,
            termination,
        }
    }
}
