// src/overlay.rs
use crate::com::ComResult;
use crate::error::{Result, TrackingError};
use crate::reference::Displacement;
use crate::sensor::{project_to_color, Calibration};
use crate::skeleton::{Skeleton, BONES, JOINT_COUNT};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use nalgebra::{Point2, Point3};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Offset of the first displacement label from the body center marker, pixels.
const LABEL_OFFSET: f32 = 30.0;
const LABEL_SPACING: f32 = 30.0;
const BONE_THICKNESS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Joint,
    SegmentCom,
    BodyCom,
    Reference,
}

impl MarkerKind {
    pub fn color(self) -> Rgba<u8> {
        match self {
            Self::Joint => Rgba([255, 255, 255, 255]),
            Self::SegmentCom => Rgba([0, 255, 0, 255]),
            Self::BodyCom => Rgba([255, 0, 0, 255]),
            Self::Reference => Rgba([0, 0, 255, 255]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: Point2<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub position: Point2<f32>,
    pub text: String,
}

/// 2-D annotations for one color frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub markers: Vec<Marker>,
    pub bones: Vec<(Point2<f32>, Point2<f32>)>,
    pub labels: Vec<Label>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.bones.is_empty() && self.labels.is_empty()
    }

    pub fn markers_of(&self, kind: MarkerKind) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(move |m| m.kind == kind)
    }

    pub fn push_marker(&mut self, kind: MarkerKind, position: Point2<f32>) {
        self.markers.push(Marker { kind, position });
    }

    /// Projects and adds a marker. Invalid projections are skipped.
    pub fn project_marker<C: Calibration + ?Sized>(
        &mut self,
        calibration: &C,
        kind: MarkerKind,
        point: &Point3<f32>,
    ) -> Option<Point2<f32>> {
        match project_to_color(calibration, point) {
            Ok(p) => {
                self.push_marker(kind, p);
                Some(p)
            }
            Err(e) => {
                skip_point(kind, &e);
                None
            }
        }
    }

    /// Joint markers and bones of one skeleton.
    pub fn add_skeleton<C: Calibration + ?Sized>(&mut self, calibration: &C, skeleton: &Skeleton) {
        let mut projected: [Option<Point2<f32>>; JOINT_COUNT] = [None; JOINT_COUNT];

        for (id, joint) in skeleton.iter() {
            if !id.is_overlay_marker() {
                continue;
            }
            projected[id.index()] =
                self.project_marker(calibration, MarkerKind::Joint, &joint.position);
        }

        for (from, to) in BONES {
            if let (Some(a), Some(b)) = (projected[from.index()], projected[to.index()]) {
                self.bones.push((a, b));
            }
        }
    }

    /// Segment centers and the whole-body center. Returns the projected body center.
    pub fn add_com<C: Calibration + ?Sized>(
        &mut self,
        calibration: &C,
        result: &ComResult,
    ) -> Option<Point2<f32>> {
        for (_, com) in result.segments.iter() {
            self.project_marker(calibration, MarkerKind::SegmentCom, &com);
        }
        self.project_marker(calibration, MarkerKind::BodyCom, &result.com)
    }

    pub fn add_reference(&mut self, position: Point2<f32>) {
        self.push_marker(MarkerKind::Reference, position);
    }

    /// Three lines of displacement text below and right of `anchor`.
    pub fn add_displacement(&mut self, anchor: Point2<f32>, displacement: &Displacement) {
        for (i, text) in displacement.labels().into_iter().enumerate() {
            let dy = LABEL_OFFSET + LABEL_SPACING * i as f32;
            self.labels.push(Label {
                position: Point2::new(anchor.x + LABEL_OFFSET, anchor.y + dy),
                text,
            });
        }
    }

    /// Draws markers and bones in place. Labels are not rasterized.
    pub fn render(&self, image: &mut RgbaImage, marker_radius: i32) {
        let white = MarkerKind::Joint.color();
        for (a, b) in &self.bones {
            for t in -(BONE_THICKNESS / 2)..=(BONE_THICKNESS / 2) {
                let t = t as f32;
                draw_line_segment_mut(image, (a.x + t, a.y), (b.x + t, b.y), white);
                draw_line_segment_mut(image, (a.x, a.y + t), (b.x, b.y + t), white);
            }
        }

        for kind in [
            MarkerKind::Joint,
            MarkerKind::SegmentCom,
            MarkerKind::BodyCom,
            MarkerKind::Reference,
        ] {
            for marker in self.markers_of(kind) {
                let center = (marker.position.x.round() as i32, marker.position.y.round() as i32);
                draw_filled_circle_mut(image, center, marker_radius, kind.color());
            }
        }
    }
}

fn skip_point(kind: MarkerKind, err: &TrackingError) {
    match err {
        TrackingError::ProjectionInvalid { .. } => {
            debug!("Skipping {:?} marker: {}", kind, err)
        }
        _ => warn!("Skipping {:?} marker: {}", kind, err),
    }
}

/// Receives the annotated result of every processed frame.
///
/// `color_size` is the color image size the overlay was projected for.
pub trait FrameSink {
    fn present(
        &mut self,
        frame_index: u64,
        image: Option<&RgbaImage>,
        color_size: (u32, u32),
        overlay: &Overlay,
    ) -> Result<()>;
}

/// Writes an annotated PNG every `every` frames and logs the displacement text.
pub struct SnapshotSink {
    output_dir: PathBuf,
    every: u64,
    marker_radius: i32,
    saved: u64,
}

impl SnapshotSink {
    pub fn new(output_dir: impl Into<PathBuf>, every: u64, marker_radius: i32) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        info!("Saving overlay snapshots to {}", output_dir.display());

        Ok(Self {
            output_dir,
            every: every.max(1),
            marker_radius,
            saved: 0,
        })
    }

    pub fn saved(&self) -> u64 {
        self.saved
    }

    fn snapshot_path(&self, frame_index: u64) -> PathBuf {
        self.output_dir.join(format!("overlay_{:06}.png", frame_index))
    }
}

impl FrameSink for SnapshotSink {
    fn present(
        &mut self,
        frame_index: u64,
        image: Option<&RgbaImage>,
        color_size: (u32, u32),
        overlay: &Overlay,
    ) -> Result<()> {
        for label in &overlay.labels {
            debug!("{}", label.text);
        }

        if frame_index % self.every != 0 {
            return Ok(());
        }

        // Without a color image the overlay goes on a black canvas.
        let mut canvas = match image {
            Some(image) => image.clone(),
            None => RgbaImage::from_pixel(color_size.0, color_size.1, Rgba([0, 0, 0, 255])),
        };
        overlay.render(&mut canvas, self.marker_radius);

        let path = self.snapshot_path(frame_index);
        canvas.save(&path)?;
        self.saved += 1;
        debug!("Saved {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::ComEstimator;
    use crate::segments::SegmentPreset;
    use crate::sensor::{CameraSpace, Projection};
    use crate::skeleton::{ConfidenceLevel, Joint, JointId};

    /// Orthographic projection; points behind the camera are invalid.
    struct FlatCalibration;

    impl Calibration for FlatCalibration {
        fn project_3d_to_2d(
            &self,
            point: &Point3<f32>,
            _: CameraSpace,
            _: CameraSpace,
        ) -> Result<Projection> {
            Ok(Projection {
                point: Point2::new(point.x, point.y),
                valid: point.z > 0.0,
            })
        }

        fn color_size(&self) -> (u32, u32) {
            (64, 64)
        }
    }

    fn standing_skeleton() -> Skeleton {
        Skeleton::from_fn(|id| {
            let i = id.index() as f32;
            Joint::new(i, 2.0 * i, 1000.0, ConfidenceLevel::High)
        })
    }

    #[test]
    fn test_skeleton_skips_face_and_hand_tips() {
        let mut overlay = Overlay::new();
        overlay.add_skeleton(&FlatCalibration, &standing_skeleton());

        assert_eq!(overlay.markers_of(MarkerKind::Joint).count(), 25);
        assert_eq!(overlay.bones.len(), BONES.len());
        let nose = JointId::Nose.index() as f32;
        assert!(overlay
            .markers
            .iter()
            .all(|m| m.position != Point2::new(nose, 2.0 * nose)));
    }

    #[test]
    fn test_invalid_projection_drops_marker_and_bones() {
        let skeleton = standing_skeleton().with_joint(
            JointId::KneeLeft,
            Joint::new(0.0, 0.0, -5.0, ConfidenceLevel::High),
        );
        let mut overlay = Overlay::new();
        overlay.add_skeleton(&FlatCalibration, &skeleton);

        assert_eq!(overlay.markers_of(MarkerKind::Joint).count(), 24);
        assert_eq!(overlay.bones.len(), BONES.len() - 2);
    }

    #[test]
    fn test_com_markers() {
        let estimator = ComEstimator::with_preset(SegmentPreset::Basic8);
        let result = estimator.evaluate(&standing_skeleton(), Default::default());

        let mut overlay = Overlay::new();
        let center = overlay.add_com(&FlatCalibration, &result);

        assert_eq!(overlay.markers_of(MarkerKind::SegmentCom).count(), 9);
        assert_eq!(overlay.markers_of(MarkerKind::BodyCom).count(), 1);
        assert_eq!(center, Some(Point2::new(result.com.x, result.com.y)));
    }

    #[test]
    fn test_displacement_labels_follow_anchor() {
        let mut overlay = Overlay::new();
        let displacement = Displacement { x: 1.0, y: 2.0, z: 3.0 };
        overlay.add_displacement(Point2::new(100.0, 200.0), &displacement);

        assert_eq!(overlay.labels.len(), 3);
        assert_eq!(overlay.labels[0].position, Point2::new(130.0, 230.0));
        assert_eq!(overlay.labels[2].position, Point2::new(130.0, 290.0));
        assert_eq!(overlay.labels[1].text, "Y: 2.00 mm");
    }

    #[test]
    fn test_render_marker_colors() {
        let mut overlay = Overlay::new();
        overlay.push_marker(MarkerKind::BodyCom, Point2::new(10.0, 10.0));
        overlay.add_reference(Point2::new(40.0, 40.0));

        let mut image = RgbaImage::new(64, 64);
        overlay.render(&mut image, 3);

        assert_eq!(*image.get_pixel(10, 10), MarkerKind::BodyCom.color());
        assert_eq!(*image.get_pixel(40, 40), MarkerKind::Reference.color());
        assert_eq!(*image.get_pixel(25, 25), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_snapshot_canvas_matches_color_size() {
        let dir = std::env::temp_dir().join(format!("com_tracker_sink_{}", uuid::Uuid::new_v4()));
        let mut sink = SnapshotSink::new(&dir, 2, 3).unwrap();
        let mut overlay = Overlay::new();
        overlay.push_marker(MarkerKind::BodyCom, Point2::new(8.0, 8.0));

        sink.present(0, None, (32, 16), &overlay).unwrap();
        sink.present(1, None, (32, 16), &overlay).unwrap();

        assert_eq!(sink.saved(), 1);
        assert!(!dir.join("overlay_000001.png").exists());
        let saved = image::open(dir.join("overlay_000000.png")).unwrap().to_rgba8();
        assert_eq!(saved.dimensions(), (32, 16));
        assert_eq!(*saved.get_pixel(8, 8), MarkerKind::BodyCom.color());
        let _ = fs::remove_dir_all(dir);
    }
}
