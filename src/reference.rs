// src/reference.rs
use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// When displacement is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplacementMode {
    /// Only once an operator has set a reference pose.
    #[default]
    AfterReference,
    /// Every frame; the reference is the origin until one is set.
    Always,
}

/// Center of mass offset from the reference pose, in millimeters.
///
/// X and Y are flipped relative to the depth camera axes so that moving right
/// and up on screen is positive. Z is the raw depth difference, reference
/// minus current, so moving towards the camera is positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displacement {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Displacement {
    pub fn between(reference: &Point3<f32>, current: &Point3<f32>) -> Self {
        Self {
            x: -(reference.x - current.x),
            y: -(reference.y - current.y),
            z: reference.z - current.z,
        }
    }

    pub fn as_vector(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Overlay lines, one per axis.
    pub fn labels(&self) -> [String; 3] {
        [
            format!("X: {:.2} mm", self.x),
            format!("Y: {:.2} mm", self.y),
            format!("Z: {:.2} mm", self.z),
        ]
    }
}

impl fmt::Display for Displacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X: {:.2} mm, Y: {:.2} mm, Z: {:.2} mm", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePose {
    pub com: Point3<f32>,
    /// Projection of `com` into the color image, if it was valid.
    pub projected: Option<Point2<f32>>,
}

/// Holds the operator-set reference pose. Once set it can only be replaced.
#[derive(Debug, Clone)]
pub struct ReferenceTracker {
    mode: DisplacementMode,
    reference: Option<ReferencePose>,
}

impl ReferenceTracker {
    pub fn new(mode: DisplacementMode) -> Self {
        Self {
            mode,
            reference: None,
        }
    }

    pub fn mode(&self) -> DisplacementMode {
        self.mode
    }

    pub fn is_set(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<&ReferencePose> {
        self.reference.as_ref()
    }

    pub fn set_reference(&mut self, com: Point3<f32>, projected: Option<Point2<f32>>) {
        if self.reference.is_some() {
            info!("Reference point reset to ({:.2}, {:.2}, {:.2})", com.x, com.y, com.z);
        } else {
            info!("Reference point set to ({:.2}, {:.2}, {:.2})", com.x, com.y, com.z);
        }
        self.reference = Some(ReferencePose { com, projected });
    }

    /// `None` while no reference exists in after-reference mode.
    pub fn displacement(&self, current: &Point3<f32>) -> Option<Displacement> {
        match (&self.reference, self.mode) {
            (Some(reference), _) => Some(Displacement::between(&reference.com, current)),
            (None, DisplacementMode::Always) => {
                Some(Displacement::between(&Point3::origin(), current))
            }
            (None, DisplacementMode::AfterReference) => None,
        }
    }

    /// Reference marker position on the color image.
    pub fn reference_2d(&self) -> Option<Point2<f32>> {
        match (&self.reference, self.mode) {
            (Some(reference), _) => reference.projected,
            (None, DisplacementMode::Always) => Some(Point2::origin()),
            (None, DisplacementMode::AfterReference) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_before_reference() {
        let tracker = ReferenceTracker::new(DisplacementMode::AfterReference);
        assert!(!tracker.is_set());
        assert_eq!(tracker.displacement(&Point3::new(1.0, 2.0, 3.0)), None);
        assert_eq!(tracker.reference_2d(), None);
    }

    #[test]
    fn test_always_mode_defaults_to_origin() {
        let tracker = ReferenceTracker::new(DisplacementMode::Always);
        let d = tracker.displacement(&Point3::new(10.0, -20.0, 1500.0)).unwrap();
        assert_eq!(d, Displacement { x: 10.0, y: -20.0, z: -1500.0 });
        assert_eq!(tracker.reference_2d(), Some(Point2::origin()));
    }

    #[test]
    fn test_axis_sign_convention() {
        let mut tracker = ReferenceTracker::new(DisplacementMode::AfterReference);
        let (x0, y0, z0) = (12.0, -40.0, 1800.0);
        let (x1, y1, z1) = (30.0, -10.0, 1750.0);
        tracker.set_reference(Point3::new(x0, y0, z0), None);

        let d = tracker.displacement(&Point3::new(x1, y1, z1)).unwrap();
        assert_eq!(d.x, -(x0 - x1));
        assert_eq!(d.y, -(y0 - y1));
        assert_eq!(d.z, z0 - z1);
    }

    #[test]
    fn test_identical_frame_is_zero() {
        let mut tracker = ReferenceTracker::new(DisplacementMode::AfterReference);
        let com = Point3::new(123.456, -78.9, 2034.5);
        tracker.set_reference(com, Some(Point2::new(640.0, 360.0)));

        let d = tracker.displacement(&com).unwrap();
        assert_eq!(d.as_vector(), Vector3::zeros());
        assert_eq!(tracker.reference_2d(), Some(Point2::new(640.0, 360.0)));
    }

    #[test]
    fn test_reference_can_be_replaced() {
        let mut tracker = ReferenceTracker::new(DisplacementMode::Always);
        tracker.set_reference(Point3::new(1.0, 1.0, 1.0), None);
        tracker.set_reference(Point3::new(5.0, 5.0, 5.0), None);

        assert_eq!(tracker.reference().unwrap().com, Point3::new(5.0, 5.0, 5.0));
        let d = tracker.displacement(&Point3::new(5.0, 5.0, 5.0)).unwrap();
        assert_eq!(d.as_vector(), Vector3::zeros());
        // projection of the new reference was invalid
        assert_eq!(tracker.reference_2d(), None);
    }

    #[test]
    fn test_labels() {
        let d = Displacement { x: 1.0, y: -2.5, z: 0.3 };
        assert_eq!(d.labels(), ["X: 1.00 mm", "Y: -2.50 mm", "Z: 0.30 mm"]);
    }
}
