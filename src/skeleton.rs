// src/skeleton.rs
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Number of joints reported per tracked body.
pub const JOINT_COUNT: usize = 32;

/// Skeletal landmarks in the order the body tracker reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum JointId {
    Pelvis = 0,
    SpineNaval = 1,
    SpineChest = 2,
    Neck = 3,
    ClavicleLeft = 4,
    ShoulderLeft = 5,
    ElbowLeft = 6,
    WristLeft = 7,
    HandLeft = 8,
    HandtipLeft = 9,
    ThumbLeft = 10,
    ClavicleRight = 11,
    ShoulderRight = 12,
    ElbowRight = 13,
    WristRight = 14,
    HandRight = 15,
    HandtipRight = 16,
    ThumbRight = 17,
    HipLeft = 18,
    KneeLeft = 19,
    AnkleLeft = 20,
    ToeLeft = 21,
    HipRight = 22,
    KneeRight = 23,
    AnkleRight = 24,
    ToeRight = 25,
    Head = 26,
    Nose = 27,
    EyeLeft = 28,
    EarLeft = 29,
    EyeRight = 30,
    EarRight = 31,
}

impl JointId {
    pub const ALL: [JointId; JOINT_COUNT] = [
        Self::Pelvis,
        Self::SpineNaval,
        Self::SpineChest,
        Self::Neck,
        Self::ClavicleLeft,
        Self::ShoulderLeft,
        Self::ElbowLeft,
        Self::WristLeft,
        Self::HandLeft,
        Self::HandtipLeft,
        Self::ThumbLeft,
        Self::ClavicleRight,
        Self::ShoulderRight,
        Self::ElbowRight,
        Self::WristRight,
        Self::HandRight,
        Self::HandtipRight,
        Self::ThumbRight,
        Self::HipLeft,
        Self::KneeLeft,
        Self::AnkleLeft,
        Self::ToeLeft,
        Self::HipRight,
        Self::KneeRight,
        Self::AnkleRight,
        Self::ToeRight,
        Self::Head,
        Self::Nose,
        Self::EyeLeft,
        Self::EarLeft,
        Self::EyeRight,
        Self::EarRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pelvis => "PELVIS",
            Self::SpineNaval => "SPINE_NAVAL",
            Self::SpineChest => "SPINE_CHEST",
            Self::Neck => "NECK",
            Self::ClavicleLeft => "CLAVICLE_LEFT",
            Self::ShoulderLeft => "SHOULDER_LEFT",
            Self::ElbowLeft => "ELBOW_LEFT",
            Self::WristLeft => "WRIST_LEFT",
            Self::HandLeft => "HAND_LEFT",
            Self::HandtipLeft => "HANDTIP_LEFT",
            Self::ThumbLeft => "THUMB_LEFT",
            Self::ClavicleRight => "CLAVICLE_RIGHT",
            Self::ShoulderRight => "SHOULDER_RIGHT",
            Self::ElbowRight => "ELBOW_RIGHT",
            Self::WristRight => "WRIST_RIGHT",
            Self::HandRight => "HAND_RIGHT",
            Self::HandtipRight => "HANDTIP_RIGHT",
            Self::ThumbRight => "THUMB_RIGHT",
            Self::HipLeft => "HIP_LEFT",
            Self::KneeLeft => "KNEE_LEFT",
            Self::AnkleLeft => "ANKLE_LEFT",
            Self::ToeLeft => "TOE_LEFT",
            Self::HipRight => "HIP_RIGHT",
            Self::KneeRight => "KNEE_RIGHT",
            Self::AnkleRight => "ANKLE_RIGHT",
            Self::ToeRight => "TOE_RIGHT",
            Self::Head => "HEAD",
            Self::Nose => "NOSE",
            Self::EyeLeft => "EYE_LEFT",
            Self::EarLeft => "EAR_LEFT",
            Self::EyeRight => "EYE_RIGHT",
            Self::EarRight => "EAR_RIGHT",
        }
    }

    /// Face landmarks and hand tips are too jittery to mark on the overlay.
    pub fn is_overlay_marker(self) -> bool {
        !matches!(
            self,
            Self::Nose
                | Self::EyeLeft
                | Self::EyeRight
                | Self::EarLeft
                | Self::EarRight
                | Self::HandtipLeft
                | Self::HandtipRight
        )
    }
}

/// Bones drawn between joints on the skeleton overlay.
pub const BONES: [(JointId, JointId); 22] = [
    (JointId::Pelvis, JointId::SpineNaval),
    (JointId::SpineNaval, JointId::SpineChest),
    (JointId::SpineChest, JointId::Neck),
    (JointId::Neck, JointId::ClavicleLeft),
    (JointId::ClavicleLeft, JointId::ShoulderLeft),
    (JointId::ShoulderLeft, JointId::ElbowLeft),
    (JointId::ElbowLeft, JointId::WristLeft),
    (JointId::WristLeft, JointId::HandLeft),
    (JointId::Neck, JointId::ClavicleRight),
    (JointId::ClavicleRight, JointId::ShoulderRight),
    (JointId::ShoulderRight, JointId::ElbowRight),
    (JointId::ElbowRight, JointId::WristRight),
    (JointId::WristRight, JointId::HandRight),
    (JointId::Pelvis, JointId::HipLeft),
    (JointId::HipLeft, JointId::KneeLeft),
    (JointId::KneeLeft, JointId::AnkleLeft),
    (JointId::AnkleLeft, JointId::ToeLeft),
    (JointId::Pelvis, JointId::HipRight),
    (JointId::HipRight, JointId::KneeRight),
    (JointId::KneeRight, JointId::AnkleRight),
    (JointId::AnkleRight, JointId::ToeRight),
    (JointId::Neck, JointId::Head),
];

/// Tracker confidence for a single joint, ordered from worst to best.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// The joint is out of range (too far from the depth camera).
    #[default]
    None,
    /// Not observed, predicted by the tracker.
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    /// Depth camera space, millimeters.
    pub position: Point3<f32>,
    pub confidence: ConfidenceLevel,
}

impl Joint {
    pub fn new(x: f32, y: f32, z: f32, confidence: ConfidenceLevel) -> Self {
        Self {
            position: Point3::new(x, y, z),
            confidence,
        }
    }
}

impl Default for Joint {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            confidence: ConfidenceLevel::None,
        }
    }
}

/// One tracked body's joints for one frame. Every joint is always present;
/// unobserved joints carry a low or none confidence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    joints: [Joint; JOINT_COUNT],
}

impl Skeleton {
    pub fn from_fn(mut f: impl FnMut(JointId) -> Joint) -> Self {
        Self {
            joints: std::array::from_fn(|i| f(JointId::ALL[i])),
        }
    }

    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id.index()]
    }

    pub fn position(&self, id: JointId) -> Point3<f32> {
        self.joints[id.index()].position
    }

    pub fn confidence(&self, id: JointId) -> ConfidenceLevel {
        self.joints[id.index()].confidence
    }

    pub fn set_joint(&mut self, id: JointId, joint: Joint) {
        self.joints[id.index()] = joint;
    }

    pub fn with_joint(mut self, id: JointId, joint: Joint) -> Self {
        self.set_joint(id, joint);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointId, &Joint)> {
        JointId::ALL.iter().copied().zip(self.joints.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub id: u32,
    pub skeleton: Skeleton,
}

/// Result popped from the body tracker for one capture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BodyFrame {
    pub timestamp_usec: u64,
    pub bodies: Vec<Body>,
}

impl BodyFrame {
    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_index_roundtrip_order() {
        for (i, joint) in JointId::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
            assert_eq!(JointId::from_index(i), Some(*joint));
        }
        assert_eq!(JointId::from_index(JOINT_COUNT), None);
        assert_eq!(JointId::Nose.index(), 27);
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceLevel::None < ConfidenceLevel::Low);
        assert!(ConfidenceLevel::Low < ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Medium < ConfidenceLevel::High);
    }

    #[test]
    fn test_confidence_parses_lowercase() {
        let level: ConfidenceLevel = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(level, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_skeleton_set_and_read() {
        let skeleton = Skeleton::default().with_joint(
            JointId::KneeRight,
            Joint::new(100.0, 400.0, 0.0, ConfidenceLevel::High),
        );
        assert_eq!(skeleton.position(JointId::KneeRight), Point3::new(100.0, 400.0, 0.0));
        assert_eq!(skeleton.confidence(JointId::KneeRight), ConfidenceLevel::High);
        assert_eq!(skeleton.confidence(JointId::Pelvis), ConfidenceLevel::None);
    }

    #[test]
    fn test_face_joints_are_not_markers() {
        assert!(!JointId::Nose.is_overlay_marker());
        assert!(!JointId::HandtipRight.is_overlay_marker());
        assert!(JointId::Pelvis.is_overlay_marker());
    }
}
