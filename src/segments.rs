// src/segments.rs
//! Anthropometric body segment tables.
//!
//! Each segment spans two joints. Its center of mass sits at a fixed fraction of
//! the distance from the proximal joint towards the distal one, and it carries a
//! fixed fraction of the total body mass. The head is the exception: it is
//! anchored on a single joint and its center of mass is that joint's position.

use crate::skeleton::JointId;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum BodySegment {
    FootRight = 0,
    ShankRight = 1,
    ThighRight = 2,
    TrunkRight = 3,
    UpperarmRight = 4,
    ForearmRight = 5,
    HandRight = 6,
    FootLeft = 7,
    ShankLeft = 8,
    ThighLeft = 9,
    TrunkLeft = 10,
    UpperarmLeft = 11,
    ForearmLeft = 12,
    HandLeft = 13,
    Head = 14,
}

impl BodySegment {
    pub const COUNT: usize = 15;

    pub const ALL: [BodySegment; Self::COUNT] = [
        Self::FootRight,
        Self::ShankRight,
        Self::ThighRight,
        Self::TrunkRight,
        Self::UpperarmRight,
        Self::ForearmRight,
        Self::HandRight,
        Self::FootLeft,
        Self::ShankLeft,
        Self::ThighLeft,
        Self::TrunkLeft,
        Self::UpperarmLeft,
        Self::ForearmLeft,
        Self::HandLeft,
        Self::Head,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FootRight => "FOOT_RIGHT",
            Self::ShankRight => "SHANK_RIGHT",
            Self::ThighRight => "THIGH_RIGHT",
            Self::TrunkRight => "TRUNK_RIGHT",
            Self::UpperarmRight => "UPPERARM_RIGHT",
            Self::ForearmRight => "FOREARM_RIGHT",
            Self::HandRight => "HAND_RIGHT",
            Self::FootLeft => "FOOT_LEFT",
            Self::ShankLeft => "SHANK_LEFT",
            Self::ThighLeft => "THIGH_LEFT",
            Self::TrunkLeft => "TRUNK_LEFT",
            Self::UpperarmLeft => "UPPERARM_LEFT",
            Self::ForearmLeft => "FOREARM_LEFT",
            Self::HandLeft => "HAND_LEFT",
            Self::Head => "HEAD",
        }
    }
}

/// How a segment's center of mass is located on the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentAxis {
    /// Interpolated between two joints.
    Span { proximal: JointId, distal: JointId },
    /// Taken directly from one joint.
    Anchor(JointId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentDefinition {
    pub segment: BodySegment,
    pub axis: SegmentAxis,
    /// Fraction of the proximal→distal distance, 0 for anchored segments.
    pub length_fraction: f32,
    /// Fraction of total body mass.
    pub mass_fraction: f32,
}

impl SegmentDefinition {
    const fn span(
        segment: BodySegment,
        proximal: JointId,
        distal: JointId,
        length_fraction: f32,
        mass_fraction: f32,
    ) -> Self {
        Self {
            segment,
            axis: SegmentAxis::Span { proximal, distal },
            length_fraction,
            mass_fraction,
        }
    }

    const fn anchor(segment: BodySegment, joint: JointId, mass_fraction: f32) -> Self {
        Self {
            segment,
            axis: SegmentAxis::Anchor(joint),
            length_fraction: 0.0,
            mass_fraction,
        }
    }

    /// Anchored segments report their anchor joint on both ends.
    pub fn proximal(&self) -> JointId {
        match self.axis {
            SegmentAxis::Span { proximal, .. } => proximal,
            SegmentAxis::Anchor(joint) => joint,
        }
    }

    pub fn distal(&self) -> JointId {
        match self.axis {
            SegmentAxis::Span { distal, .. } => distal,
            SegmentAxis::Anchor(joint) => joint,
        }
    }

    pub fn is_anchored(&self) -> bool {
        matches!(self.axis, SegmentAxis::Anchor(_))
    }

    pub fn uses_joint(&self, joint: JointId) -> bool {
        self.proximal() == joint || self.distal() == joint
    }
}

/// Named coefficient tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentPreset {
    /// Feet, shanks, thighs, trunk halves and head.
    #[default]
    Basic8,
    /// Basic8 plus upper arms, forearms and hands.
    Full14,
}

impl SegmentPreset {
    pub fn name(self) -> &'static str {
        match self {
            Self::Basic8 => "basic8",
            Self::Full14 => "full14",
        }
    }
}

const LOWER_BODY_RIGHT: [SegmentDefinition; 4] = [
    SegmentDefinition::span(
        BodySegment::FootRight,
        JointId::ToeRight,
        JointId::AnkleRight,
        0.5,
        0.0133,
    ),
    SegmentDefinition::span(
        BodySegment::ShankRight,
        JointId::AnkleRight,
        JointId::KneeRight,
        0.419,
        0.0535,
    ),
    SegmentDefinition::span(
        BodySegment::ThighRight,
        JointId::KneeRight,
        JointId::HipRight,
        0.428,
        0.1175,
    ),
    SegmentDefinition::span(
        BodySegment::TrunkRight,
        JointId::HipRight,
        JointId::ShoulderRight,
        0.5,
        0.225,
    ),
];

const ARM_RIGHT: [SegmentDefinition; 3] = [
    SegmentDefinition::span(
        BodySegment::UpperarmRight,
        JointId::ElbowRight,
        JointId::ShoulderRight,
        0.458,
        0.029,
    ),
    SegmentDefinition::span(
        BodySegment::ForearmRight,
        JointId::WristRight,
        JointId::ElbowRight,
        0.434,
        0.0157,
    ),
    SegmentDefinition::span(
        BodySegment::HandRight,
        JointId::HandtipRight,
        JointId::WristRight,
        0.468,
        0.005,
    ),
];

const LOWER_BODY_LEFT: [SegmentDefinition; 4] = [
    SegmentDefinition::span(
        BodySegment::FootLeft,
        JointId::ToeLeft,
        JointId::AnkleLeft,
        0.5,
        0.0133,
    ),
    SegmentDefinition::span(
        BodySegment::ShankLeft,
        JointId::AnkleLeft,
        JointId::KneeLeft,
        0.419,
        0.0535,
    ),
    SegmentDefinition::span(
        BodySegment::ThighLeft,
        JointId::KneeLeft,
        JointId::HipLeft,
        0.428,
        0.1175,
    ),
    SegmentDefinition::span(
        BodySegment::TrunkLeft,
        JointId::HipLeft,
        JointId::ShoulderLeft,
        0.5,
        0.225,
    ),
];

const ARM_LEFT: [SegmentDefinition; 3] = [
    SegmentDefinition::span(
        BodySegment::UpperarmLeft,
        JointId::ElbowLeft,
        JointId::ShoulderLeft,
        0.458,
        0.029,
    ),
    SegmentDefinition::span(
        BodySegment::ForearmLeft,
        JointId::WristLeft,
        JointId::ElbowLeft,
        0.434,
        0.0157,
    ),
    SegmentDefinition::span(
        BodySegment::HandLeft,
        JointId::HandtipLeft,
        JointId::WristLeft,
        0.468,
        0.005,
    ),
];

// Without arms the head carries the arm mass as well.
const HEAD_BASIC: SegmentDefinition =
    SegmentDefinition::anchor(BodySegment::Head, JointId::Nose, 0.1814);
const HEAD_FULL: SegmentDefinition =
    SegmentDefinition::anchor(BodySegment::Head, JointId::Nose, 0.082);

static BASIC_8: Lazy<SegmentModel> = Lazy::new(|| {
    let definitions = LOWER_BODY_RIGHT
        .iter()
        .chain(LOWER_BODY_LEFT.iter())
        .chain(std::iter::once(&HEAD_BASIC))
        .copied()
        .collect();
    SegmentModel::new(SegmentPreset::Basic8, definitions)
});

static FULL_14: Lazy<SegmentModel> = Lazy::new(|| {
    let definitions = LOWER_BODY_RIGHT
        .iter()
        .chain(ARM_RIGHT.iter())
        .chain(LOWER_BODY_LEFT.iter())
        .chain(ARM_LEFT.iter())
        .chain(std::iter::once(&HEAD_FULL))
        .copied()
        .collect();
    SegmentModel::new(SegmentPreset::Full14, definitions)
});

/// Immutable segment table chosen at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentModel {
    preset: SegmentPreset,
    definitions: Vec<SegmentDefinition>,
    lookup: [Option<usize>; BodySegment::COUNT],
}

impl SegmentModel {
    fn new(preset: SegmentPreset, definitions: Vec<SegmentDefinition>) -> Self {
        let mut lookup = [None; BodySegment::COUNT];
        for (i, definition) in definitions.iter().enumerate() {
            lookup[definition.segment.index()] = Some(i);
        }
        Self {
            preset,
            definitions,
            lookup,
        }
    }

    pub fn basic_8() -> &'static SegmentModel {
        &BASIC_8
    }

    pub fn full_14() -> &'static SegmentModel {
        &FULL_14
    }

    pub fn preset(preset: SegmentPreset) -> &'static SegmentModel {
        match preset {
            SegmentPreset::Basic8 => Self::basic_8(),
            SegmentPreset::Full14 => Self::full_14(),
        }
    }

    pub fn preset_kind(&self) -> SegmentPreset {
        self.preset
    }

    pub fn definition(&self, segment: BodySegment) -> Option<&SegmentDefinition> {
        self.lookup[segment.index()].map(|i| &self.definitions[i])
    }

    pub fn definitions(&self) -> &[SegmentDefinition] {
        &self.definitions
    }

    /// Segments of this model in table order.
    pub fn segments(&self) -> impl Iterator<Item = BodySegment> + '_ {
        self.definitions.iter().map(|d| d.segment)
    }

    pub fn contains(&self, segment: BodySegment) -> bool {
        self.lookup[segment.index()].is_some()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Segments bounded by `joint`, the reverse of the definition table.
    pub fn segments_for_joint(&self, joint: JointId) -> impl Iterator<Item = BodySegment> + '_ {
        self.definitions
            .iter()
            .filter(move |d| d.uses_joint(joint))
            .map(|d| d.segment)
    }

    pub fn total_mass_fraction(&self) -> f32 {
        self.definitions.iter().map(|d| d.mass_fraction).sum()
    }
}
