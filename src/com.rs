// src/com.rs
//! Segment and whole-body center of mass estimation.

use crate::segments::{BodySegment, SegmentAxis, SegmentModel, SegmentPreset};
use crate::skeleton::{ConfidenceLevel, JointId, Skeleton};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// How segment existence is decided each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistencePolicy {
    /// Every segment of the model is used regardless of joint confidence.
    All,
    /// A segment is used only if all of its joints are above low confidence.
    #[default]
    Confidence,
}

/// Per-segment flags for one skeleton in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentExistence {
    flags: [bool; BodySegment::COUNT],
}

impl SegmentExistence {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all(model: &SegmentModel) -> Self {
        let mut existence = Self::none();
        for segment in model.segments() {
            existence.set(segment, true);
        }
        existence
    }

    /// Starts from every segment and drops those bounded by a joint that is
    /// only predicted (low) or out of range (none).
    pub fn from_confidence(model: &SegmentModel, skeleton: &Skeleton) -> Self {
        let mut existence = Self::all(model);
        for (joint, data) in skeleton.iter() {
            if data.confidence <= ConfidenceLevel::Low {
                for segment in model.segments_for_joint(joint) {
                    existence.set(segment, false);
                }
            }
        }
        existence
    }

    pub fn evaluate(policy: ExistencePolicy, model: &SegmentModel, skeleton: &Skeleton) -> Self {
        match policy {
            ExistencePolicy::All => Self::all(model),
            ExistencePolicy::Confidence => Self::from_confidence(model, skeleton),
        }
    }

    pub fn contains(&self, segment: BodySegment) -> bool {
        self.flags[segment.index()]
    }

    pub fn set(&mut self, segment: BodySegment, exists: bool) {
        self.flags[segment.index()] = exists;
    }

    pub fn iter(&self) -> impl Iterator<Item = BodySegment> + '_ {
        BodySegment::ALL
            .iter()
            .copied()
            .filter(move |s| self.contains(*s))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }
}

/// Segment centers of mass; segments that did not exist are absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentComs {
    points: [Option<Point3<f32>>; BodySegment::COUNT],
}

impl SegmentComs {
    pub fn get(&self, segment: BodySegment) -> Option<Point3<f32>> {
        self.points[segment.index()]
    }

    pub fn insert(&mut self, segment: BodySegment, point: Point3<f32>) {
        self.points[segment.index()] = Some(point);
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodySegment, Point3<f32>)> + '_ {
        BodySegment::ALL
            .iter()
            .filter_map(move |s| self.get(*s).map(|p| (*s, p)))
    }

    pub fn len(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything computed for one skeleton in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ComResult {
    pub existence: SegmentExistence,
    pub segments: SegmentComs,
    pub com: Point3<f32>,
}

pub struct ComEstimator {
    model: SegmentModel,
}

impl ComEstimator {
    pub fn new(model: SegmentModel) -> Self {
        Self { model }
    }

    pub fn with_preset(preset: SegmentPreset) -> Self {
        Self::new(SegmentModel::preset(preset).clone())
    }

    pub fn model(&self) -> &SegmentModel {
        &self.model
    }

    /// Center of mass of every existing segment.
    pub fn estimate(&self, skeleton: &Skeleton, existence: &SegmentExistence) -> SegmentComs {
        let mut coms = SegmentComs::default();

        for definition in self.model.definitions() {
            if !existence.contains(definition.segment) {
                continue;
            }

            let com = match definition.axis {
                SegmentAxis::Anchor(joint) => skeleton.position(joint),
                SegmentAxis::Span { proximal, distal } => interpolate(
                    skeleton.position(proximal),
                    skeleton.position(distal),
                    definition.length_fraction,
                ),
            };
            coms.insert(definition.segment, com);
        }

        coms
    }

    /// Mass-weighted sum of the existing segment centers.
    ///
    /// The sum is not renormalized when segments are missing, so a partial
    /// skeleton yields a point pulled towards the origin.
    pub fn aggregate(&self, coms: &SegmentComs, existence: &SegmentExistence) -> Point3<f32> {
        let mut center = Point3::origin();

        for definition in self.model.definitions() {
            if !existence.contains(definition.segment) {
                continue;
            }
            if let Some(com) = coms.get(definition.segment) {
                center.coords += com.coords * definition.mass_fraction;
            }
        }

        center
    }

    pub fn compute(&self, skeleton: &Skeleton, existence: SegmentExistence) -> ComResult {
        let segments = self.estimate(skeleton, &existence);
        let com = self.aggregate(&segments, &existence);
        ComResult {
            existence,
            segments,
            com,
        }
    }

    pub fn evaluate(&self, skeleton: &Skeleton, policy: ExistencePolicy) -> ComResult {
        let existence = SegmentExistence::evaluate(policy, &self.model, skeleton);
        self.compute(skeleton, existence)
    }

    /// Joints whose confidence removed at least one segment this frame.
    /// Nothing is removed under [`ExistencePolicy::All`].
    pub fn excluded_joints<'a>(
        &'a self,
        skeleton: &'a Skeleton,
        policy: ExistencePolicy,
    ) -> impl Iterator<Item = JointId> + 'a {
        skeleton
            .iter()
            .filter(move |_| policy == ExistencePolicy::Confidence)
            .filter(|(_, j)| j.confidence <= ConfidenceLevel::Low)
            .map(|(id, _)| id)
            .filter(move |id| self.model.segments_for_joint(*id).next().is_some())
    }
}

fn interpolate(proximal: Point3<f32>, distal: Point3<f32>, fraction: f32) -> Point3<f32> {
    proximal + (distal - proximal) * fraction
}
