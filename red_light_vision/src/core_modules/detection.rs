// THEORY:
// The seam between the game and the vision models. Person detection and
// identity tracking are capabilities the game consumes, not ones it
// implements, so both are traits:
//
// - `PersonDetector` turns a frame into person candidates (box, confidence,
//   optional appearance feature). Implementations filter to the "person"
//   category themselves.
// - `IdentityTracker` folds a tick's candidates into stable identities and
//   reports only the confirmed ones that were seen this tick.
//
// `non_max_suppression` sits between the two. Detectors already run their
// own class-aware NMS; this second pass removes near-duplicate person boxes
// before they reach the tracker, where a duplicate would spawn a ghost track.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::frame::Frame;
use crate::error::Result;

/// A person candidate in a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    /// Appearance embedding, when the detector provides one.
    pub feature: Option<Vec<f32>>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            feature: None,
        }
    }

    pub fn with_feature(mut self, feature: Vec<f32>) -> Self {
        self.feature = Some(feature);
        self
    }
}

/// A confirmed identity and where it is this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPerson {
    pub id: u64,
    pub bbox: BoundingBox,
}

pub trait PersonDetector {
    fn detect_persons(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

pub trait IdentityTracker {
    /// Advances the tracker by one tick and returns the confirmed identities
    /// updated by `detections`.
    fn track(&mut self, detections: &[Detection]) -> Vec<TrackedPerson>;
}

/// Greedy suppression in descending confidence. A candidate is dropped when
/// more than `max_overlap` of its own area is covered by an already kept box.
/// `max_overlap >= 1.0` keeps every candidate.
pub fn non_max_suppression(mut detections: Vec<Detection>, max_overlap: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let area = candidate.bbox.area();
        let suppressed = area > 0.0
            && kept.iter().any(|k| k.bbox.intersection_area(&candidate.bbox) / area > max_overlap);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
