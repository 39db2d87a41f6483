// THEORY:
// The `tracker` module gives the game "object permanence". It takes the
// stateless list of person `Detection`s from a single frame and associates
// them with the identities it was following in previous frames, so that
// "player 3" is the same human from the countdown to the final whistle.
//
// This module solves the "data association problem" with a deliberately
// small model. It is the default `IdentityTracker`; heavier trackers plug in
// behind the same trait.
//
// Key architectural principles:
// 1.  **Track Persistence**: a `Track` represents one person's existence over
//     time, distinct from a `Detection`, which is a snapshot in one frame.
// 2.  **Prediction + Gating**: every track predicts its next box from a
//     constant-velocity model. A detection can only match a track if its
//     centre lies within `gate_ratio` x predicted box height of the
//     prediction and, when both carry appearance features, within
//     `max_cosine_distance` of the track's last feature.
// 3.  **Recency First**: tracks are matched in order of how recently they
//     were seen, so a track that just went missing cannot steal the detection
//     of a track that is still in view.
// 4.  **Lifecycle Management**:
//     - **Birth**: an unmatched detection starts a `Tentative` track.
//     - **Confirmation**: after `n_init` consecutive hits it becomes
//       `Confirmed` and is reported.
//     - **Death**: a tentative track dies on its first miss; a confirmed
//       track dies after more than `max_age` misses. Brief occlusions keep
//       the identity alive.

use crate::config::TrackingConfig;
use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::detection::{Detection, IdentityTracker, TrackedPerson};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

/// One person being followed across frames.
#[derive(Debug, Clone)]
pub struct Track {
    /// A unique and persistent identity for this person.
    pub id: u64,
    /// Box from the last matched detection.
    pub bbox: BoundingBox,
    /// Centre velocity in pixels per tick.
    pub velocity: (f32, f32),
    /// Appearance feature of the last matched detection, if any.
    pub feature: Option<Vec<f32>>,
    /// Total matched detections.
    pub hits: u32,
    /// Ticks since the last matched detection.
    pub time_since_update: u32,
    pub state: TrackState,
}

impl Track {
    fn new(id: u64, detection: &Detection) -> Self {
        Self {
            id,
            bbox: detection.bbox,
            velocity: (0.0, 0.0),
            feature: detection.feature.clone(),
            hits: 1,
            time_since_update: 0,
            state: TrackState::Tentative,
        }
    }

    /// Predicted box for the next frame.
    pub fn predicted_bbox(&self) -> BoundingBox {
        let steps = (self.time_since_update + 1) as f32;
        self.bbox.translated(self.velocity.0 * steps, self.velocity.1 * steps)
    }

    fn update(&mut self, detection: &Detection, n_init: u32) {
        let (old_x, old_y) = self.bbox.center();
        let (new_x, new_y) = detection.bbox.center();
        let steps = (self.time_since_update + 1) as f32;
        self.velocity = ((new_x - old_x) / steps, (new_y - old_y) / steps);
        self.bbox = detection.bbox;
        if detection.feature.is_some() {
            self.feature = detection.feature.clone();
        }
        self.hits += 1;
        self.time_since_update = 0;
        if self.state == TrackState::Tentative && self.hits >= n_init {
            self.state = TrackState::Confirmed;
        }
    }

    fn mark_missed(&mut self, max_age: u32) {
        self.time_since_update += 1;
        if self.state == TrackState::Tentative || self.time_since_update > max_age {
            self.state = TrackState::Deleted;
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }
}

/// Constant-velocity nearest-neighbour tracker.
pub struct CentroidTracker {
    config: TrackingConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl CentroidTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Gated association cost, or `None` if the pair may not match.
    fn match_cost(&self, track: &Track, detection: &Detection) -> Option<f32> {
        let predicted = track.predicted_bbox();
        let gate = self.config.gate_ratio * predicted.height.max(1.0);
        let distance = predicted.center_distance(&detection.bbox);
        if distance > gate {
            return None;
        }
        if let (Some(a), Some(b)) = (&track.feature, &detection.feature) {
            if cosine_distance(a, b) > self.config.max_cosine_distance {
                return None;
            }
        }
        Some(distance / gate)
    }
}

impl IdentityTracker for CentroidTracker {
    fn track(&mut self, detections: &[Detection]) -> Vec<TrackedPerson> {
        let mut matches: Vec<(usize, usize)> = Vec::new(); // (track_index, detection_index)
        let mut matched_detection = vec![false; detections.len()];

        // --- 1. Matching ---
        let mut order: Vec<usize> = (0..self.tracks.len()).collect();
        order.sort_by_key(|&i| self.tracks[i].time_since_update);

        for i in order {
            let mut best: Option<(usize, f32)> = None;
            for (j, detection) in detections.iter().enumerate() {
                if matched_detection[j] {
                    continue;
                }
                let Some(cost) = self.match_cost(&self.tracks[i], detection) else {
                    continue;
                };
                match best {
                    Some((_, best_cost)) if best_cost <= cost => {}
                    _ => best = Some((j, cost)),
                }
            }
            if let Some((j, _)) = best {
                matches.push((i, j));
                matched_detection[j] = true;
            }
        }

        // --- 2. State Updating ---
        let (n_init, max_age) = (self.config.n_init, self.config.max_age);
        let mut matched_track = vec![false; self.tracks.len()];
        for (i, j) in matches {
            self.tracks[i].update(&detections[j], n_init);
            matched_track[i] = true;
        }
        for (track, matched) in self.tracks.iter_mut().zip(matched_track) {
            if !matched {
                track.mark_missed(max_age);
            }
        }

        // --- 3. Birth ---
        for (j, detection) in detections.iter().enumerate() {
            if !matched_detection[j] {
                let mut track = Track::new(self.next_id, detection);
                if n_init <= 1 {
                    track.state = TrackState::Confirmed;
                }
                self.tracks.push(track);
                self.next_id += 1;
            }
        }

        // --- 4. Death ---
        self.tracks.retain(|t| t.state != TrackState::Deleted);

        self.tracks
            .iter()
            .filter(|t| t.is_confirmed() && t.time_since_update <= 1)
            .map(|t| TrackedPerson { id: t.id, bbox: t.bbox })
            .collect()
    }
}

/// 1 - cosine similarity. Zero-length vectors are treated as unrelated.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}
