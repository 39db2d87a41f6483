// THEORY:
// The movement detector decides whether a player moved between two
// observations. It runs two gates in a fixed order:
//
// 1.  **Coarse gate**: compare the two bounding boxes. If the centre moved,
//     or the box changed size, by more than a threshold, that is movement and
//     no pixel is looked at. Both thresholds scale with the area of the older
//     box divided by a per-player reference area, so a player standing close
//     to the camera (large box, large pixel jitter) is allowed more slack
//     than one standing far away.
// 2.  **Fine gate**: when the boxes agree, compare what is inside them. Both
//     grayscale patches are downsampled, centre-cropped to a common size and
//     scored with structural similarity. A score below the similarity
//     threshold is movement: the silhouette stayed put but something inside
//     it (an arm, a sway) changed.
//
// The detector is stateless. The caller owns the earlier observation. The
// only way a check can fail is the patch resize in the fine gate.

use crate::core_modules::bounding_box::BoundingBox;
use crate::core_modules::patch::{center_crop_common, downsample_area};
use crate::core_modules::ssim::structural_similarity;
use crate::error::{GameError, Result};
use image::GrayImage;
use serde::Deserialize;

/// Per-player movement tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MovementThresholds {
    /// Allowed centre displacement in pixels at `reference_area`.
    #[serde(default = "default_center_threshold")]
    pub center_threshold: f64,
    /// Allowed |dw| + |dh| in pixels at `reference_area`.
    #[serde(default = "default_box_threshold")]
    pub box_threshold: f64,
    /// Similarity scores below this count as movement.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_downsample_factor")]
    pub downsample_factor: f64,
    /// Box area (px^2) at which the coarse thresholds apply unscaled.
    #[serde(default = "default_reference_area")]
    pub reference_area: f64,
}

fn default_center_threshold() -> f64 {
    150.0
}

fn default_box_threshold() -> f64 {
    250.0
}

fn default_similarity_threshold() -> f64 {
    0.75
}

fn default_downsample_factor() -> f64 {
    1.0 / 3.0
}

fn default_reference_area() -> f64 {
    1_000_000.0
}

impl Default for MovementThresholds {
    fn default() -> Self {
        Self {
            center_threshold: default_center_threshold(),
            box_threshold: default_box_threshold(),
            similarity_threshold: default_similarity_threshold(),
            downsample_factor: default_downsample_factor(),
            reference_area: default_reference_area(),
        }
    }
}

impl MovementThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(self.downsample_factor > 0.0 && self.downsample_factor <= 1.0) {
            return Err(GameError::InvalidConfig(format!(
                "movement.downsample_factor must be in (0, 1], got {}",
                self.downsample_factor
            )));
        }
        if !(self.reference_area > 0.0) {
            return Err(GameError::InvalidConfig(format!(
                "movement.reference_area must be positive, got {}",
                self.reference_area
            )));
        }
        if self.center_threshold < 0.0 || self.box_threshold < 0.0 {
            return Err(GameError::InvalidConfig("movement thresholds must be non-negative".into()));
        }
        Ok(())
    }

    /// Scales a coarse threshold by how big the old box is.
    fn scaled(&self, threshold: f64, old_area: f64) -> f64 {
        threshold * old_area / self.reference_area
    }
}

/// One side of a comparison: where the player was and what they looked like.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub bbox: &'a BoundingBox,
    pub patch: &'a GrayImage,
}

/// The outcome of a movement check, with the evidence that decided it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovementVerdict {
    Still { similarity: f64 },
    CoarseMotion { displacement: f64, size_delta: f64 },
    FineMotion { similarity: f64 },
}

impl MovementVerdict {
    pub fn is_movement(&self) -> bool {
        !matches!(self, MovementVerdict::Still { .. })
    }
}

pub fn check_movement(
    thresholds: &MovementThresholds,
    previous: Observation<'_>,
    current: Observation<'_>,
) -> Result<MovementVerdict> {
    let displacement = previous.bbox.center_distance(current.bbox) as f64;
    let size_delta = previous.bbox.size_delta(current.bbox) as f64;
    let old_area = previous.bbox.area() as f64;

    if displacement > thresholds.scaled(thresholds.center_threshold, old_area)
        || size_delta > thresholds.scaled(thresholds.box_threshold, old_area)
    {
        return Ok(MovementVerdict::CoarseMotion {
            displacement,
            size_delta,
        });
    }

    let similarity = patch_similarity(previous.patch, current.patch, thresholds.downsample_factor)?;
    if similarity < thresholds.similarity_threshold {
        Ok(MovementVerdict::FineMotion { similarity })
    } else {
        Ok(MovementVerdict::Still { similarity })
    }
}

/// Downsample, centre-crop to a common size, then score.
pub fn patch_similarity(
    previous: &GrayImage,
    current: &GrayImage,
    downsample_factor: f64,
) -> Result<f64> {
    let small_previous = downsample_area(previous, downsample_factor)?;
    let small_current = downsample_area(current, downsample_factor)?;
    let (a, b) = center_crop_common(&small_previous, &small_current);
    Ok(structural_similarity(&a, &b).combined())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn textured(width: u32, height: u32, seed: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let h = (x / 3).wrapping_mul(2_654_435_761) ^ (y / 3).wrapping_mul(40_503) ^ seed;
            Luma([(h >> 8) as u8])
        })
    }

    fn thresholds() -> MovementThresholds {
        MovementThresholds {
            center_threshold: 100.0,
            box_threshold: 100.0,
            similarity_threshold: 0.75,
            downsample_factor: 1.0 / 3.0,
            reference_area: 10_000.0,
        }
    }

    #[test]
    fn identical_observations_are_still() {
        let bbox = BoundingBox::new(10.0, 10.0, 60.0, 120.0);
        let patch = textured(60, 120, 7);
        let obs = Observation { bbox: &bbox, patch: &patch };
        let verdict = check_movement(&thresholds(), obs, obs).unwrap();
        assert_eq!(verdict, MovementVerdict::Still { similarity: 1.0 });
        assert!(!verdict.is_movement());
    }

    #[test]
    fn coarse_gate_wins_even_with_identical_patches() {
        // Old area 100x100 = reference area, so the displacement threshold is 100 px.
        let before = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let after = before.translated(101.0, 0.0);
        let patch = textured(100, 100, 1);
        let verdict = check_movement(
            &thresholds(),
            Observation { bbox: &before, patch: &patch },
            Observation { bbox: &after, patch: &patch },
        )
        .unwrap();
        assert!(matches!(
            verdict,
            MovementVerdict::CoarseMotion { displacement, .. } if displacement == 101.0
        ));
    }

    #[test]
    fn coarse_threshold_scales_with_old_area() {
        // Quarter of the reference area: threshold drops to 25 px.
        let before = BoundingBox::new(0.0, 0.0, 50.0, 50.0);
        let patch = textured(50, 50, 3);
        let small_move = before.translated(20.0, 0.0);
        let big_move = before.translated(30.0, 0.0);
        let t = thresholds();
        let prev = Observation { bbox: &before, patch: &patch };
        let small = Observation { bbox: &small_move, patch: &patch };
        let big = Observation { bbox: &big_move, patch: &patch };
        assert!(!check_movement(&t, prev, small).unwrap().is_movement());
        assert!(matches!(
            check_movement(&t, prev, big).unwrap(),
            MovementVerdict::CoarseMotion { .. }
        ));
    }

    #[test]
    fn size_change_trips_coarse_gate() {
        let before = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        // Centre shifts by 30 px, size grows by 120 px in total.
        let after = BoundingBox::new(0.0, 0.0, 160.0, 160.0);
        let patch = textured(100, 100, 5);
        let verdict = check_movement(
            &thresholds(),
            Observation { bbox: &before, patch: &patch },
            Observation { bbox: &after, patch: &patch },
        )
        .unwrap();
        assert!(matches!(
            verdict,
            MovementVerdict::CoarseMotion { size_delta, .. } if size_delta == 120.0
        ));
    }

    #[test]
    fn changed_content_in_a_steady_box_is_fine_motion() {
        let bbox = BoundingBox::new(0.0, 0.0, 90.0, 90.0);
        let before = textured(90, 90, 11);
        let after = textured(90, 90, 0xdead_beef);
        let verdict = check_movement(
            &thresholds(),
            Observation { bbox: &bbox, patch: &before },
            Observation { bbox: &bbox, patch: &after },
        )
        .unwrap();
        assert!(matches!(verdict, MovementVerdict::FineMotion { similarity } if similarity < 0.75));
    }

    #[test]
    fn patches_of_different_size_are_cropped_before_scoring() {
        let big = textured(99, 150, 21);
        let cropped = image::imageops::crop_imm(&big, 3, 3, 93, 144).to_image();
        let similarity = patch_similarity(&big, &cropped, 1.0 / 3.0).unwrap();
        assert!(similarity.is_finite());
        assert!(similarity <= 1.0 + 1e-9);
    }

    #[test]
    fn downsample_factor_is_validated() {
        let mut t = thresholds();
        assert!(t.validate().is_ok());
        t.downsample_factor = 0.0;
        assert!(t.validate().is_err());
        t.downsample_factor = 1.5;
        assert!(t.validate().is_err());
    }
}
