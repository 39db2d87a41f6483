// Appearance embeddings for the tracker's cosine gate, from the MARS
// re-identification network (`mars-small128.pb`) run through OpenCV's DNN
// module. Each person box is widened or narrowed around its centre to the
// network's 1:2 aspect, cut out of the frame, resized to 64x128 and encoded
// into a unit-length vector.

use crate::convert::frame_to_bgr;
use opencv::{
    core::{CV_32F, Scalar, Size},
    dnn::{self, Net},
    prelude::*,
};
use red_light_vision::{BoundingBox, Frame, GameError};
use std::path::Path;
use tracing::info;

const INPUT_WIDTH: i32 = 64;
const INPUT_HEIGHT: i32 = 128;

pub struct AppearanceEncoder {
    net: Net,
}

impl AppearanceEncoder {
    pub fn load(model: &Path) -> red_light_vision::Result<Self> {
        let load_error = |e: opencv::Error| GameError::ModelLoad(e.to_string());
        let net = dnn::read_net_from_tensorflow(&model.to_string_lossy(), "").map_err(load_error)?;
        if net.empty().map_err(load_error)? {
            return Err(GameError::ModelLoad(format!("{} holds no network", model.display())));
        }
        info!(model = %model.display(), "appearance encoder loaded");
        Ok(Self { net })
    }

    /// Embedding of the person under `bbox`. `Ok(None)` when the box lies
    /// outside the frame.
    pub fn encode(
        &mut self,
        frame: &Frame,
        bbox: &BoundingBox,
    ) -> opencv::Result<Option<Vec<f32>>> {
        let Some(rect) = network_aspect(bbox).clamp_to(frame.width(), frame.height()) else {
            return Ok(None);
        };
        let crop =
            image::imageops::crop_imm(frame.image(), rect.x, rect.y, rect.width, rect.height);
        let bgr = frame_to_bgr(&Frame::new(crop.to_image()))?;

        let size = Size::new(INPUT_WIDTH, INPUT_HEIGHT);
        let blob = dnn::blob_from_image(&bgr, 1.0, size, Scalar::default(), false, false, CV_32F)?;
        self.net.set_input(&blob, "", 1.0, Scalar::default())?;
        let output = self.net.forward_single("")?;
        Ok(Some(unit_length(output.data_typed::<f32>()?.to_vec())))
    }
}

/// Resizes the box width to half its height, keeping the centre.
fn network_aspect(bbox: &BoundingBox) -> BoundingBox {
    let width = bbox.height * INPUT_WIDTH as f32 / INPUT_HEIGHT as f32;
    let (cx, _) = bbox.center();
    BoundingBox::new(cx - width / 2.0, bbox.y, width, bbox.height)
}

fn unit_length(mut feature: Vec<f32>) -> Vec<f32> {
    let norm = feature.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        feature.iter_mut().for_each(|v| *v /= norm);
    }
    feature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_is_reshaped_to_the_network_aspect_around_its_centre() {
        let wide = BoundingBox::new(100.0, 50.0, 120.0, 200.0);
        let shaped = network_aspect(&wide);
        assert_eq!(shaped, BoundingBox::new(110.0, 50.0, 100.0, 200.0));
        assert_eq!(shaped.center(), wide.center());
    }

    #[test]
    fn features_are_scaled_to_unit_length() {
        let feature = unit_length(vec![3.0, 4.0]);
        assert!((feature[0] - 0.6).abs() < 1e-6);
        assert!((feature[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn zero_feature_is_left_alone() {
        assert_eq!(unit_length(vec![0.0; 4]), vec![0.0; 4]);
    }
}
