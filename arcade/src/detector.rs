// YOLOv4-tiny person detector on OpenCV's DNN module. The network runs its
// own class-aware NMS; everything that is not a "person" is dropped here.
// With an appearance encoder attached, every person also carries an
// embedding for the tracker.

use crate::appearance::AppearanceEncoder;
use crate::convert::frame_to_bgr;
use opencv::{
    core::{Rect, Scalar, Size, Vector},
    dnn::{DetectionModel, DetectionModelTrait, ModelTrait},
};
use red_light_vision::config::DetectionConfig;
use red_light_vision::{BoundingBox, Detection, Frame, GameError, ModelArtifacts, PersonDetector};
use tracing::{info, warn};

const PERSON_CLASS: &str = "person";

pub struct YoloPersonDetector {
    model: DetectionModel,
    person_class: i32,
    confidence_threshold: f32,
    nms_threshold: f32,
    encoder: Option<AppearanceEncoder>,
}

impl YoloPersonDetector {
    pub fn load(
        artifacts: &ModelArtifacts,
        config: &DetectionConfig,
    ) -> red_light_vision::Result<Self> {
        let class_names = artifacts.read_class_names()?;
        let person_class = class_names
            .iter()
            .position(|name| name == PERSON_CLASS)
            .ok_or_else(|| {
                GameError::ModelLoad(format!("no \"{PERSON_CLASS}\" class in the class names file"))
            })? as i32;

        let load_error = |e: opencv::Error| GameError::ModelLoad(e.to_string());
        let mut model = DetectionModel::new(
            &artifacts.weights.to_string_lossy(),
            &artifacts.model_config.to_string_lossy(),
        )
        .map_err(load_error)?;
        let size = Size::new(config.input_size, config.input_size);
        model
            .set_input_params(1.0 / 255.0, size, Scalar::default(), true, false)
            .map_err(load_error)?;

        info!(
            weights = %artifacts.weights.display(),
            input_size = config.input_size,
            classes = class_names.len(),
            "person detector loaded"
        );
        Ok(Self {
            model,
            person_class,
            confidence_threshold: config.confidence_threshold,
            nms_threshold: config.nms_threshold,
            encoder: None,
        })
    }

    pub fn with_appearance(mut self, encoder: AppearanceEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    fn describe(&mut self, frame: &Frame, detection: Detection) -> Detection {
        let Some(encoder) = self.encoder.as_mut() else {
            return detection;
        };
        match encoder.encode(frame, &detection.bbox) {
            Ok(Some(feature)) => detection.with_feature(feature),
            Ok(None) => detection,
            Err(e) => {
                warn!(error = %e, "appearance encoding failed, box kept without a feature");
                detection
            }
        }
    }
}

impl PersonDetector for YoloPersonDetector {
    fn detect_persons(&mut self, frame: &Frame) -> red_light_vision::Result<Vec<Detection>> {
        let detection_error = |e: opencv::Error| GameError::Detection(e.to_string());
        let image = frame_to_bgr(frame).map_err(detection_error)?;

        let mut class_ids = Vector::<i32>::new();
        let mut confidences = Vector::<f32>::new();
        let mut boxes = Vector::<Rect>::new();
        self.model
            .detect(
                &image,
                &mut class_ids,
                &mut confidences,
                &mut boxes,
                self.confidence_threshold,
                self.nms_threshold,
            )
            .map_err(detection_error)?;

        let persons: Vec<Detection> = class_ids
            .iter()
            .zip(confidences.iter())
            .zip(boxes.iter())
            .filter(|((class_id, _), _)| *class_id == self.person_class)
            .map(|((_, confidence), rect)| {
                let (x, y) = (rect.x as f32, rect.y as f32);
                let bbox = BoundingBox::new(x, y, rect.width as f32, rect.height as f32);
                Detection::new(bbox, confidence)
            })
            .collect();
        Ok(persons.into_iter().map(|d| self.describe(frame, d)).collect())
    }
}
