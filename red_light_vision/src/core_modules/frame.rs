// THEORY:
// A `Frame` is one RGB picture handed over by the frame source. The engine
// never mutates it; overlays are drawn by the display on its own copy.
// The only pixel work the game itself needs from a frame is cutting out a
// player's box as a grayscale patch, so that is the one operation here.

use crate::core_modules::bounding_box::BoundingBox;
use image::{GrayImage, RgbImage, imageops};

#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Wraps a packed RGB8 buffer. Returns `None` if the length does not match.
    pub fn from_rgb_bytes(width: u32, height: u32, bytes: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, bytes).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// The part of the frame under `bbox`, converted to luma. `None` when the
    /// box lies entirely outside the frame.
    pub fn grayscale_patch(&self, bbox: &BoundingBox) -> Option<GrayImage> {
        let rect = bbox.clamp_to(self.width(), self.height())?;
        let view = imageops::crop_imm(&self.image, rect.x, rect.y, rect.width, rect.height);
        Some(imageops::grayscale(&*view))
    }
}
