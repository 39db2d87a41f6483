// Moving pixels between OpenCV (BGR `Mat`) and the engine (RGB `Frame`).

use opencv::{core::Mat, imgproc, prelude::*};
use image::GrayImage;
use red_light_vision::Frame;

/// Converts a captured BGR image into an engine frame. `None` for an empty
/// or malformed image.
pub fn bgr_to_frame(bgr: &Mat) -> opencv::Result<Option<Frame>> {
    if bgr.empty() {
        return Ok(None);
    }
    let mut rgb = Mat::default();
    imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let bytes = rgb.data_bytes()?.to_vec();
    Ok(Frame::from_rgb_bytes(width, height, bytes))
}

/// Converts an engine frame back into a BGR image for drawing and inference.
pub fn frame_to_bgr(frame: &Frame) -> opencv::Result<Mat> {
    let flat = Mat::from_slice(frame.image().as_raw().as_slice())?;
    let rgb = flat.reshape(3, frame.height() as i32)?.try_clone()?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

/// Converts a grayscale patch into a three-channel BGR image.
pub fn gray_to_bgr(patch: &GrayImage) -> opencv::Result<Mat> {
    let flat = Mat::from_slice(patch.as_raw().as_slice())?;
    let gray = flat.reshape(1, patch.height() as i32)?.try_clone()?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(&gray, &mut bgr, imgproc::COLOR_GRAY2BGR, 0)?;
    Ok(bgr)
}
