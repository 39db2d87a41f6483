// THEORY:
// Patch preparation for the fine movement check. Two grayscale crops of the
// same player, taken at different times, rarely have the same size. Before
// they can be compared pixel by pixel they are:
//
// 1. downsampled by a fixed factor with area averaging, which both speeds up
//    the comparison and suppresses sensor noise, and
// 2. centre-cropped to a common, even size, so the comparison looks at the
//    middle of the body where a player's box is least affected by jitter.

use crate::error::{GameError, Result};
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{GrayImage, imageops};

/// Resizes `patch` by `factor` (0 < factor <= 1). A box filter scaled to the
/// reduction averages every source pixel under a destination pixel.
pub fn downsample_area(patch: &GrayImage, factor: f64) -> Result<GrayImage> {
    let (src_w, src_h) = patch.dimensions();
    let dst_w = (src_w as f64 * factor).round() as u32;
    let dst_h = (src_h as f64 * factor).round() as u32;
    if dst_w == 0 || dst_h == 0 {
        return Ok(GrayImage::new(0, 0));
    }

    let src = Image::from_vec_u8(src_w, src_h, patch.as_raw().clone(), PixelType::U8)?;
    let mut dst = Image::new(dst_w, dst_h, PixelType::U8);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Box));
    Resizer::new().resize(&src, &mut dst, &options)?;

    GrayImage::from_raw(dst_w, dst_h, dst.into_vec()).ok_or_else(|| {
        GameError::Resize(format!("resized buffer does not hold {dst_w}x{dst_h} pixels"))
    })
}

/// Crops both patches around their centres to the largest even size that
/// fits inside both of them.
pub fn center_crop_common(a: &GrayImage, b: &GrayImage) -> (GrayImage, GrayImage) {
    let half_h = a.height().min(b.height()) / 2;
    let half_w = a.width().min(b.width()) / 2;
    (center_crop(a, half_w, half_h), center_crop(b, half_w, half_h))
}

fn center_crop(patch: &GrayImage, half_w: u32, half_h: u32) -> GrayImage {
    let cx = patch.width() / 2;
    let cy = patch.height() / 2;
    imageops::crop_imm(patch, cx - half_w, cy - half_h, half_w * 2, half_h * 2).to_image()
}
