// THEORY:
// Structural similarity (SSIM) compares two equally sized grayscale images by
// local luminance, contrast and structure rather than by raw pixel error, so
// a global lighting flicker hurts the score far less than a limb moving.
//
// The index is evaluated over every fully contained square window ("valid"
// mode) with uniform weights. Window sums come from summed-area tables, so
// each window costs O(1) regardless of its size. Two maps are averaged:
//
// - the full SSIM map: luminance term x contrast-structure term, and
// - the contrast-structure (CS) map alone.
//
// The movement check uses the mean of both means as its similarity score.
// 1.0 means identical; the score falls as the images diverge.

use image::GrayImage;

const DEFAULT_WINDOW: u32 = 11;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const MAX_VALUE: f64 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SsimScore {
    /// Mean of the full SSIM map.
    pub ssim: f64,
    /// Mean of the contrast-structure map.
    pub contrast_structure: f64,
}

impl SsimScore {
    pub const IDENTICAL: SsimScore = SsimScore {
        ssim: 1.0,
        contrast_structure: 1.0,
    };

    /// The single similarity number the movement check thresholds.
    pub fn combined(&self) -> f64 {
        (self.ssim + self.contrast_structure) / 2.0
    }
}

/// Compares two images of the same dimensions. Images that are empty, or
/// whose sizes differ, carry no structural evidence and score as identical.
pub fn structural_similarity(a: &GrayImage, b: &GrayImage) -> SsimScore {
    if a.dimensions() != b.dimensions() || a.width() == 0 || a.height() == 0 {
        return SsimScore::IDENTICAL;
    }
    let (width, height) = a.dimensions();

    // Largest odd window that fits.
    let mut window = DEFAULT_WINDOW.min(width).min(height);
    if window % 2 == 0 {
        window -= 1;
    }

    let tables = SumTables::new(a, b);
    let c1 = (K1 * MAX_VALUE).powi(2);
    let c2 = (K2 * MAX_VALUE).powi(2);
    let n = (window * window) as f64;

    let mut ssim_total = 0.0;
    let mut cs_total = 0.0;
    let mut count = 0usize;

    for y in 0..=(height - window) {
        for x in 0..=(width - window) {
            let sums = tables.window(x, y, window);
            let mu_a = sums.a / n;
            let mu_b = sums.b / n;
            let var_a = sums.aa / n - mu_a * mu_a;
            let var_b = sums.bb / n - mu_b * mu_b;
            let cov = sums.ab / n - mu_a * mu_b;

            let cs = (2.0 * cov + c2) / (var_a + var_b + c2);
            let luminance = (2.0 * mu_a * mu_b + c1) / (mu_a * mu_a + mu_b * mu_b + c1);
            ssim_total += luminance * cs;
            cs_total += cs;
            count += 1;
        }
    }

    SsimScore {
        ssim: ssim_total / count as f64,
        contrast_structure: cs_total / count as f64,
    }
}

#[derive(Default)]
struct WindowSums {
    a: f64,
    b: f64,
    aa: f64,
    bb: f64,
    ab: f64,
}

/// Summed-area tables for a, b, a^2, b^2 and a*b, with a zero border row
/// and column so window lookups need no bounds special cases.
struct SumTables {
    stride: usize,
    tables: Vec<WindowSums>,
}

impl SumTables {
    fn new(a: &GrayImage, b: &GrayImage) -> Self {
        let (width, height) = a.dimensions();
        let stride = width as usize + 1;
        let mut tables: Vec<WindowSums> = (0..stride * (height as usize + 1))
            .map(|_| WindowSums::default())
            .collect();

        for y in 0..height as usize {
            for x in 0..width as usize {
                let va = a.get_pixel(x as u32, y as u32).0[0] as f64;
                let vb = b.get_pixel(x as u32, y as u32).0[0] as f64;
                let up = &tables[y * stride + x + 1];
                let left = &tables[(y + 1) * stride + x];
                let diag = &tables[y * stride + x];
                let cell = WindowSums {
                    a: va + up.a + left.a - diag.a,
                    b: vb + up.b + left.b - diag.b,
                    aa: va * va + up.aa + left.aa - diag.aa,
                    bb: vb * vb + up.bb + left.bb - diag.bb,
                    ab: va * vb + up.ab + left.ab - diag.ab,
                };
                tables[(y + 1) * stride + x + 1] = cell;
            }
        }

        Self { stride, tables }
    }

    fn window(&self, x: u32, y: u32, size: u32) -> WindowSums {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + size as usize, y0 + size as usize);
        let br = &self.tables[y1 * self.stride + x1];
        let tr = &self.tables[y0 * self.stride + x1];
        let bl = &self.tables[y1 * self.stride + x0];
        let tl = &self.tables[y0 * self.stride + x0];
        WindowSums {
            a: br.a - tr.a - bl.a + tl.a,
            b: br.b - tr.b - bl.b + tl.b,
            aa: br.aa - tr.aa - bl.aa + tl.aa,
            bb: br.bb - tr.bb - bl.bb + tl.bb,
            ab: br.ab - tr.ab - bl.ab + tl.ab,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]))
    }

    #[test]
    fn identical_images_score_one() {
        let img = gradient(30, 40);
        let score = structural_similarity(&img, &img);
        assert!((score.ssim - 1.0).abs() < 1e-9);
        assert!((score.contrast_structure - 1.0).abs() < 1e-9);
        assert!((score.combined() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_identical_images_score_one() {
        let img = GrayImage::from_pixel(12, 12, Luma([80]));
        assert!((structural_similarity(&img, &img).combined() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn inverted_image_scores_low() {
        let img = gradient(24, 24);
        let inverted = GrayImage::from_fn(24, 24, |x, y| Luma([255 - img.get_pixel(x, y).0[0]]));
        let score = structural_similarity(&img, &inverted);
        assert!(score.combined() < 0.2, "score {:?}", score);
    }

    #[test]
    fn shifted_texture_scores_lower() {
        let img = GrayImage::from_fn(40, 40, |x, y| {
            let h = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503);
            Luma([(h >> 8) as u8])
        });
        let shifted = GrayImage::from_fn(40, 40, |x, y| *img.get_pixel((x + 3) % 40, y));
        let score = structural_similarity(&img, &shifted).combined();
        assert!(score < 0.99 && score > -1.0, "score {score}");
    }

    #[test]
    fn small_images_shrink_the_window() {
        let a = gradient(4, 6);
        let b = GrayImage::from_fn(4, 6, |x, y| Luma([a.get_pixel(x, y).0[0].saturating_add(40)]));
        let score = structural_similarity(&a, &b);
        assert!(score.ssim < 1.0);
        assert!(score.ssim.is_finite());
    }

    #[test]
    fn empty_or_mismatched_inputs_carry_no_evidence() {
        let empty = GrayImage::new(0, 0);
        assert_eq!(structural_similarity(&empty, &empty), SsimScore::IDENTICAL);
        assert_eq!(
            structural_similarity(&gradient(5, 5), &gradient(6, 5)),
            SsimScore::IDENTICAL
        );
    }
}
