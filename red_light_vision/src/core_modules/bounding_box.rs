// THEORY:
// `BoundingBox` is the one geometric primitive every other module speaks.
// Detectors emit it, the tracker predicts it, players store it and the
// movement detector compares two of them. It uses the top-left/width/height
// convention in frame pixels, with `f32` coordinates so tracker predictions
// do not have to be rounded until a patch is actually cut out of a frame.

/// Top-left anchored box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// An integer pixel rectangle that is guaranteed to lie inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Euclidean distance between the two box centres.
    pub fn center_distance(&self, other: &BoundingBox) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Sum of the absolute width and height differences.
    pub fn size_delta(&self, other: &BoundingBox) -> f32 {
        (self.width - other.width).abs() + (self.height - other.height).abs()
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        w.max(0.0) * h.max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Moves the box by `(dx, dy)` keeping its size.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Rounds the box to whole pixels and clips it to a `frame_width` x
    /// `frame_height` frame. Returns `None` when nothing of the box is left.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        let x1 = self.x.round().clamp(0.0, frame_width as f32) as u32;
        let y1 = self.y.round().clamp(0.0, frame_height as f32) as u32;
        let x2 = self.right().round().clamp(0.0, frame_width as f32) as u32;
        let y2 = self.bottom().round().clamp(0.0, frame_height as f32) as u32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_and_area() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(b.center(), (25.0, 40.0));
        assert_eq!(b.area(), 1200.0);
    }

    #[test]
    fn displacement_is_euclidean_between_centres() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = a.translated(3.0, 4.0);
        assert_eq!(a.center_distance(&b), 5.0);
        assert_eq!(a.size_delta(&b), 0.0);
    }

    #[test]
    fn size_delta_sums_both_axes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 20.0);
        let b = BoundingBox::new(0.0, 0.0, 13.0, 16.0);
        assert_eq!(a.size_delta(&b), 7.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&BoundingBox::new(20.0, 20.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn clamp_clips_to_frame() {
        let b = BoundingBox::new(-5.0, 90.0, 20.0, 20.0);
        let rect = b.clamp_to(100, 100).unwrap();
        assert_eq!(rect, PixelRect { x: 0, y: 90, width: 15, height: 10 });
        assert!(BoundingBox::new(200.0, 0.0, 10.0, 10.0).clamp_to(100, 100).is_none());
    }
}
