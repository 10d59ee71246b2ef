//! Bounding box in frame-pixel coordinates.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle describing a tracked region in frame-pixel
/// coordinates. A zero-area box denotes "no region".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: i32,
    /// Top edge y-coordinate
    pub y: i32,
    /// Box width in pixels
    pub width: u32,
    /// Box height in pixels
    pub height: u32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The empty box at the origin ("no region").
    pub const EMPTY: BoundingBox = BoundingBox {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    /// Center point (cx, cy).
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Right edge x-coordinate (exclusive).
    #[inline]
    pub fn x2(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Bottom edge y-coordinate (exclusive).
    #[inline]
    pub fn y2(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether this box has zero area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Diagonal length in pixels.
    #[inline]
    pub fn diagonal(&self) -> f64 {
        let w = self.width as f64;
        let h = self.height as f64;
        (w * w + h * h).sqrt()
    }

    /// Whether the box lies fully inside a frame of the given dimensions.
    pub fn fits_in(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x2() <= frame_width as i32
            && self.y2() <= frame_height as i32
    }

    /// Return a new box grown by `margin` pixels on every side.
    pub fn expand(&self, margin: u32) -> BoundingBox {
        BoundingBox {
            x: self.x - margin as i32,
            y: self.y - margin as i32,
            width: self.width + 2 * margin,
            height: self.height + 2 * margin,
        }
    }

    /// Return a new box scaled about its center by `factor`.
    ///
    /// Factors below 1.0 shrink the box; the caller is responsible for
    /// clamping the factor when shrinking is not allowed.
    pub fn scale(&self, factor: f64) -> BoundingBox {
        let (cx, cy) = self.center();
        let new_w = (self.width as f64 * factor).round().max(0.0);
        let new_h = (self.height as f64 * factor).round().max(0.0);
        BoundingBox {
            x: (cx - new_w / 2.0).round() as i32,
            y: (cy - new_h / 2.0).round() as i32,
            width: new_w as u32,
            height: new_h as u32,
        }
    }

    /// Clamp the box to frame boundaries, preserving size where possible.
    ///
    /// A box larger than the frame is shrunk to the frame.
    pub fn clamp(&self, frame_width: u32, frame_height: u32) -> BoundingBox {
        let width = self.width.min(frame_width);
        let height = self.height.min(frame_height);
        let max_x = (frame_width - width) as i32;
        let max_y = (frame_height - height) as i32;
        BoundingBox {
            x: self.x.clamp(0, max_x),
            y: self.y.clamp(0, max_y),
            width,
            height,
        }
    }

    /// Compute Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) as f64 * (y2 - y1) as f64;
        let union = self.area() as f64 + other.area() as f64 - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let bbox = BoundingBox::new(10, 20, 100, 50);
        let (cx, cy) = bbox.center();
        assert!((cx - 60.0).abs() < 1e-9);
        assert!((cy - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_box() {
        assert!(BoundingBox::EMPTY.is_empty());
        assert!(BoundingBox::new(5, 5, 0, 10).is_empty());
        assert!(!BoundingBox::new(5, 5, 1, 1).is_empty());
    }

    #[test]
    fn test_expand() {
        let bbox = BoundingBox::new(10, 10, 20, 20).expand(5);
        assert_eq!(bbox, BoundingBox::new(5, 5, 30, 30));
    }

    #[test]
    fn test_scale_preserves_center() {
        let bbox = BoundingBox::new(100, 100, 50, 40);
        let scaled = bbox.scale(1.5);
        let (cx, cy) = bbox.center();
        let (scx, scy) = scaled.center();
        assert!((cx - scx).abs() <= 0.5);
        assert!((cy - scy).abs() <= 0.5);
        assert_eq!(scaled.width, 75);
        assert_eq!(scaled.height, 60);
    }

    #[test]
    fn test_clamp_inside_frame() {
        let bbox = BoundingBox::new(-10, -10, 50, 50).clamp(100, 100);
        assert_eq!(bbox.x, 0);
        assert_eq!(bbox.y, 0);
        assert_eq!(bbox.width, 50);

        let bbox = BoundingBox::new(80, 80, 50, 50).clamp(100, 100);
        assert_eq!(bbox.x, 50);
        assert_eq!(bbox.y, 50);
    }

    #[test]
    fn test_clamp_oversized() {
        let bbox = BoundingBox::new(0, 0, 200, 200).clamp(100, 80);
        assert_eq!(bbox.width, 100);
        assert_eq!(bbox.height, 80);
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0, 0, 100, 100);
        let b = BoundingBox::new(50, 50, 100, 100);
        // Intersection 50x50 = 2500, union 17500
        assert!((a.iou(&b) - 2500.0 / 17500.0).abs() < 1e-9);

        let c = BoundingBox::new(200, 200, 10, 10);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_fits_in() {
        assert!(BoundingBox::new(0, 0, 100, 100).fits_in(100, 100));
        assert!(!BoundingBox::new(1, 0, 100, 100).fits_in(100, 100));
        assert!(!BoundingBox::new(-1, 0, 10, 10).fits_in(100, 100));
    }
}
