/// An axis-aligned face bounding box in pixel coordinates.
///
/// Detectors may report boxes that extend past the frame; use
/// [`Region::clamped`] before reading pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub score: Option<f32>,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Intersection with the `[0, frame_w) x [0, frame_h)` rectangle.
    ///
    /// Returns `None` when nothing of the region lies inside the frame.
    pub fn clamped(&self, frame_w: u32, frame_h: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x + self.width).min(frame_w as i32);
        let y2 = (self.y + self.height).min(frame_h as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            score: self.score,
        })
    }
}
