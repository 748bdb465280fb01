//! Viewport geometry
//!
//! Rectangles are in document coordinates. The viewport is the visible
//! window onto the document; its `y` is the scroll offset.

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn top(&self) -> f32 { self.y }
    pub fn left(&self) -> f32 { self.x }
    pub fn right(&self) -> f32 { self.x + self.width }
    pub fn bottom(&self) -> f32 { self.y + self.height }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Overlap with `other`, if any
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right > x && bottom > y {
            Some(Rect { x, y, width: right - x, height: bottom - y })
        } else {
            None
        }
    }

    /// No layout yet, or collapsed to nothing
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Visible region of the document
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Same size, scrolled to `y`
    #[inline]
    pub fn scrolled_to(&self, y: f32) -> Viewport {
        Viewport { y, ..*self }
    }

    /// Expand viewport by a margin (for prefetching).
    #[inline]
    pub fn expand(&self, margin: f32) -> Viewport {
        Viewport {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Fraction of `target` inside this viewport. An empty target has not
    /// been laid out and never intersects.
    pub fn intersection_ratio(&self, target: &Rect) -> f32 {
        if target.is_empty() {
            return 0.0;
        }
        target
            .intersect(&self.as_rect())
            .map(|i| i.area() / target.area())
            .unwrap_or(0.0)
    }
}
