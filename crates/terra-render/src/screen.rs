//! Screen-space rectangles and viewport conversions.

use glam::Vec2;

/// A rectangle in logical viewport pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Zero-area rectangles carry no outline.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.left + self.width * 0.5, self.top + self.height * 0.5)
    }

    pub fn perimeter(&self) -> f32 {
        2.0 * (self.width.max(0.0) + self.height.max(0.0))
    }

    /// Whether the rectangle overlaps the viewport grown by `margin` on each side.
    pub fn intersects_viewport(&self, viewport: Viewport, margin: f32) -> bool {
        self.right() > -margin
            && self.bottom() > -margin
            && self.left < viewport.width + margin
            && self.top < viewport.height + margin
    }
}

/// Logical viewport size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Width over height; 1 for degenerate viewports.
    pub fn aspect(&self) -> f32 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Pixel position to normalized device coordinates (y up).
    pub fn to_ndc(&self, px: Vec2) -> Vec2 {
        let w = self.width.max(1.0);
        let h = self.height.max(1.0);
        Vec2::new(px.x / w * 2.0 - 1.0, -(px.y / h) * 2.0 + 1.0)
    }

    /// Normalized device coordinates to a pixel position.
    pub fn from_ndc(&self, ndc: Vec2) -> Vec2 {
        Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.width,
            (1.0 - ndc.y) * 0.5 * self.height,
        )
    }
}
