//! A scrollable stand-in for the page the planet view sits behind.
//!
//! The native viewer has no document, so section visibility is derived from
//! a stack of full-height sections and a scroll offset, observed with the
//! same shrunken root box a browser observer would use.

use crate::sections::{FOOTER_TRIGGER_ID, SectionEntry};

/// Section ids from top to bottom.
pub const SECTION_IDS: [&str; 4] = ["hero", "features", "section3", FOOTER_TRIGGER_ID];

/// The observation box is inset by this fraction of the viewport at the top
/// and at the bottom.
const ROOT_MARGIN: f32 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualPage {
    offset: f32,
    viewport_height: f32,
}

impl VirtualPage {
    pub fn new(viewport_height: f32) -> Self {
        Self {
            offset: 0.0,
            viewport_height: viewport_height.max(1.0),
        }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Total scrollable height.
    pub fn height(&self) -> f32 {
        self.viewport_height * SECTION_IDS.len() as f32
    }

    fn max_offset(&self) -> f32 {
        self.height() - self.viewport_height
    }

    /// Scroll by `delta` logical pixels. Returns whether the offset moved.
    pub fn scroll_by(&mut self, delta: f32) -> bool {
        let next = (self.offset + delta).clamp(0.0, self.max_offset());
        let moved = (next - self.offset).abs() > f32::EPSILON;
        self.offset = next;
        moved
    }

    /// Scroll so that section `index` starts at the top of the viewport.
    pub fn jump_to(&mut self, index: usize) {
        let index = index.min(SECTION_IDS.len() - 1);
        self.offset = (index as f32 * self.viewport_height).min(self.max_offset());
    }

    /// Keep the same relative position after the viewport changes height.
    pub fn resize(&mut self, viewport_height: f32) {
        let fraction = if self.max_offset() > 0.0 {
            self.offset / self.max_offset()
        } else {
            0.0
        };
        self.viewport_height = viewport_height.max(1.0);
        self.offset = fraction * self.max_offset();
    }

    /// Visibility of every section within the inset observation box.
    pub fn entries(&self) -> Vec<SectionEntry> {
        let inset = self.viewport_height * ROOT_MARGIN;
        let root_top = self.offset + inset;
        let root_bottom = self.offset + self.viewport_height - inset;
        SECTION_IDS
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let top = i as f32 * self.viewport_height;
                let bottom = top + self.viewport_height;
                let overlap = (bottom.min(root_bottom) - top.max(root_top)).max(0.0);
                SectionEntry::new(*id, overlap / self.viewport_height, overlap > 0.0)
            })
            .collect()
    }
}
