use crate::vram::{VRAM_HEIGHT, VRAM_WIDTH};

/// Axis-aligned rectangle in VRAM pixel coordinates.
///
/// Half-open on both axes: `[left, right) x [top, bottom)`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct VramRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl VramRect {
    #[inline]
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self { left, top, right, bottom }
    }

    #[inline]
    pub const fn from_extents(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// The whole VRAM area.
    #[inline]
    pub const fn full() -> Self {
        Self::new(0, 0, VRAM_WIDTH, VRAM_HEIGHT)
    }

    #[inline]
    pub const fn width(self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    #[inline]
    pub const fn height(self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// True when both rects are non-empty and share at least one pixel.
    #[inline]
    pub fn intersects(self, other: VramRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    #[inline]
    pub fn intersect(self, other: VramRect) -> Option<VramRect> {
        if !self.intersects(other) {
            return None;
        }
        Some(VramRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        ))
    }

    /// Smallest rect containing both. Empty inputs are ignored.
    #[inline]
    pub fn union(self, other: VramRect) -> VramRect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        VramRect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    #[inline]
    pub fn contains_rect(self, other: VramRect) -> bool {
        other.is_empty()
            || (self.left <= other.left
                && self.top <= other.top
                && self.right >= other.right
                && self.bottom >= other.bottom)
    }

    #[inline]
    pub fn clamped(self, max_width: u32, max_height: u32) -> VramRect {
        VramRect::new(
            self.left.min(max_width),
            self.top.min(max_height),
            self.right.min(max_width),
            self.bottom.min(max_height),
        )
    }

    /// Multiplies every edge by the resolution scale.
    #[inline]
    pub const fn scaled(self, scale: u32) -> VramRect {
        VramRect::new(
            self.left * scale,
            self.top * scale,
            self.right * scale,
            self.bottom * scale,
        )
    }
}
