use crate::coords::VramRect;

/// Bounding box of VRAM written on the hardware side since the last synchronization.
///
/// Only grows (set union) until it is cleared by a real sync; it is never partially
/// cleared.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DirtyRect {
    rect: Option<VramRect>,
}

impl DirtyRect {
    #[inline]
    pub const fn new() -> Self {
        Self { rect: None }
    }

    #[inline]
    pub fn get(&self) -> Option<VramRect> {
        self.rect
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rect.is_none()
    }

    pub fn include(&mut self, rect: VramRect) {
        if rect.is_empty() {
            return;
        }
        self.rect = Some(match self.rect {
            Some(current) => current.union(rect),
            None => rect,
        });
    }

    #[inline]
    pub fn intersects(&self, rect: VramRect) -> bool {
        self.rect.is_some_and(|d| d.intersects(rect))
    }

    #[inline]
    pub fn set_full(&mut self) {
        self.rect = Some(VramRect::full());
    }

    #[inline]
    pub fn clear(&mut self) {
        self.rect = None;
    }
}
