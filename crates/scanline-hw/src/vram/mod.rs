//! CPU-visible VRAM: the shadow buffer and the dirty-region tracking that keeps it
//! coherent with the hardware-resident image.
//!
//! Pixel format is the console's native RGBA5551:
//! - bits 0..=4 red, 5..=9 green, 10..=14 blue
//! - bit 15 mask ("semi-transparency" for texels, write-protect for drawing)

mod dirty;
mod shadow;

pub use dirty::DirtyRect;
pub use shadow::VramShadow;

use crate::coords::VramRect;

pub const VRAM_WIDTH: u32 = 1024;
pub const VRAM_HEIGHT: u32 = 512;
pub const VRAM_PIXELS: usize = (VRAM_WIDTH * VRAM_HEIGHT) as usize;

/// Size of a serialized shadow buffer (little-endian u16 per pixel).
pub const VRAM_STATE_BYTES: usize = VRAM_PIXELS * 2;

pub const TEXTURE_PAGE_WIDTH: u32 = 256;
pub const TEXTURE_PAGE_HEIGHT: u32 = 256;

/// Primitives spanning this many pixels (or more) are culled by the hardware.
pub const MAX_PRIMITIVE_WIDTH: u32 = 1024;
pub const MAX_PRIMITIVE_HEIGHT: u32 = 512;

/// Mask bit of a 16-bit VRAM pixel.
pub const MASK_BIT: u16 = 0x8000;

/// Expands 5551 to 8888 (`0xAABBGGRR`), replicating the top bits into the low bits.
#[inline]
pub const fn rgba5551_to_rgba8888(color: u16) -> u32 {
    let r = (color & 0x1F) as u32;
    let g = ((color >> 5) & 0x1F) as u32;
    let b = ((color >> 10) & 0x1F) as u32;
    let a = if color & MASK_BIT != 0 { 0xFF } else { 0x00 };

    ((r << 3) | (r >> 2))
        | (((g << 3) | (g >> 2)) << 8)
        | (((b << 3) | (b >> 2)) << 16)
        | (a << 24)
}

/// Truncates 8888 (`0xAABBGGRR`) to 5551. The top alpha bit becomes the mask bit.
#[inline]
pub const fn rgba8888_to_rgba5551(color: u32) -> u16 {
    let r = (color & 0xFF) >> 3;
    let g = ((color >> 8) & 0xFF) >> 3;
    let b = ((color >> 16) & 0xFF) >> 3;
    let a = color >> 31;

    (r | (g << 5) | (b << 10) | (a << 15)) as u16
}

/// Pixels in a `width`x`height` block. Widened before multiplying: the product of
/// two `u32` extents can exceed `u32::MAX`.
#[inline]
pub fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Area touched by a block transfer starting at `(x, y)`.
///
/// The start wraps modulo the VRAM extent. A transfer that then runs past the right
/// (bottom) edge continues at the left (top) edge, so the bounds widen to the full
/// width (height) rather than describing two disjoint pieces.
pub fn transfer_bounds(x: u32, y: u32, width: u32, height: u32) -> VramRect {
    let left = x % VRAM_WIDTH;
    let top = y % VRAM_HEIGHT;
    let mut rect = VramRect::new(left, top, left.saturating_add(width), top.saturating_add(height));

    if rect.right > VRAM_WIDTH {
        rect.left = 0;
        rect.right = VRAM_WIDTH;
    }
    if rect.bottom > VRAM_HEIGHT {
        rect.top = 0;
        rect.bottom = VRAM_HEIGHT;
    }
    rect
}

/// The non-wrapping rectangles a transfer of `width`x`height` at `(x, y)` covers:
/// one, or up to four when it crosses the right and/or bottom edge.
pub fn wrapped_pieces(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = VramRect> {
    let split = |start: u32, len: u32, extent: u32| {
        let start = start % extent;
        let len = len.min(extent);
        let first = (start, (start + len).min(extent));
        let second = (start + len > extent).then(|| (0, start + len - extent));
        [Some(first), second]
    };

    let columns = split(x, width, VRAM_WIDTH);
    let rows = split(y, height, VRAM_HEIGHT);
    rows.into_iter()
        .flatten()
        .flat_map(move |(top, bottom)| {
            columns
                .into_iter()
                .flatten()
                .map(move |(left, right)| VramRect::new(left, top, right, bottom))
        })
        .filter(|rect| !rect.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn pixel_count_does_not_overflow_u32() {
        assert_eq!(pixel_count(65536, 65536), 1 << 32);
        assert_eq!(pixel_count(u32::MAX, 2), 2 * u32::MAX as usize);
        assert_eq!(pixel_count(VRAM_WIDTH, VRAM_HEIGHT), VRAM_PIXELS);
    }

    #[test]
    fn color_conversion_roundtrips_5551() {
        for c in [0x0000u16, 0x7FFF, 0x8000, 0xC210, 0x1234, 0xFFFF] {
            assert_eq!(rgba8888_to_rgba5551(rgba5551_to_rgba8888(c)), c);
        }
    }

    #[test]
    fn mid_grey_with_alpha_sets_mask() {
        assert_eq!(rgba8888_to_rgba5551(0x8080_8080), 0xC210);
        assert_eq!(rgba8888_to_rgba5551(0x0080_8080), 0x4210);
    }

    #[test]
    fn transfer_bounds_in_range_is_exact() {
        assert_eq!(transfer_bounds(16, 32, 64, 8), VramRect::from_extents(16, 32, 64, 8));
    }

    #[test]
    fn transfer_bounds_wraps_start() {
        assert_eq!(transfer_bounds(1024 + 4, 512 + 2, 8, 8), VramRect::from_extents(4, 2, 8, 8));
    }

    #[test]
    fn transfer_bounds_widen_on_edge_crossing() {
        assert_eq!(transfer_bounds(1020, 10, 8, 4), VramRect::new(0, 10, VRAM_WIDTH, 14));
        assert_eq!(transfer_bounds(10, 510, 4, 4), VramRect::new(10, 0, 14, VRAM_HEIGHT));
    }

    #[test]
    fn wrapped_pieces_split_at_edges() {
        let pieces: Vec<_> = wrapped_pieces(1020, 510, 8, 4).collect();
        assert_eq!(
            pieces,
            vec![
                VramRect::new(1020, 510, 1024, 512),
                VramRect::new(0, 510, 4, 512),
                VramRect::new(1020, 0, 1024, 2),
                VramRect::new(0, 0, 4, 2),
            ]
        );
        assert_eq!(wrapped_pieces(16, 16, 4, 4).count(), 1);
        assert_eq!(wrapped_pieces(0, 0, 0, 4).count(), 0);
    }
}
