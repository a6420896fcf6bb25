use crate::command::MaskSettings;
use crate::coords::VramRect;

use super::{VRAM_HEIGHT, VRAM_PIXELS, VRAM_STATE_BYTES, VRAM_WIDTH, pixel_count};

/// 1024x512 array of RGBA5551 pixels.
///
/// As the engine's shadow this is the single source of truth for CPU reads. The null
/// backend also uses one as its "hardware" image, which is why the block-transfer
/// operations here follow the hardware's wrap and mask rules exactly.
///
/// All coordinates wrap modulo the VRAM extent.
#[derive(Clone, PartialEq, Eq)]
pub struct VramShadow {
    pixels: Box<[u16]>,
}

impl std::fmt::Debug for VramShadow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VramShadow")
            .field("width", &VRAM_WIDTH)
            .field("height", &VRAM_HEIGHT)
            .finish_non_exhaustive()
    }
}

impl Default for VramShadow {
    fn default() -> Self {
        Self::new()
    }
}

impl VramShadow {
    pub fn new() -> Self {
        Self {
            pixels: vec![0u16; VRAM_PIXELS].into_boxed_slice(),
        }
    }

    #[inline]
    fn index(x: u32, y: u32) -> usize {
        ((y % VRAM_HEIGHT) * VRAM_WIDTH + (x % VRAM_WIDTH)) as usize
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> u16 {
        self.pixels[Self::index(x, y)]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, value: u16) {
        self.pixels[Self::index(x, y)] = value;
    }

    /// Row-major view of the whole buffer.
    #[inline]
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Copies a `width x height` block starting at `(x, y)` out of the buffer.
    pub fn read_rect(&self, x: u32, y: u32, width: u32, height: u32) -> Vec<u16> {
        let mut out = Vec::with_capacity(pixel_count(width, height));
        for row in 0..height {
            let sy = y.wrapping_add(row);
            out.extend((0..width).map(|col| self.pixel(x.wrapping_add(col), sy)));
        }
        out
    }

    /// CPU-to-VRAM transfer. Pixels whose destination has the mask bit set are skipped
    /// when mask checking is on; written pixels get the mask-or bits.
    pub fn write_rect(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u16],
        mask: MaskSettings,
    ) {
        let mask_and = mask.mask_and();
        let mask_or = mask.mask_or();

        let mut src = data.iter().copied();
        for row in 0..height {
            let dy = y.wrapping_add(row);
            for col in 0..width {
                let Some(value) = src.next() else { return };
                let idx = Self::index(x.wrapping_add(col), dy);
                if self.pixels[idx] & mask_and == 0 {
                    self.pixels[idx] = value | mask_or;
                }
            }
        }
    }

    /// Rectangle fill. Fills ignore mask settings.
    ///
    /// With `skip_field = Some(f)`, rows whose LSB equals `f` (the field currently
    /// being displayed) are left untouched.
    pub fn fill_rect(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        color: u16,
        skip_field: Option<u32>,
    ) {
        for row in 0..height {
            let dy = y.wrapping_add(row) % VRAM_HEIGHT;
            if skip_field.is_some_and(|field| dy & 1 == field) {
                continue;
            }
            for col in 0..width {
                self.set_pixel(x.wrapping_add(col), dy, color);
            }
        }
    }

    /// VRAM-to-VRAM transfer.
    ///
    /// The source is captured before any destination pixel is written, so overlapping
    /// regions copy as if through a temporary buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_rect(
        &mut self,
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
        mask: MaskSettings,
    ) {
        let block = self.read_rect(src_x, src_y, width, height);
        self.write_rect(dst_x, dst_y, width, height, &block, mask);
    }

    /// Replaces `rect` (non-wrapping) with the same region of a full-size image.
    pub fn copy_region_from(&mut self, source: &[u16], rect: VramRect) {
        debug_assert_eq!(source.len(), VRAM_PIXELS);
        let rect = rect.clamped(VRAM_WIDTH, VRAM_HEIGHT);
        for y in rect.top..rect.bottom {
            let start = (y * VRAM_WIDTH + rect.left) as usize;
            let end = (y * VRAM_WIDTH + rect.right) as usize;
            self.pixels[start..end].copy_from_slice(&source[start..end]);
        }
    }

    /// Stores `pixels` (row-major, `rect.width()` per row) into a non-wrapping region.
    pub fn store_region(&mut self, rect: VramRect, pixels: &[u16]) {
        let width = rect.width() as usize;
        if width == 0 {
            return;
        }
        for (row, line) in pixels.chunks_exact(width).take(rect.height() as usize).enumerate() {
            let start = ((rect.top as usize + row) * VRAM_WIDTH as usize) + rect.left as usize;
            self.pixels[start..start + width].copy_from_slice(line);
        }
    }

    /// Serializes the buffer as little-endian u16s.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(VRAM_STATE_BYTES);
        for p in self.pixels.iter() {
            out.extend_from_slice(&p.to_le_bytes());
        }
        out
    }

    /// Replaces the contents from a buffer produced by [`to_bytes`](Self::to_bytes).
    ///
    /// Returns `false` (leaving the buffer untouched) if the size is wrong.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() != VRAM_STATE_BYTES {
            return false;
        }
        for (dst, src) in self.pixels.iter_mut().zip(bytes.chunks_exact(2)) {
            *dst = u16::from_le_bytes([src[0], src[1]]);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_MASK: MaskSettings = MaskSettings {
        set_mask_while_drawing: false,
        check_mask_before_draw: false,
    };

    fn pattern(w: u32, h: u32) -> Vec<u16> {
        (0..w * h).map(|i| (i as u16).wrapping_mul(7) & 0x7FFF).collect()
    }

    #[test]
    fn write_then_read_roundtrip() {
        let mut v = VramShadow::new();
        let data = pattern(13, 7);
        v.write_rect(100, 200, 13, 7, &data, NO_MASK);
        assert_eq!(v.read_rect(100, 200, 13, 7), data);
    }

    #[test]
    fn write_wraps_horizontally() {
        let mut v = VramShadow::new();
        v.write_rect(1022, 0, 4, 1, &[1, 2, 3, 4], NO_MASK);
        assert_eq!(v.pixel(1022, 0), 1);
        assert_eq!(v.pixel(1023, 0), 2);
        assert_eq!(v.pixel(0, 0), 3);
        assert_eq!(v.pixel(1, 0), 4);
        assert_eq!(v.read_rect(1022, 0, 4, 1), vec![1, 2, 3, 4]);
    }

    #[test]
    fn masked_pixels_are_protected() {
        let mut v = VramShadow::new();
        v.set_pixel(1, 0, 0x8001);
        let check = MaskSettings { set_mask_while_drawing: false, check_mask_before_draw: true };
        v.write_rect(0, 0, 3, 1, &[5, 6, 7], check);
        assert_eq!(v.read_rect(0, 0, 3, 1), vec![5, 0x8001, 7]);
    }

    #[test]
    fn set_mask_ors_bit_15() {
        let mut v = VramShadow::new();
        let set = MaskSettings { set_mask_while_drawing: true, check_mask_before_draw: false };
        v.write_rect(0, 0, 2, 1, &[0x0001, 0x0002], set);
        assert_eq!(v.read_rect(0, 0, 2, 1), vec![0x8001, 0x8002]);
    }

    #[test]
    fn fill_ignores_mask_and_skips_displayed_field() {
        let mut v = VramShadow::new();
        v.set_pixel(0, 0, 0x8000);
        v.fill_rect(0, 0, 2, 4, 0x1234, Some(1));
        assert_eq!(v.pixel(0, 0), 0x1234);
        assert_eq!(v.pixel(0, 1), 0);
        assert_eq!(v.pixel(1, 2), 0x1234);
        assert_eq!(v.pixel(1, 3), 0);
    }

    #[test]
    fn overlapping_copy_behaves_like_temporary_buffer() {
        let mut v = VramShadow::new();
        let src = pattern(32, 32);
        v.write_rect(0, 0, 32, 32, &src, NO_MASK);

        let mut expected = v.clone();
        let tmp = expected.read_rect(0, 0, 32, 32);
        expected.write_rect(16, 16, 32, 32, &tmp, NO_MASK);

        v.copy_rect(0, 0, 16, 16, 32, 32, NO_MASK);
        assert_eq!(v, expected);
        assert_eq!(v.read_rect(16, 16, 32, 32), src);
    }

    #[test]
    fn bytes_roundtrip_and_size_check() {
        let mut v = VramShadow::new();
        v.set_pixel(3, 4, 0xBEEF);
        let bytes = v.to_bytes();
        assert_eq!(bytes.len(), VRAM_STATE_BYTES);

        let mut w = VramShadow::new();
        assert!(w.load_bytes(&bytes));
        assert_eq!(w.pixel(3, 4), 0xBEEF);
        assert!(!w.load_bytes(&bytes[1..]));
    }

    #[test]
    fn store_region_writes_rows() {
        let mut v = VramShadow::new();
        v.store_region(VramRect::from_extents(10, 20, 2, 2), &[1, 2, 3, 4]);
        assert_eq!(v.read_rect(10, 20, 2, 2), vec![1, 2, 3, 4]);
    }
}
