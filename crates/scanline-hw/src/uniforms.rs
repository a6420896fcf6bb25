//! Fixed-layout constant blocks consumed by the backend shaders.
//!
//! All blocks are `#[repr(C)]` and padded to 16-byte multiples so the same bytes
//! can back a WGSL uniform struct.

use bytemuck::{Pod, Zeroable};

use crate::batch::BatchConfig;
use crate::command::DrawMode;
use crate::settings::RendererSettings;
use crate::vram::{VRAM_HEIGHT, VRAM_WIDTH, rgba5551_to_rgba8888, rgba8888_to_rgba5551};

/// Largest depth ordinal, used to normalize it into `0..=1`.
const DEPTH_RANGE: f32 = 65535.0;

#[inline]
pub fn normalized_depth(ordinal: i32) -> f32 {
    ordinal as f32 / DEPTH_RANGE
}

#[inline]
fn flag(b: bool) -> u32 {
    b as u32
}

// ── batch ─────────────────────────────────────────────────────────────────

/// Layout (64 bytes):
///
///  offset  0  texture_window_and   [u32; 2]
///  offset  8  texture_window_or    [u32; 2]
///  offset 16  src/dst alpha factor f32 x2
///  offset 24  interlaced, displayed field, set mask, check mask
///  offset 40  texture mode, dithering, true color, scaled dithering
///  offset 56  resolution scale, texture filtering
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct BatchUniforms {
    pub texture_window_and: [u32; 2],
    pub texture_window_or: [u32; 2],
    pub src_alpha_factor: f32,
    pub dst_alpha_factor: f32,
    pub interlaced: u32,
    pub interlaced_displayed_field: u32,
    pub set_mask_while_drawing: u32,
    pub check_mask_before_draw: u32,
    pub texture_mode: u32,
    pub dithering: u32,
    pub true_color: u32,
    pub scaled_dithering: u32,
    pub resolution_scale: u32,
    pub texture_filtering: u32,
}

impl BatchUniforms {
    pub fn new(config: &BatchConfig, mode: &DrawMode, settings: &RendererSettings) -> Self {
        let (and, or) = mode.texture_window.masks();
        let (src_alpha_factor, dst_alpha_factor) = config.transparency_mode.alpha_factors();

        Self {
            texture_window_and: and,
            texture_window_or: or,
            src_alpha_factor,
            dst_alpha_factor,
            interlaced: flag(config.interlacing),
            interlaced_displayed_field: if config.interlacing { mode.displayed_field & 1 } else { 0 },
            set_mask_while_drawing: flag(config.set_mask_while_drawing),
            check_mask_before_draw: flag(config.check_mask_before_draw),
            texture_mode: config.texture_mode.bits(),
            dithering: flag(config.dithering),
            true_color: flag(settings.true_color),
            scaled_dithering: flag(settings.scaled_dithering),
            resolution_scale: settings.resolution_scale,
            texture_filtering: flag(settings.texture_filtering),
        }
    }
}

// ── fill ──────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct VramFillUniforms {
    pub fill_color: [f32; 4],
    pub interlaced: u32,
    pub interlaced_displayed_field: u32,
    pub _pad: [u32; 2],
}

impl VramFillUniforms {
    /// `color` is `0xAABBGGRR`. Without true color the fill is quantized to 5551 first,
    /// matching what the hardware stores.
    pub fn new(color: u32, skip_field: Option<u32>, true_color: bool) -> Self {
        let color = if true_color {
            color
        } else {
            rgba5551_to_rgba8888(rgba8888_to_rgba5551(color))
        };
        let channel = |shift: u32| ((color >> shift) & 0xFF) as f32 / 255.0;

        Self {
            fill_color: [channel(0), channel(8), channel(16), channel(24)],
            interlaced: flag(skip_field.is_some()),
            interlaced_displayed_field: skip_field.unwrap_or(0),
            _pad: [0; 2],
        }
    }
}

// ── write ─────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct VramWriteUniforms {
    pub dst_x: u32,
    pub dst_y: u32,
    pub end_x: u32,
    pub end_y: u32,
    pub width: u32,
    pub height: u32,
    /// Offset of the pixel data in the backend's upload buffer, in pixels.
    /// Filled in by the backend when it stages the data.
    pub buffer_base_offset: u32,
    pub mask_or_bits: u32,
    pub depth_value: f32,
    pub resolution_scale: u32,
    pub _pad: [u32; 2],
}

impl VramWriteUniforms {
    pub fn new(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        set_mask: bool,
        depth_ordinal: i32,
        resolution_scale: u32,
    ) -> Self {
        Self {
            dst_x: x % VRAM_WIDTH,
            dst_y: y % VRAM_HEIGHT,
            end_x: x.wrapping_add(width) % VRAM_WIDTH,
            end_y: y.wrapping_add(height) % VRAM_HEIGHT,
            width,
            height,
            buffer_base_offset: 0,
            mask_or_bits: if set_mask { 0x8000 } else { 0 },
            depth_value: normalized_depth(depth_ordinal),
            resolution_scale,
            _pad: [0; 2],
        }
    }
}

// ── copy ──────────────────────────────────────────────────────────────────

/// Every coordinate is in scaled render-target pixels.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct VramCopyUniforms {
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub end_x: u32,
    pub end_y: u32,
    pub width: u32,
    pub height: u32,
    pub set_mask_bit: u32,
    pub depth_value: f32,
    pub _pad: [u32; 2],
}

impl VramCopyUniforms {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
        set_mask: bool,
        depth_ordinal: i32,
        scale: u32,
    ) -> Self {
        Self {
            src_x: (src_x % VRAM_WIDTH) * scale,
            src_y: (src_y % VRAM_HEIGHT) * scale,
            dst_x: (dst_x % VRAM_WIDTH) * scale,
            dst_y: (dst_y % VRAM_HEIGHT) * scale,
            end_x: (dst_x.wrapping_add(width) % VRAM_WIDTH) * scale,
            end_y: (dst_y.wrapping_add(height) % VRAM_HEIGHT) * scale,
            width: width * scale,
            height: height * scale,
            set_mask_bit: flag(set_mask),
            depth_value: normalized_depth(depth_ordinal),
            _pad: [0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{TextureColorMode, TextureMode, TextureWindow, TransparencyMode};

    #[test]
    fn block_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<BatchUniforms>(), 64);
        assert_eq!(std::mem::size_of::<VramFillUniforms>(), 32);
        assert_eq!(std::mem::size_of::<VramWriteUniforms>(), 48);
        assert_eq!(std::mem::size_of::<VramCopyUniforms>(), 48);
    }

    #[test]
    fn alpha_factors_per_mode() {
        let settings = RendererSettings::default();
        let mode = DrawMode::default();
        let cases = [
            (TransparencyMode::Average, (0.5, 0.5)),
            (TransparencyMode::Additive, (1.0, 1.0)),
            (TransparencyMode::Subtractive, (1.0, 1.0)),
            (TransparencyMode::QuarterAdditive, (0.25, 1.0)),
            (TransparencyMode::Disabled, (1.0, 0.0)),
        ];
        for (transparency_mode, (src, dst)) in cases {
            let cfg = BatchConfig { transparency_mode, ..Default::default() };
            let u = BatchUniforms::new(&cfg, &mode, &settings);
            assert_eq!((u.src_alpha_factor, u.dst_alpha_factor), (src, dst));
        }
    }

    #[test]
    fn batch_uniforms_carry_window_and_mode() {
        let mode = DrawMode {
            texture_window: TextureWindow { mask_x: 1, mask_y: 2, offset_x: 1, offset_y: 0 },
            displayed_field: 1,
            ..Default::default()
        };
        let cfg = BatchConfig {
            texture_mode: TextureMode::Enabled { color: TextureColorMode::Palette8Bit, raw: true },
            interlacing: true,
            ..Default::default()
        };
        let u = BatchUniforms::new(&cfg, &mode, &RendererSettings::default());
        assert_eq!(u.texture_window_and, [0xF7, 0xEF]);
        assert_eq!(u.texture_window_or, [0x08, 0]);
        assert_eq!(u.texture_mode, 1 | TextureMode::RAW_BIT);
        assert_eq!((u.interlaced, u.interlaced_displayed_field), (1, 1));
    }

    #[test]
    fn fill_quantizes_without_true_color() {
        let u = VramFillUniforms::new(0x0000_0007, None, false);
        assert_eq!(u.fill_color[0], 0.0);
        let u = VramFillUniforms::new(0x0000_0007, Some(1), true);
        assert_eq!(u.fill_color[0], 7.0 / 255.0);
        assert_eq!((u.interlaced, u.interlaced_displayed_field), (1, 1));
    }

    #[test]
    fn write_and_copy_wrap_and_scale() {
        let w = VramWriteUniforms::new(1020, 10, 8, 4, true, 65535, 2);
        assert_eq!((w.dst_x, w.end_x, w.end_y), (1020, 4, 14));
        assert_eq!(w.mask_or_bits, 0x8000);
        assert_eq!(w.depth_value, 1.0);

        let c = VramCopyUniforms::new(1030, 0, 0, 510, 4, 4, false, 0, 2);
        assert_eq!((c.src_x, c.dst_y, c.end_y), (12, 1020, 4));
        assert_eq!((c.width, c.height), (8, 8));
    }
}
