//! Draw-mode registers (GP0 E1..E6) in decoded form.

use crate::coords::VramRect;
use crate::vram::{TEXTURE_PAGE_HEIGHT, TEXTURE_PAGE_WIDTH, VRAM_HEIGHT, VRAM_WIDTH, wrapped_pieces};

/// Semi-transparency blend equation. The first four values match the hardware's
/// two-bit encoding.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TransparencyMode {
    /// `B/2 + F/2`
    Average = 0,
    /// `B + F`
    Additive = 1,
    /// `B - F`
    Subtractive = 2,
    /// `B + F/4`
    QuarterAdditive = 3,
    #[default]
    Disabled = 4,
}

impl TransparencyMode {
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => Self::Average,
            1 => Self::Additive,
            2 => Self::Subtractive,
            _ => Self::QuarterAdditive,
        }
    }

    /// `(source, destination)` weights applied by the blend unit.
    ///
    /// Subtractive uses unit weights with a reverse-subtract blend operation.
    #[inline]
    pub const fn alpha_factors(self) -> (f32, f32) {
        match self {
            Self::Average => (0.5, 0.5),
            Self::Additive | Self::Subtractive => (1.0, 1.0),
            Self::QuarterAdditive => (0.25, 1.0),
            Self::Disabled => (1.0, 0.0),
        }
    }
}

/// Texel color depth of a texture page.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TextureColorMode {
    #[default]
    Palette4Bit = 0,
    Palette8Bit = 1,
    Direct16Bit = 2,
}

impl TextureColorMode {
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => Self::Palette4Bit,
            1 => Self::Palette8Bit,
            // 3 is reserved and behaves as 15-bit direct.
            _ => Self::Direct16Bit,
        }
    }

    #[inline]
    pub const fn uses_palette(self) -> bool {
        !matches!(self, Self::Direct16Bit)
    }
}

/// Texture sampling mode of a batch.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TextureMode {
    #[default]
    Disabled,
    /// `raw` textures skip modulation by the vertex color.
    Enabled { color: TextureColorMode, raw: bool },
}

impl TextureMode {
    pub const RAW_BIT: u32 = 4;
    pub const DISABLED_BITS: u32 = 8;

    #[inline]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled { .. })
    }

    /// Shader encoding: color mode in bits 0..=1, raw flag in bit 2, 8 = disabled.
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Disabled => Self::DISABLED_BITS,
            Self::Enabled { color, raw } => {
                color as u32 | if raw { Self::RAW_BIT } else { 0 }
            }
        }
    }
}

/// GP0(E1) texpage register.
///
/// ```text
/// 0-3  page X base (x64)     7-8  color mode
/// 4    page Y base (x256)    9    dither enable
/// 5-6  transparency mode     11   texture disable
/// ```
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct TexturePage(pub u16);

impl TexturePage {
    /// Bits a polygon's texpage attribute may replace.
    pub const POLYGON_MASK: u16 = 0x09FF;

    #[inline]
    pub const fn base_x(self) -> u32 {
        (self.0 & 0xF) as u32 * 64
    }

    #[inline]
    pub const fn base_y(self) -> u32 {
        ((self.0 >> 4) & 1) as u32 * 256
    }

    #[inline]
    pub const fn transparency_mode(self) -> TransparencyMode {
        TransparencyMode::from_bits(self.0 >> 5)
    }

    #[inline]
    pub const fn color_mode(self) -> TextureColorMode {
        TextureColorMode::from_bits(self.0 >> 7)
    }

    #[inline]
    pub const fn dither_enabled(self) -> bool {
        self.0 & (1 << 9) != 0
    }

    #[inline]
    pub const fn texture_disabled(self) -> bool {
        self.0 & (1 << 11) != 0
    }

    /// VRAM area sampled through this page. Texel fetches wrap at the right edge,
    /// so a page near it also covers columns from x = 0.
    pub fn rects(self) -> impl Iterator<Item = VramRect> {
        let width = match self.color_mode() {
            TextureColorMode::Palette4Bit => TEXTURE_PAGE_WIDTH / 4,
            TextureColorMode::Palette8Bit => TEXTURE_PAGE_WIDTH / 2,
            TextureColorMode::Direct16Bit => TEXTURE_PAGE_WIDTH,
        };
        wrapped_pieces(self.base_x(), self.base_y(), width, TEXTURE_PAGE_HEIGHT)
    }

    /// Applies a polygon's texpage attribute, keeping the register-only bits.
    #[inline]
    pub const fn with_polygon_bits(self, bits: u16) -> Self {
        Self((self.0 & !Self::POLYGON_MASK) | (bits & Self::POLYGON_MASK))
    }
}

/// CLUT attribute: palette location in VRAM.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Palette(pub u16);

impl Palette {
    #[inline]
    pub const fn x(self) -> u32 {
        (self.0 & 0x3F) as u32 * 16
    }

    #[inline]
    pub const fn y(self) -> u32 {
        ((self.0 >> 6) & 0x1FF) as u32
    }

    /// VRAM area holding the palette for the given color mode, split where it
    /// wraps past the right edge. Empty for direct color.
    pub fn rects(self, mode: TextureColorMode) -> impl Iterator<Item = VramRect> {
        let width = match mode {
            TextureColorMode::Palette4Bit => 16,
            TextureColorMode::Palette8Bit => 256,
            TextureColorMode::Direct16Bit => 0,
        };
        wrapped_pieces(self.x(), self.y(), width, 1)
    }
}

/// GP0(E2) texture window, in units of 8 texels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct TextureWindow {
    pub mask_x: u8,
    pub mask_y: u8,
    pub offset_x: u8,
    pub offset_y: u8,
}

impl TextureWindow {
    pub const fn from_word(word: u32) -> Self {
        Self {
            mask_x: (word & 0x1F) as u8,
            mask_y: ((word >> 5) & 0x1F) as u8,
            offset_x: ((word >> 10) & 0x1F) as u8,
            offset_y: ((word >> 15) & 0x1F) as u8,
        }
    }

    /// `(and, or)` masks per axis: `coord = (coord & and) | or`.
    pub const fn masks(self) -> ([u32; 2], [u32; 2]) {
        let mx = self.mask_x as u32 * 8;
        let my = self.mask_y as u32 * 8;
        (
            [!mx & 0xFF, !my & 0xFF],
            [(self.offset_x as u32 * 8) & mx, (self.offset_y as u32 * 8) & my],
        )
    }
}

/// GP0(E3/E4) drawing area. Edges are inclusive, as on the hardware.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DrawingArea {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Default for DrawingArea {
    fn default() -> Self {
        Self { left: 0, top: 0, right: VRAM_WIDTH - 1, bottom: VRAM_HEIGHT - 1 }
    }
}

impl DrawingArea {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left: left.min(VRAM_WIDTH - 1),
            top: top.min(VRAM_HEIGHT - 1),
            right: right.min(VRAM_WIDTH - 1),
            bottom: bottom.min(VRAM_HEIGHT - 1),
        }
    }

    /// Decodes the E3 (top-left) and E4 (bottom-right) words.
    pub fn from_words(top_left: u32, bottom_right: u32) -> Self {
        Self::new(
            top_left & 0x3FF,
            (top_left >> 10) & 0x1FF,
            bottom_right & 0x3FF,
            (bottom_right >> 10) & 0x1FF,
        )
    }

    /// Scissor rectangle in scaled render-target pixels. Never empty.
    pub fn scissor(self, scale: u32) -> VramRect {
        let left = self.left * scale;
        let top = self.top * scale;
        let right = ((self.right + 1) * scale).max(left + 1);
        let bottom = ((self.bottom + 1) * scale).max(top + 1);
        VramRect::new(left, top, right, bottom).clamped(VRAM_WIDTH * scale, VRAM_HEIGHT * scale)
    }

    /// Clips a primitive's inclusive bounding box to the area, as a half-open rect.
    pub fn clip(self, min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> VramRect {
        let clamp_x = |v: i32| v.clamp(self.left as i32, self.right as i32) as u32;
        let clamp_y = |v: i32| v.clamp(self.top as i32, self.bottom as i32) as u32;
        VramRect::new(clamp_x(min_x), clamp_y(min_y), clamp_x(max_x) + 1, clamp_y(max_y) + 1)
    }
}

/// GP0(E5) drawing offset, signed 11-bit per axis.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct DrawingOffset {
    pub x: i32,
    pub y: i32,
}

impl DrawingOffset {
    pub const fn from_word(word: u32) -> Self {
        Self {
            x: sign_extend_11(word & 0x7FF),
            y: sign_extend_11((word >> 11) & 0x7FF),
        }
    }
}

/// GP0(E6) mask settings.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct MaskSettings {
    pub set_mask_while_drawing: bool,
    pub check_mask_before_draw: bool,
}

impl MaskSettings {
    pub const fn from_word(word: u32) -> Self {
        Self {
            set_mask_while_drawing: word & 1 != 0,
            check_mask_before_draw: word & 2 != 0,
        }
    }

    #[inline]
    pub const fn mask_and(self) -> u16 {
        if self.check_mask_before_draw { 0x8000 } else { 0 }
    }

    #[inline]
    pub const fn mask_or(self) -> u16 {
        if self.set_mask_while_drawing { 0x8000 } else { 0 }
    }

    #[inline]
    pub const fn is_enabled(self) -> bool {
        self.set_mask_while_drawing || self.check_mask_before_draw
    }
}

/// How the display scans out interlaced video.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum InterlacedRenderMode {
    #[default]
    None,
    /// 480i: both fields live in one frame buffer; drawing skips the displayed field.
    InterleavedFields,
    /// 240i: each field is a full frame.
    SeparateFields,
}

impl InterlacedRenderMode {
    #[inline]
    pub const fn skips_displayed_field(self) -> bool {
        matches!(self, Self::InterleavedFields)
    }
}

/// All draw-mode state a primitive is rendered under.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DrawMode {
    pub texture_page: TexturePage,
    pub palette: Palette,
    pub texture_window: TextureWindow,
    pub drawing_area: DrawingArea,
    pub drawing_offset: DrawingOffset,
    pub mask: MaskSettings,
    pub interlace: InterlacedRenderMode,
    /// LSB of the line currently being displayed.
    pub displayed_field: u32,
}

impl DrawMode {
    /// Field to skip while drawing, if interlaced rendering is active.
    #[inline]
    pub fn skipped_field(&self) -> Option<u32> {
        self.interlace.skips_displayed_field().then_some(self.displayed_field & 1)
    }

    /// Packed texpage (low half) and palette (high half) as stored per vertex.
    #[inline]
    pub fn packed_texpage(&self) -> u32 {
        self.texture_page.0 as u32 | ((self.palette.0 as u32) << 16)
    }

    /// VRAM areas a textured draw samples from: the page, then the palette.
    pub fn texture_source_rects(&self) -> impl Iterator<Item = VramRect> {
        let mode = self.texture_page.color_mode();
        self.texture_page.rects().chain(self.palette.rects(mode))
    }

    /// Whether `rect` overlaps anything a textured draw samples from.
    pub fn texture_source_intersects(&self, rect: VramRect) -> bool {
        self.texture_source_rects().any(|source| source.intersects(rect))
    }
}

/// Sign-extends an 11-bit value.
#[inline]
pub const fn sign_extend_11(value: u32) -> i32 {
    ((value << 21) as i32) >> 21
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texpage_fields() {
        // x base 3, y base 1, subtractive, 8-bit, dither
        let tp = TexturePage(3 | (1 << 4) | (2 << 5) | (1 << 7) | (1 << 9));
        assert_eq!(tp.base_x(), 192);
        assert_eq!(tp.base_y(), 256);
        assert_eq!(tp.transparency_mode(), TransparencyMode::Subtractive);
        assert_eq!(tp.color_mode(), TextureColorMode::Palette8Bit);
        assert!(tp.dither_enabled());
        assert_eq!(tp.rects().collect::<Vec<_>>(), vec![VramRect::from_extents(192, 256, 128, 256)]);
    }

    #[test]
    fn source_rects_wrap_past_right_edge() {
        // 16-bit page at x = 960 spans 960..1024 and 0..192.
        let tp = TexturePage(15 | (2 << 7));
        assert_eq!(
            tp.rects().collect::<Vec<_>>(),
            vec![VramRect::new(960, 0, 1024, 256), VramRect::new(0, 0, 192, 256)]
        );

        // 8-bit palette at x = 1008 spans 1008..1024 and 0..240 on its row.
        let p = Palette(63 | (10 << 6));
        assert_eq!(
            p.rects(TextureColorMode::Palette8Bit).collect::<Vec<_>>(),
            vec![VramRect::new(1008, 10, 1024, 11), VramRect::new(0, 10, 240, 11)]
        );
        assert_eq!(p.rects(TextureColorMode::Direct16Bit).count(), 0);

        let mode = DrawMode { texture_page: tp, ..Default::default() };
        assert!(mode.texture_source_intersects(VramRect::from_extents(10, 10, 8, 8)));
        assert!(!mode.texture_source_intersects(VramRect::from_extents(500, 10, 8, 8)));
    }

    #[test]
    fn palette_location() {
        let p = Palette(5 | (300 << 6));
        assert_eq!((p.x(), p.y()), (80, 300));
        assert_eq!(
            p.rects(TextureColorMode::Palette4Bit).collect::<Vec<_>>(),
            vec![VramRect::from_extents(80, 300, 16, 1)]
        );
    }

    #[test]
    fn texture_window_masks() {
        let w = TextureWindow { mask_x: 0x1F, mask_y: 0, offset_x: 0x02, offset_y: 0 };
        let (and, or) = w.masks();
        assert_eq!(and, [0x07, 0xFF]);
        assert_eq!(or, [0x10, 0]);
    }

    #[test]
    fn drawing_offset_sign_extends() {
        let o = DrawingOffset::from_word(0x7FF | (0x400 << 11));
        assert_eq!((o.x, o.y), (-1, -1024));
    }

    #[test]
    fn scissor_scales_inclusive_area() {
        let area = DrawingArea::new(10, 20, 29, 39);
        assert_eq!(area.scissor(1), VramRect::new(10, 20, 30, 40));
        assert_eq!(area.scissor(2), VramRect::new(20, 40, 60, 80));
    }

    #[test]
    fn clip_to_drawing_area() {
        let area = DrawingArea::new(0, 0, 99, 99);
        assert_eq!(area.clip(-5, 10, 200, 20), VramRect::new(0, 10, 100, 21));
    }

    #[test]
    fn mask_bits() {
        let m = MaskSettings::from_word(3);
        assert_eq!(m.mask_and(), 0x8000);
        assert_eq!(m.mask_or(), 0x8000);
        assert!(!MaskSettings::default().is_enabled());
    }
}
