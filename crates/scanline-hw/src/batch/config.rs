use crate::command::{TextureMode, TransparencyMode};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BatchPrimitive {
    Lines,
    #[default]
    Triangles,
}

/// Which pixels a draw touches, and how they blend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BatchRenderMode {
    TransparencyDisabled,
    TransparentAndOpaque,
    OnlyOpaque,
    OnlyTransparent,
}

/// Fixed-function state shared by every vertex of a batch.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct BatchConfig {
    pub primitive: BatchPrimitive,
    pub texture_mode: TextureMode,
    pub transparency_mode: TransparencyMode,
    pub dithering: bool,
    pub interlacing: bool,
    pub set_mask_while_drawing: bool,
    pub check_mask_before_draw: bool,
}

impl BatchConfig {
    /// Subtractive blending of a textured batch is split into a transparent and an
    /// opaque pass: transparency is decided per texel, and opaque texels must not
    /// be blended at all.
    #[inline]
    pub fn needs_two_pass(&self) -> bool {
        self.transparency_mode == TransparencyMode::Subtractive && self.texture_mode.is_enabled()
    }

    #[inline]
    pub fn render_mode(&self) -> BatchRenderMode {
        if self.transparency_mode == TransparencyMode::Disabled {
            BatchRenderMode::TransparencyDisabled
        } else {
            BatchRenderMode::TransparentAndOpaque
        }
    }

    /// The draws a flush issues, in submission order.
    pub fn passes(&self) -> &'static [BatchRenderMode] {
        if self.needs_two_pass() {
            &[BatchRenderMode::OnlyTransparent, BatchRenderMode::OnlyOpaque]
        } else {
            match self.render_mode() {
                BatchRenderMode::TransparencyDisabled => &[BatchRenderMode::TransparencyDisabled],
                _ => &[BatchRenderMode::TransparentAndOpaque],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::TextureColorMode;

    const TRANSPARENCY: [TransparencyMode; 5] = [
        TransparencyMode::Average,
        TransparencyMode::Additive,
        TransparencyMode::Subtractive,
        TransparencyMode::QuarterAdditive,
        TransparencyMode::Disabled,
    ];

    fn texture_modes() -> Vec<TextureMode> {
        let mut out = vec![TextureMode::Disabled];
        for color in [
            TextureColorMode::Palette4Bit,
            TextureColorMode::Palette8Bit,
            TextureColorMode::Direct16Bit,
        ] {
            for raw in [false, true] {
                out.push(TextureMode::Enabled { color, raw });
            }
        }
        out
    }

    #[test]
    fn two_pass_only_for_textured_subtractive() {
        for transparency_mode in TRANSPARENCY {
            for texture_mode in texture_modes() {
                let cfg = BatchConfig { transparency_mode, texture_mode, ..Default::default() };
                let expected = transparency_mode == TransparencyMode::Subtractive
                    && texture_mode != TextureMode::Disabled;
                assert_eq!(cfg.needs_two_pass(), expected, "{transparency_mode:?} {texture_mode:?}");
                assert_eq!(cfg.passes().len(), if expected { 2 } else { 1 });
            }
        }
    }

    #[test]
    fn render_mode_follows_transparency() {
        for transparency_mode in TRANSPARENCY {
            let cfg = BatchConfig { transparency_mode, ..Default::default() };
            let expected = if transparency_mode == TransparencyMode::Disabled {
                BatchRenderMode::TransparencyDisabled
            } else {
                BatchRenderMode::TransparentAndOpaque
            };
            assert_eq!(cfg.render_mode(), expected);
        }
    }

    #[test]
    fn two_pass_order_is_transparent_first() {
        let cfg = BatchConfig {
            transparency_mode: TransparencyMode::Subtractive,
            texture_mode: TextureMode::Enabled { color: TextureColorMode::Direct16Bit, raw: false },
            ..Default::default()
        };
        assert_eq!(cfg.passes(), &[BatchRenderMode::OnlyTransparent, BatchRenderMode::OnlyOpaque]);
    }
}
