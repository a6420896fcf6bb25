//! Render commands.
//!
//! Commands arrive either pre-decoded (as [`RenderCommand`]) or as raw GP0 words,
//! which [`decode`] turns into the same typed form.

mod decode;
mod draw_mode;

pub use decode::{DecodeError, decode, decode_stream};
pub use draw_mode::{
    DrawMode, DrawingArea, DrawingOffset, InterlacedRenderMode, MaskSettings, Palette,
    TextureColorMode, TextureMode, TexturePage, TextureWindow, TransparencyMode, sign_extend_11,
};

/// Attribute bits shared by polygons, rectangles and lines.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct DrawFlags {
    /// Gouraud shading; per-vertex colors.
    pub shaded: bool,
    pub textured: bool,
    pub semi_transparent: bool,
    /// Texels are used without modulation by the vertex color.
    pub raw_texture: bool,
}

impl DrawFlags {
    /// Decodes the attribute bits of a GP0 polygon/line/rectangle opcode.
    pub const fn from_opcode(opcode: u8) -> Self {
        Self {
            shaded: opcode & 0x10 != 0,
            textured: opcode & 0x04 != 0,
            semi_transparent: opcode & 0x02 != 0,
            raw_texture: opcode & 0x01 != 0,
        }
    }
}

/// One polygon corner. Coordinates are relative to the drawing offset.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PolygonVertex {
    pub x: i32,
    pub y: i32,
    /// `0x00BBGGRR`
    pub color: u32,
    pub u: u8,
    pub v: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolygonCommand {
    pub flags: DrawFlags,
    /// Three vertices for a triangle, four for a quad.
    pub vertices: Vec<PolygonVertex>,
    /// CLUT attribute of a textured polygon.
    pub palette: Option<Palette>,
    /// Texpage attribute of a textured polygon.
    pub texpage: Option<u16>,
}

impl PolygonCommand {
    #[inline]
    pub fn is_quad(&self) -> bool {
        self.vertices.len() == 4
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RectangleCommand {
    pub flags: DrawFlags,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub color: u32,
    pub u: u8,
    pub v: u8,
    pub palette: Option<Palette>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LineVertex {
    pub x: i32,
    pub y: i32,
    pub color: u32,
}

/// A single segment or a poly-line. Lines are never textured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCommand {
    pub flags: DrawFlags,
    pub vertices: Vec<LineVertex>,
}

/// Kind of primitive, independent of its attributes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Primitive {
    Polygon,
    Line,
    Rectangle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCommand {
    Polygon(PolygonCommand),
    Rectangle(RectangleCommand),
    Line(LineCommand),
    /// An opcode outside the render-command ranges. Skipped by the engine.
    Unsupported { opcode: u8 },
}

impl RenderCommand {
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Self::Polygon(_) => Some(Primitive::Polygon),
            Self::Rectangle(_) => Some(Primitive::Rectangle),
            Self::Line(_) => Some(Primitive::Line),
            Self::Unsupported { .. } => None,
        }
    }

    pub fn flags(&self) -> DrawFlags {
        match self {
            Self::Polygon(p) => p.flags,
            Self::Rectangle(r) => r.flags,
            Self::Line(l) => l.flags,
            Self::Unsupported { .. } => DrawFlags::default(),
        }
    }

    /// Whether this command may be dithered. Rectangles never are; other
    /// primitives are when shaded or when their texels are modulated.
    pub fn dithering_enabled(&self) -> bool {
        let flags = self.flags();
        match self {
            Self::Polygon(_) | Self::Line(_) => {
                flags.shaded || (flags.textured && !flags.raw_texture)
            }
            Self::Rectangle(_) | Self::Unsupported { .. } => false,
        }
    }

    /// Number of vertices the builder may emit for this command.
    pub fn required_vertices(&self) -> usize {
        match self {
            Self::Polygon(p) => {
                if p.is_quad() { 6 } else { 3 }
            }
            Self::Rectangle(_) => crate::batch::MAX_VERTICES_FOR_RECTANGLE,
            Self::Line(l) => l.vertices.len().saturating_sub(1) * 2,
            Self::Unsupported { .. } => 0,
        }
    }
}
