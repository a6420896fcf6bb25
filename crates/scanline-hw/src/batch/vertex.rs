use bytemuck::{Pod, Zeroable};

/// One vertex as stored in the batch vertex buffer.
///
/// Layout (36 bytes):
///
///  offset  0  x, y, z    [i32; 3]   loc 0  (z = depth ordinal)
///  offset 12  px, py, pz [f32; 3]   loc 1
///  offset 24  color      u32        loc 2  (0x00BBGGRR)
///  offset 28  texpage    u32        loc 3  (texpage | palette << 16)
///  offset 32  u, v       [u16; 2]   loc 4
///
/// Texture coordinates are 16-bit because rectangle tiles can end at 256.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct BatchVertex {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub px: f32,
    pub py: f32,
    pub pz: f32,
    pub color: u32,
    pub texpage: u32,
    pub u: u16,
    pub v: u16,
}

impl BatchVertex {
    #[inline]
    pub fn new(x: i32, y: i32, z: i32, color: u32, texpage: u32, u: u16, v: u16) -> Self {
        Self {
            x,
            y,
            z,
            px: x as f32,
            py: y as f32,
            pz: 1.0,
            color,
            texpage,
            u,
            v,
        }
    }

    /// Like [`new`](Self::new) with `u` in the low byte and `v` in the high byte.
    #[inline]
    pub fn with_packed_texcoord(
        x: i32,
        y: i32,
        z: i32,
        color: u32,
        texpage: u32,
        texcoord: u16,
    ) -> Self {
        Self::new(x, y, z, color, texpage, texcoord & 0xFF, texcoord >> 8)
    }

    const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Sint32x3,
        1 => Float32x3,
        2 => Uint32,
        3 => Uint32,
        4 => Uint16x2,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<BatchVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_36_bytes() {
        assert_eq!(std::mem::size_of::<BatchVertex>(), 36);
        assert_eq!(BatchVertex::layout().array_stride, 36);
    }

    #[test]
    fn packed_texcoord_splits_bytes() {
        let v = BatchVertex::with_packed_texcoord(1, 2, 3, 0, 0, 0x3412);
        assert_eq!((v.u, v.v), (0x12, 0x34));
        assert_eq!((v.px, v.py), (1.0, 2.0));
    }
}
