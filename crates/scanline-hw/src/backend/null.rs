use crate::batch::{BatchConfig, BatchRenderMode, BatchVertex};
use crate::coords::VramRect;
use crate::error::BackendError;
use crate::settings::{MAX_RESOLUTION_SCALE, RendererSettings};
use crate::vram::VramShadow;

use super::{BackendKind, CopyPass, DisplayArea, FillPass, RenderBackend, WritePass};

/// Backend without a GPU.
///
/// Block transfers are applied to a CPU-resident image with the hardware's mask and
/// wrap rules, so reads of transferred regions stay exact. Draws are accepted and
/// discarded.
#[derive(Debug, Default)]
pub struct NullBackend {
    vram: VramShadow,
    vertices: Vec<BatchVertex>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The CPU image standing in for hardware VRAM.
    pub fn vram(&self) -> &VramShadow {
        &self.vram
    }
}

impl RenderBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn name(&self) -> String {
        "null".to_owned()
    }

    fn max_resolution_scale(&self) -> u32 {
        MAX_RESOLUTION_SCALE
    }

    fn map_vertices(&mut self, count: u32) -> &mut [BatchVertex] {
        self.vertices.clear();
        self.vertices.resize(count as usize, BatchVertex::default());
        &mut self.vertices
    }

    fn unmap_vertices(&mut self, _used: u32) -> u32 {
        0
    }

    fn upload_uniforms(&mut self, _bytes: &[u8]) {}

    fn draw_batch(&mut self, _: &BatchConfig, _: BatchRenderMode, _: u32, _: u32) {}

    fn set_scissor(&mut self, _rect: VramRect) {}

    fn fill_vram(&mut self, pass: &FillPass) {
        self.vram
            .fill_rect(pass.x, pass.y, pass.width, pass.height, pass.color, pass.skip_field);
    }

    fn write_vram(&mut self, pass: &WritePass<'_>) {
        self.vram
            .write_rect(pass.x, pass.y, pass.width, pass.height, pass.data, pass.mask);
    }

    fn copy_vram(&mut self, pass: &CopyPass) {
        self.vram.copy_rect(
            pass.src_x,
            pass.src_y,
            pass.dst_x,
            pass.dst_y,
            pass.width,
            pass.height,
            pass.mask,
        );
    }

    fn read_vram(&mut self, rect: VramRect, shadow: &mut VramShadow) -> Result<(), BackendError> {
        shadow.copy_region_from(self.vram.pixels(), rect);
        Ok(())
    }

    fn update_vram_read_texture(&mut self, _rect: VramRect) {}

    fn update_depth_from_mask_bit(&mut self) {}

    fn apply_settings(&mut self, _settings: &RendererSettings) {}

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn present(&mut self, _display: Option<&DisplayArea>) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MaskSettings;
    use crate::uniforms::{VramCopyUniforms, VramFillUniforms, VramWriteUniforms};

    #[test]
    fn transfers_land_in_cpu_image() {
        let mut b = NullBackend::new();
        b.fill_vram(&FillPass {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
            color: 0x1111,
            skip_field: None,
            uniforms: VramFillUniforms::default(),
        });
        b.write_vram(&WritePass {
            x: 2,
            y: 0,
            width: 2,
            height: 1,
            data: &[7, 8],
            mask: MaskSettings::default(),
            uniforms: VramWriteUniforms::default(),
        });
        b.copy_vram(&CopyPass {
            src_x: 0,
            src_y: 0,
            dst_x: 100,
            dst_y: 100,
            width: 4,
            height: 1,
            mask: MaskSettings::default(),
            use_shader: false,
            uniforms: VramCopyUniforms::default(),
        });

        let mut shadow = VramShadow::new();
        b.read_vram(VramRect::from_extents(100, 100, 4, 1), &mut shadow).unwrap();
        assert_eq!(shadow.read_rect(100, 100, 4, 1), vec![0x1111, 0x1111, 7, 8]);
        // Outside the requested region the shadow is untouched.
        assert_eq!(shadow.pixel(0, 0), 0);
    }

    #[test]
    fn mapped_storage_has_requested_length() {
        let mut b = NullBackend::new();
        assert_eq!(b.map_vertices(12).len(), 12);
        assert_eq!(b.unmap_vertices(12), 0);
    }
}
