use crate::backend::BackendKind;

pub const MIN_RESOLUTION_SCALE: u32 = 1;
pub const MAX_RESOLUTION_SCALE: u32 = 16;

/// User-facing renderer options.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RendererSettings {
    /// Integer upscale factor of the internal VRAM image.
    pub resolution_scale: u32,
    /// Keep 8 bits per channel in draws and fills instead of quantizing to 5 bits.
    pub true_color: bool,
    /// Apply the dither pattern per scaled pixel instead of per native pixel.
    pub scaled_dithering: bool,
    /// Bilinear texture sampling.
    pub texture_filtering: bool,
    /// Only read when the backend is created.
    pub backend: BackendKind,
    /// Request validation layers / labels from the graphics API.
    pub debug_device: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            resolution_scale: 1,
            true_color: false,
            scaled_dithering: false,
            texture_filtering: false,
            backend: BackendKind::Wgpu,
            debug_device: false,
        }
    }
}

impl RendererSettings {
    /// Clamps the resolution scale to `1..=16` and to what the backend can allocate.
    pub fn sanitized(mut self, backend_max_scale: u32) -> Self {
        let max = MAX_RESOLUTION_SCALE.min(backend_max_scale.max(MIN_RESOLUTION_SCALE));
        self.resolution_scale = self.resolution_scale.clamp(MIN_RESOLUTION_SCALE, max);
        self
    }

    /// Whether a change from `self` to `other` invalidates resolution-dependent resources.
    pub fn needs_resource_rebuild(&self, other: &Self) -> bool {
        self.resolution_scale != other.resolution_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_clamped() {
        let s = RendererSettings { resolution_scale: 0, ..Default::default() };
        assert_eq!(s.sanitized(16).resolution_scale, 1);

        let s = RendererSettings { resolution_scale: 40, ..Default::default() };
        assert_eq!(s.sanitized(64).resolution_scale, 16);
        assert_eq!(s.sanitized(4).resolution_scale, 4);
        assert_eq!(s.sanitized(0).resolution_scale, 1);
    }

    #[test]
    fn only_scale_changes_rebuild() {
        let a = RendererSettings::default();
        let b = RendererSettings { true_color: true, ..a };
        let c = RendererSettings { resolution_scale: 2, ..a };
        assert!(!a.needs_resource_rebuild(&b));
        assert!(a.needs_resource_rebuild(&c));
    }
}
