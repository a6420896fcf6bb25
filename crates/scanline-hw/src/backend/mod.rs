//! Graphics backends.
//!
//! The engine talks to the GPU only through [`RenderBackend`]. Two variants exist:
//! - [`WgpuBackend`]: renders into an upscaled VRAM texture with wgpu
//! - [`NullBackend`]: no GPU; keeps a CPU image for block transfers and drops draws
//!
//! The variant is chosen once, at creation, from [`BackendKind`].

mod gpu;
mod null;

pub use gpu::{WgpuBackend, WgpuInit};
pub use null::NullBackend;

use std::fmt;
use std::sync::Arc;

use log::warn;

use crate::batch::{BatchConfig, BatchRenderMode, BatchVertex};
use crate::command::{InterlacedRenderMode, MaskSettings};
use crate::coords::VramRect;
use crate::error::BackendError;
use crate::settings::RendererSettings;
use crate::uniforms::{VramCopyUniforms, VramFillUniforms, VramWriteUniforms};
use crate::vram::VramShadow;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Null,
    #[default]
    Wgpu,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::Wgpu => "wgpu",
        })
    }
}

/// Where presented frames go.
///
/// `target: None` creates an offscreen backend: VRAM is still rendered and can be
/// read back, but `present` has nothing to show.
pub struct SurfaceDesc {
    pub target: Option<wgpu::SurfaceTarget<'static>>,
    pub width: u32,
    pub height: u32,
}

impl SurfaceDesc {
    pub fn headless() -> Self {
        Self { target: None, width: 0, height: 0 }
    }
}

impl fmt::Debug for SurfaceDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceDesc")
            .field("has_target", &self.target.is_some())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl From<Arc<winit::window::Window>> for SurfaceDesc {
    fn from(window: Arc<winit::window::Window>) -> Self {
        let size = window.inner_size();
        Self {
            target: Some(window.into()),
            width: size.width,
            height: size.height,
        }
    }
}

/// VRAM region shown by [`RenderBackend::present`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DisplayArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Pixels are packed 24-bit RGB rather than 15-bit.
    pub color_24bit: bool,
    pub interlace: InterlacedRenderMode,
    /// Field shown this frame when interlaced.
    pub field: u32,
}

// ── transfer passes ───────────────────────────────────────────────────────

/// Rectangle fill. Coordinates are native and may wrap.
#[derive(Debug, Copy, Clone)]
pub struct FillPass {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Color as stored in VRAM.
    pub color: u16,
    /// Rows whose LSB matches are left untouched.
    pub skip_field: Option<u32>,
    pub uniforms: VramFillUniforms,
}

/// CPU-to-VRAM upload. `data` holds `width * height` pixels, row-major.
#[derive(Debug, Copy, Clone)]
pub struct WritePass<'a> {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub data: &'a [u16],
    pub mask: MaskSettings,
    pub uniforms: VramWriteUniforms,
}

/// VRAM-to-VRAM copy.
#[derive(Debug, Copy, Clone)]
pub struct CopyPass {
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub width: u32,
    pub height: u32,
    pub mask: MaskSettings,
    /// Route through the texel-by-texel shader instead of a texture copy. Required
    /// for masking, edge wrap-around and overlapping regions.
    pub use_shader: bool,
    pub uniforms: VramCopyUniforms,
}

// ── trait ─────────────────────────────────────────────────────────────────

/// Capabilities the engine needs from a graphics API.
///
/// Calls arrive in program order from a single thread. The engine guarantees that
/// pending vertices are drawn before any transfer pass, readback or resize.
pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    /// Human-readable adapter / backend name for logs.
    fn name(&self) -> String;

    /// Largest resolution scale the backend can allocate textures for.
    fn max_resolution_scale(&self) -> u32;

    /// Returns writable storage for at least `count` vertices.
    fn map_vertices(&mut self, count: u32) -> &mut [BatchVertex];

    /// Commits the first `used` vertices written since `map_vertices`, returning
    /// the base vertex index to draw them from.
    fn unmap_vertices(&mut self, used: u32) -> u32;

    /// Replaces the batch uniform block used by subsequent draws.
    fn upload_uniforms(&mut self, bytes: &[u8]);

    fn draw_batch(
        &mut self,
        config: &BatchConfig,
        render_mode: BatchRenderMode,
        base_vertex: u32,
        vertex_count: u32,
    );

    /// Scissor for subsequent draws, in scaled pixels.
    fn set_scissor(&mut self, rect: VramRect);

    fn fill_vram(&mut self, pass: &FillPass);

    fn write_vram(&mut self, pass: &WritePass<'_>);

    fn copy_vram(&mut self, pass: &CopyPass);

    /// Downloads `rect` (native, non-wrapping) of the hardware image into `shadow`.
    fn read_vram(&mut self, rect: VramRect, shadow: &mut VramShadow) -> Result<(), BackendError>;

    /// Refreshes the texture that draws sample from with the current VRAM contents
    /// of `rect`.
    fn update_vram_read_texture(&mut self, rect: VramRect);

    /// Rebuilds the depth buffer so that only pixels with the mask bit set are
    /// protected.
    fn update_depth_from_mask_bit(&mut self);

    /// Applies changed settings. Resolution-dependent resources are recreated
    /// (and cleared) when the scale changes.
    fn apply_settings(&mut self, settings: &RendererSettings);

    /// Resizes the presentation surface.
    fn resize(&mut self, width: u32, height: u32);

    /// Submits pending work and shows `display` (or a blank frame).
    fn present(&mut self, display: Option<&DisplayArea>) -> Result<(), BackendError>;
}

impl<B: RenderBackend + ?Sized> RenderBackend for Box<B> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn name(&self) -> String {
        (**self).name()
    }

    fn max_resolution_scale(&self) -> u32 {
        (**self).max_resolution_scale()
    }

    fn map_vertices(&mut self, count: u32) -> &mut [BatchVertex] {
        (**self).map_vertices(count)
    }

    fn unmap_vertices(&mut self, used: u32) -> u32 {
        (**self).unmap_vertices(used)
    }

    fn upload_uniforms(&mut self, bytes: &[u8]) {
        (**self).upload_uniforms(bytes)
    }

    fn draw_batch(
        &mut self,
        config: &BatchConfig,
        render_mode: BatchRenderMode,
        base_vertex: u32,
        vertex_count: u32,
    ) {
        (**self).draw_batch(config, render_mode, base_vertex, vertex_count)
    }

    fn set_scissor(&mut self, rect: VramRect) {
        (**self).set_scissor(rect)
    }

    fn fill_vram(&mut self, pass: &FillPass) {
        (**self).fill_vram(pass)
    }

    fn write_vram(&mut self, pass: &WritePass<'_>) {
        (**self).write_vram(pass)
    }

    fn copy_vram(&mut self, pass: &CopyPass) {
        (**self).copy_vram(pass)
    }

    fn read_vram(&mut self, rect: VramRect, shadow: &mut VramShadow) -> Result<(), BackendError> {
        (**self).read_vram(rect, shadow)
    }

    fn update_vram_read_texture(&mut self, rect: VramRect) {
        (**self).update_vram_read_texture(rect)
    }

    fn update_depth_from_mask_bit(&mut self) {
        (**self).update_depth_from_mask_bit()
    }

    fn apply_settings(&mut self, settings: &RendererSettings) {
        (**self).apply_settings(settings)
    }

    fn resize(&mut self, width: u32, height: u32) {
        (**self).resize(width, height)
    }

    fn present(&mut self, display: Option<&DisplayArea>) -> Result<(), BackendError> {
        (**self).present(display)
    }
}

// ── creation ──────────────────────────────────────────────────────────────

/// Creates the backend selected by `settings.backend`.
pub fn create_backend(
    surface: SurfaceDesc,
    settings: &RendererSettings,
) -> Result<Box<dyn RenderBackend>, BackendError> {
    match settings.backend {
        BackendKind::Null => Ok(Box::new(NullBackend::new())),
        BackendKind::Wgpu => {
            let init = WgpuInit {
                debug: settings.debug_device,
                ..WgpuInit::default()
            };
            let mut backend = pollster::block_on(WgpuBackend::new(surface, init)).map_err(
                |reason| BackendError::Creation {
                    kind: BackendKind::Wgpu,
                    reason,
                },
            )?;
            backend.apply_settings(settings);
            Ok(Box::new(backend))
        }
    }
}

/// Like [`create_backend`], but falls back to [`NullBackend`] when the requested
/// backend cannot be created.
pub fn create_backend_or_null(
    surface: SurfaceDesc,
    settings: &RendererSettings,
) -> Box<dyn RenderBackend> {
    create_backend(surface, settings).unwrap_or_else(|err| {
        warn!("{err}; falling back to the null backend");
        Box::new(NullBackend::new())
    })
}
