//! Hardware rasterizer and VRAM-coherency engine for a fixed-function 2D console GPU.
//!
//! [`HwRenderer`] takes primitive commands and VRAM block transfers in program order,
//! batches draws for a [`RenderBackend`], and keeps a CPU-visible shadow of VRAM
//! coherent with what the GPU has rendered.

pub mod backend;
pub mod batch;
pub mod command;
pub mod coords;
pub mod error;
pub mod logging;
pub mod renderer;
pub mod settings;
pub mod stats;
pub mod uniforms;
pub mod vram;

pub use backend::{
    BackendKind, DisplayArea, NullBackend, RenderBackend, SurfaceDesc, WgpuBackend, WgpuInit,
    create_backend, create_backend_or_null,
};
pub use command::{DrawMode, InterlacedRenderMode, RenderCommand};
pub use coords::VramRect;
pub use error::{BackendError, RendererError};
pub use renderer::HwRenderer;
pub use settings::RendererSettings;
pub use stats::RendererStats;
