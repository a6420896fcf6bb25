use anyhow::{Context, Result};
use log::info;

use crate::vram::VRAM_WIDTH;

/// Initialization parameters for the wgpu backend.
#[derive(Debug, Clone)]
pub struct WgpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// VRAM already holds display-encoded colors, so the default is a linear format.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior).
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface.
    pub desired_maximum_frame_latency: u32,

    pub power_preference: wgpu::PowerPreference,

    /// Enables API validation and debug labels.
    pub debug: bool,
}

impl Default for WgpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            power_preference: wgpu::PowerPreference::HighPerformance,
            debug: false,
        }
    }
}

/// Features the batch pipelines cannot work without. Semi-transparency needs a
/// per-pixel destination factor, which only dual-source blending provides.
pub(super) const REQUIRED_FEATURES: wgpu::Features = wgpu::Features::DUAL_SOURCE_BLENDING;

/// Instance, adapter, device and queue, plus the surface if one was requested.
pub(super) struct GpuDevice {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: Option<wgpu::Surface<'static>>,
}

impl GpuDevice {
    /// Opens a device compatible with `target` (or any device when headless).
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn open(target: Option<wgpu::SurfaceTarget<'static>>, init: &WgpuInit) -> Result<Self> {
        let flags = if init.debug {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::from_build_config()
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags,
            ..Default::default()
        });

        let surface = target
            .map(|t| instance.create_surface(t))
            .transpose()
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let missing = REQUIRED_FEATURES - adapter.features();
        anyhow::ensure!(
            missing.is_empty(),
            "adapter '{}' lacks required features {missing:?}",
            adapter.get_info().name
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("scanline device"),
                required_features: REQUIRED_FEATURES,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let adapter_info = adapter.get_info();
        info!(
            "wgpu device: {} ({:?}, {:?})",
            adapter_info.name, adapter_info.backend, adapter_info.device_type
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface,
        })
    }

    pub fn adapter_name(&self) -> String {
        let info = self.adapter.get_info();
        format!("wgpu {} ({:?})", info.name, info.backend)
    }

    /// Largest integer scale at which a scaled VRAM texture still fits the limits.
    pub fn max_resolution_scale(&self) -> u32 {
        (self.device.limits().max_texture_dimension_2d / VRAM_WIDTH).max(1)
    }

    pub fn uniform_alignment(&self) -> u64 {
        self.device.limits().min_uniform_buffer_offset_alignment as u64
    }
}
