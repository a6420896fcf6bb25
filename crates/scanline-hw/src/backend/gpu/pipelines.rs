use std::collections::HashMap;

use log::debug;

use crate::batch::{BatchConfig, BatchPrimitive, BatchRenderMode, BatchVertex};
use crate::command::TransparencyMode;

/// Format of the scaled VRAM target, the read texture and the readback target.
pub(super) const VRAM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Bytes bound per uniform block; every block is padded to this size in the stream.
pub(super) const UNIFORM_BLOCK_SIZE: u64 = 64;

const BATCH_SHADER: &str = include_str!("shaders/batch.wgsl");
const FILL_SHADER: &str = concat!(include_str!("shaders/common.wgsl"), include_str!("shaders/fill.wgsl"));
const WRITE_SHADER: &str = concat!(include_str!("shaders/common.wgsl"), include_str!("shaders/write.wgsl"));
const COPY_SHADER: &str = concat!(include_str!("shaders/common.wgsl"), include_str!("shaders/copy.wgsl"));
const MASK_DEPTH_SHADER: &str =
    concat!(include_str!("shaders/common.wgsl"), include_str!("shaders/mask_depth.wgsl"));
const READBACK_SHADER: &str =
    concat!(include_str!("shaders/common.wgsl"), include_str!("shaders/readback.wgsl"));
const DISPLAY_SHADER: &str =
    concat!(include_str!("shaders/common.wgsl"), include_str!("shaders/display.wgsl"));

// ── state helpers ─────────────────────────────────────────────────────────

/// Semi-transparency: `src * 1 + dst * src1.a`, with the source already weighted in
/// the shader. Alpha carries the mask bit and is always replaced.
fn semi_transparent_blend(subtractive: bool) -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::Src1Alpha,
            operation: if subtractive {
                wgpu::BlendOperation::ReverseSubtract
            } else {
                wgpu::BlendOperation::Add
            },
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::Zero,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

/// Mask checking is a depth test: masked pixels hold depth 1.0, which no draw passes.
fn depth_state(check_mask: bool) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: true,
        depth_compare: if check_mask {
            wgpu::CompareFunction::Greater
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

fn primitive_state(topology: wgpu::PrimitiveTopology) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

fn shader(device: &wgpu::Device, label: &str, source: &'static str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

// ── batch pipeline key ────────────────────────────────────────────────────

/// The parts of a batch configuration that are baked into a pipeline. Everything
/// else is a uniform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) struct BatchPipelineKey {
    pub primitive: BatchPrimitive,
    pub render_mode: BatchRenderMode,
    pub subtractive: bool,
    pub check_mask: bool,
}

impl BatchPipelineKey {
    pub fn new(config: &BatchConfig, render_mode: BatchRenderMode) -> Self {
        let blends = matches!(
            render_mode,
            BatchRenderMode::TransparentAndOpaque | BatchRenderMode::OnlyTransparent
        );
        Self {
            primitive: config.primitive,
            render_mode,
            subtractive: blends && config.transparency_mode == TransparencyMode::Subtractive,
            check_mask: config.check_mask_before_draw,
        }
    }

    fn entry_point(self) -> &'static str {
        match self.render_mode {
            BatchRenderMode::TransparencyDisabled => "fs_replace",
            BatchRenderMode::TransparentAndOpaque => "fs_blend",
            BatchRenderMode::OnlyTransparent => "fs_transparent_only",
            BatchRenderMode::OnlyOpaque => "fs_opaque_only",
        }
    }

    fn blend(self) -> Option<wgpu::BlendState> {
        match self.render_mode {
            BatchRenderMode::TransparentAndOpaque | BatchRenderMode::OnlyTransparent => {
                Some(semi_transparent_blend(self.subtractive))
            }
            BatchRenderMode::TransparencyDisabled | BatchRenderMode::OnlyOpaque => None,
        }
    }

    fn topology(self) -> wgpu::PrimitiveTopology {
        match self.primitive {
            BatchPrimitive::Lines => wgpu::PrimitiveTopology::LineList,
            BatchPrimitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

// ── pipeline set ──────────────────────────────────────────────────────────

/// Every pipeline the backend draws with. All of them share one bind group layout:
///
/// - binding 0: uniform block (dynamic offset)
/// - binding 1: source texture (VRAM read copy, or VRAM itself for readback/display)
/// - binding 2: storage buffer with uploaded pixels
///
/// Batch pipelines are built on first use; the rest up front. The display pipeline
/// depends on the surface format and is rebuilt if that changes.
pub(super) struct Pipelines {
    pub bind_group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    batch_shader: wgpu::ShaderModule,
    batch: HashMap<BatchPipelineKey, wgpu::RenderPipeline>,

    pub fill: wgpu::RenderPipeline,
    /// Indexed by `check_mask_before_draw`.
    pub write: [wgpu::RenderPipeline; 2],
    /// Indexed by `check_mask_before_draw`.
    pub copy: [wgpu::RenderPipeline; 2],
    pub mask_depth: wgpu::RenderPipeline,
    pub readback: wgpu::RenderPipeline,
    display: Option<(wgpu::TextureFormat, wgpu::RenderPipeline)>,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scanline bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scanline pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let batch_shader = shader(device, "scanline batch shader", BATCH_SHADER);

        let fill_shader = shader(device, "scanline fill shader", FILL_SHADER);
        let write_shader = shader(device, "scanline write shader", WRITE_SHADER);
        let copy_shader = shader(device, "scanline copy shader", COPY_SHADER);
        let mask_depth_shader = shader(device, "scanline mask depth shader", MASK_DEPTH_SHADER);
        let readback_shader = shader(device, "scanline readback shader", READBACK_SHADER);

        let vram_target = [Some(wgpu::ColorTargetState {
            format: VRAM_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let fill = fullscreen_pipeline(
            device,
            &layout,
            "scanline fill pipeline",
            &fill_shader,
            "fs_fill",
            &vram_target,
            Some(depth_state(false)),
        );
        let write = [false, true].map(|check_mask| {
            fullscreen_pipeline(
                device,
                &layout,
                "scanline write pipeline",
                &write_shader,
                "fs_write",
                &vram_target,
                Some(depth_state(check_mask)),
            )
        });
        let copy = [false, true].map(|check_mask| {
            fullscreen_pipeline(
                device,
                &layout,
                "scanline copy pipeline",
                &copy_shader,
                "fs_copy",
                &vram_target,
                Some(depth_state(check_mask)),
            )
        });
        let mask_depth = fullscreen_pipeline(
            device,
            &layout,
            "scanline mask depth pipeline",
            &mask_depth_shader,
            "fs_mask_depth",
            &[],
            Some(depth_state(false)),
        );
        let readback = fullscreen_pipeline(
            device,
            &layout,
            "scanline readback pipeline",
            &readback_shader,
            "fs_readback",
            &vram_target,
            None,
        );

        Self {
            bind_group_layout,
            layout,
            batch_shader,
            batch: HashMap::new(),
            fill,
            write,
            copy,
            mask_depth,
            readback,
            display: None,
        }
    }

    /// Pipeline for one draw of a batch, built on first use.
    pub fn batch(&mut self, device: &wgpu::Device, key: BatchPipelineKey) -> &wgpu::RenderPipeline {
        let layout = &self.layout;
        let module = &self.batch_shader;
        self.batch.entry(key).or_insert_with(|| {
            debug!("building batch pipeline {key:?}");
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("scanline batch pipeline"),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[BatchVertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(key.entry_point()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: VRAM_FORMAT,
                        blend: key.blend(),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: primitive_state(key.topology()),
                depth_stencil: Some(depth_state(key.check_mask)),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        })
    }

    /// Pipeline presenting VRAM into a surface of `format`.
    pub fn display(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) -> wgpu::RenderPipeline {
        let cached = self
            .display
            .as_ref()
            .filter(|(f, _)| *f == format)
            .map(|(_, pipeline)| pipeline.clone());
        if let Some(pipeline) = cached {
            return pipeline;
        }

        debug!("building display pipeline for {format:?}");
        let module = shader(device, "scanline display shader", DISPLAY_SHADER);
        let pipeline = fullscreen_pipeline(
            device,
            &self.layout,
            "scanline display pipeline",
            &module,
            "fs_display",
            &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            None,
        );
        self.display = Some((format, pipeline.clone()));
        pipeline
    }
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    label: &str,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    targets: &[Option<wgpu::ColorTargetState>],
    depth_stencil: Option<wgpu::DepthStencilState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            compilation_options: Default::default(),
            targets,
        }),
        primitive: primitive_state(wgpu::PrimitiveTopology::TriangleList),
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{TextureColorMode, TextureMode};

    #[test]
    fn subtractive_only_affects_blending_modes() {
        let config = BatchConfig {
            transparency_mode: TransparencyMode::Subtractive,
            texture_mode: TextureMode::Enabled { color: TextureColorMode::Direct16Bit, raw: false },
            ..Default::default()
        };
        let transparent = BatchPipelineKey::new(&config, BatchRenderMode::OnlyTransparent);
        let opaque = BatchPipelineKey::new(&config, BatchRenderMode::OnlyOpaque);
        assert!(transparent.subtractive);
        assert!(!opaque.subtractive);
        assert!(opaque.blend().is_none());
        assert_eq!(
            transparent.blend().map(|b| b.color.operation),
            Some(wgpu::BlendOperation::ReverseSubtract)
        );
    }

    #[test]
    fn entry_points_and_topology() {
        let lines = BatchConfig { primitive: BatchPrimitive::Lines, ..Default::default() };
        let key = BatchPipelineKey::new(&lines, lines.render_mode());
        assert_eq!(key.entry_point(), "fs_replace");
        assert_eq!(key.topology(), wgpu::PrimitiveTopology::LineList);
        assert!(key.blend().is_none());

        let blended = BatchConfig { transparency_mode: TransparencyMode::Average, ..Default::default() };
        let key = BatchPipelineKey::new(&blended, blended.render_mode());
        assert_eq!(key.entry_point(), "fs_blend");
        assert_eq!(key.blend().map(|b| b.color.dst_factor), Some(wgpu::BlendFactor::Src1Alpha));
    }

    #[test]
    fn mask_check_selects_greater_compare() {
        assert_eq!(depth_state(true).depth_compare, wgpu::CompareFunction::Greater);
        assert_eq!(depth_state(false).depth_compare, wgpu::CompareFunction::Always);
        assert!(depth_state(false).depth_write_enabled);
    }
}
