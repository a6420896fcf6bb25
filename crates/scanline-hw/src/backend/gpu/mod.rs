//! wgpu implementation of [`RenderBackend`].
//!
//! VRAM lives in an `Rgba8Unorm` texture scaled by the resolution scale, with 5-bit
//! channels expanded and the mask bit in alpha. A depth buffer emulates mask
//! checking. Draws sample a separate read texture that is refreshed from VRAM on
//! request, so a draw never reads the target it writes.
//!
//! Per-draw data (vertices, uniform blocks, uploaded pixels) goes through stream
//! buffers. Batch draws are recorded and replayed in a single render pass when the
//! next transfer, readback or present needs the encoder.

mod device;
mod pipelines;
mod stream;
mod surface;

pub use device::WgpuInit;

use std::sync::mpsc;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use log::{debug, error, info, warn};

use crate::batch::{BatchConfig, BatchRenderMode, BatchVertex, UNIFORM_BUFFER_SIZE, VERTEX_BUFFER_SIZE};
use crate::coords::VramRect;
use crate::error::BackendError;
use crate::settings::{MAX_RESOLUTION_SCALE, MIN_RESOLUTION_SCALE, RendererSettings};
use crate::vram::{VRAM_HEIGHT, VRAM_WIDTH, VramShadow, rgba8888_to_rgba5551, wrapped_pieces};

use super::{BackendKind, CopyPass, DisplayArea, FillPass, RenderBackend, SurfaceDesc, WritePass};
use device::GpuDevice;
use pipelines::{BatchPipelineKey, DEPTH_FORMAT, Pipelines, UNIFORM_BLOCK_SIZE, VRAM_FORMAT};
use stream::StreamBuffer;
use surface::{PresentSurface, SurfaceErrorAction};

/// Pixel data of block writes. A full-VRAM upload is 1 MiB.
const DATA_STREAM_SIZE: u64 = 2 << 20;
const VERTEX_STRIDE: u64 = std::mem::size_of::<BatchVertex>() as u64;
const PIXEL_DATA_ALIGN: u64 = 4;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
struct DisplayUniforms {
    src: [u32; 2],
    size: [u32; 2],
    surface_size: [u32; 2],
    scale: u32,
    color_24bit: u32,
}

// ── resolution-dependent resources ────────────────────────────────────────

struct VramTargets {
    scale: u32,
    vram: wgpu::Texture,
    vram_view: wgpu::TextureView,
    read: wgpu::Texture,
    depth_view: wgpu::TextureView,
    /// Binds the read texture; used by draws and VRAM-to-VRAM passes.
    draw_bind_group: wgpu::BindGroup,
    /// Binds VRAM itself; used by passes that render elsewhere.
    vram_bind_group: wgpu::BindGroup,
}

impl VramTargets {
    fn new(
        device: &wgpu::Device,
        pipelines: &Pipelines,
        uniforms: &StreamBuffer,
        data: &StreamBuffer,
        scale: u32,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: VRAM_WIDTH * scale,
            height: VRAM_HEIGHT * scale,
            depth_or_array_layers: 1,
        };
        let texture = |label: &str, format: wgpu::TextureFormat, usage: wgpu::TextureUsages| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let vram = texture(
            "scanline vram",
            VRAM_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        );
        let read = texture(
            "scanline vram read",
            VRAM_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        );
        let depth = texture(
            "scanline vram depth",
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let vram_view = vram.create_view(&wgpu::TextureViewDescriptor::default());
        let read_view = read.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = |label: &str, view: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipelines.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: uniforms.buffer(),
                            offset: 0,
                            size: wgpu::BufferSize::new(UNIFORM_BLOCK_SIZE),
                        }),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: data.buffer().as_entire_binding(),
                    },
                ],
            })
        };
        let draw_bind_group = bind_group("scanline draw bind group", &read_view);
        let vram_bind_group = bind_group("scanline vram bind group", &vram_view);

        Self {
            scale,
            vram,
            vram_view,
            read,
            depth_view,
            draw_bind_group,
            vram_bind_group,
        }
    }

    fn extent(&self) -> (u32, u32) {
        (VRAM_WIDTH * self.scale, VRAM_HEIGHT * self.scale)
    }
}

/// A batch draw waiting for the next render pass.
struct PendingDraw {
    pipeline: wgpu::RenderPipeline,
    uniform_offset: u32,
    scissor: VramRect,
    base_vertex: u32,
    vertex_count: u32,
}

fn texel_copy(texture: &wgpu::Texture, x: u32, y: u32) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d { x, y, z: 0 },
        aspect: wgpu::TextureAspect::All,
    }
}

fn extent_of(rect: VramRect) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: rect.width(),
        height: rect.height(),
        depth_or_array_layers: 1,
    }
}

fn encoder_for<'a>(
    slot: &'a mut Option<wgpu::CommandEncoder>,
    device: &wgpu::Device,
) -> &'a mut wgpu::CommandEncoder {
    slot.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("scanline encoder"),
        })
    })
}

/// Pass that renders into VRAM (and its depth) keeping existing contents.
fn begin_vram_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    targets: &VramTargets,
    label: &str,
    with_color: bool,
) -> wgpu::RenderPass<'e> {
    let color = [Some(wgpu::RenderPassColorAttachment {
        view: &targets.vram_view,
        resolve_target: None,
        ops: wgpu::Operations {
            load: wgpu::LoadOp::Load,
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    })];
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: if with_color { &color[..] } else { &[] },
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: &targets.depth_view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

// ── backend ───────────────────────────────────────────────────────────────

pub struct WgpuBackend {
    gpu: GpuDevice,
    surface: Option<PresentSurface>,
    pipelines: Pipelines,
    targets: VramTargets,

    vertex_stream: StreamBuffer,
    uniform_stream: StreamBuffer,
    data_stream: StreamBuffer,
    uniform_alignment: u64,

    /// Native 1024x512 target the readback pass renders into.
    readback_texture: wgpu::Texture,
    readback_view: wgpu::TextureView,
    staging: wgpu::Buffer,

    encoder: Option<wgpu::CommandEncoder>,
    pending: Vec<PendingDraw>,
    mapped: Vec<BatchVertex>,

    /// Last uploaded batch block, kept so it can be re-pushed after a stream reset.
    batch_uniforms: Vec<u8>,
    batch_uniform_offset: u32,
    scissor: VramRect,
}

impl WgpuBackend {
    pub async fn new(desc: SurfaceDesc, init: WgpuInit) -> Result<Self> {
        let mut gpu = GpuDevice::open(desc.target, &init).await?;

        let surface = gpu.surface.take().and_then(|surface| {
            let surface =
                PresentSurface::new(surface, &gpu.adapter, &gpu.device, desc.width, desc.height, &init);
            if surface.is_none() {
                warn!("surface reports no usable format; presenting is disabled");
            }
            surface
        });

        let device = &gpu.device;
        let pipelines = Pipelines::new(device);
        let vertex_stream = StreamBuffer::new(
            device,
            wgpu::BufferUsages::VERTEX,
            VERTEX_BUFFER_SIZE as u64,
            "scanline vertex stream",
        );
        let uniform_stream = StreamBuffer::new(
            device,
            wgpu::BufferUsages::UNIFORM,
            UNIFORM_BUFFER_SIZE as u64,
            "scanline uniform stream",
        );
        let data_stream = StreamBuffer::new(
            device,
            wgpu::BufferUsages::STORAGE,
            DATA_STREAM_SIZE,
            "scanline pixel stream",
        );
        let targets = VramTargets::new(device, &pipelines, &uniform_stream, &data_stream, 1);

        let readback_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scanline readback"),
            size: wgpu::Extent3d {
                width: VRAM_WIDTH,
                height: VRAM_HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: VRAM_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let readback_view = readback_texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Row pitch of a full-width readback is already a multiple of the copy alignment.
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scanline readback staging"),
            size: u64::from(VRAM_WIDTH * 4 * VRAM_HEIGHT),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let uniform_alignment = gpu.uniform_alignment().max(UNIFORM_BLOCK_SIZE);
        info!("{} ready, max resolution scale {}", gpu.adapter_name(), gpu.max_resolution_scale());

        Ok(Self {
            gpu,
            surface,
            pipelines,
            targets,
            vertex_stream,
            uniform_stream,
            data_stream,
            uniform_alignment,
            readback_texture,
            readback_view,
            staging,
            encoder: None,
            pending: Vec::new(),
            mapped: Vec::new(),
            batch_uniforms: vec![0; UNIFORM_BLOCK_SIZE as usize],
            batch_uniform_offset: 0,
            scissor: VramRect::full(),
        })
    }

    // ── streams and submission ───────────────────────────────────────────

    /// Submits if any stream lacks room for the given amounts, so the pushes that
    /// follow land in the same submission as the commands using them.
    fn reserve(&mut self, vertex_bytes: u64, uniform_blocks: u64, data_bytes: u64) {
        let fits = self.vertex_stream.has_space(vertex_bytes, VERTEX_STRIDE)
            && self
                .uniform_stream
                .has_space(uniform_blocks * self.uniform_alignment, self.uniform_alignment)
            && self.data_stream.has_space(data_bytes, PIXEL_DATA_ALIGN);
        if !fits {
            debug!("stream space exhausted; submitting");
            self.submit();
        }
    }

    fn push_uniforms(&mut self, bytes: &[u8]) -> u32 {
        self.reserve(0, 1, 0);
        let mut block = [0u8; UNIFORM_BLOCK_SIZE as usize];
        let len = bytes.len().min(block.len());
        block[..len].copy_from_slice(&bytes[..len]);
        match self.uniform_stream.push(&self.gpu.queue, &block, self.uniform_alignment) {
            Some(offset) => offset as u32,
            None => {
                error!("uniform block does not fit an empty stream");
                0
            }
        }
    }

    /// Replays recorded batch draws in one pass.
    fn flush_draws(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let encoder = encoder_for(&mut self.encoder, &self.gpu.device);
        {
            let mut rpass = begin_vram_pass(encoder, &self.targets, "scanline batch pass", true);
            rpass.set_vertex_buffer(0, self.vertex_stream.buffer().slice(..));
            for draw in &self.pending {
                rpass.set_pipeline(&draw.pipeline);
                rpass.set_bind_group(0, &self.targets.draw_bind_group, &[draw.uniform_offset]);
                rpass.set_scissor_rect(
                    draw.scissor.left,
                    draw.scissor.top,
                    draw.scissor.width(),
                    draw.scissor.height(),
                );
                rpass.draw(draw.base_vertex..draw.base_vertex + draw.vertex_count, 0..1);
            }
        }
        self.pending.clear();
    }

    /// Submits everything recorded so far and restarts the streams.
    fn submit(&mut self) {
        self.flush_draws();
        if let Some(encoder) = self.encoder.take() {
            self.gpu.queue.submit(std::iter::once(encoder.finish()));
        }

        self.vertex_stream.reset();
        self.uniform_stream.reset();
        self.data_stream.reset();

        // Draws recorded after this point still expect the current batch block.
        let block = self.batch_uniforms.clone();
        self.batch_uniform_offset = self.push_uniforms(&block);
    }

    // ── VRAM passes ──────────────────────────────────────────────────────

    /// Runs a fullscreen pass into VRAM, scissored to each native rect.
    fn run_vram_pass(
        &mut self,
        label: &str,
        pipeline: &wgpu::RenderPipeline,
        uniform_offset: u32,
        rects: impl Iterator<Item = VramRect>,
        with_color: bool,
    ) {
        let scale = self.targets.scale;
        let encoder = encoder_for(&mut self.encoder, &self.gpu.device);
        let mut rpass = begin_vram_pass(encoder, &self.targets, label, with_color);
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &self.targets.draw_bind_group, &[uniform_offset]);
        for rect in rects {
            let r = rect.scaled(scale);
            rpass.set_scissor_rect(r.left, r.top, r.width(), r.height());
            rpass.draw(0..3, 0..1);
        }
    }

    /// Copies native `rect` of VRAM into the read texture.
    fn copy_to_read_texture(&mut self, rect: VramRect) {
        let r = rect.clamped(VRAM_WIDTH, VRAM_HEIGHT).scaled(self.targets.scale);
        if r.is_empty() {
            return;
        }
        let encoder = encoder_for(&mut self.encoder, &self.gpu.device);
        encoder.copy_texture_to_texture(
            texel_copy(&self.targets.vram, r.left, r.top),
            texel_copy(&self.targets.read, r.left, r.top),
            extent_of(r),
        );
    }

    fn rebuild_targets(&mut self, scale: u32) {
        self.submit();
        self.targets = VramTargets::new(
            &self.gpu.device,
            &self.pipelines,
            &self.uniform_stream,
            &self.data_stream,
            scale,
        );
        let (width, height) = self.targets.extent();
        info!("VRAM target recreated at {width}x{height} (scale {scale})");
    }

    fn download(&mut self, rect: VramRect) -> Result<Vec<u16>, BackendError> {
        let padded_bytes_per_row = (rect.width() * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let encoder = encoder_for(&mut self.encoder, &self.gpu.device);
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scanline readback pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.readback_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&self.pipelines.readback);
            rpass.set_bind_group(0, &self.targets.vram_bind_group, &[0]);
            rpass.set_scissor_rect(rect.left, rect.top, rect.width(), rect.height());
            rpass.draw(0..3, 0..1);
        }

        encoder.copy_texture_to_buffer(
            texel_copy(&self.readback_texture, rect.left, rect.top),
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(rect.height()),
                },
            },
            extent_of(rect),
        );
        self.submit();

        let size = u64::from(padded_bytes_per_row * rect.height());
        let slice = self.staging.slice(..size);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.gpu
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|err| BackendError::Readback(err.to_string()))?;
        rx.recv()
            .map_err(|err| BackendError::Readback(err.to_string()))?
            .map_err(|err| BackendError::Readback(err.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((rect.width() * rect.height()) as usize);
        for row in 0..rect.height() {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + (rect.width() * 4) as usize;
            pixels.extend(
                mapped[start..end]
                    .chunks_exact(4)
                    .map(|px| rgba8888_to_rgba5551(u32::from_le_bytes([px[0], px[1], px[2], px[3]]))),
            );
        }
        drop(mapped);
        self.staging.unmap();

        Ok(pixels)
    }
}

impl RenderBackend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn name(&self) -> String {
        self.gpu.adapter_name()
    }

    fn max_resolution_scale(&self) -> u32 {
        self.gpu.max_resolution_scale().min(MAX_RESOLUTION_SCALE)
    }

    fn map_vertices(&mut self, count: u32) -> &mut [BatchVertex] {
        self.mapped.clear();
        self.mapped.resize(count as usize, BatchVertex::default());
        &mut self.mapped
    }

    fn unmap_vertices(&mut self, used: u32) -> u32 {
        let used = (used as usize).min(self.mapped.len());
        // Room for the uniform upload that follows, so it cannot reset the
        // stream these vertices sit in.
        self.reserve(used as u64 * VERTEX_STRIDE, 1, 0);

        let bytes: &[u8] = bytemuck::cast_slice(&self.mapped[..used]);
        match self.vertex_stream.push(&self.gpu.queue, bytes, VERTEX_STRIDE) {
            Some(offset) => (offset / VERTEX_STRIDE) as u32,
            None => {
                error!("{used} vertices do not fit an empty vertex stream");
                0
            }
        }
    }

    fn upload_uniforms(&mut self, bytes: &[u8]) {
        self.batch_uniforms = bytes.to_vec();
        self.batch_uniform_offset = self.push_uniforms(bytes);
    }

    fn draw_batch(
        &mut self,
        config: &BatchConfig,
        render_mode: BatchRenderMode,
        base_vertex: u32,
        vertex_count: u32,
    ) {
        if vertex_count == 0 {
            return;
        }
        let key = BatchPipelineKey::new(config, render_mode);
        let pipeline = self.pipelines.batch(&self.gpu.device, key).clone();
        self.pending.push(PendingDraw {
            pipeline,
            uniform_offset: self.batch_uniform_offset,
            scissor: self.scissor,
            base_vertex,
            vertex_count,
        });
    }

    fn set_scissor(&mut self, rect: VramRect) {
        let (width, height) = self.targets.extent();
        self.scissor = rect.clamped(width, height);
    }

    fn fill_vram(&mut self, pass: &FillPass) {
        self.flush_draws();
        let offset = self.push_uniforms(bytemuck::bytes_of(&pass.uniforms));
        let pipeline = self.pipelines.fill.clone();
        self.run_vram_pass(
            "scanline fill pass",
            &pipeline,
            offset,
            wrapped_pieces(pass.x, pass.y, pass.width, pass.height),
            true,
        );
    }

    fn write_vram(&mut self, pass: &WritePass<'_>) {
        self.flush_draws();
        let pixels = (pass.width as usize * pass.height as usize).min(pass.data.len());
        let bytes: &[u8] = bytemuck::cast_slice(&pass.data[..pixels]);
        self.reserve(0, 1, bytes.len() as u64);

        let Some(data_offset) = self.data_stream.push(&self.gpu.queue, bytes, PIXEL_DATA_ALIGN) else {
            error!("{}x{} write does not fit the pixel stream", pass.width, pass.height);
            return;
        };

        let mut uniforms = pass.uniforms;
        uniforms.buffer_base_offset = (data_offset / 2) as u32;
        let offset = self.push_uniforms(bytemuck::bytes_of(&uniforms));
        let pipeline = self.pipelines.write[usize::from(pass.mask.check_mask_before_draw)].clone();
        self.run_vram_pass(
            "scanline write pass",
            &pipeline,
            offset,
            wrapped_pieces(pass.x, pass.y, pass.width, pass.height),
            true,
        );
    }

    fn copy_vram(&mut self, pass: &CopyPass) {
        self.flush_draws();

        // Both paths stage the source in the read texture: a texture cannot be
        // copied onto itself, and the shader samples the read texture.
        for rect in wrapped_pieces(pass.src_x, pass.src_y, pass.width, pass.height) {
            self.copy_to_read_texture(rect);
        }

        if pass.use_shader {
            let offset = self.push_uniforms(bytemuck::bytes_of(&pass.uniforms));
            let pipeline = self.pipelines.copy[usize::from(pass.mask.check_mask_before_draw)].clone();
            self.run_vram_pass(
                "scanline copy pass",
                &pipeline,
                offset,
                wrapped_pieces(pass.dst_x, pass.dst_y, pass.width, pass.height),
                true,
            );
            return;
        }

        // Neither region wraps here, so both are single rectangles.
        let scale = self.targets.scale;
        let src = VramRect::from_extents(pass.src_x % VRAM_WIDTH, pass.src_y % VRAM_HEIGHT, pass.width, pass.height)
            .clamped(VRAM_WIDTH, VRAM_HEIGHT)
            .scaled(scale);
        let dst_x = (pass.dst_x % VRAM_WIDTH) * scale;
        let dst_y = (pass.dst_y % VRAM_HEIGHT) * scale;
        let encoder = encoder_for(&mut self.encoder, &self.gpu.device);
        encoder.copy_texture_to_texture(
            texel_copy(&self.targets.read, src.left, src.top),
            texel_copy(&self.targets.vram, dst_x, dst_y),
            extent_of(src),
        );
    }

    fn read_vram(&mut self, rect: VramRect, shadow: &mut VramShadow) -> Result<(), BackendError> {
        let rect = rect.clamped(VRAM_WIDTH, VRAM_HEIGHT);
        if rect.is_empty() {
            return Ok(());
        }
        self.flush_draws();
        let pixels = self.download(rect)?;
        shadow.store_region(rect, &pixels);
        Ok(())
    }

    fn update_vram_read_texture(&mut self, rect: VramRect) {
        self.flush_draws();
        self.copy_to_read_texture(rect);
    }

    fn update_depth_from_mask_bit(&mut self) {
        self.flush_draws();
        self.copy_to_read_texture(VramRect::full());
        let pipeline = self.pipelines.mask_depth.clone();
        let offset = self.batch_uniform_offset;
        self.run_vram_pass(
            "scanline mask depth pass",
            &pipeline,
            offset,
            std::iter::once(VramRect::full()),
            false,
        );
    }

    fn apply_settings(&mut self, settings: &RendererSettings) {
        let scale = settings
            .resolution_scale
            .clamp(MIN_RESOLUTION_SCALE, self.max_resolution_scale());
        if scale != self.targets.scale {
            self.rebuild_targets(scale);
        }
        let (width, height) = self.targets.extent();
        self.scissor = VramRect::new(0, 0, width, height);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.flush_draws();
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(&self.gpu.device, width, height);
        }
    }

    fn present(&mut self, display: Option<&DisplayArea>) -> Result<(), BackendError> {
        self.flush_draws();

        let acquired = self
            .surface
            .as_ref()
            .filter(|s| s.is_presentable())
            .map(|s| (s.acquire(&self.gpu.device), s.format(), s.size()));
        let Some((acquired, format, (surface_width, surface_height))) = acquired else {
            self.submit();
            return Ok(());
        };

        let frame = match acquired {
            Ok(frame) => frame,
            Err(SurfaceErrorAction::Fatal) => {
                self.submit();
                return Err(BackendError::Surface("surface out of memory".to_owned()));
            }
            Err(action) => {
                debug!("skipping present: {action:?}");
                self.submit();
                return Ok(());
            }
        };

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let pipeline = self.pipelines.display(&self.gpu.device, format);
        let uniform_offset = display.map(|area| {
            let uniforms = DisplayUniforms {
                src: [area.x, area.y],
                size: [area.width, area.height],
                surface_size: [surface_width, surface_height],
                scale: self.targets.scale,
                color_24bit: u32::from(area.color_24bit),
            };
            self.push_uniforms(bytemuck::bytes_of(&uniforms))
        });

        let encoder = encoder_for(&mut self.encoder, &self.gpu.device);
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scanline display pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            if let (Some(area), Some(offset)) = (display, uniform_offset)
                && area.width > 0
                && area.height > 0
            {
                rpass.set_pipeline(&pipeline);
                rpass.set_bind_group(0, &self.targets.vram_bind_group, &[offset]);
                rpass.draw(0..3, 0..1);
            }
        }

        self.submit();
        frame.present();
        Ok(())
    }
}
