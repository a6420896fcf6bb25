//! The engine façade.
//!
//! [`HwRenderer`] receives primitive commands and VRAM transfers in program order,
//! batches draws, and keeps the CPU-visible shadow coherent with what the backend
//! has rendered.
//!
//! Two dirty regions are tracked:
//! - `vram_dirty`: hardware-side writes the shadow has not seen. Cleared only by a
//!   real sync (a read that intersects it, a save state, a resolution change).
//! - `texture_dirty`: hardware-side writes the backend's read texture has not seen.
//!   Cleared when the read texture is refreshed before a draw samples it.

use log::{debug, info, warn};

use crate::backend::{
    CopyPass, DisplayArea, FillPass, RenderBackend, SurfaceDesc, WritePass, create_backend_or_null,
};
use crate::batch::{
    BatchAccumulator, BatchConfig, BatchPrimitive, BatchVertex, MAX_BATCH_VERTEX_COUNT,
    MAX_BATCH_VERTEX_COUNTER_IDS, build_vertices,
};
use crate::command::{
    DrawMode, DrawingArea, DrawingOffset, InterlacedRenderMode, LineCommand, MaskSettings, Palette,
    RenderCommand, TextureMode, TexturePage, TextureWindow, TransparencyMode, decode,
};
use crate::coords::VramRect;
use crate::error::RendererError;
use crate::settings::RendererSettings;
use crate::stats::{RendererStats, StatsCollector};
use crate::uniforms::{BatchUniforms, VramCopyUniforms, VramFillUniforms, VramWriteUniforms};
use crate::vram::{
    DirtyRect, VRAM_HEIGHT, VRAM_PIXELS, VRAM_STATE_BYTES, VRAM_WIDTH, VramShadow, pixel_count,
    rgba8888_to_rgba5551, transfer_bounds,
};


pub struct HwRenderer<B: RenderBackend = Box<dyn RenderBackend>> {
    backend: B,
    settings: RendererSettings,
    draw_mode: DrawMode,

    batch: BatchAccumulator,
    scratch: Vec<BatchVertex>,
    depth_ordinal: i32,

    shadow: VramShadow,
    vram_dirty: DirtyRect,
    texture_dirty: DirtyRect,

    /// Texpage and palette the current batch samples through.
    texture_state: Option<(TexturePage, Palette)>,
    /// The sampled area may have been drawn to since the last hazard check.
    texture_check_pending: bool,

    stats: StatsCollector,
}

impl HwRenderer {
    /// Creates the backend selected by `settings`, falling back to the null backend
    /// if it cannot be brought up.
    pub fn with_surface(surface: SurfaceDesc, settings: RendererSettings) -> Self {
        let backend = create_backend_or_null(surface, &settings);
        Self::new(backend, settings)
    }
}

impl<B: RenderBackend> HwRenderer<B> {
    pub fn new(backend: B, settings: RendererSettings) -> Self {
        Self::with_vertex_capacity(backend, settings, MAX_BATCH_VERTEX_COUNT)
    }

    /// Like [`new`](Self::new) with a batch buffer of `capacity` vertices.
    pub fn with_vertex_capacity(mut backend: B, settings: RendererSettings, capacity: usize) -> Self {
        let settings = settings.sanitized(backend.max_resolution_scale());
        backend.apply_settings(&settings);
        info!("renderer on {}: {}", backend.name(), describe(&settings));

        let mut renderer = Self {
            backend,
            settings,
            draw_mode: DrawMode::default(),
            batch: BatchAccumulator::new(capacity),
            scratch: Vec::with_capacity(crate::batch::MAX_VERTICES_FOR_RECTANGLE),
            depth_ordinal: 0,
            shadow: VramShadow::new(),
            vram_dirty: DirtyRect::new(),
            texture_dirty: DirtyRect::new(),
            texture_state: None,
            texture_check_pending: true,
            stats: StatsCollector::new(),
        };
        renderer.update_scissor();
        renderer
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn draw_mode(&self) -> &DrawMode {
        &self.draw_mode
    }

    /// Counters of the frame in progress.
    pub fn stats(&self) -> &RendererStats {
        self.stats.current()
    }

    pub fn last_frame_stats(&self) -> &RendererStats {
        self.stats.last_frame()
    }

    /// Region the shadow has not caught up with, if any.
    pub fn vram_dirty_rect(&self) -> Option<VramRect> {
        self.vram_dirty.get()
    }

    pub fn is_flushed(&self) -> bool {
        self.batch.is_flushed()
    }

    // ── draw-mode registers ──────────────────────────────────────────────

    /// GP0(E1).
    pub fn set_texture_page(&mut self, page: TexturePage) {
        self.draw_mode.texture_page = page;
    }

    /// GP0(E2).
    pub fn set_texture_window(&mut self, window: TextureWindow) {
        self.draw_mode.texture_window = window;
    }

    /// GP0(E3/E4). Pending draws keep the scissor they were recorded under.
    pub fn set_drawing_area(&mut self, area: DrawingArea) {
        if area == self.draw_mode.drawing_area {
            return;
        }
        self.flush();
        self.draw_mode.drawing_area = area;
        self.update_scissor();
    }

    /// GP0(E5).
    pub fn set_drawing_offset(&mut self, offset: DrawingOffset) {
        self.draw_mode.drawing_offset = offset;
    }

    /// GP0(E6).
    pub fn set_mask_settings(&mut self, mask: MaskSettings) {
        self.draw_mode.mask = mask;
    }

    /// Interlaced render mode and the field currently being displayed.
    pub fn set_interlace(&mut self, mode: InterlacedRenderMode, displayed_field: u32) {
        self.draw_mode.interlace = mode;
        self.draw_mode.displayed_field = displayed_field & 1;
    }

    /// Applies a GP0 draw-mode word (E1..E6). Returns `false` for other opcodes.
    pub fn apply_draw_mode_word(&mut self, word: u32) -> bool {
        match word >> 24 {
            0xE1 => {
                // Bit 10 (drawing to the display area) has no effect on rendering.
                let bits = (word & 0x0BFF) as u16;
                self.set_texture_page(TexturePage(bits));
            }
            0xE2 => self.set_texture_window(TextureWindow::from_word(word)),
            0xE3 => {
                let area = self.draw_mode.drawing_area;
                let bottom_right = area.right | (area.bottom << 10);
                self.set_drawing_area(DrawingArea::from_words(word, bottom_right));
            }
            0xE4 => {
                let area = self.draw_mode.drawing_area;
                let top_left = area.left | (area.top << 10);
                self.set_drawing_area(DrawingArea::from_words(top_left, word));
            }
            0xE5 => self.set_drawing_offset(DrawingOffset::from_word(word)),
            0xE6 => self.set_mask_settings(MaskSettings::from_word(word)),
            _ => return false,
        }
        true
    }

    // ── drawing ──────────────────────────────────────────────────────────

    /// Queues one primitive. May flush the current batch first.
    ///
    /// Poly-lines have no length limit and are queued one segment at a time.
    pub fn dispatch(&mut self, cmd: &RenderCommand) -> Result<(), RendererError> {
        if let RenderCommand::Line(line) = cmd
            && line.vertices.len() > 2
        {
            return self.dispatch_polyline(line);
        }
        self.dispatch_primitive(cmd)
    }

    fn dispatch_polyline(&mut self, line: &LineCommand) -> Result<(), RendererError> {
        let first_color = line.vertices.first().map_or(0, |v| v.color);
        let mut segment = RenderCommand::Line(LineCommand {
            flags: line.flags,
            vertices: Vec::with_capacity(2),
        });
        for pair in line.vertices.windows(2) {
            if let RenderCommand::Line(seg) = &mut segment {
                seg.vertices.clear();
                seg.vertices.extend_from_slice(pair);
                // Flat poly-lines take the color of their first vertex throughout.
                if !line.flags.shaded {
                    seg.vertices.iter_mut().for_each(|v| v.color = first_color);
                }
            }
            self.dispatch_primitive(&segment)?;
        }
        Ok(())
    }

    fn dispatch_primitive(&mut self, cmd: &RenderCommand) -> Result<(), RendererError> {
        let flags = match cmd {
            RenderCommand::Unsupported { opcode } => {
                warn!("unsupported render command 0x{opcode:02X}; skipped");
                return Ok(());
            }
            _ => cmd.flags(),
        };

        if flags.textured {
            match cmd {
                RenderCommand::Polygon(p) => {
                    if let Some(bits) = p.texpage {
                        self.draw_mode.texture_page = self.draw_mode.texture_page.with_polygon_bits(bits);
                    }
                    if let Some(palette) = p.palette {
                        self.draw_mode.palette = palette;
                    }
                }
                RenderCommand::Rectangle(r) => {
                    if let Some(palette) = r.palette {
                        self.draw_mode.palette = palette;
                    }
                }
                _ => {}
            }
            self.prepare_texture_state();
        }

        let config = self.batch_config(cmd);
        let uniforms = BatchUniforms::new(&config, &self.draw_mode, &self.settings);
        let depth = self.next_depth_ordinal();
        self.batch
            .prepare(config, uniforms, &mut self.backend, self.stats.current_mut());
        self.batch
            .ensure_capacity(cmd.required_vertices(), &mut self.backend, self.stats.current_mut())?;

        self.scratch.clear();
        if let Some(bounds) = build_vertices(cmd, &self.draw_mode, depth, &mut self.scratch) {
            self.batch.append(&self.scratch);
            self.include_dirty(bounds);
        }
        Ok(())
    }

    /// Decodes and dispatches raw GP0 words, including draw-mode words.
    ///
    /// Returns the number of words consumed. On a decode error, everything before
    /// the offending command has been dispatched.
    pub fn dispatch_words(&mut self, words: &[u32]) -> Result<usize, RendererError> {
        let mut pos = 0;
        while pos < words.len() {
            if self.apply_draw_mode_word(words[pos]) {
                pos += 1;
                continue;
            }
            let (cmd, used) = decode(&words[pos..])?;
            self.dispatch(&cmd)?;
            pos += used;
        }
        Ok(pos)
    }

    /// Draws all pending vertices.
    pub fn flush(&mut self) {
        self.batch.flush(&mut self.backend, self.stats.current_mut());
    }

    fn batch_config(&self, cmd: &RenderCommand) -> BatchConfig {
        let flags = cmd.flags();
        let page = self.draw_mode.texture_page;

        let texture_mode = if flags.textured {
            TextureMode::Enabled { color: page.color_mode(), raw: flags.raw_texture }
        } else {
            TextureMode::Disabled
        };
        let transparency_mode = if flags.semi_transparent {
            page.transparency_mode()
        } else {
            TransparencyMode::Disabled
        };

        BatchConfig {
            primitive: match cmd {
                RenderCommand::Line(_) => BatchPrimitive::Lines,
                _ => BatchPrimitive::Triangles,
            },
            texture_mode,
            transparency_mode,
            dithering: !self.settings.true_color && cmd.dithering_enabled() && page.dither_enabled(),
            interlacing: self.draw_mode.skipped_field().is_some(),
            set_mask_while_drawing: self.draw_mode.mask.set_mask_while_drawing,
            check_mask_before_draw: self.draw_mode.mask.check_mask_before_draw,
        }
    }

    /// A new texpage or palette starts a new batch. If the area it samples was
    /// drawn to since the read texture was refreshed, the refresh happens now.
    fn prepare_texture_state(&mut self) {
        let page = self.draw_mode.texture_page;
        let palette = if page.color_mode().uses_palette() {
            self.draw_mode.palette
        } else {
            Palette::default()
        };
        if self.texture_state != Some((page, palette)) {
            self.flush();
            self.texture_state = Some((page, palette));
            self.texture_check_pending = true;
        }
        if !std::mem::take(&mut self.texture_check_pending) {
            return;
        }

        let Some(dirty) = self.texture_dirty.get() else { return };
        if self.draw_mode.texture_source_intersects(dirty) {
            debug!("texture source overlaps drawn area {dirty:?}; refreshing read texture");
            self.flush();
            self.backend.update_vram_read_texture(dirty);
            self.stats.current_mut().num_vram_read_texture_updates += 1;
            self.texture_dirty.clear();
        }
    }

    fn include_dirty(&mut self, rect: VramRect) {
        self.vram_dirty.include(rect);
        self.texture_dirty.include(rect);

        if self.draw_mode.texture_source_intersects(rect) {
            self.texture_check_pending = true;
        }
    }

    /// Next draw-order value for the depth test. When the range is used up the
    /// depth buffer is rebuilt from the mask bits and numbering restarts.
    fn next_depth_ordinal(&mut self) -> i32 {
        self.depth_ordinal += 1;
        if self.depth_ordinal >= MAX_BATCH_VERTEX_COUNTER_IDS {
            debug!("depth ordinals exhausted; rebuilding depth from mask bits");
            self.flush();
            self.backend.update_depth_from_mask_bit();
            self.depth_ordinal = 1;
        }
        self.depth_ordinal
    }

    fn update_scissor(&mut self) {
        let scissor = self.draw_mode.drawing_area.scissor(self.settings.resolution_scale);
        self.backend.set_scissor(scissor);
    }

    // ── VRAM transfers ───────────────────────────────────────────────────

    /// Fills a rectangle with `color` (`0xAABBGGRR`). Mask bits are ignored; with
    /// interlaced rendering the displayed field's rows are skipped.
    pub fn fill(&mut self, x: u32, y: u32, width: u32, height: u32, color: u32) {
        let width = width.min(VRAM_WIDTH);
        let height = height.min(VRAM_HEIGHT);
        if width == 0 || height == 0 {
            return;
        }
        self.flush();

        let skip_field = self.draw_mode.skipped_field();
        self.backend.fill_vram(&FillPass {
            x,
            y,
            width,
            height,
            color: rgba8888_to_rgba5551(color),
            skip_field,
            uniforms: VramFillUniforms::new(color, skip_field, self.settings.true_color),
        });
        self.include_dirty(transfer_bounds(x, y, width, height));
    }

    /// Uploads `data` (`width * height` pixels, row-major) to VRAM, honoring the
    /// mask settings.
    pub fn write(&mut self, x: u32, y: u32, width: u32, height: u32, data: &[u16]) -> Result<(), RendererError> {
        let expected = pixel_count(width, height);
        if data.len() != expected {
            return Err(RendererError::TransferSize { width, height, expected, actual: data.len() });
        }
        if expected == 0 {
            return Ok(());
        }
        self.flush();

        let mask = self.draw_mode.mask;
        let bounds = transfer_bounds(x, y, width, height);
        // Mask checks in the shadow must see what the hardware holds.
        if mask.check_mask_before_draw && self.vram_dirty.intersects(bounds) {
            self.sync_vram()?;
        }
        self.shadow.write_rect(x, y, width, height, data, mask);

        let depth = self.next_depth_ordinal();
        self.backend.write_vram(&WritePass {
            x,
            y,
            width,
            height,
            data,
            mask,
            uniforms: VramWriteUniforms::new(
                x,
                y,
                width,
                height,
                mask.set_mask_while_drawing,
                depth,
                self.settings.resolution_scale,
            ),
        });
        self.include_dirty(bounds);
        Ok(())
    }

    /// VRAM-to-VRAM copy, honoring the mask settings.
    ///
    /// Masked, wrapping or overlapping copies go through the texel-by-texel shader
    /// path so the source is never read after it was overwritten.
    pub fn copy(&mut self, src_x: u32, src_y: u32, dst_x: u32, dst_y: u32, width: u32, height: u32) {
        let width = width.min(VRAM_WIDTH);
        let height = height.min(VRAM_HEIGHT);
        if width == 0 || height == 0 {
            return;
        }
        self.flush();

        let mask = self.draw_mode.mask;
        let wraps = |x: u32, y: u32| x % VRAM_WIDTH + width > VRAM_WIDTH || y % VRAM_HEIGHT + height > VRAM_HEIGHT;
        let src = VramRect::from_extents(src_x % VRAM_WIDTH, src_y % VRAM_HEIGHT, width, height);
        let dst = VramRect::from_extents(dst_x % VRAM_WIDTH, dst_y % VRAM_HEIGHT, width, height);
        let use_shader = mask.is_enabled() || wraps(src_x, src_y) || wraps(dst_x, dst_y) || src.intersects(dst);

        let depth = self.next_depth_ordinal();
        self.backend.copy_vram(&CopyPass {
            src_x,
            src_y,
            dst_x,
            dst_y,
            width,
            height,
            mask,
            use_shader,
            uniforms: VramCopyUniforms::new(
                src_x,
                src_y,
                dst_x,
                dst_y,
                width,
                height,
                mask.set_mask_while_drawing,
                depth,
                self.settings.resolution_scale,
            ),
        });
        self.include_dirty(transfer_bounds(dst_x, dst_y, width, height));
    }

    /// CPU read of a VRAM rectangle. Coordinates wrap.
    ///
    /// Pending draws are flushed; if the rectangle touches the dirty region, the
    /// whole dirty region is downloaded into the shadow first.
    pub fn read(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u16>, RendererError> {
        self.flush();
        if self.vram_dirty.intersects(transfer_bounds(x, y, width, height)) {
            self.sync_vram()?;
        }
        Ok(self.shadow.read_rect(x, y, width, height))
    }

    /// Declares all of VRAM as modified on the hardware side.
    pub fn mark_full_dirty(&mut self) {
        self.vram_dirty.set_full();
        self.texture_dirty.set_full();
        self.texture_check_pending = true;
    }

    /// Downloads the dirty region into the shadow and clears it.
    fn sync_vram(&mut self) -> Result<(), RendererError> {
        let Some(rect) = self.vram_dirty.get() else { return Ok(()) };
        self.flush();
        debug!("syncing {rect:?} into the shadow");
        self.backend.read_vram(rect, &mut self.shadow)?;
        self.vram_dirty.clear();
        Ok(())
    }

    /// Writes the whole shadow back to the hardware image.
    fn upload_shadow(&mut self) {
        let pixels = self.shadow.pixels().to_vec();
        debug_assert_eq!(pixels.len(), VRAM_PIXELS);
        self.backend.write_vram(&WritePass {
            x: 0,
            y: 0,
            width: VRAM_WIDTH,
            height: VRAM_HEIGHT,
            data: &pixels,
            mask: MaskSettings::default(),
            uniforms: VramWriteUniforms::new(0, 0, VRAM_WIDTH, VRAM_HEIGHT, false, 0, self.settings.resolution_scale),
        });
        self.backend.update_depth_from_mask_bit();
        self.depth_ordinal = 0;
        self.texture_dirty.set_full();
        self.texture_check_pending = true;
        self.batch.mark_uniforms_dirty();
    }

    // ── state and settings ───────────────────────────────────────────────

    /// Full VRAM image, little-endian `u16`s.
    pub fn save_state(&mut self) -> Result<Vec<u8>, RendererError> {
        self.flush();
        self.sync_vram()?;
        Ok(self.shadow.to_bytes())
    }

    /// Replaces VRAM with a saved image.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), RendererError> {
        if bytes.len() != VRAM_STATE_BYTES {
            return Err(RendererError::StateSize { expected: VRAM_STATE_BYTES, actual: bytes.len() });
        }
        self.flush();
        if !self.shadow.load_bytes(bytes) {
            return Err(RendererError::StateSize { expected: VRAM_STATE_BYTES, actual: bytes.len() });
        }
        self.upload_shadow();
        self.mark_full_dirty();
        Ok(())
    }

    /// Applies new settings. A resolution change recreates the backend's VRAM
    /// resources; their contents are carried over through the shadow.
    pub fn on_settings_changed(&mut self, settings: RendererSettings) -> Result<(), RendererError> {
        let settings = settings.sanitized(self.backend.max_resolution_scale());
        if settings == self.settings {
            return Ok(());
        }
        if settings.backend != self.backend.kind() {
            warn!(
                "backend change to {} takes effect when the renderer is recreated",
                settings.backend
            );
        }

        self.flush();
        let rebuild = self.settings.needs_resource_rebuild(&settings);
        if rebuild {
            self.sync_vram()?;
        }

        self.settings = settings;
        self.backend.apply_settings(&self.settings);
        if rebuild {
            self.upload_shadow();
        }
        self.update_scissor();
        self.batch.mark_uniforms_dirty();
        self.mark_full_dirty();
        info!("settings changed: {}", describe(&self.settings));
        Ok(())
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.flush();
        self.backend.resize(width, height);
    }

    /// Frame boundary: draws everything, presents `display` and rolls the
    /// statistics over.
    pub fn end_frame(&mut self, display: Option<&DisplayArea>) -> Result<(), RendererError> {
        self.flush();
        let presented = self.backend.present(display);
        self.stats.end_frame();
        presented.map_err(RendererError::from)
    }
}

fn describe(settings: &RendererSettings) -> String {
    format!(
        "{}x{} internal ({}x), true color {}, scaled dithering {}, texture filtering {}",
        VRAM_WIDTH * settings.resolution_scale,
        VRAM_HEIGHT * settings.resolution_scale,
        settings.resolution_scale,
        on_off(settings.true_color),
        on_off(settings.scaled_dithering),
        on_off(settings.texture_filtering),
    )
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
