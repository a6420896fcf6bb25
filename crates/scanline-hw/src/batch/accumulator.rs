use log::{error, trace};

use crate::backend::RenderBackend;
use crate::error::RendererError;
use crate::stats::RendererStats;
use crate::uniforms::BatchUniforms;

use super::{BatchConfig, BatchVertex, MIN_BATCH_VERTEX_COUNT};

/// Collects vertices that share one [`BatchConfig`] and one uniform block, and
/// hands them to the backend as a single batch.
///
/// ```text
/// Empty --append--> Accumulating(config) --flush--> Empty
/// ```
///
/// A change of configuration or uniforms while accumulating flushes first (see
/// [`prepare`](Self::prepare)), so every vertex is drawn under the state it was
/// recorded with.
#[derive(Debug)]
pub struct BatchAccumulator {
    vertices: Vec<BatchVertex>,
    capacity: usize,
    config: BatchConfig,
    uniforms: BatchUniforms,
    /// The backend has not seen `uniforms` yet.
    uniforms_dirty: bool,
}

impl BatchAccumulator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_BATCH_VERTEX_COUNT);
        Self {
            vertices: Vec::with_capacity(capacity),
            capacity,
            config: BatchConfig::default(),
            uniforms: BatchUniforms::default(),
            uniforms_dirty: true,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// True iff nothing is waiting to be drawn.
    #[inline]
    pub fn is_flushed(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    #[inline]
    pub fn uniforms(&self) -> &BatchUniforms {
        &self.uniforms
    }

    /// Makes `config` and `uniforms` current, flushing vertices recorded under
    /// different ones.
    pub fn prepare<B: RenderBackend + ?Sized>(
        &mut self,
        config: BatchConfig,
        uniforms: BatchUniforms,
        backend: &mut B,
        stats: &mut RendererStats,
    ) {
        if !self.is_flushed() && (config != self.config || uniforms != self.uniforms) {
            self.flush(backend, stats);
        }
        self.config = config;
        if uniforms != self.uniforms {
            self.uniforms = uniforms;
            self.uniforms_dirty = true;
        }
    }

    /// Makes room for `count` more vertices, flushing if they don't fit behind the
    /// pending ones.
    ///
    /// Fails only if `count` exceeds the whole buffer, which no flush can fix.
    pub fn ensure_capacity<B: RenderBackend + ?Sized>(
        &mut self,
        count: usize,
        backend: &mut B,
        stats: &mut RendererStats,
    ) -> Result<(), RendererError> {
        if count > self.capacity {
            error!(
                "command needs {count} vertices, batch buffer holds {}; buffer is misconfigured",
                self.capacity
            );
            return Err(RendererError::VertexCapacity { required: count, capacity: self.capacity });
        }
        if self.vertices.len() + count > self.capacity {
            trace!("batch buffer full ({} vertices); flushing", self.vertices.len());
            self.flush(backend, stats);
        }
        Ok(())
    }

    /// Copies `vertices` into the batch. Never flushes; call
    /// [`ensure_capacity`](Self::ensure_capacity) first.
    pub fn append(&mut self, vertices: &[BatchVertex]) {
        debug_assert!(self.vertices.len() + vertices.len() <= self.capacity);
        self.vertices.extend_from_slice(vertices);
    }

    /// Draws everything pending. Does nothing when already flushed.
    pub fn flush<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, stats: &mut RendererStats) {
        if self.vertices.is_empty() {
            return;
        }

        let count = self.vertices.len();
        let mapped = backend.map_vertices(count as u32);
        debug_assert!(mapped.len() >= count, "backend mapped {} of {count} vertices", mapped.len());
        mapped[..count].copy_from_slice(&self.vertices);
        let base_vertex = backend.unmap_vertices(count as u32);

        if self.uniforms_dirty {
            backend.upload_uniforms(bytemuck::bytes_of(&self.uniforms));
            stats.num_uniform_buffer_updates += 1;
            self.uniforms_dirty = false;
        }

        for &render_mode in self.config.passes() {
            backend.draw_batch(&self.config, render_mode, base_vertex, count as u32);
            stats.num_batches += 1;
        }

        self.vertices.clear();
    }

    /// Forces the next flush to re-upload the uniform block.
    pub fn mark_uniforms_dirty(&mut self) {
        self.uniforms_dirty = true;
    }
}
