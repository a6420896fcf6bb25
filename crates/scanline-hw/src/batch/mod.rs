//! Vertex batching: records, per-batch state and the accumulator that decides when
//! a batch is submitted.

mod accumulator;
mod builder;
mod config;
mod vertex;

pub use accumulator::BatchAccumulator;
pub use builder::{RAW_TEXTURE_COLOR, build_vertices, fix_flipped_quad_texcoords};
pub use config::{BatchConfig, BatchPrimitive, BatchRenderMode};
pub use vertex::BatchVertex;

use crate::vram::{MAX_PRIMITIVE_HEIGHT, MAX_PRIMITIVE_WIDTH, TEXTURE_PAGE_HEIGHT, TEXTURE_PAGE_WIDTH};

/// Worst case for one rectangle: one quad per texture-page span it crosses.
pub const MAX_VERTICES_FOR_RECTANGLE: usize = 6
    * ((MAX_PRIMITIVE_WIDTH.div_ceil(TEXTURE_PAGE_WIDTH) + 1)
        * (MAX_PRIMITIVE_HEIGHT.div_ceil(TEXTURE_PAGE_HEIGHT) + 1)) as usize;

/// Depth ordinals available before the depth buffer must be rebuilt.
pub const MAX_BATCH_VERTEX_COUNTER_IDS: i32 = 65534;

pub const VERTEX_BUFFER_SIZE: usize = 1024 * 1024;
pub const UNIFORM_BUFFER_SIZE: usize = 512 * 1024;

/// Smallest accumulator that can hold any single command except a large rectangle.
pub const MIN_BATCH_VERTEX_COUNT: usize = 6;
pub const MAX_BATCH_VERTEX_COUNT: usize = VERTEX_BUFFER_SIZE / std::mem::size_of::<BatchVertex>();
