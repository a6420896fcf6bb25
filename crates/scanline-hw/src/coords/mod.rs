//! Geometry types shared by the batcher, the VRAM tracker and the backends.
//!
//! Canonical space:
//! - native VRAM pixels (1024 x 512)
//! - origin top-left, +X right, +Y down
//!
//! Backends multiply by the resolution scale when addressing their render targets.

mod rect;

pub use rect::VramRect;
