use thiserror::Error;

use crate::backend::BackendKind;
use crate::command::DecodeError;

/// Errors surfaced by [`HwRenderer`](crate::renderer::HwRenderer).
#[derive(Debug, Error)]
pub enum RendererError {
    /// A single command needs more vertices than the whole batch buffer holds.
    /// This is a configuration error: the buffer is too small.
    #[error("command needs {required} vertices but the batch buffer holds {capacity}")]
    VertexCapacity { required: usize, capacity: usize },

    #[error("save state is {actual} bytes, expected {expected}")]
    StateSize { expected: usize, actual: usize },

    #[error("transfer of {width}x{height} needs {expected} pixels, got {actual}")]
    TransferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Backend failures. Creation failures are recoverable by falling back to
/// [`NullBackend`](crate::backend::NullBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to create {kind} backend: {reason:#}")]
    Creation {
        kind: BackendKind,
        reason: anyhow::Error,
    },

    #[error("VRAM readback failed: {0}")]
    Readback(String),

    /// The presentation surface cannot be used any more.
    #[error("surface error: {0}")]
    Surface(String),
}
