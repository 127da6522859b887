//! Crate-level error type.

use crate::gpu::{DispatchError, GpuError, KernelError, SequenceError, TextureError};

/// Errors that can end either demo flow.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Command ordering error: {0}")]
    Sequence(#[from] SequenceError),
    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Window error: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}
