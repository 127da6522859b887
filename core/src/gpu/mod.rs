//! GPU compute using wgpu.
//!
//! Device acquisition, kernel compilation, grid sizing and the ordering
//! contract shared by the offscreen and live-view flows. Runs on Metal on
//! macOS and Vulkan or GL elsewhere.

pub mod context;
pub mod dispatch;
pub mod kernel;
pub mod layouts;
pub mod pipelines;
pub mod sequence;
pub mod textures;

pub use context::{GpuContext, GpuError};
pub use dispatch::{
    threadgroups_along, validate_texture_size, DispatchError, DispatchGrid, ThreadgroupSize,
};
pub use kernel::{KernelError, KernelLibrary, KernelPipeline, KernelSource, RAY_TRACING_KERNEL};
pub use pipelines::BlitPipeline;
pub use sequence::{SequenceError, Step, SubmissionLog};
pub use textures::{ReadbackBuffer, StorageTarget, TextureError, KERNEL_OUTPUT_FORMAT};
