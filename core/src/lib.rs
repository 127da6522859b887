//! Texel Kernels Core
//!
//! Two small GPU compute demos on wgpu, each a straight-line sequence of
//! device → queue → kernel pipeline → command encoder → dispatch → submit.
//!
//! # Flows
//!
//! - [`offscreen`]: run `rayTracingKernel` over a 256×256 texture with 8×8
//!   threadgroups, block until the GPU is done, read the pixels back.
//! - [`live_view`]: run the inline `compute` gradient kernel over a window's
//!   drawable, sizing threadgroups from the device, then present.
//!
//! Both size their grids with [`gpu::threadgroups_along`] and record their
//! steps into a [`gpu::SubmissionLog`], which rejects out-of-order encoding.

pub mod error;
pub mod gpu;
pub mod live_view;
pub mod offscreen;
pub mod reference;

// Re-export commonly used types
pub use error::DemoError;
pub use gpu::{
    threadgroups_along, DispatchGrid, GpuContext, KernelPipeline, KernelSource, Step,
    SubmissionLog, ThreadgroupSize,
};
pub use live_view::{run_live_view, LiveViewApp, LiveViewConfig};
pub use offscreen::{
    run_offscreen, DispatchReport, OffscreenConfig, OffscreenDispatcher, OffscreenOutput,
};
