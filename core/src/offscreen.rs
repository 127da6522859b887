//! Offscreen dispatch flow.
//!
//! Runs a kernel once over a fixed-size texture, blocks until the GPU has
//! finished, and reads the pixels back to the CPU.

use std::path::{Path, PathBuf};

use serde::Serialize;
use wgpu::BindGroup;

use crate::error::DemoError;
use crate::gpu::{
    validate_texture_size, DispatchGrid, GpuContext, KernelPipeline, KernelSource, ReadbackBuffer,
    Step, StorageTarget, SubmissionLog, ThreadgroupSize, RAY_TRACING_KERNEL,
};

/// Configuration for one offscreen dispatch.
#[derive(Debug, Clone)]
pub struct OffscreenConfig {
    pub width: u32,
    pub height: u32,
    pub threadgroup: ThreadgroupSize,
    pub kernel: KernelSource,
    /// Write the result as PNG here after read-back.
    pub output_path: Option<PathBuf>,
}

impl Default for OffscreenConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            threadgroup: ThreadgroupSize::SQUARE_8,
            kernel: KernelSource::library(RAY_TRACING_KERNEL),
            output_path: None,
        }
    }
}

/// What was dispatched, and on which adapter.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub kernel: String,
    pub width: u32,
    pub height: u32,
    pub grid: DispatchGrid,
    pub adapter: String,
    pub backend: String,
    pub steps: Vec<Step>,
}

/// Read-back RGBA8 pixels plus the report of how they were produced.
#[derive(Debug, Clone)]
pub struct OffscreenOutput {
    pub pixels: Vec<u8>,
    pub report: DispatchReport,
}

impl OffscreenOutput {
    /// RGBA at `(x, y)`, row 0 at the top.
    pub fn texel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.report.width || y >= self.report.height {
            return None;
        }
        let texels: &[[u8; 4]] = bytemuck::cast_slice(&self.pixels);
        texels.get((y * self.report.width + x) as usize).copied()
    }

    /// Encode the pixels as a PNG file.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), DemoError> {
        image::save_buffer(
            path.as_ref(),
            &self.pixels,
            self.report.width,
            self.report.height,
            image::ExtendedColorType::Rgba8,
        )?;
        log::info!("Wrote {}", path.as_ref().display());
        Ok(())
    }
}

/// Device, compiled kernel and target texture for repeated offscreen dispatches.
pub struct OffscreenDispatcher {
    ctx: GpuContext,
    kernel: KernelPipeline,
    target: StorageTarget,
    readback: ReadbackBuffer,
    bind_group: BindGroup,
    grid: DispatchGrid,
    config: OffscreenConfig,
}

impl OffscreenDispatcher {
    /// Acquire a headless device and build everything the dispatch needs.
    pub async fn new(config: OffscreenConfig) -> Result<Self, DemoError> {
        let ctx = GpuContext::new().await?;
        Self::with_context(ctx, config)
    }

    /// Build on an existing device. Sizes are checked against its limits
    /// before any GPU resource is created.
    pub fn with_context(ctx: GpuContext, config: OffscreenConfig) -> Result<Self, DemoError> {
        let limits = ctx.limits();
        validate_texture_size(config.width, config.height, &limits)?;
        let grid = DispatchGrid::covering(config.width, config.height, config.threadgroup);
        grid.validate(&limits)?;

        let kernel = KernelPipeline::new(&ctx.device, &config.kernel, config.threadgroup)?;
        let target = StorageTarget::for_kernel_output(
            &ctx.device,
            "offscreen_output",
            config.width,
            config.height,
        );
        let readback = ReadbackBuffer::new(&ctx.device, config.width, config.height);
        let bind_group = kernel.bind_output(&ctx.device, target.view());

        log::info!(
            "Dispatching {}x{} threadgroups over {}x{} texture",
            grid.groups_x,
            grid.groups_y,
            config.width,
            config.height
        );

        Ok(Self {
            ctx,
            kernel,
            target,
            readback,
            bind_group,
            grid,
            config,
        })
    }

    /// Encode, commit, wait for completion, and read the texture back.
    pub fn dispatch(&self) -> Result<OffscreenOutput, DemoError> {
        let mut log = SubmissionLog::new();
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen_encoder"),
            });

        self.kernel
            .encode_dispatch(&mut encoder, &self.bind_group, &self.grid, &mut log)?;
        self.readback
            .encode_copy(&mut encoder, self.target.texture(), &mut log)?;

        log.record(Step::Commit)?;
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        log.record(Step::WaitUntilCompleted)?;
        let pixels = self.readback.read_pixels(&self.ctx.device)?;

        let info = self.ctx.adapter_info();
        Ok(OffscreenOutput {
            pixels,
            report: DispatchReport {
                kernel: self.kernel.entry_point().to_string(),
                width: self.config.width,
                height: self.config.height,
                grid: self.grid,
                adapter: info.name,
                backend: format!("{:?}", info.backend),
                steps: log.into_steps(),
            },
        })
    }

    pub fn config(&self) -> &OffscreenConfig {
        &self.config
    }

    pub fn grid(&self) -> DispatchGrid {
        self.grid
    }

    /// Get GPU adapter info.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.ctx.adapter_info()
    }
}

/// Run the offscreen flow once, writing the PNG if `output_path` is set.
pub async fn run_offscreen(config: OffscreenConfig) -> Result<OffscreenOutput, DemoError> {
    let output_path = config.output_path.clone();
    let dispatcher = OffscreenDispatcher::new(config).await?;
    let output = dispatcher.dispatch()?;
    if let Some(path) = output_path {
        output.save_png(path)?;
    }
    Ok(output)
}
