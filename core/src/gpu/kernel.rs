//! Compute kernel compilation and dispatch encoding.
//!
//! A kernel is WGSL exposing one write-only `rgba8unorm` storage texture at
//! `@group(0) @binding(0)` and a `@compute` entry point reading
//! `global_invocation_id`. Its `@workgroup_size` refers to `WORKGROUP_WIDTH`
//! and `WORKGROUP_HEIGHT`, which are prepended as module constants when the
//! pipeline is built so the same source serves any threadgroup shape.

use std::borrow::Cow;

use wgpu::{BindGroup, BindGroupLayout, CommandEncoder, ComputePipeline, Device, TextureView};

use super::dispatch::{DispatchError, DispatchGrid, ThreadgroupSize};
use super::layouts::create_kernel_output_layout;
use super::sequence::{SequenceError, Step, SubmissionLog};

/// Entry point of the built-in ray tracing kernel.
pub const RAY_TRACING_KERNEL: &str = "rayTracingKernel";

const RAY_TRACING_SOURCE: &str = include_str!("shaders/ray_tracing.wgsl");

/// Errors that can occur while building a kernel pipeline.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("Unknown kernel '{0}'")]
    UnknownKernel(String),
    #[error("Kernel source does not declare entry point '{0}'")]
    MissingEntryPoint(String),
    #[error("Kernel '{entry_point}' failed to compile: {message}")]
    Compilation {
        entry_point: String,
        message: String,
    },
    #[error(transparent)]
    Threadgroup(#[from] DispatchError),
}

/// Where a kernel's WGSL comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelSource {
    /// Source text compiled at runtime.
    Inline {
        source: Cow<'static, str>,
        entry_point: Cow<'static, str>,
    },
    /// A kernel shipped in [`KernelLibrary::builtin`], looked up by name.
    Library(Cow<'static, str>),
}

impl KernelSource {
    pub fn inline(
        source: impl Into<Cow<'static, str>>,
        entry_point: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::Inline {
            source: source.into(),
            entry_point: entry_point.into(),
        }
    }

    pub fn library(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Library(name.into())
    }

    pub fn entry_point(&self) -> &str {
        match self {
            Self::Inline { entry_point, .. } => &**entry_point,
            Self::Library(name) => &**name,
        }
    }

    /// Resolve to WGSL text, consulting `library` for named kernels.
    pub fn resolve<'a>(&'a self, library: &KernelLibrary) -> Result<&'a str, KernelError> {
        match self {
            Self::Inline { source, .. } => Ok(&**source),
            Self::Library(name) => library
                .source_for(name)
                .ok_or_else(|| KernelError::UnknownKernel(name.to_string())),
        }
    }
}

/// Named kernels compiled into the crate.
pub struct KernelLibrary {
    kernels: &'static [(&'static str, &'static str)],
}

impl KernelLibrary {
    pub fn builtin() -> Self {
        Self {
            kernels: &[(RAY_TRACING_KERNEL, RAY_TRACING_SOURCE)],
        }
    }

    pub fn source_for(&self, name: &str) -> Option<&'static str> {
        self.kernels
            .iter()
            .find(|(kernel, _)| *kernel == name)
            .map(|(_, source)| *source)
    }
}

/// Prefix `source` with the threadgroup constants its `@workgroup_size` uses.
pub fn specialize(source: &str, threadgroup: ThreadgroupSize) -> String {
    format!(
        "const WORKGROUP_WIDTH: u32 = {}u;\nconst WORKGROUP_HEIGHT: u32 = {}u;\n\n{}",
        threadgroup.width, threadgroup.height, source
    )
}

/// Whether `source` contains a function named `name`.
pub fn declares_entry_point(source: &str, name: &str) -> bool {
    source.match_indices(name).any(|(start, _)| {
        let before = source[..start].trim_end();
        let after = source[start + name.len()..].trim_start();
        let keyword = before
            .strip_suffix("fn")
            .is_some_and(|rest| rest.is_empty() || rest.ends_with(char::is_whitespace));
        keyword && after.starts_with('(')
    })
}

/// A compiled compute kernel ready to bind and dispatch.
pub struct KernelPipeline {
    pipeline: ComputePipeline,
    bind_group_layout: BindGroupLayout,
    entry_point: String,
    threadgroup: ThreadgroupSize,
}

impl KernelPipeline {
    /// Compile `source` for threadgroups of `threadgroup` threads.
    pub fn new(
        device: &Device,
        source: &KernelSource,
        threadgroup: ThreadgroupSize,
    ) -> Result<Self, KernelError> {
        threadgroup.validate(&device.limits())?;

        let library = KernelLibrary::builtin();
        let text = source.resolve(&library)?;
        let entry_point = source.entry_point().to_string();
        if !declares_entry_point(text, &entry_point) {
            return Err(KernelError::MissingEntryPoint(entry_point));
        }

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{}_shader", entry_point)),
            source: wgpu::ShaderSource::Wgsl(specialize(text, threadgroup).into()),
        });

        let bind_group_layout = create_kernel_output_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}_pipeline_layout", entry_point)),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&format!("{}_pipeline", entry_point)),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(&entry_point),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(error_scope.pop()) {
            return Err(KernelError::Compilation {
                entry_point,
                message: error.to_string(),
            });
        }

        log::info!(
            "Compiled kernel '{}' with {}x{} threadgroups",
            entry_point,
            threadgroup.width,
            threadgroup.height
        );

        Ok(Self {
            pipeline,
            bind_group_layout,
            entry_point,
            threadgroup,
        })
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn threadgroup(&self) -> ThreadgroupSize {
        self.threadgroup
    }

    /// Bind `output` at slot 0.
    pub fn bind_output(&self, device: &Device, output: &TextureView) -> BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_bind_group", self.entry_point)),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(output),
            }],
        })
    }

    /// Record one compute pass: bind pipeline, bind texture, dispatch `grid`, end.
    pub fn encode_dispatch(
        &self,
        encoder: &mut CommandEncoder,
        bind_group: &BindGroup,
        grid: &DispatchGrid,
        log: &mut SubmissionLog,
    ) -> Result<(), SequenceError> {
        log.record(Step::BeginPass)?;
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(&format!("{}_pass", self.entry_point)),
            timestamp_writes: None,
        });

        log.record(Step::BindPipeline)?;
        pass.set_pipeline(&self.pipeline);

        log.record(Step::BindTexture { slot: 0 })?;
        pass.set_bind_group(0, bind_group, &[]);

        log.record(Step::Dispatch {
            groups_x: grid.groups_x,
            groups_y: grid.groups_y,
        })?;
        pass.dispatch_workgroups(grid.groups_x, grid.groups_y, 1);

        drop(pass);
        log.record(Step::EndPass)
    }
}
