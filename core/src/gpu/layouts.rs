//! Bind group layout builders for the kernel and blit pipelines.

use wgpu::{BindGroupLayout, BindGroupLayoutEntry, Device, ShaderStages, TextureFormat};

use super::textures::KERNEL_OUTPUT_FORMAT;

/// Builder for creating bind group layouts with common patterns.
pub struct BindGroupLayoutBuilder {
    label: Option<&'static str>,
    entries: Vec<BindGroupLayoutEntry>,
}

impl BindGroupLayoutBuilder {
    /// Create a new bind group layout builder.
    pub fn new(label: &'static str) -> Self {
        Self {
            label: Some(label),
            entries: Vec::new(),
        }
    }

    /// Add a write-only 2D storage texture entry.
    pub fn storage_texture_2d(
        mut self,
        binding: u32,
        visibility: ShaderStages,
        format: TextureFormat,
    ) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });
        self
    }

    /// Add a 2D texture entry.
    pub fn texture_2d(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        self
    }

    /// Add a filtering sampler entry.
    pub fn sampler(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        self
    }

    /// Build the bind group layout.
    pub fn build(self, device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: self.label,
            entries: &self.entries,
        })
    }
}

/// Kernel layout: the output texture at slot 0 and nothing else.
pub fn create_kernel_output_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("kernel_output_layout")
        .storage_texture_2d(0, ShaderStages::COMPUTE, KERNEL_OUTPUT_FORMAT)
        .build(device)
}

/// Create blit bind group layout (source texture, sampler).
pub fn create_blit_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("blit_bind_group_layout")
        .texture_2d(0, ShaderStages::FRAGMENT)
        .sampler(1, ShaderStages::FRAGMENT)
        .build(device)
}
