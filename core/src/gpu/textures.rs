//! Kernel output textures and CPU readback.

use wgpu::{CommandEncoder, Device, Texture, TextureFormat, TextureUsages, TextureView};

use super::sequence::{SequenceError, Step, SubmissionLog};

/// Pixel format every kernel writes.
pub const KERNEL_OUTPUT_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

const BYTES_PER_PIXEL: u32 = 4;

/// Errors raised while moving texture data back to the CPU.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("GPU buffer mapping failed: {0}")]
    BufferMapFailed(String),
    #[error("Waiting for the GPU failed: {0}")]
    Poll(String),
}

/// A 2-D texture a kernel writes through a storage binding.
/// The texture must outlive its view, so we keep them together.
pub struct StorageTarget {
    texture: Texture,
    view: TextureView,
}

impl StorageTarget {
    pub fn new(
        device: &Device,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// RGBA8 target the kernel writes and later stages read, sample or copy out.
    pub fn for_kernel_output(device: &Device, label: &str, width: u32, height: u32) -> Self {
        Self::new(
            device,
            label,
            width,
            height,
            KERNEL_OUTPUT_FORMAT,
            TextureUsages::STORAGE_BINDING | TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_SRC,
        )
    }

    pub fn view(&self) -> &TextureView {
        &self.view
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }
}

/// Readback buffer for copying GPU texture data to CPU.
pub struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row_bytes: u32,
    unpadded_row_bytes: u32,
}

impl ReadbackBuffer {
    /// Create a new readback buffer sized for an RGBA8 texture.
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let unpadded_row_bytes = width * BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row_bytes = unpadded_row_bytes.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_buffer"),
            size: (padded_row_bytes * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            width,
            height,
            padded_row_bytes,
            unpadded_row_bytes,
        }
    }

    /// Bytes per row including the copy alignment padding.
    pub fn padded_row_bytes(&self) -> u32 {
        self.padded_row_bytes
    }

    /// Record a copy of `texture` into this buffer.
    pub fn encode_copy(
        &self,
        encoder: &mut CommandEncoder,
        texture: &Texture,
        log: &mut SubmissionLog,
    ) -> Result<(), SequenceError> {
        log.record(Step::Copy)?;
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row_bytes),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Map the buffer, block until the GPU is done, and return tightly packed rows.
    pub fn read_pixels(&self, device: &Device) -> Result<Vec<u8>, TextureError> {
        let buffer_slice = self.buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| TextureError::Poll(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| TextureError::BufferMapFailed(e.to_string()))?
            .map_err(|e| TextureError::BufferMapFailed(format!("{:?}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((self.width * self.height * BYTES_PER_PIXEL) as usize);
        for row in 0..self.height {
            let start = (row * self.padded_row_bytes) as usize;
            let end = start + self.unpadded_row_bytes as usize;
            pixels.extend_from_slice(&data[start..end]);
        }
        drop(data);
        self.buffer.unmap();

        Ok(pixels)
    }
}
