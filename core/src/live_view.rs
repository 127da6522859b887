//! Live-view dispatch flow.
//!
//! Opens a window, compiles the inline gradient kernel, and on every redraw
//! dispatches it over the window's current drawable and presents the frame.
//! The grid follows the drawable's real pixel size, and the threadgroup shape
//! comes from the device limits. Submission never waits on the GPU.

use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::error::DemoError;
use crate::gpu::{
    BlitPipeline, DispatchGrid, GpuContext, GpuError, KernelPipeline, KernelSource, Step,
    StorageTarget, SubmissionLog, ThreadgroupSize, KERNEL_OUTPUT_FORMAT,
};

/// Entry point of the gradient kernel.
pub const GRADIENT_KERNEL: &str = "compute";

/// Black at the top-left, interpolating to yellow at the bottom-right.
pub const GRADIENT_KERNEL_SOURCE: &str = r#"
@group(0) @binding(0) var output: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(WORKGROUP_WIDTH, WORKGROUP_HEIGHT, 1)
fn compute(@builtin(global_invocation_id) gid: vec3<u32>) {
    let size = textureDimensions(output);
    if (gid.x >= size.x || gid.y >= size.y) {
        return;
    }
    let uv = vec2<f32>(gid.xy) / vec2<f32>(size);
    textureStore(output, gid.xy, vec4<f32>(uv.x, uv.y, 0.0, 1.0));
}
"#;

/// Configuration for the live view window.
#[derive(Debug, Clone)]
pub struct LiveViewConfig {
    pub title: String,
    /// Initial window size in logical points.
    pub width: u32,
    pub height: u32,
    pub kernel: KernelSource,
    /// `None` picks the device's preferred shape.
    pub threadgroup: Option<ThreadgroupSize>,
}

impl Default for LiveViewConfig {
    fn default() -> Self {
        Self {
            title: "texel-kernels".to_string(),
            width: 600,
            height: 600,
            kernel: KernelSource::inline(GRADIENT_KERNEL_SOURCE, GRADIENT_KERNEL),
            threadgroup: None,
        }
    }
}

/// How the kernel output reaches the drawable.
enum PresentPath {
    /// The drawable itself is bound as the storage texture.
    Direct,
    /// The kernel writes an RGBA8 texture that is drawn onto the drawable.
    Blit {
        pipeline: BlitPipeline,
        intermediate: Option<StorageTarget>,
    },
}

/// Whether a surface can be written by the kernel without an intermediate.
pub fn supports_direct_write(caps: &wgpu::SurfaceCapabilities) -> bool {
    caps.usages.contains(wgpu::TextureUsages::STORAGE_BINDING)
        && caps.formats.contains(&KERNEL_OUTPUT_FORMAT)
}

/// Window surface, device and kernel for one live view.
pub struct SurfaceState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    ctx: GpuContext,
    surface_config: wgpu::SurfaceConfiguration,
    kernel: KernelPipeline,
    path: PresentPath,
}

impl SurfaceState {
    pub async fn new(window: Arc<Window>, config: &LiveViewConfig) -> Result<Self, DemoError> {
        let instance = GpuContext::create_instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(GpuError::from)?;
        let ctx = GpuContext::for_surface(instance, &surface).await?;

        let caps = surface.get_capabilities(&ctx.adapter);
        let direct = supports_direct_write(&caps);
        let format = if direct {
            KERNEL_OUTPUT_FORMAT
        } else {
            // Non-sRGB keeps the written values as they are.
            caps.formats
                .iter()
                .copied()
                .find(|format| !format.is_srgb())
                .or_else(|| caps.formats.first().copied())
                .ok_or(GpuError::UnsupportedSurface)?
        };
        let usage = if direct {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::STORAGE_BINDING
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        };
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage,
            format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        if size.width > 0 && size.height > 0 {
            surface.configure(&ctx.device, &surface_config);
        }

        let threadgroup = config
            .threadgroup
            .unwrap_or_else(|| ThreadgroupSize::optimal_for(&ctx.limits()));
        let kernel = KernelPipeline::new(&ctx.device, &config.kernel, threadgroup)?;

        let path = if direct {
            log::info!("Kernel writes the drawable directly ({:?})", format);
            PresentPath::Direct
        } else {
            log::info!("Kernel output is blitted onto a {:?} drawable", format);
            PresentPath::Blit {
                pipeline: BlitPipeline::new(&ctx.device, format),
                intermediate: None,
            }
        };

        Ok(Self {
            window,
            surface,
            ctx,
            surface_config,
            kernel,
            path,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn kernel(&self) -> &KernelPipeline {
        &self.kernel
    }

    /// Reconfigure the surface for a new window size.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.surface_config.width = size.width;
        self.surface_config.height = size.height;
        self.reconfigure();
    }

    /// Reapply the current configuration, e.g. after the surface was lost.
    pub fn reconfigure(&mut self) {
        if self.surface_config.width > 0 && self.surface_config.height > 0 {
            self.surface.configure(&self.ctx.device, &self.surface_config);
        }
    }

    /// Dispatch the kernel over the current drawable and present it.
    ///
    /// Returns the submitted steps, or `None` when the window has no area.
    pub fn render(&mut self) -> Result<Option<Vec<Step>>, DemoError> {
        if self.surface_config.width == 0 || self.surface_config.height == 0 {
            return Ok(None);
        }

        let frame = self.surface.get_current_texture()?;
        let drawable = &frame.texture;
        let (width, height) = (drawable.width(), drawable.height());
        let grid = DispatchGrid::covering(width, height, self.kernel.threadgroup());
        grid.validate(&self.ctx.limits())?;

        let device = &self.ctx.device;
        let frame_view = drawable.create_view(&wgpu::TextureViewDescriptor::default());
        let mut log = SubmissionLog::new();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("live_view_encoder"),
        });

        match &mut self.path {
            PresentPath::Direct => {
                let bind_group = self.kernel.bind_output(device, &frame_view);
                self.kernel
                    .encode_dispatch(&mut encoder, &bind_group, &grid, &mut log)?;
            }
            PresentPath::Blit {
                pipeline,
                intermediate,
            } => {
                let stale = intermediate
                    .as_ref()
                    .map_or(false, |t| t.width() != width || t.height() != height);
                if stale {
                    *intermediate = None;
                }
                let target = intermediate.get_or_insert_with(|| {
                    StorageTarget::for_kernel_output(
                        device,
                        "live_view_intermediate",
                        width,
                        height,
                    )
                });
                let bind_group = self.kernel.bind_output(device, target.view());
                self.kernel
                    .encode_dispatch(&mut encoder, &bind_group, &grid, &mut log)?;
                pipeline.encode(device, &mut encoder, target.view(), &frame_view, &mut log)?;
            }
        }

        log.record(Step::Commit)?;
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        log.record(Step::Present)?;
        self.window.pre_present_notify();
        frame.present();

        Ok(Some(log.into_steps()))
    }
}

/// winit application driving one live view window.
pub struct LiveViewApp {
    config: LiveViewConfig,
    state: Option<SurfaceState>,
    error: Option<DemoError>,
}

impl LiveViewApp {
    pub fn new(config: LiveViewConfig) -> Self {
        Self {
            config,
            state: None,
            error: None,
        }
    }

    /// The error that ended the event loop, if any.
    pub fn into_result(self) -> Result<(), DemoError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> Result<SurfaceState, DemoError> {
        let attributes = Window::default_attributes()
            .with_title(self.config.title.as_str())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(attributes)?);
        pollster::block_on(SurfaceState::new(window, &self.config))
    }
}

impl ApplicationHandler for LiveViewApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                state.window().request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                log::error!("Failed to start live view: {e}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                state.resize(size);
                state.window().request_redraw();
            }
            WindowEvent::RedrawRequested => match state.render() {
                Ok(Some(steps)) => log::debug!("Presented frame ({} steps)", steps.len()),
                Ok(None) => {}
                Err(DemoError::Surface(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost)) => {
                    log::debug!("Surface outdated/lost, reconfiguring");
                    state.reconfigure();
                    state.window().request_redraw();
                }
                Err(DemoError::Surface(wgpu::SurfaceError::Timeout)) => {
                    log::warn!("Surface timeout. Frame will be dropped.");
                }
                Err(e) => {
                    log::error!("Live view frame failed: {e}");
                    self.error = Some(e);
                    event_loop.exit();
                }
            },
            _ => {}
        }
    }
}

/// Open the window and run until it is closed or a frame fails.
pub fn run_live_view(config: LiveViewConfig) -> Result<(), DemoError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);
    let mut app = LiveViewApp::new(config);
    event_loop.run_app(&mut app)?;
    app.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::kernel::declares_entry_point;

    #[test]
    fn test_config_default() {
        let config = LiveViewConfig::default();
        assert_eq!((config.width, config.height), (600, 600));
        assert_eq!(config.kernel.entry_point(), GRADIENT_KERNEL);
        assert!(config.threadgroup.is_none());
    }

    #[test]
    fn test_gradient_source_declares_entry_point() {
        assert!(declares_entry_point(GRADIENT_KERNEL_SOURCE, GRADIENT_KERNEL));
    }

    #[test]
    fn test_direct_write_needs_storage_usage_and_rgba8() {
        let mut caps = wgpu::SurfaceCapabilities {
            formats: vec![wgpu::TextureFormat::Bgra8Unorm, KERNEL_OUTPUT_FORMAT],
            usages: wgpu::TextureUsages::RENDER_ATTACHMENT,
            ..Default::default()
        };
        assert!(!supports_direct_write(&caps));

        caps.usages |= wgpu::TextureUsages::STORAGE_BINDING;
        assert!(supports_direct_write(&caps));

        caps.formats = vec![wgpu::TextureFormat::Bgra8Unorm];
        assert!(!supports_direct_write(&caps));
    }

    #[tokio::test]
    async fn test_gradient_kernel_compiles_with_device_threadgroup() {
        let ctx = match GpuContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => return,
        };

        let threadgroup = ThreadgroupSize::optimal_for(&ctx.limits());
        let config = LiveViewConfig::default();
        let kernel = KernelPipeline::new(&ctx.device, &config.kernel, threadgroup)
            .expect("gradient kernel should compile");
        assert_eq!(kernel.threadgroup(), threadgroup);
    }
}
