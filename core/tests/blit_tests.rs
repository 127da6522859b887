//! Integration tests for the live view's blit path, run headless.
//!
//! The gradient kernel writes an RGBA8 target which is then drawn onto a BGRA
//! texture, the usual swap-chain format. Each test returns early when no GPU
//! adapter is available.

use texel_kernels::gpu::{
    sequence, BlitPipeline, DispatchGrid, GpuContext, KernelPipeline, KernelSource,
    ReadbackBuffer, Step, StorageTarget, SubmissionLog, ThreadgroupSize,
};
use texel_kernels::live_view::{GRADIENT_KERNEL, GRADIENT_KERNEL_SOURCE};
use texel_kernels::reference::{gradient_texel, quantize_unorm8};

async fn create_gpu_context() -> Option<GpuContext> {
    GpuContext::new().await.ok()
}

/// Dispatch the gradient and blit it onto a `Bgra8Unorm` texture.
/// Returns the pixels swizzled back to RGBA, and the recorded steps.
fn blit_gradient(ctx: &GpuContext, width: u32, height: u32) -> (Vec<[u8; 4]>, Vec<Step>) {
    let device = &ctx.device;
    let threadgroup = ThreadgroupSize::optimal_for(&ctx.limits());
    let kernel = KernelPipeline::new(
        device,
        &KernelSource::inline(GRADIENT_KERNEL_SOURCE, GRADIENT_KERNEL),
        threadgroup,
    )
    .expect("gradient kernel should build");

    let source = StorageTarget::for_kernel_output(device, "blit_source", width, height);
    let drawable = StorageTarget::new(
        device,
        "blit_drawable",
        width,
        height,
        wgpu::TextureFormat::Bgra8Unorm,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
    );
    let blit = BlitPipeline::new(device, wgpu::TextureFormat::Bgra8Unorm);
    let readback = ReadbackBuffer::new(device, width, height);

    let bind_group = kernel.bind_output(device, source.view());
    let grid = DispatchGrid::covering(width, height, threadgroup);

    let mut log = SubmissionLog::new();
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("blit_test_encoder"),
    });
    kernel
        .encode_dispatch(&mut encoder, &bind_group, &grid, &mut log)
        .expect("dispatch encodes");
    blit.encode(device, &mut encoder, source.view(), drawable.view(), &mut log)
        .expect("blit encodes");
    readback
        .encode_copy(&mut encoder, drawable.texture(), &mut log)
        .expect("copy encodes");
    log.record(Step::Commit).expect("commit");
    ctx.queue.submit(std::iter::once(encoder.finish()));
    log.record(Step::WaitUntilCompleted).expect("wait");

    let bytes = readback.read_pixels(device).expect("read back");
    let texels = bytes
        .chunks_exact(4)
        .map(|bgra| [bgra[2], bgra[1], bgra[0], bgra[3]])
        .collect();
    (texels, log.into_steps())
}

#[tokio::test]
async fn test_blit_matches_gradient_reference() {
    if let Some(ctx) = create_gpu_context().await {
        let (width, height) = (64, 32);
        let (texels, _) = blit_gradient(&ctx, width, height);
        assert_eq!(texels.len(), (width * height) as usize);

        for &(x, y) in &[(0, 0), (32, 16), (width - 1, 0), (width - 1, height - 1)] {
            let actual = texels[(y * width + x) as usize];
            let expected = quantize_unorm8(gradient_texel(x, y, width, height));
            for (a, e) in actual.iter().zip(expected.iter()) {
                assert!(
                    (*a as i32 - *e as i32).abs() <= 1,
                    "texel ({x}, {y}): got {actual:?}, expected {expected:?}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_blit_is_recorded_between_pass_and_commit() {
    if let Some(ctx) = create_gpu_context().await {
        let (_, steps) = blit_gradient(&ctx, 64, 32);

        assert_eq!(sequence::validate(&steps), Ok(()));
        let end = steps
            .iter()
            .position(|s| *s == Step::EndPass)
            .expect("pass ended");
        assert_eq!(
            &steps[end..],
            &[
                Step::EndPass,
                Step::Copy,
                Step::Copy,
                Step::Commit,
                Step::WaitUntilCompleted
            ]
        );
    }
}
