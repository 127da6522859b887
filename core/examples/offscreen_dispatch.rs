//! Example: Run the ray tracing kernel offscreen and save the result.
//!
//! Dispatches `rayTracingKernel` over a 256x256 texture, waits for the GPU,
//! writes `ray_tracing.png`, and prints the dispatch report as JSON.
//!
//! Run with:
//!     cargo run --example offscreen_dispatch

use std::path::PathBuf;

use texel_kernels::offscreen::{run_offscreen, OffscreenConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = OffscreenConfig {
        output_path: Some(PathBuf::from("ray_tracing.png")),
        ..Default::default()
    };

    let output = pollster::block_on(run_offscreen(config))?;
    println!("{}", serde_json::to_string_pretty(&output.report)?);

    Ok(())
}
