//! Example: Dispatch the gradient kernel over a live window.
//!
//! Opens a 600x600 window; every redraw runs the inline `compute` kernel over
//! the drawable and presents it. Resize the window to see the grid follow.
//!
//! Run with:
//!     cargo run --example live_view

use texel_kernels::live_view::{run_live_view, LiveViewConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    run_live_view(LiveViewConfig::default())?;

    Ok(())
}
