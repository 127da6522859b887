//! Host-side reference for the gradient kernel.
//!
//! Mirrors what the live-view `compute` kernel writes so results can be
//! checked without a GPU, and so read-back pixels can be compared against it.

/// Colour the gradient kernel writes at `(x, y)` of a `width` x `height` texture.
///
/// Black at the top-left corner, approaching yellow at the bottom-right.
pub fn gradient_texel(x: u32, y: u32, width: u32, height: u32) -> [f32; 4] {
    let u = x as f32 / width as f32;
    let v = y as f32 / height as f32;
    [u, v, 0.0, 1.0]
}

/// Convert a colour to `rgba8unorm` the way a storage texture write does.
pub fn quantize_unorm8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}
