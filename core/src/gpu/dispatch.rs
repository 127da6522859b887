//! Grid-covering dispatch arithmetic.
//!
//! A kernel runs as a grid of threadgroups. Along each axis the number of
//! threadgroups is `ceil(dimension / width)`, so every texel is covered even
//! when the texture size is not a multiple of the threadgroup size. Threads
//! that land past the texture edge are expected to return early inside the
//! kernel.

use serde::Serialize;

/// SIMD width most desktop GPUs execute in lockstep.
pub const PREFERRED_EXECUTION_WIDTH: u32 = 32;

/// Errors produced while sizing a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Threadgroup dimensions must be non-zero, got {width}x{height}")]
    ZeroThreadgroup { width: u32, height: u32 },
    #[error(
        "Threadgroup {width}x{height} exceeds device limits (max {max_x}x{max_y}, {max_invocations} invocations)"
    )]
    ThreadgroupExceedsLimits {
        width: u32,
        height: u32,
        max_x: u32,
        max_y: u32,
        max_invocations: u32,
    },
    #[error("Grid needs {count} threadgroups along one axis, device allows {max}")]
    TooManyThreadgroups { count: u32, max: u32 },
    #[error("Texture size {width}x{height} must be between 1 and {max} on each side")]
    InvalidTextureSize { width: u32, height: u32, max: u32 },
}

/// Number of threadgroups of `width` threads needed to cover `dimension` texels.
///
/// Equivalent to `(dimension + width - 1) / width` without the overflow.
///
/// # Panics
///
/// Panics if `width` is zero. [`ThreadgroupSize::new`] never produces one.
pub fn threadgroups_along(dimension: u32, width: u32) -> u32 {
    dimension.div_ceil(width)
}

/// Check a 2-D kernel target size against the device's texture limit.
pub fn validate_texture_size(
    width: u32,
    height: u32,
    limits: &wgpu::Limits,
) -> Result<(), DispatchError> {
    let max = limits.max_texture_dimension_2d;
    if width == 0 || height == 0 || width > max || height > max {
        return Err(DispatchError::InvalidTextureSize { width, height, max });
    }
    Ok(())
}

/// Threads per threadgroup along x and y (depth is always 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThreadgroupSize {
    pub width: u32,
    pub height: u32,
}

impl ThreadgroupSize {
    /// Fixed 8x8 threadgroup used by the offscreen flow.
    pub const SQUARE_8: Self = Self {
        width: 8,
        height: 8,
    };

    pub fn new(width: u32, height: u32) -> Result<Self, DispatchError> {
        if width == 0 || height == 0 {
            return Err(DispatchError::ZeroThreadgroup { width, height });
        }
        Ok(Self { width, height })
    }

    /// Threadgroup shaped after the device: one execution width wide, and as
    /// tall as the per-threadgroup invocation budget allows.
    pub fn optimal_for(limits: &wgpu::Limits) -> Self {
        let width = PREFERRED_EXECUTION_WIDTH
            .min(limits.max_compute_workgroup_size_x)
            .max(1);
        let height = (limits.max_compute_invocations_per_workgroup / width)
            .min(limits.max_compute_workgroup_size_y)
            .max(1);
        Self { width, height }
    }

    /// Total threads in one threadgroup.
    pub fn invocations(&self) -> u32 {
        self.width.saturating_mul(self.height)
    }

    /// Check the size against what the device can launch.
    pub fn validate(&self, limits: &wgpu::Limits) -> Result<(), DispatchError> {
        if self.width == 0 || self.height == 0 {
            return Err(DispatchError::ZeroThreadgroup {
                width: self.width,
                height: self.height,
            });
        }
        let fits = self.width <= limits.max_compute_workgroup_size_x
            && self.height <= limits.max_compute_workgroup_size_y
            && self.invocations() <= limits.max_compute_invocations_per_workgroup;
        if !fits {
            return Err(DispatchError::ThreadgroupExceedsLimits {
                width: self.width,
                height: self.height,
                max_x: limits.max_compute_workgroup_size_x,
                max_y: limits.max_compute_workgroup_size_y,
                max_invocations: limits.max_compute_invocations_per_workgroup,
            });
        }
        Ok(())
    }
}

/// Threadgroup counts for one 2-D dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchGrid {
    pub groups_x: u32,
    pub groups_y: u32,
    pub threadgroup: ThreadgroupSize,
}

impl DispatchGrid {
    /// Smallest grid of `threadgroup`-sized groups covering `width` x `height`.
    pub fn covering(width: u32, height: u32, threadgroup: ThreadgroupSize) -> Self {
        Self {
            groups_x: threadgroups_along(width, threadgroup.width),
            groups_y: threadgroups_along(height, threadgroup.height),
            threadgroup,
        }
    }

    /// Threads launched along x, including the ones past the texture edge.
    pub fn threads_x(&self) -> u64 {
        self.groups_x as u64 * self.threadgroup.width as u64
    }

    pub fn threads_y(&self) -> u64 {
        self.groups_y as u64 * self.threadgroup.height as u64
    }

    /// Whether every texel of a `width` x `height` target gets a thread.
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.threads_x() >= width as u64 && self.threads_y() >= height as u64
    }

    /// A zero-sized target produces an empty grid, which dispatches nothing.
    pub fn is_empty(&self) -> bool {
        self.groups_x == 0 || self.groups_y == 0
    }

    pub fn validate(&self, limits: &wgpu::Limits) -> Result<(), DispatchError> {
        let max = limits.max_compute_workgroups_per_dimension;
        let count = self.groups_x.max(self.groups_y);
        if count > max {
            return Err(DispatchError::TooManyThreadgroups { count, max });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_division() {
        assert_eq!(threadgroups_along(256, 8), 32);
    }

    #[test]
    fn test_rounds_up_partial_group() {
        assert_eq!(threadgroups_along(257, 8), 33);
        assert_eq!(threadgroups_along(1, 8), 1);
        assert_eq!(threadgroups_along(0, 8), 0);
    }

    #[test]
    fn test_no_overflow_near_max() {
        assert_eq!(threadgroups_along(u32::MAX, 8), u32::MAX / 8 + 1);
    }

    #[test]
    fn test_zero_threadgroup_rejected() {
        assert_eq!(
            ThreadgroupSize::new(0, 8),
            Err(DispatchError::ZeroThreadgroup {
                width: 0,
                height: 8
            })
        );
    }

    #[test]
    fn test_optimal_for_default_limits() {
        let size = ThreadgroupSize::optimal_for(&wgpu::Limits::default());
        assert_eq!(size.width, PREFERRED_EXECUTION_WIDTH);
        assert_eq!(
            size.invocations(),
            wgpu::Limits::default().max_compute_invocations_per_workgroup
        );
        assert!(size.validate(&wgpu::Limits::default()).is_ok());
    }

    #[test]
    fn test_optimal_for_narrow_device() {
        let limits = wgpu::Limits {
            max_compute_workgroup_size_x: 16,
            max_compute_workgroup_size_y: 4,
            max_compute_invocations_per_workgroup: 128,
            ..wgpu::Limits::default()
        };
        let size = ThreadgroupSize::optimal_for(&limits);
        assert_eq!(size, ThreadgroupSize { width: 16, height: 4 });
        assert!(size.validate(&limits).is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized() {
        let size = ThreadgroupSize::new(32, 32).unwrap();
        let err = size.validate(&wgpu::Limits::default()).unwrap_err();
        assert!(matches!(err, DispatchError::ThreadgroupExceedsLimits { .. }));
    }

    #[test]
    fn test_grid_covering_offscreen() {
        let grid = DispatchGrid::covering(256, 256, ThreadgroupSize::SQUARE_8);
        assert_eq!((grid.groups_x, grid.groups_y), (32, 32));
        assert!(grid.covers(256, 256));
        assert!(grid.validate(&wgpu::Limits::default()).is_ok());
    }

    #[test]
    fn test_grid_covering_odd_view() {
        let tg = ThreadgroupSize::new(32, 8).unwrap();
        let grid = DispatchGrid::covering(601, 599, tg);
        assert_eq!((grid.groups_x, grid.groups_y), (19, 75));
        assert!(grid.covers(601, 599));
    }

    #[test]
    fn test_grid_too_large() {
        let limits = wgpu::Limits::default();
        let grid = DispatchGrid::covering(u32::MAX, 1, ThreadgroupSize::SQUARE_8);
        assert!(matches!(
            grid.validate(&limits),
            Err(DispatchError::TooManyThreadgroups { .. })
        ));
    }

    #[test]
    fn test_texture_size_limits() {
        let limits = wgpu::Limits::default();
        let max = limits.max_texture_dimension_2d;
        assert!(validate_texture_size(256, 256, &limits).is_ok());
        assert!(validate_texture_size(max, 1, &limits).is_ok());
        assert_eq!(
            validate_texture_size(0, 0, &limits),
            Err(DispatchError::InvalidTextureSize {
                width: 0,
                height: 0,
                max
            })
        );
        assert!(validate_texture_size(256, 0, &limits).is_err());
        assert!(validate_texture_size(max + 1, 8, &limits).is_err());
    }

    #[test]
    fn test_empty_grid() {
        let grid = DispatchGrid::covering(0, 600, ThreadgroupSize::SQUARE_8);
        assert!(grid.is_empty());
    }
}
