//! Resampling between grids.
//!
//! `interpolation` holds the per-pixel kernels, `reproject` builds target
//! grids and warps rasters onto them.

pub mod interpolation;
pub mod reproject;

pub use interpolation::{bilinear_interpolate, nearest_interpolate, sample};
pub use reproject::{align, default_target_grid, reproject, warp, TargetGrid};
