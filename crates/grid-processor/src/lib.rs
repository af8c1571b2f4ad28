//! Raster grid processing for the acquisition pipeline.
//!
//! This crate holds everything that works on pixels without talking to a
//! remote service:
//!
//! - **Grid math**: degree/pixel sizing, tile plans, transforms
//! - **Raster buffers**: band-sequential `f32` grids with CRS and nodata
//! - **Spatial processing**: clip to a bbox, reproject, align to a grid
//! - **GeoTIFF I/O**: read and write georeferenced rasters
//!
//! # Architecture
//!
//! ```text
//! BoundingBox + scale
//!      │
//!      ▼
//! grid_math::partition ──► TilePlan (row-major TileDescriptors)
//!      │
//!      ▼                  (tiles fetched and stitched elsewhere)
//! RasterBuffer (EPSG:4326)
//!      │
//!      ├─► SpatialProcessor::clip(bbox)
//!      │
//!      ├─► SpatialProcessor::reproject(target_crs, resolution)
//!      │
//!      └─► geotiff::write_geotiff(path)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{SpatialProcessor, grid_math};
//!
//! let plan = grid_math::partition(&bbox, 30.0, 450)?;
//! let processor = SpatialProcessor::default();
//! let out = processor.clip_and_reproject(&raster, &bbox, Crs::conus_albers(), 30.0)?;
//! grid_processor::geotiff::write_geotiff(&out, "outputs/land_cover.tif")?;
//! ```

pub mod clip;
pub mod config;
pub mod error;
pub mod geotiff;
pub mod grid_math;
pub mod projection;
pub mod spatial;
pub mod types;

// Re-export commonly used types at crate root
pub use config::GridProcessorConfig;
pub use error::{GridProcessorError, Result};
pub use geotiff::{decode_geotiff, encode_geotiff, read_geotiff, write_geotiff};
pub use grid_math::{
    geotransform, partition, pixel_dimensions, require_pixel_dimensions, TileDescriptor,
    TilePlan, METERS_PER_DEGREE,
};
pub use projection::TargetGrid;
pub use spatial::SpatialProcessor;
pub use types::{DataType, InterpolationMethod, RasterBuffer};
